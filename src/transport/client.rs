//! HTTP client side of the peer protocol

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response, StatusCode};
use tracing::{instrument, warn};

use super::envelope::{
    DeleteRequest, DeleteResponse, Envelope, ErrorBody, GetRequest, GetResponse, SetRequest,
    SetResponse,
};
use crate::error::{Error, Result};
use crate::peers::RemotePeer;

/// Handle to one remote node
#[derive(Debug, Clone)]
pub struct HttpPeer {
    addr: String,
    base_url: String,
    client: Client,
}

impl HttpPeer {
    /// `addr` is the peer's origin, `base_path` the route its peer service mounts
    pub fn new(client: Client, addr: &str, base_path: &str) -> Self {
        Self {
            addr: addr.to_string(),
            base_url: format!("{}{}", addr.trim_end_matches('/'), base_path),
            client,
        }
    }

    fn url(&self, key: &str) -> String {
        format!("{}{}", self.base_url, urlencoding::encode(key))
    }

    async fn body(response: Response) -> Result<Bytes> {
        response.bytes().await.map_err(Error::Transport)
    }

    /// Decode an error envelope from a non-success reply
    async fn remote_error<E, F>(response: Response, extract: F) -> Error
    where
        E: Envelope,
        F: FnOnce(E) -> Option<ErrorBody>,
    {
        let status = response.status();
        let decoded = match Self::body(response).await {
            Ok(body) => E::decode(body),
            Err(e) => return e,
        };
        match decoded {
            Ok(envelope) => match extract(envelope) {
                Some(body) => body.into(),
                None => Error::Internal(format!("peer returned {status} without an error body")),
            },
            Err(e) => {
                warn!(%status, error = %e, "Undecodable error reply from peer");
                Error::Internal(format!("peer returned {status}"))
            }
        }
    }
}

#[async_trait]
impl RemotePeer for HttpPeer {
    fn addr(&self) -> &str {
        &self.addr
    }

    #[instrument(skip(self), fields(peer = %self.addr))]
    async fn get(&self, key: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(self.url(key))
            .body(
                GetRequest {
                    key: key.to_string(),
                }
                .encode(),
            )
            .send()
            .await
            .map_err(Error::Transport)?;

        if response.status() != StatusCode::OK {
            return Err(Self::remote_error(response, |r: GetResponse| r.error).await);
        }

        let reply = GetResponse::decode(Self::body(response).await?)?;
        match reply.error {
            Some(body) => Err(body.into()),
            None => Ok(reply.value),
        }
    }

    #[instrument(skip(self, value), fields(peer = %self.addr, len = value.len()))]
    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let response = self
            .client
            .put(self.url(key))
            .body(
                SetRequest {
                    key: key.to_string(),
                    value: Bytes::copy_from_slice(value),
                }
                .encode(),
            )
            .send()
            .await
            .map_err(Error::Transport)?;

        if response.status() != StatusCode::CREATED {
            return Err(Self::remote_error(response, |r: SetResponse| r.error).await);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(peer = %self.addr))]
    async fn delete(&self, key: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url(key))
            .body(
                DeleteRequest {
                    key: key.to_string(),
                }
                .encode(),
            )
            .send()
            .await
            .map_err(Error::Transport)?;

        if response.status() != StatusCode::ACCEPTED {
            return Err(Self::remote_error(response, |r: DeleteResponse| r.error).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_escapes_key() {
        let peer = HttpPeer::new(Client::new(), "http://10.0.0.2:9000/", "/_ringcache/");
        assert_eq!(peer.addr(), "http://10.0.0.2:9000/");
        assert_eq!(peer.url("a b/c"), "http://10.0.0.2:9000/_ringcache/a%20b%2Fc");
    }
}
