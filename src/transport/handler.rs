//! HTTP server side of the peer protocol
//!
//! Serves `<base_path><key>` for other members. Every request carries its
//! envelope as the body, and the envelope key must match the path key.
//! Requests are answered from the local shards only; a node never
//! re-forwards a peer request, so two nodes with diverging ring views cannot
//! bounce a key between them.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use tracing::debug;

use super::envelope::{
    DeleteRequest, DeleteResponse, Envelope, ErrorBody, GetRequest, GetResponse, SetRequest,
    SetResponse,
};
use crate::cache::Cache;
use crate::error::{Error, Result};
use crate::server::{key_from_path, read_body, respond};

fn status_for(err: &Error) -> StatusCode {
    if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if err.is_first_instance() {
        StatusCode::ACCEPTED
    } else if matches!(err, Error::InvalidEnvelope(_)) {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Serve one peer request against the local shards
pub async fn peer_service<B>(
    cache: Arc<Cache>,
    base_path: Arc<str>,
    req: Request<B>,
) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
{
    let key = match key_from_path(req.uri().path(), &base_path) {
        Some(Ok(key)) if !key.is_empty() => key,
        Some(Ok(_)) => return respond(StatusCode::BAD_REQUEST, "no key"),
        Some(Err(e)) => return respond(StatusCode::BAD_REQUEST, e.to_string()),
        None => return respond(StatusCode::NOT_FOUND, "not found"),
    };

    let method = req.method().clone();
    match method {
        Method::GET => {
            let result = match read_body(req.into_body()).await {
                Ok(body) => GetRequest::decode(body)
                    .and_then(|request| path_key(request.key, &key))
                    .and_then(|key| cache.get_local(&key)),
                Err(e) => Err(e),
            };
            match result {
                Ok(value) => {
                    let reply = GetResponse { value, error: None };
                    respond(StatusCode::OK, reply.encode())
                }
                Err(e) => {
                    debug!(key = %key, error = %e, "Peer get failed");
                    let reply = GetResponse {
                        value: Bytes::new(),
                        error: Some(ErrorBody::from(&e)),
                    };
                    respond(status_for(&e), reply.encode())
                }
            }
        }
        Method::PUT => {
            let result = match read_body(req.into_body()).await {
                Ok(body) => SetRequest::decode(body).and_then(|request| {
                    let key = path_key(request.key, &key)?;
                    cache.set_local(&key, &request.value)
                }),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => respond(StatusCode::CREATED, SetResponse::default().encode()),
                Err(e) => {
                    debug!(key = %key, error = %e, "Peer set failed");
                    let reply = SetResponse {
                        error: Some(ErrorBody::from(&e)),
                    };
                    respond(status_for(&e), reply.encode())
                }
            }
        }
        Method::DELETE => {
            let result = match read_body(req.into_body()).await {
                Ok(body) => DeleteRequest::decode(body)
                    .and_then(|request| path_key(request.key, &key))
                    .and_then(|key| cache.delete_local(&key)),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => respond(StatusCode::ACCEPTED, DeleteResponse::default().encode()),
                Err(e) => {
                    debug!(key = %key, error = %e, "Peer delete failed");
                    let reply = DeleteResponse {
                        error: Some(ErrorBody::from(&e)),
                    };
                    respond(status_for(&e), reply.encode())
                }
            }
        }
        _ => respond(StatusCode::METHOD_NOT_ALLOWED, Bytes::new()),
    }
}

/// The envelope key must name the same entry as the request path
fn path_key(envelope_key: String, path: &str) -> Result<String> {
    if envelope_key != path {
        return Err(Error::InvalidEnvelope(format!(
            "key '{}' does not match path key '{}'",
            envelope_key, path
        )));
    }
    Ok(envelope_key)
}

// =============================================================================
// Tests
// =============================================================================
