//! HTTP listeners
//!
//! One accept loop serves both the client-facing API and the peer protocol.
//! Each request is logged with its method, path, status and latency.

mod api;

pub use api::{api_service, ApiState, API_PREFIX};

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Instant;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::{Error, Result};

/// Bind `addr` and serve until `shutdown` fires
pub async fn serve<F, Fut>(
    name: &'static str,
    addr: SocketAddr,
    shutdown: CancellationToken,
    handler: F,
) -> Result<()>
where
    F: Fn(Request<Incoming>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response<Full<Bytes>>> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind {} server: {}", name, e)))?;
    serve_listener(name, listener, shutdown, handler).await
}

/// Serve on an already bound listener until `shutdown` fires
pub async fn serve_listener<F, Fut>(
    name: &'static str,
    listener: TcpListener,
    shutdown: CancellationToken,
    handler: F,
) -> Result<()>
where
    F: Fn(Request<Incoming>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response<Full<Bytes>>> + Send + 'static,
{
    let local = listener.local_addr()?;
    info!("{} server listening on {}", name, local);

    loop {
        let (stream, _) = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("{} server stopped", name);
                return Ok(());
            }
            accepted = listener.accept() => accepted
                .map_err(|e| Error::Internal(format!("{} server accept error: {}", name, e)))?,
        };

        let io = TokioIo::new(stream);
        let handler = handler.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let method = req.method().clone();
                let path = req.uri().path().to_string();
                let start = Instant::now();
                let response = handler(req);
                async move {
                    let response = response.await;
                    info!(
                        server = name,
                        %method,
                        path = %path,
                        status = response.status().as_u16(),
                        elapsed_ns = start.elapsed().as_nanos() as u64,
                        "request"
                    );
                    Ok::<_, Infallible>(response)
                }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("{} server connection error: {}", name, e);
            }
        });
    }
}

// =============================================================================
// Response helpers
// =============================================================================

pub(crate) fn respond(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
}

pub(crate) fn respond_json<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => {
            let mut response = respond(status, body);
            response.headers_mut().insert(
                hyper::header::CONTENT_TYPE,
                hyper::header::HeaderValue::from_static("application/json"),
            );
            response
        }
        Err(e) => respond(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Read the whole request body
pub(crate) async fn read_body<B>(body: B) -> Result<Bytes>
where
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
{
    body.collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| Error::Internal(format!("Failed to read request body: {}", e)))
}

/// Percent-decoded key after `prefix`, or `None` when the path is elsewhere
pub(crate) fn key_from_path(path: &str, prefix: &str) -> Option<Result<String>> {
    let raw = path.strip_prefix(prefix)?;
    Some(
        urlencoding::decode(raw)
            .map(|key| key.into_owned())
            .map_err(|e| Error::Internal(format!("Invalid key encoding: {}", e))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_path() {
        assert_eq!(
            key_from_path("/p/a%20b", "/p/").unwrap().unwrap(),
            "a b"
        );
        assert_eq!(key_from_path("/p/", "/p/").unwrap().unwrap(), "");
        assert!(key_from_path("/q/a", "/p/").is_none());
        assert!(key_from_path("/p/%FF", "/p/").unwrap().is_err());
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(serve_listener(
            "test",
            listener,
            shutdown.clone(),
            |_req| async { respond(StatusCode::OK, "ok") },
        ));
        shutdown.cancel();
        assert!(task.await.unwrap().is_ok());
    }
}
