//! Client-facing REST API
//!
//! ```text
//!   GET|PUT|DELETE  /ringcache/api/cache/<key>
//!   GET             /ringcache/api/stats
//!   GET             /ringcache/api/clear
//!   GET             /ringcache/api/filterClear
//!   GET             /metrics
//!   GET             /healthz
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use super::{key_from_path, read_body, respond, respond_json};
use crate::cache::{Cache, Stats};
use crate::filter::FilterStats;
use crate::metrics::CacheMetrics;
use crate::peers::PeerPicker;
use crate::transport::HttpPool;

/// Root of every API route
pub const API_PREFIX: &str = "/ringcache/api/";

const CACHE_PATH: &str = "/ringcache/api/cache/";
const STATS_PATH: &str = "/ringcache/api/stats";
const CLEAR_PATH: &str = "/ringcache/api/clear";
const FILTER_CLEAR_PATH: &str = "/ringcache/api/filterClear";

/// Shared handles for the API handlers
#[derive(Clone)]
pub struct ApiState {
    pub cache: Arc<Cache>,
    pub metrics: Arc<CacheMetrics>,
    pub pool: Option<Arc<HttpPool>>,
}

#[derive(Serialize)]
struct ValueBody<'a> {
    value: &'a [u8],
}

#[derive(Serialize)]
struct MessageBody<'a> {
    message: &'a str,
}

#[derive(Serialize)]
struct StatsBody {
    #[serde(flatten)]
    cache: Stats,
    filter: FilterStats,
    entries: usize,
    size_bytes: u64,
    max_size_bytes: u64,
    filter_items: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    loads: Option<HashMap<String, u64>>,
}

/// Route one front-end request
pub async fn api_service<B>(state: ApiState, req: Request<B>) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
{
    let path = req.uri().path().to_string();

    if let Some(key) = key_from_path(&path, CACHE_PATH) {
        let key = match key {
            Ok(key) => key,
            Err(e) => return message(StatusCode::BAD_REQUEST, &e.to_string()),
        };
        return cache_entry(&state, req, key).await;
    }

    let get_only = |handler: fn(&ApiState) -> Response<Full<Bytes>>| {
        if req.method() == Method::GET {
            handler(&state)
        } else {
            respond(StatusCode::METHOD_NOT_ALLOWED, Bytes::new())
        }
    };

    match path.as_str() {
        STATS_PATH => get_only(stats),
        CLEAR_PATH => get_only(|state| {
            state.cache.clear();
            message(StatusCode::OK, "cache cleared")
        }),
        FILTER_CLEAR_PATH => get_only(|state| {
            state.cache.reset_filter();
            message(StatusCode::OK, "filter cleared")
        }),
        "/metrics" => get_only(metrics),
        "/healthz" => get_only(|_| respond(StatusCode::OK, "ok")),
        _ => respond(StatusCode::NOT_FOUND, "not found"),
    }
}

async fn cache_entry<B>(state: &ApiState, req: Request<B>, key: String) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
{
    if key.is_empty() {
        return message(StatusCode::BAD_REQUEST, "can't use the cache without a key");
    }

    let method = req.method().clone();
    match method {
        Method::GET => match state.cache.get(&key).await {
            Ok(value) => respond_json(StatusCode::OK, &ValueBody { value: &value }),
            Err(e) if e.is_not_found() => message(StatusCode::NOT_FOUND, &e.to_string()),
            Err(e) => {
                warn!(key = %key, error = %e, "Get failed");
                message(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
            }
        },
        Method::PUT => {
            let value = match read_body(req.into_body()).await {
                Ok(value) => value,
                Err(e) => return message(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
            };
            match state.cache.set(&key, &value).await {
                Ok(()) => {
                    debug!(key = %key, "Stored in cache");
                    respond(StatusCode::CREATED, Bytes::new())
                }
                Err(e) if e.is_first_instance() => message(StatusCode::ACCEPTED, &e.to_string()),
                Err(e) => {
                    warn!(key = %key, error = %e, "Set failed");
                    message(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
                }
            }
        }
        Method::DELETE => match state.cache.delete(&key).await {
            Ok(()) => respond(StatusCode::ACCEPTED, Bytes::new()),
            Err(e) if e.is_not_found() => message(StatusCode::NOT_FOUND, &e.to_string()),
            Err(e) => {
                warn!(key = %key, error = %e, "Delete failed");
                message(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
            }
        },
        _ => respond(StatusCode::METHOD_NOT_ALLOWED, Bytes::new()),
    }
}

fn stats(state: &ApiState) -> Response<Full<Bytes>> {
    let cache = &state.cache;
    let body = StatsBody {
        cache: cache.stats(),
        filter: cache.filter_stats(),
        entries: cache.len(),
        size_bytes: cache.size(),
        max_size_bytes: cache.max_size(),
        filter_items: cache.filter_count(),
        loads: state.pool.as_ref().map(|pool| {
            pool.hosts()
                .into_iter()
                .map(|host| (host.name, host.load))
                .collect()
        }),
    };
    respond_json(StatusCode::OK, &body)
}

fn metrics(state: &ApiState) -> Response<Full<Bytes>> {
    let peers = state.pool.as_deref().map(|pool| pool as &dyn PeerPicker);
    state.metrics.update(&state.cache, peers);
    match state.metrics.render() {
        Ok((body, content_type)) => {
            let mut response = respond(StatusCode::OK, body);
            if let Ok(value) = hyper::header::HeaderValue::from_str(&content_type) {
                response
                    .headers_mut()
                    .insert(hyper::header::CONTENT_TYPE, value);
            }
            response
        }
        Err(e) => message(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn message(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    respond_json(status, &MessageBody { message })
}

// =============================================================================
// Tests
// =============================================================================
