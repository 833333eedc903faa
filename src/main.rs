//! ringcache node
//!
//! Runs one cache member: the client-facing REST API and the peer protocol
//! listener, sharing one cache and one ring.
//!
//! ```text
//!   clients ──► :8000 /ringcache/api/* ──┐
//!                                        ├──► Cache ──► HttpPool ──► peers
//!   peers   ──► :9000 /_ringcache/*   ───┘    (local ops only)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ringcache::cluster::Membership;
use ringcache::config::Config;
use ringcache::metrics::CacheMetrics;
use ringcache::server::{self, api_service, ApiState};
use ringcache::transport::{peer_service, HttpPool};
use ringcache::{Cache, Result};

// =============================================================================
// CLI Arguments
// =============================================================================

/// ringcache - distributed in-memory key/value cache
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (YAML)
    #[arg(long, env = "RINGCACHE_CONFIG", default_value = "ringcache.yaml")]
    config: PathBuf,

    /// Number of shards (power of two)
    #[arg(long, env = "RINGCACHE_SHARDS")]
    shards: Option<usize>,

    /// Front-end API port
    #[arg(long, env = "RINGCACHE_HOST")]
    host: Option<u16>,

    /// Peer protocol port
    #[arg(long, env = "RINGCACHE_LISTEN")]
    listen: Option<u16>,

    /// Interface the peer protocol binds
    #[arg(long, env = "RINGCACHE_PEER_BIND")]
    peer_bind: Option<String>,

    /// Maximum cache memory in MiB
    #[arg(long, env = "RINGCACHE_MAXMEMORY")]
    maxmemory: Option<u64>,

    /// LRFU decay exponent
    #[arg(long, env = "RINGCACHE_LAMBDA")]
    lambda: Option<f64>,

    /// Enable the admission filter
    #[arg(long, env = "RINGCACHE_FILTER")]
    filter: bool,

    /// Admission filter capacity
    #[arg(long, env = "RINGCACHE_FILTER_ITEMS")]
    filter_items: Option<usize>,

    /// Cluster members, comma separated (e.g. http://10.0.0.2:9000)
    #[arg(long, env = "RINGCACHE_PEERS", value_delimiter = ',')]
    peers: Vec<String>,

    /// Address other members reach this node at
    #[arg(long, env = "RINGCACHE_ADVERTISE")]
    advertise: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    /// Flags win over the config file
    fn apply(&self, config: &mut Config) {
        if let Some(shards) = self.shards {
            config.cache.shards = shards;
        }
        if let Some(port) = self.host {
            config.http.port = port;
        }
        if let Some(port) = self.listen {
            config.peers.listen = port;
        }
        if let Some(bind) = &self.peer_bind {
            config.peers.bind = bind.clone();
        }
        if let Some(mb) = self.maxmemory {
            config.cache.size_mb = mb;
        }
        if let Some(lambda) = self.lambda {
            config.cache.lambda = lambda;
        }
        if self.filter {
            config.filter.enabled = true;
        }
        if let Some(items) = self.filter_items {
            config.filter.item_count = items;
        }
        if !self.peers.is_empty() {
            config.peers.nodes = self.peers.clone();
        }
        if let Some(addr) = &self.advertise {
            config.peers.advertise = Some(addr.clone());
        }
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    let mut config = Config::load(&args.config)?;
    args.apply(&mut config);
    config.validate()?;

    let self_addr = config.advertise_addr();

    info!("Starting ringcache node");
    info!("  Advertise address: {}", self_addr);
    info!("  Shards: {}", config.cache.shards);
    info!("  Memory: {} MiB", config.cache.size_mb);
    info!("  Lambda: {}", config.cache.lambda);
    info!("  Filter: {}", config.filter.enabled);

    let cache = Arc::new(Cache::new(config.cache_config())?);

    let pool = Arc::new(HttpPool::new(self_addr.clone(), config.pool_options())?);
    cache.register_peers(pool.clone())?;

    let membership = Membership::new(pool.clone());
    membership.update(
        config
            .peers
            .nodes
            .iter()
            .cloned()
            .chain(std::iter::once(self_addr)),
    );

    let metrics = Arc::new(CacheMetrics::new()?);
    let shutdown = CancellationToken::new();

    // Start peer server
    let peer_addr = config.peer_listen_addr()?;
    let peer_cache = cache.clone();
    let base_path: Arc<str> = Arc::from(pool.base_path());
    let peer_task = tokio::spawn(run_server(
        "peer",
        peer_addr,
        shutdown.clone(),
        move |req| peer_service(peer_cache.clone(), base_path.clone(), req),
    ));

    // Start API server
    let api_addr = config.api_listen_addr()?;
    let state = ApiState {
        cache: cache.clone(),
        metrics,
        pool: Some(pool),
    };
    let api_task = tokio::spawn(run_server(
        "api",
        api_addr,
        shutdown.clone(),
        move |req| api_service(state.clone(), req),
    ));

    tokio::select! {
        _ = shutdown_signal() => info!("Shutdown signal received"),
        _ = shutdown.cancelled() => error!("A listener failed, shutting down"),
    }
    shutdown.cancel();

    for task in [peer_task, api_task] {
        if let Err(e) = task.await {
            error!("Server task panicked: {}", e);
        }
    }

    info!("Node shutdown complete");
    Ok(())
}

/// Serve until shutdown; a listener failure stops the whole node
async fn run_server<F, Fut>(
    name: &'static str,
    addr: SocketAddr,
    shutdown: CancellationToken,
    handler: F,
) where
    F: Fn(hyper::Request<hyper::body::Incoming>) -> Fut + Clone + Send + Sync + 'static,
    Fut: std::future::Future<Output = hyper::Response<http_body_util::Full<bytes::Bytes>>>
        + Send
        + 'static,
{
    if let Err(e) = server::serve(name, addr, shutdown.clone(), handler).await {
        error!("{} server error: {}", name, e);
        shutdown.cancel();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
