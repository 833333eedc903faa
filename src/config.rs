//! Process configuration
//!
//! Loaded from YAML; every field has a default so a missing file or a
//! partial one is valid. Command-line flags are applied on top in `main`.

use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::CacheConfig;
use crate::error::{Error, Result};
use crate::ring::DEFAULT_REPLICAS;
use crate::transport::{PoolOptions, DEFAULT_BASE_PATH};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub title: String,
    pub cache: CacheSettings,
    pub filter: FilterSettings,
    pub http: HttpSettings,
    pub peers: PeerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Shard count, a power of two
    pub shards: usize,
    /// Memory budget in MiB, rounded up to a power of two
    pub size_mb: u64,
    /// LRFU decay exponent
    pub lambda: f64,
    /// Per-shard entry cap, 0 for none
    pub max_entries_per_shard: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub enabled: bool,
    pub item_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerSettings {
    /// Interface the peer service binds
    pub bind: String,
    /// Port the peer service listens on
    pub listen: u16,
    /// Address other members use for this node; derived from `listen` when unset
    pub advertise: Option<String>,
    /// Static member list, this node included or not
    pub nodes: Vec<String>,
    pub replicas: usize,
    pub base_path: String,
    pub request_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "ringcache".to_string(),
            cache: CacheSettings::default(),
            filter: FilterSettings::default(),
            http: HttpSettings::default(),
            peers: PeerSettings::default(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            shards: 16,
            size_mb: 64,
            lambda: 0.5,
            max_entries_per_shard: 0,
        }
    }
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            item_count: 1_000_000,
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for PeerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            listen: 9000,
            advertise: None,
            nodes: Vec::new(),
            replicas: DEFAULT_REPLICAS,
            base_path: DEFAULT_BASE_PATH.to_string(),
            request_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&raw)?;
        info!(path = %path.display(), title = %config.title, "Loaded config file");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache.shards == 0 || !self.cache.shards.is_power_of_two() {
            return Err(Error::Config(format!(
                "cache.shards must be a non-zero power of two, got {}",
                self.cache.shards
            )));
        }
        if !self.cache.lambda.is_finite() || self.cache.lambda < 0.0 {
            return Err(Error::Config(format!(
                "cache.lambda must be a finite non-negative number, got {}",
                self.cache.lambda
            )));
        }
        if self.peers.replicas == 0 {
            return Err(Error::Config("peers.replicas must be at least 1".into()));
        }
        if !self.peers.base_path.starts_with('/') || !self.peers.base_path.ends_with('/') {
            return Err(Error::Config(format!(
                "peers.base_path must start and end with '/', got {}",
                self.peers.base_path
            )));
        }
        Ok(())
    }

    /// Address this node is known by on the ring
    pub fn advertise_addr(&self) -> String {
        self.peers
            .advertise
            .clone()
            .unwrap_or_else(|| format!("http://127.0.0.1:{}", self.peers.listen))
    }

    /// Front-end API listen address
    pub fn api_listen_addr(&self) -> Result<SocketAddr> {
        socket_addr(&self.http.bind, self.http.port)
    }

    /// Peer service listen address
    pub fn peer_listen_addr(&self) -> Result<SocketAddr> {
        socket_addr(&self.peers.bind, self.peers.listen)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            shards: self.cache.shards,
            lambda: self.cache.lambda,
            max_entries_per_shard: self.cache.max_entries_per_shard,
            filter_items: self.filter.enabled.then_some(self.filter.item_count),
            ..Default::default()
        }
        .with_size_mb(self.cache.size_mb)
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            base_path: self.peers.base_path.clone(),
            replicas: self.peers.replicas,
            request_timeout: std::time::Duration::from_millis(self.peers.request_timeout_ms),
        }
    }
}

fn socket_addr(host: &str, port: u16) -> Result<SocketAddr> {
    format!("{}:{}", host, port)
        .parse()
        .map_err(|e| Error::Config(format!("Invalid listen address {}:{}: {}", host, port, e)))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache.shards, 16);
        assert_eq!(config.cache.size_mb, 64);
        assert_eq!(config.http.port, 8000);
        assert_eq!(config.peers.replicas, 10);
        assert_eq!(config.advertise_addr(), "http://127.0.0.1:9000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml() {
        let config = Config::from_yaml(
            r#"
title: edge
cache:
  shards: 8
  size_mb: 100
filter:
  enabled: true
peers:
  advertise: http://10.0.0.5:9000
  nodes: [http://10.0.0.5:9000, http://10.0.0.6:9000]
"#,
        )
        .unwrap();

        assert_eq!(config.title, "edge");
        assert_eq!(config.cache.shards, 8);
        assert_eq!(config.cache.lambda, 0.5);
        assert_eq!(config.filter.item_count, 1_000_000);
        assert_eq!(config.peers.nodes.len(), 2);
        assert_eq!(config.advertise_addr(), "http://10.0.0.5:9000");

        let cache = config.cache_config();
        assert_eq!(cache.max_bytes, 128 * 1024 * 1024);
        assert_eq!(cache.filter_items, Some(1_000_000));
    }

    #[test]
    fn test_listen_addresses_follow_bind() {
        let config = Config::from_yaml(
            r#"
http:
  bind: 127.0.0.1
  port: 8080
peers:
  bind: 10.0.0.5
  listen: 9100
"#,
        )
        .unwrap();
        assert_eq!(
            config.api_listen_addr().unwrap(),
            "127.0.0.1:8080".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            config.peer_listen_addr().unwrap(),
            "10.0.0.5:9100".parse::<SocketAddr>().unwrap()
        );

        let defaults = Config::default();
        assert_eq!(
            defaults.peer_listen_addr().unwrap(),
            "0.0.0.0:9000".parse::<SocketAddr>().unwrap()
        );

        let mut bad = Config::default();
        bad.peers.bind = "not a host".into();
        assert_matches!(bad.peer_listen_addr(), Err(Error::Config(_)));
    }

    #[test]
    fn test_validate_rejects() {
        let mut config = Config::default();
        config.cache.shards = 6;
        assert_matches!(config.validate(), Err(Error::Config(_)));

        let mut config = Config::default();
        config.cache.lambda = f64::NAN;
        assert_matches!(config.validate(), Err(Error::Config(_)));

        let mut config = Config::default();
        config.peers.replicas = 0;
        assert_matches!(config.validate(), Err(Error::Config(_)));

        let mut config = Config::default();
        config.peers.base_path = "/nope".into();
        assert_matches!(config.validate(), Err(Error::Config(_)));
    }

    #[test]
    fn test_bad_yaml() {
        assert_matches!(Config::from_yaml("cache: [1, 2"), Err(Error::ConfigParse(_)));
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = Config::load("/definitely/not/here.yaml").unwrap();
        assert_eq!(config, Config::default());
    }
}
