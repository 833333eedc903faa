//! Prometheus exposition of the cache stats snapshot

use prometheus::{Encoder, IntGauge, Opts, Registry, TextEncoder};

use crate::cache::Cache;
use crate::error::{Error, Result};
use crate::peers::PeerPicker;

/// Gauges refreshed from the cache on every scrape
pub struct CacheMetrics {
    registry: Registry,
    hits: IntGauge,
    misses: IntGauge,
    delete_hits: IntGauge,
    delete_misses: IntGauge,
    collisions: IntGauge,
    evictions: IntGauge,
    filter_hits: IntGauge,
    filter_misses: IntGauge,
    filter_items: IntGauge,
    entries: IntGauge,
    size_bytes: IntGauge,
    max_size_bytes: IntGauge,
    ring_load: IntGauge,
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGauge> {
    let gauge = IntGauge::with_opts(Opts::new(name, help).namespace("ringcache"))
        .map_err(|e| Error::Internal(format!("Invalid metric {}: {}", name, e)))?;
    registry
        .register(Box::new(gauge.clone()))
        .map_err(|e| Error::Internal(format!("Failed to register metric {}: {}", name, e)))?;
    Ok(gauge)
}

impl CacheMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        Ok(Self {
            hits: gauge(&registry, "hits", "Lookups that found their key")?,
            misses: gauge(&registry, "misses", "Lookups that found nothing")?,
            delete_hits: gauge(&registry, "delete_hits", "Deletes that removed an entry")?,
            delete_misses: gauge(&registry, "delete_misses", "Deletes of absent keys")?,
            collisions: gauge(&registry, "collisions", "Lookups that hit another key's hash slot")?,
            evictions: gauge(&registry, "evictions", "Entries evicted by the policy")?,
            filter_hits: gauge(&registry, "filter_hits", "Admission filter membership hits")?,
            filter_misses: gauge(&registry, "filter_misses", "Admission filter membership misses")?,
            filter_items: gauge(&registry, "filter_items", "Fingerprints held by the admission filter")?,
            entries: gauge(&registry, "entries", "Resident entries")?,
            size_bytes: gauge(&registry, "size_bytes", "Resident framed bytes")?,
            max_size_bytes: gauge(&registry, "max_size_bytes", "Byte budget")?,
            ring_load: gauge(&registry, "ring_load", "Entries attributed to this node on the ring")?,
            registry,
        })
    }

    /// Copy the current snapshot into the gauges
    pub fn update(&self, cache: &Cache, peers: Option<&dyn PeerPicker>) {
        let stats = cache.stats();
        let filter = cache.filter_stats();

        self.hits.set(stats.hits as i64);
        self.misses.set(stats.misses as i64);
        self.delete_hits.set(stats.delete_hits as i64);
        self.delete_misses.set(stats.delete_misses as i64);
        self.collisions.set(stats.collisions as i64);
        self.evictions.set(stats.evictions as i64);
        self.filter_hits.set(filter.hits as i64);
        self.filter_misses.set(filter.misses as i64);
        self.filter_items.set(cache.filter_count() as i64);
        self.entries.set(cache.len() as i64);
        self.size_bytes.set(cache.size() as i64);
        self.max_size_bytes.set(cache.max_size() as i64);
        self.ring_load.set(peers.map_or(0, |p| p.load()) as i64);
    }

    /// Text exposition format and its content type
    pub fn render(&self) -> Result<(Vec<u8>, String)> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| Error::Internal(format!("Failed to encode metrics: {}", e)))?;
        Ok((buffer, encoder.format_type().to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;

    #[test]
    fn test_render_reflects_cache() {
        let cache = Cache::new(CacheConfig {
            shards: 2,
            ..Default::default()
        })
        .unwrap();
        cache.set_local("k", b"v").unwrap();
        cache.get_local("k").unwrap();

        let metrics = CacheMetrics::new().unwrap();
        metrics.update(&cache, None);
        let (body, content_type) = metrics.render().unwrap();
        let text = String::from_utf8(body).unwrap();

        assert!(content_type.starts_with("text/plain"));
        assert!(text.contains("ringcache_hits 1"));
        assert!(text.contains("ringcache_entries 1"));
        assert!(text.contains("ringcache_ring_load 0"));
    }

    #[test]
    fn test_instances_do_not_clash() {
        assert!(CacheMetrics::new().is_ok());
        assert!(CacheMetrics::new().is_ok());
    }
}
