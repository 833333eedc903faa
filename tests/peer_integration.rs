//! Peer Forwarding Integration Tests
//!
//! - Routing through an in-process fake peer
//! - Two nodes talking the HTTP peer protocol on loopback

use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use ringcache::server;
use ringcache::transport::{peer_service, HttpPool, PoolOptions};
use ringcache::{Cache, CacheConfig, Error, PeerPicker, RemotePeer, Result};

// =============================================================================
// Fake peer
// =============================================================================

mod fake_peer_tests {
    use super::*;

    #[derive(Default)]
    struct RecordingPeer {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RemotePeer for RecordingPeer {
        fn addr(&self) -> &str {
            "fake://peer"
        }

        async fn get(&self, key: &str) -> Result<Bytes> {
            self.calls.lock().push(format!("get {key}"));
            Err(Error::Remote {
                message: format!("Item with key '{key}' not found at shard 0"),
                code: ringcache::error::codes::KEY_NOT_FOUND,
            })
        }

        async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
            self.calls.lock().push(format!("set {key} {}", value.len()));
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.calls.lock().push(format!("delete {key}"));
            Ok(())
        }
    }

    /// Sends keys starting with "remote" to the fake peer
    struct PrefixPicker {
        peer: Arc<RecordingPeer>,
    }

    impl PeerPicker for PrefixPicker {
        fn pick_peer(&self, key: &str) -> Option<Arc<dyn RemotePeer>> {
            key.starts_with("remote").then(|| self.peer.clone() as Arc<dyn RemotePeer>)
        }

        fn increment_load(&self) {}

        fn decrement_load(&self) {}

        fn load(&self) -> u64 {
            0
        }
    }

    #[tokio::test]
    async fn test_remote_keys_never_touch_local_shards() {
        let peer = Arc::new(RecordingPeer::default());
        let cache = Cache::new(CacheConfig {
            shards: 2,
            ..Default::default()
        })
        .unwrap()
        .with_peers(Arc::new(PrefixPicker { peer: peer.clone() }));

        cache.set("remote-1", b"abc").await.unwrap();
        let err = cache.get("remote-1").await.unwrap_err();
        assert!(err.is_not_found());
        assert_matches!(err, Error::Remote { .. });
        cache.delete("remote-1").await.unwrap();

        cache.set("local-1", b"abc").await.unwrap();

        assert_eq!(
            *peer.calls.lock(),
            vec!["set remote-1 3", "get remote-1", "delete remote-1"]
        );
        assert_eq!(cache.len(), 1);
        assert!(cache.get_local("remote-1").unwrap_err().is_not_found());
    }
}

// =============================================================================
// Two nodes over HTTP
// =============================================================================

mod http_tests {
    use super::*;

    struct Node {
        addr: String,
        cache: Arc<Cache>,
        pool: Arc<HttpPool>,
    }

    async fn cluster(filter: bool) -> (Node, Node, CancellationToken) {
        let shutdown = CancellationToken::new();
        let listeners = [
            TcpListener::bind("127.0.0.1:0").await.unwrap(),
            TcpListener::bind("127.0.0.1:0").await.unwrap(),
        ];
        let addrs: Vec<String> = listeners
            .iter()
            .map(|l| format!("http://{}", l.local_addr().unwrap()))
            .collect();

        let mut nodes = Vec::new();
        for (listener, addr) in listeners.into_iter().zip(addrs.iter()) {
            let pool = Arc::new(HttpPool::new(addr.clone(), PoolOptions::default()).unwrap());
            pool.set_peers(addrs.as_slice());
            let cache = Arc::new(
                Cache::new(CacheConfig {
                    shards: 4,
                    filter_items: filter.then_some(64),
                    ..Default::default()
                })
                .unwrap(),
            );
            cache.register_peers(pool.clone()).unwrap();

            let handler_cache = cache.clone();
            let base_path: Arc<str> = Arc::from(pool.base_path());
            tokio::spawn(server::serve_listener(
                "peer",
                listener,
                shutdown.clone(),
                move |req| peer_service(handler_cache.clone(), base_path.clone(), req),
            ));

            nodes.push(Node {
                addr: addr.clone(),
                cache,
                pool,
            });
        }

        let b = nodes.pop().unwrap();
        let a = nodes.pop().unwrap();
        (a, b, shutdown)
    }

    /// A key node `a` believes `b` owns
    fn key_owned_by(a: &Node, b: &Node, tag: &str) -> String {
        (0..)
            .map(|i| format!("{tag}-{i}"))
            .find(|key| a.pool.owner(key).as_deref() == Some(b.addr.as_str()))
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_forwarded_round_trip() {
        let (a, b, shutdown) = cluster(false).await;
        let key = key_owned_by(&a, &b, "fwd");

        a.cache.set(&key, b"over the wire").await.unwrap();
        assert!(a.cache.get_local(&key).unwrap_err().is_not_found());
        assert_eq!(b.cache.get_local(&key).unwrap(), Bytes::from_static(b"over the wire"));
        assert_eq!(a.cache.get(&key).await.unwrap(), Bytes::from_static(b"over the wire"));
        assert_eq!(b.pool.load(), 1);

        a.cache.delete(&key).await.unwrap();
        assert!(b.cache.is_empty());
        assert_eq!(b.pool.load(), 0);

        shutdown.cancel();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_remote_errors_pass_through() {
        let (a, b, shutdown) = cluster(true).await;
        let key = key_owned_by(&a, &b, "err");

        let err = a.cache.get(&key).await.unwrap_err();
        assert_matches!(err, Error::Remote { .. });
        assert!(err.is_not_found());

        let err = a.cache.set(&key, b"v").await.unwrap_err();
        assert!(err.is_first_instance());
        assert!(b.cache.contains(&key));

        a.cache.set(&key, b"v").await.unwrap();
        assert_eq!(b.cache.len(), 1);

        let err = a.cache.delete(&format!("{key}-absent")).await;
        // The absent key may be owned by either node; both report a miss
        assert!(err.unwrap_err().is_not_found());

        shutdown.cancel();
    }
}
