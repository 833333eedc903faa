//! Error types for ringcache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the cache engine, the ring and the peer transport
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Construction-order Errors
    // =========================================================================
    /// Cache has no shards to route to
    #[error("Shards not initialized")]
    ShardsNotInitialized,

    /// Shard was used before its eviction policy was attached
    #[error("Policy not initialized")]
    PolicyNotInitialized,

    /// A peer picker was registered after one was already resolved
    #[error("Peer picker already registered")]
    PeersAlreadyRegistered,

    // =========================================================================
    // Lookup Errors
    // =========================================================================
    /// Key is not resident in its shard
    #[error("Item with key '{key}' not found at shard {shard}")]
    KeyNotFound { key: String, shard: usize },

    /// Another key owns the same 64-bit hash slot
    #[error("Collision detected: key '{key}' not found at shard {shard}")]
    HashCollision { key: String, shard: usize },

    /// Admission filter saw this key for the first time; value was not cached
    #[error("Not found in filter. First instance for key '{key}'")]
    FilterFirstInstance { key: String },

    /// Key does not fit the 16-bit length field of a framed entry
    #[error("Key length {len} exceeds the 65535 byte frame limit")]
    KeyTooLong { len: usize },

    // =========================================================================
    // Index Errors
    // =========================================================================
    /// Trie index ran out of hash bits while splitting colliding leaves
    #[error("Max table depth exceeded")]
    DepthExceeded,

    /// Trie index has no leaf for the key
    #[error("Entry not found")]
    EntryNotFound,

    // =========================================================================
    // Peer Errors
    // =========================================================================
    /// Error reported by the owning peer, passed through unchanged
    #[error("{message}")]
    Remote { message: String, code: i32 },

    /// HTTP transport failure talking to a peer
    #[error("Peer transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Binary envelope could not be decoded
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    // =========================================================================
    // Process Errors
    // =========================================================================
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error means "absent" rather than "broken".
    ///
    /// Remote errors carry the code of the variant that produced them on the
    /// owning node, so a remote miss is still a miss.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::KeyNotFound { .. } | Error::EntryNotFound => true,
            Error::Remote { code, .. } => *code == codes::KEY_NOT_FOUND,
            _ => false,
        }
    }

    /// Whether this is the admission filter's first-sighting rejection.
    pub fn is_first_instance(&self) -> bool {
        match self {
            Error::FilterFirstInstance { .. } => true,
            Error::Remote { code, .. } => *code == codes::FILTER_FIRST_INSTANCE,
            _ => false,
        }
    }

    /// Stable code carried in the peer envelope's error body.
    pub fn code(&self) -> i32 {
        match self {
            Error::ShardsNotInitialized => codes::SHARDS_NOT_INITIALIZED,
            Error::PolicyNotInitialized => codes::POLICY_NOT_INITIALIZED,
            Error::KeyNotFound { .. } | Error::EntryNotFound => codes::KEY_NOT_FOUND,
            Error::HashCollision { .. } => codes::HASH_COLLISION,
            Error::FilterFirstInstance { .. } => codes::FILTER_FIRST_INSTANCE,
            Error::KeyTooLong { .. } => codes::KEY_TOO_LONG,
            Error::Remote { code, .. } => *code,
            _ => codes::INTERNAL,
        }
    }
}

/// Error codes used on the wire between peers.
pub mod codes {
    pub const INTERNAL: i32 = 0;
    pub const SHARDS_NOT_INITIALIZED: i32 = 1;
    pub const POLICY_NOT_INITIALIZED: i32 = 2;
    pub const KEY_NOT_FOUND: i32 = 3;
    pub const HASH_COLLISION: i32 = 4;
    pub const FILTER_FIRST_INSTANCE: i32 = 5;
    pub const KEY_TOO_LONG: i32 = 6;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        let miss = Error::KeyNotFound {
            key: "a".into(),
            shard: 3,
        };
        assert!(miss.is_not_found());
        assert_eq!(miss.to_string(), "Item with key 'a' not found at shard 3");

        let collision = Error::HashCollision {
            key: "a".into(),
            shard: 3,
        };
        assert!(!collision.is_not_found());
    }

    #[test]
    fn test_remote_codes_round_trip_classification() {
        let local = Error::FilterFirstInstance { key: "k".into() };
        let remote = Error::Remote {
            message: local.to_string(),
            code: local.code(),
        };
        assert!(remote.is_first_instance());
        assert!(!remote.is_not_found());
        assert_eq!(remote.to_string(), local.to_string());
    }

    #[test]
    fn test_internal_errors_share_code() {
        assert_eq!(Error::Internal("x".into()).code(), codes::INTERNAL);
        assert_eq!(Error::Config("x".into()).code(), codes::INTERNAL);
    }
}
