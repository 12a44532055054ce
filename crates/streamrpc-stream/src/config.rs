//! Tracker configuration.

use serde::{Deserialize, Serialize};

/// Configuration for stream bookkeeping.
///
/// Sensible defaults are provided; override only what you need:
///
/// ```rust
/// use streamrpc_stream::StreamConfig;
///
/// let config = StreamConfig {
///     max_open_streams: 64,
///     ..StreamConfig::default()
/// };
/// assert!(config.require_initiation);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Maximum number of non-terminal streams at once. 0 means no limit.
    ///
    /// Default: 0.
    pub max_open_streams: usize,

    /// Whether a frame may only arrive for a stream that a stream request
    /// initiated first. When `false`, the first frame for an unknown id
    /// initiates the stream implicitly.
    ///
    /// Default: `true`.
    pub require_initiation: bool,

    /// How many ended streams to remember so that late frames for them
    /// are caught as violations. The oldest is forgotten first. 0 keeps
    /// them all until `cleanup_terminal`.
    ///
    /// Default: 1024.
    pub max_ended_streams: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_open_streams: 0,
            require_initiation: true,
            max_ended_streams: 1024,
        }
    }
}

impl StreamConfig {
    /// Returns `true` if `open` live streams leave room for one more.
    pub fn has_capacity(&self, open: usize) -> bool {
        self.max_open_streams == 0 || open < self.max_open_streams
    }
}
