//! Peer configuration.

use serde::{Deserialize, Serialize};
use streamrpc_stream::StreamConfig;

/// Configuration for a [`Peer`](crate::Peer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    /// Stream bookkeeping limits.
    pub stream: StreamConfig,

    /// What `recv` does with a frame for a stream that already ended.
    ///
    /// `true` returns the violation as an error. `false` logs it, counts
    /// it, and hands the frame to the caller anyway.
    ///
    /// Default: `true`.
    pub reject_post_terminal: bool,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            reject_post_terminal: true,
        }
    }
}
