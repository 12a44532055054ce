/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed, by either end.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// A frame exceeded the connection's size limit.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },
}

impl TransportError {
    /// Returns `true` if the other end is gone and nothing more can be
    /// sent.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed(_))
    }
}
