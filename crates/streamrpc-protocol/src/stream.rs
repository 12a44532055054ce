//! The per-stream state machine.
//!
//! ```text
//!              data            data
//! Initiated ────────→ Open ←──────┐
//!     │                 │  └──────┘
//!     │ done/error/abort│ done/error/abort
//!     ▼                 ▼
//! Completed | Failed | Aborted      (terminal: nothing leaves them)
//! ```
//!
//! This module is only the transition function. Keeping a table of
//! live streams is the job of whoever owns the transport.

use std::fmt;

use crate::ErrorCode;

/// What a stream frame does to its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// A partial update.
    Data,
    /// Terminal success.
    Done,
    /// Terminal failure with the given code.
    Error(ErrorCode),
    /// Terminal cancellation.
    Abort,
}

impl FrameKind {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Data)
    }
}

/// Where a stream is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    /// The stream request went out; no frame seen yet.
    Initiated,
    /// At least one data frame arrived.
    Open { frames: u64 },
    /// Ended with a result.
    Completed,
    /// Ended with an error.
    Failed { code: ErrorCode },
    /// Cancelled by the client. Kept apart from `Failed` for reporting.
    Aborted,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed { .. } | Self::Aborted
        )
    }

    /// Number of data frames seen so far.
    pub fn frames(self) -> u64 {
        match self {
            Self::Open { frames } => frames,
            _ => 0,
        }
    }

    /// Applies a frame.
    ///
    /// Returns `None` if the stream is already terminal: a frame after
    /// the end is a protocol violation, and the caller must report it.
    pub fn advance(self, frame: FrameKind) -> Option<Self> {
        if self.is_terminal() {
            return None;
        }

        let next = match frame {
            FrameKind::Data => Self::Open {
                frames: self.frames().saturating_add(1),
            },
            FrameKind::Done => Self::Completed,
            FrameKind::Error(code) => Self::Failed { code },
            FrameKind::Abort => Self::Aborted,
        };
        Some(next)
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initiated => write!(f, "Initiated"),
            Self::Open { frames } => write!(f, "Open ({frames} frames)"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed { code } => write!(f, "Failed ({})", code.code()),
            Self::Aborted => write!(f, "Aborted"),
        }
    }
}
