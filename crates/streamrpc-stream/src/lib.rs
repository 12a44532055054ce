//! Stream bookkeeping for streamrpc.
//!
//! The protocol crate says what a single frame does to a stream. This
//! crate remembers the result per `stream.id`, so that frames arriving
//! for unknown or already-ended streams are caught and reported:
//!
//! - [`StreamTracker`] keeps the table and applies frames
//! - [`Transition`] is a checked frame, applied once it is sent
//! - [`StreamConfig`] sets limits and how strict initiation is
//! - [`TrackerError`] names each violation
//! - [`StreamStats`] counts how streams ended

mod config;
mod error;
mod tracker;

pub use config::StreamConfig;
pub use error::TrackerError;
pub use tracker::{StreamStats, StreamTracker, Transition};
