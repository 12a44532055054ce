//! The stream tracker: per-id state for every stream on a connection.
//!
//! Envelopes are pure data and know nothing about which streams exist.
//! The tracker is where "a frame after the end" becomes detectable:
//! - a non-abort stream request starts a stream in `Initiated`
//! - every frame for that `stream.id` advances it
//! - a frame for a terminal stream is a violation, logged and returned
//!
//! # Concurrency note
//!
//! `StreamTracker` uses a plain `HashMap` and is owned by whoever owns
//! the connection. Share it behind a mutex if several tasks need it.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use streamrpc_protocol::{FrameKind, Id, Message, StreamState};

use crate::{StreamConfig, TrackerError};

/// Running totals of how streams ended, plus how many violations were
/// seen along the way.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct StreamStats {
    pub completed: u64,
    pub failed: u64,
    pub aborted: u64,
    pub violations: u64,
}

impl StreamStats {
    fn record_end(&mut self, state: StreamState) {
        match state {
            StreamState::Completed => self.completed += 1,
            StreamState::Failed { .. } => self.failed += 1,
            StreamState::Aborted => self.aborted += 1,
            StreamState::Initiated | StreamState::Open { .. } => {}
        }
    }
}

/// A checked change to one stream that has not been applied yet.
///
/// Returned by [`StreamTracker::prepare`]. Apply it with
/// [`StreamTracker::commit`] once the envelope has actually gone out;
/// dropping it leaves the table untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a transition does nothing until it is committed"]
pub struct Transition {
    stream_id: Id,
    from: Option<StreamState>,
    to: StreamState,
}

impl Transition {
    pub fn stream_id(&self) -> &Id {
        &self.stream_id
    }

    /// The state the stream will be in after the commit.
    pub fn state(&self) -> StreamState {
        self.to
    }
}

/// Tracks the lifecycle of every stream on one connection.
///
/// ## Lifecycle
///
/// ```text
/// begin() ──→ advance(Data)* ──→ advance(Done | Error | Abort)
///    │                                    │
///    ▼                                    ▼
/// [Initiated] ──→ [Open] ──→ [Completed | Failed | Aborted] ──→ evicted
/// ```
///
/// Ended entries are kept so that late frames can still be recognised
/// as violations. At most `max_ended_streams` of them are remembered,
/// oldest evicted first; [`StreamTracker::cleanup_terminal`] drops them
/// all at once.
#[derive(Debug, Default)]
pub struct StreamTracker {
    /// Every known stream, keyed by the id its frames carry.
    streams: HashMap<Id, StreamState>,

    /// Ids of ended streams, oldest first.
    ended: VecDeque<Id>,

    config: StreamConfig,

    stats: StreamStats,
}

impl StreamTracker {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            streams: HashMap::new(),
            ended: VecDeque::new(),
            config,
            stats: StreamStats::default(),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Starts tracking a stream in `Initiated`.
    ///
    /// A terminal entry under the same id is replaced, so ids can be
    /// reused once a stream has ended.
    ///
    /// # Errors
    /// - [`TrackerError::AlreadyOpen`] if the id names a live stream
    /// - [`TrackerError::TooManyStreams`] if `max_open_streams` is reached
    pub fn begin(&mut self, stream_id: Id) -> Result<(), TrackerError> {
        let step = self.check_begin(stream_id)?;
        self.commit(step);
        Ok(())
    }

    /// Applies one frame to its stream and returns the new state.
    ///
    /// # Errors
    /// - [`TrackerError::UnknownStream`] if the id was never initiated and
    ///   `require_initiation` is set
    /// - [`TrackerError::AfterTerminal`] if the stream already ended
    /// - [`TrackerError::TooManyStreams`] if an implicit start hits the limit
    pub fn advance(
        &mut self,
        stream_id: &Id,
        frame: FrameKind,
    ) -> Result<StreamState, TrackerError> {
        let step = self.check_advance(stream_id, frame)?;
        Ok(self.commit(step))
    }

    /// Feeds any envelope through the tracker.
    ///
    /// A stream request (other than an abort) starts its stream; a stream
    /// frame advances its stream. Everything else passes through and
    /// returns `Ok(None)`.
    pub fn observe<T>(
        &mut self,
        msg: &Message<T>,
    ) -> Result<Option<StreamState>, TrackerError> {
        Ok(self.prepare(msg)?.map(|step| self.commit(step)))
    }

    /// Checks what [`StreamTracker::observe`] would do without changing
    /// any stream.
    ///
    /// Violations are still counted and logged. Commit the returned
    /// transition before preparing the next envelope.
    pub fn prepare<T>(
        &mut self,
        msg: &Message<T>,
    ) -> Result<Option<Transition>, TrackerError> {
        if let Message::StreamRequest(req) = msg {
            if req.is_abort() {
                return Ok(None);
            }
            return self.check_begin(req.stream_id()).map(Some);
        }

        match (msg.stream_id(), msg.frame_kind()) {
            (Some(stream_id), Some(frame)) => {
                self.check_advance(stream_id, frame).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Applies a prepared transition and returns the stream's new state.
    pub fn commit(&mut self, step: Transition) -> StreamState {
        let Transition { stream_id, from, to } = step;

        match from {
            None => tracing::debug!(%stream_id, "stream initiated"),
            Some(prev) if prev.is_terminal() => {
                self.ended.retain(|id| id != &stream_id);
                tracing::debug!(%stream_id, "stream initiated");
            }
            Some(_) => {}
        }

        if to.is_terminal() {
            self.stats.record_end(to);
            tracing::info!(%stream_id, state = %to, "stream ended");
            self.ended.push_back(stream_id.clone());
        } else if from.is_some_and(|prev| !prev.is_terminal()) {
            tracing::trace!(%stream_id, state = %to, "stream frame");
        }

        self.streams.insert(stream_id, to);
        self.evict_ended();
        to
    }

    pub fn state(&self, stream_id: &Id) -> Option<StreamState> {
        self.streams.get(stream_id).copied()
    }

    /// Number of streams that have not ended yet.
    pub fn open_count(&self) -> usize {
        self.streams.values().filter(|s| !s.is_terminal()).count()
    }

    /// Number of tracked streams in any state.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Drops every terminal entry and returns how many were removed.
    ///
    /// After this, a late frame for a removed id reads as an unknown
    /// stream rather than a frame after the end.
    pub fn cleanup_terminal(&mut self) -> usize {
        let before = self.streams.len();
        self.streams.retain(|_, state| !state.is_terminal());
        self.ended.clear();
        let removed = before - self.streams.len();
        if removed > 0 {
            tracing::debug!(removed, "cleaned up ended streams");
        }
        removed
    }

    /// Stops tracking one stream regardless of its state.
    pub fn forget(&mut self, stream_id: &Id) -> Option<StreamState> {
        let state = self.streams.remove(stream_id)?;
        if state.is_terminal() {
            self.ended.retain(|id| id != stream_id);
        }
        Some(state)
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    fn check_begin(&mut self, stream_id: Id) -> Result<Transition, TrackerError> {
        let from = self.state(&stream_id);
        if from.is_some_and(|state| !state.is_terminal()) {
            return Err(self.violation(TrackerError::AlreadyOpen(stream_id)));
        }
        self.check_capacity()?;

        Ok(Transition {
            stream_id,
            from,
            to: StreamState::Initiated,
        })
    }

    fn check_advance(
        &mut self,
        stream_id: &Id,
        frame: FrameKind,
    ) -> Result<Transition, TrackerError> {
        let from = self.state(stream_id);
        let current = match from {
            Some(state) => state,
            None if self.config.require_initiation => {
                return Err(self.violation(TrackerError::UnknownStream(
                    stream_id.clone(),
                )));
            }
            None => {
                self.check_capacity()?;
                StreamState::Initiated
            }
        };

        let Some(to) = current.advance(frame) else {
            return Err(self.violation(TrackerError::AfterTerminal {
                stream_id: stream_id.clone(),
                state: current,
            }));
        };

        Ok(Transition {
            stream_id: stream_id.clone(),
            from,
            to,
        })
    }

    fn check_capacity(&mut self) -> Result<(), TrackerError> {
        if self.config.has_capacity(self.open_count()) {
            return Ok(());
        }
        Err(self.violation(TrackerError::TooManyStreams {
            limit: self.config.max_open_streams,
        }))
    }

    fn evict_ended(&mut self) {
        let limit = self.config.max_ended_streams;
        if limit == 0 {
            return;
        }
        while self.ended.len() > limit {
            let Some(stream_id) = self.ended.pop_front() else {
                break;
            };
            self.streams.remove(&stream_id);
            tracing::trace!(%stream_id, "evicted ended stream");
        }
    }

    fn violation(&mut self, err: TrackerError) -> TrackerError {
        self.stats.violations += 1;
        tracing::warn!(error = %err, "stream protocol violation");
        err
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;
    use streamrpc_protocol::{ErrorCode, ErrorContext, builders};

    use super::*;

    // -- Helpers ----------------------------------------------------------

    fn tracker() -> StreamTracker {
        StreamTracker::new(StreamConfig::default())
    }

    fn lenient() -> StreamTracker {
        StreamTracker::new(StreamConfig {
            require_initiation: false,
            ..StreamConfig::default()
        })
    }

    fn sid(s: &str) -> Id {
        Id::from(s)
    }

    // =====================================================================
    // begin()
    // =====================================================================

    #[test]
    fn test_begin_starts_initiated() {
        let mut t = tracker();
        t.begin(sid("s1")).unwrap();
        assert_eq!(t.state(&sid("s1")), Some(StreamState::Initiated));
        assert_eq!(t.open_count(), 1);
    }

    #[test]
    fn test_begin_live_duplicate_is_rejected() {
        let mut t = tracker();
        t.begin(sid("s1")).unwrap();
        let err = t.begin(sid("s1")).unwrap_err();
        assert!(matches!(err, TrackerError::AlreadyOpen(id) if id == sid("s1")));
        assert_eq!(t.stats().violations, 1);
    }

    #[test]
    fn test_begin_reuses_ended_id() {
        let mut t = tracker();
        t.begin(sid("s1")).unwrap();
        t.advance(&sid("s1"), FrameKind::Done).unwrap();

        t.begin(sid("s1")).unwrap();
        assert_eq!(t.state(&sid("s1")), Some(StreamState::Initiated));
    }

    #[test]
    fn test_begin_respects_limit() {
        let mut t = StreamTracker::new(StreamConfig {
            max_open_streams: 1,
            ..StreamConfig::default()
        });
        t.begin(sid("a")).unwrap();
        let err = t.begin(sid("b")).unwrap_err();
        assert!(matches!(err, TrackerError::TooManyStreams { limit: 1 }));

        // Ending the first frees the slot.
        t.advance(&sid("a"), FrameKind::Abort).unwrap();
        t.begin(sid("b")).unwrap();
    }

    // =====================================================================
    // advance()
    // =====================================================================

    #[test]
    fn test_advance_counts_data_frames() {
        let mut t = tracker();
        t.begin(sid("s1")).unwrap();
        t.advance(&sid("s1"), FrameKind::Data).unwrap();
        let state = t.advance(&sid("s1"), FrameKind::Data).unwrap();
        assert_eq!(state, StreamState::Open { frames: 2 });
    }

    #[test]
    fn test_advance_terminal_updates_stats() {
        let mut t = tracker();
        for (name, frame) in [
            ("a", FrameKind::Done),
            ("b", FrameKind::Error(ErrorCode::RpcTimeout)),
            ("c", FrameKind::Abort),
        ] {
            t.begin(sid(name)).unwrap();
            t.advance(&sid(name), frame).unwrap();
        }
        let stats = t.stats();
        assert_eq!((stats.completed, stats.failed, stats.aborted), (1, 1, 1));
        assert_eq!(stats.violations, 0);
        assert_eq!(t.open_count(), 0);
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn test_advance_after_terminal_is_violation() {
        let mut t = tracker();
        t.begin(sid("s1")).unwrap();
        t.advance(&sid("s1"), FrameKind::Done).unwrap();

        let err = t.advance(&sid("s1"), FrameKind::Data).unwrap_err();
        assert!(matches!(
            err,
            TrackerError::AfterTerminal { state: StreamState::Completed, .. }
        ));
        // The stream stays where it ended.
        assert_eq!(t.state(&sid("s1")), Some(StreamState::Completed));
        assert_eq!(t.stats().violations, 1);
        assert_eq!(t.stats().completed, 1);
    }

    #[test]
    fn test_advance_unknown_stream_strict() {
        let mut t = tracker();
        let err = t.advance(&sid("ghost"), FrameKind::Data).unwrap_err();
        assert!(matches!(err, TrackerError::UnknownStream(_)));
        assert!(t.is_empty());
    }

    #[test]
    fn test_advance_unknown_stream_lenient_starts_it() {
        let mut t = lenient();
        let state = t.advance(&sid("s9"), FrameKind::Data).unwrap();
        assert_eq!(state, StreamState::Open { frames: 1 });
    }

    // =====================================================================
    // observe()
    // =====================================================================

    #[test]
    fn test_observe_stream_request_uses_stream_id() {
        let mut t = tracker();
        let req = builders::stream_request("tail", json!({}), 1)
            .with_stream_id("tail-1");
        let state = t.observe(&Message::from(req)).unwrap();
        assert_eq!(state, Some(StreamState::Initiated));
        assert_eq!(t.state(&sid("tail-1")), Some(StreamState::Initiated));
        assert_eq!(t.state(&Id::from(1)), None);
    }

    #[test]
    fn test_observe_abort_request_does_not_start() {
        let mut t = tracker();
        let abort = builders::abort_request("tail", "s1");
        assert_eq!(t.observe(&Message::from(abort)).unwrap(), None);
        assert!(t.is_empty());
    }

    #[test]
    fn test_observe_frames_in_order() {
        let mut t = tracker();
        t.observe(&Message::from(builders::stream_request("tail", json!({}), "s1")))
            .unwrap();
        t.observe(&Message::from(builders::stream_data(json!(1), "s1")))
            .unwrap();
        let state = t
            .observe(&Message::from(builders::stream_error(
                ErrorContext::timeout(),
                "s1",
            )))
            .unwrap();
        assert_eq!(
            state,
            Some(StreamState::Failed { code: ErrorCode::RpcTimeout })
        );
    }

    #[test]
    fn test_observe_ignores_non_stream_envelopes() {
        let mut t = tracker();
        let msg: Message = builders::response(json!(1), 1).into();
        assert_eq!(t.observe(&msg).unwrap(), None);
    }

    // =====================================================================
    // cleanup
    // =====================================================================

    #[test]
    fn test_cleanup_terminal_keeps_live_streams() {
        let mut t = tracker();
        t.begin(sid("live")).unwrap();
        t.begin(sid("done")).unwrap();
        t.advance(&sid("done"), FrameKind::Done).unwrap();

        assert_eq!(t.cleanup_terminal(), 1);
        assert_eq!(t.len(), 1);
        assert!(t.state(&sid("live")).is_some());
    }

    #[test]
    fn test_oldest_ended_streams_are_evicted() {
        let mut t = StreamTracker::new(StreamConfig {
            max_ended_streams: 2,
            ..StreamConfig::default()
        });
        t.begin(sid("live")).unwrap();
        for name in ["a", "b", "c"] {
            t.begin(sid(name)).unwrap();
            t.advance(&sid(name), FrameKind::Done).unwrap();
        }

        assert_eq!(t.len(), 3);
        assert_eq!(t.state(&sid("a")), None);
        assert_eq!(t.state(&sid("b")), Some(StreamState::Completed));
        assert_eq!(t.state(&sid("live")), Some(StreamState::Initiated));
        assert_eq!(t.stats().completed, 3);
    }

    #[test]
    fn test_reused_id_is_not_evicted_early() {
        let mut t = StreamTracker::new(StreamConfig {
            max_ended_streams: 1,
            ..StreamConfig::default()
        });
        t.begin(sid("s1")).unwrap();
        t.advance(&sid("s1"), FrameKind::Done).unwrap();
        t.begin(sid("s1")).unwrap();

        // Ending another stream must not drop the live reuse of "s1".
        t.begin(sid("s2")).unwrap();
        t.advance(&sid("s2"), FrameKind::Abort).unwrap();
        assert_eq!(t.state(&sid("s1")), Some(StreamState::Initiated));
    }

    // =====================================================================
    // prepare() / commit()
    // =====================================================================

    #[test]
    fn test_prepare_changes_nothing_until_commit() {
        let mut t = tracker();
        t.begin(sid("s1")).unwrap();

        let done: Message = builders::stream_done(json!(1), "s1").into();
        let step = t.prepare(&done).unwrap().unwrap();
        assert_eq!(step.state(), StreamState::Completed);
        assert_eq!(t.state(&sid("s1")), Some(StreamState::Initiated));
        assert_eq!(t.stats().completed, 0);

        assert_eq!(t.commit(step), StreamState::Completed);
        assert_eq!(t.state(&sid("s1")), Some(StreamState::Completed));
        assert_eq!(t.stats().completed, 1);
    }

    #[test]
    fn test_dropped_transition_leaves_stream_usable() {
        let mut t = tracker();
        t.begin(sid("s1")).unwrap();

        let done: Message = builders::stream_done(json!(1), "s1").into();
        drop(t.prepare(&done).unwrap());

        let err: Message =
            builders::stream_error(ErrorContext::timeout(), "s1").into();
        assert!(matches!(
            t.observe(&err).unwrap(),
            Some(StreamState::Failed { .. })
        ));
    }

    #[test]
    fn test_prepare_counts_violations() {
        let mut t = tracker();
        let data: Message = builders::stream_data(json!(1), "ghost").into();
        assert!(t.prepare(&data).is_err());
        assert_eq!(t.stats().violations, 1);
        assert!(t.is_empty());
    }

    #[test]
    fn test_forget_removes_any_state() {
        let mut t = tracker();
        t.begin(sid("s1")).unwrap();
        assert_eq!(t.forget(&sid("s1")), Some(StreamState::Initiated));
        assert_eq!(t.forget(&sid("s1")), None);
    }
}
