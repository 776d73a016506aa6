//! Stream framer: forwards wire frames untouched while recording them
//!
//! State transitions:
//! - IDLE → STREAMING: first frame forwarded (time-to-first-frame recorded)
//! - STREAMING → COMPLETED: source exhausted, or the output stream dropped
//!   (client disconnect)
//!
//! Completion is signalled exactly once through a watch channel; loggers
//! await it without ever sitting between the source and the client.

use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::types::{ParsedFrame, StreamState};

#[derive(Debug, Default)]
struct FrameRecord {
    first: Option<String>,
    last: Option<String>,
    count: usize,
    time_to_first: Option<Duration>,
    total: Option<Duration>,
}

#[derive(Debug)]
struct FramerShared {
    started: Instant,
    record: Mutex<FrameRecord>,
    state: watch::Sender<StreamState>,
}

impl FramerShared {
    fn record(&self) -> MutexGuard<'_, FrameRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn observe(&self, frame: &str) {
        let mut record = self.record();
        record.count += 1;
        if record.first.is_none() {
            record.first = Some(frame.to_string());
            record.time_to_first = Some(self.started.elapsed());
            drop(record);
            self.state.send_if_modified(|state| {
                if *state == StreamState::Idle {
                    *state = StreamState::Streaming;
                    true
                } else {
                    false
                }
            });
        } else {
            record.last = Some(frame.to_string());
        }
    }

    fn complete(&self) {
        let mut record = self.record();
        if record.total.is_some() {
            return;
        }
        // A single frame has no first-vs-rest distinction
        if record.count == 1 {
            record.time_to_first = None;
        }
        record.total = Some(self.started.elapsed());
        drop(record);
        self.state.send_replace(StreamState::Completed);
    }
}

/// Completes the framer when the wrapped stream is exhausted or dropped
struct CompletionGuard(Arc<FramerShared>);

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.0.complete();
    }
}

/// Records first/last frame and timings of one response stream
#[derive(Debug, Clone)]
pub struct StreamFramer {
    shared: Arc<FramerShared>,
}

impl Default for StreamFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamFramer {
    /// Framer timed from now
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Framer timed from the start of the request
    pub fn starting_at(started: Instant) -> Self {
        let (state, _) = watch::channel(StreamState::Idle);
        Self {
            shared: Arc::new(FramerShared {
                started,
                record: Mutex::new(FrameRecord::default()),
                state,
            }),
        }
    }

    /// Wrap a source of wire frames. Frames are forwarded as soon as they
    /// arrive; dropping the returned stream completes the framer.
    pub fn wrap<S>(&self, source: S) -> impl Stream<Item = Result<String, Infallible>> + Send + 'static
    where
        S: Stream<Item = String> + Send + 'static,
    {
        let shared = self.shared.clone();
        let guard = CompletionGuard(self.shared.clone());

        async_stream::stream! {
            let _guard = guard;
            let mut source = Box::pin(source);
            while let Some(frame) = source.next().await {
                shared.observe(&frame);
                yield Ok::<String, Infallible>(frame);
            }
        }
    }

    pub fn state(&self) -> StreamState {
        *self.shared.state.borrow()
    }

    pub fn frame_count(&self) -> usize {
        self.shared.record().count
    }

    /// First frame, parsed; None if absent or malformed
    pub fn first_frame(&self) -> Option<ParsedFrame> {
        let raw = self.shared.record().first.clone()?;
        parse_frame(&raw)
    }

    /// Last frame after the first, parsed; None for one-frame streams
    pub fn last_frame(&self) -> Option<ParsedFrame> {
        let raw = self.shared.record().last.clone()?;
        parse_frame(&raw)
    }

    /// Latency to the first frame; invalidated for one-frame streams
    pub fn time_to_first_frame(&self) -> Option<Duration> {
        self.shared.record().time_to_first
    }

    /// Total stream duration, known once completed
    pub fn elapsed(&self) -> Option<Duration> {
        self.shared.record().total
    }

    /// Resolves once the stream has completed
    pub async fn completed(&self) {
        let mut rx = self.shared.state.subscribe();
        // The sender lives in `shared`, which we hold, so this cannot fail
        let _ = rx.wait_for(|state| *state == StreamState::Completed).await;
    }

    /// Wait for completion, giving up after `timeout`
    pub async fn completed_within(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.completed()).await.is_ok()
    }
}

/// Parse an `event: <type>\ndata: <json>` frame. Malformed frames are
/// logged and yield None.
pub fn parse_frame(raw: &str) -> Option<ParsedFrame> {
    let mut event = None;
    let mut data = None;
    for line in raw.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data = Some(rest.trim());
        }
    }

    let (Some(event), Some(data)) = (event, data) else {
        warn!(frame = raw, "frame missing event or data line");
        return None;
    };
    match serde_json::from_str(data) {
        Ok(data) => Some(ParsedFrame { event, data }),
        Err(e) => {
            warn!(frame = raw, error = %e, "frame data is not valid JSON");
            None
        }
    }
}

/// What gets logged for a finished response stream
#[derive(Debug, Clone, Serialize)]
pub struct StreamLog {
    pub request_id: String,
    pub completed: bool,
    pub frame_count: usize,
    pub first_event: Option<String>,
    pub last_frame: Option<serde_json::Value>,
    pub time_to_first_ms: Option<u128>,
    pub total_ms: Option<u128>,
}

/// Await stream completion (bounded by `timeout`) and log the response
pub async fn log_completion(framer: StreamFramer, request_id: String, timeout: Duration) -> StreamLog {
    let completed = framer.completed_within(timeout).await;
    let log = StreamLog {
        request_id,
        completed,
        frame_count: framer.frame_count(),
        first_event: framer.first_frame().map(|f| f.event),
        last_frame: framer.last_frame().map(|f| f.data),
        time_to_first_ms: framer.time_to_first_frame().map(|d| d.as_millis()),
        total_ms: framer.elapsed().map(|d| d.as_millis()),
    };

    if completed {
        info!(
            request_id = %log.request_id,
            frames = log.frame_count,
            first_event = ?log.first_event,
            time_to_first_ms = ?log.time_to_first_ms,
            total_ms = ?log.total_ms,
            "response stream complete"
        );
    } else {
        warn!(request_id = %log.request_id, timeout_ms = timeout.as_millis() as u64, "gave up waiting for response stream");
    }
    log
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn frame(event: &str, data: &str) -> String {
        format!("event: {}\ndata: {}\n\n", event, data)
    }

    #[tokio::test]
    async fn test_multi_frame_stream() {
        let framer = StreamFramer::new();
        assert_eq!(framer.state(), StreamState::Idle);

        let frames = vec![
            frame("assessment", r#"{"overall_passed": false}"#),
            frame("remediation", r#"{"text_increment": "What"}"#),
            frame("remediation", r#"{"text_increment": " else?"}"#),
        ];
        let out: Vec<String> = framer
            .wrap(stream::iter(frames.clone()))
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(out, frames);
        assert_eq!(framer.state(), StreamState::Completed);
        assert_eq!(framer.frame_count(), 3);
        assert_eq!(framer.first_frame().unwrap().event, "assessment");
        assert_eq!(framer.last_frame().unwrap().data["text_increment"], " else?");
        assert!(framer.time_to_first_frame().is_some());
        assert!(framer.elapsed().is_some());
    }

    #[tokio::test]
    async fn test_single_frame_invalidates_time_to_first() {
        let framer = StreamFramer::new();
        let _: Vec<_> = framer
            .wrap(stream::iter(vec![frame("assessment", "{}")]))
            .collect()
            .await;

        assert!(framer.first_frame().is_some());
        assert!(framer.last_frame().is_none());
        assert!(framer.time_to_first_frame().is_none());
        assert!(framer.elapsed().is_some());
    }

    #[tokio::test]
    async fn test_dropping_stream_still_completes() {
        let framer = StreamFramer::new();
        let waiter = {
            let framer = framer.clone();
            tokio::spawn(async move { framer.completed().await })
        };

        let mut wrapped = Box::pin(framer.wrap(stream::iter(vec![
            frame("assessment", "{}"),
            frame("remediation", "{}"),
        ])));
        wrapped.next().await;
        assert_eq!(framer.state(), StreamState::Streaming);
        drop(wrapped);

        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert_eq!(framer.state(), StreamState::Completed);
    }

    #[tokio::test]
    async fn test_unpolled_stream_completes_on_drop() {
        let framer = StreamFramer::new();
        drop(framer.wrap(stream::iter(Vec::<String>::new())));
        assert!(framer.completed_within(Duration::from_millis(50)).await);
    }

    #[tokio::test]
    async fn test_logger_waits_for_completion_without_blocking_frames() {
        let framer = StreamFramer::new();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        let source = tokio_stream_from(rx);
        let mut wrapped = Box::pin(framer.wrap(source));
        let logger = tokio::spawn(log_completion(framer.clone(), "req-1".into(), Duration::from_secs(5)));

        tx.send(frame("assessment", "{}")).unwrap();
        assert!(wrapped.next().await.is_some());
        tx.send(frame("remediation", r#"{"text_increment": "Why?"}"#)).unwrap();
        assert!(wrapped.next().await.is_some());
        assert!(!logger.is_finished());

        drop(tx);
        assert!(wrapped.next().await.is_none());

        let log = logger.await.unwrap();
        assert!(log.completed);
        assert_eq!(log.frame_count, 2);
        assert_eq!(log.first_event.as_deref(), Some("assessment"));
        assert_eq!(log.last_frame.unwrap()["text_increment"], "Why?");
    }

    #[tokio::test]
    async fn test_logger_times_out_on_abandoned_stream() {
        let framer = StreamFramer::new();
        let _wrapped = framer.wrap(stream::pending::<String>());
        let log = log_completion(framer.clone(), "req-2".into(), Duration::from_millis(20)).await;
        assert!(!log.completed);
        assert_eq!(log.frame_count, 0);
    }

    #[test]
    fn test_malformed_frames_yield_none() {
        assert!(parse_frame("garbage").is_none());
        assert!(parse_frame("event: remediation\ndata: {not json\n\n").is_none());
        let ok = parse_frame("event: assessment\ndata: {\"a\": 1}\n\n").unwrap();
        assert_eq!(ok.event, "assessment");
        assert_eq!(ok.data["a"], 1);
    }

    fn tokio_stream_from(
        mut rx: tokio::sync::mpsc::UnboundedReceiver<String>,
    ) -> impl Stream<Item = String> + Send + 'static {
        async_stream::stream! {
            while let Some(item) = rx.recv().await {
                yield item;
            }
        }
    }
}
