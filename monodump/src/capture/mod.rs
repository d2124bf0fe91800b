//! # Capture coordination
//!
//! Supervises one live heap-dump capture:
//!
//! ```text
//! Idle → Started → AwaitingDumpStart → Streaming → AwaitingDumpStop → Finished
//! ```
//!
//! A single background task pulls records off the [`TraceChannel`], decodes
//! them, and dispatches to the graph builder and root tracker in strict
//! arrival order — no other task touches those buffers, so no locking.
//! The foreground only observes completion signals: a oneshot for the
//! heap-dump-start acknowledgment (raced against a 5 s timeout) and the
//! task's join handle for dump stop or an external stop request (a watch
//! channel propagated into the decode loop). The task is always joined
//! before phase-2 assembly runs, so assembly never sees partially-drained
//! state.

pub mod channel;

pub use channel::{EventRecord, FileChannel, SocketChannel, TraceChannel};

use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::domain::{CaptureError, ChannelError};
use crate::graph::{MemoryGraph, MemoryGraphBuilder, ModuleMap};
use crate::parser::{self, MonoProfilerEvent, RefStride};
use crate::roots::RootRangeTracker;

/// How long to wait for the runtime to acknowledge the heap dump.
pub const DUMP_START_TIMEOUT: Duration = Duration::from_secs(5);

/// Knobs for one capture.
#[derive(Debug, Clone, Copy)]
pub struct CaptureConfig {
    /// Stride of the object-reference variable section; pinned to the
    /// protocol version of the producer.
    pub stride: RefStride,
    pub dump_start_timeout: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { stride: RefStride::Full12, dump_start_timeout: DUMP_START_TIMEOUT }
    }
}

/// Caller-side trigger for an external stop request (interactive use,
/// Ctrl+C). Cloneable; requesting a stop twice is harmless.
#[derive(Debug, Clone)]
pub struct StopHandle(watch::Sender<bool>);

impl StopHandle {
    pub fn request_stop(&self) {
        // Receiver gone means the decode task already finished.
        let _ = self.0.send(true);
    }
}

/// What a finished capture hands back.
#[derive(Debug)]
pub struct CaptureOutcome {
    pub graph: MemoryGraph,
    /// Returned so interactive sessions can carry root identity into the
    /// next capture.
    pub tracker: RootRangeTracker,
    /// The channel failed to stop cleanly; the graph was still assembled
    /// from the data buffered up to that point.
    pub stop_failure: Option<ChannelError>,
    /// The stream broke mid-capture; same best-effort policy.
    pub stream_failure: Option<ChannelError>,
}

/// Everything the decode task owns, handed back at join time.
struct DrainResult {
    builder: MemoryGraphBuilder,
    tracker: RootRangeTracker,
    stop_failure: Option<ChannelError>,
    stream_failure: Option<ChannelError>,
}

/// An in-flight capture session.
pub struct CaptureCoordinator {
    task: JoinHandle<DrainResult>,
    dump_start_rx: oneshot::Receiver<()>,
    stop_tx: watch::Sender<bool>,
    config: CaptureConfig,
}

impl CaptureCoordinator {
    /// Attach the decoder and correlator to `channel` and start the
    /// background decode task. `tracker` may carry registrations from a
    /// previous capture in the same interactive session.
    #[must_use]
    pub fn start<C: TraceChannel>(
        channel: C,
        tracker: RootRangeTracker,
        config: CaptureConfig,
    ) -> Self {
        let (dump_start_tx, dump_start_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        info!("capture started; awaiting heap-dump start acknowledgment");
        let task = tokio::spawn(decode_loop(
            channel,
            MemoryGraphBuilder::new(),
            tracker,
            config.stride,
            dump_start_tx,
            stop_rx,
        ));
        Self { task, dump_start_rx, stop_tx, config }
    }

    /// Handle for requesting an external stop while the capture runs.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.stop_tx.clone())
    }

    /// Drive the capture to completion and assemble the graph.
    ///
    /// # Errors
    ///
    /// [`CaptureError::Timeout`] if the heap-dump start acknowledgment
    /// does not arrive in time (the channel is asked to stop first), or
    /// [`CaptureError::DecodeTask`] if the background task panicked.
    pub async fn wait(self, modules: &ModuleMap) -> Result<CaptureOutcome, CaptureError> {
        let Self { task, dump_start_rx, stop_tx, config } = self;

        match timeout(config.dump_start_timeout, dump_start_rx).await {
            Ok(Ok(())) => info!("heap-dump start acknowledged; streaming"),
            Ok(Err(_)) => {
                // Task ended before the acknowledgment: stream end or a
                // transport failure. Join below and make the best of the
                // buffered data.
                warn!("stream ended before heap-dump start acknowledgment");
            }
            Err(_) => {
                // Stop the session before surfacing the timeout, and join
                // the task so nothing keeps pulling from the channel.
                warn!(
                    "no heap-dump start acknowledgment within {:?}; stopping session",
                    config.dump_start_timeout
                );
                let _ = stop_tx.send(true);
                let _ = task.await;
                return Err(CaptureError::Timeout(config.dump_start_timeout));
            }
        }

        let drained = task.await.map_err(|e| CaptureError::DecodeTask(e.to_string()))?;
        if let Some(ref err) = drained.stop_failure {
            warn!("trace channel failed to stop cleanly: {err}");
        }
        if let Some(ref err) = drained.stream_failure {
            warn!("trace stream failed mid-capture: {err}");
        }

        info!("stream drained ({} object records); assembling graph", drained.builder.object_count());
        let graph = drained.builder.build(&drained.tracker, modules);
        info!("graph assembled: {} nodes, {} types", graph.node_count(), graph.type_count());
        Ok(CaptureOutcome {
            graph,
            tracker: drained.tracker,
            stop_failure: drained.stop_failure,
            stream_failure: drained.stream_failure,
        })
    }
}

/// Run one capture start-to-finish. Convenience wrapper for callers that
/// need no external stop trigger.
///
/// # Errors
///
/// See [`CaptureCoordinator::wait`].
pub async fn capture<C: TraceChannel>(
    channel: C,
    tracker: RootRangeTracker,
    modules: &ModuleMap,
    config: CaptureConfig,
) -> Result<CaptureOutcome, CaptureError> {
    CaptureCoordinator::start(channel, tracker, config).wait(modules).await
}

/// The background decode task: sequential, in-order decode and dispatch
/// until dump stop, stream end, or an external stop request.
async fn decode_loop<C: TraceChannel>(
    mut channel: C,
    mut builder: MemoryGraphBuilder,
    mut tracker: RootRangeTracker,
    stride: RefStride,
    dump_start_tx: oneshot::Sender<()>,
    mut stop_rx: watch::Receiver<bool>,
) -> DrainResult {
    let mut dump_start_tx = Some(dump_start_tx);
    let mut stream_failure = None;

    loop {
        tokio::select! {
            changed = stop_rx.changed() => {
                // A dropped sender means the session was abandoned; treat
                // it like a stop request rather than spinning.
                if changed.is_err() || *stop_rx.borrow() {
                    info!("external stop requested");
                    break;
                }
            }
            next = channel.next_event() => match next {
                Ok(Some(record)) => {
                    match parser::decode(record.event_id, &record.payload, stride) {
                        Ok(Some(event)) => {
                            if matches!(event, MonoProfilerEvent::HeapDumpStart) {
                                if let Some(tx) = dump_start_tx.take() {
                                    let _ = tx.send(());
                                }
                            }
                            let dump_stopped = matches!(event, MonoProfilerEvent::HeapDumpStop);
                            builder.observe(event, &mut tracker);
                            if dump_stopped {
                                debug!("heap-dump stop observed");
                                break;
                            }
                        }
                        Ok(None) => debug!("skipping unsubscribed event id {}", record.event_id),
                        // A single bad record never aborts the capture.
                        Err(e) => warn!("dropping malformed event: {e}"),
                    }
                }
                Ok(None) => {
                    debug!("trace stream ended");
                    break;
                }
                Err(e) => {
                    stream_failure = Some(e);
                    break;
                }
            }
        }
    }

    let stop_failure = channel.stop().await.err();
    DrainResult { builder, tracker, stop_failure, stream_failure }
}
