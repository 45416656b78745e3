//! Producer side of a telemetry session.
//!
//! A [`StreamReader`] owns one byte source on a dedicated thread, frames and
//! classifies what it reads and pushes [`Notification`]s to a consumer. It
//! never shares mutable state with the consumer: the frame buffer and the
//! transport handle live and die on the reader thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde::Serialize;
use tokio::sync::mpsc;

use super::frame::FrameDecoder;
use super::message::{classify, Message, TelemetrySample};
use super::source::{ByteSource, SerialSource};
use crate::core::config::ConnectionConfig;
use crate::error::{MonitorError, Result};

/// Upper bound on a single read request.
pub const READ_CHUNK_SIZE: usize = 4096;

/// Events delivered to the consumer, in the order frames were decoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Notification {
    Data(TelemetrySample),
    /// Device-reported error frame, already formatted for display.
    ProtocolError(String),
    /// The transport failed; this is the last notification of the session.
    TransportError(String),
}

/// One-way notification interface towards the consumer.
///
/// `notify` returns `false` once the consumer has gone away, which ends the
/// session quietly.
pub trait NotificationSink: Send + 'static {
    fn notify(&self, notification: Notification) -> bool;

    fn on_data(&self, sample: TelemetrySample) -> bool {
        self.notify(Notification::Data(sample))
    }

    fn on_protocol_error(&self, text: String) -> bool {
        self.notify(Notification::ProtocolError(text))
    }

    fn on_transport_error(&self, text: String) -> bool {
        self.notify(Notification::TransportError(text))
    }
}

impl NotificationSink for mpsc::UnboundedSender<Notification> {
    fn notify(&self, notification: Notification) -> bool {
        self.send(notification).is_ok()
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// `stop()` was observed.
    Stopped,
    /// The source failed and a transport error was reported.
    TransportFailed,
    /// The consumer dropped its receiver.
    ConsumerGone,
}

/// Cloneable handle that requests a cooperative stop.
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

pub struct StreamReader {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<SessionEnd>>,
}

impl StreamReader {
    /// Start reading `source` on a background thread.
    pub fn start<S, N>(source: S, sink: N) -> Result<Self>
    where
        S: ByteSource + 'static,
        N: NotificationSink,
    {
        Self::spawn(move |running| run_session(source, &sink, &running))
    }

    /// Open the serial port described by `config` and start reading it.
    ///
    /// Opening happens on the reader thread; a port that cannot be opened is
    /// reported as a transport error notification like any other I/O failure.
    pub fn start_serial<N>(config: ConnectionConfig, sink: N) -> Result<Self>
    where
        N: NotificationSink,
    {
        Self::spawn(move |running| match SerialSource::open(&config) {
            Ok(source) => run_session(source, &sink, &running),
            Err(e) => report_failure(&sink, e),
        })
    }

    fn spawn<F>(session: F) -> Result<Self>
    where
        F: FnOnce(Arc<AtomicBool>) -> SessionEnd + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let thread_flag = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("telemetry-reader".to_string())
            .spawn(move || session(thread_flag))?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Request cancellation. The loop exits within one read timeout.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
        }
    }

    /// Whether the reader thread is still alive.
    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Wait for the session to end on its own (or after `stop`).
    pub fn join(mut self) -> Result<SessionEnd> {
        self.join_thread()
    }

    /// Stop and wait for the reader thread.
    pub fn shutdown(mut self) -> Result<SessionEnd> {
        self.stop();
        self.join_thread()
    }

    fn join_thread(&mut self) -> Result<SessionEnd> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| MonitorError::other("Telemetry reader thread panicked")),
            None => Ok(SessionEnd::Stopped),
        }
    }
}

impl Drop for StreamReader {
    fn drop(&mut self) {
        self.stop();
        if let Err(e) = self.join_thread() {
            log::error!("{}", e);
        }
    }
}

/// The read loop. Runs until stopped, the source fails or the consumer leaves.
pub fn run_session<S, N>(mut source: S, sink: &N, running: &AtomicBool) -> SessionEnd
where
    S: ByteSource,
    N: NotificationSink + ?Sized,
{
    log::info!("Telemetry session started");

    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    let end = 'session: loop {
        if !running.load(Ordering::Acquire) {
            break SessionEnd::Stopped;
        }

        let want = match source.bytes_available() {
            Ok(available) => available.clamp(1, READ_CHUNK_SIZE),
            Err(e) => break report_failure(sink, e),
        };

        let read = match source.read_chunk(&mut buf[..want]) {
            Ok(0) => continue,
            Ok(n) => n,
            Err(e) => break report_failure(sink, e),
        };

        for line in decoder.feed(&buf[..read]) {
            let delivered = match classify(&line) {
                Some(Message::Error(error)) => sink.on_protocol_error(error.to_string()),
                Some(Message::Telemetry(sample)) => sink.on_data(sample),
                None => {
                    log::trace!("Discarding unrecognised frame: {}", line);
                    true
                }
            };

            if !delivered {
                break 'session SessionEnd::ConsumerGone;
            }
        }
    };

    if decoder.pending() > 0 {
        log::debug!("Dropping {} bytes of unterminated frame", decoder.pending());
    }
    source.close();
    log::info!("Telemetry session ended: {:?}", end);
    end
}

fn report_failure<N>(sink: &N, error: MonitorError) -> SessionEnd
where
    N: NotificationSink + ?Sized,
{
    log::error!("Telemetry transport failed: {}", error);
    sink.on_transport_error(error.to_string());
    SessionEnd::TransportFailed
}
