use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::source::{ByteSource, DEFAULT_POLL_INTERVAL};
use crate::error::{MonitorError, Result};

pub struct ScriptedChunk {
    response: Result<Vec<u8>>,
    delay: Option<Duration>,
}

impl ScriptedChunk {
    pub fn bytes<B: Into<Vec<u8>>>(bytes: B) -> Self {
        Self {
            response: Ok(bytes.into()),
            delay: None,
        }
    }

    pub fn with_delay<B: Into<Vec<u8>>>(bytes: B, delay: Duration) -> Self {
        Self {
            response: Ok(bytes.into()),
            delay: Some(delay),
        }
    }

    pub fn failure<S: Into<String>>(reason: S) -> Self {
        Self {
            response: Err(MonitorError::transport(reason)),
            delay: None,
        }
    }
}

impl From<&str> for ScriptedChunk {
    fn from(text: &str) -> Self {
        Self::bytes(text.as_bytes())
    }
}

/// In-memory byte source used in tests and demos to script reads.
///
/// Each scripted chunk is handed out by one or more `read_chunk` calls
/// (split when the caller's buffer is smaller). Once the script runs dry the
/// source behaves like an idle port: every read times out with `Ok(0)`.
pub struct ScriptedSource {
    script: VecDeque<ScriptedChunk>,
    current: VecDeque<u8>,
    idle: Duration,
    closed: Arc<AtomicBool>,
}

impl ScriptedSource {
    pub fn new<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ScriptedChunk>,
    {
        Self::with_script(chunks.into_iter().map(Into::into).collect())
    }

    pub fn with_script(script: Vec<ScriptedChunk>) -> Self {
        Self {
            script: script.into(),
            current: VecDeque::new(),
            idle: DEFAULT_POLL_INTERVAL,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// How long an idle read waits before reporting a timeout.
    pub fn idle_timeout(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }

    /// Flag that flips to `true` once the reader closes the source.
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }

    fn drain_current(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.current.len());
        for (slot, byte) in buf.iter_mut().zip(self.current.drain(..n)) {
            *slot = byte;
        }
        n
    }
}

impl ByteSource for ScriptedSource {
    fn bytes_available(&mut self) -> Result<usize> {
        if !self.current.is_empty() {
            return Ok(self.current.len());
        }
        Ok(match self.script.front() {
            Some(ScriptedChunk {
                response: Ok(bytes),
                delay: None,
            }) => bytes.len(),
            _ => 0,
        })
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.current.is_empty() {
            return Ok(self.drain_current(buf));
        }

        match self.script.pop_front() {
            Some(entry) => {
                if let Some(delay) = entry.delay {
                    std::thread::sleep(delay);
                }
                self.current.extend(entry.response?);
                Ok(self.drain_current(buf))
            }
            None => {
                std::thread::sleep(self.idle);
                Ok(0)
            }
        }
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
