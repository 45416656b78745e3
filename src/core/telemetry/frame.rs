//! Newline framing for the raw serial byte stream.

/// Reassembles newline-delimited frames from arbitrarily fragmented reads.
///
/// Splitting happens on raw bytes and each completed line is decoded lossily,
/// so a multi-byte character cut across two reads is still decoded intact.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completes.
    ///
    /// All complete lines are drained before returning; only a trailing partial
    /// line stays buffered. Lines are trimmed and blank lines are dropped.
    pub fn feed(&mut self, chunk: &[u8]) -> impl Iterator<Item = String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            let line = String::from_utf8_lossy(&self.buffer[start..end]);
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
            start = end + 1;
        }
        self.buffer.drain(..start);

        lines.into_iter()
    }

    /// Bytes of the incomplete trailing line still waiting for a terminator.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
