//! Line framing for the sensor byte stream

/// Longest accepted line in bytes; anything longer is treated as noise
pub const MAX_LINE_LEN: usize = 256;

/// Accumulates raw bytes and yields newline-terminated lines
///
/// Bytes are kept until a `\n` arrives. A pending partial line that grows
/// past [`MAX_LINE_LEN`] is discarded so a device spewing garbage without
/// newlines cannot grow memory without bound.
#[derive(Debug, Default)]
pub struct LineFramer {
    pending: Vec<u8>,
    overflows: u64,
}

impl LineFramer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed received bytes
    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);

        if self.pending.len() > MAX_LINE_LEN && !self.pending.contains(&b'\n') {
            tracing::warn!(
                "Discarding {} bytes of unterminated input",
                self.pending.len()
            );
            self.pending.clear();
            self.overflows += 1;
        }
    }

    /// Take the next complete line, if any
    ///
    /// Invalid UTF-8 is replaced rather than rejected; the decode step will
    /// discard such a line as malformed.
    pub fn next_line(&mut self) -> Option<String> {
        let newline = self.pending.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=newline).collect();
        let text = String::from_utf8_lossy(&raw[..newline]);
        Some(text.trim().to_string())
    }

    /// Whether a complete line is waiting
    pub fn has_line(&self) -> bool {
        self.pending.contains(&b'\n')
    }

    /// Number of bytes waiting for a terminator
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of partial lines discarded so far
    pub fn overflows(&self) -> u64 {
        self.overflows
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
