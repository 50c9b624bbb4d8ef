//! Byte chunk to line framing.

/// Splits an arbitrary sequence of byte chunks into complete lines.
///
/// Bytes after the last `\n` are held back until a later chunk terminates
/// them. Lines are decoded as lossy UTF-8 only once complete, so multi-byte
/// characters split across chunks survive. A trailing `\r` is stripped.
#[derive(Debug, Default)]
pub struct LineAssembler {
    pending: Vec<u8>,
}

impl LineAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completes, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.pending.extend_from_slice(&rest[..pos]);
            if self.pending.last() == Some(&b'\r') {
                self.pending.pop();
            }
            lines.push(String::from_utf8_lossy(&self.pending).into_owned());
            self.pending.clear();
            rest = &rest[pos + 1..];
        }
        self.pending.extend_from_slice(rest);

        lines
    }

    /// Bytes read but not yet terminated by a newline.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Discard the pending fragment.
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}
