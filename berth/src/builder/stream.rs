//! Line framing for chunked process output
//!
//! Child process pipes deliver arbitrary byte chunks; the relay transports
//! whole lines. The framer buffers the unterminated tail across chunks so a
//! line split mid-way is reassembled before publishing.

/// Incremental splitter turning byte chunks into complete lines
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, get every line completed by it. Trailing `\r` is
    /// stripped; invalid UTF-8 is replaced, never dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop(); // the newline itself
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Take the unterminated tail, if any. Called once the stream ends.
    pub fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let tail = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        Some(tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_lines() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.push(b"one\ntwo\n"), vec!["one", "two"]);
        assert_eq!(framer.flush(), None);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut framer = LineFramer::new();
        assert!(framer.push(b"npm WARN dep").is_empty());
        assert_eq!(framer.push(b"recated left-pad\n"), vec!["npm WARN deprecated left-pad"]);
    }

    #[test]
    fn test_multiple_lines_in_one_chunk() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"a\nb\nc\npartial");
        assert_eq!(lines, vec!["a", "b", "c"]);
        assert_eq!(framer.flush(), Some("partial".to_string()));
    }

    #[test]
    fn test_crlf_stripped() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.push(b"windows\r\n"), vec!["windows"]);
    }

    #[test]
    fn test_flush_is_terminal() {
        let mut framer = LineFramer::new();
        framer.push(b"tail without newline");
        assert!(framer.flush().is_some());
        assert_eq!(framer.flush(), None);
    }

    #[test]
    fn test_invalid_utf8_replaced() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"ok \xff\xfe bytes\n");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ok "));
    }
}
