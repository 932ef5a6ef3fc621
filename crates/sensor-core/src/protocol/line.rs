//! CRLF line framing for the raw serial byte stream.
//!
//! A serial port is a *stream*: one `read()` may return half a line, or three
//! lines and the start of a fourth.  [`LineFramer`] accumulates bytes and
//! hands out complete lines one at a time, the same way a stream codec pulls
//! whole messages out of a receive buffer.
//!
//! Only `\r\n` terminates a line; a bare `\n` or `\r` stays part of the line
//! and is later treated as whitespace by the frame decoder.

use thiserror::Error;

/// Default cap on a partial line.  A 16-channel frame is under 100 bytes.
pub const DEFAULT_MAX_LINE_LEN: usize = 4096;

const DELIMITER: &[u8] = b"\r\n";

/// Errors produced while framing the byte stream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LineError {
    /// More than `max` bytes arrived without a delimiter; they were dropped.
    #[error("discarded {discarded} bytes without a line delimiter (limit {max})")]
    TooLong { discarded: usize, max: usize },
}

/// Splits a byte stream into CRLF-terminated lines.
#[derive(Debug)]
pub struct LineFramer {
    buf: Vec<u8>,
    max_line_len: usize,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::with_max_line_len(DEFAULT_MAX_LINE_LEN)
    }

    /// Creates a framer that discards partial lines longer than `max_line_len`.
    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            buf: Vec::with_capacity(256),
            max_line_len,
        }
    }

    /// Appends freshly read bytes to the buffer.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Returns the next complete line, if one is buffered.
    ///
    /// Call in a loop after every [`extend`](Self::extend) until it returns
    /// `None`.  The returned line has its `\r\n` removed; invalid UTF-8 is
    /// replaced with U+FFFD so that garbage reaches the frame decoder and is
    /// rejected there.
    pub fn next_line(&mut self) -> Option<Result<String, LineError>> {
        if let Some(pos) = find_delimiter(&self.buf) {
            let line = String::from_utf8_lossy(&self.buf[..pos]).into_owned();
            self.buf.drain(..pos + DELIMITER.len());
            return Some(Ok(line));
        }

        if self.buf.len() > self.max_line_len {
            // Keep a trailing '\r' so a delimiter split across reads survives.
            let keep = usize::from(self.buf.last() == Some(&b'\r'));
            let discarded = self.buf.len() - keep;
            self.buf.drain(..discarded);
            return Some(Err(LineError::TooLong {
                discarded,
                max: self.max_line_len,
            }));
        }

        None
    }

    /// Number of bytes waiting for a delimiter.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

fn find_delimiter(buf: &[u8]) -> Option<usize> {
    buf.windows(DELIMITER.len()).position(|w| w == DELIMITER)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(framer: &mut LineFramer) -> Vec<Result<String, LineError>> {
        std::iter::from_fn(|| framer.next_line()).collect()
    }

    #[test]
    fn test_single_complete_line() {
        let mut framer = LineFramer::new();
        framer.extend(b"1 2 3\r\n");
        assert_eq!(drain(&mut framer), vec![Ok("1 2 3".to_string())]);
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_partial_line_waits_for_delimiter() {
        // Arrange: the first read stops in the middle of a line
        let mut framer = LineFramer::new();
        framer.extend(b"10 20 3");

        // Assert: nothing yet
        assert!(framer.next_line().is_none());

        // Act: the rest of the line arrives
        framer.extend(b"0\r\n");

        // Assert
        assert_eq!(drain(&mut framer), vec![Ok("10 20 30".to_string())]);
    }

    #[test]
    fn test_delimiter_split_across_reads() {
        let mut framer = LineFramer::new();
        framer.extend(b"5 6\r");
        assert!(framer.next_line().is_none());
        framer.extend(b"\n7");
        assert_eq!(drain(&mut framer), vec![Ok("5 6".to_string())]);
        assert_eq!(framer.buffered(), 1);
    }

    #[test]
    fn test_multiple_lines_in_one_read() {
        let mut framer = LineFramer::new();
        framer.extend(b"a\r\nb\r\n\r\nc");
        assert_eq!(
            drain(&mut framer),
            vec![Ok("a".to_string()), Ok("b".to_string()), Ok(String::new())]
        );
        assert_eq!(framer.buffered(), 1);
    }

    #[test]
    fn test_bare_newline_is_not_a_delimiter() {
        let mut framer = LineFramer::new();
        framer.extend(b"1 2\n3 4\r\n");
        assert_eq!(drain(&mut framer), vec![Ok("1 2\n3 4".to_string())]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced_not_dropped() {
        let mut framer = LineFramer::new();
        framer.extend(b"1 \xff 3\r\n");
        let lines = drain(&mut framer);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].as_ref().unwrap().contains('\u{FFFD}'));
    }

    #[test]
    fn test_overlong_partial_line_is_discarded_once() {
        // Arrange
        let mut framer = LineFramer::with_max_line_len(8);
        framer.extend(b"0123456789");

        // Act
        let first = framer.next_line();
        let second = framer.next_line();

        // Assert: one error, then the framer is empty and usable again
        assert_eq!(
            first,
            Some(Err(LineError::TooLong {
                discarded: 10,
                max: 8
            }))
        );
        assert!(second.is_none());

        framer.extend(b"ok\r\n");
        assert_eq!(drain(&mut framer), vec![Ok("ok".to_string())]);
    }
}
