//! Partial-line buffer
//!
//! Writes reach the interceptor in arbitrary pieces. The buffer holds everything after
//! the last newline until the line is completed by a later write or flushed at shutdown.

/// Accumulates text and hands out complete lines
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text and return every line it completed.
    ///
    /// Newlines are dropped, as is a `\r` directly before one. Lines that are empty
    /// or whitespace-only are discarded.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.pending.push_str(text);

        let Some(last_newline) = self.pending.rfind('\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        complete
            .split_terminator('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Take the unterminated residue, trimmed, if it holds anything but whitespace
    pub fn take_residue(&mut self) -> Option<String> {
        let residue = std::mem::take(&mut self.pending);
        let trimmed = residue.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Text waiting for a newline
    pub fn pending(&self) -> &str {
        &self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_writes_join_into_one_line() {
        let mut buffer = LineBuffer::new();

        assert!(buffer.push("hel").is_empty());
        assert!(buffer.push("lo wor").is_empty());
        assert_eq!(buffer.push("ld\n"), vec!["hello world"]);
        assert_eq!(buffer.pending(), "");
    }

    #[test]
    fn test_multiple_lines_in_one_write() {
        let mut buffer = LineBuffer::new();

        let lines = buffer.push("one\ntwo\nthree\nfour");
        assert_eq!(lines, vec!["one", "two", "three"]);
        assert_eq!(buffer.pending(), "four");
    }

    #[test]
    fn test_blank_lines_are_dropped() {
        let mut buffer = LineBuffer::new();

        let lines = buffer.push("\n\n   \n\tfirst\n \t \nsecond\n\n");
        assert_eq!(lines, vec!["\tfirst", "second"]);
        assert_eq!(buffer.pending(), "");
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut buffer = LineBuffer::new();

        assert_eq!(buffer.push("windows\r\n\r\n"), vec!["windows"]);
    }

    #[test]
    fn test_take_residue() {
        let mut buffer = LineBuffer::new();

        buffer.push("done\n  trailing text  ");
        assert_eq!(buffer.take_residue(), Some("trailing text".to_string()));
        assert_eq!(buffer.pending(), "");
        assert_eq!(buffer.take_residue(), None);

        buffer.push("\n   ");
        assert_eq!(buffer.take_residue(), None);
        assert_eq!(buffer.pending(), "");
    }
}
