/// Reassembles newline-delimited records from arbitrarily split text chunks.
///
/// Between pushes the buffer holds at most one partial (undelimited) line.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: String,
}

impl LineFramer {
    pub const DELIMITER: char = '\n';

    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every line it completed, in arrival order.
    ///
    /// Lines are returned without the delimiter. An empty result means the
    /// chunk was buffered until a later delimiter arrives.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);
        let Some(last_delim) = self.buffer.rfind(Self::DELIMITER) else {
            return Vec::new();
        };
        let remainder = self.buffer.split_off(last_delim + 1);
        let complete = std::mem::replace(&mut self.buffer, remainder);
        complete[..last_delim]
            .split(Self::DELIMITER)
            .map(str::to_owned)
            .collect()
    }

    /// Undelimited tail waiting for the next chunk.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &str = "ff000000\n0ff0000\n\n12ab8000\n00\n";

    #[test]
    fn buffers_until_delimiter() {
        let mut framer = LineFramer::new();
        assert!(framer.push("ff00").is_empty());
        assert_eq!(framer.pending(), "ff00");
        assert_eq!(framer.push("0000\n01"), vec!["ff000000".to_string()]);
        assert_eq!(framer.pending(), "01");
    }

    #[test]
    fn every_split_point_yields_same_lines() {
        let mut whole = LineFramer::new();
        let expected = whole.push(STREAM);
        assert_eq!(expected, vec!["ff000000", "0ff0000", "", "12ab8000", "00"]);
        for split in 0..=STREAM.len() {
            let mut framer = LineFramer::new();
            let mut lines = framer.push(&STREAM[..split]);
            lines.extend(framer.push(&STREAM[split..]));
            assert_eq!(lines, expected, "split at {split}");
            assert!(framer.pending().is_empty());
        }
    }

    #[test]
    fn byte_by_byte_matches_single_push() {
        let mut framer = LineFramer::new();
        let mut lines = Vec::new();
        for ch in STREAM.chars() {
            lines.extend(framer.push(&ch.to_string()));
        }
        assert_eq!(lines, LineFramer::new().push(STREAM));
    }

    #[test]
    fn reset_drops_partial_line() {
        let mut framer = LineFramer::new();
        framer.push("dead");
        framer.reset();
        assert_eq!(framer.push("beef0000\n"), vec!["beef0000".to_string()]);
    }
}
