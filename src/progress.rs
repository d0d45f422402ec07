/// Marker the encoder script prints on stdout ahead of a percentage.
pub const PROGRESS_MARKER: &str = "PROGRESS:";

/// Incremental parser for the encoder's line-oriented progress signal.
///
/// Input arrives in arbitrary chunks that need not align with line
/// boundaries, so partial lines are buffered until their newline shows
/// up. Lines that do not carry the marker are diagnostic noise and are
/// dropped without error. Reported values are passed through as-is: the
/// parser does not clamp values above 100 or reject regressions.
#[derive(Debug, Default)]
pub struct ProgressParser {
    buffer: String,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of stdout text, returning every percentage value
    /// completed by this chunk, in line order.
    pub fn push(&mut self, chunk: &str) -> Vec<f32> {
        self.buffer.push_str(chunk);

        let mut values = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            if let Some(value) = parse_line(line.trim_end()) {
                values.push(value);
            }
        }
        values
    }

    /// Flush a trailing line that never received its newline, e.g. when
    /// the process exits right after the final marker.
    pub fn finish(&mut self) -> Option<f32> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(rest.trim_end())
    }
}

fn parse_line(line: &str) -> Option<f32> {
    let rest = line.trim_start().strip_prefix(PROGRESS_MARKER)?;
    rest.trim().parse::<f32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_split_across_chunk_boundaries() {
        let mut parser = ProgressParser::new();
        // Boundary lands inside the marker itself.
        let first = parser.push("PROGR");
        let second = parser.push("ESS: 10\nnoise\nPROGRESS: 55.5\n");
        assert!(first.is_empty());
        assert_eq!(second, [10.0, 55.5]);
    }

    #[test]
    fn test_noise_lines_are_ignored() {
        let mut parser = ProgressParser::new();
        let values = parser.push("Processing: input.mp4\nVideo filter: scale=-2:1920\n");
        assert!(values.is_empty());
    }

    #[test]
    fn test_marker_without_number_is_ignored() {
        let mut parser = ProgressParser::new();
        assert!(parser.push("PROGRESS: almost there\n").is_empty());
    }

    #[test]
    fn test_values_are_passed_through_unclamped() {
        let mut parser = ProgressParser::new();
        let values = parser.push("PROGRESS: 80\nPROGRESS: 60\nPROGRESS: 120.5\n");
        assert_eq!(values, [80.0, 60.0, 120.5]);
    }

    #[test]
    fn test_finish_flushes_trailing_line() {
        let mut parser = ProgressParser::new();
        assert!(parser.push("PROGRESS: 100.0").is_empty());
        assert_eq!(parser.finish(), Some(100.0));
        assert_eq!(parser.finish(), None);
    }
}
