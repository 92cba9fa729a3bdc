use std::{
    fs, io,
    ops::Range,
    path::Path,
};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::analysis::config::AnalysisConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::frames::matrix::PressureMatrix;

/// One decoded frame of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub index: usize,
    pub captured_at: DateTime<Utc>,
    pub matrix: PressureMatrix,
}

/// Validated view over the text of one uploaded session.
///
/// Construction only checks the line structure; cell values are decoded
/// per frame, so any frame can be read on its own by byte offset.
#[derive(Debug)]
pub struct SessionReader<'a> {
    text: &'a str,
    frame_spans: Vec<Range<usize>>,
    line_count: usize,
    frame_height: usize,
    frame_width: usize,
    base_time: DateTime<Utc>,
}

impl<'a> SessionReader<'a> {
    pub fn new(
        text: &'a str,
        config: &AnalysisConfig,
        base_time: DateTime<Utc>,
    ) -> PipelineResult<Self> {
        config.validate()?;

        if text.len() > config.max_session_bytes {
            return Err(PipelineError::range(format!(
                "session is {} bytes, limit is {}",
                text.len(),
                config.max_session_bytes
            )));
        }

        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let lines = line_spans(text);
        let line_count = lines.len();

        if line_count == 0 {
            return Err(PipelineError::malformed("session contains no rows"));
        }

        if line_count % config.frame_height != 0 {
            return Err(PipelineError::malformed(format!(
                "{line_count} rows is not a whole number of {}-row frames",
                config.frame_height
            )));
        }

        let frame_spans = lines
            .chunks(config.frame_height)
            .map(|chunk| chunk[0].start..chunk[chunk.len() - 1].end)
            .collect();

        Ok(Self {
            text,
            frame_spans,
            line_count,
            frame_height: config.frame_height,
            frame_width: config.frame_width,
            base_time,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frame_spans.len()
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// Decode a single frame without touching the others.
    pub fn frame(&self, index: usize) -> PipelineResult<Frame> {
        let span = self.frame_spans.get(index).cloned().ok_or_else(|| {
            PipelineError::missing(format!(
                "frame {index} requested but session has {} frames",
                self.frame_count()
            ))
        })?;

        let block = &self.text[span];
        let first_line = index * self.frame_height + 1;
        let mut cells = Vec::with_capacity(self.frame_height * self.frame_width);

        for (offset, line) in block.split('\n').enumerate() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            parse_row(line, self.frame_width, first_line + offset, &mut cells)?;
        }

        let matrix = PressureMatrix::new(self.frame_height, self.frame_width, cells)?;

        Ok(Frame {
            index,
            captured_at: self.base_time + Duration::seconds(index as i64),
            matrix,
        })
    }

    pub fn frames(&self) -> Frames<'_, 'a> {
        Frames {
            reader: self,
            next: 0,
        }
    }

    /// Decode every frame, failing on the first bad one.
    pub fn decode_all(&self) -> PipelineResult<Vec<Frame>> {
        self.frames().collect()
    }
}

/// Lazy, one-shot sequence of frames in input order.
pub struct Frames<'r, 'a> {
    reader: &'r SessionReader<'a>,
    next: usize,
}

impl Iterator for Frames<'_, '_> {
    type Item = PipelineResult<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.reader.frame_count() {
            return None;
        }
        let frame = self.reader.frame(self.next);
        self.next += 1;
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.reader.frame_count().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Frames<'_, '_> {}

/// Read a stored session file into memory.
pub fn load_session_text(path: &Path, config: &AnalysisConfig) -> PipelineResult<String> {
    let metadata = fs::metadata(path).map_err(|err| missing_file(path, err))?;

    if metadata.len() > config.max_session_bytes as u64 {
        return Err(PipelineError::range(format!(
            "{} is {} bytes, limit is {}",
            path.display(),
            metadata.len(),
            config.max_session_bytes
        )));
    }

    let bytes = fs::read(path).map_err(|err| missing_file(path, err))?;
    String::from_utf8(bytes).map_err(|err| {
        PipelineError::malformed(format!("{} is not valid UTF-8: {err}", path.display()))
    })
}

fn missing_file(path: &Path, err: io::Error) -> PipelineError {
    PipelineError::missing(format!("CSV file not found: {} ({err})", path.display()))
}

/// Byte ranges of each line, without the terminator. A trailing newline
/// does not open another line.
fn line_spans(text: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut start = 0;

    for (pos, byte) in bytes.iter().enumerate() {
        if *byte == b'\n' {
            let end = if pos > start && bytes[pos - 1] == b'\r' {
                pos - 1
            } else {
                pos
            };
            spans.push(start..end);
            start = pos + 1;
        }
    }

    if start < bytes.len() {
        spans.push(start..bytes.len());
    }

    spans
}

fn parse_row(line: &str, width: usize, line_no: usize, out: &mut Vec<u32>) -> PipelineResult<()> {
    let before = out.len();

    for token in line.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if out.len() - before == width {
            return Err(PipelineError::malformed(format!(
                "line {line_no} has more than {width} values"
            )));
        }
        out.push(parse_cell(token, line_no)?);
    }

    let found = out.len() - before;
    if found != width {
        return Err(PipelineError::malformed(format!(
            "line {line_no} has {found} values, expected {width}"
        )));
    }

    Ok(())
}

fn parse_cell(token: &str, line_no: usize) -> PipelineResult<u32> {
    let value: i64 = token.parse().map_err(|_| {
        PipelineError::malformed(format!("line {line_no}: '{token}' is not an integer"))
    })?;

    if value < 0 {
        return Err(PipelineError::malformed(format!(
            "line {line_no}: negative reading {value}"
        )));
    }

    if value > i64::from(i32::MAX) {
        return Err(PipelineError::malformed(format!(
            "line {line_no}: reading {value} is out of range"
        )));
    }

    Ok(value as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 6, 9, 30, 0).unwrap()
    }

    fn row(value: u32) -> String {
        vec![value.to_string(); 32].join(",")
    }

    fn session(frame_values: &[u32]) -> String {
        let mut out = String::new();
        for value in frame_values {
            for _ in 0..32 {
                out.push_str(&row(*value));
                out.push('\n');
            }
        }
        out
    }

    #[test]
    fn splits_into_whole_frames() {
        let text = session(&[1, 2, 3]);
        let config = AnalysisConfig::default();
        let reader = SessionReader::new(&text, &config, base()).unwrap();

        assert_eq!(reader.line_count(), 96);
        assert_eq!(reader.frame_count(), 3);

        let frames = reader.decode_all().unwrap();
        let indices: Vec<usize> = frames.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(frames[2].matrix.get(31, 31), Some(3));
    }

    #[test]
    fn timestamps_are_one_second_apart() {
        let text = session(&[0, 0]);
        let config = AnalysisConfig::default();
        let reader = SessionReader::new(&text, &config, base()).unwrap();
        let frames = reader.decode_all().unwrap();

        assert_eq!(frames[0].captured_at, base());
        assert_eq!(frames[1].captured_at, base() + Duration::seconds(1));
    }

    #[test]
    fn rejects_partial_frames() {
        let config = AnalysisConfig::default();
        for lines in [1usize, 31, 33, 63] {
            let text: String = (0..lines).map(|_| format!("{}\n", row(0))).collect();
            let err = SessionReader::new(&text, &config, base()).unwrap_err();
            assert_eq!(err.kind(), "MalformedInput", "{lines} lines");
        }
    }

    #[test]
    fn rejects_empty_session() {
        let config = AnalysisConfig::default();
        let err = SessionReader::new("", &config, base()).unwrap_err();
        assert_eq!(err.kind(), "MalformedInput");
    }

    #[test]
    fn rejects_short_and_long_rows() {
        let config = AnalysisConfig::default();

        let mut short = session(&[5]);
        short = short.replacen(&format!("{}\n", row(5)), &format!("{}\n", vec!["5"; 31].join(",")), 1);
        let reader = SessionReader::new(&short, &config, base()).unwrap();
        assert_eq!(reader.frame(0).unwrap_err().kind(), "MalformedInput");

        let long = session(&[5]).replacen('\n', ",5\n", 1);
        let reader = SessionReader::new(&long, &config, base()).unwrap();
        assert_eq!(reader.frame(0).unwrap_err().kind(), "MalformedInput");
    }

    #[test]
    fn rejects_bad_tokens() {
        let config = AnalysisConfig::default();
        for bad in ["-1", "abc", "1.5", "4294967296"] {
            let text = session(&[7]).replacen("7", bad, 1);
            let reader = SessionReader::new(&text, &config, base()).unwrap();
            let err = reader.decode_all().unwrap_err();
            assert_eq!(err.kind(), "MalformedInput", "token {bad}");
        }
    }

    #[test]
    fn tolerates_crlf_trailing_comma_and_spaces() {
        let config = AnalysisConfig::default();
        let line = format!(" {} ,\r\n", row(9));
        let text = line.repeat(32);
        let reader = SessionReader::new(&text, &config, base()).unwrap();
        let frame = reader.frame(0).unwrap();
        assert!(frame.matrix.cells().iter().all(|v| *v == 9));
    }

    #[test]
    fn last_line_without_newline_counts() {
        let config = AnalysisConfig::default();
        let mut text = session(&[1]);
        text.pop();
        let reader = SessionReader::new(&text, &config, base()).unwrap();
        assert_eq!(reader.frame_count(), 1);
        assert!(reader.frame(0).is_ok());
    }

    #[test]
    fn random_access_matches_sequential_decode() {
        let text = session(&[10, 20, 30, 40]);
        let config = AnalysisConfig::default();
        let reader = SessionReader::new(&text, &config, base()).unwrap();
        let all = reader.decode_all().unwrap();

        assert_eq!(reader.frame(2).unwrap(), all[2]);
        assert_eq!(reader.frame(3).unwrap().matrix.get(0, 0), Some(40));
    }

    #[test]
    fn frame_past_end_is_missing() {
        let text = session(&[1]);
        let config = AnalysisConfig::default();
        let reader = SessionReader::new(&text, &config, base()).unwrap();
        assert_eq!(reader.frame(1).unwrap_err().kind(), "MissingSource");
    }

    #[test]
    fn oversized_session_is_out_of_range() {
        let text = session(&[1]);
        let config = AnalysisConfig {
            max_session_bytes: 100,
            ..AnalysisConfig::default()
        };
        assert_eq!(
            SessionReader::new(&text, &config, base()).unwrap_err().kind(),
            "Range"
        );
    }

    #[test]
    fn frames_iterator_reports_exact_size() {
        let text = session(&[1, 2]);
        let config = AnalysisConfig::default();
        let reader = SessionReader::new(&text, &config, base()).unwrap();
        let mut frames = reader.frames();
        assert_eq!(frames.len(), 2);
        frames.next();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn missing_file_is_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_session_text(&dir.path().join("gone.csv"), &AnalysisConfig::default())
            .unwrap_err();
        assert_eq!(err.kind(), "MissingSource");
    }
}
