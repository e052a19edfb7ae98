//! Reading and writing timestamped `.lab` chord files

use crate::chord_library::chord_notes_in_octave;
use crate::error::{Result as SplitResult, SplitError};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

/// A chord segment with start/end times in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordSegment {
    pub start_s: f32,
    pub end_s: f32,
    pub label: String,
}

impl ChordSegment {
    pub fn new(start_s: f32, end_s: f32, label: impl Into<String>) -> Self {
        Self {
            start_s,
            end_s,
            label: label.into(),
        }
    }

    pub fn duration_s(&self) -> f32 {
        self.end_s - self.start_s
    }
}

/// Parse `.lab` content: `<start> <end> <label> [notes]` per line
pub fn parse_chords_lab(content: &str) -> SplitResult<Vec<ChordSegment>> {
    let mut segments = Vec::new();

    for raw_line in content.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            return Err(SplitError::LabParseError(format!(
                "Invalid .lab line: {}",
                raw_line
            )));
        }

        let parse_time = |field: &str| {
            field.parse::<f32>().map_err(|_| {
                SplitError::LabParseError(format!("Invalid time '{}' in line: {}", field, raw_line))
            })
        };
        let start_s = parse_time(fields[0])?;
        let end_s = parse_time(fields[1])?;

        if end_s < start_s {
            return Err(SplitError::LabParseError(format!(
                "Invalid segment (end < start): {}",
                raw_line
            )));
        }

        segments.push(ChordSegment::new(start_s, end_s, fields[2]));
    }

    Ok(segments)
}

/// Read a `.lab` file in file order
pub fn read_chords_lab<P: AsRef<Path>>(path: P) -> SplitResult<Vec<ChordSegment>> {
    let content = read_text_file(path)?;
    parse_chords_lab(&content)
}

/// Format segments as `.lab` lines with a trailing notes column
///
/// Labels without notes get `-` in the notes column.
pub fn format_chords_lab(segments: &[ChordSegment], base_octave: i8) -> String {
    let mut out = String::new();
    for segment in segments {
        let notes = chord_notes_in_octave(&segment.label, base_octave);
        let notes = if notes.is_empty() {
            "-".to_string()
        } else {
            notes.join(",")
        };
        // Writing into a String cannot fail
        let _ = writeln!(
            out,
            "{:.3}\t{:.3}\t{}\t{}",
            segment.start_s, segment.end_s, segment.label, notes
        );
    }
    out
}

/// Write segments to a `.lab` file, creating parent directories
pub fn write_chords_lab<P: AsRef<Path>>(
    path: P,
    segments: &[ChordSegment],
    base_octave: i8,
) -> SplitResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, format_chords_lab(segments, base_octave))?;
    Ok(())
}

/// Read a UTF-8 text file
pub fn read_text_file<P: AsRef<Path>>(path: P) -> SplitResult<String> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SplitError::InputValidationError(format!(
            "File not found: {}",
            path.display()
        )));
    }
    Ok(std::fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_blank_lines_and_keeps_order() {
        let content = "0.000 1.500 C:maj\n\n1.500\t3.000\tA:min\tA3,C4,E4\n  \n3.0 4.0 N\n";
        let segments = parse_chords_lab(content).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], ChordSegment::new(0.0, 1.5, "C:maj"));
        assert_eq!(segments[1].label, "A:min");
        assert_eq!(segments[2].label, "N");
    }

    #[test]
    fn test_parse_rejects_bad_lines() {
        assert!(parse_chords_lab("0.0 1.0\n").is_err());
        assert!(parse_chords_lab("zero 1.0 C:maj\n").is_err());
        let err = parse_chords_lab("2.0 1.0 C:maj\n").unwrap_err();
        assert!(err.to_string().contains("end < start"));
    }

    #[test]
    fn test_format_notes_column() {
        let segments = vec![
            ChordSegment::new(0.0, 1.25, "C:maj"),
            ChordSegment::new(1.25, 2.0, "N"),
        ];
        let text = format_chords_lab(&segments, 3);
        assert_eq!(text, "0.000\t1.250\tC:maj\tC3,E3,G3\n1.250\t2.000\tN\t-\n");
    }
}
