//! Error types for the stem separation and chord detection pipeline

use std::fmt;

/// Custom error type for audiosplit processing
#[derive(Debug, Clone)]
pub enum SplitError {
    /// E001: Input file is missing or has an unsupported extension
    InputValidationError(String),
    /// E002: Invalid audio format (e.g. unsupported bit depth)
    InvalidAudioFormat(String),
    /// E003: Audio file I/O error
    AudioFileError(String),
    /// E004: External separation tool failed or could not be started
    SeparationFailed(String),
    /// E005: No directory holding every expected stem was found
    StemsNotFound(String),
    /// E006: Stem filtering error
    FilterError(String),
    /// E007: Chord recognition error
    RecognitionError(String),
    /// E008: Malformed .lab content
    LabParseError(String),
    /// E009: MIDI export error
    MidiExportError(String),
    /// E010: Report or plot generation error
    QaGenerationError(String),
    /// E011: Archive creation error
    ArchiveError(String),
    /// E012: Invalid configuration parameter
    InvalidConfigParameter(String),
}

impl fmt::Display for SplitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitError::InputValidationError(msg) => {
                write!(f, "E001: Input validation error - {}", msg)
            }
            SplitError::InvalidAudioFormat(msg) => {
                write!(f, "E002: Invalid audio format - {}", msg)
            }
            SplitError::AudioFileError(msg) => {
                write!(f, "E003: Audio file I/O error - {}", msg)
            }
            SplitError::SeparationFailed(msg) => {
                write!(f, "E004: Stem separation failed - {}", msg)
            }
            SplitError::StemsNotFound(msg) => {
                write!(f, "E005: Stems not found - {}", msg)
            }
            SplitError::FilterError(msg) => {
                write!(f, "E006: Stem filtering error - {}", msg)
            }
            SplitError::RecognitionError(msg) => {
                write!(f, "E007: Chord recognition error - {}", msg)
            }
            SplitError::LabParseError(msg) => {
                write!(f, "E008: Invalid .lab content - {}", msg)
            }
            SplitError::MidiExportError(msg) => {
                write!(f, "E009: MIDI export error - {}", msg)
            }
            SplitError::QaGenerationError(msg) => {
                write!(f, "E010: QA artifact generation error - {}", msg)
            }
            SplitError::ArchiveError(msg) => {
                write!(f, "E011: Archive error - {}", msg)
            }
            SplitError::InvalidConfigParameter(msg) => {
                write!(f, "E012: Invalid configuration parameter - {}", msg)
            }
        }
    }
}

impl std::error::Error for SplitError {}

impl From<std::io::Error> for SplitError {
    fn from(err: std::io::Error) -> Self {
        SplitError::AudioFileError(format!("File I/O error: {}", err))
    }
}

impl From<hound::Error> for SplitError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => SplitError::AudioFileError(e.to_string()),
            other => SplitError::InvalidAudioFormat(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for SplitError {
    fn from(err: serde_json::Error) -> Self {
        SplitError::QaGenerationError(format!("JSON serialization error: {}", err))
    }
}

impl From<zip::result::ZipError> for SplitError {
    fn from(err: zip::result::ZipError) -> Self {
        SplitError::ArchiveError(err.to_string())
    }
}

impl From<anyhow::Error> for SplitError {
    fn from(err: anyhow::Error) -> Self {
        SplitError::InvalidConfigParameter(format!("{:#}", err))
    }
}

/// Result type alias for audiosplit operations
pub type Result<T> = std::result::Result<T, SplitError>;
