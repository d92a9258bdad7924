//! Error types for every stage of the viewer: loading, streaming, playback,
//! configuration, and the process-level failures reported by `main`.
//!
//! ## Rust concepts
//! - `thiserror` derive for `Display` + `std::error::Error`
//! - `#[from]` to let `?` convert lower-level errors automatically

use std::io;
use std::path::PathBuf;

/// Failures of the frame stream codec.
#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    /// The sink could not grow or the source could not be read.
    #[error("stream I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record was truncated or otherwise violates the framing.
    #[error("corrupt stream at byte {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    /// A frame does not match the stream's fixed dimensions.
    #[error("frame is {actual:?} but the stream holds {expected:?} frames")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

impl StreamError {
    pub fn corrupt(offset: u64, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            offset,
            reason: reason.into(),
        }
    }
}

/// Failures while turning an input file into a frame stream.
#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("failed to decode {}: {message}", path.display())]
    DecodeFailed { path: PathBuf, message: String },

    #[error("no frames found in {}", path.display())]
    NoFrames { path: PathBuf },

    #[error(transparent)]
    Stream(#[from] StreamError),
}

impl LoadError {
    pub fn decode_failed(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::DecodeFailed {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Failures that end a single `play` call.
#[derive(thiserror::Error, Debug)]
pub enum PlaybackError {
    #[error("stream corrupt during playback: {0}")]
    StreamCorrupt(StreamError),

    #[error("stream unreadable during playback: {0}")]
    Io(io::Error),
}

impl From<StreamError> for PlaybackError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Io(e) => Self::Io(e),
            other => Self::StreamCorrupt(other),
        }
    }
}

/// Failures reading the playlist file.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cannot read playlist {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("invalid playlist {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Process-level failures; any of these ends the viewer with a non-zero status.
#[derive(thiserror::Error, Debug)]
pub enum ViewerError {
    #[error("display unavailable: {0}")]
    HardwareUnavailable(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("cannot install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("none of the inputs could be loaded")]
    NoSources,

    #[error("output {} is also an input", .0.display())]
    OutputIsInput(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_clash_names_the_input() {
        let err = ViewerError::OutputIsInput(PathBuf::from("show.stream"));
        assert_eq!(err.to_string(), "output show.stream is also an input");
    }

    #[test]
    fn stream_io_maps_to_playback_io() {
        let err: PlaybackError = StreamError::Io(io::Error::other("gone")).into();
        assert!(matches!(err, PlaybackError::Io(_)));
    }

    #[test]
    fn framing_errors_map_to_stream_corrupt() {
        let err: PlaybackError = StreamError::corrupt(12, "truncated header").into();
        assert!(matches!(err, PlaybackError::StreamCorrupt(_)));
        assert!(err.to_string().contains("byte 12"));

        let err: PlaybackError = StreamError::DimensionMismatch {
            expected: (64, 64),
            actual: (32, 32),
        }
        .into();
        assert!(matches!(err, PlaybackError::StreamCorrupt(_)));
    }

    #[test]
    fn load_errors_name_the_source() {
        let err = LoadError::decode_failed("media/cat.gif", "unexpected EOF");
        let msg = err.to_string();
        assert!(msg.contains("media/cat.gif"));
        assert!(msg.contains("unexpected EOF"));

        let err = LoadError::NoFrames {
            path: PathBuf::from("empty.gif"),
        };
        assert!(err.to_string().contains("empty.gif"));
    }
}
