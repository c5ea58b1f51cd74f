use thiserror::Error;

use crate::audio::segment::SegmenterError;

pub type Result<T> = std::result::Result<T, CodecError>;

/// Everything that can go wrong while building or reading a Fractal-1 container.
///
/// Decode errors are fail-fast: a container that trips any of these checks is
/// rejected as a whole, there is no partial result.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid Fractal-1 magic: {found:?}")]
    InvalidFormat { found: String },

    #[error("unsupported Fractal-1 version: {0}")]
    UnsupportedVersion(u32),

    #[error("malformed segment table: {0}")]
    MalformedSegmentTable(String),

    #[error("malformed LZ-Abyss stream at byte {position}: back-reference offset {offset} with only {available} samples decoded")]
    MalformedStream {
        position: usize,
        offset: usize,
        available: usize,
    },

    #[error("malformed beatmap blob of {len} bytes")]
    MalformedBeatmap { len: usize },

    #[error("container truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("header JSON: {0}")]
    Header(#[from] serde_json::Error),

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("{what} of {len} bytes does not fit a 32-bit length field")]
    TooLarge { what: &'static str, len: usize },

    #[error("segmenter: {0}")]
    Segmenter(#[from] SegmenterError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
