//! Error kinds for BCGN reading and writing.

use std::io;
use thiserror::Error;

/// Failures that can occur reading or writing a BCGN file.
#[derive(Debug, Error)]
pub enum BcgnError {
    /// Magic mismatch, unknown version/level, or non-zero reserved bytes.
    /// Fatal for the file: the reader yields no games.
    #[error("invalid BCGN header: {0}")]
    InvalidHeader(String),

    /// `total_length` exceeds the available stream remainder. Fatal for
    /// the iterator.
    #[error("truncated BCGN game record")]
    TruncatedRecord,

    /// A level 1/2 index or bitfield decoded to an illegal move or an
    /// out-of-range destination. Fatal for the iterator.
    #[error("malformed BCGN movetext: {0}")]
    MalformedMovetext(String),

    /// The accumulated game record reached or exceeded 65535 bytes.
    #[error("game record exceeds the {max}-byte BCGN length limit")]
    OverlongGameRecord { max: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
