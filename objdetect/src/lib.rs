//! Object detection with boosted Haar cascades.
//!
//! The [`haar`] module loads trained cascades from their parenthesized text
//! description and evaluates them, integer-only, on fixed-size windows or by
//! scanning whole images.

pub mod haar;

pub use haar::*;

use cv_core::PixelKind;
use cv_imgproc::ImgprocError;

pub type Result<T> = std::result::Result<T, ObjdetectError>;

#[derive(Debug, thiserror::Error)]
pub enum ObjdetectError {
    /// The cascade description violates the grammar.
    #[error("Parse error at byte {position}: expected {expected}, found {found}")]
    Parse {
        expected: String,
        found: String,
        position: usize,
    },

    /// The cascade description ended in the middle of a token.
    #[error("Truncated input: cascade description ended at byte {position}")]
    TruncatedInput { position: usize },

    #[error(
        "Size mismatch: cascade window is {ew}x{eh}, image is {fw}x{fh}",
        ew = expected.0,
        eh = expected.1,
        fw = found.0,
        fh = found.1
    )]
    SizeMismatch {
        expected: (u32, u32),
        found: (u32, u32),
    },

    #[error("Wrong image kind: expected {expected}, found {found}")]
    WrongImageKind { expected: PixelKind, found: PixelKind },

    /// An in-memory cascade references missing features, nodes or stages, or
    /// its stage tree is malformed.
    #[error("Invalid cascade: {0}")]
    InvalidCascade(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Imgproc(#[from] ImgprocError),
}
