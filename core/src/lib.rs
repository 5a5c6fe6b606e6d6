pub mod geometry;
pub mod image;
pub mod runtime;

pub use geometry::*;
pub use self::image::*;
pub use runtime::*;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Runtime error: {0}")]
    RuntimeError(String),
}
