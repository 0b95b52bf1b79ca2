use std::path::PathBuf;

/// Fatal errors raised before or while loading an index.
///
/// Malformed judgment and run lines are not represented here; they are
/// recorded as data by [`crate::eval::RunOutcome::BadFormat`].
#[derive(thiserror::Error, Debug)]
pub enum IrError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("path does not exist: {}", .0.display())]
    MissingPath(PathBuf),

    #[error("index artifacts already exist in {}", .0.display())]
    IndexExists(PathBuf),

    #[error("corrupt index: {0}")]
    CorruptIndex(String),
}

pub type Result<T> = std::result::Result<T, IrError>;
