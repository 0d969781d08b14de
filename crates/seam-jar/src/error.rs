use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JarError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error("not a jar or class directory: {0}")]
    UnsupportedLibrary(PathBuf),
}
