// hybridiso/src/error.rs
use std::io;
use thiserror::Error;

/// Errors raised while preparing, mastering or patching an ISO image.
#[derive(Error, Debug)]
pub enum IsoError {
    /// A loader or the header end marker could not be found.
    #[error("ISO loader error: {0}")]
    Loader(String),

    /// The image violates one of the ISO9660/El Torito layout invariants.
    #[error("ISO metadata error: {0}")]
    MetaData(String),

    /// A required external tool is not installed.
    #[error("ISO tool error: {0}")]
    Tool(String),

    #[error("Command `{command}` failed with exit code {status:?}: {stderr}")]
    Command {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, IsoError>;
