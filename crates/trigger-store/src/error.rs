use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The trigger word was empty after trimming.
    #[error("trigger word must not be empty")]
    InvalidWord,

    #[error("reply text must not be empty")]
    EmptyReply,

    /// Reading or writing the backing file failed. Mutations that hit this are
    /// rolled back before the error is returned.
    #[error("trigger store I/O failed at {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The backing file exists but does not hold a valid table set.
    #[error("malformed trigger store at {}", .path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
