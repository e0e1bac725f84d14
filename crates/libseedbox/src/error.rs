use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("a transfer is already in progress")]
    Busy,

    #[error("transfer failed: {0}")]
    Engine(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("error writing archive {path:?}: {source:#}")]
    ArchiveIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("segment is too long to split, try a wider set of boundary characters: {segment:?}")]
    UnsplittableSegment { segment: String },

    #[error("chunk length must be greater than zero")]
    InvalidChunkLength,

    #[error("malformed range header {0:?}")]
    MalformedRange(String),

    #[error("error accessing {path:?}: {source:#}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn archive_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ArchiveIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;
