use std::fmt;
use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("image too small: {0}")]
    Capacity(String),

    #[error("not a valid MiniVSFS image: {0}")]
    Format(String),

    #[error("image truncated: expected {expected} bytes, found {actual}")]
    Truncated { expected: u64, actual: u64 },

    #[error("no space: need {needed} free {resource}, {available} available")]
    NoSpace {
        resource: Resource,
        needed: u64,
        available: u64,
    },

    #[error("{} is too large: {size} bytes exceeds {max} bytes addressable by direct blocks", .path.display())]
    FileTooLarge { path: PathBuf, size: u64, max: u64 },

    #[error("entry {name:?} is too large: {size} bytes exceeds {max} bytes addressable by direct blocks")]
    EntryTooLarge { name: String, size: u64, max: u64 },

    #[error("invalid entry name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("root directory has no free direct pointer to extend")]
    DirectoryFull,

    #[error("invalid source {}: {reason}", .path.display())]
    InvalidSource { path: PathBuf, reason: &'static str },

    #[error("an entry named {0:?} already exists")]
    NameExists(String),

    #[error("no entry named {0:?}")]
    NotFound(String),

    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Which allocation table ran dry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Inodes,
    DataBlocks,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Inodes => f.write_str("inodes"),
            Resource::DataBlocks => f.write_str("data blocks"),
        }
    }
}
