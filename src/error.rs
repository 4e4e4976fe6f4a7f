use std::path::PathBuf;
use thiserror::Error;

/// The bytes handed to the reader are not a usable class artifact.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error("class file truncated: needed {needed} byte(s) at offset {offset}")]
    Truncated { offset: usize, needed: usize },
    #[error("bad magic number 0x{0:08X}")]
    BadMagic(u32),
    #[error("unsupported class file version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },
    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownConstantTag { tag: u8, index: u16 },
    #[error("constant pool index {index} is not a valid {expected} entry")]
    BadConstantIndex { index: u16, expected: &'static str },
    #[error("constant pool entry {index} is not valid modified UTF-8")]
    InvalidUtf8 { index: u16 },
    #[error("class file declares an empty class name")]
    EmptyClassName,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CanonicalError {
    #[error("string of {len} encoded bytes exceeds the 65535 byte limit: {preview}...")]
    StringTooLong { len: usize, preview: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("digest algorithm {0} is unavailable")]
    AlgorithmUnavailable(&'static str),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("class artifact unavailable at {path:?}: {source}")]
    ArtifactUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed class artifact: {0}")]
    Malformed(#[from] ReadError),
    #[error("cannot canonicalize class: {0}")]
    Canonical(#[from] CanonicalError),
    #[error(transparent)]
    Hash(#[from] HashError),
    #[error("invalid class descriptor: {0}")]
    InvalidDescriptor(String),
}

/// Coarse failure classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ArtifactUnavailable,
    MalformedArtifact,
    AlgorithmUnavailable,
    InvalidInput,
}

impl CoreError {
    pub fn unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreError::ArtifactUnavailable {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::ArtifactUnavailable { .. } => ErrorKind::ArtifactUnavailable,
            CoreError::Malformed(_) => ErrorKind::MalformedArtifact,
            CoreError::Hash(HashError::AlgorithmUnavailable(_)) => ErrorKind::AlgorithmUnavailable,
            CoreError::Canonical(_) | CoreError::InvalidDescriptor(_) => ErrorKind::InvalidInput,
        }
    }

    /// Only a missing artifact can succeed on a later attempt (after a build).
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::ArtifactUnavailable
    }
}
