//! Load errors for configuration, program and image files.

use std::fmt;
use std::path::PathBuf;

use soc_core::ConfigError;
use thiserror::Error;

/// Problems found while tokenizing a hex listing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxErrorKind {
    /// Token is not a hexadecimal number.
    #[error("invalid hex token `{0}`")]
    InvalidToken(String),
    /// Token does not fit in a 16-bit word.
    #[error("word `{0}` does not fit in 16 bits")]
    WordOutOfRange(String),
    /// `@address` marker in a program listing.
    #[error("address markers are only allowed in memory images")]
    UnexpectedAddress,
    /// Image words before the first `@address` marker.
    #[error("data before the first `@address` marker")]
    MissingAddress,
    /// `@address` marker with an odd byte address.
    #[error("address {0:#08x} is not word aligned")]
    UnalignedAddress(u32),
}

/// A syntax error with its 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// Line the offending token is on.
    pub line: usize,
    /// What went wrong.
    pub kind: SyntaxErrorKind,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.kind)
    }
}

impl std::error::Error for SyntaxError {}

/// Errors surfaced by the loaders.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Path that was opened.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A hex listing is malformed.
    #[error("{}: {source}", path.display())]
    Syntax {
        /// Listing path, empty for in-memory text.
        path: PathBuf,
        /// First error found.
        #[source]
        source: SyntaxError,
    },
    /// The TOML text could not be parsed or does not match the schema.
    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),
    /// The preset could not be expanded into a table.
    #[error("failed to expand preset: {0}")]
    Preset(#[from] toml::ser::Error),
    /// The configuration parsed but is inconsistent.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl LoadError {
    pub(crate) fn syntax(line: usize, kind: SyntaxErrorKind) -> Self {
        Self::Syntax {
            path: PathBuf::new(),
            source: SyntaxError { line, kind },
        }
    }

    /// Attaches `path` to a syntax error; other variants pass through.
    #[must_use]
    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        match self {
            Self::Syntax { source, .. } => Self::Syntax {
                path: path.into(),
                source,
            },
            other => other,
        }
    }
}
