use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExportError>;

/// Failure taxonomy of the export pipeline.
///
/// Only [`ExportError::TransientElement`] is ever retried (see [`crate::retry`]);
/// every other variant ends the run.
#[derive(Debug, Error)]
pub enum ExportError {
    /// An element handle went stale because the page re-rendered under us.
    #[error("element went stale while {context}")]
    TransientElement { context: String },

    /// The page does not have the shape we expect.
    #[error("expected exactly one `{selector}` on {url}, found {found}")]
    Structure {
        selector: String,
        url: String,
        found: usize,
    },

    #[error("entry url does not match .../journals/<journal_id>/<entry_id>: {url}")]
    MalformedReference { url: String },

    #[error("page did not finish loading within {timeout:?}: {url}")]
    LoadTimeout { url: String, timeout: Duration },

    #[error("listing never ran out of entries within {max_pages} pages: {url}")]
    PageLimit { url: String, max_pages: u32 },

    #[error("browser: {message}")]
    Driver { message: String },

    #[error("resume store {}: {source}", .path.display())]
    Store {
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    #[error("login: {message}")]
    Login { message: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("header is missing column `{0}`")]
    MissingColumn(&'static str),

    #[error("malformed row at line {line}: {message}")]
    MalformedRow { line: u64, message: String },
}

impl ExportError {
    /// Stable label printed in front of fatal errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TransientElement { .. } => "transient-element",
            Self::Structure { .. } => "structure",
            Self::MalformedReference { .. } => "malformed-reference",
            Self::LoadTimeout { .. } => "load-timeout",
            Self::PageLimit { .. } => "page-limit",
            Self::Driver { .. } => "driver",
            Self::Store { .. } => "store",
            Self::Login { .. } => "login",
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientElement { .. })
    }

    pub(crate) fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    pub(crate) fn store(path: impl Into<PathBuf>, source: impl Into<StoreError>) -> Self {
        Self::Store {
            path: path.into(),
            source: source.into(),
        }
    }
}
