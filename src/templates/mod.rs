// SPDX-License-Identifier: PMPL-1.0-or-later

//! Reusable payment templates.
//!
//! [`TemplateManager`] owns the in-memory collection and mirrors it to a
//! [`KeyValueStore`](crate::storage::KeyValueStore) after every mutation.
//! A failed write is reported to the caller but the in-memory change stays;
//! [`TemplateManager::flush`] retries.
//!
//! Import/export lives in `transfer`: exports wrap the collection in a
//! versioned document, imports de-duplicate on `(name, endpoint)`.

mod manager;
mod transfer;

pub use manager::TemplateManager;
pub use transfer::EXPORT_VERSION;

use crate::storage::StorageError;
use crate::types::{ImportSummary, Template};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("cannot read stored templates: {0}")]
    Load(#[source] StorageError),

    #[error("template name must not be empty")]
    EmptyName,

    #[error("templates changed in memory but could not be saved: {source}")]
    Persist {
        #[source]
        source: StorageError,
        unsaved: Unsaved,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid import document: {0}")]
    InvalidImport(String),

    #[error("import file must have a .json extension: {}", .0.display())]
    NotJson(PathBuf),

    #[error("cannot access {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("random source unavailable: {0}")]
    Random(String),
}

pub type TemplateResult<T> = Result<T, TemplateError>;

/// Result of an operation whose in-memory change stands although the save
/// failed.
#[derive(Debug, Clone, PartialEq)]
pub enum Unsaved {
    Nothing,
    Added(Box<Template>),
    Imported(ImportSummary),
}

impl TemplateError {
    /// Attach `unsaved` to a persistence failure; other errors pass through.
    pub(super) fn with_unsaved(self, unsaved: Unsaved) -> Self {
        match self {
            TemplateError::Persist { source, .. } => TemplateError::Persist { source, unsaved },
            other => other,
        }
    }
}
