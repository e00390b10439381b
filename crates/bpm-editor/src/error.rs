//! Error types for the modeler engine and the editor shell.

use bpm_core::{ElementKind, ExportError, ImportError, ModelError, Property};
use thiserror::Error;

/// Failures of whole-document engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("import failed: {0}")]
    Import(#[from] ImportError),

    #[error("export failed: {0}")]
    Export(#[from] ExportError),

    #[error("modeler has been destroyed")]
    Destroyed,
}

/// A mutation rejected by the modeler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelingError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("property `{property}` does not apply to {kind}")]
    NotApplicable { property: Property, kind: ElementKind },

    #[error("cannot connect `{source_id}` to `{target_id}`: {reason}")]
    ConnectionNotAllowed {
        source_id: String,
        target_id: String,
        reason: &'static str,
    },

    #[error("no placement gesture in progress")]
    NoActiveGesture,

    #[error("unknown entry `{0}`")]
    UnknownEntry(String),

    #[error("modeler has been destroyed")]
    Destroyed,
}

/// Failure to hand a file to the platform for download.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    #[error("could not create download: {0}")]
    Create(String),

    #[error("could not start download: {0}")]
    Trigger(String),
}

/// Everything the editor shell catches and reports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Canvas not found")]
    CanvasMissing,

    #[error(transparent)]
    Modeling(#[from] ModelingError),

    #[error(transparent)]
    Download(#[from] DownloadError),
}
