//! Error types for diagram import, export and model mutation.

use thiserror::Error;

/// A rejected change to the in-memory model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("invalid element id `{0}`")]
    InvalidId(String),

    #[error("element id `{0}` is already in use")]
    DuplicateId(String),

    #[error("unknown element {0}")]
    UnknownElement(String),

    #[error("unknown property `{0}`")]
    UnknownProperty(String),

    #[error("element `{0}` is a connection, expected a shape")]
    NotAShape(String),
}

/// Failure to read a BPMN 2.0 XML document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    #[error("malformed XML: {0}")]
    Xml(String),

    #[error("no <definitions> root element")]
    MissingDefinitions,

    #[error("<{element}> is missing required attribute `{attribute}`")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
    },

    #[error("sequence flow `{flow}` references unknown element `{reference}`")]
    UnresolvedReference { flow: String, reference: String },

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Failure to serialize the model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    #[error("sequence flow `{0}` has no source or target")]
    DanglingConnection(String),
}
