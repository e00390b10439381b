pub mod emitter;
pub mod error;
pub mod id;
pub mod layout;
pub mod model;
pub mod parser;

pub use emitter::{SaveOptions, emit_document};
pub use error::{ExportError, ImportError, ModelError};
pub use id::ElementId;
pub use layout::{ViewBox, Viewport, fit_diagram, fit_viewport};
pub use model::*;
pub use parser::{ParsedDiagram, parse_document};

// Re-export petgraph types so downstream crates don't need a direct dependency
pub use petgraph::graph::NodeIndex;
