pub mod canvas;
pub mod config;
pub mod create;
pub mod error;
pub mod events;
pub mod factory;
pub mod modeler;
pub mod modeling;
pub mod palette;
pub mod properties;
pub mod providers;
pub mod selection;
pub mod shell;

pub use config::{DEFAULT_DIAGRAM, EditorConfig, ModelerOptions, ZoomMode};
pub use error::{DownloadError, EditorError, EngineError, ModelingError};
pub use events::{Event, EventBus, EventData, EventKind};
pub use modeler::{ImportResult, Modeler, Module};
pub use palette::{ActionEvent, ActionTrigger, Entry};
pub use properties::{FormSnapshot, FormView, PropertiesForm, PropertyChange};
pub use providers::{CustomModule, CustomTaskProvider, DragSuppression, TaskFactory, TaskKind};
pub use shell::{DownloadFile, Downloader, EditorShell, EngineState};
