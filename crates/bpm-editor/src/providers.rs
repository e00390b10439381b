//! Custom User Task / Service Task actions and the drag-suppression hook.
//!
//! `CustomModule` installs both on a modeler:
//!
//! | Entry                 | Where       | Gesture          | Effect                       |
//! |-----------------------|-------------|------------------|------------------------------|
//! | `create.user-task`    | palette     | dragstart, click | start placing a User Task    |
//! | `create.service-task` | palette     | dragstart, click | start placing a Service Task |
//! | `append.user-task`    | context pad | click            | append a User Task + flow    |
//! | `append.service-task` | context pad | click            | append a Service Task + flow |

use crate::error::ModelingError;
use crate::events::EventKind;
use crate::factory::ShapeAttrs;
use crate::modeler::{Modeler, Module};
use crate::modeling::Appended;
use crate::palette::{
    ActionEvent, ContextPadProvider, Entry, EntryAction, PaletteProvider,
};
use bpm_core::{Element, ElementKey, ElementKind, ModelError, NewShape, Point};
use std::rc::Rc;

/// Runs ahead of the engine's own `drag.init` handler.
pub const DRAG_SUPPRESSION_PRIORITY: u32 = 1500;

/// Horizontal gap between an element and the task appended to it.
pub const APPEND_GAP: f32 = 100.0;

/// The two task kinds these actions create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    User,
    Service,
}

impl TaskKind {
    pub const ALL: [TaskKind; 2] = [TaskKind::User, TaskKind::Service];

    pub fn element_kind(self) -> ElementKind {
        match self {
            TaskKind::User => ElementKind::UserTask,
            TaskKind::Service => ElementKind::ServiceTask,
        }
    }

    /// Display name given to new tasks.
    pub fn default_name(self) -> &'static str {
        match self {
            TaskKind::User => "User Task",
            TaskKind::Service => "Service Task",
        }
    }

    fn slug(self) -> &'static str {
        match self {
            TaskKind::User => "user-task",
            TaskKind::Service => "service-task",
        }
    }
}

// ─── Task factory ────────────────────────────────────────────────────────

/// Builds 100×80 task shapes with their default names.
pub struct TaskFactory;

impl TaskFactory {
    pub const WIDTH: f32 = 100.0;
    pub const HEIGHT: f32 = 80.0;

    pub fn create_task(modeler: &Modeler, task: TaskKind) -> Result<NewShape, ModelingError> {
        let factory = modeler.element_factory();
        let business_object = factory.create_business_object(Some(task.default_name()));
        factory.create_shape(
            ShapeAttrs::new(task.element_kind())
                .with_business_object(business_object)
                .with_size(Self::WIDTH, Self::HEIGHT),
        )
    }
}

// ─── Palette / context pad ───────────────────────────────────────────────

pub struct CustomTaskProvider;

impl CustomTaskProvider {
    /// Register with the palette and the context pad.
    pub fn install(modeler: &mut Modeler) {
        let provider = Rc::new(CustomTaskProvider);
        modeler.palette().register_provider(provider.clone());
        modeler.context_pad().register_provider(provider);
    }

    /// Start placing a new task. Nothing is inserted until the gesture
    /// completes.
    pub fn create_task(
        modeler: &mut Modeler,
        event: &ActionEvent,
        task: TaskKind,
    ) -> Result<(), ModelingError> {
        let shape = TaskFactory::create_task(modeler, task)?;
        modeler.create().start(event, shape)
    }

    /// Append a new task to the right of `source`, connected by one flow.
    pub fn append_task(
        modeler: &mut Modeler,
        source: ElementKey,
        task: TaskKind,
    ) -> Result<Appended, ModelingError> {
        let bounds = modeler
            .element(source)
            .ok_or_else(|| ModelError::UnknownElement(format!("{source:?}")))?
            .bounds()
            .ok_or_else(|| ModelError::NotAShape(format!("{source:?}")))?;
        let shape = TaskFactory::create_task(modeler, task)?;
        let position = Point::new(bounds.x + bounds.width + APPEND_GAP, bounds.y);
        modeler.modeling().append_shape(source, shape, position)
    }
}

impl PaletteProvider for CustomTaskProvider {
    fn palette_entries(&self) -> Vec<Entry> {
        TaskKind::ALL
            .into_iter()
            .map(|task| Entry {
                id: format!("create.{}", task.slug()),
                group: "activity".to_string(),
                class_name: format!("bpmn-icon-{}", task.slug()),
                title: format!("Create {}", task.default_name()),
                action: EntryAction::both(Rc::new(move |modeler: &mut Modeler, event: &ActionEvent| {
                    Self::create_task(modeler, event, task)
                })),
            })
            .collect()
    }
}

impl ContextPadProvider for CustomTaskProvider {
    fn context_pad_entries(&self, element: &Element) -> Vec<Entry> {
        if element.kind.is_connection() {
            return Vec::new();
        }
        let source = element.key;
        TaskKind::ALL
            .into_iter()
            .map(|task| Entry {
                id: format!("append.{}", task.slug()),
                group: "model".to_string(),
                class_name: format!("bpmn-icon-{}", task.slug()),
                title: format!("Append {}", task.default_name()),
                action: EntryAction::click(Rc::new(move |modeler: &mut Modeler, _: &ActionEvent| {
                    Self::append_task(modeler, source, task).map(|_| ())
                })),
            })
            .collect()
    }
}

// ─── Drag suppression ────────────────────────────────────────────────────

/// Stops `drag.init` before the engine's built-in drag handling sees it.
pub struct DragSuppression;

impl DragSuppression {
    pub fn install(modeler: &mut Modeler) {
        modeler.on_with_priority(EventKind::DragInit, DRAG_SUPPRESSION_PRIORITY, |event| {
            event.stop_propagation();
        });
    }
}

// ─── Module ──────────────────────────────────────────────────────────────

/// Installs the custom task provider and drag suppression.
pub struct CustomModule;

impl Module for CustomModule {
    fn name(&self) -> &'static str {
        "customTaskModule"
    }

    fn init(&self, modeler: &mut Modeler) {
        CustomTaskProvider::install(modeler);
        DragSuppression::install(modeler);
    }
}
