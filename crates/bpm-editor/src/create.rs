//! Two-step shape placement and the built-in drag gesture.
//!
//! `Create::start` only records the shape and raises `drag.init`; nothing
//! enters the diagram until `complete` is given a drop point.

use crate::error::ModelingError;
use crate::events::{EventBus, EventData, EventKind};
use crate::modeler::Modeler;
use crate::palette::ActionEvent;
use bpm_core::{Bounds, ElementKey, NewShape, Point};
use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PendingCreate {
    pub(crate) shape: NewShape,
    pub(crate) origin: Point,
}

/// State of the engine's own drag handling. Its `drag.init` listener runs
/// at the default priority, so a higher-priority listener that stops
/// propagation keeps it inactive.
#[derive(Debug, Clone, Default)]
pub struct Dragging {
    active: Rc<Cell<bool>>,
}

impl Dragging {
    pub(crate) fn install(&self, events: &mut EventBus) {
        let active = Rc::clone(&self.active);
        events.on(EventKind::DragInit, move |_| active.set(true));
    }

    /// Whether the built-in handler picked up the current gesture.
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    pub(crate) fn reset(&self) {
        self.active.set(false);
    }
}

pub struct Create<'a> {
    modeler: &'a mut Modeler,
}

impl<'a> Create<'a> {
    pub(crate) fn new(modeler: &'a mut Modeler) -> Self {
        Self { modeler }
    }

    /// Begin placing `shape`. Replaces any gesture already in progress.
    pub fn start(&mut self, event: &ActionEvent, shape: NewShape) -> Result<(), ModelingError> {
        self.modeler.ensure_alive()?;
        if let Some(previous) = self.modeler.pending_create.take() {
            log::debug!("dropping unfinished creation of {}", previous.shape.id);
        }
        self.modeler.dragging.reset();
        self.modeler.pending_create = Some(PendingCreate {
            shape: shape.clone(),
            origin: event.point,
        });
        self.modeler.events.fire(EventData::DragInit {
            shape,
            origin: event.point,
        });
        Ok(())
    }

    /// Drop the pending shape centered on `point` and select it.
    pub fn complete(&mut self, point: Point) -> Result<ElementKey, ModelingError> {
        self.modeler.ensure_alive()?;
        let pending = self
            .modeler
            .pending_create
            .take()
            .ok_or(ModelingError::NoActiveGesture)?;
        self.modeler.dragging.reset();

        let bounds = Bounds::centered_on(point, pending.shape.width, pending.shape.height);
        let key = self.modeler.model.add_shape(pending.shape, bounds)?;
        self.modeler.fire_changed(key);
        self.modeler.set_selection(vec![key]);
        Ok(key)
    }

    /// Abandon the gesture, returning the shape that was being placed.
    pub fn cancel(&mut self) -> Option<NewShape> {
        self.modeler.dragging.reset();
        self.modeler.pending_create.take().map(|p| p.shape)
    }

    pub fn is_active(&self) -> bool {
        self.modeler.pending_create.is_some()
    }

    pub fn pending(&self) -> Option<&NewShape> {
        self.modeler.pending_create.as_ref().map(|p| &p.shape)
    }

    /// Where the gesture started.
    pub fn origin(&self) -> Option<Point> {
        self.modeler.pending_create.as_ref().map(|p| p.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_DIAGRAM, ModelerOptions};
    use bpm_core::{BusinessObject, ElementId, ElementKind};
    use pretty_assertions::assert_eq;

    fn service_task() -> NewShape {
        NewShape {
            id: ElementId::intern("Activity_pending"),
            kind: ElementKind::ServiceTask,
            business_object: BusinessObject::named("Service Task"),
            width: 100.0,
            height: 80.0,
        }
    }

    fn loaded() -> Modeler {
        let mut modeler = Modeler::new(ModelerOptions::default(), &[]);
        modeler.import_xml(DEFAULT_DIAGRAM).unwrap();
        modeler
    }

    #[test]
    fn start_inserts_nothing() {
        let mut modeler = loaded();
        let before = modeler.model().len();
        modeler
            .create()
            .start(&ActionEvent::click(Point::new(10.0, 10.0)), service_task())
            .unwrap();
        assert_eq!(modeler.model().len(), before);
        assert!(modeler.create().is_active());
        assert!(modeler.dragging().is_active());
    }

    #[test]
    fn complete_centers_and_selects() {
        let mut modeler = loaded();
        modeler
            .create()
            .start(&ActionEvent::drag_start(Point::default()), service_task())
            .unwrap();
        let key = modeler.create().complete(Point::new(300.0, 200.0)).unwrap();

        let placed = modeler.element(key).unwrap();
        assert_eq!(placed.bounds(), Some(Bounds::new(250.0, 160.0, 100.0, 80.0)));
        assert_eq!(placed.name(), Some("Service Task"));
        assert_eq!(modeler.selected(), &[key]);
        assert!(!modeler.create().is_active());
        assert!(!modeler.dragging().is_active());
    }

    #[test]
    fn complete_without_start_fails() {
        let mut modeler = loaded();
        assert_eq!(
            modeler.create().complete(Point::default()),
            Err(ModelingError::NoActiveGesture)
        );
    }

    #[test]
    fn cancel_returns_shape() {
        let mut modeler = loaded();
        modeler
            .create()
            .start(&ActionEvent::click(Point::default()), service_task())
            .unwrap();
        let shape = modeler.create().cancel().unwrap();
        assert_eq!(shape.kind, ElementKind::ServiceTask);
        assert!(!modeler.create().is_active());
        assert_eq!(modeler.model().len(), 1);
    }
}
