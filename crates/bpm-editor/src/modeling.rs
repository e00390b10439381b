//! The modeling service: every change to the diagram goes through here and
//! raises `element.changed` for each element it touched.

use crate::error::ModelingError;
use crate::modeler::Modeler;
use bpm_core::{
    Bounds, BusinessObject, Element, ElementKey, ElementKind, Geometry, ModelError, NewShape,
    Point, Property, connection_waypoints,
};
use std::collections::BTreeSet;

/// Result of `append_shape`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Appended {
    pub shape: ElementKey,
    /// The sequence flow from the source to the new shape.
    pub connection: ElementKey,
}

pub struct Modeling<'a> {
    modeler: &'a mut Modeler,
}

impl<'a> Modeling<'a> {
    pub(crate) fn new(modeler: &'a mut Modeler) -> Self {
        Self { modeler }
    }

    /// Set properties on one element. Either every property is applied or
    /// none is. An empty value clears the property; `Id` renames the
    /// element.
    pub fn update_properties(
        &mut self,
        key: ElementKey,
        properties: &[(Property, &str)],
    ) -> Result<(), ModelingError> {
        self.modeler.ensure_alive()?;
        let element = self.element(key)?;
        let kind = element.kind;
        let current_id = element.id;

        for (property, _) in properties {
            if property.is_user_task_only() && kind != ElementKind::UserTask {
                return Err(ModelingError::NotApplicable {
                    property: *property,
                    kind,
                });
            }
        }

        // Rename first: it is the only step that can fail.
        let new_id = properties
            .iter()
            .rev()
            .find(|(p, _)| *p == Property::Id)
            .map(|(_, v)| *v);
        if let Some(new_id) = new_id {
            if new_id != current_id.as_str() {
                self.modeler.model.rename(key, new_id)?;
            }
        }

        if let Some(element) = self.modeler.model.get_mut(key) {
            for (property, value) in properties {
                element.business_object.set(*property, value);
            }
        }
        log::debug!("updated {} properties of {}", properties.len(), current_id);
        self.modeler.fire_changed(key);
        Ok(())
    }

    /// Insert `shape` with its top-left corner at `position` and connect
    /// `source` to it with one sequence flow.
    pub fn append_shape(
        &mut self,
        source: ElementKey,
        shape: NewShape,
        position: Point,
    ) -> Result<Appended, ModelingError> {
        self.modeler.ensure_alive()?;
        let source_element = self.shape(source)?;
        check_connection(source_element, shape.kind, shape.id.as_str())?;

        let bounds = Bounds::new(position.x, position.y, shape.width, shape.height);
        let shape_key = self.modeler.model.add_shape(shape, bounds)?;
        let connection = match self.insert_flow(source, shape_key) {
            Ok(connection) => connection,
            Err(err) => {
                self.modeler.model.remove(shape_key);
                return Err(err);
            }
        };

        self.modeler.fire_changed(shape_key);
        self.modeler.fire_changed(connection);
        self.modeler.fire_changed(source);
        Ok(Appended {
            shape: shape_key,
            connection,
        })
    }

    /// Connect two shapes with a new sequence flow.
    pub fn connect(
        &mut self,
        source: ElementKey,
        target: ElementKey,
    ) -> Result<ElementKey, ModelingError> {
        self.modeler.ensure_alive()?;
        let source_element = self.shape(source)?;
        let target_element = self.shape(target)?;
        if source == target {
            return Err(ModelingError::ConnectionNotAllowed {
                source_id: source_element.id.to_string(),
                target_id: target_element.id.to_string(),
                reason: "an element cannot connect to itself",
            });
        }
        check_connection(source_element, target_element.kind, target_element.id.as_str())?;

        let connection = self.insert_flow(source, target)?;
        self.modeler.fire_changed(connection);
        self.modeler.fire_changed(source);
        self.modeler.fire_changed(target);
        Ok(connection)
    }

    /// Remove elements and the flows attached to removed shapes. Removed
    /// elements leave the selection first.
    pub fn remove_elements(&mut self, keys: &[ElementKey]) -> Result<Vec<Element>, ModelingError> {
        self.modeler.ensure_alive()?;
        let model = &self.modeler.model;
        let mut doomed: BTreeSet<ElementKey> = BTreeSet::new();
        for &key in keys {
            let element = model
                .get(key)
                .ok_or_else(|| ModelError::UnknownElement(format!("{key:?}")))?;
            if !element.kind.is_connection() {
                doomed.extend(model.outgoing(key));
                doomed.extend(model.incoming(key));
            }
            doomed.insert(key);
        }

        // Endpoints that survive lose a flow.
        let touched: BTreeSet<ElementKey> = doomed
            .iter()
            .filter(|k| model.get(**k).is_some_and(|e| e.kind.is_connection()))
            .flat_map(|k| [model.source_of(*k), model.target_of(*k)])
            .flatten()
            .filter(|k| !doomed.contains(k))
            .collect();

        let remaining: Vec<ElementKey> = self
            .modeler
            .selected
            .iter()
            .copied()
            .filter(|k| !doomed.contains(k))
            .collect();
        self.modeler.set_selection(remaining);

        let removed: Vec<Element> = doomed
            .into_iter()
            .flat_map(|k| self.modeler.model.remove(k))
            .collect();
        log::debug!("removed {} elements", removed.len());
        for key in touched {
            self.modeler.fire_changed(key);
        }
        Ok(removed)
    }

    /// Move shapes by `delta`. Flows attached to a moved shape are laid out
    /// again between their endpoints; connections passed in `keys` are
    /// ignored.
    pub fn move_elements(&mut self, keys: &[ElementKey], delta: Point) -> Result<(), ModelingError> {
        self.modeler.ensure_alive()?;
        let mut moved: BTreeSet<ElementKey> = BTreeSet::new();
        for &key in keys {
            let element = self.element(key)?;
            if !element.kind.is_connection() {
                moved.insert(key);
            }
        }

        for &key in &moved {
            if let Some(element) = self.modeler.model.get_mut(key) {
                if let Geometry::Shape(bounds) = &mut element.geometry {
                    bounds.x += delta.x;
                    bounds.y += delta.y;
                }
            }
        }

        let model = &self.modeler.model;
        let flows: BTreeSet<ElementKey> = moved
            .iter()
            .flat_map(|k| model.outgoing(*k).into_iter().chain(model.incoming(*k)))
            .collect();
        for &flow in &flows {
            self.relayout(flow);
        }

        for key in moved.into_iter().chain(flows) {
            self.modeler.fire_changed(key);
        }
        Ok(())
    }

    // ─── Helpers ─────────────────────────────────────────────────────────

    fn element(&self, key: ElementKey) -> Result<&Element, ModelingError> {
        self.modeler
            .model
            .get(key)
            .ok_or_else(|| ModelError::UnknownElement(format!("{key:?}")).into())
    }

    fn shape(&self, key: ElementKey) -> Result<&Element, ModelingError> {
        let element = self.element(key)?;
        if element.kind.is_connection() {
            return Err(ModelError::NotAShape(element.id.to_string()).into());
        }
        Ok(element)
    }

    fn insert_flow(&mut self, source: ElementKey, target: ElementKey) -> Result<ElementKey, ModelingError> {
        let model = &mut self.modeler.model;
        let waypoints = match (
            model.get(source).and_then(Element::bounds),
            model.get(target).and_then(Element::bounds),
        ) {
            (Some(s), Some(t)) => connection_waypoints(&s, &t),
            _ => Default::default(),
        };
        let id = model.next_id(ElementKind::SequenceFlow.id_prefix());
        Ok(model.add_connection(id, source, target, BusinessObject::default(), waypoints)?)
    }

    fn relayout(&mut self, flow: ElementKey) {
        let model = &mut self.modeler.model;
        let ends = (
            model.source_of(flow).and_then(|k| model.get(k)).and_then(Element::bounds),
            model.target_of(flow).and_then(|k| model.get(k)).and_then(Element::bounds),
        );
        if let ((Some(source), Some(target)), Some(element)) = (ends, model.get_mut(flow)) {
            element.geometry = Geometry::Connection {
                waypoints: connection_waypoints(&source, &target),
            };
        }
    }
}

/// Sequence-flow rules: end events have no outgoing flows, start events no
/// incoming ones.
fn check_connection(
    source: &Element,
    target_kind: ElementKind,
    target_id: &str,
) -> Result<(), ModelingError> {
    let reason = if source.kind == ElementKind::EndEvent {
        Some("end events have no outgoing flows")
    } else if target_kind == ElementKind::StartEvent {
        Some("start events have no incoming flows")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(ModelingError::ConnectionNotAllowed {
            source_id: source.id.to_string(),
            target_id: target_id.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_DIAGRAM, ModelerOptions};
    use crate::events::{EventData, EventKind};
    use bpm_core::{ElementId, SaveOptions};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn loaded() -> (Modeler, ElementKey) {
        let mut modeler = Modeler::new(ModelerOptions::default(), &[]);
        modeler.import_xml(DEFAULT_DIAGRAM).unwrap();
        let start = modeler.element_by_id("StartEvent_1").unwrap().key;
        (modeler, start)
    }

    fn shape(id: &str, kind: ElementKind) -> NewShape {
        let (width, height) = kind.default_size();
        NewShape {
            id: ElementId::intern(id),
            kind,
            business_object: BusinessObject::default(),
            width,
            height,
        }
    }

    fn changed_ids(modeler: &mut Modeler) -> Rc<RefCell<Vec<String>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        modeler.on(EventKind::ElementChanged, move |event| {
            if let EventData::ElementChanged { element } = event.data() {
                sink.borrow_mut().push(element.id.to_string());
            }
        });
        seen
    }

    #[test]
    fn update_name_fires_element_changed() {
        let (mut modeler, start) = loaded();
        let seen = changed_ids(&mut modeler);
        modeler
            .modeling()
            .update_properties(start, &[(Property::Name, "Begin")])
            .unwrap();
        assert_eq!(modeler.element(start).unwrap().name(), Some("Begin"));
        assert_eq!(*seen.borrow(), vec!["StartEvent_1"]);
    }

    #[test]
    fn update_id_renames_and_keeps_key() {
        let (mut modeler, start) = loaded();
        modeler
            .modeling()
            .update_properties(start, &[(Property::Id, "Kickoff")])
            .unwrap();
        assert_eq!(modeler.element(start).unwrap().id.as_str(), "Kickoff");
        assert!(modeler.element_by_id("StartEvent_1").is_none());
    }

    #[test]
    fn invalid_id_changes_nothing() {
        let (mut modeler, start) = loaded();
        let err = modeler
            .modeling()
            .update_properties(start, &[(Property::Name, "Begin"), (Property::Id, "1 bad")])
            .unwrap_err();
        assert_eq!(err, ModelingError::Model(ModelError::InvalidId("1 bad".into())));
        assert_eq!(modeler.element(start).unwrap().name(), None);
    }

    #[test]
    fn id_taken_by_diagram_interchange_or_definitions_is_rejected() {
        let (mut modeler, start) = loaded();
        for taken in ["_BPMNShape_StartEvent_2", "BPMNPlane_1", "sample-diagram"] {
            let err = modeler
                .modeling()
                .update_properties(start, &[(Property::Id, taken)])
                .unwrap_err();
            assert_eq!(err, ModelingError::Model(ModelError::DuplicateId(taken.into())));
        }

        let xml = modeler.save_xml(SaveOptions::default()).unwrap();
        assert_eq!(xml.matches(r#"id="BPMNPlane_1""#).count(), 1);
        assert_eq!(xml.matches(r#"id="_BPMNShape_StartEvent_2""#).count(), 1);
        assert!(modeler.element_by_id("StartEvent_1").is_some());
    }

    #[test]
    fn user_task_fields_rejected_elsewhere() {
        let (mut modeler, start) = loaded();
        let err = modeler
            .modeling()
            .update_properties(start, &[(Property::Assignee, "alice")])
            .unwrap_err();
        assert_eq!(
            err,
            ModelingError::NotApplicable {
                property: Property::Assignee,
                kind: ElementKind::StartEvent
            }
        );
    }

    #[test]
    fn append_places_shape_and_one_flow() {
        let (mut modeler, start) = loaded();
        let appended = modeler
            .modeling()
            .append_shape(start, shape("Task_new", ElementKind::UserTask), Point::new(548.0, 240.0))
            .unwrap();

        let model = modeler.model();
        assert_eq!(
            model.get(appended.shape).unwrap().bounds(),
            Some(Bounds::new(548.0, 240.0, 100.0, 80.0))
        );
        assert_eq!(model.outgoing(start), vec![appended.connection]);
        assert_eq!(model.source_of(appended.connection), Some(start));
        assert_eq!(model.target_of(appended.connection), Some(appended.shape));
        assert_eq!(model.connections().count(), 1);
    }

    #[test]
    fn append_to_end_event_is_rejected_without_side_effects() {
        let (mut modeler, start) = loaded();
        let end = modeler
            .modeling()
            .append_shape(start, shape("End_1", ElementKind::EndEvent), Point::new(500.0, 240.0))
            .unwrap()
            .shape;
        let before = modeler.model().len();
        let err = modeler
            .modeling()
            .append_shape(end, shape("Task_after_end", ElementKind::Task), Point::new(600.0, 240.0))
            .unwrap_err();
        assert!(matches!(err, ModelingError::ConnectionNotAllowed { .. }));
        assert_eq!(modeler.model().len(), before);
    }

    #[test]
    fn connect_rules() {
        let (mut modeler, start) = loaded();
        let task = modeler
            .modeling()
            .append_shape(start, shape("Task_c", ElementKind::Task), Point::new(500.0, 220.0))
            .unwrap()
            .shape;

        assert!(matches!(
            modeler.modeling().connect(task, start),
            Err(ModelingError::ConnectionNotAllowed { .. })
        ));
        assert!(matches!(
            modeler.modeling().connect(task, task),
            Err(ModelingError::ConnectionNotAllowed { .. })
        ));
        let flow = modeler.modeling().connect(start, task).unwrap();
        assert_eq!(modeler.model().target_of(flow), Some(task));
    }

    #[test]
    fn remove_drops_attached_flows_and_selection() {
        let (mut modeler, start) = loaded();
        let appended = modeler
            .modeling()
            .append_shape(start, shape("Task_r", ElementKind::Task), Point::new(548.0, 240.0))
            .unwrap();
        modeler.selection().select(&[appended.shape]);

        let removed = modeler.modeling().remove_elements(&[appended.shape]).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(modeler.selected().is_empty());
        assert_eq!(modeler.model().len(), 1);
        assert!(modeler.model().outgoing(start).is_empty());
    }

    #[test]
    fn move_relayouts_attached_flows() {
        let (mut modeler, start) = loaded();
        let appended = modeler
            .modeling()
            .append_shape(start, shape("Task_m", ElementKind::Task), Point::new(548.0, 240.0))
            .unwrap();
        let seen = changed_ids(&mut modeler);

        modeler
            .modeling()
            .move_elements(&[appended.shape], Point::new(0.0, 100.0))
            .unwrap();

        let model = modeler.model();
        assert_eq!(
            model.get(appended.shape).unwrap().bounds(),
            Some(Bounds::new(548.0, 340.0, 100.0, 80.0))
        );
        assert_eq!(
            model.get(appended.connection).unwrap().waypoints(),
            &[Point::new(448.0, 258.0), Point::new(548.0, 380.0)]
        );
        assert_eq!(seen.borrow().len(), 2);
    }
}
