//! Core process-diagram data model.
//!
//! A diagram is a directed graph: every BPMN element (events, tasks,
//! gateways *and* sequence flows) is a node. A sequence flow is linked to
//! its endpoints by two graph edges, `source → flow` and `flow → target`,
//! so connections get the same stable `ElementKey` handles as shapes.
//! Keys survive identifier renames; they are what the editor compares when
//! it needs "the same element".

use crate::error::ModelError;
use crate::id::ElementId;
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Stable handle of an element inside a `DiagramModel`.
pub type ElementKey = NodeIndex;

// ─── Geometry ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned shape bounds, `(x, y)` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn mid(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Smallest bounds containing both.
    pub fn union(&self, other: &Bounds) -> Bounds {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Bounds::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }

    /// Bounds of the shape of size `width × height` centered on `p`.
    pub fn centered_on(p: Point, width: f32, height: f32) -> Bounds {
        Bounds::new(p.x - width / 2.0, p.y - height / 2.0, width, height)
    }
}

/// Visual placement of an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Shape(Bounds),
    Connection { waypoints: SmallVec<[Point; 4]> },
}

// ─── Element kinds ───────────────────────────────────────────────────────

/// The BPMN element types this editor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    StartEvent,
    EndEvent,
    Task,
    UserTask,
    ServiceTask,
    ExclusiveGateway,
    SequenceFlow,
}

impl ElementKind {
    pub const ALL: [ElementKind; 7] = [
        ElementKind::StartEvent,
        ElementKind::EndEvent,
        ElementKind::Task,
        ElementKind::UserTask,
        ElementKind::ServiceTask,
        ElementKind::ExclusiveGateway,
        ElementKind::SequenceFlow,
    ];

    /// Type tag as exposed to the UI, e.g. `bpmn:UserTask`.
    pub fn type_name(self) -> &'static str {
        match self {
            ElementKind::StartEvent => "bpmn:StartEvent",
            ElementKind::EndEvent => "bpmn:EndEvent",
            ElementKind::Task => "bpmn:Task",
            ElementKind::UserTask => "bpmn:UserTask",
            ElementKind::ServiceTask => "bpmn:ServiceTask",
            ElementKind::ExclusiveGateway => "bpmn:ExclusiveGateway",
            ElementKind::SequenceFlow => "bpmn:SequenceFlow",
        }
    }

    /// Local XML element name, e.g. `userTask`.
    pub fn tag(self) -> &'static str {
        match self {
            ElementKind::StartEvent => "startEvent",
            ElementKind::EndEvent => "endEvent",
            ElementKind::Task => "task",
            ElementKind::UserTask => "userTask",
            ElementKind::ServiceTask => "serviceTask",
            ElementKind::ExclusiveGateway => "exclusiveGateway",
            ElementKind::SequenceFlow => "sequenceFlow",
        }
    }

    pub fn from_tag(local: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tag() == local)
    }

    pub fn is_connection(self) -> bool {
        self == ElementKind::SequenceFlow
    }

    /// Default shape size `(width, height)`.
    pub fn default_size(self) -> (f32, f32) {
        match self {
            ElementKind::StartEvent | ElementKind::EndEvent => (36.0, 36.0),
            ElementKind::ExclusiveGateway => (50.0, 50.0),
            ElementKind::SequenceFlow => (0.0, 0.0),
            _ => (100.0, 80.0),
        }
    }

    /// Prefix for generated identifiers.
    pub fn id_prefix(self) -> &'static str {
        match self {
            ElementKind::StartEvent | ElementKind::EndEvent => "Event",
            ElementKind::ExclusiveGateway => "Gateway",
            ElementKind::SequenceFlow => "Flow",
            _ => "Activity",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

// ─── Business object ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Documentation {
    pub text: String,
}

/// The semantic (non-visual) record behind an element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessObject {
    pub name: Option<String>,
    pub documentation: Vec<Documentation>,

    // User task attributes.
    pub assignee: Option<String>,
    /// Raw comma-separated list.
    pub candidate_users: Option<String>,
    /// Raw comma-separated list.
    pub candidate_groups: Option<String>,
    pub due_date: Option<String>,
    pub priority: Option<String>,
}

impl BusinessObject {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Text of the first documentation entry.
    pub fn documentation_text(&self) -> Option<&str> {
        self.documentation.first().map(|d| d.text.as_str())
    }

    pub fn candidate_users_list(&self) -> Vec<&str> {
        split_list(self.candidate_users.as_deref())
    }

    pub fn candidate_groups_list(&self) -> Vec<&str> {
        split_list(self.candidate_groups.as_deref())
    }

    /// Read a property as a string. `Id` is not stored here.
    pub fn get(&self, property: Property) -> Option<&str> {
        match property {
            Property::Id => None,
            Property::Name => self.name.as_deref(),
            Property::Documentation => self.documentation_text(),
            Property::Assignee => self.assignee.as_deref(),
            Property::CandidateUsers => self.candidate_users.as_deref(),
            Property::CandidateGroups => self.candidate_groups.as_deref(),
            Property::DueDate => self.due_date.as_deref(),
            Property::Priority => self.priority.as_deref(),
        }
    }

    /// Write a property. An empty value clears it. `Id` is ignored.
    pub fn set(&mut self, property: Property, value: &str) {
        let v = (!value.is_empty()).then(|| value.to_string());
        match property {
            Property::Id => {}
            Property::Name => self.name = v,
            Property::Documentation => match v {
                Some(text) => match self.documentation.first_mut() {
                    Some(doc) => doc.text = text,
                    None => self.documentation.push(Documentation { text }),
                },
                None => {
                    if !self.documentation.is_empty() {
                        self.documentation.remove(0);
                    }
                }
            },
            Property::Assignee => self.assignee = v,
            Property::CandidateUsers => self.candidate_users = v,
            Property::CandidateGroups => self.candidate_groups = v,
            Property::DueDate => self.due_date = v,
            Property::Priority => self.priority = v,
        }
    }
}

fn split_list(raw: Option<&str>) -> Vec<&str> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

// ─── Editable properties ─────────────────────────────────────────────────

/// An element attribute that can be edited through `update_properties`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Property {
    Id,
    Name,
    Documentation,
    Assignee,
    CandidateUsers,
    CandidateGroups,
    DueDate,
    Priority,
}

impl Property {
    pub const ALL: [Property; 8] = [
        Property::Id,
        Property::Name,
        Property::Documentation,
        Property::Assignee,
        Property::CandidateUsers,
        Property::CandidateGroups,
        Property::DueDate,
        Property::Priority,
    ];

    /// Attribute name as used in the form and in BPMN XML.
    pub fn name(self) -> &'static str {
        match self {
            Property::Id => "id",
            Property::Name => "name",
            Property::Documentation => "documentation",
            Property::Assignee => "assignee",
            Property::CandidateUsers => "candidateUsers",
            Property::CandidateGroups => "candidateGroups",
            Property::DueDate => "dueDate",
            Property::Priority => "priority",
        }
    }

    /// Properties that only exist on `bpmn:UserTask`.
    pub fn is_user_task_only(self) -> bool {
        matches!(
            self,
            Property::Assignee
                | Property::CandidateUsers
                | Property::CandidateGroups
                | Property::DueDate
                | Property::Priority
        )
    }
}

impl FromStr for Property {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Property::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| ModelError::UnknownProperty(s.to_string()))
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Elements ────────────────────────────────────────────────────────────

/// A shape built by the element factory, not yet placed in a diagram.
#[derive(Debug, Clone, PartialEq)]
pub struct NewShape {
    pub id: ElementId,
    pub kind: ElementKind,
    pub business_object: BusinessObject,
    pub width: f32,
    pub height: f32,
}

/// A node or connection of the diagram.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Stable handle, assigned on insertion.
    pub key: ElementKey,
    pub id: ElementId,
    pub kind: ElementKind,
    pub business_object: BusinessObject,
    pub geometry: Geometry,
    /// Identifier of the BPMNDI shape/edge.
    pub di_id: String,
}

impl Element {
    pub fn bounds(&self) -> Option<Bounds> {
        match &self.geometry {
            Geometry::Shape(b) => Some(*b),
            Geometry::Connection { .. } => None,
        }
    }

    pub fn waypoints(&self) -> &[Point] {
        match &self.geometry {
            Geometry::Shape(_) => &[],
            Geometry::Connection { waypoints } => waypoints,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.business_object.name.as_deref()
    }

    /// Read any editable property, including `Id`.
    pub fn property(&self, property: Property) -> Option<&str> {
        match property {
            Property::Id => Some(self.id.as_str()),
            other => self.business_object.get(other),
        }
    }
}

// ─── Definitions ─────────────────────────────────────────────────────────

/// Document-level metadata carried through import/export.
#[derive(Debug, Clone, PartialEq)]
pub struct Definitions {
    pub id: String,
    pub target_namespace: String,
    pub process_id: String,
    pub process_executable: bool,
    pub diagram_id: String,
    pub plane_id: String,
}

impl Default for Definitions {
    fn default() -> Self {
        Self {
            id: "Definitions_1".into(),
            target_namespace: "http://bpmn.io/schema/bpmn".into(),
            process_id: "Process_1".into(),
            process_executable: false,
            diagram_id: "BPMNDiagram_1".into(),
            plane_id: "BPMNPlane_1".into(),
        }
    }
}

// ─── Diagram model ───────────────────────────────────────────────────────

/// The complete in-memory diagram.
#[derive(Debug, Clone, Default)]
pub struct DiagramModel {
    /// Elements as nodes; `source → flow → target` edges for connections.
    pub graph: StableDiGraph<Element, ()>,

    /// Index from ElementId → ElementKey for fast lookup.
    pub id_index: HashMap<ElementId, ElementKey>,

    pub definitions: Definitions,
}

impl DiagramModel {
    #[must_use]
    pub fn new(definitions: Definitions) -> Self {
        Self {
            graph: StableDiGraph::new(),
            id_index: HashMap::new(),
            definitions,
        }
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Insert a shape at `bounds`. Fails on a duplicate or invalid id.
    pub fn add_shape(&mut self, shape: NewShape, bounds: Bounds) -> Result<ElementKey, ModelError> {
        self.check_new_id(shape.id)?;
        let di_id = self.fresh_di_id(shape.id.as_str());
        let key = self.graph.add_node(Element {
            key: ElementKey::end(),
            id: shape.id,
            kind: shape.kind,
            business_object: shape.business_object,
            geometry: Geometry::Shape(bounds),
            di_id,
        });
        self.graph[key].key = key;
        self.id_index.insert(shape.id, key);
        Ok(key)
    }

    /// Insert a sequence flow between two existing shapes.
    pub fn add_connection(
        &mut self,
        id: ElementId,
        source: ElementKey,
        target: ElementKey,
        business_object: BusinessObject,
        waypoints: SmallVec<[Point; 4]>,
    ) -> Result<ElementKey, ModelError> {
        self.check_new_id(id)?;
        for end in [source, target] {
            match self.graph.node_weight(end) {
                Some(e) if !e.kind.is_connection() => {}
                Some(e) => return Err(ModelError::NotAShape(e.id.to_string())),
                None => return Err(ModelError::UnknownElement(format!("{end:?}"))),
            }
        }
        let di_id = self.fresh_di_id(id.as_str());
        let key = self.graph.add_node(Element {
            key: ElementKey::end(),
            id,
            kind: ElementKind::SequenceFlow,
            business_object,
            geometry: Geometry::Connection { waypoints },
            di_id,
        });
        self.graph[key].key = key;
        self.graph.add_edge(source, key, ());
        self.graph.add_edge(key, target, ());
        self.id_index.insert(id, key);
        Ok(key)
    }

    /// Remove an element. Removing a shape also removes its attached
    /// flows. Returns every removed element.
    pub fn remove(&mut self, key: ElementKey) -> Vec<Element> {
        let mut doomed: Vec<ElementKey> = Vec::new();
        if let Some(element) = self.graph.node_weight(key) {
            if !element.kind.is_connection() {
                doomed.extend(self.outgoing(key));
                doomed.extend(self.incoming(key));
            }
            doomed.push(key);
        }
        doomed
            .into_iter()
            .filter_map(|k| {
                let removed = self.graph.remove_node(k)?;
                self.id_index.remove(&removed.id);
                Some(removed)
            })
            .collect()
    }

    pub fn get(&self, key: ElementKey) -> Option<&Element> {
        self.graph.node_weight(key)
    }

    pub fn get_mut(&mut self, key: ElementKey) -> Option<&mut Element> {
        self.graph.node_weight_mut(key)
    }

    /// Look up an element by its BPMN id.
    pub fn get_by_id(&self, id: ElementId) -> Option<&Element> {
        self.id_index.get(&id).map(|key| &self.graph[*key])
    }

    pub fn key_of(&self, id: ElementId) -> Option<ElementKey> {
        self.id_index.get(&id).copied()
    }

    /// Change an element's id, keeping its key. The DI id follows when it
    /// was derived from the old id and the derived name is free.
    pub fn rename(&mut self, key: ElementKey, new_id: &str) -> Result<(), ModelError> {
        let new_id_interned = ElementId::intern(new_id);
        let old_id = self
            .get(key)
            .map(|e| e.id)
            .ok_or_else(|| ModelError::UnknownElement(format!("{key:?}")))?;
        if old_id == new_id_interned {
            return Ok(());
        }
        self.check_new_id(new_id_interned)?;

        let derived = format!("{new_id}_di");
        let follow = self.graph[key].di_id == format!("{}_di", old_id.as_str())
            && !self.is_id_taken(&derived);
        let element = &mut self.graph[key];
        if follow {
            element.di_id = derived;
        }
        element.id = new_id_interned;
        self.id_index.remove(&old_id);
        self.id_index.insert(new_id_interned, key);
        Ok(())
    }

    /// Source shape of a connection.
    pub fn source_of(&self, flow: ElementKey) -> Option<ElementKey> {
        self.graph
            .neighbors_directed(flow, Direction::Incoming)
            .next()
    }

    /// Target shape of a connection.
    pub fn target_of(&self, flow: ElementKey) -> Option<ElementKey> {
        self.graph
            .neighbors_directed(flow, Direction::Outgoing)
            .next()
    }

    /// Flows leaving a shape.
    pub fn outgoing(&self, shape: ElementKey) -> Vec<ElementKey> {
        let mut flows: Vec<_> = self
            .graph
            .neighbors_directed(shape, Direction::Outgoing)
            .collect();
        flows.sort();
        flows
    }

    /// Flows entering a shape.
    pub fn incoming(&self, shape: ElementKey) -> Vec<ElementKey> {
        let mut flows: Vec<_> = self
            .graph
            .neighbors_directed(shape, Direction::Incoming)
            .collect();
        flows.sort();
        flows
    }

    /// All elements in insertion order.
    ///
    /// Sorted by key so output is deterministic regardless of how
    /// `petgraph` iterates on different targets (native vs WASM).
    pub fn elements(&self) -> Vec<&Element> {
        let mut keys: Vec<ElementKey> = self.graph.node_indices().collect();
        keys.sort();
        keys.into_iter().map(|k| &self.graph[k]).collect()
    }

    pub fn shapes(&self) -> impl Iterator<Item = &Element> {
        self.elements()
            .into_iter()
            .filter(|e| !e.kind.is_connection())
    }

    pub fn connections(&self) -> impl Iterator<Item = &Element> {
        self.elements()
            .into_iter()
            .filter(|e| e.kind.is_connection())
    }

    /// Smallest box containing every shape and waypoint.
    pub fn bounding_box(&self) -> Option<Bounds> {
        self.graph
            .node_weights()
            .flat_map(|e| match &e.geometry {
                Geometry::Shape(b) => smallvec![*b],
                Geometry::Connection { waypoints } => waypoints
                    .iter()
                    .map(|p| Bounds::new(p.x, p.y, 0.0, 0.0))
                    .collect::<SmallVec<[Bounds; 4]>>(),
            })
            .reduce(|a, b| a.union(&b))
    }

    /// Generate an id with `prefix` that is not used in this diagram.
    pub fn next_id(&self, prefix: &str) -> ElementId {
        loop {
            let id = ElementId::with_prefix(prefix);
            if !self.is_id_taken(id.as_str()) {
                return id;
            }
        }
    }

    /// Whether `id` already names something in the exported document:
    /// an element, a BPMNDI shape or edge, or a definitions-level id.
    pub fn is_id_taken(&self, id: &str) -> bool {
        let d = &self.definitions;
        [&d.id, &d.process_id, &d.diagram_id, &d.plane_id]
            .into_iter()
            .any(|taken| taken == id)
            || self
                .graph
                .node_weights()
                .any(|e| e.id.as_str() == id || e.di_id == id)
    }

    /// `{id}_di`, suffixed with a counter while that is taken.
    fn fresh_di_id(&self, id: &str) -> String {
        let base = format!("{id}_di");
        let mut candidate = base.clone();
        let mut n = 2;
        while self.is_id_taken(&candidate) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        candidate
    }

    fn check_new_id(&self, id: ElementId) -> Result<(), ModelError> {
        if !ElementId::is_valid(id.as_str()) {
            return Err(ModelError::InvalidId(id.to_string()));
        }
        if self.is_id_taken(id.as_str()) {
            return Err(ModelError::DuplicateId(id.to_string()));
        }
        Ok(())
    }
}

/// Default waypoints between two shapes: right edge to left edge when the
/// target lies to the right, center to center otherwise.
pub fn connection_waypoints(source: &Bounds, target: &Bounds) -> SmallVec<[Point; 4]> {
    if target.x >= source.right() {
        smallvec![
            Point::new(source.right(), source.mid().y),
            Point::new(target.x, target.mid().y),
        ]
    } else {
        smallvec![source.mid(), target.mid()]
    }
}
