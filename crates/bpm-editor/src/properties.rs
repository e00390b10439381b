//! The properties side panel.
//!
//! `PropertiesForm` keeps a snapshot of the selected element's editable
//! fields. Edits update the snapshot at once and hand back a
//! `PropertyChange` for the host to apply to the diagram; the form never
//! touches the model itself.

use bpm_core::{Element, ElementKey, ElementKind, Property};
use serde::Serialize;

pub const PLACEHOLDER: &str = "Select an element to edit properties";

/// Plain string copy of an element's editable fields. Missing values are
/// empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSnapshot {
    pub id: String,
    pub name: String,
    pub documentation: String,
    pub assignee: String,
    pub candidate_users: String,
    pub candidate_groups: String,
    pub due_date: String,
    pub priority: String,
}

impl FormSnapshot {
    pub fn from_element(element: &Element) -> Self {
        let field = |p: Property| element.property(p).unwrap_or_default().to_string();
        Self {
            id: field(Property::Id),
            name: field(Property::Name),
            documentation: field(Property::Documentation),
            assignee: field(Property::Assignee),
            candidate_users: field(Property::CandidateUsers),
            candidate_groups: field(Property::CandidateGroups),
            due_date: field(Property::DueDate),
            priority: field(Property::Priority),
        }
    }

    pub fn get(&self, property: Property) -> &str {
        match property {
            Property::Id => &self.id,
            Property::Name => &self.name,
            Property::Documentation => &self.documentation,
            Property::Assignee => &self.assignee,
            Property::CandidateUsers => &self.candidate_users,
            Property::CandidateGroups => &self.candidate_groups,
            Property::DueDate => &self.due_date,
            Property::Priority => &self.priority,
        }
    }

    fn slot(&mut self, property: Property) -> &mut String {
        match property {
            Property::Id => &mut self.id,
            Property::Name => &mut self.name,
            Property::Documentation => &mut self.documentation,
            Property::Assignee => &mut self.assignee,
            Property::CandidateUsers => &mut self.candidate_users,
            Property::CandidateGroups => &mut self.candidate_groups,
            Property::DueDate => &mut self.due_date,
            Property::Priority => &mut self.priority,
        }
    }
}

/// A field edit the host should push into the diagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyChange {
    pub property: Property,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Binding {
    key: ElementKey,
    kind: ElementKind,
}

#[derive(Debug, Clone, Default)]
pub struct PropertiesForm {
    binding: Option<Binding>,
    snapshot: FormSnapshot,
}

impl PropertiesForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `selected`, or the placeholder when nothing is selected. The
    /// snapshot is rebuilt from scratch either way.
    pub fn render(&mut self, selected: Option<&Element>) -> &FormSnapshot {
        match selected {
            Some(element) => {
                self.binding = Some(Binding {
                    key: element.key,
                    kind: element.kind,
                });
                self.snapshot = FormSnapshot::from_element(element);
            }
            None => {
                self.binding = None;
                self.snapshot = FormSnapshot::default();
            }
        }
        &self.snapshot
    }

    /// A keystroke in one field. Returns the change to forward, or `None`
    /// when that field is not on screen.
    pub fn change(&mut self, property: Property, value: impl Into<String>) -> Option<PropertyChange> {
        let binding = self.binding?;
        if property.is_user_task_only() && binding.kind != ElementKind::UserTask {
            return None;
        }
        let value = value.into();
        *self.snapshot.slot(property) = value.clone();
        Some(PropertyChange { property, value })
    }

    pub fn snapshot(&self) -> &FormSnapshot {
        &self.snapshot
    }

    /// Key of the element the form is showing.
    pub fn bound_to(&self) -> Option<ElementKey> {
        self.binding.map(|b| b.key)
    }

    pub fn shows_user_task_fields(&self) -> bool {
        self.binding.is_some_and(|b| b.kind == ElementKind::UserTask)
    }

    pub fn view(&self) -> FormView {
        let Some(binding) = self.binding else {
            return FormView::Placeholder {
                message: PLACEHOLDER,
            };
        };
        let row = |property: Property| FieldRow::new(property, self.snapshot.get(property));
        let mut groups = vec![FieldGroup {
            title: "General Properties",
            rows: vec![
                row(Property::Id),
                row(Property::Name),
                row(Property::Documentation),
            ],
        }];
        if binding.kind == ElementKind::UserTask {
            groups.push(FieldGroup {
                title: "User Task Properties",
                rows: vec![
                    row(Property::Assignee),
                    row(Property::CandidateUsers),
                    row(Property::CandidateGroups),
                    row(Property::DueDate),
                    row(Property::Priority),
                ],
            });
        }
        FormView::Fields {
            element_type: binding.kind.type_name(),
            groups,
        }
    }
}

// ─── Declarative view ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InputKind {
    Text,
    Textarea { rows: u8 },
    DatetimeLocal,
    Number,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRow {
    pub property: Property,
    pub label: &'static str,
    pub input: InputKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<&'static str>,
    pub value: String,
}

impl FieldRow {
    fn new(property: Property, value: &str) -> Self {
        let (label, input, placeholder) = match property {
            Property::Id => ("ID", InputKind::Text, None),
            Property::Name => ("Name", InputKind::Text, None),
            Property::Documentation => ("Documentation", InputKind::Textarea { rows: 3 }, None),
            Property::Assignee => ("Assignee", InputKind::Text, Some("Enter assignee")),
            Property::CandidateUsers => {
                ("Candidate Users", InputKind::Text, Some("Comma-separated users"))
            }
            Property::CandidateGroups => {
                ("Candidate Groups", InputKind::Text, Some("Comma-separated groups"))
            }
            Property::DueDate => ("Due Date", InputKind::DatetimeLocal, None),
            Property::Priority => ("Priority", InputKind::Number, Some("Task priority")),
        };
        Self {
            property,
            label,
            input,
            placeholder,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldGroup {
    pub title: &'static str,
    pub rows: Vec<FieldRow>,
}

/// What the side panel shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FormView {
    Placeholder {
        message: &'static str,
    },
    Fields {
        #[serde(rename = "elementType")]
        element_type: &'static str,
        groups: Vec<FieldGroup>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpm_core::{Bounds, BusinessObject, Documentation, ElementId, Geometry, NodeIndex};
    use pretty_assertions::assert_eq;

    fn element(id: &str, kind: ElementKind, business_object: BusinessObject) -> Element {
        Element {
            key: NodeIndex::new(id.len()),
            id: ElementId::intern(id),
            kind,
            business_object,
            geometry: Geometry::Shape(Bounds::new(0.0, 0.0, 100.0, 80.0)),
            di_id: format!("{id}_di"),
        }
    }

    fn review_task() -> Element {
        element(
            "Review",
            ElementKind::UserTask,
            BusinessObject {
                name: Some("Review order".into()),
                documentation: vec![Documentation {
                    text: "Check stock".into(),
                }],
                assignee: Some("alice".into()),
                candidate_users: Some("bob, carol".into()),
                candidate_groups: None,
                due_date: Some("2024-05-01T12:00".into()),
                priority: Some("5".into()),
            },
        )
    }

    #[test]
    fn render_copies_fields_with_empty_defaults() {
        let mut form = PropertiesForm::new();
        let snapshot = form.render(Some(&review_task())).clone();
        assert_eq!(
            snapshot,
            FormSnapshot {
                id: "Review".into(),
                name: "Review order".into(),
                documentation: "Check stock".into(),
                assignee: "alice".into(),
                candidate_users: "bob, carol".into(),
                candidate_groups: String::new(),
                due_date: "2024-05-01T12:00".into(),
                priority: "5".into(),
            }
        );
        assert!(form.shows_user_task_fields());
    }

    #[test]
    fn switching_selection_leaves_no_residue() {
        let mut form = PropertiesForm::new();
        form.render(Some(&review_task()));
        form.change(Property::Name, "typed");

        let start = element("Start", ElementKind::StartEvent, BusinessObject::default());
        let snapshot = form.render(Some(&start)).clone();
        assert_eq!(
            snapshot,
            FormSnapshot {
                id: "Start".into(),
                ..FormSnapshot::default()
            }
        );
        assert!(!form.shows_user_task_fields());

        form.render(None);
        assert_eq!(*form.snapshot(), FormSnapshot::default());
        assert_eq!(form.bound_to(), None);
    }

    #[test]
    fn change_updates_one_field_and_returns_one_notification() {
        let mut form = PropertiesForm::new();
        form.render(Some(&review_task()));
        let before = form.snapshot().clone();

        let change = form.change(Property::Assignee, "dave");
        assert_eq!(
            change,
            Some(PropertyChange {
                property: Property::Assignee,
                value: "dave".into()
            })
        );
        assert_eq!(
            *form.snapshot(),
            FormSnapshot {
                assignee: "dave".into(),
                ..before
            }
        );
    }

    #[test]
    fn rapid_edits_last_write_wins() {
        let mut form = PropertiesForm::new();
        form.render(Some(&review_task()));
        let changes: Vec<_> = ["B", "Be", "Beg"]
            .into_iter()
            .filter_map(|v| form.change(Property::Name, v))
            .collect();
        assert_eq!(changes.len(), 3);
        assert_eq!(form.snapshot().name, "Beg");
    }

    #[test]
    fn no_binding_no_notification() {
        let mut form = PropertiesForm::new();
        assert_eq!(form.change(Property::Name, "x"), None);
        let start = element("Start", ElementKind::StartEvent, BusinessObject::default());
        form.render(Some(&start));
        assert_eq!(form.change(Property::Assignee, "x"), None);
        assert_eq!(form.snapshot().assignee, "");
    }

    #[test]
    fn view_groups() {
        let mut form = PropertiesForm::new();
        assert_eq!(
            form.view(),
            FormView::Placeholder {
                message: "Select an element to edit properties"
            }
        );

        let service = element("Bill", ElementKind::ServiceTask, BusinessObject::default());
        form.render(Some(&service));
        let FormView::Fields { groups, .. } = form.view() else {
            panic!("expected fields");
        };
        let titles: Vec<&str> = groups.iter().map(|g| g.title).collect();
        assert_eq!(titles, vec!["General Properties"]);

        form.render(Some(&review_task()));
        let FormView::Fields {
            element_type,
            groups,
        } = form.view()
        else {
            panic!("expected fields");
        };
        assert_eq!(element_type, "bpmn:UserTask");
        assert_eq!(groups[1].title, "User Task Properties");
        assert_eq!(groups[0].rows[2].input, InputKind::Textarea { rows: 3 });
        let due = &groups[1].rows[3];
        assert_eq!((due.label, due.input), ("Due Date", InputKind::DatetimeLocal));
        assert_eq!(groups[1].rows[4].placeholder, Some("Task priority"));
    }

    #[test]
    fn view_serializes_for_the_panel() {
        let mut form = PropertiesForm::new();
        form.render(Some(&review_task()));
        let json = serde_json::to_value(form.view()).unwrap();
        assert_eq!(json["kind"], "fields");
        assert_eq!(json["elementType"], "bpmn:UserTask");
        assert_eq!(json["groups"][1]["rows"][1]["property"], "candidateUsers");
        assert_eq!(json["groups"][1]["rows"][1]["placeholder"], "Comma-separated users");
        assert_eq!(json["groups"][0]["rows"][2]["input"]["type"], "textarea");
        assert_eq!(json["groups"][0]["rows"][2]["input"]["rows"], 3);
        assert_eq!(json["groups"][1]["rows"][3]["input"]["type"], "datetime-local");

        let json = serde_json::to_value(PropertiesForm::new().view()).unwrap();
        assert_eq!(json["kind"], "placeholder");
    }
}
