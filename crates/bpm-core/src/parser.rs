//! Parser for BPMN 2.0 XML → `DiagramModel`.
//!
//! Built on `winnow` 0.7. Two passes: a small XML reader produces an
//! element tree, then the BPMN builder walks `definitions/process` for
//! semantics and `BPMNDiagram/BPMNPlane` for shape bounds and edge
//! waypoints. Namespace prefixes are not resolved; elements and
//! attributes are matched by local name, so `bpmn:`, `bpmn2:` and
//! `camunda:` documents all import. Unsupported content is skipped with a
//! warning rather than failing the import.

use crate::error::ImportError;
use crate::id::ElementId;
use crate::model::*;
use smallvec::SmallVec;
use std::collections::HashMap;
use winnow::ascii::multispace0;
use winnow::combinator::{alt, delimited};
use winnow::error::{ContextError, ErrMode, StrContext};
use winnow::prelude::*;
use winnow::token::{take_till, take_until, take_while};

/// An imported diagram plus the non-fatal problems found on the way.
#[derive(Debug, Clone)]
pub struct ParsedDiagram {
    pub model: DiagramModel,
    pub warnings: Vec<String>,
}

/// Parse a BPMN 2.0 XML document.
#[must_use = "parsing result should be used"]
pub fn parse_document(input: &str) -> Result<ParsedDiagram, ImportError> {
    let root = parse_xml(input)?;
    if root.local_name() != "definitions" {
        return Err(ImportError::MissingDefinitions);
    }
    Builder::default().build(&root)
}

// ─── XML tree ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct XmlElement {
    /// Qualified name, e.g. `bpmn2:startEvent`.
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<XmlElement>,
    text: String,
}

impl XmlElement {
    fn local_name(&self) -> &str {
        local(&self.name)
    }

    /// Attribute by local name; namespace declarations never match.
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| !k.starts_with("xmlns") && local(k) == name)
            .map(|(_, v)| v.as_str())
    }

    fn required_attr(&self, name: &'static str) -> Result<&str, ImportError> {
        self.attr(name).ok_or_else(|| ImportError::MissingAttribute {
            element: self.name.clone(),
            attribute: name,
        })
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.local_name() == name)
    }

    fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.local_name() == name)
    }
}

fn local(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// Deepest element nesting the reader accepts.
const MAX_DEPTH: usize = 256;
const TOO_DEEP: &str = "nesting too deep";

fn parse_xml(input: &str) -> Result<XmlElement, ImportError> {
    let mut rest = input;
    match parse_root(&mut rest) {
        Ok(root) if rest.is_empty() => Ok(root),
        Err(ErrMode::Backtrack(e) | ErrMode::Cut(e))
            if e.context().any(|c| matches!(c, StrContext::Label(l) if *l == TOO_DEEP)) =>
        {
            Err(ImportError::Xml(TOO_DEEP.to_string()))
        }
        _ => Err(xml_error(input, rest)),
    }
}

fn parse_root(input: &mut &str) -> ModalResult<XmlElement> {
    skip_misc(input)?;
    let root = parse_element(input, 0)?;
    skip_misc(input)?;
    Ok(root)
}

fn xml_error(input: &str, rest: &str) -> ImportError {
    let offset = input.len() - rest.len();
    let line = input[..offset].matches('\n').count() + 1;
    let near: String = rest.chars().take(24).collect();
    ImportError::Xml(format!("unexpected input at line {line}: `{near}`"))
}

// ─── Low-level parsers ──────────────────────────────────────────────────

fn skip_space(input: &mut &str) {
    let _: ModalResult<&str> = multispace0.parse_next(input);
}

/// Skip whitespace, processing instructions, comments and doctype.
fn skip_misc(input: &mut &str) -> ModalResult<()> {
    loop {
        skip_space(input);
        if input.starts_with("<?") {
            let _ = "<?".parse_next(input)?;
            let _: &str = take_until(0.., "?>").parse_next(input)?;
            let _ = "?>".parse_next(input)?;
        } else if input.starts_with("<!--") {
            parse_comment(input)?;
        } else if input.starts_with("<!DOCTYPE") {
            let _: &str = take_till(0.., '>').parse_next(input)?;
            let _ = '>'.parse_next(input)?;
        } else {
            return Ok(());
        }
    }
}

fn parse_comment(input: &mut &str) -> ModalResult<()> {
    let _ = "<!--".parse_next(input)?;
    let _: &str = take_until(0.., "-->").parse_next(input)?;
    let _ = "-->".parse_next(input)?;
    Ok(())
}

fn parse_name<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| {
        c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
    })
    .parse_next(input)
}

fn parse_attr_value<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    alt((
        delimited('"', take_till(0.., '"'), '"'),
        delimited('\'', take_till(0.., '\''), '\''),
    ))
    .parse_next(input)
}

fn parse_attribute(input: &mut &str) -> ModalResult<(String, String)> {
    let name = parse_name.parse_next(input)?;
    skip_space(input);
    let _ = '='.parse_next(input)?;
    skip_space(input);
    let raw = parse_attr_value.parse_next(input)?;
    Ok((name.to_string(), unescape(raw)))
}

fn parse_element(input: &mut &str, depth: usize) -> ModalResult<XmlElement> {
    if depth >= MAX_DEPTH {
        let mut e = ContextError::new();
        e.push(StrContext::Label(TOO_DEEP));
        return Err(ErrMode::Cut(e));
    }
    let _ = '<'.parse_next(input)?;
    let name = parse_name.parse_next(input)?.to_string();
    let mut element = XmlElement {
        name,
        ..XmlElement::default()
    };

    loop {
        skip_space(input);
        if input.starts_with("/>") {
            let _ = "/>".parse_next(input)?;
            return Ok(element);
        }
        if input.starts_with('>') {
            let _ = '>'.parse_next(input)?;
            break;
        }
        element.attrs.push(parse_attribute.parse_next(input)?);
    }

    loop {
        if input.starts_with("</") {
            let _ = "</".parse_next(input)?;
            let close = parse_name.parse_next(input)?;
            if close != element.name {
                return Err(ErrMode::Cut(ContextError::new()));
            }
            skip_space(input);
            let _ = '>'.parse_next(input)?;
            break;
        } else if input.starts_with("<!--") {
            parse_comment(input)?;
        } else if input.starts_with("<![CDATA[") {
            let _ = "<![CDATA[".parse_next(input)?;
            let data: &str = take_until(0.., "]]>").parse_next(input)?;
            let _ = "]]>".parse_next(input)?;
            element.text.push_str(data);
        } else if input.starts_with('<') {
            element.children.push(parse_element(input, depth + 1)?);
        } else if input.is_empty() {
            return Err(ErrMode::Cut(ContextError::new()));
        } else {
            let chunk: &str = take_till(1.., '<').parse_next(input)?;
            element.text.push_str(&unescape(chunk));
        }
    }

    Ok(element)
}

/// Resolve the predefined entities and numeric character references.
fn unescape(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let Some(semi) = rest.find(';') else {
            break;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

// ─── BPMN builder ───────────────────────────────────────────────────────

#[derive(Debug)]
struct DiShape {
    id: String,
    bounds: Bounds,
}

#[derive(Debug)]
struct DiEdge {
    id: String,
    waypoints: SmallVec<[Point; 4]>,
}

#[derive(Default)]
struct Builder {
    shapes: HashMap<String, DiShape>,
    edges: HashMap<String, DiEdge>,
    warnings: Vec<String>,
}

impl Builder {
    fn build(mut self, root: &XmlElement) -> Result<ParsedDiagram, ImportError> {
        let mut definitions = Definitions {
            id: root.attr("id").unwrap_or("Definitions_1").to_string(),
            ..Definitions::default()
        };
        if let Some(ns) = root.attr("targetNamespace") {
            definitions.target_namespace = ns.to_string();
        }

        let mut processes = root.children_named("process");
        let process = processes.next();
        if processes.next().is_some() {
            self.warnings
                .push("multiple processes found, only the first is imported".into());
        }
        if let Some(process) = process {
            definitions.process_id = process.required_attr("id")?.to_string();
            definitions.process_executable = process.attr("isExecutable") == Some("true");
        }

        if let Some(diagram) = root.child("BPMNDiagram") {
            if let Some(id) = diagram.attr("id") {
                definitions.diagram_id = id.to_string();
            }
            if let Some(plane) = diagram.child("BPMNPlane") {
                if let Some(id) = plane.attr("id") {
                    definitions.plane_id = id.to_string();
                }
                self.collect_di(plane);
            }
        }

        let mut model = DiagramModel::new(definitions);
        if let Some(process) = process {
            self.build_process(&mut model, process)?;
        }

        log::debug!(
            "imported {} elements with {} warnings",
            model.len(),
            self.warnings.len()
        );
        Ok(ParsedDiagram {
            model,
            warnings: self.warnings,
        })
    }

    fn collect_di(&mut self, plane: &XmlElement) {
        for child in &plane.children {
            let Some(element_ref) = child.attr("bpmnElement") else {
                continue;
            };
            let id = child.attr("id").unwrap_or_default().to_string();
            match child.local_name() {
                "BPMNShape" => {
                    let Some(b) = child.child("Bounds") else {
                        self.warnings
                            .push(format!("shape for `{element_ref}` has no bounds"));
                        continue;
                    };
                    let bounds = Bounds::new(
                        num_attr(b, "x"),
                        num_attr(b, "y"),
                        num_attr(b, "width"),
                        num_attr(b, "height"),
                    );
                    self.shapes
                        .insert(element_ref.to_string(), DiShape { id, bounds });
                }
                "BPMNEdge" => {
                    let waypoints = child
                        .children_named("waypoint")
                        .map(|w| Point::new(num_attr(w, "x"), num_attr(w, "y")))
                        .collect();
                    self.edges
                        .insert(element_ref.to_string(), DiEdge { id, waypoints });
                }
                _ => {}
            }
        }
    }

    fn build_process(
        &mut self,
        model: &mut DiagramModel,
        process: &XmlElement,
    ) -> Result<(), ImportError> {
        let mut flows = Vec::new();

        for child in &process.children {
            let local_name = child.local_name();
            match ElementKind::from_tag(local_name) {
                Some(ElementKind::SequenceFlow) => flows.push(child),
                Some(kind) => self.add_shape(model, kind, child)?,
                None if local_name == "documentation" || local_name == "extensionElements" => {}
                None => self.warnings.push(format!(
                    "unsupported element <{}> `{}` skipped",
                    child.name,
                    child.attr("id").unwrap_or("?")
                )),
            }
        }

        for flow in flows {
            self.add_flow(model, flow)?;
        }
        Ok(())
    }

    fn add_shape(
        &mut self,
        model: &mut DiagramModel,
        kind: ElementKind,
        node: &XmlElement,
    ) -> Result<(), ImportError> {
        let id = node.required_attr("id")?;
        let (width, height) = kind.default_size();
        let di = self.shapes.remove(id);
        let bounds = match &di {
            Some(di) => di.bounds,
            None => {
                self.warnings
                    .push(format!("no diagram shape for `{id}`, placed at origin"));
                Bounds::new(0.0, 0.0, width, height)
            }
        };

        let key = model.add_shape(
            NewShape {
                id: ElementId::intern(id),
                kind,
                business_object: business_object(node),
                width: bounds.width,
                height: bounds.height,
            },
            bounds,
        )?;
        if let Some(di) = di
            && !di.id.is_empty()
            && let Some(element) = model.get_mut(key)
        {
            element.di_id = di.id;
        }
        Ok(())
    }

    fn add_flow(&mut self, model: &mut DiagramModel, node: &XmlElement) -> Result<(), ImportError> {
        let id = node.required_attr("id")?;
        let resolve = |attribute: &'static str| -> Result<ElementKey, ImportError> {
            let reference = node.required_attr(attribute)?;
            model
                .key_of(ElementId::intern(reference))
                .ok_or_else(|| ImportError::UnresolvedReference {
                    flow: id.to_string(),
                    reference: reference.to_string(),
                })
        };
        let source = resolve("sourceRef")?;
        let target = resolve("targetRef")?;

        let di = self.edges.remove(id);
        let waypoints = match &di {
            Some(di) if di.waypoints.len() >= 2 => di.waypoints.clone(),
            _ => {
                let (Some(s), Some(t)) = (
                    model.get(source).and_then(Element::bounds),
                    model.get(target).and_then(Element::bounds),
                ) else {
                    return Err(ImportError::UnresolvedReference {
                        flow: id.to_string(),
                        reference: "shape".into(),
                    });
                };
                connection_waypoints(&s, &t)
            }
        };

        let key = model.add_connection(
            ElementId::intern(id),
            source,
            target,
            business_object(node),
            waypoints,
        )?;
        if let Some(di) = di
            && !di.id.is_empty()
            && let Some(element) = model.get_mut(key)
        {
            element.di_id = di.id;
        }
        Ok(())
    }
}

fn business_object(node: &XmlElement) -> BusinessObject {
    let owned = |name: &str| node.attr(name).map(str::to_string);
    BusinessObject {
        name: owned("name"),
        documentation: node
            .children_named("documentation")
            .map(|d| Documentation {
                text: d.text.clone(),
            })
            .collect(),
        assignee: owned("assignee"),
        candidate_users: owned("candidateUsers"),
        candidate_groups: owned("candidateGroups"),
        due_date: owned("dueDate"),
        priority: owned("priority"),
    }
}

fn num_attr(node: &XmlElement, name: &str) -> f32 {
    node.attr(name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MINIMAL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<bpmn2:definitions xmlns:bpmn2="http://www.omg.org/spec/BPMN/20100524/MODEL"
  xmlns:bpmndi="http://www.omg.org/spec/BPMN/20100524/DI"
  xmlns:dc="http://www.omg.org/spec/DD/20100524/DC"
  id="sample-diagram" targetNamespace="http://bpmn.io/schema/bpmn">
  <bpmn2:process id="Process_1" isExecutable="false">
    <bpmn2:startEvent id="StartEvent_1"/>
  </bpmn2:process>
  <bpmndi:BPMNDiagram id="BPMNDiagram_1">
    <bpmndi:BPMNPlane id="BPMNPlane_1" bpmnElement="Process_1">
      <bpmndi:BPMNShape id="_BPMNShape_StartEvent_2" bpmnElement="StartEvent_1">
        <dc:Bounds height="36.0" width="36.0" x="412.0" y="240.0"/>
      </bpmndi:BPMNShape>
    </bpmndi:BPMNPlane>
  </bpmndi:BPMNDiagram>
</bpmn2:definitions>"#;

    #[test]
    fn parse_minimal_start_event() {
        let parsed = parse_document(MINIMAL).unwrap();
        assert!(parsed.warnings.is_empty());
        assert_eq!(parsed.model.definitions.id, "sample-diagram");
        assert_eq!(parsed.model.definitions.process_id, "Process_1");

        let start = parsed
            .model
            .get_by_id(ElementId::intern("StartEvent_1"))
            .unwrap();
        assert_eq!(start.kind, ElementKind::StartEvent);
        assert_eq!(start.bounds(), Some(Bounds::new(412.0, 240.0, 36.0, 36.0)));
        assert_eq!(start.di_id, "_BPMNShape_StartEvent_2");
        assert_eq!(start.business_object, BusinessObject::default());
    }

    #[test]
    fn parse_user_task_attributes_and_documentation() {
        let input = r#"<definitions id="d"><process id="P">
  <userTask id="Review" name="Review &amp; approve" assignee="alice"
            candidateUsers="bob,carol" candidateGroups="qa" dueDate="2026-01-01T10:00" priority="5">
    <documentation>Check the <![CDATA[<totals>]]></documentation>
  </userTask>
</process></definitions>"#;
        let parsed = parse_document(input).unwrap();
        let task = parsed.model.get_by_id(ElementId::intern("Review")).unwrap();
        assert_eq!(task.kind, ElementKind::UserTask);
        let bo = &task.business_object;
        assert_eq!(bo.name.as_deref(), Some("Review & approve"));
        assert_eq!(bo.assignee.as_deref(), Some("alice"));
        assert_eq!(bo.candidate_users_list(), vec!["bob", "carol"]);
        assert_eq!(bo.candidate_groups.as_deref(), Some("qa"));
        assert_eq!(bo.due_date.as_deref(), Some("2026-01-01T10:00"));
        assert_eq!(bo.priority.as_deref(), Some("5"));
        assert_eq!(bo.documentation_text(), Some("Check the <totals>"));
        // No DI for the task → placed at origin with a warning.
        assert_eq!(parsed.warnings.len(), 1);
    }

    #[test]
    fn parse_prefixed_extension_attributes() {
        let input = r#"<bpmn:definitions xmlns:bpmn="x" xmlns:camunda="y" id="d">
  <bpmn:process id="P"><bpmn:userTask id="T" camunda:assignee="dave"/></bpmn:process>
</bpmn:definitions>"#;
        let parsed = parse_document(input).unwrap();
        let task = parsed.model.get_by_id(ElementId::intern("T")).unwrap();
        assert_eq!(task.business_object.assignee.as_deref(), Some("dave"));
    }

    #[test]
    fn parse_sequence_flow_with_waypoints() {
        let input = r#"<definitions id="d">
  <process id="P">
    <startEvent id="S"><outgoing>F</outgoing></startEvent>
    <sequenceFlow id="F" sourceRef="S" targetRef="T"/>
    <task id="T"><incoming>F</incoming></task>
  </process>
  <BPMNDiagram id="D"><BPMNPlane id="PL" bpmnElement="P">
    <BPMNShape id="S_di" bpmnElement="S"><Bounds x="0" y="0" width="36" height="36"/></BPMNShape>
    <BPMNShape id="T_di" bpmnElement="T"><Bounds x="100" y="0" width="100" height="80"/></BPMNShape>
    <BPMNEdge id="F_di" bpmnElement="F">
      <waypoint x="36" y="18"/><waypoint x="100" y="40"/>
    </BPMNEdge>
  </BPMNPlane></BPMNDiagram>
</definitions>"#;
        let parsed = parse_document(input).unwrap();
        assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);
        let model = &parsed.model;
        let flow = model.get_by_id(ElementId::intern("F")).unwrap();
        assert_eq!(
            flow.waypoints(),
            &[Point::new(36.0, 18.0), Point::new(100.0, 40.0)]
        );
        assert_eq!(model.source_of(flow.key), model.key_of(ElementId::intern("S")));
        assert_eq!(model.target_of(flow.key), model.key_of(ElementId::intern("T")));
    }

    #[test]
    fn unresolved_flow_reference_fails() {
        let input = r#"<definitions><process id="P">
  <startEvent id="S"/>
  <sequenceFlow id="F" sourceRef="S" targetRef="Nowhere"/>
</process></definitions>"#;
        let err = parse_document(input).unwrap_err();
        assert_eq!(
            err,
            ImportError::UnresolvedReference {
                flow: "F".into(),
                reference: "Nowhere".into()
            }
        );
    }

    #[test]
    fn unsupported_elements_warn() {
        let input = r#"<definitions><process id="P">
  <intermediateThrowEvent id="I"/>
  <startEvent id="S"/>
</process></definitions>"#;
        let parsed = parse_document(input).unwrap();
        assert_eq!(parsed.model.len(), 1);
        assert!(parsed.warnings.iter().any(|w| w.contains("intermediateThrowEvent")));
    }

    #[test]
    fn malformed_xml_is_rejected() {
        assert!(matches!(
            parse_document("<definitions><process id=\"P\"></definitions>"),
            Err(ImportError::Xml(_))
        ));
        assert!(matches!(parse_document("not xml"), Err(ImportError::Xml(_))));
        assert!(matches!(parse_document(""), Err(ImportError::Xml(_))));
    }

    fn nested_extensions(depth: usize) -> String {
        format!(
            r#"<definitions><process id="P"><startEvent id="S"><extensionElements>{}{}</extensionElements></startEvent></process></definitions>"#,
            "<x>".repeat(depth),
            "</x>".repeat(depth),
        )
    }

    #[test]
    fn deep_nesting_is_rejected_not_overflowed() {
        assert!(parse_document(&nested_extensions(200)).is_ok());
        for depth in [1_000, 200_000] {
            assert_eq!(
                parse_document(&nested_extensions(depth)).unwrap_err(),
                ImportError::Xml("nesting too deep".into())
            );
        }
    }

    #[test]
    fn wrong_root_is_rejected() {
        assert_eq!(
            parse_document("<process id=\"P\"/>").unwrap_err(),
            ImportError::MissingDefinitions
        );
    }

    #[test]
    fn missing_id_is_reported() {
        let err = parse_document("<definitions><process id=\"P\"><task/></process></definitions>")
            .unwrap_err();
        assert!(matches!(
            err,
            ImportError::MissingAttribute { attribute: "id", .. }
        ));
    }

    #[test]
    fn unescape_entities() {
        assert_eq!(unescape("a &lt;b&gt; &#65;&#x42; &unknown; &"), "a <b> AB &unknown; &");
    }
}
