//! Emitter: `DiagramModel` → BPMN 2.0 XML.
//!
//! Output uses the `bpmn2`, `bpmndi`, `dc` and `di` prefixes and
//! round-trips through the parser. `format: true` pretty-prints with two
//! space indentation; otherwise everything after the XML declaration is on
//! one line.

use crate::error::ExportError;
use crate::model::*;
use std::fmt::Write;

const NS_XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
const NS_BPMN: &str = "http://www.omg.org/spec/BPMN/20100524/MODEL";
const NS_BPMNDI: &str = "http://www.omg.org/spec/BPMN/20100524/DI";
const NS_DC: &str = "http://www.omg.org/spec/DD/20100524/DC";
const NS_DI: &str = "http://www.omg.org/spec/DD/20100524/DI";

/// Serializer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveOptions {
    pub format: bool,
}

/// Emit a `DiagramModel` as a BPMN 2.0 XML document.
pub fn emit_document(model: &DiagramModel, options: SaveOptions) -> Result<String, ExportError> {
    let defs = &model.definitions;
    let mut w = XmlWriter::new(options.format);
    w.out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");

    w.open(
        "bpmn2:definitions",
        &[
            ("xmlns:xsi", NS_XSI),
            ("xmlns:bpmn2", NS_BPMN),
            ("xmlns:bpmndi", NS_BPMNDI),
            ("xmlns:dc", NS_DC),
            ("xmlns:di", NS_DI),
            ("id", defs.id.as_str()),
            ("targetNamespace", defs.target_namespace.as_str()),
        ],
    );

    let executable = if defs.process_executable { "true" } else { "false" };
    w.open(
        "bpmn2:process",
        &[("id", defs.process_id.as_str()), ("isExecutable", executable)],
    );
    for element in model.shapes() {
        emit_shape_semantics(&mut w, model, element);
    }
    for flow in model.connections() {
        emit_flow_semantics(&mut w, model, flow)?;
    }
    w.close("bpmn2:process");

    w.open("bpmndi:BPMNDiagram", &[("id", defs.diagram_id.as_str())]);
    w.open(
        "bpmndi:BPMNPlane",
        &[
            ("id", defs.plane_id.as_str()),
            ("bpmnElement", defs.process_id.as_str()),
        ],
    );
    for element in model.elements() {
        emit_di(&mut w, element);
    }
    w.close("bpmndi:BPMNPlane");
    w.close("bpmndi:BPMNDiagram");

    w.close("bpmn2:definitions");
    Ok(w.finish())
}

fn emit_shape_semantics(w: &mut XmlWriter, model: &DiagramModel, element: &Element) {
    let tag = format!("bpmn2:{}", element.kind.tag());
    let attrs = semantic_attrs(element);
    let incoming = model.incoming(element.key);
    let outgoing = model.outgoing(element.key);

    if element.business_object.documentation.is_empty() && incoming.is_empty() && outgoing.is_empty()
    {
        w.leaf(&tag, &as_refs(&attrs));
        return;
    }

    w.open(&tag, &as_refs(&attrs));
    emit_documentation(w, &element.business_object);
    for (name, flows) in [("bpmn2:incoming", incoming), ("bpmn2:outgoing", outgoing)] {
        for flow in flows {
            if let Some(f) = model.get(flow) {
                w.text_element(name, f.id.as_str());
            }
        }
    }
    w.close(&tag);
}

fn emit_flow_semantics(
    w: &mut XmlWriter,
    model: &DiagramModel,
    flow: &Element,
) -> Result<(), ExportError> {
    let endpoint = |key: Option<ElementKey>| {
        key.and_then(|k| model.get(k))
            .map(|e| e.id.as_str().to_string())
            .ok_or_else(|| ExportError::DanglingConnection(flow.id.to_string()))
    };
    let source = endpoint(model.source_of(flow.key))?;
    let target = endpoint(model.target_of(flow.key))?;

    let mut attrs = semantic_attrs(flow);
    attrs.push(("sourceRef", source));
    attrs.push(("targetRef", target));

    if flow.business_object.documentation.is_empty() {
        w.leaf("bpmn2:sequenceFlow", &as_refs(&attrs));
    } else {
        w.open("bpmn2:sequenceFlow", &as_refs(&attrs));
        emit_documentation(w, &flow.business_object);
        w.close("bpmn2:sequenceFlow");
    }
    Ok(())
}

fn semantic_attrs(element: &Element) -> Vec<(&'static str, String)> {
    let mut attrs = vec![("id", element.id.as_str().to_string())];
    for property in Property::ALL {
        if matches!(property, Property::Id | Property::Documentation) {
            continue;
        }
        if let Some(value) = element.business_object.get(property) {
            attrs.push((property.name(), value.to_string()));
        }
    }
    attrs
}

fn emit_documentation(w: &mut XmlWriter, bo: &BusinessObject) {
    for doc in &bo.documentation {
        w.text_element("bpmn2:documentation", &doc.text);
    }
}

fn emit_di(w: &mut XmlWriter, element: &Element) {
    let id = element.id.as_str();
    match &element.geometry {
        Geometry::Shape(b) => {
            w.open(
                "bpmndi:BPMNShape",
                &[("id", element.di_id.as_str()), ("bpmnElement", id)],
            );
            w.leaf(
                "dc:Bounds",
                &[
                    ("x", format_num(b.x).as_str()),
                    ("y", format_num(b.y).as_str()),
                    ("width", format_num(b.width).as_str()),
                    ("height", format_num(b.height).as_str()),
                ],
            );
            w.close("bpmndi:BPMNShape");
        }
        Geometry::Connection { waypoints } => {
            w.open(
                "bpmndi:BPMNEdge",
                &[("id", element.di_id.as_str()), ("bpmnElement", id)],
            );
            for p in waypoints {
                w.leaf(
                    "di:waypoint",
                    &[("x", format_num(p.x).as_str()), ("y", format_num(p.y).as_str())],
                );
            }
            w.close("bpmndi:BPMNEdge");
        }
    }
}

fn as_refs<'a>(attrs: &'a [(&'static str, String)]) -> Vec<(&'static str, &'a str)> {
    attrs.iter().map(|(k, v)| (*k, v.as_str())).collect()
}

/// Format a coordinate with the shortest text that reads back to the same
/// value. Integers carry no fraction.
fn format_num(n: f32) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    n.to_string()
}

// ─── XML writer ─────────────────────────────────────────────────────────

struct XmlWriter {
    out: String,
    pretty: bool,
    depth: usize,
}

impl XmlWriter {
    fn new(pretty: bool) -> Self {
        Self {
            out: String::with_capacity(2048),
            pretty,
            depth: 0,
        }
    }

    fn indent(&mut self) {
        if self.pretty {
            for _ in 0..self.depth {
                self.out.push_str("  ");
            }
        }
    }

    fn newline(&mut self) {
        if self.pretty {
            self.out.push('\n');
        }
    }

    fn start_tag(&mut self, tag: &str, attrs: &[(&str, &str)]) {
        self.indent();
        let _ = write!(self.out, "<{tag}");
        for (k, v) in attrs {
            let _ = write!(self.out, " {k}=\"{}\"", escape(v));
        }
    }

    fn open(&mut self, tag: &str, attrs: &[(&str, &str)]) {
        self.start_tag(tag, attrs);
        self.out.push('>');
        self.newline();
        self.depth += 1;
    }

    fn leaf(&mut self, tag: &str, attrs: &[(&str, &str)]) {
        self.start_tag(tag, attrs);
        self.out.push_str(" />");
        self.newline();
    }

    fn text_element(&mut self, tag: &str, text: &str) {
        self.start_tag(tag, &[]);
        let _ = write!(self.out, ">{}</{tag}>", escape(text));
        self.newline();
    }

    fn close(&mut self, tag: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.indent();
        let _ = write!(self.out, "</{tag}>");
        self.newline();
    }

    fn finish(self) -> String {
        self.out
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            c => out.push(c),
        }
    }
    out
}
