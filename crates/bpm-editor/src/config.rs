//! Editor and modeler configuration.
//!
//! Both structs deserialize from partial JSON (`#[serde(default)]`), so the
//! browser bridge can pass only the fields it wants to override.

use bpm_core::Viewport;
use serde::{Deserialize, Serialize};

/// Diagram loaded on mount: one start event on an empty process.
pub const DEFAULT_DIAGRAM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<bpmn2:definitions
  xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
  xmlns:bpmn2="http://www.omg.org/spec/BPMN/20100524/MODEL"
  xmlns:bpmndi="http://www.omg.org/spec/BPMN/20100524/DI"
  xmlns:dc="http://www.omg.org/spec/DD/20100524/DC"
  xmlns:di="http://www.omg.org/spec/DD/20100524/DI"
  id="sample-diagram"
  targetNamespace="http://bpmn.io/schema/bpmn">
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

/// How the canvas is zoomed after import.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ZoomMode {
    /// Fit the whole diagram, never zooming in past 1.0.
    FitViewport,
    Level(f32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    pub default_diagram: String,
    /// Name offered by the browser for the saved file.
    pub file_name: String,
    pub mime_type: String,
    pub zoom: ZoomMode,
    pub modeler: ModelerOptions,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_diagram: DEFAULT_DIAGRAM.to_string(),
            file_name: "diagram.bpmn".to_string(),
            mime_type: "text/xml".to_string(),
            zoom: ZoomMode::FitViewport,
            modeler: ModelerOptions::default(),
        }
    }
}

/// Options handed to `Modeler::new`. The feature flags are recorded for
/// the host; the modeler itself does not draw grids or minimaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelerOptions {
    /// Size of the canvas container. `None` runs the modeler headless,
    /// without a canvas.
    pub container: Option<Viewport>,
    pub grid_visible: bool,
    pub minimap_open: bool,
    pub linting_active: bool,
    /// Keyboard binding target, e.g. `document`.
    pub keyboard_bind_to: Option<String>,
}

impl Default for ModelerOptions {
    fn default() -> Self {
        Self {
            container: None,
            grid_visible: true,
            minimap_open: true,
            linting_active: true,
            keyboard_bind_to: Some("document".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_diagram_has_one_start_event() {
        let parsed = bpm_core::parse_document(DEFAULT_DIAGRAM).unwrap();
        assert!(parsed.warnings.is_empty());
        assert_eq!(parsed.model.len(), 1);
        let start = parsed.model.get_by_id(bpm_core::ElementId::intern("StartEvent_1")).unwrap();
        assert_eq!(start.kind, bpm_core::ElementKind::StartEvent);
        assert_eq!(start.bounds(), Some(bpm_core::Bounds::new(412.0, 240.0, 36.0, 36.0)));
        assert_eq!(start.di_id, "_BPMNShape_StartEvent_2");
    }

    #[test]
    fn defaults() {
        let config = EditorConfig::default();
        assert_eq!(config.file_name, "diagram.bpmn");
        assert_eq!(config.mime_type, "text/xml");
        assert_eq!(config.zoom, ZoomMode::FitViewport);
        assert!(config.modeler.grid_visible);
        assert!(config.modeler.minimap_open);
        assert!(config.modeler.linting_active);
    }
}
