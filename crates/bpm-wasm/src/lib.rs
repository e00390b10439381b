//! WASM bridge for BPM: exposes the editor shell to the browser page.
//!
//! Compiled via `wasm-pack build --target web`. The page draws the diagram
//! from `get_elements_json`, forwards palette / context-pad clicks and form
//! keystrokes, and renders the side panel from `get_form_view`.

mod download;
mod logger;

use bpm_core::{Element, Geometry, Point, Property, SaveOptions, Viewport};
use bpm_editor::{ActionEvent, ActionTrigger, EditorConfig, EditorShell, EngineState, ZoomMode};
use download::BrowserDownloader;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct BpmEditor {
    shell: EditorShell,
}

#[wasm_bindgen]
impl BpmEditor {
    /// Create an editor. `config_json` may be empty or a partial
    /// `EditorConfig`, e.g. `{"fileName":"order.bpmn"}`.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Self {
        console_error_panic_hook_setup();
        logger::init(log::LevelFilter::Info);

        let config = if config_json.trim().is_empty() {
            EditorConfig::default()
        } else {
            serde_json::from_str(config_json).unwrap_or_else(|e| {
                log::error!("invalid editor config, using defaults: {e}");
                EditorConfig::default()
            })
        };
        Self {
            shell: EditorShell::new(config),
        }
    }

    /// Create the modeler for a container of the given size and load the
    /// default diagram. Returns `true` when the editor is ready.
    pub fn mount(&mut self, width: f32, height: f32) -> bool {
        self.shell.mount(Some(Viewport { width, height }));
        self.shell.state() == EngineState::Ready
    }

    pub fn unmount(&mut self) {
        self.shell.unmount();
    }

    /// `uninitialized`, `initializing`, `ready`, `failed` or `destroyed`.
    pub fn state(&self) -> String {
        match self.shell.state() {
            EngineState::Uninitialized => "uninitialized",
            EngineState::Initializing => "initializing",
            EngineState::Ready => "ready",
            EngineState::Failed => "failed",
            EngineState::Destroyed => "destroyed",
        }
        .to_string()
    }

    // ─── Document ────────────────────────────────────────────────────────

    /// Load a diagram. Returns `{"ok":true,"warnings":[...]}` or
    /// `{"ok":false,"error":"..."}`.
    pub fn import_xml(&mut self, xml: &str) -> String {
        let Some(modeler) = self.shell.modeler_mut() else {
            return error_json("editor not mounted");
        };
        match modeler.import_xml(xml) {
            Ok(result) => {
                for warning in &result.warnings {
                    log::warn!("{warning}");
                }
                if let Some(mut canvas) = modeler.canvas() {
                    canvas.zoom(ZoomMode::FitViewport);
                }
                serde_json::json!({ "ok": true, "warnings": result.warnings }).to_string()
            }
            Err(e) => error_json(&e.to_string()),
        }
    }

    /// Serialize the diagram. Returns `{"ok":true,"xml":"..."}` or an error.
    pub fn save_xml(&self, format: bool) -> String {
        let Some(modeler) = self.shell.modeler() else {
            return error_json("editor not mounted");
        };
        match modeler.save_xml(SaveOptions { format }) {
            Ok(xml) => serde_json::json!({ "ok": true, "xml": xml }).to_string(),
            Err(e) => error_json(&e.to_string()),
        }
    }

    /// Download the diagram as a file. Failures are logged.
    pub fn save(&self) {
        match BrowserDownloader::new() {
            Ok(mut downloader) => self.shell.handle_save(&mut downloader),
            Err(e) => log::error!("Error saving diagram: {e}"),
        }
    }

    /// Every element, for drawing. Shapes carry bounds, flows waypoints.
    pub fn get_elements_json(&self) -> String {
        let Some(modeler) = self.shell.modeler() else {
            return "[]".to_string();
        };
        let selected = modeler.selected();
        let elements: Vec<serde_json::Value> = modeler
            .model()
            .elements()
            .into_iter()
            .map(|e| element_json(e, selected.contains(&e.key)))
            .collect();
        serde_json::Value::Array(elements).to_string()
    }

    /// Current view box, or `null` without a canvas.
    pub fn get_viewbox_json(&mut self) -> String {
        let viewbox = self
            .shell
            .modeler_mut()
            .and_then(|m| m.canvas().map(|c| c.viewbox()));
        serde_json::to_string(&viewbox).unwrap_or_else(|_| "null".to_string())
    }

    /// The container changed size. Returns `false` without a canvas.
    pub fn resize(&mut self, width: f32, height: f32) -> bool {
        self.shell
            .modeler_mut()
            .and_then(|m| m.canvas().map(|mut c| c.resize(Viewport { width, height })))
            .is_some()
    }

    pub fn zoom(&mut self, scale: f32) -> f32 {
        self.shell
            .modeler_mut()
            .and_then(|m| m.canvas().map(|mut c| c.zoom(ZoomMode::Level(scale))))
            .unwrap_or(1.0)
    }

    // ─── Selection ───────────────────────────────────────────────────────

    pub fn select_by_id(&mut self, id: &str) -> bool {
        let Some(modeler) = self.shell.modeler_mut() else {
            return false;
        };
        let Some(key) = modeler.element_by_id(id).map(|e| e.key) else {
            return false;
        };
        modeler.selection().select(&[key]);
        true
    }

    pub fn clear_selection(&mut self) {
        if let Some(modeler) = self.shell.modeler_mut() {
            modeler.selection().clear();
        }
    }

    /// Identifier of the selected element, or an empty string.
    pub fn get_selected_id(&self) -> String {
        self.shell
            .selected_element()
            .map(|e| e.id.to_string())
            .unwrap_or_default()
    }

    pub fn remove_selected(&mut self) -> bool {
        let Some(modeler) = self.shell.modeler_mut() else {
            return false;
        };
        let keys = modeler.selected().to_vec();
        if keys.is_empty() {
            return false;
        }
        log_failure(modeler.modeling().remove_elements(&keys)).is_some()
    }

    pub fn move_selected(&mut self, dx: f32, dy: f32) -> bool {
        let Some(modeler) = self.shell.modeler_mut() else {
            return false;
        };
        let keys = modeler.selected().to_vec();
        log_failure(modeler.modeling().move_elements(&keys, Point::new(dx, dy))).is_some()
    }

    // ─── Properties panel ────────────────────────────────────────────────

    /// Side-panel layout: `{"kind":"placeholder",...}` or
    /// `{"kind":"fields","elementType":...,"groups":[...]}`.
    pub fn get_form_view(&self) -> String {
        to_json(&self.shell.form_view())
    }

    pub fn get_form_snapshot(&self) -> String {
        to_json(&self.shell.form_snapshot())
    }

    /// A keystroke in the properties form. `property` is the field name,
    /// e.g. `candidateUsers`. Returns `false` for unknown fields.
    pub fn edit_field(&mut self, property: &str, value: &str) -> bool {
        match property.parse::<Property>() {
            Ok(property) => {
                self.shell.edit_field(property, value);
                true
            }
            Err(e) => {
                log::error!("Error updating properties: {e}");
                false
            }
        }
    }

    // ─── Palette / context pad ───────────────────────────────────────────

    pub fn get_palette_entries(&self) -> String {
        self.shell
            .modeler()
            .map(|m| to_json(&m.palette_entries()))
            .unwrap_or_else(|| "[]".to_string())
    }

    pub fn get_context_pad_entries(&self) -> String {
        self.shell
            .modeler()
            .map(|m| to_json(&m.context_pad_entries()))
            .unwrap_or_else(|| "[]".to_string())
    }

    /// Run a palette entry. `trigger` is `click` or `dragstart`.
    pub fn trigger_palette(&mut self, entry_id: &str, trigger: &str, x: f32, y: f32) -> bool {
        let Some(event) = action_event(trigger, x, y) else {
            return false;
        };
        let Some(modeler) = self.shell.modeler_mut() else {
            return false;
        };
        log_failure(modeler.trigger_palette(entry_id, &event)).is_some()
    }

    pub fn trigger_context_pad(&mut self, entry_id: &str, trigger: &str, x: f32, y: f32) -> bool {
        let Some(event) = action_event(trigger, x, y) else {
            return false;
        };
        let Some(modeler) = self.shell.modeler_mut() else {
            return false;
        };
        log_failure(modeler.trigger_context_pad(entry_id, &event)).is_some()
    }

    /// Whether a shape is waiting to be dropped.
    pub fn is_creating(&mut self) -> bool {
        self.shell
            .modeler_mut()
            .is_some_and(|m| m.create().is_active())
    }

    /// Drop the pending shape centered on `(x, y)`.
    pub fn complete_create(&mut self, x: f32, y: f32) -> bool {
        let Some(modeler) = self.shell.modeler_mut() else {
            return false;
        };
        log_failure(modeler.create().complete(Point::new(x, y))).is_some()
    }

    pub fn cancel_create(&mut self) -> bool {
        self.shell
            .modeler_mut()
            .is_some_and(|m| m.create().cancel().is_some())
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────

fn action_event(trigger: &str, x: f32, y: f32) -> Option<ActionEvent> {
    let trigger = match trigger {
        "click" => ActionTrigger::Click,
        "dragstart" => ActionTrigger::DragStart,
        other => {
            log::warn!("unknown trigger `{other}`");
            return None;
        }
    };
    Some(ActionEvent {
        trigger,
        point: Point::new(x, y),
    })
}

fn log_failure<T, E: std::fmt::Display>(result: Result<T, E>) -> Option<T> {
    result.map_err(|e| log::error!("{e}")).ok()
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| error_json(&format!("Serialization error: {e}")))
}

fn error_json(message: &str) -> String {
    serde_json::json!({ "ok": false, "error": message }).to_string()
}

fn element_json(element: &Element, selected: bool) -> serde_json::Value {
    let mut value = serde_json::json!({
        "id": element.id.as_str(),
        "type": element.kind.type_name(),
        "name": element.name(),
        "selected": selected,
    });
    match &element.geometry {
        Geometry::Shape(bounds) => value["bounds"] = serde_json::json!(bounds),
        Geometry::Connection { waypoints } => {
            value["waypoints"] = serde_json::json!(waypoints.as_slice())
        }
    }
    value
}

// ─── Panic hook for WASM debugging ───────────────────────────────────────

fn console_error_panic_hook_setup() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("BPM WASM panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
        });
    }
}

// ─── Standalone functions (no editor needed) ─────────────────────────────

/// Check a BPMN document. Returns `{"ok":true,"elements":N,"warnings":[...]}`
/// or `{"ok":false,"error":"..."}`.
#[wasm_bindgen]
pub fn validate(xml: &str) -> String {
    match bpm_core::parse_document(xml) {
        Ok(parsed) => serde_json::json!({
            "ok": true,
            "elements": parsed.model.len(),
            "warnings": parsed.warnings,
        })
        .to_string(),
        Err(e) => error_json(&e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn mounted() -> BpmEditor {
        let mut editor = BpmEditor::new("");
        assert!(editor.mount(800.0, 600.0));
        editor
    }

    fn parse(json: &str) -> Value {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn validate_reports_elements_and_errors() {
        let ok = parse(&validate(bpm_editor::DEFAULT_DIAGRAM));
        assert_eq!(ok["ok"], true);
        assert_eq!(ok["elements"], 1);

        let bad = parse(&validate("<bpmn2:definitions"));
        assert_eq!(bad["ok"], false);
        assert!(bad["error"].as_str().unwrap().starts_with("malformed XML"));
    }

    #[test]
    fn resize_widens_viewbox() {
        let mut editor = BpmEditor::new("");
        assert!(!editor.resize(1200.0, 600.0));

        let mut editor = mounted();
        assert!(editor.resize(1600.0, 1200.0));
        let viewbox = parse(&editor.get_viewbox_json());
        assert_eq!(viewbox["width"], 1600.0);
        assert_eq!(viewbox["height"], 1200.0);
    }

    #[test]
    fn partial_config_json() {
        let editor = BpmEditor::new(r#"{"fileName":"order.bpmn"}"#);
        assert_eq!(editor.shell.config().file_name, "order.bpmn");
        assert_eq!(editor.shell.config().mime_type, "text/xml");
        assert_eq!(editor.state(), "uninitialized");
    }

    #[test]
    fn select_and_edit_through_bridge() {
        let mut editor = mounted();
        assert_eq!(parse(&editor.get_form_view())["kind"], "placeholder");

        assert!(editor.select_by_id("StartEvent_1"));
        assert_eq!(editor.get_selected_id(), "StartEvent_1");
        assert!(editor.edit_field("name", "Begin"));
        assert!(!editor.edit_field("colour", "red"));

        let snapshot = parse(&editor.get_form_snapshot());
        assert_eq!(snapshot["id"], "StartEvent_1");
        assert_eq!(snapshot["name"], "Begin");
        assert_eq!(snapshot["candidateUsers"], "");

        let saved = parse(&editor.save_xml(true));
        assert!(saved["xml"].as_str().unwrap().contains(r#"name="Begin""#));
    }

    #[test]
    fn palette_create_and_drop() {
        let mut editor = mounted();
        let entries = parse(&editor.get_palette_entries());
        assert_eq!(entries[0]["id"], "create.user-task");
        assert_eq!(entries[0]["className"], "bpmn-icon-user-task");

        assert!(editor.trigger_palette("create.user-task", "click", 0.0, 0.0));
        assert!(editor.is_creating());
        assert!(!editor.trigger_palette("create.user-task", "hover", 0.0, 0.0));
        assert!(editor.complete_create(300.0, 300.0));

        let elements = parse(&editor.get_elements_json());
        assert_eq!(elements.as_array().unwrap().len(), 2);
        let task = &elements[1];
        assert_eq!(task["type"], "bpmn:UserTask");
        assert_eq!(task["selected"], true);
        assert_eq!(task["bounds"]["x"], 250.0);
        assert_eq!(parse(&editor.get_form_view())["groups"][1]["title"], "User Task Properties");
    }

    #[test]
    fn context_pad_append() {
        let mut editor = mounted();
        assert_eq!(parse(&editor.get_context_pad_entries()), serde_json::json!([]));
        editor.select_by_id("StartEvent_1");
        assert!(editor.trigger_context_pad("append.service-task", "click", 0.0, 0.0));

        let elements = parse(&editor.get_elements_json());
        let flow = elements
            .as_array()
            .unwrap()
            .iter()
            .find(|e| e["type"] == "bpmn:SequenceFlow")
            .unwrap();
        assert_eq!(flow["waypoints"][0], serde_json::json!({ "x": 448.0, "y": 258.0 }));
    }

    #[test]
    fn unmounted_bridge_is_inert() {
        let mut editor = BpmEditor::new("");
        assert_eq!(parse(&editor.import_xml("<x/>"))["ok"], false);
        assert!(!editor.select_by_id("StartEvent_1"));
        assert_eq!(editor.get_elements_json(), "[]");
        assert_eq!(editor.get_viewbox_json(), "null");
        assert!(!editor.remove_selected());
    }
}
