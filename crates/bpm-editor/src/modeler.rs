//! The modeler engine.
//!
//! `Modeler` owns the diagram model and every service that acts on it. The
//! services are exposed as short-lived views borrowed from the modeler
//! (`modeling()`, `create()`, `selection()`, ...), so each call sees the
//! current model and raises its events on the same bus.

use crate::canvas::{Canvas, CanvasState};
use crate::config::ModelerOptions;
use crate::create::{Create, Dragging, PendingCreate};
use crate::error::{EngineError, ModelingError};
use crate::events::{Event, EventBus, EventData, EventKind, ListenerId};
use crate::factory::ElementFactory;
use crate::modeling::Modeling;
use crate::palette::{ActionEvent, ActionTrigger, ContextPad, Entry, Palette};
use crate::selection::Selection;
use bpm_core::{
    DiagramModel, Element, ElementId, ElementKey, SaveOptions, emit_document, parse_document,
};

/// An extension installed when the modeler is constructed.
pub trait Module {
    fn name(&self) -> &'static str;

    /// Register listeners, providers, and so on.
    fn init(&self, modeler: &mut Modeler);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportResult {
    /// Non-fatal problems found while reading the document.
    pub warnings: Vec<String>,
}

pub struct Modeler {
    pub(crate) options: ModelerOptions,
    pub(crate) model: DiagramModel,
    pub(crate) events: EventBus,
    /// Selected elements, in selection order.
    pub(crate) selected: Vec<ElementKey>,
    pub(crate) canvas: Option<CanvasState>,
    pub(crate) pending_create: Option<PendingCreate>,
    pub(crate) dragging: Dragging,
    pub(crate) palette: Palette,
    pub(crate) context_pad: ContextPad,
    modules: Vec<&'static str>,
    destroyed: bool,
}

impl std::fmt::Debug for Modeler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Modeler")
            .field("elements", &self.model.len())
            .field("selected", &self.selected)
            .field("modules", &self.modules)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

impl Modeler {
    /// Build a modeler and install `additional_modules` in order.
    pub fn new(options: ModelerOptions, additional_modules: &[&dyn Module]) -> Self {
        let canvas = options.container.map(CanvasState::new);
        let mut modeler = Self {
            options,
            model: DiagramModel::default(),
            events: EventBus::new(),
            selected: Vec::new(),
            canvas,
            pending_create: None,
            dragging: Dragging::default(),
            palette: Palette::default(),
            context_pad: ContextPad::default(),
            modules: Vec::new(),
            destroyed: false,
        };
        modeler.dragging.install(&mut modeler.events);
        for module in additional_modules {
            log::debug!("installing module {}", module.name());
            module.init(&mut modeler);
            modeler.modules.push(module.name());
        }
        modeler
    }

    /// Replace the current diagram with the document in `xml`.
    ///
    /// On failure the current diagram is left untouched.
    pub fn import_xml(&mut self, xml: &str) -> Result<ImportResult, EngineError> {
        self.ensure_alive().map_err(|_| EngineError::Destroyed)?;
        let parsed = parse_document(xml)?;

        if !self.selected.is_empty() {
            self.set_selection(Vec::new());
        }
        self.pending_create = None;
        self.dragging.reset();
        self.model = parsed.model;
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.reset();
        }
        log::debug!(
            "imported {} elements ({} warnings)",
            self.model.len(),
            parsed.warnings.len()
        );

        self.events.fire(EventData::ImportDone {
            warnings: parsed.warnings.clone(),
        });
        Ok(ImportResult {
            warnings: parsed.warnings,
        })
    }

    pub fn save_xml(&self, options: SaveOptions) -> Result<String, EngineError> {
        if self.destroyed {
            return Err(EngineError::Destroyed);
        }
        Ok(emit_document(&self.model, options)?)
    }

    /// Tear down: notify listeners, then drop every listener, provider and
    /// element. Later calls are no-ops.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.events.fire(EventData::DiagramDestroy);
        self.events.clear();
        self.palette.clear();
        self.context_pad.clear();
        self.selected.clear();
        self.pending_create = None;
        self.dragging.reset();
        self.canvas = None;
        self.model = DiagramModel::default();
        self.destroyed = true;
        log::debug!("modeler destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    // ─── Events ──────────────────────────────────────────────────────────

    pub fn on(&mut self, kind: EventKind, handler: impl FnMut(&mut Event) + 'static) -> ListenerId {
        self.events.on(kind, handler)
    }

    pub fn on_with_priority(
        &mut self,
        kind: EventKind,
        priority: u32,
        handler: impl FnMut(&mut Event) + 'static,
    ) -> ListenerId {
        self.events.on_with_priority(kind, priority, handler)
    }

    pub fn event_bus(&mut self) -> &mut EventBus {
        &mut self.events
    }

    // ─── Services ────────────────────────────────────────────────────────

    /// The canvas, present only when the modeler was given a container.
    pub fn canvas(&mut self) -> Option<Canvas<'_>> {
        let model = &self.model;
        self.canvas.as_mut().map(|state| Canvas::new(state, model))
    }

    pub fn modeling(&mut self) -> Modeling<'_> {
        Modeling::new(self)
    }

    pub fn create(&mut self) -> Create<'_> {
        Create::new(self)
    }

    pub fn selection(&mut self) -> Selection<'_> {
        Selection::new(self)
    }

    pub fn element_factory(&self) -> ElementFactory<'_> {
        ElementFactory::new(&self.model)
    }

    pub fn dragging(&self) -> &Dragging {
        &self.dragging
    }

    pub fn palette(&mut self) -> &mut Palette {
        &mut self.palette
    }

    pub fn context_pad(&mut self) -> &mut ContextPad {
        &mut self.context_pad
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn model(&self) -> &DiagramModel {
        &self.model
    }

    pub fn options(&self) -> &ModelerOptions {
        &self.options
    }

    /// Names of the installed modules, in installation order.
    pub fn modules(&self) -> &[&'static str] {
        &self.modules
    }

    pub fn element(&self, key: ElementKey) -> Option<&Element> {
        self.model.get(key)
    }

    pub fn element_by_id(&self, id: &str) -> Option<&Element> {
        self.model.get_by_id(ElementId::intern(id))
    }

    pub fn selected(&self) -> &[ElementKey] {
        &self.selected
    }

    // ─── Palette / context pad ───────────────────────────────────────────

    pub fn palette_entries(&self) -> Vec<Entry> {
        self.palette.entries()
    }

    /// Context-pad entries for the selection. Only a single selected
    /// element gets a context pad.
    pub fn context_pad_entries(&self) -> Vec<Entry> {
        match self.selected.as_slice() {
            [key] => self
                .model
                .get(*key)
                .map(|element| self.context_pad.entries(element))
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Run the palette entry `entry_id` for the given gesture.
    pub fn trigger_palette(&mut self, entry_id: &str, event: &ActionEvent) -> Result<(), ModelingError> {
        let entries = self.palette_entries();
        self.run_entry(entries, entry_id, event)
    }

    /// Run the context-pad entry `entry_id` for the selected element.
    pub fn trigger_context_pad(
        &mut self,
        entry_id: &str,
        event: &ActionEvent,
    ) -> Result<(), ModelingError> {
        let entries = self.context_pad_entries();
        self.run_entry(entries, entry_id, event)
    }

    fn run_entry(
        &mut self,
        entries: Vec<Entry>,
        entry_id: &str,
        event: &ActionEvent,
    ) -> Result<(), ModelingError> {
        self.ensure_alive()?;
        let entry = entries
            .into_iter()
            .find(|e| e.id == entry_id)
            .ok_or_else(|| ModelingError::UnknownEntry(entry_id.to_string()))?;
        let action = match event.trigger {
            ActionTrigger::DragStart => entry.action.dragstart,
            ActionTrigger::Click => entry.action.click,
        };
        match action {
            Some(action) => action(self, event),
            None => {
                log::debug!("entry {entry_id} has no {:?} action", event.trigger);
                Ok(())
            }
        }
    }

    // ─── Internals shared by the services ────────────────────────────────

    pub(crate) fn ensure_alive(&self) -> Result<(), ModelingError> {
        if self.destroyed {
            Err(ModelingError::Destroyed)
        } else {
            Ok(())
        }
    }

    /// Raise `element.changed` with a snapshot of `key`.
    pub(crate) fn fire_changed(&mut self, key: ElementKey) {
        if let Some(element) = self.model.get(key).cloned() {
            self.events.fire(EventData::ElementChanged { element });
        }
    }

    /// Replace the selection, raising `selection.changed` when it differs.
    pub(crate) fn set_selection(&mut self, keys: Vec<ElementKey>) {
        if keys == self.selected {
            return;
        }
        let snapshot = |keys: &[ElementKey]| -> Vec<Element> {
            keys.iter().filter_map(|k| self.model.get(*k).cloned()).collect()
        };
        let old_selection = snapshot(&self.selected);
        let new_selection = snapshot(&keys);
        self.selected = keys;
        self.events.fire(EventData::SelectionChanged {
            old_selection,
            new_selection,
        });
    }
}
