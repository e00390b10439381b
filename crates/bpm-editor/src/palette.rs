//! Palette and context-pad registries.
//!
//! Providers are asked for their entries every time the UI needs them, so
//! entries can depend on the current element.

use crate::error::ModelingError;
use crate::modeler::Modeler;
use bpm_core::{Element, Point};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// The user gesture that triggered an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionTrigger {
    DragStart,
    Click,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionEvent {
    pub trigger: ActionTrigger,
    /// Pointer position in diagram coordinates.
    pub point: Point,
}

impl ActionEvent {
    pub fn click(point: Point) -> Self {
        Self {
            trigger: ActionTrigger::Click,
            point,
        }
    }

    pub fn drag_start(point: Point) -> Self {
        Self {
            trigger: ActionTrigger::DragStart,
            point,
        }
    }
}

pub type Action = Rc<dyn Fn(&mut Modeler, &ActionEvent) -> Result<(), ModelingError>>;

#[derive(Clone, Default)]
pub struct EntryAction {
    pub dragstart: Option<Action>,
    pub click: Option<Action>,
}

impl EntryAction {
    /// The same action for both gestures.
    pub fn both(action: Action) -> Self {
        Self {
            dragstart: Some(Rc::clone(&action)),
            click: Some(action),
        }
    }

    pub fn click(action: Action) -> Self {
        Self {
            dragstart: None,
            click: Some(action),
        }
    }
}

/// One palette or context-pad button.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub group: String,
    pub class_name: String,
    pub title: String,
    #[serde(skip)]
    pub action: EntryAction,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("id", &self.id)
            .field("group", &self.group)
            .field("class_name", &self.class_name)
            .field("title", &self.title)
            .field("dragstart", &self.action.dragstart.is_some())
            .field("click", &self.action.click.is_some())
            .finish()
    }
}

pub trait PaletteProvider {
    fn palette_entries(&self) -> Vec<Entry>;
}

pub trait ContextPadProvider {
    fn context_pad_entries(&self, element: &Element) -> Vec<Entry>;
}

#[derive(Default)]
pub struct Palette {
    providers: Vec<Rc<dyn PaletteProvider>>,
}

impl Palette {
    pub fn register_provider(&mut self, provider: Rc<dyn PaletteProvider>) {
        self.providers.push(provider);
    }

    /// Entries of every provider, in registration order. A later entry
    /// with the same id replaces the earlier one in place.
    pub fn entries(&self) -> Vec<Entry> {
        merge(self.providers.iter().map(|p| p.palette_entries()))
    }

    pub(crate) fn clear(&mut self) {
        self.providers.clear();
    }
}

#[derive(Default)]
pub struct ContextPad {
    providers: Vec<Rc<dyn ContextPadProvider>>,
}

impl ContextPad {
    pub fn register_provider(&mut self, provider: Rc<dyn ContextPadProvider>) {
        self.providers.push(provider);
    }

    pub fn entries(&self, element: &Element) -> Vec<Entry> {
        merge(self.providers.iter().map(|p| p.context_pad_entries(element)))
    }

    pub(crate) fn clear(&mut self) {
        self.providers.clear();
    }
}

fn merge(batches: impl Iterator<Item = Vec<Entry>>) -> Vec<Entry> {
    let mut merged: Vec<Entry> = Vec::new();
    for entry in batches.flatten() {
        match merged.iter_mut().find(|e| e.id == entry.id) {
            Some(slot) => *slot = entry,
            None => merged.push(entry),
        }
    }
    merged
}
