//! Synchronous, priority-ordered event bus.
//!
//! Listeners run in descending priority; equal priorities run in the order
//! they were registered. Any listener may stop propagation, which skips
//! every listener after it for that one event.

use bpm_core::{Element, NewShape, Point};
use std::fmt;

/// Priority given to listeners registered without one.
pub const DEFAULT_PRIORITY: u32 = 1000;

/// The events the modeler raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SelectionChanged,
    ElementChanged,
    DragInit,
    ImportDone,
    DiagramDestroy,
}

impl EventKind {
    pub fn name(self) -> &'static str {
        match self {
            EventKind::SelectionChanged => "selection.changed",
            EventKind::ElementChanged => "element.changed",
            EventKind::DragInit => "drag.init",
            EventKind::ImportDone => "import.done",
            EventKind::DiagramDestroy => "diagram.destroy",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [
            EventKind::SelectionChanged,
            EventKind::ElementChanged,
            EventKind::DragInit,
            EventKind::ImportDone,
            EventKind::DiagramDestroy,
        ]
        .into_iter()
        .find(|k| k.name() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Event payloads. Elements are snapshots taken when the event fired.
#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
    SelectionChanged {
        old_selection: Vec<Element>,
        new_selection: Vec<Element>,
    },
    ElementChanged {
        element: Element,
    },
    DragInit {
        shape: NewShape,
        origin: Point,
    },
    ImportDone {
        warnings: Vec<String>,
    },
    DiagramDestroy,
}

impl EventData {
    pub fn kind(&self) -> EventKind {
        match self {
            EventData::SelectionChanged { .. } => EventKind::SelectionChanged,
            EventData::ElementChanged { .. } => EventKind::ElementChanged,
            EventData::DragInit { .. } => EventKind::DragInit,
            EventData::ImportDone { .. } => EventKind::ImportDone,
            EventData::DiagramDestroy => EventKind::DiagramDestroy,
        }
    }
}

/// An event in flight.
#[derive(Debug)]
pub struct Event {
    data: EventData,
    stopped: bool,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        self.data.kind()
    }

    pub fn data(&self) -> &EventData {
        &self.data
    }

    /// Skip all remaining listeners for this event.
    pub fn stop_propagation(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

pub type Handler = Box<dyn FnMut(&mut Event)>;

/// Returned by `on`; pass to `off` to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    kind: EventKind,
    priority: u32,
    handler: Handler,
}

#[derive(Default)]
pub struct EventBus {
    /// Kept sorted by descending priority, stable for equal priorities.
    listeners: Vec<Listener>,
    next_id: u64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe with the default priority.
    pub fn on(&mut self, kind: EventKind, handler: impl FnMut(&mut Event) + 'static) -> ListenerId {
        self.on_with_priority(kind, DEFAULT_PRIORITY, handler)
    }

    pub fn on_with_priority(
        &mut self,
        kind: EventKind,
        priority: u32,
        handler: impl FnMut(&mut Event) + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        let at = self.listeners.partition_point(|l| l.priority >= priority);
        self.listeners.insert(
            at,
            Listener {
                id,
                kind,
                priority,
                handler: Box::new(handler),
            },
        );
        id
    }

    /// Unsubscribe. Returns whether the listener existed.
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.iter().filter(|l| l.kind == kind).count()
    }

    /// Deliver `data` to every matching listener, in order, until one stops
    /// propagation. Returns the finished event.
    pub fn fire(&mut self, data: EventData) -> Event {
        let mut event = Event {
            data,
            stopped: false,
        };
        let kind = event.kind();
        for listener in self.listeners.iter_mut().filter(|l| l.kind == kind) {
            (listener.handler)(&mut event);
            if event.stopped {
                log::debug!("{kind} propagation stopped");
                break;
            }
        }
        event
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}
