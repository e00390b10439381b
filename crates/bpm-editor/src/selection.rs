use crate::modeler::Modeler;
use bpm_core::ElementKey;

/// Selection service. Every change raises `selection.changed`.
pub struct Selection<'a> {
    modeler: &'a mut Modeler,
}

impl<'a> Selection<'a> {
    pub(crate) fn new(modeler: &'a mut Modeler) -> Self {
        Self { modeler }
    }

    /// Replace the selection. Unknown keys and duplicates are dropped.
    pub fn select(&mut self, keys: &[ElementKey]) {
        let mut next: Vec<ElementKey> = Vec::with_capacity(keys.len());
        for &key in keys {
            if self.modeler.model.get(key).is_some() && !next.contains(&key) {
                next.push(key);
            }
        }
        self.modeler.set_selection(next);
    }

    /// Add to the selection, keeping what is already selected.
    pub fn add(&mut self, key: ElementKey) {
        let mut next = self.modeler.selected.clone();
        next.push(key);
        self.select(&next);
    }

    pub fn deselect(&mut self, key: ElementKey) {
        let next: Vec<ElementKey> = self
            .modeler
            .selected
            .iter()
            .copied()
            .filter(|k| *k != key)
            .collect();
        self.modeler.set_selection(next);
    }

    pub fn clear(&mut self) {
        self.modeler.set_selection(Vec::new());
    }

    pub fn get(&self) -> &[ElementKey] {
        &self.modeler.selected
    }

    pub fn is_selected(&self, key: ElementKey) -> bool {
        self.modeler.selected.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_DIAGRAM, ModelerOptions};
    use crate::events::{EventData, EventKind};
    use bpm_core::NodeIndex;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn select_fires_with_old_and_new() {
        let mut modeler = Modeler::new(ModelerOptions::default(), &[]);
        modeler.import_xml(DEFAULT_DIAGRAM).unwrap();
        let start = modeler.element_by_id("StartEvent_1").unwrap().key;

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        modeler.on(EventKind::SelectionChanged, move |event| {
            if let EventData::SelectionChanged {
                old_selection,
                new_selection,
            } = event.data()
            {
                sink.borrow_mut().push((
                    old_selection.iter().map(|e| e.id.to_string()).collect::<Vec<_>>(),
                    new_selection.iter().map(|e| e.id.to_string()).collect::<Vec<_>>(),
                ));
            }
        });

        modeler.selection().select(&[start, start, NodeIndex::new(99)]);
        modeler.selection().select(&[start]);
        modeler.selection().clear();

        assert_eq!(
            *seen.borrow(),
            vec![
                (Vec::<String>::new(), vec!["StartEvent_1".to_string()]),
                (vec!["StartEvent_1".to_string()], Vec::<String>::new()),
            ]
        );
    }

    #[test]
    fn add_and_deselect() {
        let mut modeler = Modeler::new(ModelerOptions::default(), &[]);
        modeler.import_xml(DEFAULT_DIAGRAM).unwrap();
        let start = modeler.element_by_id("StartEvent_1").unwrap().key;

        modeler.selection().add(start);
        assert!(modeler.selection().is_selected(start));
        modeler.selection().deselect(start);
        assert!(modeler.selection().get().is_empty());
    }
}
