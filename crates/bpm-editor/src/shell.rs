//! The editor shell: owns the modeler, keeps the selected element and the
//! properties form in sync with it, and saves the diagram through a
//! platform `Downloader`.
//!
//! ```text
//!  mount ──► Modeler::new + CustomModule ──► import default diagram
//!                                               │
//!        selection.changed / element.changed ◄──┘
//!                     │
//!                     ▼
//!      ShellView { selected, form } ──► form.change ──► update_properties
//! ```
//!
//! Every failure is caught here and logged; none escapes to the caller.

use crate::config::EditorConfig;
use crate::error::{DownloadError, EditorError};
use crate::events::{EventData, EventKind};
use crate::modeler::Modeler;
use crate::properties::{FormSnapshot, FormView, PropertiesForm};
use crate::providers::CustomModule;
use bpm_core::{Element, Property, SaveOptions, Viewport};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready,
    /// Setup failed. The shell keeps running without an engine.
    Failed,
    Destroyed,
}

/// A file handed to the platform for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadFile {
    pub file_name: String,
    pub mime_type: String,
    pub contents: String,
}

/// Platform download mechanism. `release` is called exactly once for every
/// handle `create` returns, whether or not `trigger` succeeded.
pub trait Downloader {
    type Handle;

    fn create(&mut self, file: &DownloadFile) -> Result<Self::Handle, DownloadError>;

    fn trigger(&mut self, handle: &Self::Handle, file_name: &str) -> Result<(), DownloadError>;

    fn release(&mut self, handle: Self::Handle);
}

/// State shared with the modeler's event listeners.
#[derive(Debug, Default)]
struct ShellView {
    selected: Option<Element>,
    form: PropertiesForm,
}

impl ShellView {
    fn show(&mut self, selected: Option<Element>) {
        self.form.render(selected.as_ref());
        self.selected = selected;
    }
}

pub struct EditorShell {
    config: EditorConfig,
    modeler: Option<Modeler>,
    state: EngineState,
    view: Rc<RefCell<ShellView>>,
}

impl EditorShell {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            config,
            modeler: None,
            state: EngineState::Uninitialized,
            view: Rc::new(RefCell::new(ShellView::default())),
        }
    }

    /// Build a modeler bound to `container` and load the default diagram.
    /// Without a container nothing happens.
    pub fn mount(&mut self, container: Option<Viewport>) {
        let Some(container) = container else {
            log::debug!("no container, modeler not created");
            return;
        };
        let mut options = self.config.modeler.clone();
        options.container = Some(container);
        self.attach(Modeler::new(options, &[&CustomModule]));
    }

    /// Take over an already constructed modeler and set it up.
    pub fn attach(&mut self, mut modeler: Modeler) {
        if let Some(mut previous) = self.modeler.take() {
            previous.destroy();
        }
        self.state = EngineState::Initializing;
        self.view.borrow_mut().show(None);
        match self.setup(&mut modeler) {
            Ok(()) => {
                self.modeler = Some(modeler);
                self.state = EngineState::Ready;
            }
            Err(err) => {
                log::error!("Error setting up BPMN modeler: {err}");
                modeler.destroy();
                self.state = EngineState::Failed;
            }
        }
    }

    fn setup(&self, modeler: &mut Modeler) -> Result<(), EditorError> {
        let result = modeler.import_xml(&self.config.default_diagram)?;
        if !result.warnings.is_empty() {
            log::warn!(
                "Warnings while importing BPMN diagram: {:?}",
                result.warnings
            );
        }

        let scale = modeler
            .canvas()
            .ok_or(EditorError::CanvasMissing)?
            .zoom(self.config.zoom);
        log::debug!("canvas zoomed to {scale}");

        let view = Rc::clone(&self.view);
        modeler.on(EventKind::SelectionChanged, move |event| {
            if let EventData::SelectionChanged { new_selection, .. } = event.data() {
                view.borrow_mut().show(new_selection.first().cloned());
            }
        });

        // Compare against the selection as it is now, not when subscribing.
        let view = Rc::clone(&self.view);
        modeler.on(EventKind::ElementChanged, move |event| {
            if let EventData::ElementChanged { element } = event.data() {
                let mut view = view.borrow_mut();
                if view.selected.as_ref().is_some_and(|s| s.key == element.key) {
                    view.show(Some(element.clone()));
                }
            }
        });
        Ok(())
    }

    /// Destroy the modeler.
    pub fn unmount(&mut self) {
        if let Some(mut modeler) = self.modeler.take() {
            modeler.destroy();
        }
        self.view.borrow_mut().show(None);
        self.state = EngineState::Destroyed;
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn modeler(&self) -> Option<&Modeler> {
        self.modeler.as_ref()
    }

    pub fn modeler_mut(&mut self) -> Option<&mut Modeler> {
        self.modeler.as_mut()
    }

    pub fn selected_element(&self) -> Option<Element> {
        self.view.borrow().selected.clone()
    }

    pub fn form_snapshot(&self) -> FormSnapshot {
        self.view.borrow().form.snapshot().clone()
    }

    pub fn form_view(&self) -> FormView {
        self.view.borrow().form.view()
    }

    /// A keystroke in the properties form.
    pub fn edit_field(&mut self, property: Property, value: &str) {
        let change = self.view.borrow_mut().form.change(property, value);
        if let Some(change) = change {
            self.handle_property_change(change.property.name(), &change.value);
        }
    }

    /// Push one property into the selected element.
    pub fn handle_property_change(&mut self, property: &str, value: &str) {
        let Some(modeler) = self.modeler.as_mut() else {
            return;
        };
        let Some(selected) = self.view.borrow().selected.as_ref().map(|e| e.key) else {
            return;
        };
        let result = property
            .parse::<Property>()
            .map_err(|err| EditorError::Modeling(err.into()))
            .and_then(|property| {
                modeler
                    .modeling()
                    .update_properties(selected, &[(property, value)])
                    .map_err(EditorError::from)
            });
        if let Err(err) = result {
            log::error!("Error updating properties: {err}");
        }
    }

    /// Export the diagram and hand it to `downloader`.
    pub fn handle_save<D: Downloader>(&self, downloader: &mut D) {
        let Some(modeler) = self.modeler.as_ref() else {
            return;
        };
        match self.save(modeler, downloader) {
            Ok(()) => log::info!("Diagram saved successfully."),
            Err(err) => log::error!("Error saving diagram: {err}"),
        }
    }

    fn save<D: Downloader>(&self, modeler: &Modeler, downloader: &mut D) -> Result<(), EditorError> {
        let xml = modeler.save_xml(SaveOptions { format: true })?;
        let file = DownloadFile {
            file_name: self.config.file_name.clone(),
            mime_type: self.config.mime_type.clone(),
            contents: xml,
        };
        let handle = downloader.create(&file)?;
        let triggered = downloader.trigger(&handle, &file.file_name);
        downloader.release(handle);
        Ok(triggered?)
    }
}

impl Drop for EditorShell {
    fn drop(&mut self) {
        if let Some(mut modeler) = self.modeler.take() {
            modeler.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Recorder {
        created: Vec<DownloadFile>,
        triggered: Vec<String>,
        released: usize,
        fail_trigger: bool,
    }

    impl Downloader for Recorder {
        type Handle = usize;

        fn create(&mut self, file: &DownloadFile) -> Result<usize, DownloadError> {
            self.created.push(file.clone());
            Ok(self.created.len())
        }

        fn trigger(&mut self, _: &usize, file_name: &str) -> Result<(), DownloadError> {
            if self.fail_trigger {
                return Err(DownloadError::Trigger("blocked".into()));
            }
            self.triggered.push(file_name.to_string());
            Ok(())
        }

        fn release(&mut self, _: usize) {
            self.released += 1;
        }
    }

    fn mounted() -> EditorShell {
        let mut shell = EditorShell::new(EditorConfig::default());
        shell.mount(Some(Viewport::default()));
        shell
    }

    #[test]
    fn mount_reaches_ready() {
        let shell = mounted();
        assert_eq!(shell.state(), EngineState::Ready);
        let modeler = shell.modeler().unwrap();
        assert_eq!(modeler.modules(), &["customTaskModule"]);
        assert!(modeler.options().grid_visible);
        assert!(modeler.element_by_id("StartEvent_1").is_some());
    }

    #[test]
    fn mount_without_container_does_nothing() {
        let mut shell = EditorShell::new(EditorConfig::default());
        shell.mount(None);
        assert_eq!(shell.state(), EngineState::Uninitialized);
        assert!(shell.modeler().is_none());
    }

    #[test]
    fn save_without_engine_is_noop() {
        let shell = EditorShell::new(EditorConfig::default());
        let mut downloader = Recorder::default();
        shell.handle_save(&mut downloader);
        assert!(downloader.created.is_empty());
        assert_eq!(downloader.released, 0);
    }

    #[test]
    fn save_downloads_formatted_xml() {
        let shell = mounted();
        let mut downloader = Recorder::default();
        shell.handle_save(&mut downloader);

        assert_eq!(downloader.created.len(), 1);
        let file = &downloader.created[0];
        assert_eq!(file.file_name, "diagram.bpmn");
        assert_eq!(file.mime_type, "text/xml");
        assert!(file.contents.starts_with("<?xml"));
        assert!(file.contents.contains("\n  <bpmn2:process"));
        assert_eq!(downloader.triggered, vec!["diagram.bpmn"]);
        assert_eq!(downloader.released, 1);
    }

    #[test]
    fn failed_trigger_still_releases() {
        let shell = mounted();
        let mut downloader = Recorder {
            fail_trigger: true,
            ..Recorder::default()
        };
        shell.handle_save(&mut downloader);
        assert_eq!(downloader.created.len(), 1);
        assert_eq!(downloader.released, 1);
    }

    #[test]
    fn property_change_without_selection_is_noop() {
        let mut shell = mounted();
        shell.handle_property_change("name", "Begin");
        let modeler = shell.modeler().unwrap();
        assert_eq!(modeler.element_by_id("StartEvent_1").unwrap().name(), None);
    }

    #[test]
    fn unmount_destroys() {
        let mut shell = mounted();
        shell.unmount();
        assert_eq!(shell.state(), EngineState::Destroyed);
        assert!(shell.modeler().is_none());
        assert_eq!(shell.form_view(), PropertiesForm::new().view());
    }
}
