//! The canvas service: viewport size and the visible region of the diagram.

use crate::config::ZoomMode;
use bpm_core::{DiagramModel, ViewBox, Viewport, fit_diagram};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CanvasState {
    viewport: Viewport,
    viewbox: ViewBox,
}

impl CanvasState {
    pub(crate) fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            viewbox: ViewBox::identity(viewport),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.viewbox = ViewBox::identity(self.viewport);
    }
}

pub struct Canvas<'a> {
    state: &'a mut CanvasState,
    model: &'a DiagramModel,
}

impl<'a> Canvas<'a> {
    pub(crate) fn new(state: &'a mut CanvasState, model: &'a DiagramModel) -> Self {
        Self { state, model }
    }

    /// Apply `mode` and return the resulting scale.
    pub fn zoom(&mut self, mode: ZoomMode) -> f32 {
        self.state.viewbox = match mode {
            ZoomMode::FitViewport => fit_diagram(self.model, self.state.viewport),
            ZoomMode::Level(scale) => self.state.viewbox.zoomed(self.state.viewport, scale),
        };
        log::debug!("canvas zoom {:?} -> {}", mode, self.state.viewbox.scale);
        self.state.viewbox.scale
    }

    pub fn viewbox(&self) -> ViewBox {
        self.state.viewbox
    }

    pub fn viewport(&self) -> Viewport {
        self.state.viewport
    }

    /// The container was resized; keep the scale, widen or narrow the view.
    pub fn resize(&mut self, viewport: Viewport) {
        self.state.viewport = viewport;
        self.state.viewbox = self.state.viewbox.zoomed(viewport, self.state.viewbox.scale);
    }
}
