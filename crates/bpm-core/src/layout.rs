//! Viewport math for the canvas: the visible diagram region (`ViewBox`)
//! and the `fit-viewport` zoom.

use crate::model::{Bounds, DiagramModel};
use serde::{Deserialize, Serialize};

/// The canvas container dimensions in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

/// The diagram-space rectangle currently shown, plus its scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub scale: f32,
}

impl ViewBox {
    /// Unscaled view anchored at the origin.
    pub fn identity(viewport: Viewport) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: viewport.width,
            height: viewport.height,
            scale: 1.0,
        }
    }

    /// Zoom to an explicit scale, keeping the view's center fixed.
    pub fn zoomed(&self, viewport: Viewport, scale: f32) -> Self {
        let scale = scale.max(f32::EPSILON);
        let cx = self.x + self.width / 2.0;
        let cy = self.y + self.height / 2.0;
        let width = viewport.width / scale;
        let height = viewport.height / scale;
        Self {
            x: cx - width / 2.0,
            y: cy - height / 2.0,
            width,
            height,
            scale,
        }
    }
}

/// Fit `inner` (the diagram bounding box) into the viewport.
///
/// Never zooms in past 1.0. When the diagram fits at full scale the view
/// stays anchored at the origin; otherwise it starts at the diagram's
/// top-left corner.
pub fn fit_viewport(inner: Option<Bounds>, viewport: Viewport) -> ViewBox {
    let Some(inner) = inner.filter(|b| b.width > 0.0 || b.height > 0.0) else {
        return ViewBox::identity(viewport);
    };

    let scale = 1f32
        .min(viewport.width / inner.width.max(1.0))
        .min(viewport.height / inner.height.max(1.0));

    let (x, y) = if scale >= 1.0 && inner.right() <= viewport.width && inner.bottom() <= viewport.height
    {
        (0.0, 0.0)
    } else {
        (inner.x, inner.y)
    };

    ViewBox {
        x,
        y,
        width: viewport.width / scale,
        height: viewport.height / scale,
        scale,
    }
}

/// Fit the whole diagram.
pub fn fit_diagram(model: &DiagramModel, viewport: Viewport) -> ViewBox {
    fit_viewport(model.bounding_box(), viewport)
}
