use crate::error::ModelingError;
use bpm_core::{BusinessObject, DiagramModel, ElementKind, ModelError, NewShape};

/// What to build. Omitted sizes fall back to the kind's default size.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShapeAttrs {
    pub kind: Option<ElementKind>,
    pub business_object: Option<BusinessObject>,
    pub width: Option<f32>,
    pub height: Option<f32>,
}

impl ShapeAttrs {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn with_business_object(mut self, business_object: BusinessObject) -> Self {
        self.business_object = Some(business_object);
        self
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

/// Builds detached shapes with identifiers unique in the current diagram.
pub struct ElementFactory<'a> {
    model: &'a DiagramModel,
}

impl<'a> ElementFactory<'a> {
    pub(crate) fn new(model: &'a DiagramModel) -> Self {
        Self { model }
    }

    pub fn create_business_object(&self, name: Option<&str>) -> BusinessObject {
        match name {
            Some(name) => BusinessObject::named(name),
            None => BusinessObject::default(),
        }
    }

    pub fn create_shape(&self, attrs: ShapeAttrs) -> Result<NewShape, ModelingError> {
        let kind = attrs.kind.unwrap_or(ElementKind::Task);
        if kind.is_connection() {
            return Err(ModelError::NotAShape(kind.type_name().to_string()).into());
        }
        let (default_width, default_height) = kind.default_size();
        Ok(NewShape {
            id: self.model.next_id(kind.id_prefix()),
            kind,
            business_object: attrs.business_object.unwrap_or_default(),
            width: attrs.width.unwrap_or(default_width),
            height: attrs.height.unwrap_or(default_height),
        })
    }
}
