//! Card editing - reading and updating a card against its template

use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use crate::card::Card;
use crate::error::{RenderError, Result};
use crate::pipeline;
use crate::primitives::Primitive;
use crate::resolver;
use crate::resources::Fetchers;
use crate::templates::{Field, FieldKind, FieldType, Rect, Template};

type ChangeListener = Box<dyn Fn(&Card) + Send + Sync>;

/// A card bound to its template. Every mutation notifies the registered
/// change listeners.
pub struct CardEditor {
    card: Card,
    template: Arc<Template>,
    listeners: Vec<ChangeListener>,
}

impl CardEditor {
    pub fn new(card: Card, template: Arc<Template>) -> Self {
        Self { card, template, listeners: vec![] }
    }

    pub fn card(&self) -> &Card {
        &self.card
    }

    pub fn into_card(self) -> Card {
        self.card
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn width(&self) -> u32 {
        self.template.width
    }

    pub fn height(&self) -> u32 {
        self.template.height
    }

    pub fn on_change(&mut self, listener: impl Fn(&Card) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn changed(&self) {
        for listener in &self.listeners {
            listener(&self.card);
        }
    }

    pub fn check_field(&self, name: &str, expected: FieldType) -> Result<&Field> {
        self.template.check_field(name, expected)
    }

    /// Set one attribute of a field's value object, e.g. `zoomLevel` of an
    /// image. A missing entry or a non-object value is replaced by an object.
    pub fn set_data_attr(&mut self, field: &str, attr: &str, value: Value) -> Result<()> {
        if self.template.field(field).is_none() {
            return Err(RenderError::unknown_field(field));
        }

        let entry = self.card.data.entry(field.to_string()).or_default();
        if !matches!(entry.value, Some(Value::Object(_))) {
            entry.value = Some(Value::Object(Map::new()));
        }
        if let Some(Value::Object(object)) = &mut entry.value {
            object.insert(attr.to_string(), value);
        }
        trace!(%field, %attr, "data attribute set");

        self.changed();
        Ok(())
    }

    /// A user-set attribute of a field's value. `null` reads as unset; zero
    /// and `false` are values.
    pub fn data_attr(&self, field: &str, attr: &str) -> Option<&Value> {
        self.card
            .data
            .get(field)?
            .value
            .as_ref()?
            .get(attr)
            .filter(|v| !v.is_null())
    }

    pub fn data_attr_or(&self, field: &str, attr: &str, default: Value) -> Value {
        self.data_attr(field, attr).cloned().unwrap_or(default)
    }

    pub fn field_choices(&self, field: &str) -> Option<&[Value]> {
        self.card.choices.get(field).map(Vec::as_slice)
    }

    /// Drawing geometry of an `image` field
    pub fn image_location(&self, field: &str) -> Result<Rect> {
        match &self.check_field(field, FieldType::Image)?.kind {
            FieldKind::Image(spec) => Ok(spec.rect),
            _ => Err(RenderError::unknown_field(field)),
        }
    }

    /// The value the field would be drawn with
    pub fn field_value(&self, field: &str) -> Result<Option<Value>> {
        let field = self
            .template
            .field(field)
            .ok_or_else(|| RenderError::unknown_field(field))?;
        resolver::resolve(field, &self.card)
    }

    pub fn editable_fields(&self) -> Vec<&Field> {
        self.template.editable_fields().collect()
    }

    pub fn image_fields(&self) -> Vec<&Field> {
        self.template.image_fields().collect()
    }

    /// Instruction list for the card as it stands
    pub fn drawing_data(&self, fetchers: Fetchers<'_>) -> Result<Vec<Primitive>> {
        pipeline::build(&self.template, &self.card, fetchers)
    }
}

impl fmt::Debug for CardEditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardEditor")
            .field("card", &self.card)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}
