//! Template System - Declarative Card Layouts
//!
//! A template is a set of named, typed, positioned fields. Field declaration
//! order in the JSON document is paint order, so fields are kept in a `Vec`
//! rather than a hash map.

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::card::ChoiceIndex;
use crate::error::{RenderError, Result};

pub type FieldId = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Oldest engine release able to render this template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_min_version: Option<String>,
    pub width: u32,
    pub height: u32,
    #[serde(with = "ordered_fields")]
    pub fields: Vec<Field>,
}

impl Template {
    /// Parse a template document. This is the entry point to use.
    ///
    /// Unknown field types are reported as `UnsupportedFieldType` naming the
    /// offending field. Plain serde deserialization rejects them too, but
    /// only as a message inside a serde error.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: Value = serde_json::from_str(json)?;
        check_field_types(&raw)?;
        Ok(serde_json::from_str(json)?)
    }

    pub fn field(&self, id: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Look up a field and make sure it has the expected type.
    pub fn check_field(&self, name: &str, expected: FieldType) -> Result<&Field> {
        match self.field(name) {
            Some(field) if field.field_type() == expected => Ok(field),
            Some(field) => Err(RenderError::Lookup(format!(
                "field `{}` is of type `{}`, expected `{}`",
                name,
                field.field_type(),
                expected
            ))),
            None => Err(RenderError::unknown_field(name)),
        }
    }

    /// Fields carrying a `label` are user-settable
    pub fn editable_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_editable())
    }

    pub fn image_fields(&self) -> impl Iterator<Item = &Field> {
        self.editable_fields()
            .filter(|f| f.field_type() == FieldType::Image)
    }

    /// Refuse templates that need a newer engine than this one.
    pub fn check_engine_version(&self, engine_version: &str) -> Result<()> {
        let Some(min) = &self.engine_min_version else {
            return Ok(());
        };

        let engine = semver::Version::parse(engine_version)
            .map_err(|_| RenderError::Configuration("Invalid engine version".into()))?;
        let required = semver::Version::parse(min)
            .map_err(|_| RenderError::Configuration(format!("Invalid template min version `{}`", min)))?;

        if engine < required {
            return Err(RenderError::Configuration(format!(
                "template requires engine >= {}, current is {}",
                required, engine
            )));
        }
        Ok(())
    }
}

/// One named element of a template
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// Filled in from the key of the `fields` map
    #[serde(skip)]
    pub id: FieldId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Template-authored default value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice_index: Option<ChoiceIndex>,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl Field {
    pub fn new(id: impl Into<FieldId>, kind: FieldKind) -> Self {
        Self {
            id: id.into(),
            label: None,
            value: None,
            choice_index: None,
            kind,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_choice_index(mut self, index: ChoiceIndex) -> Self {
        self.choice_index = Some(index);
        self
    }

    pub fn field_type(&self) -> FieldType {
        self.kind.field_type()
    }

    pub fn is_editable(&self) -> bool {
        self.label.is_some()
    }

    /// Every field type except `line` draws from resolved data
    pub fn requires_data(&self) -> bool {
        self.field_type() != FieldType::Line
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FieldKind {
    Color(ColorSpec),
    Line(LineSpec),
    Text(TextSpec),
    KeyValText(KeyValTextSpec),
    KeyValList(KeyValListSpec),
    #[serde(alias = "labeled-choice-image")]
    Image(ImageSpec),
    MultiImage(MultiImageSpec),
    #[serde(alias = "labeled-choice-svg")]
    Svg(SvgSpec),
    ColorScheme,
}

impl FieldKind {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldKind::Color(_) => FieldType::Color,
            FieldKind::Line(_) => FieldType::Line,
            FieldKind::Text(_) => FieldType::Text,
            FieldKind::KeyValText(_) => FieldType::KeyValText,
            FieldKind::KeyValList(_) => FieldType::KeyValList,
            FieldKind::Image(_) => FieldType::Image,
            FieldKind::MultiImage(_) => FieldType::MultiImage,
            FieldKind::Svg(_) => FieldType::Svg,
            FieldKind::ColorScheme => FieldType::ColorScheme,
        }
    }
}

/// Type tag of a field, as written in the template's `type` member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    Color,
    Line,
    Text,
    KeyValText,
    KeyValList,
    Image,
    MultiImage,
    Svg,
    ColorScheme,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Color => "color",
            FieldType::Line => "line",
            FieldType::Text => "text",
            FieldType::KeyValText => "key-val-text",
            FieldType::KeyValList => "key-val-list",
            FieldType::Image => "image",
            FieldType::MultiImage => "multi-image",
            FieldType::Svg => "svg",
            FieldType::ColorScheme => "color-scheme",
        }
    }

    /// Map a `type` tag to a field type, accepting legacy aliases.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let field_type = match tag {
            "color" => FieldType::Color,
            "line" => FieldType::Line,
            "text" => FieldType::Text,
            "key-val-text" => FieldType::KeyValText,
            "key-val-list" => FieldType::KeyValList,
            "image" | "labeled-choice-image" => FieldType::Image,
            "multi-image" => FieldType::MultiImage,
            "svg" | "labeled-choice-svg" => FieldType::Svg,
            "color-scheme" => FieldType::ColorScheme,
            _ => return None,
        };
        Some(field_type)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        FieldType::from_tag(s).ok_or_else(|| format!("unknown field type `{}`", s))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

/// Styling shared by every text-producing field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap_at: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_align: Option<TextAlign>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorSpec {
    #[serde(flatten)]
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSpec {
    pub start_x: f64,
    pub start_y: f64,
    pub end_x: f64,
    pub end_y: f64,
    #[serde(default = "default_line_width")]
    pub width: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

fn default_line_width() -> f64 { 1.0 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpec {
    pub x: f64,
    pub y: f64,
    #[serde(flatten)]
    pub style: TextStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyValTextSpec {
    pub key_x: f64,
    pub val_x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(flatten)]
    pub style: TextStyle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyValListSpec {
    #[serde(default)]
    pub y: f64,
    pub y_incr: f64,
    pub key_val_spec: KeyValTextSpec,
    /// Data-less decorations repeated for every entry. Only `line` is drawable.
    #[serde(default)]
    pub additional_elements: Vec<FieldKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSpec {
    #[serde(flatten)]
    pub rect: Rect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit: Option<TextSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiImageSpec {
    /// `specs[n - 1]` holds the geometry used when the value has `n` images
    pub specs: Vec<Vec<Rect>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvgSpec {
    #[serde(flatten)]
    pub rect: Rect,
}

fn check_field_types(raw: &Value) -> Result<()> {
    let Some(fields) = raw.get("fields").and_then(Value::as_object) else {
        return Ok(());
    };

    for (id, field) in fields {
        check_field_entry(id, field)?;
    }
    Ok(())
}

fn check_field_entry(id: &str, field: &Value) -> Result<()> {
    check_type_tag(id, field)?;

    let elements = field
        .get("additionalElements")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for (i, element) in elements.iter().enumerate() {
        check_type_tag(&format!("{}.additionalElements[{}]", id, i), element)?;
    }
    Ok(())
}

fn check_type_tag(id: &str, field: &Value) -> Result<()> {
    match field.get("type").and_then(Value::as_str) {
        Some(tag) if FieldType::from_tag(tag).is_none() => Err(RenderError::UnsupportedFieldType {
            field: id.to_string(),
            type_name: tag.to_string(),
        }),
        _ => Ok(()),
    }
}

/// (De)serialize the `fields` map as an ordered list of fields
mod ordered_fields {
    use super::*;

    pub fn serialize<S: Serializer>(fields: &[Field], serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(fields.len()))?;
        for field in fields {
            map.serialize_entry(&field.id, field)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<Field>, D::Error> {
        deserializer.deserialize_map(FieldsVisitor)
    }

    struct FieldsVisitor;

    impl<'de> Visitor<'de> for FieldsVisitor {
        type Value = Vec<Field>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of field ids to field specifications")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
            let mut fields = Vec::with_capacity(access.size_hint().unwrap_or(0));
            let mut seen = HashSet::new();

            while let Some((id, raw)) = access.next_entry::<String, Value>()? {
                if !seen.insert(id.clone()) {
                    return Err(de::Error::custom(format!("duplicate field id `{}`", id)));
                }
                check_field_entry(&id, &raw).map_err(de::Error::custom)?;
                let mut field = Field::deserialize(raw).map_err(de::Error::custom)?;
                field.id = id;
                fields.push(field);
            }
            Ok(fields)
        }
    }
}

/// Source of templates by name
pub trait TemplateSupplier: Send + Sync {
    fn supply(&self, name: &str) -> Result<Arc<Template>>;
}

/// Template registry - loads and caches templates
pub struct TemplateRegistry {
    templates: HashMap<String, Arc<Template>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self { templates: HashMap::new() }
    }

    /// Load every `*.json` template in `dir`. A template is registered under
    /// its `name`, or the file stem when it has none. Unreadable templates
    /// are skipped with a warning.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let mut registry = Self::new();
        if !dir.exists() {
            warn!(dir = %dir.display(), "template directory does not exist");
            return Ok(registry);
        }

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map_or(true, |e| e != "json") {
                continue;
            }

            let template = match fs::read_to_string(&path)
                .map_err(RenderError::from)
                .and_then(|content| Template::from_json(&content))
            {
                Ok(template) => template,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping template");
                    continue;
                }
            };

            let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned());
            if let Some(name) = template.name.clone().or(stem) {
                debug!(%name, fields = template.fields.len(), "registered template");
                registry.register(name, template);
            }
        }
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Template>> {
        self.templates.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn register(&mut self, name: impl Into<String>, template: Template) {
        self.templates.insert(name.into(), Arc::new(template));
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateSupplier for TemplateRegistry {
    fn supply(&self, name: &str) -> Result<Arc<Template>> {
        self.get(name)
            .ok_or_else(|| RenderError::Lookup(format!("Template not found: {}", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = r##"{
        "width": 300,
        "height": 400,
        "fields": {
            "zeta": { "type": "text", "x": 1, "y": 2, "font": "10px", "label": "Zeta" },
            "alpha": { "type": "line", "startX": 0, "startY": 0, "endX": 10, "endY": 0 },
            "photo": { "type": "labeled-choice-image", "x": 0, "y": 0, "width": 10, "height": 10, "label": "Photo" },
            "palette": { "type": "color-scheme", "value": { "accent": "#fff" } }
        }
    }"##;

    #[test]
    fn test_declaration_order_preserved() {
        let template = Template::from_json(TEMPLATE).unwrap();
        let ids: Vec<_> = template.fields.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["zeta", "alpha", "photo", "palette"]);
        assert_eq!(template.fields[2].field_type(), FieldType::Image);
        assert!(template.fields[3].value.is_some());
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let json = r#"{"width": 1, "height": 1, "fields": {
            "a": { "type": "line", "startX": 0, "startY": 0, "endX": 1, "endY": 1 },
            "a": { "type": "line", "startX": 0, "startY": 0, "endX": 1, "endY": 1 }
        }}"#;
        let err = Template::from_json(json).unwrap_err();
        assert!(err.to_string().contains("duplicate field id"));
    }

    #[test]
    fn test_unknown_type_is_unsupported() {
        let json = r#"{"width": 1, "height": 1, "fields": { "blob": { "type": "hologram" } }}"#;
        match Template::from_json(json) {
            Err(RenderError::UnsupportedFieldType { field, type_name }) => {
                assert_eq!(field, "blob");
                assert_eq!(type_name, "hologram");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_serde_path_names_unsupported_type() {
        let json = r#"{"width": 1, "height": 1, "fields": {
            "rows": { "type": "key-val-list", "yIncr": 1, "keyValSpec": { "keyX": 0, "valX": 1 },
                      "additionalElements": [ { "type": "sparkle" } ] }
        }}"#;
        let err = serde_json::from_str::<Template>(json).unwrap_err().to_string();
        assert!(err.contains("Unsupported field type `sparkle`"), "{}", err);
        assert!(err.contains("rows.additionalElements[0]"), "{}", err);

        let err = serde_json::from_value::<Template>(serde_json::json!({
            "width": 1, "height": 1, "fields": { "blob": { "type": "hologram" } }
        }))
        .unwrap_err()
        .to_string();
        assert!(err.contains("`hologram` in field `blob`"), "{}", err);
    }

    #[test]
    fn test_check_field() {
        let template = Template::from_json(TEMPLATE).unwrap();
        assert!(template.check_field("photo", FieldType::Image).is_ok());
        assert!(matches!(
            template.check_field("photo", FieldType::Text),
            Err(RenderError::Lookup(_))
        ));
        assert!(matches!(
            template.check_field("missing", FieldType::Image),
            Err(RenderError::Lookup(_))
        ));
    }

    #[test]
    fn test_editable_and_image_fields() {
        let template = Template::from_json(TEMPLATE).unwrap();
        let editable: Vec<_> = template.editable_fields().map(|f| f.id.as_str()).collect();
        assert_eq!(editable, ["zeta", "photo"]);
        let images: Vec<_> = template.image_fields().map(|f| f.id.as_str()).collect();
        assert_eq!(images, ["photo"]);
        assert!(!template.field("alpha").unwrap().requires_data());
    }

    #[test]
    fn test_engine_version_check() {
        let mut template = Template::from_json(TEMPLATE).unwrap();
        assert!(template.check_engine_version("1.0.0").is_ok());

        template.engine_min_version = Some("2.1.0".into());
        assert!(matches!(
            template.check_engine_version("1.0.0"),
            Err(RenderError::Configuration(_))
        ));
        assert!(template.check_engine_version("2.1.0").is_ok());
    }

    #[test]
    fn test_registry_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("poster.json"), TEMPLATE).unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let registry = TemplateRegistry::load_from_dir(dir.path()).unwrap();
        assert_eq!(registry.names(), ["poster"]);
        assert_eq!(registry.supply("poster").unwrap().width, 300);
        assert!(matches!(registry.supply("nope"), Err(RenderError::Lookup(_))));
    }
}
