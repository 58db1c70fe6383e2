//! Color schemes - named palettes referenced as `$<scheme>.<key>`

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::card::Card;
use crate::error::{RenderError, Result};
use crate::resolver;
use crate::templates::{Field, FieldId};

/// Semantic color key to literal color
pub type Palette = BTreeMap<String, String>;

const REFERENCE_SIGIL: char = '$';

/// Palettes of one render pass, keyed by the id of their color-scheme field
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColorSchemeTable {
    schemes: HashMap<FieldId, Palette>,
}

impl ColorSchemeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<FieldId>, palette: Palette) {
        self.schemes.insert(id.into(), palette);
    }

    pub fn get(&self, id: &str) -> Option<&Palette> {
        self.schemes.get(id)
    }

    pub fn len(&self) -> usize {
        self.schemes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }

    pub fn resolve_color(&self, raw: &str) -> Result<String> {
        resolve_color(self, raw)
    }
}

impl FromIterator<(FieldId, Palette)> for ColorSchemeTable {
    fn from_iter<I: IntoIterator<Item = (FieldId, Palette)>>(iter: I) -> Self {
        Self { schemes: iter.into_iter().collect() }
    }
}

/// Resolve every color-scheme field's palette. Must complete before any
/// other field is expanded. A scheme field with no data contributes no
/// palette; references to it fail later with `MissingReference`.
pub fn build_schemes<'a>(
    fields: impl IntoIterator<Item = &'a Field>,
    card: &Card,
) -> Result<ColorSchemeTable> {
    let mut table = ColorSchemeTable::new();

    for field in fields {
        let Some(value) = resolver::resolve(field, card)? else {
            debug!(scheme = %field.id, "color scheme has no data");
            continue;
        };

        let palette: Palette = serde_json::from_value(value).map_err(|source| RenderError::InvalidValue {
            field: field.id.clone(),
            source,
        })?;
        debug!(scheme = %field.id, colors = palette.len(), "resolved color scheme");
        table.insert(field.id.clone(), palette);
    }
    Ok(table)
}

/// Dereference `$<scheme>.<key>`; any other color passes through unchanged.
///
/// Palettes may not reference other palettes.
pub fn resolve_color(schemes: &ColorSchemeTable, raw: &str) -> Result<String> {
    let Some(reference) = raw.strip_prefix(REFERENCE_SIGIL) else {
        return Ok(raw.to_string());
    };

    let missing = |detail: String| RenderError::MissingReference {
        reference: raw.to_string(),
        detail,
    };

    let (scheme_name, key) = reference
        .split_once('.')
        .ok_or_else(|| missing("expected `$<scheme>.<key>`".into()))?;
    let palette = schemes
        .get(scheme_name)
        .ok_or_else(|| missing(format!("no color scheme `{}`", scheme_name)))?;
    let color = palette
        .get(key)
        .ok_or_else(|| missing(format!("color scheme `{}` has no key `{}`", scheme_name, key)))?;

    if color.starts_with(REFERENCE_SIGIL) {
        return Err(missing(format!(
            "`{}` points at another scheme (`{}`), which is not supported",
            raw, color
        )));
    }
    Ok(color.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::DataEntry;
    use crate::templates::FieldKind;
    use serde_json::json;

    fn table() -> ColorSchemeTable {
        [("main".to_string(), Palette::from([("accent".to_string(), "#00ff00".to_string())]))]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_literal_color_unchanged() {
        assert_eq!(resolve_color(&table(), "#ff0000").unwrap(), "#ff0000");
    }

    #[test]
    fn test_reference_resolved() {
        assert_eq!(resolve_color(&table(), "$main.accent").unwrap(), "#00ff00");
    }

    #[test]
    fn test_missing_scheme_and_key() {
        assert!(matches!(
            resolve_color(&table(), "$other.accent"),
            Err(RenderError::MissingReference { .. })
        ));
        assert!(matches!(
            resolve_color(&table(), "$main.background"),
            Err(RenderError::MissingReference { .. })
        ));
        assert!(matches!(
            resolve_color(&table(), "$main"),
            Err(RenderError::MissingReference { .. })
        ));
    }

    #[test]
    fn test_scheme_to_scheme_rejected() {
        let mut schemes = table();
        schemes.insert("alt", Palette::from([("accent".to_string(), "$main.accent".to_string())]));
        assert!(matches!(
            resolve_color(&schemes, "$alt.accent"),
            Err(RenderError::MissingReference { .. })
        ));
    }

    #[test]
    fn test_build_schemes_uses_precedence_and_choices() {
        let fields = vec![
            Field::new("main", FieldKind::ColorScheme).with_value(json!({ "accent": "#111111" })),
            Field::new("alt", FieldKind::ColorScheme),
            Field::new("unused", FieldKind::ColorScheme),
        ];
        let card = Card::new("poster")
            .with_choices("alt", vec![json!({ "accent": "#aaaaaa" }), json!({ "accent": "#bbbbbb" })])
            .with_data("alt", DataEntry::choice(1));

        let schemes = build_schemes(&fields, &card).unwrap();
        assert_eq!(schemes.len(), 2);
        assert_eq!(schemes.resolve_color("$main.accent").unwrap(), "#111111");
        assert_eq!(schemes.resolve_color("$alt.accent").unwrap(), "#bbbbbb");
        assert!(schemes.get("unused").is_none());
    }

    #[test]
    fn test_build_schemes_rejects_non_palette() {
        let fields = vec![Field::new("main", FieldKind::ColorScheme).with_value(json!(["#fff"]))];
        assert!(matches!(
            build_schemes(&fields, &Card::new("poster")),
            Err(RenderError::InvalidValue { .. })
        ));
    }
}
