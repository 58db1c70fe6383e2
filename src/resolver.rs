//! Value resolution - which data source wins for a field
//!
//! Precedence, highest first:
//! 1. User-supplied data (`card.data`)
//! 2. Card default data (`card.defaultData`)
//! 3. The field's own template-authored default
//!
//! The winning source either carries a value directly or selects one or
//! more entries from the card's choice list for the field, optionally with
//! a value merged on top.

use serde_json::Value;
use tracing::trace;

use crate::card::{Card, ChoiceIndex, DataEntry};
use crate::error::{RenderError, Result};
use crate::templates::Field;

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    User,
    CardDefault,
    FieldDefault,
}

struct SourceRef<'a> {
    value: Option<&'a Value>,
    choice_index: Option<&'a ChoiceIndex>,
}

impl<'a> From<&'a DataEntry> for SourceRef<'a> {
    fn from(entry: &'a DataEntry) -> Self {
        Self {
            value: entry.value.as_ref(),
            choice_index: entry.choice_index.as_ref(),
        }
    }
}

impl SourceRef<'_> {
    fn is_present(&self) -> bool {
        self.value.is_some() || self.choice_index.is_some()
    }
}

/// A card entry wins as soon as it exists, even when it carries nothing:
/// a cleared field draws empty instead of falling back. Only the template's
/// own default has to carry a value or a choice index.
fn winning_source<'a>(field: &'a Field, card: &'a Card) -> Option<(DataSource, SourceRef<'a>)> {
    if let Some(entry) = card.data.get(&field.id) {
        return Some((DataSource::User, entry.into()));
    }
    if let Some(entry) = card.default_entry(&field.id) {
        return Some((DataSource::CardDefault, entry.into()));
    }

    let field_default = SourceRef {
        value: field.value.as_ref(),
        choice_index: field.choice_index.as_ref(),
    };
    field_default
        .is_present()
        .then_some((DataSource::FieldDefault, field_default))
}

/// Which source would supply this field's value, if any.
pub fn source_of(field: &Field, card: &Card) -> Option<DataSource> {
    winning_source(field, card).map(|(source, _)| source)
}

/// Resolve the value a field draws from. `Ok(None)` means no source has
/// anything for this field.
pub fn resolve(field: &Field, card: &Card) -> Result<Option<Value>> {
    let Some((source, src)) = winning_source(field, card) else {
        trace!(field = %field.id, "no data source");
        return Ok(None);
    };
    trace!(field = %field.id, ?source, "resolved data source");

    let Some(choice_index) = src.choice_index else {
        return Ok(src.value.cloned());
    };

    let choices = card.choices.get(&field.id).map(Vec::as_slice).unwrap_or_default();
    let mut chosen = resolve_choice(choice_index, choices).ok_or_else(|| {
        RenderError::Lookup(format!(
            "choice index {} out of range for field `{}` with {} choices",
            describe_index(choice_index),
            field.id,
            choices.len()
        ))
    })?;

    if let Some(overrides) = src.value {
        merge_shallow(&mut chosen, overrides);
    }
    Ok(Some(chosen))
}

/// Select choice(s) by index. A single index yields the choice itself; a
/// list of indices yields a list of choices in the same order. `None` when
/// any index is out of bounds.
pub fn resolve_choice(choice_index: &ChoiceIndex, choices: &[Value]) -> Option<Value> {
    match choice_index {
        ChoiceIndex::Single(i) => choices.get(*i).cloned(),
        ChoiceIndex::Many(indices) => indices
            .iter()
            .map(|i| choices.get(*i).cloned())
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
    }
}

/// Overlay `overrides` on `target`, one level deep. Objects merge per key
/// and arrays per index; anything else is replaced outright.
pub fn merge_shallow(target: &mut Value, overrides: &Value) {
    match (target, overrides) {
        (Value::Object(base), Value::Object(over)) => {
            for (k, v) in over {
                base.insert(k.clone(), v.clone());
            }
        }
        (Value::Array(base), Value::Array(over)) => {
            for (i, v) in over.iter().enumerate() {
                match base.get_mut(i) {
                    Some(slot) => *slot = v.clone(),
                    None => base.push(v.clone()),
                }
            }
        }
        (target, over) => *target = over.clone(),
    }
}

fn describe_index(index: &ChoiceIndex) -> String {
    match index {
        ChoiceIndex::Single(i) => i.to_string(),
        ChoiceIndex::Many(indices) => format!("{:?}", indices),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::{FieldKind, TextSpec};
    use serde_json::json;

    fn text_field() -> Field {
        Field::new(
            "title",
            FieldKind::Text(TextSpec { x: 0.0, y: 0.0, style: Default::default() }),
        )
        .with_value(json!({ "text": "from template" }))
    }

    fn card() -> Card {
        Card::new("poster")
    }

    #[test]
    fn test_precedence_user_data_wins() {
        let card = card()
            .with_data("title", DataEntry::value(json!({ "text": "user" })))
            .with_default("title", DataEntry::value(json!({ "text": "card default" })));

        assert_eq!(resolve(&text_field(), &card).unwrap(), Some(json!({ "text": "user" })));
        assert_eq!(source_of(&text_field(), &card), Some(DataSource::User));
    }

    #[test]
    fn test_precedence_card_default_then_field() {
        let card = card().with_default("title", DataEntry::value(json!({ "text": "card default" })));
        assert_eq!(
            resolve(&text_field(), &card).unwrap(),
            Some(json!({ "text": "card default" }))
        );

        assert_eq!(
            resolve(&text_field(), &Card::new("poster")).unwrap(),
            Some(json!({ "text": "from template" }))
        );
    }

    #[test]
    fn test_no_source_is_none() {
        let mut field = text_field();
        field.value = None;
        assert_eq!(resolve(&field, &card()).unwrap(), None);
        assert_eq!(source_of(&field, &card()), None);
    }

    #[test]
    fn test_cleared_user_entry_wins() {
        let card = card()
            .with_data("title", DataEntry::default())
            .with_default("title", DataEntry::value(json!({ "text": "card default" })));
        assert_eq!(source_of(&text_field(), &card), Some(DataSource::User));
        assert_eq!(resolve(&text_field(), &card).unwrap(), None);

        let nulled: Card = serde_json::from_value(json!({
            "templateName": "poster",
            "data": { "title": { "value": null } }
        }))
        .unwrap();
        assert_eq!(resolve(&text_field(), &nulled).unwrap(), None);
    }

    #[test]
    fn test_empty_card_default_wins_over_field_default() {
        let card = card().with_default("title", DataEntry::default());
        assert_eq!(source_of(&text_field(), &card), Some(DataSource::CardDefault));
        assert_eq!(resolve(&text_field(), &card).unwrap(), None);
    }

    #[test]
    fn test_empty_field_default_is_no_source() {
        let mut field = text_field();
        field.value = Some(json!(false));
        assert_eq!(source_of(&field, &card()), Some(DataSource::FieldDefault));
        field.value = None;
        assert_eq!(source_of(&field, &card()), None);
    }

    #[test]
    fn test_zero_value_is_not_unset() {
        let card = card().with_data("title", DataEntry::value(json!(0)));
        assert_eq!(resolve(&text_field(), &card).unwrap(), Some(json!(0)));
    }

    #[test]
    fn test_resolve_choice_single_and_many() {
        let choices = vec![json!("a"), json!("b"), json!("c")];
        assert_eq!(resolve_choice(&ChoiceIndex::Single(1), &choices), Some(json!("b")));
        assert_eq!(
            resolve_choice(&ChoiceIndex::Many(vec![2, 0]), &choices),
            Some(json!(["c", "a"]))
        );
        assert_eq!(resolve_choice(&ChoiceIndex::Single(3), &choices), None);
        assert_eq!(resolve_choice(&ChoiceIndex::Many(vec![0, 9]), &choices), None);
    }

    #[test]
    fn test_choice_with_value_override() {
        let card = card()
            .with_choices("title", vec![json!({ "text": "Preset", "size": 3 })])
            .with_data("title", DataEntry::choice(0).with_value(json!({ "size": 5 })));

        assert_eq!(
            resolve(&text_field(), &card).unwrap(),
            Some(json!({ "text": "Preset", "size": 5 }))
        );
        // the card's choice list is untouched
        assert_eq!(card.choices["title"][0], json!({ "text": "Preset", "size": 3 }));
    }

    #[test]
    fn test_out_of_range_choice_is_lookup_error() {
        let card = card()
            .with_choices("title", vec![json!({ "text": "only" })])
            .with_data("title", DataEntry::choice(4));
        assert!(matches!(resolve(&text_field(), &card), Err(RenderError::Lookup(_))));
    }

    #[test]
    fn test_field_default_choice_index() {
        let mut field = text_field().with_choice_index(ChoiceIndex::Single(1));
        field.value = None;
        let card = card().with_choices("title", vec![json!({ "text": "a" }), json!({ "text": "b" })]);
        assert_eq!(resolve(&field, &card).unwrap(), Some(json!({ "text": "b" })));
        assert_eq!(source_of(&field, &card), Some(DataSource::FieldDefault));
    }

    #[test]
    fn test_merge_arrays_by_index() {
        let mut base = json!([{ "a": 1 }, { "b": 2 }]);
        merge_shallow(&mut base, &json!([{ "z": 0 }]));
        assert_eq!(base, json!([{ "z": 0 }, { "b": 2 }]));
    }
}
