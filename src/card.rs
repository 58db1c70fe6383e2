//! Card data - sparse, layered values for a template's fields

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::templates::FieldId;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub template_name: String,
    /// User-supplied values, highest precedence
    #[serde(default)]
    pub data: HashMap<FieldId, DataEntry>,
    #[serde(default)]
    pub choices: HashMap<FieldId, Vec<Value>>,
    /// Card-level defaults, consulted when the user has not set a field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_data: Option<HashMap<FieldId, DataEntry>>,
}

impl Card {
    pub fn new(template_name: impl Into<String>) -> Self {
        Self {
            template_name: template_name.into(),
            ..Default::default()
        }
    }

    pub fn with_data(mut self, field: impl Into<FieldId>, entry: DataEntry) -> Self {
        self.data.insert(field.into(), entry);
        self
    }

    pub fn with_default(mut self, field: impl Into<FieldId>, entry: DataEntry) -> Self {
        self.default_data
            .get_or_insert_with(HashMap::new)
            .insert(field.into(), entry);
        self
    }

    pub fn with_choices(mut self, field: impl Into<FieldId>, choices: Vec<Value>) -> Self {
        self.choices.insert(field.into(), choices);
        self
    }

    pub fn default_entry(&self, field: &str) -> Option<&DataEntry> {
        self.default_data.as_ref().and_then(|d| d.get(field))
    }
}

/// One data source for a field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice_index: Option<ChoiceIndex>,
}

impl DataEntry {
    pub fn value(value: Value) -> Self {
        Self { value: Some(value), choice_index: None }
    }

    pub fn choice(index: impl Into<ChoiceIndex>) -> Self {
        Self { value: None, choice_index: Some(index.into()) }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Whether the entry carries a value or a choice. `{}` and
    /// `{"value": null}` carry nothing, yet still shadow lower layers.
    pub fn is_present(&self) -> bool {
        self.value.is_some() || self.choice_index.is_some()
    }
}

/// Index into a field's choice list: one choice, or several in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChoiceIndex {
    Single(usize),
    Many(Vec<usize>),
}

impl From<usize> for ChoiceIndex {
    fn from(index: usize) -> Self {
        ChoiceIndex::Single(index)
    }
}

impl From<Vec<usize>> for ChoiceIndex {
    fn from(indices: Vec<usize>) -> Self {
        ChoiceIndex::Many(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_card_from_json() {
        let card: Card = serde_json::from_value(json!({
            "templateName": "poster",
            "data": {
                "title": { "value": { "text": "Hello" } },
                "tags": { "choiceIndex": [2, 0] },
                "empty": { "value": null }
            },
            "choices": { "tags": ["a", "b", "c"] }
        }))
        .unwrap();

        assert_eq!(card.template_name, "poster");
        assert!(card.default_data.is_none());
        assert_eq!(card.data["tags"].choice_index, Some(ChoiceIndex::Many(vec![2, 0])));
        assert!(!card.data["empty"].is_present());
        assert!(card.data["title"].is_present());
    }

    #[test]
    fn test_zero_index_is_present() {
        assert!(DataEntry::choice(0).is_present());
        assert!(DataEntry::value(json!(0)).is_present());
    }
}
