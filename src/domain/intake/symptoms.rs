//! Symptom fields and the extracted-data snapshot.
//!
//! The field set is closed: every conversation tracks exactly these
//! fields, each either unset or holding a `SymptomValue`. Analysis
//! results arrive as loosely shaped JSON and are coerced here, at the
//! boundary, before any clinical logic sees them.

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// A tracked symptom or history item.
///
/// Variant order is the declaration order used for summaries and
/// serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SymptomField {
    Cough,
    Wheeze,
    Dyspnea,
    ChestTightness,
    Nocturnal,
    Duration,
    BronchodilatorUse,
    Resolution,
    Fever,
    SoreThroat,
    FamilyHistory,
    AtopyHistory,
    AirborneAllergen,
    FoodAllergen,
}

impl SymptomField {
    /// All fields in declaration order.
    pub const ALL: [SymptomField; 14] = [
        SymptomField::Cough,
        SymptomField::Wheeze,
        SymptomField::Dyspnea,
        SymptomField::ChestTightness,
        SymptomField::Nocturnal,
        SymptomField::Duration,
        SymptomField::BronchodilatorUse,
        SymptomField::Resolution,
        SymptomField::Fever,
        SymptomField::SoreThroat,
        SymptomField::FamilyHistory,
        SymptomField::AtopyHistory,
        SymptomField::AirborneAllergen,
        SymptomField::FoodAllergen,
    ];

    /// The key used in prompts, stored documents and user-facing summaries.
    pub fn label(&self) -> &'static str {
        match self {
            SymptomField::Cough => "기침",
            SymptomField::Wheeze => "쌕쌕거림",
            SymptomField::Dyspnea => "호흡곤란",
            SymptomField::ChestTightness => "가슴 답답",
            SymptomField::Nocturnal => "야간",
            SymptomField::Duration => "증상 지속",
            SymptomField::BronchodilatorUse => "기관지확장제 사용",
            SymptomField::Resolution => "증상 완화 여부",
            SymptomField::Fever => "발열",
            SymptomField::SoreThroat => "인후통",
            SymptomField::FamilyHistory => "가족력",
            SymptomField::AtopyHistory => "아토피 병력",
            SymptomField::AirborneAllergen => "공중 항원",
            SymptomField::FoodAllergen => "식품 항원",
        }
    }

    /// Looks a field up by its label.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.label() == label)
    }
}

impl fmt::Display for SymptomField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Value of a set symptom field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymptomValue {
    /// "Y"
    Yes,
    /// "N"
    No,
    /// Free-text duration or frequency, e.g. "3개월 이상".
    Text(String),
}

impl SymptomValue {
    /// Coerces one JSON value.
    ///
    /// Only the exact strings "Y" and "N" are flags; any other text is kept
    /// verbatim and never counts as affirmative. Blanks, booleans, numbers
    /// and non-scalar shapes are unset.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => match s.as_str() {
                "Y" => Some(SymptomValue::Yes),
                "N" => Some(SymptomValue::No),
                other => Some(SymptomValue::Text(other.to_string())),
            },
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SymptomValue::Yes => "Y",
            SymptomValue::No => "N",
            SymptomValue::Text(s) => s,
        }
    }

    pub fn is_affirmative(&self) -> bool {
        matches!(self, SymptomValue::Yes)
    }
}

impl fmt::Display for SymptomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of everything extracted so far for one conversation.
///
/// Absent entries are unset. Serializes as a JSON object carrying every
/// field label, with `null` for unset fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedData {
    values: BTreeMap<SymptomField, SymptomValue>,
}

impl ExtractedData {
    /// All fields unset.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validates an analysis result against the field set.
    ///
    /// Returns `None` when the input is not a JSON object. Unknown keys are
    /// dropped and unusable values are treated as unset.
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let values = object
            .iter()
            .filter_map(|(key, raw)| {
                let field = SymptomField::from_label(key)?;
                let value = SymptomValue::from_json(raw)?;
                Some((field, value))
            })
            .collect();
        Some(Self { values })
    }

    pub fn get(&self, field: SymptomField) -> Option<&SymptomValue> {
        self.values.get(&field)
    }

    pub fn set(&mut self, field: SymptomField, value: SymptomValue) {
        self.values.insert(field, value);
    }

    /// Builder form of [`ExtractedData::set`].
    pub fn with(mut self, field: SymptomField, value: SymptomValue) -> Self {
        self.set(field, value);
        self
    }

    /// True when the field holds "Y".
    pub fn is_affirmative(&self, field: SymptomField) -> bool {
        self.get(field).is_some_and(SymptomValue::is_affirmative)
    }

    /// True when the field's text contains `needle`.
    pub fn contains(&self, field: SymptomField, needle: &str) -> bool {
        self.get(field).is_some_and(|v| v.as_str().contains(needle))
    }

    /// Set fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (SymptomField, &SymptomValue)> {
        self.values.iter().map(|(field, value)| (*field, value))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Folds a later analysis into this snapshot.
    ///
    /// Fields set in `update` overwrite; fields unset in `update` keep
    /// their current value. Nothing is ever cleared.
    pub fn merge_from(&mut self, update: &ExtractedData) {
        for (field, value) in update.iter() {
            self.values.insert(field, value.clone());
        }
    }

    /// Non-mutating form of [`ExtractedData::merge_from`].
    pub fn merged_with(&self, update: &ExtractedData) -> ExtractedData {
        let mut merged = self.clone();
        merged.merge_from(update);
        merged
    }

    /// JSON object with every field label, unset fields as null.
    pub fn to_json(&self) -> Value {
        let map = SymptomField::ALL
            .iter()
            .map(|field| {
                let value = self
                    .get(*field)
                    .map(|v| Value::String(v.as_str().to_string()))
                    .unwrap_or(Value::Null);
                (field.label().to_string(), value)
            })
            .collect::<serde_json::Map<_, _>>();
        Value::Object(map)
    }
}

impl Serialize for ExtractedData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(SymptomField::ALL.len()))?;
        for field in SymptomField::ALL {
            map.serialize_entry(field.label(), &self.get(field).map(SymptomValue::as_str))?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ExtractedData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        ExtractedData::from_json(&value)
            .ok_or_else(|| serde::de::Error::custom("extracted data must be a JSON object"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn labels_are_unique_and_reversible() {
        for field in SymptomField::ALL {
            assert_eq!(SymptomField::from_label(field.label()), Some(field));
        }
        assert_eq!(SymptomField::from_label("체중"), None);
    }

    #[test]
    fn from_json_rejects_non_objects() {
        assert!(ExtractedData::from_json(&Value::Null).is_none());
        assert!(ExtractedData::from_json(&json!("not an object")).is_none());
        assert!(ExtractedData::from_json(&json!(["Y"])).is_none());
    }

    #[test]
    fn from_json_coerces_values_and_drops_unknown_keys() {
        let data = ExtractedData::from_json(&json!({
            "쌕쌕거림": "Y",
            "발열": "N",
            "증상 지속": "3개월 이상",
            "야간": null,
            "가족력": 1,
            "호흡곤란": true,
            "체중": "20kg"
        }))
        .unwrap();

        assert_eq!(data.get(SymptomField::Wheeze), Some(&SymptomValue::Yes));
        assert_eq!(data.get(SymptomField::Fever), Some(&SymptomValue::No));
        assert_eq!(
            data.get(SymptomField::Duration),
            Some(&SymptomValue::Text("3개월 이상".to_string()))
        );
        assert_eq!(data.get(SymptomField::Nocturnal), None);
        assert_eq!(data.get(SymptomField::FamilyHistory), None);
        assert_eq!(data.get(SymptomField::Dyspnea), None);
        assert_eq!(data.iter().count(), 3);
    }

    #[test]
    fn only_exact_flags_are_flags() {
        let data = ExtractedData::from_json(&json!({
            "쌕쌕거림": " Y ",
            "발열": "y",
            "인후통": "   "
        }))
        .unwrap();

        assert_eq!(
            data.get(SymptomField::Wheeze),
            Some(&SymptomValue::Text(" Y ".to_string()))
        );
        assert!(!data.is_affirmative(SymptomField::Wheeze));
        assert!(!data.is_affirmative(SymptomField::Fever));
        assert_eq!(data.get(SymptomField::SoreThroat), None);
    }

    #[test]
    fn serializes_every_field_in_declaration_order() {
        let data = ExtractedData::empty().with(SymptomField::Fever, SymptomValue::Yes);
        let json = serde_json::to_string(&data).unwrap();

        assert!(json.starts_with("{\"기침\":null,\"쌕쌕거림\":null"));
        assert!(json.contains("\"발열\":\"Y\""));
        assert!(json.ends_with("\"식품 항원\":null}"));
    }

    #[test]
    fn serde_round_trip_preserves_values() {
        let data = ExtractedData::empty()
            .with(SymptomField::Cough, SymptomValue::Text("밤에 심함".to_string()))
            .with(SymptomField::FoodAllergen, SymptomValue::No);
        let json = serde_json::to_string(&data).unwrap();
        let back: ExtractedData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn merge_overwrites_only_set_fields() {
        let mut previous = ExtractedData::empty()
            .with(SymptomField::Wheeze, SymptomValue::Yes)
            .with(SymptomField::Fever, SymptomValue::No);
        let update = ExtractedData::from_json(&json!({
            "발열": "Y",
            "쌕쌕거림": null,
            "가족력": "Y"
        }))
        .unwrap();

        previous.merge_from(&update);

        assert_eq!(previous.get(SymptomField::Wheeze), Some(&SymptomValue::Yes));
        assert_eq!(previous.get(SymptomField::Fever), Some(&SymptomValue::Yes));
        assert_eq!(previous.get(SymptomField::FamilyHistory), Some(&SymptomValue::Yes));
    }

    fn arb_value() -> impl Strategy<Value = Option<SymptomValue>> {
        prop_oneof![
            Just(None),
            Just(Some(SymptomValue::Yes)),
            Just(Some(SymptomValue::No)),
            "[가-힣0-9 ]{1,8}".prop_map(|s| SymptomValue::from_json(&Value::String(s))),
        ]
    }

    fn arb_data() -> impl Strategy<Value = ExtractedData> {
        proptest::collection::vec(arb_value(), SymptomField::ALL.len()).prop_map(|values| {
            let mut data = ExtractedData::empty();
            for (field, value) in SymptomField::ALL.iter().zip(values) {
                if let Some(value) = value {
                    data.set(*field, value);
                }
            }
            data
        })
    }

    proptest! {
        #[test]
        fn merge_never_clears_a_field(previous in arb_data(), update in arb_data()) {
            let merged = previous.merged_with(&update);
            for field in SymptomField::ALL {
                match update.get(field) {
                    Some(value) => prop_assert_eq!(merged.get(field), Some(value)),
                    None => prop_assert_eq!(merged.get(field), previous.get(field)),
                }
            }
        }
    }
}
