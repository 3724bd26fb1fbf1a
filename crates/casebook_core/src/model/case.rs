//! Case domain model.
//!
//! # Responsibility
//! - Define the writable input record (`CaseInput`) accepted by case saves.
//! - Define read models (`CaseRecord`, `CountedCase`) exposed to callers.
//!
//! # Invariants
//! - `responsible_user`/`notified_user` distinguish "absent" (`None`) from
//!   "explicitly empty" (`Some(vec![])`); only absence triggers defaulting.
//!   An explicit `null` is a field error, never a default.
//! - JSON input is type-checked field by field; every failing field lands
//!   under its own key in one `ValidationErrors` map.
//! - `note_count`/`letter_count` exist only on `CountedCase` and are always
//!   computed at read time.

use crate::model::feature::OptionId;
use crate::model::validation::ValidationErrors;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Stable identifier of a Case.
pub type CaseId = Uuid;
/// Primary key of a user row.
pub type UserId = i64;
/// Primary key of an audited institution row.
pub type InstitutionId = i64;

/// Field name used for the case name in input and error maps.
pub const FIELD_NAME: &str = "name";
/// Field name used for the free-text comment.
pub const FIELD_COMMENT: &str = "comment";
/// Field name used for audited institutions.
pub const FIELD_AUDITED_INSTITUTION: &str = "audited_institution";
/// Field name used for tag names.
pub const FIELD_TAG: &str = "tag";
/// Field name used for responsible users.
pub const FIELD_RESPONSIBLE_USER: &str = "responsible_user";
/// Field name used for notified users.
pub const FIELD_NOTIFIED_USER: &str = "notified_user";
/// Field name used for feature options.
pub const FIELD_FEATURE_OPTIONS: &str = "featureoptions";
/// Error-map key for problems with the record as a whole.
pub const FIELD_NON_FIELD: &str = "non_field_errors";

/// Maximum length of a case name, in characters.
pub const CASE_NAME_MAX_CHARS: usize = 256;

const MSG_REQUIRED: &str = "this field is required";
const MSG_NULL: &str = "this field may not be null";

/// Raw case record as submitted by a caller.
///
/// Deserialization goes through [`CaseInput::from_json`], so unknown keys are
/// ignored and explicit `null` user lists are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaseInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub audited_institution: Vec<InstitutionId>,
    pub tag: Vec<String>,
    /// `None` defaults to the acting principal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responsible_user: Option<Vec<UserId>>,
    /// `None` defaults to the acting principal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notified_user: Option<Vec<UserId>>,
    pub featureoptions: Vec<OptionId>,
}

impl CaseInput {
    /// Creates an input with only a name; every relation is empty and both
    /// user lists are left to their defaults.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Type-checks a JSON case record.
    ///
    /// Missing `name`, `null` where a value is required, non-list relation
    /// fields and wrongly typed list items are all reported under the key of
    /// the offending field. Content rules (blank names, unknown ids, quota)
    /// are left to the case service.
    pub fn from_json(value: &Value) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let Some(record) = value.as_object() else {
            errors.add(
                FIELD_NON_FIELD,
                format!("invalid data, expected an object but got {}", json_kind(value)),
            );
            return Err(errors);
        };

        let name = match record.get(FIELD_NAME) {
            Some(value) => string_field(&mut errors, FIELD_NAME, value),
            None => {
                errors.add(FIELD_NAME, MSG_REQUIRED);
                None
            }
        };
        let comment = record
            .get(FIELD_COMMENT)
            .and_then(|value| string_field(&mut errors, FIELD_COMMENT, value));
        let audited_institution =
            pk_list(&mut errors, record, FIELD_AUDITED_INSTITUTION).unwrap_or_default();
        let tag = record
            .get(FIELD_TAG)
            .and_then(|value| list_field(&mut errors, FIELD_TAG, value, "string", tag_item))
            .unwrap_or_default();
        let responsible_user = pk_list(&mut errors, record, FIELD_RESPONSIBLE_USER);
        let notified_user = pk_list(&mut errors, record, FIELD_NOTIFIED_USER);
        let featureoptions =
            pk_list(&mut errors, record, FIELD_FEATURE_OPTIONS).unwrap_or_default();

        errors.into_result()?;
        Ok(Self {
            name: name.unwrap_or_default(),
            comment,
            audited_institution,
            tag,
            responsible_user,
            notified_user,
            featureoptions,
        })
    }
}

impl<'de> Deserialize<'de> for CaseInput {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(serde::de::Error::custom)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn string_field(errors: &mut ValidationErrors, field: &str, value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Null => {
            errors.add(field, MSG_NULL);
            None
        }
        other => {
            errors.add(field, format!("not a valid string, got {}", json_kind(other)));
            None
        }
    }
}

/// Reads an optional list of primary keys; `None` when absent or invalid.
fn pk_list(
    errors: &mut ValidationErrors,
    record: &Map<String, Value>,
    field: &str,
) -> Option<Vec<i64>> {
    let value = record.get(field)?;
    list_field(errors, field, value, "pk value", Value::as_i64)
}

fn tag_item(value: &Value) -> Option<String> {
    value.as_str().map(str::to_owned)
}

fn list_field<T>(
    errors: &mut ValidationErrors,
    field: &str,
    value: &Value,
    expected: &str,
    item: impl Fn(&Value) -> Option<T>,
) -> Option<Vec<T>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Null => {
            errors.add(field, MSG_NULL);
            return None;
        }
        other => {
            errors.add(
                field,
                format!("expected a list of items but got {}", json_kind(other)),
            );
            return None;
        }
    };

    let mut parsed = Vec::with_capacity(items.len());
    let mut valid = true;
    for raw in items {
        match item(raw) {
            Some(value) => parsed.push(value),
            None => {
                valid = false;
                errors.add(
                    field,
                    format!("incorrect type, expected {expected} but got {}", json_kind(raw)),
                );
            }
        }
    }
    valid.then_some(parsed)
}

/// Validated, defaulted case payload ready for persistence.
///
/// Produced by the case service; repositories trust its contents apart from
/// foreign-key existence, which the store enforces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseDraft {
    pub name: String,
    pub comment: String,
    pub audited_institution: Vec<InstitutionId>,
    /// Normalized, deduplicated, in first-occurrence order.
    pub tags: Vec<String>,
    pub responsible_user: Vec<UserId>,
    pub notified_user: Vec<UserId>,
    pub featureoptions: Vec<OptionId>,
    /// Acting principal recorded as creator/modifier.
    pub actor: UserId,
}

/// Persisted case with all relations resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: CaseId,
    pub name: String,
    pub comment: String,
    /// Sorted ascending.
    pub audited_institution: Vec<InstitutionId>,
    /// Tag names in the order they were submitted.
    pub tag: Vec<String>,
    /// Sorted ascending.
    pub responsible_user: Vec<UserId>,
    /// Sorted ascending.
    pub notified_user: Vec<UserId>,
    /// Sorted ascending.
    pub featureoptions: Vec<OptionId>,
    pub created_by: UserId,
    pub modified_by: UserId,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

/// Case read model extended with counters aggregated at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountedCase {
    #[serde(flatten)]
    pub case: CaseRecord,
    pub note_count: u64,
    pub letter_count: u64,
}

#[cfg(test)]
mod tests {
    use super::CaseInput;
    use serde_json::json;

    #[test]
    fn from_json_reports_missing_name_under_its_key() {
        let errors = CaseInput::from_json(&json!({ "comment": "x" })).unwrap_err();
        assert_eq!(errors.fields().collect::<Vec<_>>(), ["name"]);
        assert_eq!(errors.get("name"), Some(&["this field is required".to_string()][..]));
    }

    #[test]
    fn from_json_collects_type_errors_per_field() {
        let errors = CaseInput::from_json(&json!({
            "name": 7,
            "tag": "t",
            "featureoptions": ["a"],
            "audited_institution": [1, 2.5],
        }))
        .unwrap_err();

        assert_eq!(
            errors.fields().collect::<Vec<_>>(),
            ["audited_institution", "featureoptions", "name", "tag"]
        );
        assert_eq!(
            errors.get("featureoptions"),
            Some(&["incorrect type, expected pk value but got string".to_string()][..])
        );
        assert_eq!(
            errors.get("tag"),
            Some(&["expected a list of items but got string".to_string()][..])
        );
    }

    #[test]
    fn from_json_rejects_null_user_lists() {
        let errors = CaseInput::from_json(&json!({
            "name": "x",
            "responsible_user": null,
            "notified_user": null,
        }))
        .unwrap_err();
        assert_eq!(
            errors.get("responsible_user"),
            Some(&["this field may not be null".to_string()][..])
        );
        assert_eq!(
            errors.get("notified_user"),
            Some(&["this field may not be null".to_string()][..])
        );
    }

    #[test]
    fn from_json_keeps_absent_and_empty_user_lists_apart() {
        let input = CaseInput::from_json(&json!({
            "name": "x",
            "notified_user": [],
            "unknown_key": true,
        }))
        .unwrap();
        assert_eq!(input.responsible_user, None);
        assert_eq!(input.notified_user, Some(vec![]));
        assert!(input.tag.is_empty());
    }

    #[test]
    fn from_json_rejects_non_object_input() {
        let errors = CaseInput::from_json(&json!(["x"])).unwrap_err();
        assert_eq!(errors.fields().collect::<Vec<_>>(), ["non_field_errors"]);
    }

    #[test]
    fn deserialize_goes_through_field_checks() {
        let err = serde_json::from_value::<CaseInput>(json!({ "name": "x", "notified_user": null }))
            .unwrap_err();
        assert!(err.to_string().contains("notified_user: this field may not be null"));

        let input = CaseInput::named("x");
        let reparsed: CaseInput =
            serde_json::from_value(serde_json::to_value(&input).unwrap()).unwrap();
        assert_eq!(reparsed, input);
    }
}
