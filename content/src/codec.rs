//! Record codec: raw request fields in, validated records or patches out.
//!
//! Both JSON bodies and multipart text parts are flattened into a
//! [`FieldMap`] first, so validation is the same regardless of transport.

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::records::Resource;

/// Errors produced while decoding a create or update payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("request body must be an object")]
    NotAnObject,
    #[error("missing required field(s): {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("field `{0}` must not be blank")]
    Blank(&'static str),
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("field `{0}` must be a string")]
    NotAString(String),
}

/// Field name → string value, as received from a client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap(BTreeMap<String, String>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flatten a JSON object. `null` values are treated as absent; any other
    /// non-string value is rejected.
    pub fn from_json(value: Value) -> Result<Self, ValidationError> {
        let Value::Object(object) = value else {
            return Err(ValidationError::NotAnObject);
        };
        let mut fields = Self::new();
        for (key, value) in object {
            match value {
                Value::String(s) => fields.insert(key, s),
                Value::Null => {}
                _ => return Err(ValidationError::NotAString(key)),
            }
        }
        Ok(fields)
    }

    /// Value of a field that has already been validated as present, exactly
    /// as sent.
    pub(crate) fn text(&self, key: &str) -> String {
        self.get(key).map(str::to_string).unwrap_or_default()
    }

    /// Value of a field if present and not blank. Whitespace only decides
    /// blankness; a kept value is stored untouched.
    pub(crate) fn optional(&self, key: &str) -> Option<String> {
        self.get(key)
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Self::new();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}

/// Fresh opaque identifier for a new record.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Validate a create payload and build a record with a new identity.
///
/// `image_pending` is set when a binary upload accompanies the payload: the
/// `image` field then counts as supplied and is filled in by the caller once
/// the asset exists.
pub fn decode_create<R: Resource>(
    fields: &FieldMap,
    image_pending: bool,
) -> Result<R, ValidationError> {
    reject_unknown::<R>(fields)?;

    let missing: Vec<&'static str> = R::REQUIRED
        .iter()
        .copied()
        .filter(|name| !(image_pending && *name == "image"))
        .filter(|name| fields.get(name).map_or(true, |v| v.trim().is_empty()))
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::Missing(missing));
    }

    Ok(R::from_fields(new_id(), fields, Utc::now()))
}

/// Validate an update payload. Any subset of fields may be present, but a
/// required field cannot be blanked out.
pub fn decode_patch<R: Resource>(fields: &FieldMap) -> Result<R::Patch, ValidationError> {
    reject_unknown::<R>(fields)?;

    if let Some(name) = R::REQUIRED
        .iter()
        .copied()
        .find(|name| fields.get(name).is_some_and(|v| v.trim().is_empty()))
    {
        return Err(ValidationError::Blank(name));
    }

    Ok(R::patch_from_fields(fields))
}

fn reject_unknown<R: Resource>(fields: &FieldMap) -> Result<(), ValidationError> {
    match fields.keys().find(|key| !R::FIELDS.contains(key)) {
        Some(key) => Err(ValidationError::UnknownField(key.to_string())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Activity, Event, Photo, RecordPatch};
    use serde_json::json;

    #[test]
    fn create_names_every_missing_field() {
        let err = decode_create::<Event>(&FieldMap::new(), false).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Missing(vec![
                "title",
                "date",
                "time",
                "venue",
                "description",
                "displayOn"
            ])
        );
    }

    #[test]
    fn create_treats_blank_as_missing() {
        let fields: FieldMap = [
            ("title", "Karate"),
            ("description", "   "),
            ("displayOn", "activities"),
        ]
        .into_iter()
        .collect();
        let err = decode_create::<Activity>(&fields, false).unwrap_err();
        assert_eq!(err, ValidationError::Missing(vec!["description"]));
    }

    #[test]
    fn values_are_stored_as_sent() {
        let fields: FieldMap = [
            ("title", "  Karate "),
            ("description", "line one\n"),
            ("displayOn", "activities"),
        ]
        .into_iter()
        .collect();
        let activity = decode_create::<Activity>(&fields, false).unwrap();
        assert_eq!(activity.title, "  Karate ");
        assert_eq!(activity.description, "line one\n");

        let patch_fields: FieldMap = [("venue", " Hall B\n"), ("image", "   ")]
            .into_iter()
            .collect();
        let patch = decode_patch::<Event>(&patch_fields).unwrap();
        assert_eq!(patch.venue.as_deref(), Some(" Hall B\n"));
        // A blank optional field is absent, not an empty value.
        assert_eq!(patch.image, None);
    }

    #[test]
    fn create_assigns_fresh_ids() {
        let fields: FieldMap = [
            ("title", "Karate"),
            ("description", "Tuesday evenings"),
            ("displayOn", "activities"),
        ]
        .into_iter()
        .collect();
        let a = decode_create::<Activity>(&fields, false).unwrap();
        let b = decode_create::<Activity>(&fields, false).unwrap();
        assert_ne!(a.id, b.id);
        assert!(Uuid::parse_str(&a.id).is_ok());
        assert_eq!(a.title, "Karate");
        assert_eq!(a.image, None);
        assert!(a.created_at.is_some());
    }

    #[test]
    fn create_rejects_unknown_keys() {
        let fields: FieldMap = [("category", "youth"), ("image", "a.jpg"), ("id", "x")]
            .into_iter()
            .collect();
        let err = decode_create::<Photo>(&fields, false).unwrap_err();
        assert_eq!(err, ValidationError::UnknownField("id".to_string()));
    }

    #[test]
    fn pending_image_satisfies_required_image() {
        let fields: FieldMap = [("category", "youth")].into_iter().collect();
        assert_eq!(
            decode_create::<Photo>(&fields, false).unwrap_err(),
            ValidationError::Missing(vec!["image"])
        );
        let photo = decode_create::<Photo>(&fields, true).unwrap();
        assert_eq!(photo.category, "youth");
    }

    #[test]
    fn patch_accepts_subset() {
        let fields: FieldMap = [("displayOn", "both")].into_iter().collect();
        let patch = decode_patch::<Activity>(&fields).unwrap();
        assert_eq!(patch.display_on.as_deref(), Some("both"));
        assert_eq!(patch.title, None);
        assert!(!patch.is_empty());
    }

    #[test]
    fn patch_rejects_blank_required_field() {
        let fields: FieldMap = [("title", "")].into_iter().collect();
        assert_eq!(
            decode_patch::<Activity>(&fields).unwrap_err(),
            ValidationError::Blank("title")
        );
    }

    #[test]
    fn patch_rejects_unknown_keys() {
        let fields: FieldMap = [("createdAt", "2024-01-01")].into_iter().collect();
        assert_eq!(
            decode_patch::<Event>(&fields).unwrap_err(),
            ValidationError::UnknownField("createdAt".to_string())
        );
    }

    #[test]
    fn from_json_flattens_strings_and_skips_null() {
        let fields = FieldMap::from_json(json!({"title": "x", "image": null})).unwrap();
        assert_eq!(fields.get("title"), Some("x"));
        assert_eq!(fields.get("image"), None);
    }

    #[test]
    fn from_json_rejects_non_strings_and_non_objects() {
        assert_eq!(
            FieldMap::from_json(json!({"title": 3})).unwrap_err(),
            ValidationError::NotAString("title".to_string())
        );
        assert_eq!(
            FieldMap::from_json(json!(["title"])).unwrap_err(),
            ValidationError::NotAnObject
        );
    }

    #[test]
    fn missing_error_message_lists_fields() {
        let err = ValidationError::Missing(vec!["title", "venue"]);
        assert_eq!(err.to_string(), "missing required field(s): title, venue");
    }
}
