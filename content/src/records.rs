//! Record shapes per resource kind and their typed partial updates.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::codec::FieldMap;
use crate::kind::ResourceKind;

/// A storable record of one resource kind.
///
/// Each kind has a fixed field set (`FIELDS`, wire names) of which
/// `REQUIRED` must be present on create, and a matching optional-field
/// patch type used for updates.
pub trait Resource:
    Serialize + DeserializeOwned + Clone + fmt::Debug + PartialEq + Send + Sync + 'static
{
    type Patch: RecordPatch;

    const KIND: ResourceKind;
    const FIELDS: &'static [&'static str];
    const REQUIRED: &'static [&'static str];

    fn id(&self) -> &str;

    /// Build a record from fields the codec has already validated.
    fn from_fields(id: String, fields: &FieldMap, now: DateTime<Utc>) -> Self;

    fn patch_from_fields(fields: &FieldMap) -> Self::Patch;

    /// Merge a patch. Fields absent from the patch keep their stored value.
    fn apply(&mut self, patch: &Self::Patch);

    fn image(&self) -> Option<&str>;
    fn set_image(&mut self, filename: String);

    fn created_at(&self) -> Option<DateTime<Utc>>;
    fn updated_at(&self) -> Option<DateTime<Utc>>;

    /// Mark the record as modified at `now`.
    fn touch(&mut self, now: DateTime<Utc>);
}

/// Optional-field update for one resource kind.
pub trait RecordPatch: fmt::Debug + Clone + Default + PartialEq + Send + Sync + 'static {
    fn set_image(&mut self, filename: String);
    fn is_empty(&self) -> bool;
}

fn merge(slot: &mut String, value: &Option<String>) {
    if let Some(v) = value {
        slot.clone_from(v);
    }
}

fn merge_opt(slot: &mut Option<String>, value: &Option<String>) {
    if value.is_some() {
        slot.clone_from(value);
    }
}

// ── Activity ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub display_on: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub display_on: Option<String>,
}

impl RecordPatch for ActivityPatch {
    fn set_image(&mut self, filename: String) {
        self.image = Some(filename);
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Resource for Activity {
    type Patch = ActivityPatch;

    const KIND: ResourceKind = ResourceKind::Activities;
    const FIELDS: &'static [&'static str] = &["title", "description", "image", "displayOn"];
    const REQUIRED: &'static [&'static str] = &["title", "description", "displayOn"];

    fn id(&self) -> &str {
        &self.id
    }

    fn from_fields(id: String, fields: &FieldMap, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: fields.text("title"),
            description: fields.text("description"),
            image: fields.optional("image"),
            display_on: fields.text("displayOn"),
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    fn patch_from_fields(fields: &FieldMap) -> ActivityPatch {
        ActivityPatch {
            title: fields.optional("title"),
            description: fields.optional("description"),
            image: fields.optional("image"),
            display_on: fields.optional("displayOn"),
        }
    }

    fn apply(&mut self, patch: &ActivityPatch) {
        merge(&mut self.title, &patch.title);
        merge(&mut self.description, &patch.description);
        merge_opt(&mut self.image, &patch.image);
        merge(&mut self.display_on, &patch.display_on);
    }

    fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    fn set_image(&mut self, filename: String) {
        self.image = Some(filename);
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = Some(now);
    }
}

// ── Event ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    pub date: String,
    pub time: String,
    pub venue: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub display_on: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPatch {
    pub title: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub venue: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub display_on: Option<String>,
}

impl RecordPatch for EventPatch {
    fn set_image(&mut self, filename: String) {
        self.image = Some(filename);
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Resource for Event {
    type Patch = EventPatch;

    const KIND: ResourceKind = ResourceKind::Events;
    const FIELDS: &'static [&'static str] = &[
        "title",
        "date",
        "time",
        "venue",
        "description",
        "image",
        "displayOn",
    ];
    const REQUIRED: &'static [&'static str] =
        &["title", "date", "time", "venue", "description", "displayOn"];

    fn id(&self) -> &str {
        &self.id
    }

    fn from_fields(id: String, fields: &FieldMap, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: fields.text("title"),
            date: fields.text("date"),
            time: fields.text("time"),
            venue: fields.text("venue"),
            description: fields.text("description"),
            image: fields.optional("image"),
            display_on: fields.text("displayOn"),
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    fn patch_from_fields(fields: &FieldMap) -> EventPatch {
        EventPatch {
            title: fields.optional("title"),
            date: fields.optional("date"),
            time: fields.optional("time"),
            venue: fields.optional("venue"),
            description: fields.optional("description"),
            image: fields.optional("image"),
            display_on: fields.optional("displayOn"),
        }
    }

    fn apply(&mut self, patch: &EventPatch) {
        merge(&mut self.title, &patch.title);
        merge(&mut self.date, &patch.date);
        merge(&mut self.time, &patch.time);
        merge(&mut self.venue, &patch.venue);
        merge(&mut self.description, &patch.description);
        merge_opt(&mut self.image, &patch.image);
        merge(&mut self.display_on, &patch.display_on);
    }

    fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    fn set_image(&mut self, filename: String) {
        self.image = Some(filename);
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = Some(now);
    }
}

// ── Photo ──────────────────────────────────────────────────────────────

/// Gallery photo metadata. `image` is the stored asset filename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: String,
    pub image: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoPatch {
    pub image: Option<String>,
    pub category: Option<String>,
}

impl RecordPatch for PhotoPatch {
    fn set_image(&mut self, filename: String) {
        self.image = Some(filename);
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Resource for Photo {
    type Patch = PhotoPatch;

    const KIND: ResourceKind = ResourceKind::Photos;
    const FIELDS: &'static [&'static str] = &["image", "category"];
    const REQUIRED: &'static [&'static str] = &["image", "category"];

    fn id(&self) -> &str {
        &self.id
    }

    fn from_fields(id: String, fields: &FieldMap, now: DateTime<Utc>) -> Self {
        Self {
            id,
            image: fields.text("image"),
            category: fields.text("category"),
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    fn patch_from_fields(fields: &FieldMap) -> PhotoPatch {
        PhotoPatch {
            image: fields.optional("image"),
            category: fields.optional("category"),
        }
    }

    fn apply(&mut self, patch: &PhotoPatch) {
        merge(&mut self.image, &patch.image);
        merge(&mut self.category, &patch.category);
    }

    fn image(&self) -> Option<&str> {
        Some(self.image.as_str()).filter(|s| !s.is_empty())
    }

    fn set_image(&mut self, filename: String) {
        self.image = filename;
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_create, decode_patch};
    use serde_json::json;

    fn karate() -> Activity {
        let fields: FieldMap = [
            ("title", "Karate"),
            ("description", "Tuesday evenings in the hall"),
            ("image", "karate.jpg"),
            ("displayOn", "activities"),
        ]
        .into_iter()
        .collect();
        decode_create(&fields, false).unwrap()
    }

    #[test]
    fn apply_preserves_omitted_fields() {
        let mut activity = karate();
        let before = activity.clone();
        let patch = decode_patch::<Activity>(&[("displayOn", "both")].into_iter().collect())
            .unwrap();
        activity.apply(&patch);

        assert_eq!(activity.display_on, "both");
        assert_eq!(activity.title, before.title);
        assert_eq!(activity.description, before.description);
        assert_eq!(activity.image, before.image);
        assert_eq!(activity.id, before.id);
    }

    #[test]
    fn empty_patch_is_a_no_op() {
        let mut event: Event = decode_create(
            &[
                ("title", "Open day"),
                ("date", "2024-06-01"),
                ("time", "10:00"),
                ("venue", "Community hall"),
                ("description", "Come and meet us"),
                ("displayOn", "home"),
            ]
            .into_iter()
            .collect(),
            false,
        )
        .unwrap();
        let before = event.clone();
        let patch = EventPatch::default();
        assert!(patch.is_empty());
        event.apply(&patch);
        assert_eq!(event, before);
    }

    #[test]
    fn patch_image_replaces_image() {
        let mut activity = karate();
        let mut patch = ActivityPatch::default();
        patch.set_image("new.jpg".to_string());
        activity.apply(&patch);
        assert_eq!(activity.image(), Some("new.jpg"));
    }

    #[test]
    fn serializes_with_camel_case_names() {
        let activity = karate();
        let value = serde_json::to_value(&activity).unwrap();
        assert_eq!(value["displayOn"], json!("activities"));
        assert!(value.get("createdAt").is_some());
        assert!(value.get("display_on").is_none());
    }

    #[test]
    fn deserializes_legacy_records_without_timestamps() {
        let photo: Photo = serde_json::from_value(json!({
            "id": "p1",
            "image": "1700000000000-hall.jpg",
            "category": "events"
        }))
        .unwrap();
        assert_eq!(photo.created_at, None);
        assert_eq!(photo.image(), Some("1700000000000-hall.jpg"));
    }

    #[test]
    fn photo_without_image_reports_none() {
        let photo: Photo = decode_create(&[("category", "youth")].into_iter().collect(), true)
            .unwrap();
        assert_eq!(photo.image(), None);
    }

    #[test]
    fn touch_only_moves_updated_at() {
        let mut activity = karate();
        let created = activity.created_at;
        let later = created.unwrap() + chrono::Duration::seconds(5);
        activity.touch(later);
        assert_eq!(activity.created_at, created);
        assert_eq!(activity.updated_at, Some(later));
    }
}
