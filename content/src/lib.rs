//! Domain types for the community content store.
//!
//! Everything in this crate is pure: record shapes per resource kind, the
//! codec that turns raw request fields into validated records or patches,
//! and identity generation. Storage and transport live in `content-server`.

pub mod codec;
pub mod kind;
pub mod records;

pub use codec::{decode_create, decode_patch, new_id, FieldMap, ValidationError};
pub use kind::{ParseKindError, ResourceKind};
pub use records::{
    Activity, ActivityPatch, Event, EventPatch, Photo, PhotoPatch, RecordPatch, Resource,
};
