//! Domain types for the packager.
//!
//! - ContentId: parsed identity of a content unit
//! - ManifestGraph: dependency nodes and their XML serialization

pub mod content_id;
pub mod manifest;

pub use content_id::{ContentId, ContentKind, ParseIdError, Role};
pub use manifest::{AssetRef, ManifestGraph, ManifestNode, ResourceType, EMPTY_MANIFEST};
