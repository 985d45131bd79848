//! Collaborator interfaces for the packager.
//!
//! The item bank, the attachment registry, and the archive container are
//! external systems; the core talks to them through these traits so the
//! engine can run against in-memory fakes in tests.

pub mod archive;
pub mod gitlab;
pub mod recode;
pub mod registry;

use async_trait::async_trait;
use thiserror::Error;

pub use archive::{MemorySink, ZipSink};
pub use gitlab::GitLabBank;
pub use registry::PostgresRegistry;

/// One file in an item's repository listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Path of the file within the repository (no leading slash).
    pub path: String,
    /// Opaque blob reference used to read the file's bytes.
    pub blob_id: String,
}

impl TreeEntry {
    pub fn new(path: impl Into<String>, blob_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            blob_id: blob_id.into(),
        }
    }
}

/// Errors from the item bank. `NotFound` is distinguished so the
/// packager can log a missing item and move on.
#[derive(Debug, Error)]
pub enum ItemBankError {
    #[error("not found in item bank: {0}")]
    NotFound(String),

    #[error("item bank request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("item bank protocol error: {0}")]
    Protocol(String),
}

/// Remote content repository holding one project per content unit.
#[async_trait]
pub trait ItemBank: Send + Sync {
    /// Resolve a namespace + project name to the internal project id.
    async fn project_id(&self, namespace: &str, name: &str) -> Result<String, ItemBankError>;

    /// List every file in the project, in repository order.
    async fn list_tree(&self, project_id: &str) -> Result<Vec<TreeEntry>, ItemBankError>;

    /// Read a file's bytes by blob reference.
    async fn read_blob(&self, project_id: &str, blob_id: &str) -> Result<Vec<u8>, ItemBankError>;
}

/// A registered attachment row for an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    /// Declared kind: `cc`, `asl`, `braille`, or empty.
    pub file_type: String,
}

/// Relational registry of known item attachments.
#[async_trait]
pub trait AttachmentRegistry: Send + Sync {
    async fn attachments(&self, item_id: u32) -> anyhow::Result<Vec<Attachment>>;
}

/// Destination container for packaged files.
pub trait ArchiveSink: Send {
    fn add_file(&mut self, path: &str, bytes: &[u8]) -> anyhow::Result<()>;

    /// Flush and close the container. Must be called exactly once.
    fn finish(&mut self) -> anyhow::Result<()>;
}
