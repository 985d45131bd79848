//! Dependency resolution and package assembly.

pub mod classifier;
pub mod content_doc;
pub mod packager;
pub mod queue;
pub mod rename;

pub use classifier::{AdmitReason, ClassificationResult, Classifier};
pub use content_doc::{ContentDoc, DocRoot};
pub use packager::{PackageBuilder, PackageOptions, PackageSummary, MANIFEST_NAME};
pub use queue::{IdentityMode, WorkQueue};
pub use rename::{normalize_glossary_audio, RenameRecord};
