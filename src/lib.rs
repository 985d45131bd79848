//! itempack - test content package builder
//!
//! Assembles a distributable content package (a zip archive plus an IMS
//! style XML manifest) from a remote item bank, starting from a seed
//! list of item ids and transitively pulling in every stimulus, word
//! list, and tutorial the seeds depend on.
//!
//! # Modules
//!
//! - `adapters`: external collaborators (item bank, attachment
//!   registry, archive sink, recode pass)
//! - `core`: the work queue, classifier, content document scanner, and
//!   package assembly engine
//! - `domain`: content ids and the manifest graph
//! - `ingest`: seed id file reading
//! - `cli`: command-line interface
//!
//! # Usage
//!
//! ```bash
//! itempack --ids ids.csv --token <token> -o package.zip
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;
pub mod progress;

pub use crate::core::{PackageBuilder, PackageOptions, PackageSummary, WorkQueue};
pub use crate::domain::{ContentId, ContentKind, ManifestGraph, Role};
pub use crate::progress::{ProgressLog, Severity};
