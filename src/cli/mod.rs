//! Command-line interface for itempack.
//!
//! One command: read a seed id file, pull the transitive content set
//! from the item bank, and write the package zip plus a CSV progress
//! log.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use crate::adapters::recode::recode_package;
use crate::adapters::{GitLabBank, PostgresRegistry, ZipSink};
use crate::config::Config;
use crate::core::{PackageBuilder, PackageOptions};
use crate::ingest::read_ids;
use crate::progress::{format_elapsed, ProgressLog, Severity};

const DEFAULT_ITEM_BANK: &str = "https://itembank.smarterbalanced.org";
const DEFAULT_NAMESPACE: &str = "itemreviewapp";
const DEFAULT_BANK_KEY: u32 = 200;

/// itempack - test content package builder
#[derive(Parser, Debug)]
#[command(name = "itempack")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// File containing the item ids to include (flat list or CSV)
    #[arg(long)]
    pub ids: PathBuf,

    /// Item bank access token
    #[arg(long, env = "ITEMPACK_TOKEN")]
    pub token: String,

    /// Output package file (.zip)
    #[arg(long, short)]
    pub output: PathBuf,

    /// Progress log file (defaults to the output name with .log.csv)
    #[arg(long)]
    pub log: Option<PathBuf>,

    /// Item bank URL
    #[arg(long, default_value = DEFAULT_ITEM_BANK)]
    pub bank_url: String,

    /// Item bank namespace (username or group) holding the content
    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Default bank key for bare numeric ids
    #[arg(long, default_value_t = DEFAULT_BANK_KEY)]
    pub bank_key: u32,

    /// Do not automatically include referenced tutorials
    #[arg(long)]
    pub no_tutorials: bool,

    /// Include each item's import.zip file
    #[arg(long)]
    pub include_import_zip: bool,

    /// Rename off-pattern word-list audio files to the canonical form
    #[arg(long)]
    pub rename_glossary_audio: bool,

    /// Write an empty manifest stub instead of the full manifest
    #[arg(long)]
    pub no_manifest: bool,

    /// Only download assets with this file extension
    #[arg(long)]
    pub file_type: Option<String>,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = Config::load()?;

        let log_path = match self.log {
            Some(ref path) => path.clone(),
            None => default_log_path(&self.output),
        };

        tracing::info!("ID File (input): {}", self.ids.display());
        tracing::info!("Package File (output): {}", self.output.display());
        tracing::info!("Log File (output): {}", log_path.display());
        tracing::info!("Item Bank URL: {}", self.bank_url);
        tracing::info!("Namespace: {}", self.namespace);
        tracing::info!("Default Bank Key: {}", self.bank_key);
        tracing::info!(
            "Auto Include Tutorials: {}",
            if self.no_tutorials { "No" } else { "Yes" }
        );
        tracing::info!(
            "Include import.zip: {}",
            if self.include_import_zip { "Yes" } else { "No" }
        );
        tracing::info!(
            "Include WIT audio file renaming: {}",
            if self.rename_glossary_audio { "Yes" } else { "No" }
        );
        tracing::info!(
            "Auto Include full Manifest: {}",
            if self.no_manifest { "No" } else { "Yes" }
        );
        tracing::info!(
            "Download files of type: {}",
            self.file_type.as_deref().unwrap_or("NA")
        );

        let mut log = ProgressLog::create(&log_path)?;

        let ids = read_ids(&self.ids, self.bank_key, &mut log)?;

        let bank = GitLabBank::new(self.bank_url.clone(), self.token.clone());
        let registry = PostgresRegistry::new(config.registry_connection()?);
        let sink = ZipSink::create(&self.output)?;

        let options = PackageOptions {
            namespace: self.namespace.clone(),
            include_tutorials: !self.no_tutorials,
            include_import_zip: self.include_import_zip,
            rename_glossary_audio: self.rename_glossary_audio,
            include_manifest: !self.no_manifest,
            file_type_filter: self.file_type.clone(),
        };

        let mut builder = PackageBuilder::new(bank, registry, sink, options);
        let seeded = builder.add_ids(ids);
        tracing::info!("Loaded {} distinct ids from the id file.", seeded);

        let summary = builder.produce(&mut log).await?;

        let elapsed = format_elapsed(summary.elapsed_ms);
        log.log(Severity::Message, "", "Elapsed time", &elapsed);
        log.log(Severity::Message, "", "Items", &summary.items.to_string());
        log.log(
            Severity::Message,
            "",
            "WordLists",
            &summary.word_lists.to_string(),
        );
        log.log(
            Severity::Message,
            "",
            "Stimuli",
            &summary.stimuli.to_string(),
        );
        log.log(
            Severity::Message,
            "",
            "Tutorials",
            &summary.tutorials.to_string(),
        );
        let errors = log.error_count();
        log.log(Severity::Message, "", "Errors", &errors.to_string());
        log.flush()?;

        tracing::info!("Package Build Complete.");
        tracing::info!("Elapsed:   {}", elapsed);
        tracing::info!("Items:     {}", summary.items);
        tracing::info!("WordLists: {}", summary.word_lists);
        tracing::info!("Stimuli:   {}", summary.stimuli);
        tracing::info!("Tutorials: {}", summary.tutorials);
        tracing::info!("Errors:    {}", summary.errors);

        if summary.recode_needed {
            tracing::info!(
                "Audio files have been found that need to be recoded. Starting the recode process."
            );
            let encoder = config.encoder_path()?.to_string();
            recode_package(&self.output, &encoder)
                .await
                .context("audio recode pass failed")?;
            tracing::info!("Audio file recode process complete.");
        }

        Ok(())
    }
}

/// `out.zip` logs to `out.log.csv` next to it.
fn default_log_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "package".to_string());
    output.with_file_name(format!("{}.log.csv", stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_path_defaults_next_to_output() {
        assert_eq!(
            default_log_path(Path::new("/tmp/pkg/out.zip")),
            PathBuf::from("/tmp/pkg/out.log.csv")
        );
        assert_eq!(
            default_log_path(Path::new("out.zip")),
            PathBuf::from("out.log.csv")
        );
    }
}
