//! Seed id file reader.
//!
//! The input is either a flat list (one bare number or triplet per
//! line) or a CSV file whose header names an `ItemId` column and
//! optionally a `BankKey` column. Bad rows are logged as degraded and
//! skipped; an empty or unrecognizable file is an error.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::domain::{ContentId, ContentKind};
use crate::progress::{ProgressLog, Severity};

pub fn read_ids(
    path: &Path,
    default_bank_key: u32,
    log: &mut ProgressLog,
) -> Result<Vec<ContentId>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open id file {}", path.display()))?;
    read_ids_from(file, default_bank_key, log)
}

pub fn read_ids_from(
    reader: impl Read,
    default_bank_key: u32,
    log: &mut ProgressLog,
) -> Result<Vec<ContentId>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records = csv_reader.records();
    let first = match records.next() {
        Some(record) => record.context("failed to read id file")?,
        None => bail!("Empty item ID input file."),
    };

    // The first line is either column headings or already an id.
    let mut id_column: Option<usize> = None;
    let mut bank_key_column: Option<usize> = None;
    for (i, field) in first.iter().enumerate() {
        if field.eq_ignore_ascii_case("ItemId") {
            id_column = Some(i);
        } else if field.eq_ignore_ascii_case("BankKey") {
            bank_key_column = Some(i);
        }
    }

    let mut ids = Vec::new();
    let id_column = match id_column {
        Some(col) => col,
        None => {
            let field = first.get(0).unwrap_or("");
            match ContentId::parse(field, default_bank_key) {
                Ok(id) => {
                    ids.push(id);
                    0
                }
                Err(_) => bail!("Item ID input file in unexpected format."),
            }
        }
    };
    let min_columns = id_column.max(bank_key_column.unwrap_or(0)) + 1;

    for record in records {
        let record = record.context("failed to read id file")?;
        if record.len() < min_columns {
            log.log(
                Severity::Degraded,
                "",
                "Too few columns in item ID input file row.",
                &format!(
                    "minColumns={} line='{}'",
                    min_columns,
                    record.iter().collect::<Vec<_>>().join(",")
                ),
            );
            continue;
        }

        let id_field = record.get(id_column).unwrap_or("");

        let mut bank_key = default_bank_key;
        if let Some(col) = bank_key_column {
            let raw = record.get(col).unwrap_or("");
            if !raw.is_empty() {
                match raw.trim().parse() {
                    Ok(parsed) => bank_key = parsed,
                    Err(_) => {
                        log.log(
                            Severity::Degraded,
                            id_field,
                            "Invalid bankKey value in item ID input file row.",
                            &format!("bankKey='{}'", raw),
                        );
                        continue;
                    }
                }
            }
        }

        match ContentId::parse(id_field, bank_key) {
            Ok(id) => ids.push(id),
            Err(_) => {
                log.log(
                    Severity::Degraded,
                    id_field,
                    "Invalid item ID in item ID input file row.",
                    &format!("itemId='{}'", id_field),
                );
            }
        }
    }

    // Seeds resolve as regular items; their real kind is discovered
    // from the content document when they are processed.
    for id in &mut ids {
        id.kind = ContentKind::Item;
    }

    Ok(ids)
}
