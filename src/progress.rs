//! CSV progress log.
//!
//! Every run writes a row-per-event log next to the package so content
//! staff can audit which files were admitted, skipped, or renamed. The
//! log is an explicit instance handed to the packager and classifier at
//! construction, not ambient state.

use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

/// Severity taxonomy carried in the first CSV column.
///
/// Degraded and Severe rows count toward the run's error total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Message,
    Benign,
    Tolerable,
    Degraded,
    Severe,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Message => "Message",
            Severity::Benign => "Benign",
            Severity::Tolerable => "Tolerable",
            Severity::Degraded => "Degraded",
            Severity::Severe => "Severe",
        };
        write!(f, "{}", s)
    }
}

/// Writer for the `Severity,ItemId,Message,Detail` log.
pub struct ProgressLog {
    writer: csv::Writer<Box<dyn Write + Send>>,
    messages: usize,
    errors: usize,
}

impl ProgressLog {
    /// Create the log file, truncating any previous run's log.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create progress log {}", path.display()))?;
        Self::from_writer(Box::new(file))
    }

    /// Log to an arbitrary writer. Used by tests.
    pub fn from_writer(writer: Box<dyn Write + Send>) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(false)
            .from_writer(writer);
        writer
            .write_record(["Severity", "ItemId", "Message", "Detail"])
            .context("failed to write progress log header")?;
        Ok(Self {
            writer,
            messages: 0,
            errors: 0,
        })
    }

    /// Append one row. I/O failures surface as tracing warnings rather
    /// than aborting the run.
    pub fn log(&mut self, severity: Severity, id: &str, message: &str, detail: &str) {
        self.messages += 1;
        if severity >= Severity::Degraded {
            self.errors += 1;
        }
        let row = [&severity.to_string(), id, message, detail];
        if let Err(e) = self.writer.write_record(row) {
            tracing::warn!(error = %e, "failed to write progress log row");
        }
    }

    /// Rows written so far, all severities.
    pub fn message_count(&self) -> usize {
        self.messages
    }

    /// Degraded and Severe rows written so far.
    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("failed to flush progress log")
    }
}

/// Format elapsed milliseconds as `h:mm:ss.t`, omitting leading zero
/// components the way the console summary always has.
pub fn format_elapsed(ms: u64) -> String {
    let hours = ms / (60 * 60 * 1000);
    let minutes = (ms / (60 * 1000)) % 60;
    let seconds = (ms / 1000) % 60;
    let tenths = (ms / 100) % 10;

    let mut out = String::new();
    let mut leading = false;
    if hours > 0 {
        out.push_str(&format!("{}:", hours));
        leading = true;
    }
    if minutes > 0 || leading {
        if leading {
            out.push_str(&format!("{:02}:", minutes));
        } else {
            out.push_str(&format!("{}:", minutes));
        }
        leading = true;
    }
    if leading {
        out.push_str(&format!("{:02}", seconds));
    } else {
        out.push_str(&format!("{}", seconds));
    }
    out.push_str(&format!(".{}", tenths));
    out
}
