//! Archive container implementations.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::ArchiveSink;

/// Zip file sink used for real package builds.
pub struct ZipSink {
    writer: Option<ZipWriter<File>>,
}

impl ZipSink {
    /// Create the package file, truncating any existing archive.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create package file {}", path.display()))?;
        Ok(Self {
            writer: Some(ZipWriter::new(file)),
        })
    }

    fn options() -> FileOptions {
        FileOptions::default().compression_method(CompressionMethod::Deflated)
    }
}

impl ArchiveSink for ZipSink {
    fn add_file(&mut self, path: &str, bytes: &[u8]) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .context("archive already finished")?;
        writer
            .start_file(path, Self::options())
            .with_context(|| format!("failed to start archive entry {}", path))?;
        writer
            .write_all(bytes)
            .with_context(|| format!("failed to write archive entry {}", path))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.finish().context("failed to finish package archive")?;
        }
        Ok(())
    }
}

/// In-memory sink recording entries in insertion order. Used by tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub entries: Vec<(String, Vec<u8>)>,
    pub finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> Vec<&str> {
        self.entries.iter().map(|(p, _)| p.as_str()).collect()
    }

    pub fn bytes_of(&self, path: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, b)| b.as_slice())
    }
}

impl ArchiveSink for MemorySink {
    fn add_file(&mut self, path: &str, bytes: &[u8]) -> Result<()> {
        self.entries.push((path.to_string(), bytes.to_vec()));
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn zip_sink_writes_a_readable_archive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.zip");

        let mut sink = ZipSink::create(&path).unwrap();
        sink.add_file("Items/Item-200-1/item-200-1.xml", b"<itemrelease/>")
            .unwrap();
        sink.finish().unwrap();
        // A second finish is a no-op, not an error.
        sink.finish().unwrap();
        assert!(sink.add_file("late.txt", b"x").is_err());

        let file = File::open(&path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        assert_eq!(archive.len(), 1);
        let mut entry = archive.by_index(0).unwrap();
        assert_eq!(entry.name(), "Items/Item-200-1/item-200-1.xml");
        let mut contents = String::new();
        std::io::Read::read_to_string(&mut entry, &mut contents).unwrap();
        assert_eq!(contents, "<itemrelease/>");
    }

    #[test]
    fn memory_sink_records_in_order() {
        let mut sink = MemorySink::new();
        sink.add_file("a/b.xml", b"one").unwrap();
        sink.add_file("a/c.png", b"two").unwrap();
        sink.finish().unwrap();

        assert_eq!(sink.paths(), vec!["a/b.xml", "a/c.png"]);
        assert_eq!(sink.bytes_of("a/c.png").unwrap(), b"two");
        assert!(sink.finished);
    }
}
