//! Post-build audio recode pass.
//!
//! Some glossary audio in the bank is stored with a mismatched extension
//! (ogg bytes in an `.m4a`, or the reverse). When the build flags any,
//! the finished package is unpacked, handed to an external encoder, and
//! packed again.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Unpack the package, run the encoder over the tree, and repack.
///
/// The scratch directory is the package path minus its `.zip` extension
/// and is removed on success.
pub async fn recode_package(package_path: &Path, encoder: &str) -> Result<()> {
    let scratch = scratch_dir(package_path)?;

    extract(package_path, &scratch)?;
    std::fs::remove_file(package_path)
        .with_context(|| format!("failed to remove {}", package_path.display()))?;

    run_encoder(encoder, &scratch).await?;

    repack(&scratch, package_path)?;
    std::fs::remove_dir_all(&scratch)
        .with_context(|| format!("failed to remove {}", scratch.display()))?;

    Ok(())
}

fn scratch_dir(package_path: &Path) -> Result<PathBuf> {
    match package_path.extension() {
        Some(ext) if ext.eq_ignore_ascii_case("zip") => {
            Ok(package_path.with_extension(""))
        }
        _ => bail!(
            "package path {} does not end in .zip",
            package_path.display()
        ),
    }
}

fn extract(package_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(package_path)
        .with_context(|| format!("failed to open {}", package_path.display()))?;
    let mut archive =
        ZipArchive::new(file).context("failed to read package for recoding")?;
    archive
        .extract(dest)
        .with_context(|| format!("failed to extract package to {}", dest.display()))?;
    Ok(())
}

async fn run_encoder(encoder: &str, dir: &Path) -> Result<()> {
    let output = Command::new(encoder)
        .arg(dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .with_context(|| format!("failed to spawn encoder '{}'", encoder))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "encoder '{}' exited with {}: {}",
            encoder,
            output.status,
            stderr.trim()
        );
    }

    tracing::info!(encoder, dir = %dir.display(), "audio recode complete");
    Ok(())
}

fn repack(dir: &Path, package_path: &Path) -> Result<()> {
    let file = File::create(package_path)
        .with_context(|| format!("failed to recreate {}", package_path.display()))?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut buf = Vec::new();
    add_dir(&mut writer, options, dir, dir, &mut buf)?;

    writer.finish().context("failed to finish repacked package")?;
    Ok(())
}

fn add_dir(
    writer: &mut ZipWriter<File>,
    options: FileOptions,
    root: &Path,
    dir: &Path,
    buf: &mut Vec<u8>,
) -> Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read {}", dir.display()))?
        .collect::<std::io::Result<_>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            add_dir(writer, options, root, &path, buf)?;
        } else {
            let relative = path
                .strip_prefix(root)
                .context("entry escaped the scratch directory")?;
            // Zip entry names always use forward slashes.
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            buf.clear();
            File::open(&path)
                .and_then(|mut f| f.read_to_end(buf))
                .with_context(|| format!("failed to read {}", path.display()))?;
            writer
                .start_file(name, options)
                .with_context(|| format!("failed to add {}", path.display()))?;
            writer.write_all(buf)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_dir_strips_zip_extension() {
        let dir = scratch_dir(Path::new("/tmp/pkg/out.zip")).unwrap();
        assert_eq!(dir, Path::new("/tmp/pkg/out"));
    }

    #[test]
    fn scratch_dir_rejects_other_extensions() {
        assert!(scratch_dir(Path::new("/tmp/out.tar")).is_err());
        assert!(scratch_dir(Path::new("/tmp/out")).is_err());
    }
}
