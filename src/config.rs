//! Configuration for the attachment registry and the audio encoder.
//!
//! Sources (highest priority first):
//! 1. Environment variables (ITEMPACK_REGISTRY_URL, ITEMPACK_ENCODER)
//! 2. Config file (.itempack/config.yaml)
//! 3. Unset; a run that needs the missing setting fails with a message
//!    naming both ways to provide it
//!
//! Config file discovery searches the current directory and its parents
//! for .itempack/config.yaml, so a checkout can carry its own settings.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Raw config file schema (matches YAML structure).
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub registry: Option<RegistryConfig>,
    #[serde(default)]
    pub encoder: Option<EncoderConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryConfig {
    /// Postgres connection string for the item authoring database.
    pub connection_string: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EncoderConfig {
    /// Path to the external audio re-encoder binary.
    pub path: Option<String>,
}

/// Resolved configuration after file and environment merging.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub registry_connection: Option<String>,
    pub encoder_path: Option<String>,
    /// Path to the config file, if one was found.
    pub config_file: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file = find_config_file();

        let mut config = match config_file {
            Some(ref path) => {
                let file = load_config_file(path)?;
                Self {
                    registry_connection: file.registry.and_then(|r| r.connection_string),
                    encoder_path: file.encoder.and_then(|e| e.path),
                    config_file: config_file.clone(),
                }
            }
            None => Self::default(),
        };

        if let Ok(conn) = std::env::var("ITEMPACK_REGISTRY_URL") {
            config.registry_connection = Some(conn);
        }
        if let Ok(encoder) = std::env::var("ITEMPACK_ENCODER") {
            config.encoder_path = Some(encoder);
        }

        Ok(config)
    }

    /// Connection string for the attachment registry, or an error
    /// naming both ways to provide it.
    pub fn registry_connection(&self) -> Result<&str> {
        self.registry_connection.as_deref().context(
            "no attachment registry configured; set ITEMPACK_REGISTRY_URL or add \
             registry.connection_string to .itempack/config.yaml",
        )
    }

    /// Encoder path for the recode pass, or an error naming both ways
    /// to provide it.
    pub fn encoder_path(&self) -> Result<&str> {
        self.encoder_path.as_deref().context(
            "no audio encoder configured; set ITEMPACK_ENCODER or add \
             encoder.path to .itempack/config.yaml",
        )
    }
}

/// Find the config file by searching the current directory and parents,
/// falling back to ~/.itempack/config.yaml.
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".itempack").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    let home_config = dirs::home_dir()?.join(".itempack").join("config.yaml");
    home_config.exists().then_some(home_config)
}

fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn parses_config_file() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".itempack");
        std::fs::create_dir_all(&dir).unwrap();

        let config_path = dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
registry:
  connection_string: "host=localhost user=imrt dbname=imrt"
encoder:
  path: ./tools/audio-encode
"#
        )
        .unwrap();

        let config = load_config_file(&config_path).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(
            config.registry.unwrap().connection_string.as_deref(),
            Some("host=localhost user=imrt dbname=imrt")
        );
        assert_eq!(
            config.encoder.unwrap().path.as_deref(),
            Some("./tools/audio-encode")
        );
    }

    #[test]
    fn missing_settings_produce_named_errors() {
        let config = Config::default();
        assert!(config.registry_connection().is_err());
        assert!(config.encoder_path().is_err());
    }
}
