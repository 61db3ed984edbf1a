//! Configuration loading

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    /// Scan chain devices, TDI side first
    #[serde(default, rename = "device")]
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default report format
    #[serde(default)]
    pub format: OutputFormat,
}

/// One device on the scan chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Parsed BSDL tree (.json or .toml), relative to the config file
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// IDCODE of a device without a description
    #[serde(default)]
    pub idcode: Option<String>,
}

impl Config {
    /// Check that every device entry can be resolved
    pub fn validate(&self) -> Result<()> {
        for (position, device) in self.devices.iter().enumerate() {
            if device.path.is_none() && device.idcode.is_none() {
                bail!("device {} needs a path or an idcode", position);
            }
        }
        Ok(())
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.validate()?;

        // Device paths are relative to the config file
        if let Some(base) = path.parent() {
            for device in &mut config.devices {
                if let Some(p) = device.path.as_mut() {
                    if p.is_relative() {
                        *p = base.join(&*p);
                    }
                }
            }
        }

        info!(path = %path.display(), devices = config.devices.len(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bscan.toml");
        std::fs::write(
            &path,
            r#"
[output]
format = "json"

[[device]]
path = "devices/cpu.json"

[[device]]
idcode = "00010100100000000010000010010011"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.devices.len(), 2);
        assert_eq!(
            config.devices[0].path.as_deref(),
            Some(dir.path().join("devices/cpu.json").as_path())
        );
        assert!(config.devices[1].path.is_none());
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.output.format, OutputFormat::Text);
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_device_needs_path_or_idcode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bscan.toml");
        std::fs::write(&path, "[[device]]\n").unwrap();
        assert!(load_config(&path).is_err());
    }
}
