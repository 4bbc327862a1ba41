use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default number of parallel object transfers per job.
pub const DEFAULT_THREADS: usize = 10;

/// Global configuration loaded from `~/.config/stowage/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StowageConfig {
    /// Appliance endpoint. `file:///path` selects the directory-backed appliance.
    pub endpoint: String,
    /// Parallel object transfers per bulk job when `--threads` is not given.
    pub default_threads: usize,
    /// Directory holding recovery descriptors. Defaults to the XDG state dir.
    #[serde(default)]
    pub recovery_dir: Option<PathBuf>,
    /// Follow symbolic links when enumerating a directory for PUT.
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for StowageConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            default_threads: DEFAULT_THREADS,
            recovery_dir: None,
            follow_symlinks: false,
        }
    }
}

impl StowageConfig {
    /// Resolved descriptor directory: explicit config value or `~/.local/state/stowage/recovery`.
    pub fn recovery_dir(&self) -> Result<PathBuf> {
        match &self.recovery_dir {
            Some(dir) => Ok(dir.clone()),
            None => crate::recovery::default_recovery_dir(),
        }
    }
}

fn default_endpoint() -> String {
    let root = xdg::BaseDirectories::with_prefix("stowage")
        .map(|dirs| dirs.get_data_home().join("appliance"))
        .unwrap_or_else(|_| PathBuf::from("./stowage-appliance"));
    format!("file://{}", root.display())
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("stowage")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<StowageConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = StowageConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit path (`--config`).
pub fn load_from_path(path: &Path) -> Result<StowageConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config: {}", path.display()))?;
    let cfg: StowageConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = StowageConfig::default();
        assert_eq!(cfg.default_threads, 10);
        assert!(cfg.endpoint.starts_with("file://"));
        assert!(cfg.recovery_dir.is_none());
        assert!(!cfg.follow_symlinks);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = StowageConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: StowageConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.endpoint, cfg.endpoint);
        assert_eq!(parsed.default_threads, cfg.default_threads);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            endpoint = "file:///srv/appliance"
            default_threads = 4
            recovery_dir = "/var/tmp/stowage"
            follow_symlinks = true
        "#;
        let cfg: StowageConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.endpoint, "file:///srv/appliance");
        assert_eq!(cfg.default_threads, 4);
        assert_eq!(
            cfg.recovery_dir().unwrap(),
            PathBuf::from("/var/tmp/stowage")
        );
        assert!(cfg.follow_symlinks);
    }

    #[test]
    fn optional_fields_default_when_missing() {
        let toml = r#"
            endpoint = "file:///srv/appliance"
            default_threads = 2
        "#;
        let cfg: StowageConfig = toml::from_str(toml).unwrap();
        assert!(cfg.recovery_dir.is_none());
        assert!(!cfg.follow_symlinks);
    }

    #[test]
    fn load_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "endpoint = \"file:///x\"\ndefault_threads = 3\n").unwrap();
        let cfg = load_from_path(&path).unwrap();
        assert_eq!(cfg.default_threads, 3);
    }
}
