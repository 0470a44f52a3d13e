use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use trellis_kernel::DepKind;

use crate::error::Result;
use crate::slurm::SlurmClient;

/// Layered runtime configuration: defaults, then an optional TOML file,
/// then CLI flags applied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub db_path: PathBuf,
    pub submit_cmd: String,
    pub state_cmd: String,
    pub cancel_cmd: String,
    pub dep_kind: DepKind,
    pub debug: bool,
    pub dry: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: default_db_path(),
            submit_cmd: "sbatch".to_string(),
            state_cmd: "sacct".to_string(),
            cancel_cmd: "scancel".to_string(),
            dep_kind: DepKind::Afterok,
            debug: false,
            dry: false,
        }
    }
}

impl Config {
    /// Loads the config file from the canonical search path, falling back to
    /// defaults when none exists. Search order:
    /// 1. `TRELLIS_CONFIG_FILE` environment variable
    /// 2. `$XDG_CONFIG_HOME`/platform default (`~/.config/trellis/config.toml`)
    pub fn load() -> Result<Config> {
        match config_path() {
            Some(path) if path.is_file() => Config::load_file(&path),
            _ => Ok(Config::default()),
        }
    }

    pub fn load_file(path: &Path) -> Result<Config> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bad config file {}: {e}", path.display()),
            )
            .into()
        })
    }

    pub fn client(&self) -> SlurmClient {
        SlurmClient {
            submit_cmd: self.submit_cmd.clone(),
            state_cmd: self.state_cmd.clone(),
            cancel_cmd: self.cancel_cmd.clone(),
            debug: self.debug,
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("TRELLIS_CONFIG_FILE") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    Some(base_config_dir()?.join("trellis").join("config.toml"))
}

fn base_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
        let trimmed = dir.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    if let Ok(home) = std::env::var("HOME") {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed).join(".config"));
        }
    }
    None
}

/// The user cache directory holding the default store.
pub fn cache_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("XDG_CACHE_HOME") {
        let trimmed = dir.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed).join("trellis");
        }
    }
    if let Ok(home) = std::env::var("HOME") {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed).join(".cache").join("trellis");
        }
    }
    PathBuf::from(".trellis")
}

pub fn default_db_path() -> PathBuf {
    cache_dir().join("trellis.db")
}
