//! Application configuration.
//!
//! Settings are layered with `figment`, later layers winning:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. `config.toml` in the platform config directory (or `--config FILE`)
//! 3. `AUDIODUPE_*` environment variables, nested with `__`
//!    (e.g. `AUDIODUPE_RESOLUTION__PREFER_OLDEST=true`)
//! 4. Command-line flags, applied by the caller
//!
//! A configuration file that cannot be parsed is ignored with a warning.
//!
//! ```toml
//! method = "mixed"
//! min_size = 100000
//! io_threads = 2
//!
//! [resolution]
//! prefer_oldest = true
//! exclude_dirs = ["/music/masters"]
//!
//! [resolution.format_priority]
//! flac = 1
//! mp3 = 2
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::duplicates::{Method, DEFAULT_IO_THREADS};
use crate::index::{IndexStore, DEFAULT_MAX_AGE};
use crate::resolution::ResolutionSettings;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "AUDIODUPE_";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default classification method
    pub method: Method,
    /// Deepest directory level below the root (0 = unlimited)
    pub max_depth: usize,
    /// Smallest file size in bytes
    pub min_size: u64,
    /// Hashing threads
    pub io_threads: usize,
    /// Follow symbolic links while walking
    pub follow_symlinks: bool,
    /// Where index files live; the platform cache directory if unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_dir: Option<PathBuf>,
    /// Index files older than this are ignored
    pub index_max_age_hours: u64,
    /// Preferences for `--select`
    pub resolution: ResolutionSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            method: Method::default(),
            max_depth: 0,
            min_size: 0,
            io_threads: DEFAULT_IO_THREADS,
            follow_symlinks: false,
            index_dir: None,
            index_max_age_hours: DEFAULT_MAX_AGE.as_secs() / 3600,
            resolution: ResolutionSettings::default(),
        }
    }
}

impl Config {
    /// Load the layered configuration.
    ///
    /// `file` replaces the default config path when given.
    #[must_use]
    pub fn load(file: Option<&Path>) -> Self {
        let path = match file {
            Some(p) => Some(p.to_path_buf()),
            None => Self::config_path()
                .map_err(|e| log::debug!("No config directory: {e}"))
                .ok(),
        };

        match Self::figment(path.as_deref()).extract() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring invalid configuration: {e}");
                Self::figment(None).extract().unwrap_or_else(|e| {
                    log::warn!("Ignoring invalid environment overrides: {e}");
                    Self::default()
                })
            }
        }
    }

    /// The provider stack: defaults, then `file` (if it exists), then the
    /// environment.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file.filter(|p| p.exists()) {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Get the default platform-specific configuration path.
    ///
    /// # Errors
    ///
    /// Fails when the platform has no home directory.
    pub fn config_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("", "", "audiodupe")
            .ok_or_else(|| anyhow::anyhow!("Failed to determine project directories"))?;
        Ok(project_dirs.config_dir().join("config.toml"))
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Fails only if a value has no TOML representation.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// How long an index file stays valid.
    #[must_use]
    pub fn index_max_age(&self) -> Duration {
        Duration::from_secs(self.index_max_age_hours.saturating_mul(3600))
    }

    /// The index store this configuration points at.
    ///
    /// # Errors
    ///
    /// Fails when no `index_dir` is set and the platform has no cache
    /// directory.
    pub fn index_store(&self) -> Result<IndexStore> {
        let store = match &self.index_dir {
            Some(dir) => IndexStore::new(dir),
            None => IndexStore::default_location()?,
        };
        Ok(store.with_max_age(self.index_max_age()))
    }
}
