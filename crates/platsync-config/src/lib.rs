//! Configuration for platsync
//!
//! Settings live in `platsync.toml`. Every key has a default, so a run in a
//! checkout of the platforms repository works without any file at all.
//!
//! Lookup order for the file:
//! 1. `PLATSYNC_CONFIG` environment variable
//! 2. `./platsync.toml`
//! 3. the user config directory (`~/.config/platsync/platsync.toml`)

pub mod host;

pub use host::{normalize_arch, HostOs, HostPlatform};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_ENV: &str = "PLATSYNC_CONFIG";
pub const CONFIG_FILE: &str = "platsync.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("'{program}' not found on PATH: {source}")]
    ProgramNotFound {
        program: String,
        #[source]
        source: which::Error,
    },

    #[error("Environment variable {0} is not set")]
    MissingToken(String),

    #[error("Unknown config key: {0}")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Where published artifacts and the remote manifest go
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// GitHub release assets plus the contents API for the manifest
    #[default]
    Github,
    /// A local directory, for dry runs and tests
    Local,
}

impl std::str::FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(StoreKind::Github),
            "local" => Ok(StoreKind::Local),
            other => Err(format!("unknown store '{}', expected github or local", other)),
        }
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKind::Github => f.write_str("github"),
            StoreKind::Local => f.write_str("local"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ReleaseConfig {
    pub store: StoreKind,
    /// `owner/name` of the repository hosting the release
    pub repository: String,
    /// Tag of the release that collects platform artifacts
    pub tag: String,
    /// Branch the manifest is committed to
    pub branch: String,
    /// Path of the manifest inside the repository
    pub manifest_remote_path: String,
    pub commit_message: String,
    /// Environment variable holding the API token
    pub token_env: String,
    pub api_url: String,
    /// Root directory of the `local` store
    pub local_dir: PathBuf,
    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        ReleaseConfig {
            store: StoreKind::Github,
            repository: "Marekkon5/onetagger-platforms".to_string(),
            tag: "platforms".to_string(),
            branch: "master".to_string(),
            manifest_remote_path: "platforms.json".to_string(),
            commit_message: "[CI] Update platforms.json".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            api_url: "https://api.github.com".to_string(),
            local_dir: PathBuf::from(".release"),
            timeout_secs: 300,
        }
    }
}

impl ReleaseConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Read the API token from the configured environment variable
    pub fn token(&self) -> Result<String, ConfigError> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingToken(self.token_env.clone()))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BuildConfig {
    pub cargo: String,
    pub git: String,
    /// Kill a build step after this many seconds; unset means no limit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_timeout_secs: Option<u64>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            cargo: "cargo".to_string(),
            git: "git".to_string(),
            step_timeout_secs: None,
        }
    }
}

impl BuildConfig {
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_secs.map(Duration::from_secs)
    }

    pub fn cargo_path(&self) -> Result<PathBuf, ConfigError> {
        resolve_program(&self.cargo)
    }

    pub fn git_path(&self) -> Result<PathBuf, ConfigError> {
        resolve_program(&self.git)
    }
}

/// Resolve a program name or path to an executable
pub fn resolve_program(program: &str) -> Result<PathBuf, ConfigError> {
    which::which(program).map_err(|source| ConfigError::ProgramNotFound {
        program: program.to_string(),
        source,
    })
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory holding one sub-directory per platform
    pub platforms_dir: PathBuf,
    /// Local copy of the registry
    pub manifest_path: PathBuf,
    /// Where built artifacts are placed before upload
    pub dist_dir: PathBuf,
    pub release: ReleaseConfig,
    pub build: BuildConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            platforms_dir: PathBuf::from("platforms"),
            manifest_path: PathBuf::from("platforms.json"),
            dist_dir: PathBuf::from("dist"),
            release: ReleaseConfig::default(),
            build: BuildConfig::default(),
        }
    }
}

impl Config {
    /// Resolve the config file location
    pub fn path() -> PathBuf {
        // Honor explicit override for CI and isolated runs
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let trimmed = env_path.trim();
            if !trimmed.is_empty() {
                return PathBuf::from(trimmed);
            }
        }

        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return local;
        }

        Self::user_path().unwrap_or(local)
    }

    /// Per-user config file, if a config directory can be determined
    pub fn user_path() -> Option<PathBuf> {
        #[cfg(not(target_os = "windows"))]
        let dir = dirs::home_dir().map(|h| h.join(".config"));

        #[cfg(target_os = "windows")]
        let dir = dirs::config_dir();

        dir.map(|d| d.join("platsync").join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(&Self::path())
    }

    /// Load from a specific file, using defaults when it does not exist
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "platforms-dir" => self.platforms_dir.display().to_string(),
            "manifest-path" => self.manifest_path.display().to_string(),
            "dist-dir" => self.dist_dir.display().to_string(),
            "store" => self.release.store.to_string(),
            "repository" => self.release.repository.clone(),
            "tag" => self.release.tag.clone(),
            "branch" => self.release.branch.clone(),
            "manifest-remote-path" => self.release.manifest_remote_path.clone(),
            "commit-message" => self.release.commit_message.clone(),
            "token-env" => self.release.token_env.clone(),
            "api-url" => self.release.api_url.clone(),
            "local-dir" => self.release.local_dir.display().to_string(),
            "timeout-secs" => self.release.timeout_secs.to_string(),
            "cargo" => self.build.cargo.clone(),
            "git" => self.build.git.clone(),
            "step-timeout-secs" => self.build.step_timeout_secs?.to_string(),
            _ => return None,
        };
        Some(value)
    }

    pub fn set(&mut self, key: &str, value: String) -> Result<(), ConfigError> {
        let invalid = |value: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "platforms-dir" => self.platforms_dir = PathBuf::from(value),
            "manifest-path" => self.manifest_path = PathBuf::from(value),
            "dist-dir" => self.dist_dir = PathBuf::from(value),
            "store" => self.release.store = value.parse().map_err(|_| invalid(&value))?,
            "repository" => self.release.repository = value,
            "tag" => self.release.tag = value,
            "branch" => self.release.branch = value,
            "manifest-remote-path" => self.release.manifest_remote_path = value,
            "commit-message" => self.release.commit_message = value,
            "token-env" => self.release.token_env = value,
            "api-url" => self.release.api_url = value,
            "local-dir" => self.release.local_dir = PathBuf::from(value),
            "timeout-secs" => {
                self.release.timeout_secs = value.parse().map_err(|_| invalid(&value))?;
            }
            "cargo" => self.build.cargo = value,
            "git" => self.build.git = value,
            "step-timeout-secs" => {
                self.build.step_timeout_secs = Some(value.parse().map_err(|_| invalid(&value))?);
            }
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// All keys with their effective values, in display order
    pub fn values_iter(&self) -> Vec<(&'static str, String)> {
        const KEYS: &[&str] = &[
            "platforms-dir",
            "manifest-path",
            "dist-dir",
            "store",
            "repository",
            "tag",
            "branch",
            "manifest-remote-path",
            "commit-message",
            "token-env",
            "api-url",
            "local-dir",
            "timeout-secs",
            "cargo",
            "git",
            "step-timeout-secs",
        ];
        KEYS.iter()
            .filter_map(|key| self.get(key).map(|value| (*key, value)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_file() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let config = Config::load_from_path(&temp_dir.path().join("missing.toml"));
        assert!(config.is_ok_and(|c| c == Config::default()));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let path = temp_dir.path().join(CONFIG_FILE);
        let written = fs::write(
            &path,
            "dist_dir = \"out\"\n[release]\nstore = \"local\"\ntag = \"nightly\"\n[build]\nstep_timeout_secs = 900\n",
        );
        assert!(written.is_ok());

        let config = Config::load_from_path(&path);
        assert!(config.is_ok(), "{:?}", config.err());
        let config = config.unwrap_or_default();
        assert_eq!(config.dist_dir, PathBuf::from("out"));
        assert_eq!(config.platforms_dir, PathBuf::from("platforms"));
        assert_eq!(config.release.store, StoreKind::Local);
        assert_eq!(config.release.tag, "nightly");
        assert_eq!(config.release.branch, "master");
        assert_eq!(config.build.step_timeout(), Some(Duration::from_secs(900)));
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let path = temp_dir.path().join(CONFIG_FILE);
        assert!(fs::write(&path, "release = 3").is_ok());
        assert!(matches!(
            Config::load_from_path(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_get_set_round_trip() {
        let mut config = Config::default();
        assert!(config.set("tag", "beta".to_string()).is_ok());
        assert!(config.set("store", "local".to_string()).is_ok());
        assert!(config.set("store", "ftp".to_string()).is_err());
        assert!(config.set("timeout-secs", "soon".to_string()).is_err());
        assert!(matches!(
            config.set("nope", String::new()),
            Err(ConfigError::UnknownKey(_))
        ));

        assert_eq!(config.get("tag").as_deref(), Some("beta"));
        assert_eq!(config.get("store").as_deref(), Some("local"));
        assert_eq!(config.get("step-timeout-secs"), None);
    }

    #[test]
    fn test_save_and_load() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let path = temp_dir.path().join("nested").join(CONFIG_FILE);
        let mut config = Config::default();
        config.release.repository = "someone/platforms".to_string();

        assert!(config.save_to_path(&path).is_ok());
        assert!(Config::load_from_path(&path).is_ok_and(|c| c == config));
    }

    #[test]
    fn test_values_iter_skips_unset() {
        let config = Config::default();
        let keys: Vec<_> = config.values_iter().into_iter().map(|(k, _)| k).collect();
        assert!(keys.contains(&"repository"));
        assert!(!keys.contains(&"step-timeout-secs"));
    }
}
