//! Configuration module for rclone-mgr.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{IgnoreRuleSet, MountLayout};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for rclone-mgr.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mounts: MountsConfig,
    pub rclone: RcloneConfig,
    pub journal: JournalConfig,
    pub dialogs: DialogsConfig,
    pub ipc: IpcConfig,
    pub logging: LoggingConfig,
    /// Error lines that never reach the user, keyed by drive name (`all` applies everywhere).
    pub ignore_rules: IgnoreRuleSet,
}

/// Where drives are mounted and cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountsConfig {
    /// Directory holding one mount point per drive.
    pub root: PathBuf,
    /// Directory holding one rclone VFS cache per drive.
    pub cache_root: PathBuf,
}

/// How rclone is invoked for transfers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RcloneConfig {
    pub binary: String,
    /// Flags inserted between the operation and the source/destination pair.
    pub transfer_flags: Vec<String>,
}

/// Journal follower settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub binary: String,
    /// Capacity of the entry and error channels between reader and classifier.
    pub channel_capacity: usize,
}

/// Dialog program settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogsConfig {
    /// zenity-compatible dialog program.
    pub binary: String,
}

/// Local control socket settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    /// Directory holding one `<drive>.sock` per running daemon.
    pub socket_dir: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/rclone-mgr/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("rclone-mgr")
            .join("config.yaml")
    }

    /// Mount layout with `~` expanded.
    pub fn layout(&self) -> MountLayout {
        MountLayout::new(
            expand_tilde(&self.mounts.root),
            expand_tilde(&self.mounts.cache_root),
        )
    }

    /// Control socket of the daemon watching `drive_name`.
    pub fn socket_path(&self, drive_name: &str) -> PathBuf {
        expand_tilde(&self.ipc.socket_dir).join(format!("{drive_name}.sock"))
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for MountsConfig {
    fn default() -> Self {
        Self {
            root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("google"),
            cache_root: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("~/.cache"))
                .join("google"),
        }
    }
}

impl Default for RcloneConfig {
    fn default() -> Self {
        Self {
            binary: "rclone".to_string(),
            transfer_flags: vec!["--drive-server-side-across-configs".to_string()],
        }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            binary: "journalctl".to_string(),
            channel_capacity: 64,
        }
    }
}

impl Default for DialogsConfig {
    fn default() -> Self {
        Self {
            binary: "zenity".to_string(),
        }
    }
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            socket_dir: dirs::runtime_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("rclone-mgr"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"journal.channel_capacity"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- mounts ---
        if self.mounts.root.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "mounts.root".into(),
                message: "must not be empty".into(),
            });
        }
        if self.mounts.cache_root.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "mounts.cache_root".into(),
                message: "must not be empty".into(),
            });
        }

        // --- binaries ---
        for (field, value) in [
            ("rclone.binary", &self.rclone.binary),
            ("journal.binary", &self.journal.binary),
            ("dialogs.binary", &self.dialogs.binary),
        ] {
            if value.trim().is_empty() {
                errors.push(ValidationError {
                    field: field.into(),
                    message: "must not be empty".into(),
                });
            }
        }

        // --- journal ---
        if self.journal.channel_capacity == 0 {
            errors.push(ValidationError {
                field: "journal.channel_capacity".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- ipc ---
        if self.ipc.socket_dir.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "ipc.socket_dir".into(),
                message: "must not be empty".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use rclonemgr_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .mounts_root(PathBuf::from("/home/user/google"))
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn mounts_root(mut self, root: PathBuf) -> Self {
        self.config.mounts.root = root;
        self
    }

    pub fn mounts_cache_root(mut self, root: PathBuf) -> Self {
        self.config.mounts.cache_root = root;
        self
    }

    pub fn rclone_binary(mut self, binary: impl Into<String>) -> Self {
        self.config.rclone.binary = binary.into();
        self
    }

    pub fn journal_binary(mut self, binary: impl Into<String>) -> Self {
        self.config.journal.binary = binary.into();
        self
    }

    pub fn dialogs_binary(mut self, binary: impl Into<String>) -> Self {
        self.config.dialogs.binary = binary.into();
        self
    }

    pub fn ipc_socket_dir(mut self, dir: PathBuf) -> Self {
        self.config.ipc.socket_dir = dir;
        self
    }

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn ignore_rules(mut self, rules: IgnoreRuleSet) -> Self {
        self.config.ignore_rules = rules;
        self
    }

    /// Consume the builder and return the configured [`Config`].
    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::domain::LogEntry;

    #[test]
    fn test_default_config_is_valid() {
        let errors = Config::default().validate();
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.rclone.binary, "rclone");
        assert_eq!(
            config.rclone.transfer_flags,
            vec!["--drive-server-side-across-configs".to_string()]
        );
        assert_eq!(config.journal.binary, "journalctl");
        assert_eq!(config.dialogs.binary, "zenity");
        assert_eq!(config.logging.level, "info");
        assert!(config.mounts.root.ends_with("google"));
        assert_eq!(config.ignore_rules, IgnoreRuleSet::default());
    }

    #[test]
    fn test_load_partial_yaml_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "mounts:\n  root: /mnt/google\nlogging:\n  level: debug\nignore_rules:\n  Team:\n    - quota exceeded"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.mounts.root, PathBuf::from("/mnt/google"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.rclone.binary, "rclone");

        // configured rules replace the built-in ones, keys are matched case-insensitively
        let entry = LogEntry::with_message("ERROR : x: failed to make directory");
        assert!(config.ignore_rules.should_trigger_error(&entry, "team"));
        let entry = LogEntry::with_message("ERROR : x: quota exceeded");
        assert!(!config.ignore_rules.should_trigger_error(&entry, "team"));
    }

    #[test]
    fn test_load_missing_file_errors_and_falls_back() {
        let path = PathBuf::from("/nonexistent/rclone-mgr/config.yaml");
        assert!(Config::load(&path).is_err());
        assert_eq!(Config::load_or_default(&path), Config::default());
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let config = ConfigBuilder::new()
            .rclone_binary(" ")
            .logging_level("loud")
            .mounts_root(PathBuf::new())
            .build();
        let mut config = config;
        config.journal.channel_capacity = 0;

        let fields: Vec<String> = config.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "mounts.root",
                "rclone.binary",
                "journal.channel_capacity",
                "logging.level"
            ]
        );
    }

    #[test]
    fn test_socket_path_and_layout() {
        let config = ConfigBuilder::new()
            .mounts_root(PathBuf::from("/mnt/google"))
            .mounts_cache_root(PathBuf::from("/var/cache/google"))
            .ipc_socket_dir(PathBuf::from("/run/user/1000/rclone-mgr"))
            .build();
        assert_eq!(
            config.socket_path("team"),
            PathBuf::from("/run/user/1000/rclone-mgr/team.sock")
        );
        let layout = config.layout();
        assert_eq!(layout.drive_path("team"), PathBuf::from("/mnt/google/team"));
        assert_eq!(layout.cache_path("team"), PathBuf::from("/var/cache/google/team"));
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde(Path::new("~/google"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("google"));
        }
        assert_eq!(expand_tilde(Path::new("/abs")), PathBuf::from("/abs"));
    }
}
