//! Configuration module for blobsync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.
//! A managed-settings file (Java properties syntax) may be layered on top; the
//! result is flattened into a [`SyncConfiguration`] snapshot once per trigger.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::domain::upload_target::UploadTarget;

/// Device ID used when none is configured.
pub const DEFAULT_DEVICE_ID: &str = "UnknownDeviceId";

/// Name of the private staging directory that is always uploaded first.
pub const STAGING_DIRECTORY_NAME: &str = "sharedfiles";

/// Separator between entries of `local_sync_directories`.
pub const DIRECTORY_SEPARATOR: char = ':';

/// Environment variable overriding the configuration file location
pub const CONFIG_ENV: &str = "BLOBSYNC_CONFIG";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for blobsync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub schedule: ScheduleConfig,
    pub logging: LoggingConfig,
    pub managed: ManagedConfig,
}

/// Remote container and credential.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Name of the blob container. `None` blocks every upload.
    pub container_name: Option<String>,
    /// Container SAS URL with write and list permissions.
    pub sas_url: Option<String>,
}

/// What to upload and under which network conditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Colon-delimited directories, relative to `data_root`.
    pub local_sync_directories: String,
    /// First path segment of every remote key.
    pub device_id: String,
    /// Only upload while a Wi-Fi interface is connected.
    pub wifi_only: bool,
    /// Only upload while a VPN interface is active.
    pub vpn_only: bool,
    /// Whether periodic triggers run; manual triggers always run.
    pub auto_sync: bool,
    /// Directory that `local_sync_directories` entries are resolved against.
    pub data_root: PathBuf,
    /// Private staging directory uploaded before the configured ones.
    pub staging_dir: Option<PathBuf>,
}

/// Periodic trigger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds between periodic triggers.
    pub period_secs: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output (daemon only).
    pub json: bool,
}

/// Managed-settings overlay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagedConfig {
    /// Properties file applied on top of this configuration, if present.
    pub properties_file: Option<PathBuf>,
    /// When true, the user's `wifi_only`/`vpn_only`/`auto_sync` win over the
    /// managed file. String settings from the managed file always win.
    pub override_booleans: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Load from `path` if it exists, otherwise use defaults.
    ///
    /// Unlike [`Config::load_or_default`], a file that exists but cannot be
    /// parsed is an error.
    pub fn load_if_exists(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "No configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/blobsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("blobsync")
            .join("config.yaml")
    }

    /// Configuration file to use: `explicit` if given, then `BLOBSYNC_CONFIG`,
    /// then [`Config::default_path`].
    pub fn resolve_path(explicit: Option<PathBuf>) -> PathBuf {
        pick_config_path(explicit, std::env::var_os(CONFIG_ENV))
    }

    /// Directory for state files (status, staging).
    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("blobsync")
    }

    /// Flattens this configuration and the managed overlay into a snapshot.
    pub fn snapshot(&self) -> anyhow::Result<SyncConfiguration> {
        let mut snapshot = SyncConfiguration::from(self);

        if let Some(path) = &self.managed.properties_file {
            if path.exists() {
                let managed = ManagedSettings::load(path)?;
                managed.apply(&mut snapshot, self.managed.override_booleans);
            } else {
                debug!(path = %path.display(), "Managed settings file not present");
            }
        }

        Ok(snapshot)
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            local_sync_directories: String::new(),
            device_id: DEFAULT_DEVICE_ID.to_string(),
            wifi_only: true,
            vpn_only: true,
            auto_sync: true,
            data_root: dirs::home_dir().unwrap_or_else(|| PathBuf::from("~")),
            staging_dir: Some(Config::data_dir().join(STAGING_DIRECTORY_NAME)),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { period_secs: 3600 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"schedule.period_secs"`.
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

        // --- storage ---
        match self.storage.container_name.as_deref().map(str::trim) {
            None => errors.push(ValidationError {
                field: "storage.container_name".into(),
                message: "not set; uploads will be refused".into(),
            }),
            Some("") => errors.push(ValidationError {
                field: "storage.container_name".into(),
                message: "must not be empty".into(),
            }),
            Some(_) => {}
        }

        match self.storage.sas_url.as_deref() {
            None => errors.push(ValidationError {
                field: "storage.sas_url".into(),
                message: "not set; uploads will be refused".into(),
            }),
            Some(raw) => match Url::parse(raw) {
                Ok(url) if !matches!(url.scheme(), "https" | "http") => {
                    errors.push(ValidationError {
                        field: "storage.sas_url".into(),
                        message: format!("unsupported scheme '{}'", url.scheme()),
                    })
                }
                Ok(url) if url.query().map_or(true, str::is_empty) => {
                    errors.push(ValidationError {
                        field: "storage.sas_url".into(),
                        message: "missing SAS query string".into(),
                    })
                }
                Ok(_) => {}
                Err(e) => errors.push(ValidationError {
                    field: "storage.sas_url".into(),
                    message: format!("not a valid URL: {e}"),
                }),
            },
        }

        // --- sync ---
        if self.sync.device_id.trim().is_empty() {
            errors.push(ValidationError {
                field: "sync.device_id".into(),
                message: "must not be empty".into(),
            });
        } else if self.sync.device_id.contains('/') {
            errors.push(ValidationError {
                field: "sync.device_id".into(),
                message: "must not contain '/'".into(),
            });
        }

        for segment in self.sync.local_sync_directories.split(DIRECTORY_SEPARATOR) {
            if segment.split('/').any(|part| part == "..") {
                errors.push(ValidationError {
                    field: "sync.local_sync_directories".into(),
                    message: format!("entry escapes data_root: {segment}"),
                });
            }
        }

        let data_root = expand_tilde(&self.sync.data_root);
        if !data_root.exists() {
            errors.push(ValidationError {
                field: "sync.data_root".into(),
                message: format!("directory does not exist: {}", data_root.display()),
            });
        }

        // --- schedule ---
        if self.schedule.period_secs == 0 {
            errors.push(ValidationError {
                field: "schedule.period_secs".into(),
                message: "must be greater than 0".into(),
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

        // --- managed ---
        if let Some(path) = &self.managed.properties_file {
            if !path.exists() {
                errors.push(ValidationError {
                    field: "managed.properties_file".into(),
                    message: format!("file does not exist: {}", path.display()),
                });
            }
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// Managed settings overlay
// ---------------------------------------------------------------------------

/// Settings read from a managed (administrator-provided) properties file.
///
/// Recognised keys: `containerName`, `sas_url` (alias `sasCredential`),
/// `localSyncDirectories`, `deviceId`, `wifiOnly`, `vpnOnly`, and `autoSync`
/// (alias `autoSyncEnabled`). Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagedSettings {
    pub container_name: Option<String>,
    pub sas_url: Option<String>,
    pub local_sync_directories: Option<String>,
    pub device_id: Option<String>,
    pub wifi_only: Option<bool>,
    pub vpn_only: Option<bool>,
    pub auto_sync: Option<bool>,
}

impl ManagedSettings {
    /// Reads and parses a properties file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read managed settings {}", path.display()))?;
        Ok(Self::parse(&content))
    }

    /// Parses `key=value` / `key: value` lines; `#` and `!` start comments.
    pub fn parse(content: &str) -> Self {
        let mut settings = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }

            let Some(split) = line.find(['=', ':']) else {
                debug!(line, "Ignoring managed settings line without a separator");
                continue;
            };
            let key = line[..split].trim();
            let value = line[split + 1..].trim().to_string();

            match key {
                "containerName" => settings.container_name = Some(value),
                "sas_url" | "sasCredential" => settings.sas_url = Some(value),
                "localSyncDirectories" => settings.local_sync_directories = Some(value),
                "deviceId" => settings.device_id = Some(value),
                "wifiOnly" => settings.wifi_only = Some(parse_bool(&value)),
                "vpnOnly" => settings.vpn_only = Some(parse_bool(&value)),
                "autoSync" | "autoSyncEnabled" => settings.auto_sync = Some(parse_bool(&value)),
                other => debug!(key = other, "Ignoring unknown managed setting"),
            }
        }

        settings
    }

    /// Applies these settings on top of `snapshot`.
    ///
    /// String settings always replace the snapshot's values. Boolean settings
    /// are applied only when `override_booleans` is false.
    pub fn apply(&self, snapshot: &mut SyncConfiguration, override_booleans: bool) {
        if let Some(v) = &self.container_name {
            snapshot.container_name = Some(v.clone());
        }
        if let Some(v) = &self.sas_url {
            snapshot.sas_credential = Some(v.clone());
        }
        if let Some(v) = &self.local_sync_directories {
            snapshot.local_directories = split_directories(v);
        }
        if let Some(v) = &self.device_id {
            snapshot.device_id = v.clone();
        }

        if override_booleans {
            debug!("User override enabled, ignoring managed boolean settings");
            return;
        }

        if let Some(v) = self.wifi_only {
            snapshot.wifi_only = v;
        }
        if let Some(v) = self.vpn_only {
            snapshot.vpn_only = v;
        }
        if let Some(v) = self.auto_sync {
            snapshot.auto_sync_enabled = v;
        }
    }
}

/// `true` iff the value equals "true" ignoring case; everything else is false.
fn parse_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

fn pick_config_path(explicit: Option<PathBuf>, from_env: Option<std::ffi::OsString>) -> PathBuf {
    explicit
        .or_else(|| from_env.filter(|v| !v.is_empty()).map(PathBuf::from))
        .unwrap_or_else(Config::default_path)
}

/// Expands a leading `~` or `~/` to the home directory.
///
/// Paths without a tilde, and any path when no home directory is known, are
/// returned unchanged.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Some(raw) = path.to_str() else {
        return path.to_path_buf();
    };
    if let Some(stripped) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    } else if raw == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    path.to_path_buf()
}

/// Splits a colon-delimited directory list, dropping empty segments.
pub fn split_directories(source: &str) -> Vec<String> {
    source
        .split(DIRECTORY_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// SyncConfiguration snapshot
// ---------------------------------------------------------------------------

/// Configuration values for a single run.
///
/// Read fresh at every trigger; never cached across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfiguration {
    pub container_name: Option<String>,
    pub sas_credential: Option<String>,
    /// Relative directories in declared order
    pub local_directories: Vec<String>,
    pub device_id: String,
    pub wifi_only: bool,
    pub vpn_only: bool,
    pub auto_sync_enabled: bool,
    pub data_root: PathBuf,
    pub staging_dir: Option<PathBuf>,
}

impl From<&Config> for SyncConfiguration {
    fn from(config: &Config) -> Self {
        Self {
            container_name: config.storage.container_name.clone(),
            sas_credential: config.storage.sas_url.clone(),
            local_directories: split_directories(&config.sync.local_sync_directories),
            device_id: config.sync.device_id.clone(),
            wifi_only: config.sync.wifi_only,
            vpn_only: config.sync.vpn_only,
            auto_sync_enabled: config.sync.auto_sync,
            data_root: expand_tilde(&config.sync.data_root),
            staging_dir: config.sync.staging_dir.as_deref().map(expand_tilde),
        }
    }
}

impl SyncConfiguration {
    /// Upload targets in processing order: staging directory first, then
    /// each configured directory resolved against `data_root`.
    pub fn upload_targets(&self) -> Vec<UploadTarget> {
        let mut targets = Vec::with_capacity(self.local_directories.len() + 1);
        if let Some(staging) = &self.staging_dir {
            targets.push(UploadTarget::new(staging.clone(), &self.device_id));
        }
        targets.extend(
            self.local_directories
                .iter()
                .map(|dir| UploadTarget::new(self.data_root.join(dir), &self.device_id)),
        );
        targets
    }

    /// Container name if set and non-blank
    pub fn container_name(&self) -> Option<&str> {
        self.container_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// SAS credential if set and non-blank
    pub fn sas_credential(&self) -> Option<&str> {
        self.sas_credential
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Produces a fresh [`SyncConfiguration`] for each trigger.
pub trait SyncConfigSource: Send + Sync {
    fn snapshot(&self) -> anyhow::Result<SyncConfiguration>;
}

/// Reads the YAML file (and its managed overlay) on every call.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SyncConfigSource for FileConfigSource {
    fn snapshot(&self) -> anyhow::Result<SyncConfiguration> {
        Config::load_if_exists(&self.path)?.snapshot()
    }
}

impl SyncConfigSource for SyncConfiguration {
    fn snapshot(&self) -> anyhow::Result<SyncConfiguration> {
        Ok(self.clone())
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
/// use blobsync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .storage_container_name("telemetry")
///     .sync_local_directories("NetworkSurveyData:Logs")
///     .sync_device_id("rig-07")
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

    // --- storage ---

    pub fn storage_container_name(mut self, name: impl Into<String>) -> Self {
        self.config.storage.container_name = Some(name.into());
        self
    }

    pub fn storage_sas_url(mut self, url: impl Into<String>) -> Self {
        self.config.storage.sas_url = Some(url.into());
        self
    }

    // --- sync ---

    pub fn sync_local_directories(mut self, dirs: impl Into<String>) -> Self {
        self.config.sync.local_sync_directories = dirs.into();
        self
    }

    pub fn sync_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.config.sync.device_id = device_id.into();
        self
    }

    pub fn sync_wifi_only(mut self, enabled: bool) -> Self {
        self.config.sync.wifi_only = enabled;
        self
    }

    pub fn sync_vpn_only(mut self, enabled: bool) -> Self {
        self.config.sync.vpn_only = enabled;
        self
    }

    pub fn sync_auto_sync(mut self, enabled: bool) -> Self {
        self.config.sync.auto_sync = enabled;
        self
    }

    pub fn sync_data_root(mut self, root: PathBuf) -> Self {
        self.config.sync.data_root = root;
        self
    }

    pub fn sync_staging_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.config.sync.staging_dir = dir;
        self
    }

    // --- schedule ---

    pub fn schedule_period_secs(mut self, seconds: u64) -> Self {
        self.config.schedule.period_secs = seconds;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- managed ---

    pub fn managed_properties_file(mut self, path: PathBuf) -> Self {
        self.config.managed.properties_file = Some(path);
        self
    }

    pub fn managed_override_booleans(mut self, enabled: bool) -> Self {
        self.config.managed.override_booleans = enabled;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
