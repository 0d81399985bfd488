use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use documented::{Documented, DocumentedFields};
use serde::{Deserialize, Serialize};
use toml_edit::DocumentMut;
use tracing::{debug, info};
use url::Url;

use crate::{
    annotations::annotate_toml_table,
    error::{ConfigError, ErrorContext, Result},
    utils::{parse_duration, xdg_config_home},
};

pub const DEFAULT_ADDRESS: &str = "localhost:8080";
pub const DEFAULT_STORAGE_BUCKET: &str = "gs://depot-packages/index";
pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://packages.example.com/";
pub const DEFAULT_STORAGE_API_URL: &str = "https://storage.googleapis.com";
pub const DEFAULT_WATCH_INTERVAL: &str = "1m";
pub const DEFAULT_CACHE_TIME_INDEX: &str = "10s";
pub const DEFAULT_CACHE_TIME_ARTIFACTS: &str = "1h";
pub const DEFAULT_REQUEST_TIMEOUT: &str = "30s";

/// Server configuration
#[derive(Clone, Debug, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct Config {
    /// Address the HTTP server listens on.
    /// Default: localhost:8080
    pub address: Option<String>,

    /// Storage bucket holding the package index, as `gs://<bucket>/<root path>`.
    pub package_storage_bucket_internal: Option<String>,

    /// Public endpoint serving package artifacts and static resources.
    /// Download requests are redirected below this URL.
    pub package_storage_endpoint: Option<String>,

    /// Base URL of the object storage API used to read the index.
    /// Use `file:///some/dir` to read `<dir>/<bucket>/<path>` from disk instead.
    /// Default: https://storage.googleapis.com
    pub storage_api_url: Option<String>,

    /// How often the index cursor is checked for changes (e.g. "30s", "1m").
    /// "0s" disables background updates; only use that for testing.
    /// Default: 1m
    pub watch_interval: Option<String>,

    /// Cache-Control max-age for package index responses.
    /// Default: 10s
    pub cache_time_index: Option<String>,

    /// Cache-Control max-age for artifact, signature and static redirects.
    /// Default: 1h
    pub cache_time_artifacts: Option<String>,

    /// Timeout applied to every object storage request. "0s" disables it.
    /// Default: 30s
    pub request_timeout: Option<String>,

    /// User agent sent to the object storage API.
    /// Default: depot/<version>
    pub user_agent: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: Some(DEFAULT_ADDRESS.to_string()),
            package_storage_bucket_internal: Some(DEFAULT_STORAGE_BUCKET.to_string()),
            package_storage_endpoint: Some(DEFAULT_STORAGE_ENDPOINT.to_string()),
            storage_api_url: Some(DEFAULT_STORAGE_API_URL.to_string()),
            watch_interval: Some(DEFAULT_WATCH_INTERVAL.to_string()),
            cache_time_index: Some(DEFAULT_CACHE_TIME_INDEX.to_string()),
            cache_time_artifacts: Some(DEFAULT_CACHE_TIME_ARTIFACTS.to_string()),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT.to_string()),
            user_agent: Some(default_user_agent()),
        }
    }
}

fn default_user_agent() -> String {
    format!("depot/{}", env!("CARGO_PKG_VERSION"))
}

/// Returns the config file location: the explicit path if given, else
/// `$DEPOT_CONFIG`, else `$XDG_CONFIG_HOME/depot/config.toml`.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match env::var("DEPOT_CONFIG") {
        Ok(path_str) => PathBuf::from(path_str),
        Err(_) => xdg_config_home().join("depot").join("config.toml"),
    }
}

impl Config {
    /// Loads the configuration from `path`.
    ///
    /// A missing file yields the default configuration. Environment overrides
    /// are applied afterwards, then the result is validated.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at {}, using defaults", path.display());
                Self::default()
            }
            Err(err) => {
                return Err(ConfigError::IoError {
                    action: format!("reading config file {}", path.display()),
                    source: err,
                })
            }
        };

        config.apply_env_overrides();
        config.resolve()?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        let overrides = [
            ("DEPOT_ADDRESS", &mut self.address),
            (
                "DEPOT_STORAGE_BUCKET",
                &mut self.package_storage_bucket_internal,
            ),
            ("DEPOT_STORAGE_ENDPOINT", &mut self.package_storage_endpoint),
            ("DEPOT_WATCH_INTERVAL", &mut self.watch_interval),
        ];
        for (var, field) in overrides {
            if let Ok(value) = env::var(var) {
                *field = Some(value);
            }
        }
    }

    /// Fills unset fields with defaults and validates the values that can be
    /// checked without knowing how they are used.
    pub fn resolve(&mut self) -> Result<()> {
        self.address.get_or_insert_with(|| DEFAULT_ADDRESS.to_string());
        self.storage_api_url
            .get_or_insert_with(|| DEFAULT_STORAGE_API_URL.to_string());
        self.watch_interval
            .get_or_insert_with(|| DEFAULT_WATCH_INTERVAL.to_string());
        self.cache_time_index
            .get_or_insert_with(|| DEFAULT_CACHE_TIME_INDEX.to_string());
        self.cache_time_artifacts
            .get_or_insert_with(|| DEFAULT_CACHE_TIME_ARTIFACTS.to_string());
        self.request_timeout
            .get_or_insert_with(|| DEFAULT_REQUEST_TIMEOUT.to_string());
        self.user_agent.get_or_insert_with(default_user_agent);

        validate_address(self.address())?;
        self.storage_api_url()?;
        self.watch_interval()?;
        self.cache_time_index()?;
        self.cache_time_artifacts()?;
        self.request_timeout()?;

        Ok(())
    }

    pub fn address(&self) -> &str {
        self.address.as_deref().unwrap_or(DEFAULT_ADDRESS)
    }

    pub fn package_storage_bucket_internal(&self) -> &str {
        self.package_storage_bucket_internal
            .as_deref()
            .unwrap_or_default()
    }

    pub fn package_storage_endpoint(&self) -> &str {
        self.package_storage_endpoint.as_deref().unwrap_or_default()
    }

    pub fn user_agent(&self) -> String {
        self.user_agent.clone().unwrap_or_else(default_user_agent)
    }

    pub fn storage_api_url(&self) -> Result<Url> {
        let value = self
            .storage_api_url
            .as_deref()
            .unwrap_or(DEFAULT_STORAGE_API_URL);
        Url::parse(value).map_err(|_| {
            ConfigError::InvalidUrl {
                field: "storage_api_url",
                value: value.to_string(),
            }
        })
    }

    pub fn watch_interval(&self) -> Result<Duration> {
        duration_field(
            "watch_interval",
            self.watch_interval.as_deref(),
            DEFAULT_WATCH_INTERVAL,
        )
    }

    pub fn cache_time_index(&self) -> Result<Duration> {
        duration_field(
            "cache_time_index",
            self.cache_time_index.as_deref(),
            DEFAULT_CACHE_TIME_INDEX,
        )
    }

    pub fn cache_time_artifacts(&self) -> Result<Duration> {
        duration_field(
            "cache_time_artifacts",
            self.cache_time_artifacts.as_deref(),
            DEFAULT_CACHE_TIME_ARTIFACTS,
        )
    }

    pub fn request_timeout(&self) -> Result<Duration> {
        duration_field(
            "request_timeout",
            self.request_timeout.as_deref(),
            DEFAULT_REQUEST_TIMEOUT,
        )
    }

    pub fn to_annotated_document(&self) -> Result<DocumentMut> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut doc = toml_string.parse::<DocumentMut>()?;

        annotate_toml_table::<Config>(doc.as_table_mut(), true)?;

        Ok(doc)
    }
}

fn duration_field(field: &'static str, value: Option<&str>, default: &str) -> Result<Duration> {
    let value = value.unwrap_or(default);
    parse_duration(value).ok_or_else(|| {
        ConfigError::InvalidDuration {
            field,
            value: value.to_string(),
        }
    })
}

fn validate_address(address: &str) -> Result<()> {
    let valid = address
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidAddress(address.to_string()))
    }
}

/// Writes an annotated default configuration to `path`.
pub fn generate_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(ConfigError::ConfigAlreadyExists(
            path.display().to_string(),
        ));
    }

    let annotated_doc = Config::default().to_annotated_document()?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }

    fs::write(path, annotated_doc.to_string())
        .with_context(|| format!("writing config file {}", path.display()))?;
    info!(
        "Default configuration file generated with documentation at: {}",
        path.display()
    );
    Ok(())
}
