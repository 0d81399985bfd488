use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(depot_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(depot_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Configuration file already exists: {0}")]
    #[diagnostic(
        code(depot_config::already_exists),
        help("Remove the existing config file or use a different location")
    )]
    ConfigAlreadyExists(String),

    #[error("Invalid duration for `{field}`: {value}")]
    #[diagnostic(
        code(depot_config::invalid_duration),
        help("Use a duration such as `30s`, `10m`, `1h30m` or `0s`")
    )]
    InvalidDuration { field: &'static str, value: String },

    #[error("Invalid address `{0}`")]
    #[diagnostic(
        code(depot_config::invalid_address),
        help("Use a socket address such as `localhost:8080` or `0.0.0.0:8080`")
    )]
    InvalidAddress(String),

    #[error("Invalid URL for `{field}`: {value}")]
    #[diagnostic(
        code(depot_config::invalid_url),
        help("Ensure the URL is absolute, e.g. `https://storage.googleapis.com`")
    )]
    InvalidUrl { field: &'static str, value: String },

    #[error("Error while {action}")]
    #[diagnostic(code(depot_config::io))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML: {0}")]
    #[diagnostic(code(depot_config::toml))]
    Toml(#[from] toml_edit::TomlError),

    #[error("Encountered unexpected TOML item: {0}")]
    #[diagnostic(code(depot_config::unexpected_toml_item))]
    UnexpectedTomlItem(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Extension trait for wrapping I/O errors with the action that failed.
pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            ConfigError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}
