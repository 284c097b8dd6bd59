//! Global configuration parsing, merging, and validation.
//!
//! Settings come from an optional TOML file and from the command line; the
//! command line wins. [`GlobalConfig::from_source`] validates the merged
//! result and tokenizes the program line once, so no shell is ever involved
//! when the program later runs.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::transport::ServerUri;
use crate::{AppError, Result};

/// Name advertised in the `info` message when none is configured.
pub const DEFAULT_INFO_NAME: &str = "external";

/// Listener address used when none is configured.
pub const DEFAULT_URI: &str = "stdio://";

/// Unvalidated settings, as read from a TOML file or the command line.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct ConfigSource {
    /// Program to run with arguments, as a single shell-style line.
    #[serde(default)]
    pub program: Option<String>,
    /// Supported languages.
    #[serde(default, rename = "language")]
    pub languages: Vec<String>,
    /// Name used in the `info` message.
    #[serde(default)]
    pub info_name: Option<String>,
    /// Listener address.
    #[serde(default)]
    pub uri: Option<String>,
    /// Log at `DEBUG` level.
    #[serde(default)]
    pub debug: bool,
}

impl ConfigSource {
    /// Parse settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the text is not valid TOML or contains
    /// unknown keys.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Read and parse settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or parsed.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|err| {
            AppError::Config(format!("failed to read config '{}': {err}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Overlay `overrides` on top of `self`.
    ///
    /// Set values in `overrides` replace those in `self`; a non-empty
    /// language list replaces the whole list; `debug` is enabled if either
    /// side enables it.
    #[must_use]
    pub fn merge(self, overrides: Self) -> Self {
        Self {
            program: overrides.program.or(self.program),
            languages: if overrides.languages.is_empty() {
                self.languages
            } else {
                overrides.languages
            },
            info_name: overrides.info_name.or(self.info_name),
            uri: overrides.uri.or(self.uri),
            debug: overrides.debug || self.debug,
        }
    }
}

/// Validated service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalConfig {
    /// Program line as configured.
    pub program: String,
    /// Program line split into program and arguments.
    pub command: Vec<String>,
    /// Supported languages, in configuration order.
    pub languages: Vec<String>,
    /// Name used in the `info` message.
    pub info_name: String,
    /// Listener address.
    pub uri: ServerUri,
    /// Log at `DEBUG` level.
    pub debug: bool,
}

impl GlobalConfig {
    /// Validate merged settings.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the program is missing or cannot be
    /// tokenized, no language is given, or the URI is invalid.
    pub fn from_source(source: ConfigSource) -> Result<Self> {
        let program = source
            .program
            .filter(|program| !program.trim().is_empty())
            .ok_or_else(|| AppError::Config("program is required".into()))?;
        let command = tokenize_program(&program)?;

        if source.languages.is_empty() {
            return Err(AppError::Config("at least one language is required".into()));
        }

        let uri = source.uri.as_deref().unwrap_or(DEFAULT_URI).parse::<ServerUri>()?;

        Ok(Self {
            program,
            command,
            languages: source.languages,
            info_name: source.info_name.unwrap_or_else(|| DEFAULT_INFO_NAME.to_owned()),
            uri,
            debug: source.debug,
        })
    }
}

/// Split a program line into arguments using shell quoting rules.
///
/// Quotes group words and backslashes escape; no variable expansion,
/// globbing or other shell evaluation takes place.
///
/// # Errors
///
/// Returns `AppError::Config` if quoting is unbalanced or the line has no
/// words.
pub fn tokenize_program(program: &str) -> Result<Vec<String>> {
    let command = shlex::split(program)
        .ok_or_else(|| AppError::Config(format!("program has unbalanced quoting: {program}")))?;
    if command.is_empty() {
        return Err(AppError::Config("program is empty".into()));
    }
    Ok(command)
}
