//! `dynjava.toml` configuration and tracing setup.
//!
//! ```toml
//! classpath = ["lib/util.jar", "build/classes"]
//!
//! [options]
//! require_semicolon = true
//!
//! [logging]
//! level = "dj.check=debug"
//! json = false
//!
//! [repl]
//! max_depth = 512
//! ```

use std::ffi::OsString;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};

use dj_core::Options;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;

/// Environment variable naming the configuration file, absolute or relative to the
/// directory being searched.
pub const DYNJAVA_CONFIG_ENV_VAR: &str = "DYNJAVA_CONFIG";

/// File names probed by [`discover_config_path`], in order.
pub const CONFIG_FILE_NAMES: [&str; 2] = ["dynjava.toml", ".dynjava.toml"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DjConfig {
    /// Class directories and jars searched after the built-in JDK classes.
    pub classpath: Vec<PathBuf>,
    pub options: Options,
    pub logging: LoggingConfig,
    pub repl: ReplConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// A level (`info`, `debug`, ...) or a full `EnvFilter` directive string.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,

    /// Write logs to stderr when no `file` is given.
    #[serde(default = "LoggingConfig::default_stderr")]
    pub stderr: bool,

    /// Append logs to this file instead of stderr.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    fn default_level() -> String {
        "warn".to_owned()
    }

    fn default_stderr() -> bool {
        true
    }

    pub(crate) fn normalize_level_directives(input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default_level();
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "trace" => "trace".to_owned(),
            "debug" => "debug".to_owned(),
            "info" => "info".to_owned(),
            "warn" | "warning" => "warn".to_owned(),
            "error" => "error".to_owned(),
            "off" | "none" => "off".to_owned(),
            _ => trimmed.to_owned(),
        }
    }

    fn config_env_filter(&self) -> tracing_subscriber::EnvFilter {
        let directives = Self::normalize_level_directives(&self.level);
        tracing_subscriber::EnvFilter::try_new(directives).unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::default()
                .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into())
        })
    }

    /// The effective filter: the configured level with `RUST_LOG` merged on top.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        let env_directives = std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        let config_directives = Self::normalize_level_directives(&self.level);
        match env_directives {
            Some(env_directives) => {
                let combined = format!("{config_directives},{env_directives}");
                tracing_subscriber::EnvFilter::try_new(combined)
                    .or_else(|_| tracing_subscriber::EnvFilter::try_new(env_directives))
                    .unwrap_or_else(|_| self.config_env_filter())
            }
            None => self.config_env_filter(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: Self::default_stderr(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplConfig {
    /// Guest call depth at which `StackOverflowError` is thrown.
    pub max_depth: usize,
    /// Stack size, in MiB, of the thread that parses, checks and evaluates. `dynjava check`
    /// uses it too.
    pub stack_mib: usize,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            max_depth: 256,
            stack_mib: 256,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // The default `Display` quotes a snippet of the input; the message alone is enough.
        ConfigError::Toml(err.message().to_owned())
    }
}

impl DjConfig {
    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::load_from_str(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_paths(base);
        }
        Ok(config)
    }

    /// Makes classpath entries and the log file relative to the config file's directory.
    fn resolve_relative_paths(&mut self, base: &Path) {
        for entry in &mut self.classpath {
            if entry.is_relative() {
                *entry = base.join(&*entry);
            }
        }
        if let Some(file) = &mut self.logging.file {
            if file.is_relative() {
                *file = base.join(&*file);
            }
        }
    }
}

/// Finds the configuration file for `dir`.
///
/// Search order:
/// 1) `DYNJAVA_CONFIG` (absolute or relative to `dir`)
/// 2) `dynjava.toml` in `dir`
/// 3) `.dynjava.toml` in `dir`
pub fn discover_config_path(dir: &Path) -> Option<PathBuf> {
    discover_in(dir, std::env::var_os(DYNJAVA_CONFIG_ENV_VAR))
}

fn discover_in(dir: &Path, env: Option<OsString>) -> Option<PathBuf> {
    if let Some(value) = env.filter(|value| !value.is_empty()) {
        let candidate = PathBuf::from(value);
        return Some(if candidate.is_absolute() {
            candidate
        } else {
            dir.join(candidate)
        });
    }
    CONFIG_FILE_NAMES
        .into_iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Loads the configuration for `dir`. Without a config file the defaults are returned
/// together with `None`.
pub fn load_for_dir(dir: &Path) -> Result<(DjConfig, Option<PathBuf>), ConfigError> {
    match discover_config_path(dir) {
        Some(path) => {
            let config = DjConfig::load_from_path(&path)?;
            tracing::debug!(target: "dj.config", path = %path.display(), "loaded config");
            Ok((config, Some(path)))
        }
        None => Ok((DjConfig::default(), None)),
    }
}

static TRACING_INIT: Once = Once::new();

/// Installs the global tracing subscriber. Only the first call has an effect.
pub fn init_tracing(config: &LoggingConfig) {
    TRACING_INIT.call_once(|| {
        let filter = config.env_filter();
        let file = config.file.as_ref().and_then(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });
        let file_failed = config.file.is_some() && file.is_none();
        let writer = match file {
            Some(file) => BoxMakeWriter::new(Mutex::new(file)),
            None if config.stderr => BoxMakeWriter::new(std::io::stderr),
            None => BoxMakeWriter::new(std::io::sink),
        };

        let layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = if config.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .boxed()
        };

        let subscriber = tracing_subscriber::registry().with(filter).with(layer);
        if tracing::subscriber::set_global_default(subscriber).is_ok() && file_failed {
            if let Some(path) = &config.file {
                tracing::warn!(
                    target: "dj.config",
                    path = %path.display(),
                    "failed to open log file; logging to stderr is disabled too"
                );
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn level_directives_are_forgiving() {
        assert_eq!(LoggingConfig::normalize_level_directives(" WARNING "), "warn");
        assert_eq!(LoggingConfig::normalize_level_directives(""), "warn");
        assert_eq!(
            LoggingConfig::normalize_level_directives("dj.check=debug"),
            "dj.check=debug"
        );
    }

    #[test]
    fn environment_override_wins_over_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("dynjava.toml"), "").expect("write");
        let found = discover_in(dir.path(), Some(OsString::from("custom.toml")));
        assert_eq!(found, Some(dir.path().join("custom.toml")));
    }

    #[test]
    fn plain_file_is_preferred_over_the_hidden_one() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(discover_in(dir.path(), None), None);
        std::fs::write(dir.path().join(".dynjava.toml"), "").expect("write");
        assert_eq!(discover_in(dir.path(), None), Some(dir.path().join(".dynjava.toml")));
        std::fs::write(dir.path().join("dynjava.toml"), "").expect("write");
        assert_eq!(discover_in(dir.path(), None), Some(dir.path().join("dynjava.toml")));
    }
}
