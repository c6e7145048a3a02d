//! Layered configuration from JSON files and prefixed environment variables.
//!
//! A typed section is loaded by starting from its defaults and overlaying, in
//! increasing priority:
//!
//! 1. `<dir>/<name>.<ext>`
//! 2. `<dir>/<name>.<environment>.<ext>`, when an environment name is known
//! 3. environment variables `<PREFIX>_<Key>_<Key>...`
//!
//! The environment name is read from `<ApplicationKey>.Environment` in the
//! base file, overridden by the matching environment variable. Keys match
//! case-insensitively. Overlays merge field by field, so a source only needs
//! to mention what it changes.

use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON in {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("config key is not an object: {0}")]
    NotAnObject(String),

    #[error("{name} is not a JSON array: {value}")]
    InvalidArray { name: String, value: String },

    #[error("configuration does not fit the target type: {0}")]
    Value(#[source] serde_json::Error),
}

/// Framework-level switches, fixed before the application is assembled.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Adds request details to recovered panic responses.
    pub debug: bool,
    pub config_dir: PathBuf,
    pub config_file_name: String,
    pub config_file_ext: String,
    pub env_prefix: String,
    /// Top-level key holding the [`AppConfig`] section.
    pub application_key: String,
    /// Grace period for in-flight requests after a shutdown signal.
    pub shutdown_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            config_dir: PathBuf::from("."),
            config_file_name: "appsettings".to_string(),
            config_file_ext: "json".to_string(),
            env_prefix: "APP".to_string(),
            application_key: "Application".to_string(),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl Settings {
    /// Path of the base file, or of the file for `environment`.
    pub fn config_file(&self, environment: Option<&str>) -> PathBuf {
        let file = match environment {
            Some(env) => format!("{}.{}.{}", self.config_file_name, env, self.config_file_ext),
            None => format!("{}.{}", self.config_file_name, self.config_file_ext),
        };
        self.config_dir.join(file)
    }
}

/// A source of raw configuration, as a JSON tree.
pub trait ConfigSource {
    fn describe(&self) -> String;

    /// The source's tree, or `None` if the source is absent.
    fn load(&self) -> Result<Option<Value>, ConfigError>;
}

/// A JSON file. A missing file is an absent source, not an error.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigSource for JsonFileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<Option<Value>, ConfigError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&data)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                origin: self.describe(),
                source,
            })
    }
}

/// Variables named `<PREFIX>_<Key>_<Key>...`, folded into a tree.
///
/// Values are strings, except that a value wrapped in `[` `]` must be a JSON
/// array. Strings are coerced to the type of the field they land on.
#[derive(Debug, Clone)]
pub struct EnvironmentSource {
    prefix: String,
    vars: Vec<(String, String)>,
}

impl EnvironmentSource {
    /// Snapshot of the process environment.
    ///
    /// Variables whose name or value is not valid Unicode are skipped.
    pub fn from_env(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let marker = format!("{}_", prefix);
        let vars: Vec<(String, String)> = env::vars_os()
            .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
                (Ok(key), Ok(value)) => Some((key, value)),
                (key, _) => {
                    let name = match &key {
                        Ok(key) => key.clone(),
                        Err(raw) => raw.to_string_lossy().into_owned(),
                    };
                    if name.starts_with(&marker) {
                        tracing::warn!(variable = %name, "skipping environment variable that is not valid unicode");
                    }
                    None
                }
            })
            .collect();
        Self::from_vars(prefix, vars)
    }

    pub fn from_vars<K, V>(prefix: impl Into<String>, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: prefix.into(),
            vars: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl ConfigSource for EnvironmentSource {
    fn describe(&self) -> String {
        format!("environment ({}_*)", self.prefix)
    }

    fn load(&self) -> Result<Option<Value>, ConfigError> {
        let marker = format!("{}_", self.prefix);
        let mut root = Map::new();
        let mut found = false;

        for (name, raw) in &self.vars {
            let Some(path) = name.strip_prefix(&marker) else {
                continue;
            };
            let value = if raw.starts_with('[') && raw.ends_with(']') {
                let items: Vec<Value> =
                    serde_json::from_str(raw).map_err(|_| ConfigError::InvalidArray {
                        name: name.clone(),
                        value: raw.clone(),
                    })?;
                Value::Array(items)
            } else {
                Value::String(raw.clone())
            };
            insert_path(&mut root, &path.split('_').collect::<Vec<_>>(), value)?;
            found = true;
        }

        Ok(found.then_some(Value::Object(root)))
    }
}

fn insert_path(root: &mut Map<String, Value>, path: &[&str], value: Value) -> Result<(), ConfigError> {
    let Some((last, parents)) = path.split_last() else {
        return Ok(());
    };
    let mut current = root;
    for key in parents {
        let next = current
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        current = next
            .as_object_mut()
            .ok_or_else(|| ConfigError::NotAnObject(key.to_string()))?;
    }
    current.insert(last.to_string(), value);
    Ok(())
}

fn get_ci<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    value
        .as_object()?
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

/// The section under `keys`, if every step exists and is an object.
fn section<'v>(root: &'v Value, keys: &[&str]) -> Option<&'v Value> {
    keys.iter()
        .try_fold(root, |current, key| get_ci(current, key))
        .filter(|v| v.is_object())
}

fn merge(target: &mut Value, overlay: &Value) {
    match (target, overlay) {
        (Value::Object(target), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let existing = target
                    .keys()
                    .find(|k| k.eq_ignore_ascii_case(key))
                    .cloned()
                    .unwrap_or_else(|| key.clone());
                match target.get_mut(&existing) {
                    Some(slot) => merge(slot, value),
                    None => {
                        target.insert(existing, value.clone());
                    }
                }
            }
        }
        (target, Value::String(raw)) => *target = coerce(target, raw),
        (target, overlay) => *target = overlay.clone(),
    }
}

/// Reads a string into the JSON type already present at the target.
fn coerce(target: &Value, raw: &str) -> Value {
    let parsed = match target {
        Value::Number(_) | Value::Bool(_) | Value::Array(_) | Value::Object(_) => {
            serde_json::from_str::<Value>(raw).ok()
        }
        _ => None,
    };
    match parsed {
        Some(value) if same_kind(target, &value) => value,
        _ => Value::String(raw.to_string()),
    }
}

fn same_kind(a: &Value, b: &Value) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

fn overlay(target: &mut Value, tree: &Value, keys: &[&str]) {
    if let Some(section) = section(tree, keys) {
        merge(target, section);
    }
}

fn environment_name(settings: &Settings, trees: &[Option<&Value>]) -> Option<String> {
    trees
        .iter()
        .flatten()
        .filter_map(|tree| {
            section(tree, &[settings.application_key.as_str()])
                .and_then(|app| get_ci(app, "Environment"))
                .and_then(Value::as_str)
                .filter(|name| !name.is_empty())
        })
        .last()
        .map(str::to_string)
}

/// A loaded, immutable configuration section.
///
/// Registered as a singleton and resolved by builders through
/// [`ResolutionContext::config`](crate::ResolutionContext::config).
///
/// # Examples
///
/// ```
/// use scopeline::config::{Config, EnvironmentSource, Settings};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Default, Serialize, Deserialize)]
/// #[serde(default, rename_all = "PascalCase")]
/// struct Database { url: String, pool: u32 }
///
/// let env = EnvironmentSource::from_vars("APP", [("APP_Database_Pool", "16")]);
/// let config = Config::load_from(&Settings::default(), Database::default(), &["Database"], &env).unwrap();
/// assert_eq!(config.value().pool, 16);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Config<T> {
    value: T,
}

impl<T> Config<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: Serialize + DeserializeOwned> Config<T> {
    /// Loads the section under `keys` against the process environment.
    pub fn load(settings: &Settings, defaults: T, keys: &[&str]) -> Result<Self, ConfigError> {
        Self::load_from(
            settings,
            defaults,
            keys,
            &EnvironmentSource::from_env(settings.env_prefix.as_str()),
        )
    }

    /// Loads the section under `keys` with an explicit environment source.
    pub fn load_from(
        settings: &Settings,
        defaults: T,
        keys: &[&str],
        environment: &EnvironmentSource,
    ) -> Result<Self, ConfigError> {
        let mut merged = serde_json::to_value(&defaults).map_err(ConfigError::Value)?;

        let base = JsonFileSource::new(settings.config_file(None)).load()?;
        let env_tree = environment.load()?;

        if let Some(tree) = &base {
            overlay(&mut merged, tree, keys);
        }
        if let Some(name) = environment_name(settings, &[base.as_ref(), env_tree.as_ref()]) {
            let source = JsonFileSource::new(settings.config_file(Some(&name)));
            if let Some(tree) = source.load()? {
                tracing::debug!(environment = %name, file = %source.describe(), "loading environment config");
                overlay(&mut merged, &tree, keys);
            }
        }
        if let Some(tree) = &env_tree {
            overlay(&mut merged, tree, keys);
        }

        serde_json::from_value(merged)
            .map(Self::new)
            .map_err(ConfigError::Value)
    }
}

/// Framework configuration section, found under [`Settings::application_key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct AppConfig {
    pub name: String,
    pub environment: String,
    pub log: LogConfig,
    pub server: ServerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "scopeline".to_string(),
            environment: "development".to_string(),
            log: LogConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load(settings: &Settings) -> Result<Config<Self>, ConfigError> {
        Config::load(settings, Self::default(), &[settings.application_key.as_str()])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ServerConfig {
    /// Empty means every interface.
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        let host = if self.host.is_empty() { "0.0.0.0" } else { &self.host };
        format!("{}:{}", host, self.port)
    }
}
