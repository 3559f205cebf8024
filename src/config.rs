//! Purpose: Resolve credentials, store, and namespace into one explicit settings value.
//! Exports: `ConfigLayer`, `ConfigFile`, `Section`, `Settings`, `DEFAULT_CONFIG_FILE`,
//! `DEFAULT_NAMESPACE`, `ENV_PREFIX`.
//! Role: Built once at startup and passed by value into export/import; no global state.
//! Invariants: Precedence is CLI flag > file section > file top level > environment > default.
//! Invariants: Empty strings count as unset at every layer.
//! Invariants: Missing credentials are reported together, never one at a time.
use crate::api::DEFAULT_API_VERSION;
use crate::core::error::{Error, ErrorKind};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "config.yml";
pub const DEFAULT_NAMESPACE: &str = "power-editor";
pub const ENV_PREFIX: &str = "POWEREDITOR_";

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub key: Option<String>,
    pub password: Option<String>,
    pub store: Option<String>,
    pub namespace: Option<String>,
    pub api_version: Option<String>,
}

impl ConfigLayer {
    /// Reads `POWEREDITOR_*` variables through `lookup`.
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        Self {
            key: var("KEY"),
            password: var("PASSWORD"),
            store: var("STORE"),
            namespace: var("NAMESPACE"),
            api_version: var("API_VERSION"),
        }
    }

    /// Fills every unset value of `self` from `fallback`.
    pub fn or(self, fallback: &ConfigLayer) -> Self {
        let pick = |value: Option<String>, other: &Option<String>| {
            non_empty(value).or_else(|| non_empty(other.clone()))
        };
        Self {
            key: pick(self.key, &fallback.key),
            password: pick(self.password, &fallback.password),
            store: pick(self.store, &fallback.store),
            namespace: pick(self.namespace, &fallback.namespace),
            api_version: pick(self.api_version, &fallback.api_version),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Section {
    Export,
    Import,
}

/// YAML config file: top-level values plus per-command `export:` / `import:` overrides.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    #[serde(flatten)]
    pub base: ConfigLayer,
    pub export: ConfigLayer,
    pub import: ConfigLayer,
}

impl ConfigFile {
    pub fn parse(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Loads `path`, or `config.yml` from the working directory when no path is given.
    ///
    /// An explicit path must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Option<(PathBuf, Self)>, Error> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if !required && err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("failed to read config file")
                    .with_path(&path)
                    .with_source(err));
            }
        };
        let file = Self::parse(&text).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid config file: {err}"))
                .with_path(&path)
                .with_source(err)
        })?;
        Ok(Some((path, file)))
    }

    pub fn layer(&self, section: Section) -> ConfigLayer {
        let specific = match section {
            Section::Export => &self.export,
            Section::Import => &self.import,
        };
        specific.clone().or(&self.base)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Settings {
    pub key: String,
    pub password: String,
    pub store: String,
    pub namespace: String,
    pub api_version: String,
}

impl Settings {
    /// Merges layers highest-precedence first; returns every missing credential on failure.
    pub fn resolve(layers: &[&ConfigLayer]) -> Result<Self, Vec<String>> {
        let merged = layers
            .iter()
            .fold(ConfigLayer::default(), |merged, layer| merged.or(layer));

        let mut problems = Vec::new();
        let mut require = |value: Option<String>, problem: &str| {
            if value.is_none() {
                problems.push(problem.to_string());
            }
            value.unwrap_or_default()
        };
        let key = require(merged.key, "api key is required");
        let password = require(merged.password, "api password is required");
        let store = require(merged.store, "store domain is required");
        if !problems.is_empty() {
            return Err(problems);
        }

        Ok(Self {
            key,
            password,
            store,
            namespace: merged
                .namespace
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            api_version: merged
                .api_version
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
