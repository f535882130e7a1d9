//! Configuration schema for optbuild.
//!
//! A configuration file is one of two variants: an [`OptimizationConfig`]
//! describing a hyperparameter search, or a [`BuildConfig`] describing one
//! concrete model. [`ConfigLoader`] reads a JSON file, layers environment
//! overrides on top with `figment`, and classifies the result into an
//! [`AnyConfig`].

pub mod buildconfig;
pub mod data;
pub mod optconfig;

pub use buildconfig::{BuildConfig, BuildMetadata, BuildSettings, BuildTask};
pub use data::{DataConfig, Deduplication, SplitStrategy};
pub use optconfig::{
    AlgorithmSpace, FloatRange, IntRange, OptimizationConfig, OptimizationSettings,
    OptimizationTask,
};

use crate::error::{OptbuildError, Result};
use figment::Figment;
use figment::providers::{Env, Serialized};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default prefix for environment overrides (`OPTBUILD_SETTINGS__N_TRIALS=10`).
pub const ENV_PREFIX: &str = "OPTBUILD_";

const TASK_FIELD: &str = "task";
const OPTIMIZATION_TASK: &str = "optimization";
const BUILD_TASK: &str = "building";

/// Whether a model predicts a continuous value or a binary class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelMode {
    Regression,
    Classification,
}

impl std::fmt::Display for ModelMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Regression => write!(f, "regression"),
            Self::Classification => write!(f, "classification"),
        }
    }
}

/// Optimization direction of the objective.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Maximize,
    Minimize,
}

impl Direction {
    /// True when `candidate` strictly improves on `incumbent`.
    pub fn is_better(&self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Self::Maximize => candidate > incumbent,
            Self::Minimize => candidate < incumbent,
        }
    }
}

/// Either configuration variant, as read from a file.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyConfig {
    Optimization(OptimizationConfig),
    Build(BuildConfig),
}

impl AnyConfig {
    /// Load a configuration file with the default environment prefix.
    pub fn from_path(path: &Path) -> Result<Self> {
        ConfigLoader::new().load(path)
    }

    /// Classify a parsed JSON document into one of the two variants.
    ///
    /// An explicit `task` field selects the variant. Without one, the
    /// optimization schema is tried first, then the build schema. Unknown
    /// fields are ignored at every level.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let Some(object) = value.as_object() else {
            return Err(OptbuildError::unrecognized(format!(
                "expected a JSON object, found {}",
                json_kind(&value)
            )));
        };

        match object.get(TASK_FIELD).cloned() {
            Some(serde_json::Value::String(task)) => match task.as_str() {
                OPTIMIZATION_TASK => Ok(Self::Optimization(serde_json::from_value(value)?)),
                BUILD_TASK => Ok(Self::Build(serde_json::from_value(value)?)),
                other => Err(OptbuildError::unrecognized(format!("task '{}'", other))),
            },
            Some(other) => Err(OptbuildError::unrecognized(format!(
                "field 'task' must be a string, found {}",
                json_kind(&other)
            ))),
            None => match serde_json::from_value::<OptimizationConfig>(value.clone()) {
                Ok(config) => Ok(Self::Optimization(config)),
                Err(opt_err) => match serde_json::from_value::<BuildConfig>(value) {
                    Ok(config) => Ok(Self::Build(config)),
                    Err(build_err) => Err(OptbuildError::unrecognized(format!(
                        "not an optimization config ({}) nor a build config ({})",
                        opt_err, build_err
                    ))),
                },
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Optimization(_) => OPTIMIZATION_TASK,
            Self::Build(_) => BUILD_TASK,
        }
    }
}

/// Reads configuration files, optionally layering environment overrides.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            env_prefix: Some(ENV_PREFIX.to_string()),
        }
    }

    /// A loader that ignores the environment entirely.
    pub fn without_env() -> Self {
        Self { env_prefix: None }
    }

    pub fn with_env_prefix(prefix: impl Into<String>) -> Self {
        Self {
            env_prefix: Some(prefix.into()),
        }
    }

    /// Read, layer and classify a configuration file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (`<PREFIX>SETTINGS__N_TRIALS`, ...)
    /// 2. The JSON file itself
    ///
    /// Override values are parsed (`10` is a number, `true` a boolean),
    /// except where the field they replace holds a string.
    pub fn load(&self, path: &Path) -> Result<AnyConfig> {
        let content = std::fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        let value = match &self.env_prefix {
            Some(prefix) => apply_env_overrides(value, prefix)?,
            None => value,
        };
        let config = AnyConfig::from_value(value)?;
        tracing::debug!(path = %path.display(), kind = config.kind(), "Loaded configuration");
        Ok(config)
    }
}

/// Merge `<prefix>`-prefixed environment variables over a JSON document.
///
/// The document passes through untouched when no such variable is set.
/// figment parses override values, so `123` or `true` would become a number
/// or a boolean. An override whose target is a string in the document is put
/// back as the raw string.
fn apply_env_overrides(value: serde_json::Value, prefix: &str) -> Result<serde_json::Value> {
    let overrides: Vec<(String, String)> = std::env::vars()
        .filter(|(key, _)| key.starts_with(prefix) && key.len() > prefix.len())
        .collect();
    if overrides.is_empty() {
        return Ok(value);
    }
    let keys: Vec<&str> = overrides.iter().map(|(key, _)| key.as_str()).collect();
    tracing::info!(overrides = ?keys, "Applying environment overrides to configuration");

    let mut merged: serde_json::Value = Figment::from(Serialized::defaults(&value))
        .merge(Env::prefixed(prefix).split("__"))
        .extract()
        .map_err(|e| OptbuildError::Figment(Box::new(e)))?;

    for (key, raw) in &overrides {
        let pointer = override_pointer(&key[prefix.len()..]);
        if let (Some(serde_json::Value::String(_)), Some(target)) =
            (value.pointer(&pointer), merged.pointer_mut(&pointer))
        {
            *target = serde_json::Value::String(raw.clone());
        }
    }
    Ok(merged)
}

/// JSON pointer addressed by an override key: `DATA__INPUT_COLUMN` is `/data/input_column`.
fn override_pointer(key: &str) -> String {
    key.split("__")
        .map(|part| format!("/{}", part.to_ascii_lowercase()))
        .collect()
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
