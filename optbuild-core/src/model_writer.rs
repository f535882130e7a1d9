//! Model persistence: plain estimators, self-contained models and zip bundles.

use crate::config::{BuildConfig, ModelMode};
use crate::descriptors::Descriptor;
use crate::error::{OptbuildError, Result};
use crate::estimators::FittedEstimator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

/// Entry holding the model document inside a bundle.
pub const MODEL_ENTRY: &str = "model.json";
/// Entry holding the bundle manifest.
pub const MANIFEST_ENTRY: &str = "MANIFEST.json";

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// How a trained model is written to disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelPersistenceMode {
    /// Only the fitted estimator; cannot featurize raw inputs.
    Plain,
    /// Descriptor, estimator and provenance in one JSON document.
    #[default]
    WithMetadata,
    /// A zip archive with the model document and a checksummed manifest.
    Bundle,
}

impl ModelPersistenceMode {
    pub const ALL: [ModelPersistenceMode; 3] = [Self::Plain, Self::WithMetadata, Self::Bundle];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::WithMetadata => "with_metadata",
            Self::Bundle => "bundle",
        }
    }
}

impl std::fmt::Display for ModelPersistenceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModelPersistenceMode {
    type Err = OptbuildError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| {
                OptbuildError::config(format!(
                    "unknown model persistence mode '{}' (expected one of: plain, with_metadata, bundle)",
                    s
                ))
            })
    }
}

/// Provenance stored next to a trained estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub name: String,
    pub buildconfig: BuildConfig,
    pub train_scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub test_scores: Option<BTreeMap<String, f64>>,
    pub n_train: usize,
    pub created_at: DateTime<Utc>,
    pub optbuild_version: String,
}

/// A trained model able to predict from raw inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedModel {
    pub descriptor: Descriptor,
    pub mode: ModelMode,
    pub estimator: FittedEstimator,
    pub metadata: ModelMetadata,
}

impl PersistedModel {
    /// Featurize `inputs` and predict. Classifiers return class-1 probabilities.
    pub fn predict(&self, inputs: &[String]) -> Result<Vec<f64>> {
        let x = self.descriptor.featurize(inputs)?;
        self.estimator.predict(&x)
    }
}

/// Manifest written into bundles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub name: String,
    pub version: String,
    pub mode: ModelMode,
    pub model_sha256: String,
    pub created_at: DateTime<Utc>,
}

/// Write `model` to `path` in the requested format, creating parent directories.
pub fn persist_model(model: &PersistedModel, path: &Path, mode: ModelPersistenceMode) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    match mode {
        ModelPersistenceMode::Plain => {
            std::fs::write(path, serde_json::to_string_pretty(&model.estimator)?)?;
        }
        ModelPersistenceMode::WithMetadata => {
            std::fs::write(path, serde_json::to_string_pretty(model)?)?;
        }
        ModelPersistenceMode::Bundle => write_bundle(model, path)?,
    }
    tracing::info!(path = %path.display(), mode = %mode, "Persisted model");
    Ok(())
}

fn write_bundle(model: &PersistedModel, path: &Path) -> Result<()> {
    let document = serde_json::to_string_pretty(model)?;
    let manifest = BundleManifest {
        name: model.metadata.name.clone(),
        version: model.metadata.optbuild_version.clone(),
        mode: model.mode,
        model_sha256: sha256_hex(document.as_bytes()),
        created_at: model.metadata.created_at,
    };

    let file = std::fs::File::create(path)?;
    let mut archive = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    archive.start_file(MANIFEST_ENTRY, options)?;
    archive.write_all(serde_json::to_string_pretty(&manifest)?.as_bytes())?;
    archive.start_file(MODEL_ENTRY, options)?;
    archive.write_all(document.as_bytes())?;
    archive.finish()?;
    Ok(())
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn read_entry<R: Read + std::io::Seek>(archive: &mut zip::ZipArchive<R>, name: &str) -> Result<String> {
    let mut entry = archive.by_name(name)?;
    let mut content = String::new();
    entry.read_to_string(&mut content)?;
    Ok(content)
}

fn read_bundle(bytes: Vec<u8>) -> Result<PersistedModel> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))?;
    let manifest: BundleManifest = serde_json::from_str(&read_entry(&mut archive, MANIFEST_ENTRY)?)?;
    let document = read_entry(&mut archive, MODEL_ENTRY)?;

    let digest = sha256_hex(document.as_bytes());
    if digest != manifest.model_sha256 {
        return Err(OptbuildError::persistence(format!(
            "bundle checksum mismatch: manifest {} but {} is {}",
            manifest.model_sha256, MODEL_ENTRY, digest
        )));
    }
    Ok(serde_json::from_str(&document)?)
}

/// Load a `with_metadata` document or a bundle.
pub fn load_model(path: &Path) -> Result<PersistedModel> {
    let bytes = std::fs::read(path)?;
    if bytes.starts_with(ZIP_MAGIC) {
        return read_bundle(bytes);
    }
    serde_json::from_slice(&bytes).map_err(|e| {
        OptbuildError::persistence(format!(
            "{} is not a model with metadata ({}); plain models load with load_estimator",
            path.display(),
            e
        ))
    })
}

/// Load the fitted estimator from an artifact of any persistence mode.
pub fn load_estimator(path: &Path) -> Result<FittedEstimator> {
    let bytes = std::fs::read(path)?;
    if bytes.starts_with(ZIP_MAGIC) {
        return Ok(read_bundle(bytes)?.estimator);
    }
    let value: serde_json::Value = serde_json::from_slice(&bytes)?;
    if value.get("estimator").is_some() {
        let model: PersistedModel = serde_json::from_value(value)?;
        return Ok(model.estimator);
    }
    Ok(serde_json::from_value(value)?)
}
