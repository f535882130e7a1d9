//! Training and persisting the model described by a [`BuildConfig`].

use crate::config::BuildConfig;
use crate::data::Dataset;
use crate::error::{OptbuildError, Result};
use crate::metrics::score_all;
use crate::model_writer::{ModelMetadata, ModelPersistenceMode, PersistedModel, persist_model};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Summary of a build run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub path: PathBuf,
    pub n_train: usize,
    pub train_scores: BTreeMap<String, f64>,
    pub test_scores: Option<BTreeMap<String, f64>>,
}

/// Fit the configured descriptor and algorithm on `train`, scoring `test` if given.
pub fn train_model(
    buildconfig: &BuildConfig,
    train: &Dataset,
    test: Option<&Dataset>,
) -> Result<PersistedModel> {
    buildconfig.validate()?;
    let mode = buildconfig.settings.mode;

    let x_train = buildconfig.descriptor.featurize(&train.inputs)?;
    let estimator = buildconfig.algorithm.fit(&x_train, &train.responses)?;
    let fitted = estimator.predict(&x_train)?;
    if fitted.iter().any(|v| !v.is_finite()) {
        return Err(OptbuildError::training(format!(
            "{} produced non-finite predictions on the training set",
            buildconfig.model_name()
        )));
    }
    let train_scores = score_all(mode, &train.responses, &fitted);

    let test_scores = match test {
        Some(test) => {
            let x_test = buildconfig.descriptor.featurize(&test.inputs)?;
            Some(score_all(mode, &test.responses, &estimator.predict(&x_test)?))
        }
        None => None,
    };
    tracing::info!(
        model = %buildconfig.model_name(),
        n_train = train.len(),
        ?train_scores,
        ?test_scores,
        "Trained model"
    );

    Ok(PersistedModel {
        descriptor: buildconfig.descriptor.clone(),
        mode,
        estimator,
        metadata: ModelMetadata {
            name: buildconfig.model_name(),
            buildconfig: buildconfig.clone(),
            train_scores,
            test_scores,
            n_train: train.len(),
            created_at: Utc::now(),
            optbuild_version: env!("CARGO_PKG_VERSION").to_string(),
        },
    })
}

fn persist(model: PersistedModel, outpath: &Path, mode: ModelPersistenceMode) -> Result<BuildOutcome> {
    persist_model(&model, outpath, mode)?;
    Ok(BuildOutcome {
        path: outpath.to_path_buf(),
        n_train: model.metadata.n_train,
        train_scores: model.metadata.train_scores,
        test_scores: model.metadata.test_scores,
    })
}

/// Train on the training set, evaluate on the test set if there is one, and persist.
pub fn build_best(
    buildconfig: &BuildConfig,
    outpath: &Path,
    mode: ModelPersistenceMode,
) -> Result<BuildOutcome> {
    buildconfig.validate()?;
    let (train, test) = buildconfig.data.load_sets(buildconfig.settings.mode)?;
    let model = train_model(buildconfig, &train, test.as_ref())?;
    persist(model, outpath, mode)
}

/// Train on the training and test sets combined, and persist.
pub fn build_merged(
    buildconfig: &BuildConfig,
    outpath: &Path,
    mode: ModelPersistenceMode,
) -> Result<BuildOutcome> {
    buildconfig.validate()?;
    let merged = buildconfig.data.load_merged(buildconfig.settings.mode)?;
    let model = train_model(buildconfig, &merged, None)?;
    persist(model, outpath, mode)
}
