//! Hyperparameter optimization by seeded random search.
//!
//! Each trial draws one descriptor and one algorithm from the configured
//! lists, samples the algorithm's hyperparameters, and scores the pair by
//! k-fold cross-validation on the training set. The test set is never seen.

use crate::config::{
    BuildConfig, BuildMetadata, BuildSettings, BuildTask, Direction, OptimizationConfig,
};
use crate::descriptors::Descriptor;
use crate::error::{OptbuildError, Result};
use crate::estimators::Algorithm;
use crate::metrics::CrossValidation;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Trial outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialState {
    Complete,
    Failed,
}

/// A single sampled configuration and its cross-validated score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub number: usize,
    pub descriptor: Descriptor,
    pub algorithm: Algorithm,
    pub state: TrialState,
    /// Mean cross-validation score; present only for completed trials.
    pub value: Option<f64>,
    pub cv_scores: Vec<f64>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// The record of one optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Study {
    pub name: String,
    pub direction: Direction,
    pub config: OptimizationConfig,
    pub trials: Vec<Trial>,
}

impl Study {
    /// Completed trial with the best value; the earliest wins ties.
    pub fn best_trial(&self) -> Option<&Trial> {
        self.completed().fold(None, |best: Option<&Trial>, trial| match (best, trial.value) {
            (None, Some(_)) => Some(trial),
            (Some(incumbent), Some(value)) => match incumbent.value {
                Some(current) if !self.direction.is_better(value, current) => Some(incumbent),
                _ => Some(trial),
            },
            (best, None) => best,
        })
    }

    pub fn best_value(&self) -> Option<f64> {
        self.best_trial().and_then(|t| t.value)
    }

    pub fn completed(&self) -> impl Iterator<Item = &Trial> {
        self.trials
            .iter()
            .filter(|t| t.state == TrialState::Complete)
    }

    pub fn n_failed(&self) -> usize {
        self.trials
            .iter()
            .filter(|t| t.state == TrialState::Failed)
            .count()
    }
}

/// Run the search described by `config`.
pub fn optimize(config: &OptimizationConfig, study_name: &str) -> Result<Study> {
    config.validate()?;
    let settings = &config.settings;
    let scoring = settings.effective_scoring();

    let mut rng = match settings.random_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    // Every trial sees the same folds so scores stay comparable.
    let cv = CrossValidation {
        n_folds: settings.cross_validation,
        shuffle: settings.shuffle,
        random_state: rng.gen_range(0..u64::MAX),
    };

    let train = config.data.load_training(settings.mode)?;
    tracing::info!(
        study = study_name,
        rows = train.len(),
        n_trials = settings.n_trials,
        scoring = %scoring,
        "Starting optimization"
    );

    // Featurization depends only on the descriptor, so compute each once.
    let mut features: Vec<Option<std::result::Result<Vec<Vec<f64>>, String>>> =
        vec![None; config.descriptors.len()];

    let mut trials = Vec::with_capacity(settings.n_trials);
    for number in 0..settings.n_trials {
        let descriptor_idx = rng.gen_range(0..config.descriptors.len());
        let algorithm_idx = rng.gen_range(0..config.algorithms.len());
        let descriptor = config.descriptors[descriptor_idx].clone();
        let algorithm = config.algorithms[algorithm_idx].sample(&mut rng);

        let started = Instant::now();
        let x = features[descriptor_idx]
            .get_or_insert_with(|| descriptor.featurize(&train.inputs).map_err(|e| e.to_string()));
        let outcome = match &*x {
            Ok(x) => cv
                .evaluate(x, &train.responses, &algorithm, scoring)
                .map_err(|e| e.to_string())
                .and_then(|result| {
                    if result.mean_score.is_finite() {
                        Ok(result)
                    } else {
                        Err(format!("non-finite score {}", result.mean_score))
                    }
                }),
            Err(e) => Err(e.clone()),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let trial = match outcome {
            Ok(result) => {
                tracing::info!(
                    trial = number,
                    descriptor = descriptor.name(),
                    algorithm = algorithm.name(),
                    value = result.mean_score,
                    std = result.std_score,
                    "Trial finished"
                );
                Trial {
                    number,
                    descriptor,
                    algorithm,
                    state: TrialState::Complete,
                    value: Some(result.mean_score),
                    cv_scores: result.fold_scores,
                    error: None,
                    duration_ms,
                }
            }
            Err(error) => {
                tracing::warn!(
                    trial = number,
                    descriptor = descriptor.name(),
                    algorithm = algorithm.name(),
                    %error,
                    "Trial failed"
                );
                Trial {
                    number,
                    descriptor,
                    algorithm,
                    state: TrialState::Failed,
                    value: None,
                    cv_scores: Vec::new(),
                    error: Some(error),
                    duration_ms,
                }
            }
        };
        trials.push(trial);
    }

    let study = Study {
        name: study_name.to_string(),
        direction: settings.direction,
        config: config.clone(),
        trials,
    };
    match study.best_trial() {
        Some(best) => tracing::info!(
            best_trial = best.number,
            best_value = ?best.value,
            failed = study.n_failed(),
            "Optimization finished"
        ),
        None => tracing::warn!(failed = study.n_failed(), "Optimization finished without a completed trial"),
    }
    Ok(study)
}

/// Build configuration of the study's best trial.
pub fn buildconfig_best(study: &Study) -> Result<BuildConfig> {
    let best = study.best_trial().ok_or_else(|| {
        OptbuildError::optimization(format!(
            "study '{}' has no completed trials ({} failed)",
            study.name,
            study.n_failed()
        ))
    })?;
    let best_value = best
        .value
        .ok_or_else(|| OptbuildError::optimization("best trial has no value"))?;

    let settings = &study.config.settings;
    Ok(BuildConfig {
        task: BuildTask::Building,
        data: study.config.data.clone(),
        metadata: Some(BuildMetadata {
            name: study.name.clone(),
            cross_validation: settings.cross_validation,
            shuffle: settings.shuffle,
            best_trial: best.number,
            best_value,
            n_trials: settings.n_trials,
        }),
        descriptor: best.descriptor.clone(),
        algorithm: best.algorithm.clone(),
        settings: BuildSettings {
            mode: settings.mode,
            scoring: Some(settings.effective_scoring()),
            direction: settings.direction,
            n_trials: Some(settings.n_trials),
            random_seed: settings.random_seed,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelMode;
    use crate::estimators::Weights;

    fn trial(number: usize, value: Option<f64>) -> Trial {
        Trial {
            number,
            descriptor: Descriptor::Precomputed {},
            algorithm: Algorithm::Ridge { alpha: number as f64 },
            state: if value.is_some() {
                TrialState::Complete
            } else {
                TrialState::Failed
            },
            value,
            cv_scores: Vec::new(),
            error: None,
            duration_ms: 0,
        }
    }

    fn study(direction: Direction, values: &[Option<f64>]) -> Study {
        let config: OptimizationConfig = serde_json::from_value(serde_json::json!({
            "data": {
                "training_dataset_file": "train.csv",
                "input_column": "x",
                "response_column": "y"
            },
            "descriptors": [{"name": "Precomputed", "parameters": {}}],
            "algorithms": [{"name": "Ridge", "parameters": {"alpha": {"low": 0.0, "high": 5.0}}}],
            "settings": {"mode": "regression", "n_trials": 4, "cross_validation": 3}
        }))
        .unwrap();
        Study {
            name: "study".into(),
            direction,
            config,
            trials: values
                .iter()
                .enumerate()
                .map(|(i, v)| trial(i, *v))
                .collect(),
        }
    }

    #[test]
    fn test_best_trial_maximize_prefers_earliest_tie() {
        let s = study(Direction::Maximize, &[Some(0.1), Some(0.7), None, Some(0.7)]);
        assert_eq!(s.best_trial().unwrap().number, 1);
        assert_eq!(s.best_value(), Some(0.7));
        assert_eq!(s.n_failed(), 1);
    }

    #[test]
    fn test_best_trial_minimize() {
        let s = study(Direction::Minimize, &[Some(0.5), Some(0.2), Some(0.9)]);
        assert_eq!(s.best_trial().unwrap().number, 1);
    }

    #[test]
    fn test_failed_trials_never_win() {
        let s = study(Direction::Maximize, &[None, None]);
        assert!(s.best_trial().is_none());
        let err = buildconfig_best(&s).unwrap_err();
        assert!(matches!(err, OptbuildError::Optimization(_)));
    }

    #[test]
    fn test_buildconfig_best_copies_best_trial() {
        let s = study(Direction::Maximize, &[Some(-3.0), Some(-1.0), Some(-2.0)]);
        let config = buildconfig_best(&s).unwrap();
        assert_eq!(config.algorithm, Algorithm::Ridge { alpha: 1.0 });
        assert_eq!(config.descriptor, Descriptor::Precomputed {});
        assert_eq!(config.settings.mode, ModelMode::Regression);
        assert_eq!(config.data, s.config.data);
        let metadata = config.metadata.unwrap();
        assert_eq!(metadata.best_trial, 1);
        assert_eq!(metadata.best_value, -1.0);
        assert_eq!(metadata.n_trials, 4);
        assert_eq!(metadata.cross_validation, 3);
    }

    #[test]
    fn test_optimize_on_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv");
        let mut csv = String::from("x,y\n");
        for i in 0..20 {
            csv.push_str(&format!("{} {},{}\n", i, (i * 7) % 5, 2.0 * i as f64 + 1.0));
        }
        std::fs::write(&path, csv).unwrap();

        let config: OptimizationConfig = serde_json::from_value(serde_json::json!({
            "data": {
                "training_dataset_file": path,
                "input_column": "x",
                "response_column": "y"
            },
            "descriptors": [{"name": "Precomputed", "parameters": {}}],
            "algorithms": [
                {"name": "Ridge", "parameters": {"alpha": {"low": 0.001, "high": 1.0, "log": true}}},
                {"name": "KNeighborsRegressor", "parameters": {"n_neighbors": {"low": 1, "high": 3}, "weights": ["uniform"]}}
            ],
            "settings": {"mode": "regression", "n_trials": 6, "cross_validation": 4, "shuffle": true, "random_seed": 42}
        }))
        .unwrap();

        let study = optimize(&config, "/tmp/opt.json").unwrap();
        assert_eq!(study.trials.len(), 6);
        assert_eq!(study.name, "/tmp/opt.json");
        assert!(study.trials.iter().all(|t| t.state == TrialState::Complete));
        assert!(study.trials.iter().all(|t| t.cv_scores.len() == 4));
        for trial in &study.trials {
            if let Algorithm::KNeighborsRegressor { weights, .. } = trial.algorithm {
                assert_eq!(weights, Weights::Uniform);
            }
        }

        let again = optimize(&config, "/tmp/opt.json").unwrap();
        assert_eq!(again.trials.len(), study.trials.len());
        for (a, b) in again.trials.iter().zip(&study.trials) {
            assert_eq!(a.algorithm, b.algorithm);
            assert_eq!(a.value, b.value);
        }
    }

    #[test]
    fn test_descriptor_failure_marks_trials_failed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv");
        std::fs::write(&path, "x,y\nCCO,1\nCCC,2\nCCN,3\nCO,4\n").unwrap();
        let config: OptimizationConfig = serde_json::from_value(serde_json::json!({
            "data": {"training_dataset_file": path, "input_column": "x", "response_column": "y"},
            "descriptors": [{"name": "Precomputed", "parameters": {}}],
            "algorithms": [{"name": "Ridge", "parameters": {"alpha": {"low": 1.0, "high": 1.0}}}],
            "settings": {"mode": "regression", "n_trials": 2, "cross_validation": 2, "random_seed": 0}
        }))
        .unwrap();

        let study = optimize(&config, "s").unwrap();
        assert_eq!(study.n_failed(), 2);
        assert!(study.trials[0].error.as_deref().unwrap().contains("row 1"));
        assert!(buildconfig_best(&study).is_err());
    }
}
