//! End-to-end tests: optimize, pick the best configuration, build and reload.

use optbuild_core::config::{AnyConfig, ConfigLoader};
use optbuild_core::{
    BuildConfig, ModelPersistenceMode, OptbuildError, build_best, build_merged, buildconfig_best,
    load_estimator, load_model, optimize,
};
use pretty_assertions::assert_eq;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const INPUTS: [&str; 12] = [
    "CCO", "CCCO", "CCCCO", "CCN", "CCCN", "CCCCN", "c1ccccc1", "c1ccccc1O", "c1ccccc1N",
    "CC(=O)O", "CCC(=O)O", "CCCC(=O)O",
];

fn write_dataset(dir: &Path, name: &str, rows: &[(&str, f64)]) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "smiles,activity").unwrap();
    for (input, response) in rows {
        writeln!(file, "{},{}", input, response).unwrap();
    }
    path
}

fn regression_rows() -> Vec<(&'static str, f64)> {
    INPUTS
        .iter()
        .map(|s| (*s, s.len() as f64 * 0.5 + s.matches('O').count() as f64))
        .collect()
}

fn write_optimization_config(dir: &Path) -> PathBuf {
    let rows = regression_rows();
    let train = write_dataset(dir, "train.csv", &rows[..9]);
    let test = write_dataset(dir, "test.csv", &rows[9..]);
    let config = serde_json::json!({
        "task": "optimization",
        "data": {
            "training_dataset_file": train,
            "test_dataset_file": test,
            "input_column": "smiles",
            "response_column": "activity"
        },
        "descriptors": [
            {"name": "HashedNgramFingerprint", "parameters": {"n": 2, "n_bits": 64}},
            {"name": "HashedNgramFingerprint", "parameters": {"n": 1, "n_bits": 32, "counts": true}}
        ],
        "algorithms": [
            {"name": "Ridge", "parameters": {"alpha": {"low": 0.01, "high": 10.0, "log": true}}},
            {"name": "Lasso", "parameters": {"alpha": {"low": 0.001, "high": 0.1, "log": true}}},
            {"name": "KNeighborsRegressor", "parameters": {"n_neighbors": {"low": 1, "high": 3}}}
        ],
        "settings": {"mode": "regression", "cross_validation": 3, "n_trials": 8, "random_seed": 7},
        "notes": "extra fields are ignored"
    });
    let path = dir.join("opt.json");
    std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    path
}

fn load(path: &Path) -> AnyConfig {
    ConfigLoader::without_env().load(path).unwrap()
}

#[test]
fn optimization_resolves_to_reported_best() {
    let dir = tempfile::tempdir().unwrap();
    let AnyConfig::Optimization(config) = load(&write_optimization_config(dir.path())) else {
        panic!("expected an optimization config");
    };

    let study = optimize(&config, "opt-study").unwrap();
    let best = study.best_trial().unwrap().clone();
    let buildconfig = buildconfig_best(&study).unwrap();

    assert_eq!(buildconfig.descriptor, best.descriptor);
    assert_eq!(buildconfig.algorithm, best.algorithm);
    let metadata = buildconfig.metadata.clone().unwrap();
    assert_eq!(Some(metadata.best_value), study.best_value());
    assert_eq!(metadata.best_trial, best.number);
    assert_eq!(metadata.name, "opt-study");
    for trial in study.completed() {
        assert!(trial.value.unwrap() <= metadata.best_value);
    }
    buildconfig.validate().unwrap();
}

#[test]
fn build_best_persists_each_mode() {
    let dir = tempfile::tempdir().unwrap();
    let AnyConfig::Optimization(config) = load(&write_optimization_config(dir.path())) else {
        panic!("expected an optimization config");
    };
    let buildconfig = buildconfig_best(&optimize(&config, "s").unwrap()).unwrap();
    let inputs: Vec<String> = INPUTS.iter().map(|s| s.to_string()).collect();

    let full = dir.path().join("out/nested/model.json");
    let outcome = build_best(&buildconfig, &full, ModelPersistenceMode::WithMetadata).unwrap();
    assert_eq!(outcome.n_train, 9);
    assert!(outcome.test_scores.is_some());
    assert!(outcome.train_scores.contains_key("neg_mean_squared_error"));
    let model = load_model(&full).unwrap();
    assert_eq!(model.metadata.buildconfig, buildconfig);
    assert_eq!(model.metadata.test_scores, outcome.test_scores);
    let expected = model.predict(&inputs).unwrap();

    let bundle = dir.path().join("model.zip");
    build_best(&buildconfig, &bundle, ModelPersistenceMode::Bundle).unwrap();
    assert_eq!(load_model(&bundle).unwrap().predict(&inputs).unwrap(), expected);

    let plain = dir.path().join("plain.json");
    build_best(&buildconfig, &plain, ModelPersistenceMode::Plain).unwrap();
    assert!(load_model(&plain).is_err());
    let estimator = load_estimator(&plain).unwrap();
    let x = buildconfig.descriptor.featurize(&inputs).unwrap();
    assert_eq!(estimator.predict(&x).unwrap(), expected);
}

#[test]
fn build_merged_trains_on_all_rows() {
    let dir = tempfile::tempdir().unwrap();
    let rows = regression_rows();
    let train = write_dataset(dir.path(), "train.csv", &rows[..8]);
    let test = write_dataset(dir.path(), "test.csv", &rows[8..]);
    let buildconfig: BuildConfig = serde_json::from_value(serde_json::json!({
        "data": {
            "training_dataset_file": train,
            "test_dataset_file": test,
            "input_column": "smiles",
            "response_column": "activity"
        },
        "descriptor": {"name": "HashedNgramFingerprint", "parameters": {"n": 2, "n_bits": 64}},
        "algorithm": {"name": "Ridge", "parameters": {"alpha": 1.0}},
        "settings": {"mode": "regression"}
    }))
    .unwrap();

    let out = dir.path().join("merged.json");
    let outcome = build_merged(&buildconfig, &out, ModelPersistenceMode::WithMetadata).unwrap();
    assert_eq!(outcome.n_train, 12);
    assert!(outcome.test_scores.is_none());
    assert_eq!(load_model(&out).unwrap().metadata.n_train, 12);
}

#[test]
fn classification_build_with_random_split() {
    let dir = tempfile::tempdir().unwrap();
    let rows: Vec<(&str, f64)> = INPUTS
        .iter()
        .map(|s| (*s, if s.contains('N') { 1.0 } else { 0.0 }))
        .collect();
    let train = write_dataset(dir.path(), "train.csv", &rows);
    let buildconfig: BuildConfig = serde_json::from_value(serde_json::json!({
        "task": "building",
        "data": {
            "training_dataset_file": train,
            "input_column": "smiles",
            "response_column": "activity",
            "split_strategy": {"name": "Random", "fraction": 0.25, "seed": 3}
        },
        "descriptor": {"name": "HashedNgramFingerprint", "parameters": {"n": 1, "n_bits": 64}},
        "algorithm": {"name": "KNeighborsClassifier", "parameters": {"n_neighbors": 3, "weights": "distance"}},
        "settings": {"mode": "classification", "scoring": "accuracy"}
    }))
    .unwrap();

    let out = dir.path().join("clf.json");
    let outcome = build_best(&buildconfig, &out, ModelPersistenceMode::WithMetadata).unwrap();
    assert_eq!(outcome.n_train, 9);
    let test_scores = outcome.test_scores.unwrap();
    for name in ["accuracy", "roc_auc", "f1"] {
        let score = test_scores[name];
        assert!((0.0..=1.0).contains(&score), "{} = {}", name, score);
    }
    let probabilities = load_model(&out)
        .unwrap()
        .predict(&["CCN".to_string()])
        .unwrap();
    assert!((0.0..=1.0).contains(&probabilities[0]));
}

#[test]
fn tampered_bundle_fails_checksum() {
    let dir = tempfile::tempdir().unwrap();
    let rows = regression_rows();
    let train = write_dataset(dir.path(), "train.csv", &rows);
    let buildconfig: BuildConfig = serde_json::from_value(serde_json::json!({
        "data": {"training_dataset_file": train, "input_column": "smiles", "response_column": "activity"},
        "descriptor": {"name": "HashedNgramFingerprint", "parameters": {"n": 1, "n_bits": 16}},
        "algorithm": {"name": "Ridge", "parameters": {"alpha": 0.1}},
        "settings": {"mode": "regression"}
    }))
    .unwrap();
    let bundle = dir.path().join("model.zip");
    build_best(&buildconfig, &bundle, ModelPersistenceMode::Bundle).unwrap();

    // Rewrite the archive with an edited model document but the original manifest.
    let mut archive = zip::ZipArchive::new(std::fs::File::open(&bundle).unwrap()).unwrap();
    let mut manifest = String::new();
    archive
        .by_name("MANIFEST.json")
        .unwrap()
        .read_to_string(&mut manifest)
        .unwrap();
    let mut document = String::new();
    archive
        .by_name("model.json")
        .unwrap()
        .read_to_string(&mut document)
        .unwrap();
    let document = document.replacen("\"intercept\": ", "\"intercept\": 1", 1);

    let tampered = dir.path().join("tampered.zip");
    let mut writer = zip::ZipWriter::new(std::fs::File::create(&tampered).unwrap());
    let options = zip::write::SimpleFileOptions::default();
    writer.start_file("MANIFEST.json", options).unwrap();
    writer.write_all(manifest.as_bytes()).unwrap();
    writer.start_file("model.json", options).unwrap();
    writer.write_all(document.as_bytes()).unwrap();
    writer.finish().unwrap();

    let err = load_model(&tampered).unwrap_err();
    assert!(matches!(err, OptbuildError::Persistence(_)), "got {err:?}");
    assert!(err.to_string().contains("checksum"));
}

#[test]
fn env_overrides_apply_with_custom_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_optimization_config(dir.path());
    // SAFETY: the prefix is unique to this test, so no other test reads it.
    unsafe { std::env::set_var("OPTBUILD_PIPELINE_TEST_SETTINGS__N_TRIALS", "3") };
    let config = ConfigLoader::with_env_prefix("OPTBUILD_PIPELINE_TEST_")
        .load(&path)
        .unwrap();
    unsafe { std::env::remove_var("OPTBUILD_PIPELINE_TEST_SETTINGS__N_TRIALS") };

    let AnyConfig::Optimization(config) = config else {
        panic!("expected an optimization config");
    };
    assert_eq!(config.settings.n_trials, 3);
    assert_eq!(config.settings.cross_validation, 3);
}

#[test]
fn env_override_of_string_field_stays_a_string() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_optimization_config(dir.path());
    // SAFETY: the prefix is unique to this test, so no other test reads it.
    unsafe { std::env::set_var("OPTBUILD_STRING_TEST_DATA__INPUT_COLUMN", "123") };
    let config = ConfigLoader::with_env_prefix("OPTBUILD_STRING_TEST_")
        .load(&path)
        .unwrap();
    unsafe { std::env::remove_var("OPTBUILD_STRING_TEST_DATA__INPUT_COLUMN") };

    let AnyConfig::Optimization(config) = config else {
        panic!("expected an optimization config");
    };
    assert_eq!(config.data.input_column, "123");
    assert_eq!(config.data.response_column, "activity");
}

#[test]
fn non_finite_precomputed_features_fail_the_build() {
    let dir = tempfile::tempdir().unwrap();
    let train = dir.path().join("train.csv");
    std::fs::write(&train, "x,y\n1 2,1.0\n2 nan,2.0\n3 4,3.0\n4 5,4.0\n").unwrap();
    let buildconfig: BuildConfig = serde_json::from_value(serde_json::json!({
        "data": {"training_dataset_file": train, "input_column": "x", "response_column": "y"},
        "descriptor": {"name": "Precomputed", "parameters": {}},
        "algorithm": {"name": "Ridge", "parameters": {"alpha": 1.0}},
        "settings": {"mode": "regression"}
    }))
    .unwrap();

    let out = dir.path().join("model.json");
    let err = build_best(&buildconfig, &out, ModelPersistenceMode::WithMetadata).unwrap_err();
    assert!(matches!(err, OptbuildError::Descriptor(_)), "got {err:?}");
    assert!(!out.exists());
}

#[test]
fn missing_config_file_is_io_error() {
    let err = ConfigLoader::without_env()
        .load(Path::new("/nonexistent/optbuild/config.json"))
        .unwrap_err();
    assert!(matches!(err, OptbuildError::Io(_)));
}
