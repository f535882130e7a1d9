//! Property-based tests for the configuration schema and scorers using proptest.

use proptest::prelude::*;

use optbuild_core::config::{
    BuildMetadata, BuildSettings, BuildTask, DataConfig, Deduplication, Direction, SplitStrategy,
};
use optbuild_core::estimators::Weights;
use optbuild_core::{Algorithm, BuildConfig, Descriptor, ModelMode, Scoring};

fn finite() -> impl Strategy<Value = f64> {
    -1e6f64..1e6
}

fn descriptor() -> impl Strategy<Value = Descriptor> {
    let leaf = prop_oneof![
        (1usize..6, 1usize..4096, any::<bool>()).prop_map(|(n, n_bits, counts)| {
            Descriptor::HashedNgramFingerprint { n, n_bits, counts }
        }),
        Just(Descriptor::Precomputed {}),
    ];
    leaf.prop_recursive(2, 6, 3, |inner| {
        prop::collection::vec(inner, 1..3).prop_map(|descriptors| Descriptor::Composite { descriptors })
    })
}

fn weights() -> impl Strategy<Value = Weights> {
    prop_oneof![Just(Weights::Uniform), Just(Weights::Distance)]
}

fn algorithm_and_mode() -> impl Strategy<Value = (Algorithm, ModelMode)> {
    prop_oneof![
        (0.0f64..100.0).prop_map(|alpha| (Algorithm::Ridge { alpha }, ModelMode::Regression)),
        (0.0f64..100.0).prop_map(|alpha| (Algorithm::Lasso { alpha }, ModelMode::Regression)),
        (1usize..50, weights()).prop_map(|(n_neighbors, weights)| (
            Algorithm::KNeighborsRegressor {
                n_neighbors,
                weights
            },
            ModelMode::Regression
        )),
        (1e-4f64..100.0).prop_map(|c| (
            Algorithm::LogisticRegression { c },
            ModelMode::Classification
        )),
        (1usize..50, weights()).prop_map(|(n_neighbors, weights)| (
            Algorithm::KNeighborsClassifier {
                n_neighbors,
                weights
            },
            ModelMode::Classification
        )),
    ]
}

fn metadata() -> impl Strategy<Value = Option<BuildMetadata>> {
    prop::option::of(
        ("[a-z/]{1,20}", 2usize..10, any::<bool>(), 0usize..100, finite(), 1usize..100).prop_map(
            |(name, cross_validation, shuffle, best_trial, best_value, n_trials)| BuildMetadata {
                name,
                cross_validation,
                shuffle,
                best_trial,
                best_value,
                n_trials,
            },
        ),
    )
}

fn buildconfig() -> impl Strategy<Value = BuildConfig> {
    (
        descriptor(),
        algorithm_and_mode(),
        metadata(),
        prop::option::of(any::<u64>()),
        prop::option::of("[a-z]{1,8}\\.csv"),
    )
        .prop_map(|(descriptor, (algorithm, mode), metadata, random_seed, test_file)| {
            BuildConfig {
                task: BuildTask::Building,
                data: DataConfig {
                    training_dataset_file: "train.csv".into(),
                    input_column: "smiles".into(),
                    response_column: "activity".into(),
                    test_dataset_file: test_file.map(Into::into),
                    split_strategy: SplitStrategy::NoSplit,
                    deduplication_strategy: Deduplication::KeepFirst,
                    delimiter: ';',
                },
                metadata,
                descriptor,
                algorithm,
                settings: BuildSettings {
                    mode,
                    scoring: Some(Scoring::default_for(mode)),
                    direction: Direction::Maximize,
                    n_trials: None,
                    random_seed,
                },
            }
        })
}

// --- Build config JSON properties ---

proptest! {
    #[test]
    fn buildconfig_json_roundtrips(config in buildconfig()) {
        let text = serde_json::to_string_pretty(&config).unwrap();
        let reparsed: BuildConfig = serde_json::from_str(&text).unwrap();
        prop_assert_eq!(reparsed, config);
    }

    #[test]
    fn generated_buildconfigs_validate(config in buildconfig()) {
        prop_assert!(config.validate().is_ok());
    }
}

// --- Scorer properties ---

proptest! {
    #[test]
    fn classification_scores_are_bounded(
        rows in prop::collection::vec((any::<bool>(), 0.0f64..=1.0), 1..60)
    ) {
        let y_true: Vec<f64> = rows.iter().map(|(t, _)| if *t { 1.0 } else { 0.0 }).collect();
        let y_prob: Vec<f64> = rows.iter().map(|(_, p)| *p).collect();
        for scoring in Scoring::CLASSIFICATION {
            let score = scoring.score(&y_true, &y_prob);
            prop_assert!((0.0..=1.0).contains(&score), "{} = {}", scoring, score);
        }
    }

    #[test]
    fn perfect_regression_scores_best(y in prop::collection::vec(finite(), 1..60)) {
        prop_assert_eq!(Scoring::R2.score(&y, &y), 1.0);
        prop_assert_eq!(Scoring::NegMeanSquaredError.score(&y, &y), 0.0);
        prop_assert_eq!(Scoring::NegMeanAbsoluteError.score(&y, &y), 0.0);
    }

    #[test]
    fn regression_errors_are_never_positive(
        pairs in prop::collection::vec((finite(), finite()), 1..60)
    ) {
        let (y_true, y_pred): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
        prop_assert!(Scoring::NegMeanSquaredError.score(&y_true, &y_pred) <= 0.0);
        prop_assert!(Scoring::NegMeanAbsoluteError.score(&y_true, &y_pred) <= 0.0);
        prop_assert!(Scoring::R2.score(&y_true, &y_pred) <= 1.0);
    }
}

// --- Descriptor properties ---

proptest! {
    #[test]
    fn fingerprint_width_is_fixed(
        inputs in prop::collection::vec(".{0,30}", 1..20),
        n in 1usize..5,
        n_bits in 1usize..512,
    ) {
        let d = Descriptor::HashedNgramFingerprint { n, n_bits, counts: false };
        let x = d.featurize(&inputs).unwrap();
        prop_assert_eq!(x.len(), inputs.len());
        for row in &x {
            prop_assert_eq!(row.len(), n_bits);
        }
    }
}
