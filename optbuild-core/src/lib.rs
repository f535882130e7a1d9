//! # optbuild-core: hyperparameter optimization and model building
//!
//! The collaborators behind the `optbuild` command:
//!
//! - [`config`]: the two configuration variants and their loader
//! - [`optimizer`]: random search scored by cross-validation
//! - [`build`]: training the best configuration, alone or on merged data
//! - [`model_writer`]: persistence modes for trained models
//!
//! Featurization ([`descriptors`]), learning ([`estimators`]) and scoring
//! ([`metrics`]) sit underneath.

pub mod build;
pub mod config;
pub mod data;
pub mod descriptors;
pub mod error;
pub mod estimators;
pub mod metrics;
pub mod model_writer;
pub mod optimizer;

// Re-exports
pub use build::{BuildOutcome, build_best, build_merged, train_model};
pub use config::{AnyConfig, BuildConfig, ConfigLoader, ModelMode, OptimizationConfig};
pub use data::Dataset;
pub use descriptors::Descriptor;
pub use error::{OptbuildError, Result};
pub use estimators::{Algorithm, FittedEstimator};
pub use metrics::Scoring;
pub use model_writer::{
    ModelPersistenceMode, PersistedModel, load_estimator, load_model, persist_model,
};
pub use optimizer::{Study, Trial, TrialState, buildconfig_best, optimize};
