//! The optbuild driver: load a configuration, resolve it to a build
//! configuration, and write whichever artifacts were requested.

use anyhow::Context;
use clap::Parser;
use optbuild_core::config::{AnyConfig, ConfigLoader};
use optbuild_core::{BuildConfig, ModelPersistenceMode, build_best, build_merged};
use std::path::{Path, PathBuf};

/// optbuild: Optimize hyper-parameters and build (train) the best model.
#[derive(Parser, Debug)]
#[command(name = "optbuild", version, about, long_about = None)]
pub struct Cli {
    /// Path to input configuration file (JSON): either Optimization
    /// configuration, or Build (training) configuration
    #[arg(long)]
    pub config: PathBuf,

    /// Path where to write Json of the best build configuration
    #[arg(long)]
    pub best_buildconfig_outpath: Option<PathBuf>,

    /// Path where to write (persist) the best model
    #[arg(long)]
    pub best_model_outpath: Option<PathBuf>,

    /// Path where to write (persist) the model trained on merged train+test data
    #[arg(long)]
    pub merged_model_outpath: Option<PathBuf>,

    /// Model persistence mode: plain estimator, model with metadata, or zip bundle
    #[arg(long, value_enum, default_value_t = PersistenceModeArg::WithMetadata)]
    pub model_persistence_mode: PersistenceModeArg,

    /// Ignore OPTBUILD_* environment overrides and the .env file
    #[arg(long)]
    pub no_env: bool,

    /// Also write JSON logs (daily rolling `optbuild.log`) into this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Command-line spelling of [`ModelPersistenceMode`].
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceModeArg {
    #[value(name = "plain")]
    Plain,
    #[value(name = "with_metadata")]
    WithMetadata,
    #[value(name = "bundle")]
    Bundle,
}

impl From<PersistenceModeArg> for ModelPersistenceMode {
    fn from(arg: PersistenceModeArg) -> Self {
        match arg {
            PersistenceModeArg::Plain => Self::Plain,
            PersistenceModeArg::WithMetadata => Self::WithMetadata,
            PersistenceModeArg::Bundle => Self::Bundle,
        }
    }
}

/// Run the driver. Returns the resolved build configuration.
pub fn run(cli: &Cli) -> anyhow::Result<BuildConfig> {
    let loader = if cli.no_env {
        ConfigLoader::without_env()
    } else {
        ConfigLoader::new()
    };
    let config = loader
        .load(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;

    let buildconfig = resolve_buildconfig(config, &cli.config)?;
    let mode = ModelPersistenceMode::from(cli.model_persistence_mode);

    if let Some(path) = &cli.best_buildconfig_outpath {
        write_buildconfig(&buildconfig, path)?;
    }
    if let Some(path) = &cli.best_model_outpath {
        let outcome = build_best(&buildconfig, path, mode)
            .with_context(|| format!("Failed to build best model at {}", path.display()))?;
        tracing::info!(
            path = %outcome.path.display(),
            test_scores = ?outcome.test_scores,
            "Best model written"
        );
    }
    if let Some(path) = &cli.merged_model_outpath {
        let outcome = build_merged(&buildconfig, path, mode)
            .with_context(|| format!("Failed to build merged model at {}", path.display()))?;
        tracing::info!(
            path = %outcome.path.display(),
            n_train = outcome.n_train,
            "Merged model written"
        );
    }

    Ok(buildconfig)
}

/// Turn either configuration variant into a build configuration.
///
/// An optimization config runs the optimizer under a study named after the
/// config file's absolute path; a build config passes through unchanged.
pub fn resolve_buildconfig(config: AnyConfig, config_path: &Path) -> anyhow::Result<BuildConfig> {
    match config {
        AnyConfig::Optimization(optconfig) => {
            let study_name = std::path::absolute(config_path)
                .with_context(|| format!("Cannot resolve {}", config_path.display()))?
                .display()
                .to_string();
            let study = optbuild_core::optimize(&optconfig, &study_name)
                .with_context(|| format!("Optimization of {} failed", study_name))?;
            Ok(optbuild_core::buildconfig_best(&study)?)
        }
        AnyConfig::Build(buildconfig) => {
            tracing::info!(model = %buildconfig.model_name(), "Using build configuration as given");
            Ok(buildconfig)
        }
    }
}

/// Write `buildconfig` as two-space indented JSON, creating parent directories.
pub fn write_buildconfig(buildconfig: &BuildConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(buildconfig)?;
    std::fs::write(path, json)
        .with_context(|| format!("Cannot write build configuration to {}", path.display()))?;
    tracing::info!(path = %path.display(), "Best build configuration written");
    Ok(())
}
