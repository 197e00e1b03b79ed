use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Central configuration for models in the crate.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Shrinkage used by boosted models; ignored by the linear SVM.
    pub learning_rate: f32,

    #[serde(flatten)]
    pub model_type: ModelType,
}

/// Supported model types and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum ModelType {
    /// Linear L2-SVM as used by Percolator.
    LinearSvm {
        c: f64,
        /// Per-class cost multipliers, `(decoy, target)`.
        class_weight: (f64, f64),
        max_newton_iter: usize,
    },
    GBDT {
        max_depth: u32,
        num_boost_round: u32,
        debug: bool,
        training_optimization_level: u8,
        loss_type: String,
    },
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::LinearSvm {
            c: 1.0,
            class_weight: (1.0, 1.0),
            max_newton_iter: 50,
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "svm" | "linear_svm" => Ok(ModelType::default()),
            "gbdt" => Ok(ModelType::GBDT {
                max_depth: 6,
                num_boost_round: 3,
                debug: false,
                training_optimization_level: 2,
                loss_type: "LogLikelyhood".to_string(),
            }),
            _ => Err(format!(
                "Unknown model type: {}. Valid options are: svm, gbdt",
                s
            )),
        }
    }
}

impl ModelConfig {
    pub fn new(learning_rate: f32, model_type: ModelType) -> Self {
        Self {
            learning_rate,
            model_type,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            model_type: ModelType::default(),
        }
    }
}

/// Hyperparameter grid searched once before the Percolator iterations.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Candidate parameter sets; entries for another model type are ignored.
    pub grid: Vec<ModelType>,
    /// Number of stratified cross-validation folds used to rank candidates.
    pub cv: usize,
}

impl SearchConfig {
    /// The class-weight grid Percolator searches for its linear SVM.
    pub fn percolator_grid() -> Self {
        let weights = [0.1, 1.0, 10.0];
        let grid = weights
            .iter()
            .flat_map(|&neg| {
                weights.iter().map(move |&pos| ModelType::LinearSvm {
                    c: 1.0,
                    class_weight: (neg, pos),
                    max_newton_iter: 50,
                })
            })
            .collect();
        Self { grid, cv: 3 }
    }
}

/// How features are normalized before fitting and prediction.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScalerType {
    /// Subtract the mean and scale to unit variance.
    #[default]
    Standard,
    /// Leave features in their original scale.
    AsIs,
}

/// Parameters of a cross-validated brew.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BrewConfig {
    /// FDR threshold defining positive examples during training.
    pub train_fdr: f64,
    /// FDR threshold used to calibrate held-out scores.
    pub test_fdr: f64,
    pub max_iter: usize,
    /// Number of cross-validation folds. PSMs from one spectrum share a fold.
    pub folds: usize,
    /// Worker threads for fold training; values above `folds` add nothing.
    pub max_workers: usize,
    /// Seed for shuffling spectra into folds.
    pub seed: u64,
    /// Optional feature used as the initial ranking direction.
    pub direction: Option<String>,
}

impl Default for BrewConfig {
    fn default() -> Self {
        Self {
            train_fdr: 0.01,
            test_fdr: 0.01,
            max_iter: 10,
            folds: 3,
            max_workers: 1,
            seed: 1,
            direction: None,
        }
    }
}

/// Full configuration of a Percolator run.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PercolatorConfig {
    pub model: ModelConfig,
    /// When set, the model is wrapped in a one-time grid search.
    pub search: Option<SearchConfig>,
    pub scaler: ScalerType,
    pub brew: BrewConfig,
}

impl Default for PercolatorConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            search: Some(SearchConfig::percolator_grid()),
            scaler: ScalerType::Standard,
            brew: BrewConfig::default(),
        }
    }
}

/// Load a Percolator configuration from a JSON file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PercolatorConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: PercolatorConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(config)
}
