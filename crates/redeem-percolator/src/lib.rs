//! redeem-percolator: semi-supervised rescoring of peptide-spectrum matches.
//!
//! Implements the Percolator algorithm: a classifier is trained iteratively
//! to separate decoy PSMs from confidently identified target PSMs, and
//! `brew` wraps that training in spectrum-grouped cross-validation so every
//! PSM is scored by a model that never saw it. Held-out scores are calibrated
//! per fold and turned into target-decoy q-values.
//!
//! The linear SVM mirrors Percolator's default model; gradient boosted trees
//! are available through the `gbdt` crate.
pub mod brew;
pub mod confidence;
pub mod config;
pub mod data_handling;
pub mod error;
pub mod io;
pub mod models;
pub mod preprocessing;
pub mod psm_scorer;
pub mod stats;

pub use brew::brew;
pub use confidence::{ConfidenceLevel, PsmConfidence};
pub use config::{
    BrewConfig, ModelConfig, ModelType, PercolatorConfig, ScalerType, SearchConfig,
};
pub use data_handling::{PsmDataset, PsmMetadata};
pub use error::{PercolatorError, Result};
pub use psm_scorer::Model;
