//! Data structures and helpers for PSM collections.
//!
//! This module defines `PsmMetadata` and `PsmDataset` and contains the
//! helpers the Percolator trainer relies on: spectrum-aware fold splitting,
//! best single-feature search, FDR-driven label updates and score
//! calibration.
use std::collections::{HashMap, HashSet};

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::confidence::PsmConfidence;
use crate::error::{PercolatorError, Result};
use crate::stats::tdc;

#[derive(Debug, Clone, PartialEq)]
pub struct PsmMetadata {
    /// Spectrum id
    pub spec_id: Vec<String>,
    /// File identifier
    pub file_id: Vec<usize>,
    /// Optional peptide sequence (per-row)
    pub peptide: Option<Vec<String>>,
    /// Optional protein accessions (per-row)
    pub proteins: Option<Vec<String>>,
}

impl PsmMetadata {
    /// Metadata where every PSM comes from its own spectrum in file 0.
    pub fn from_spec_ids(spec_id: Vec<String>) -> Self {
        let n = spec_id.len();
        PsmMetadata {
            spec_id,
            file_id: vec![0; n],
            peptide: None,
            proteins: None,
        }
    }

    pub fn filter_by_indices(&self, indices: &[usize]) -> PsmMetadata {
        let pick = |values: &Vec<String>| {
            indices
                .iter()
                .map(|&i| values[i].clone())
                .collect::<Vec<_>>()
        };
        PsmMetadata {
            spec_id: pick(&self.spec_id),
            file_id: indices.iter().map(|&i| self.file_id[i]).collect(),
            peptide: self.peptide.as_ref().map(pick),
            proteins: self.proteins.as_ref().map(pick),
        }
    }

    /// Key identifying the spectrum a PSM originates from.
    pub fn spectrum_key(&self, idx: usize) -> (usize, &str) {
        (self.file_id[idx], self.spec_id[idx].as_str())
    }
}

/// The single feature that best separates targets from decoys.
#[derive(Debug, Clone, PartialEq)]
pub struct BestFeature {
    pub name: String,
    /// Number of target PSMs accepted when ranking by this feature.
    pub positives: usize,
    pub labels: Array1<i32>,
    /// `true` if higher values of the feature are better.
    pub desc: bool,
}

/// A collection of PSMs: features, target/decoy labels and spectrum metadata.
#[derive(Debug, Clone)]
pub struct PsmDataset {
    features: Array2<f64>,
    feature_names: Vec<String>,
    targets: Vec<bool>,
    metadata: PsmMetadata,
}

impl PsmDataset {
    /// Build a dataset from a feature matrix and Percolator labels
    /// (1 for targets, -1 for decoys).
    pub fn new(
        features: Array2<f64>,
        feature_names: Vec<String>,
        labels: &[i32],
        metadata: PsmMetadata,
    ) -> Result<Self> {
        let n = features.nrows();
        if labels.len() != n {
            return Err(PercolatorError::LengthMismatch {
                expected: n,
                found: labels.len(),
            });
        }
        if feature_names.len() != features.ncols() {
            return Err(PercolatorError::InvalidDataset(format!(
                "{} feature names for {} feature columns",
                feature_names.len(),
                features.ncols()
            )));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = feature_names.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(PercolatorError::InvalidDataset(format!(
                "duplicate feature name '{}'",
                dup
            )));
        }
        if metadata.spec_id.len() != n
            || metadata.file_id.len() != n
            || metadata.peptide.as_ref().map_or(false, |p| p.len() != n)
            || metadata.proteins.as_ref().map_or(false, |p| p.len() != n)
        {
            return Err(PercolatorError::InvalidDataset(
                "metadata columns must have one entry per PSM".to_string(),
            ));
        }
        if features.iter().any(|v| !v.is_finite()) {
            return Err(PercolatorError::InvalidDataset(
                "feature matrix contains non-finite values".to_string(),
            ));
        }

        let targets = labels
            .iter()
            .map(|&label| match label {
                1 => Ok(true),
                -1 => Ok(false),
                other => Err(PercolatorError::InvalidDataset(format!(
                    "labels must be 1 (target) or -1 (decoy), found {}",
                    other
                ))),
            })
            .collect::<Result<Vec<bool>>>()?;

        if !targets.iter().any(|&t| t) || targets.iter().all(|&t| t) {
            return Err(PercolatorError::InvalidDataset(
                "at least one target and one decoy PSM are required".to_string(),
            ));
        }

        Ok(PsmDataset {
            features,
            feature_names,
            targets,
            metadata,
        })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn targets(&self) -> &[bool] {
        &self.targets
    }

    pub fn metadata(&self) -> &PsmMetadata {
        &self.metadata
    }

    pub fn log_input_data_summary(&self) {
        log::info!(
            "{} target PSMs and {} decoy PSMs, {} feature columns",
            self.targets.iter().filter(|&&t| t).count(),
            self.targets.iter().filter(|&&t| !t).count(),
            self.features.ncols()
        );
    }

    /// Values of a single feature column.
    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        let idx = self
            .feature_names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| PercolatorError::UnknownFeature(name.to_string()))?;
        Ok(self.features.column(idx))
    }

    /// Feature matrix with columns arranged in the order of `names`.
    pub fn select_features(&self, names: &[String]) -> Result<Array2<f64>> {
        let indices = names
            .iter()
            .map(|name| {
                self.feature_names
                    .iter()
                    .position(|n| n == name)
                    .ok_or_else(|| PercolatorError::UnknownFeature(name.clone()))
            })
            .collect::<Result<Vec<usize>>>()?;
        Ok(self.features.select(Axis(1), &indices))
    }

    /// A new dataset holding only the given rows, in the given order.
    pub fn subset(&self, indices: &[usize]) -> PsmDataset {
        PsmDataset {
            features: self.features.select(Axis(0), indices),
            feature_names: self.feature_names.clone(),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
            metadata: self.metadata.filter_by_indices(indices),
        }
    }

    /// Row indices grouped by originating spectrum, in order of first appearance.
    pub fn spectrum_groups(&self) -> Vec<Vec<usize>> {
        let mut positions: HashMap<(usize, &str), usize> = HashMap::new();
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for row in 0..self.len() {
            let key = self.metadata.spectrum_key(row);
            let slot = *positions.entry(key).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(row);
        }
        groups
    }

    /// Split the PSMs into `folds` disjoint groups of row indices.
    ///
    /// PSMs originating from the same spectrum always land in the same fold.
    /// Spectra are shuffled with a seeded RNG and dealt round-robin, so the
    /// partition is reproducible for a given `seed`.
    pub fn split(&self, folds: usize, seed: u64) -> Result<Vec<Vec<usize>>> {
        let mut spectra = self.spectrum_groups();
        if folds < 2 || spectra.len() < folds {
            return Err(PercolatorError::InvalidFolds {
                folds,
                spectra: spectra.len(),
            });
        }

        let mut rng = StdRng::seed_from_u64(seed);
        spectra.shuffle(&mut rng);

        let mut splits = vec![Vec::new(); folds];
        for (i, rows) in spectra.into_iter().enumerate() {
            splits[i % folds].extend(rows);
        }
        for rows in splits.iter_mut() {
            rows.sort_unstable();
        }

        log::debug!(
            "Split {} PSMs into folds of sizes {:?}",
            self.len(),
            splits.iter().map(Vec::len).collect::<Vec<_>>()
        );
        Ok(splits)
    }

    /// Update labels based on scores and a specified FDR threshold.
    ///
    /// Used during model training to define positive examples: the target
    /// PSMs that fall within the FDR threshold.
    ///
    /// # Arguments
    ///
    /// * `scores` - The scores used to rank the PSMs.
    /// * `eval_fdr` - The false discovery rate threshold to use.
    /// * `desc` - Are higher scores better?
    ///
    /// # Returns
    ///
    /// An `Array1<i32>` where 1 indicates a positive example, -1 a negative
    /// example (decoy), and 0 a target above the FDR threshold that is left
    /// out of training.
    pub fn update_labels(
        &self,
        scores: &Array1<f64>,
        eval_fdr: f64,
        desc: bool,
    ) -> Result<Array1<i32>> {
        let qvals = tdc(scores, &self.targets, desc)?;
        Ok(self
            .targets
            .iter()
            .zip(qvals.iter())
            .map(|(&target, &q)| match (target, q <= eval_fdr) {
                (false, _) => -1,
                (true, true) => 1,
                (true, false) => 0,
            })
            .collect())
    }

    /// Find the feature that accepts the most targets at `eval_fdr`.
    ///
    /// Every feature is tried with higher-is-better and then lower-is-better
    /// ordering; the first strictly best candidate wins.
    pub fn find_best_feature(&self, eval_fdr: f64) -> Result<BestFeature> {
        let mut best: Option<BestFeature> = None;

        for desc in [true, false] {
            for (col, name) in self.feature_names.iter().enumerate() {
                let scores = self.features.column(col).to_owned();
                let labels = self.update_labels(&scores, eval_fdr, desc)?;
                let positives = labels.iter().filter(|&&l| l == 1).count();
                if positives > best.as_ref().map_or(0, |b| b.positives) {
                    best = Some(BestFeature {
                        name: name.clone(),
                        positives,
                        labels,
                        desc,
                    });
                }
            }
        }

        let best = best.ok_or(PercolatorError::NoPassingPsms { fdr: eval_fdr })?;
        log::trace!(
            "Best feature: {} ({}) with {} positives",
            best.name,
            if best.desc { "descending" } else { "ascending" },
            best.positives
        );
        Ok(best)
    }

    /// Calibrate scores so they are comparable across cross-validation folds.
    ///
    /// The lowest score among targets accepted at `eval_fdr` maps to 0 and the
    /// median decoy score maps to -1. If that target score does not lie above
    /// the median decoy, scores are only shifted so their order is kept.
    pub fn calibrate_scores(
        &self,
        scores: &Array1<f64>,
        eval_fdr: f64,
        desc: bool,
    ) -> Result<Array1<f64>> {
        if scores.len() != self.len() {
            return Err(PercolatorError::LengthMismatch {
                expected: self.len(),
                found: scores.len(),
            });
        }
        let scores = if desc { scores.clone() } else { -scores };
        let labels = self.update_labels(&scores, eval_fdr, true)?;

        let passing = labels
            .iter()
            .zip(scores.iter())
            .filter(|(&l, _)| l == 1)
            .map(|(_, &s)| s)
            .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.min(s))));

        let target_score = match passing {
            Some(score) => score,
            None => {
                log::warn!(
                    "No target PSMs were below the 'eval_fdr' {}; calibrating against the best target",
                    eval_fdr
                );
                self.targets
                    .iter()
                    .zip(scores.iter())
                    .filter(|(&t, _)| t)
                    .map(|(_, &s)| s)
                    .fold(f64::NEG_INFINITY, f64::max)
            }
        };

        let mut decoy_scores = labels
            .iter()
            .zip(scores.iter())
            .filter(|(&l, _)| l == -1)
            .map(|(_, &s)| s)
            .collect::<Vec<f64>>();
        if decoy_scores.is_empty() || !target_score.is_finite() {
            return Err(PercolatorError::InvalidDataset(
                "score calibration needs both target and decoy PSMs".to_string(),
            ));
        }
        let decoy_score = median(&mut decoy_scores);

        let mut scale = target_score - decoy_score;
        if !(scale > 0.0 && scale.is_finite()) {
            log::warn!(
                "Calibration target score {} does not exceed the median decoy score {}; shifting without scaling",
                target_score,
                decoy_score
            );
            scale = 1.0;
        }
        Ok(scores.mapv(|s| (s - target_score) / scale))
    }

    /// Assign confidence estimates to the PSMs from their final scores.
    pub fn assign_confidence(&self, scores: &Array1<f64>, desc: bool) -> Result<PsmConfidence> {
        PsmConfidence::new(self, scores, desc)
    }
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn small_dataset() -> PsmDataset {
        // Two spectra per file, two PSMs per spectrum.
        let features = array![
            [5.0, 0.1],
            [1.0, 0.9],
            [4.0, 0.2],
            [0.5, 0.8],
            [3.0, 0.3],
            [0.2, 0.7]
        ];
        let metadata = PsmMetadata {
            spec_id: vec!["a", "a", "b", "b", "c", "c"]
                .into_iter()
                .map(String::from)
                .collect(),
            file_id: vec![0; 6],
            peptide: None,
            proteins: None,
        };
        PsmDataset::new(
            features,
            vec!["score".to_string(), "delta".to_string()],
            &[1, -1, 1, -1, 1, -1],
            metadata,
        )
        .unwrap()
    }

    #[test]
    fn test_spectrum_groups_follow_first_appearance() {
        let psms = small_dataset();
        assert_eq!(
            psms.spectrum_groups(),
            vec![vec![0, 1], vec![2, 3], vec![4, 5]]
        );
    }

    #[test]
    fn test_update_labels_marks_decoys_negative() {
        let psms = small_dataset();
        let scores = psms.column("score").unwrap().to_owned();
        let labels = psms.update_labels(&scores, 1.0, true).unwrap();
        assert_eq!(labels.to_vec(), vec![1, -1, 1, -1, 1, -1]);
    }

    #[test]
    fn test_calibrate_scores_maps_threshold_to_zero() {
        let psms = small_dataset();
        let scores = psms.column("score").unwrap().to_owned();
        let calibrated = psms.calibrate_scores(&scores, 1.0, true).unwrap();
        // lowest passing target 3.0, median decoy 0.5
        assert!((calibrated[4] - 0.0).abs() < 1e-12);
        assert!((calibrated[3] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&mut [4.0, 1.0, 2.0, 3.0]), 2.5);
    }
}
