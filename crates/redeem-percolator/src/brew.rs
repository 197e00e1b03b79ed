//! Cross-validated Percolator analysis.
//!
//! The PSMs are split into folds by spectrum. One model is trained per fold
//! on the remaining folds and scores the held-out PSMs, so no PSM is ever
//! scored by a model that saw it during training. Held-out scores are
//! calibrated per fold before being combined into one confidence estimate.

use ndarray::Array1;
use rayon::prelude::*;

use crate::config::BrewConfig;
use crate::confidence::PsmConfidence;
use crate::data_handling::PsmDataset;
use crate::error::{PercolatorError, Result};
use crate::psm_scorer::Model;

/// Analyze a collection of PSMs using the Percolator algorithm.
///
/// # Arguments
///
/// * `psms` - The PSMs to analyze.
/// * `model` - Template cloned once per fold; it is never fit itself.
/// * `config` - FDR thresholds, iterations, fold count and worker count.
///
/// # Returns
///
/// The confidence estimates for every PSM and the trained models, one per
/// fold in fold order. Scores and results do not depend on `max_workers`.
pub fn brew(
    psms: &PsmDataset,
    model: &Model,
    config: &BrewConfig,
) -> Result<(PsmConfidence, Vec<Model>)> {
    psms.log_input_data_summary();
    let test_idx = psms.split(config.folds, config.seed)?;

    let mut train_sets = Vec::with_capacity(test_idx.len());
    let mut test_sets = Vec::with_capacity(test_idx.len());
    for test in &test_idx {
        let mut held_out = vec![false; psms.len()];
        test.iter().for_each(|&i| held_out[i] = true);
        let train = (0..psms.len()).filter(|&i| !held_out[i]).collect::<Vec<_>>();
        log::trace!(
            "Preparing fold with {} training PSMs and {} test PSMs",
            train.len(),
            test.len()
        );
        train_sets.push(psms.subset(&train));
        test_sets.push(psms.subset(test));
    }

    let models = fit_folds(train_sets, model, config)?;

    let mut scores = Vec::with_capacity(psms.len());
    for (fold_model, test_set) in models.iter().zip(test_sets.iter()) {
        let fold_scores = predict(test_set, fold_model, config.test_fdr)?;
        scores.extend(fold_scores.iter().copied());
    }

    // Restore dataset row order.
    let mut ordered = Array1::<f64>::zeros(psms.len());
    for (&row, score) in test_idx.iter().flatten().zip(scores) {
        ordered[row] = score;
    }

    let confidence = psms.assign_confidence(&ordered, true)?;
    confidence.log_summary(config.test_fdr);
    report_against_best_feature(psms, &confidence, config.test_fdr);
    Ok((confidence, models))
}

/// Train one model per fold, in fold order.
fn fit_folds(
    train_sets: Vec<PsmDataset>,
    model: &Model,
    config: &BrewConfig,
) -> Result<Vec<Model>> {
    let jobs = train_sets
        .into_iter()
        .enumerate()
        .map(|(fold, train_set)| (fold, train_set, model.clone()))
        .collect::<Vec<_>>();

    if config.max_workers <= 1 {
        return jobs
            .into_iter()
            .map(|(fold, train_set, model)| fit_model(fold, &train_set, model, config))
            .collect();
    }

    let num_threads = config.max_workers.min(jobs.len());
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|i| format!("percolator-fold-{}", i))
        .build()
        .map_err(|e| PercolatorError::ThreadPool(e.to_string()))?;
    log::debug!("Training {} folds on {} threads", jobs.len(), num_threads);

    pool.install(|| {
        jobs.into_par_iter()
            .map(|(fold, train_set, model)| fit_model(fold, &train_set, model, config))
            .collect::<Result<Vec<Model>>>()
    })
}

/// Fit a fresh model copy on one fold's training PSMs.
fn fit_model(
    fold: usize,
    train_set: &PsmDataset,
    mut model: Model,
    config: &BrewConfig,
) -> Result<Model> {
    log::info!("Training model for fold {}...", fold + 1);
    model
        .fit(
            train_set,
            config.train_fdr,
            config.max_iter,
            config.direction.as_deref(),
        )
        .map_err(|source| PercolatorError::WorkerFailure {
            fold,
            source: Box::new(source),
        })?;
    Ok(model)
}

/// Calibrated scores for the held-out PSMs of one fold.
fn predict(test_set: &PsmDataset, model: &Model, test_fdr: f64) -> Result<Array1<f64>> {
    let scores = model.predict(test_set)?;
    test_set.calibrate_scores(&scores, test_fdr, true)
}

fn report_against_best_feature(psms: &PsmDataset, confidence: &PsmConfidence, test_fdr: f64) {
    let found = confidence.passing(test_fdr);
    match psms.find_best_feature(test_fdr) {
        Ok(best) if found < best.positives => log::warn!(
            "Learned model found {} PSMs at q<={}, fewer than the best feature {} ({}).",
            found,
            test_fdr,
            best.name,
            best.positives
        ),
        Ok(best) => log::info!(
            "Learned model found {} PSMs at q<={} (best feature {}: {}).",
            found,
            test_fdr,
            best.name,
            best.positives
        ),
        Err(_) => log::info!("Learned model found {} PSMs at q<={}.", found, test_fdr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelConfig, ScalerType};
    use crate::data_handling::PsmMetadata;
    use crate::models::grid_search::Estimator;
    use ndarray::Array2;

    fn psms(n_spectra: usize) -> PsmDataset {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        let mut spec_ids = Vec::new();
        for i in 0..n_spectra {
            rows.extend([5.0 + (i % 7) as f64, (i % 2) as f64]);
            labels.push(1);
            spec_ids.push(format!("scan={}", i));
            rows.extend([-5.0 - (i % 5) as f64, (i % 2) as f64]);
            labels.push(-1);
            spec_ids.push(format!("scan={}", i));
        }
        PsmDataset::new(
            Array2::from_shape_vec((2 * n_spectra, 2), rows).unwrap(),
            vec!["score".to_string(), "other".to_string()],
            &labels,
            PsmMetadata::from_spec_ids(spec_ids),
        )
        .unwrap()
    }

    #[test]
    fn test_brew_returns_one_model_per_fold() {
        let psms = psms(90);
        let model = Model::new(
            Estimator::from_config(&ModelConfig::default(), None),
            ScalerType::Standard,
        );
        let config = BrewConfig {
            train_fdr: 0.05,
            test_fdr: 0.05,
            max_iter: 2,
            ..BrewConfig::default()
        };
        let (confidence, models) = brew(&psms, &model, &config).unwrap();
        assert_eq!(models.len(), 3);
        assert!(models.iter().all(Model::is_trained));
        assert!(!model.is_trained());
        assert_eq!(confidence.len(), psms.len());
        assert_eq!(confidence.passing(0.05), 90);
        assert_eq!(
            confidence.level_summary(0.05),
            vec![(crate::confidence::ConfidenceLevel::Psms, 90)]
        );
    }
}
