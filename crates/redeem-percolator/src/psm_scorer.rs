//! Percolator model training.
//!
//! A `Model` learns to separate decoy PSMs from high-scoring target PSMs. Each
//! iteration fits the classifier on decoys and on the targets accepted at the
//! training FDR, rescores every PSM, and redefines the positive examples from
//! the new scores.

use std::collections::HashSet;

use ndarray::{Array1, Array2, Axis};

use crate::config::{PercolatorConfig, ScalerType};
use crate::data_handling::PsmDataset;
use crate::error::{PercolatorError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::grid_search::Estimator;
use crate::preprocessing::FeatureScaler;

#[derive(Debug, Clone)]
pub struct Model {
    estimator: Estimator,
    scaler: FeatureScaler,
    /// Feature names in training order.
    features: Option<Vec<String>>,
    is_trained: bool,
    /// Positive examples found after each training iteration.
    pass_history: Vec<usize>,
}

impl Default for Model {
    /// Percolator's defaults: a linear SVM with a class-weight grid search on
    /// standardized features.
    fn default() -> Self {
        Model::from_config(&PercolatorConfig::default())
    }
}

impl Model {
    pub fn new(estimator: Estimator, scaler: ScalerType) -> Self {
        Model {
            estimator,
            scaler: FeatureScaler::new(scaler),
            features: None,
            is_trained: false,
            pass_history: Vec::new(),
        }
    }

    pub fn from_config(config: &PercolatorConfig) -> Self {
        Model::new(
            Estimator::from_config(&config.model, config.search.as_ref()),
            config.scaler,
        )
    }

    pub fn is_trained(&self) -> bool {
        self.is_trained
    }

    pub fn features(&self) -> Option<&[String]> {
        self.features.as_deref()
    }

    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    pub fn pass_history(&self) -> &[usize] {
        &self.pass_history
    }

    /// First iteration whose positive count equals the previous iteration's.
    ///
    /// Training always runs every iteration; this lets callers check whether
    /// it would have been safe to stop earlier.
    pub fn converged_at(&self) -> Option<usize> {
        (1..self.pass_history.len()).find(|&i| self.pass_history[i] == self.pass_history[i - 1])
    }

    /// Score the PSMs with the trained model. Higher is more target-like.
    ///
    /// The dataset must carry exactly the training features, in any column
    /// order.
    pub fn decision_function(&self, psms: &PsmDataset) -> Result<Array1<f64>> {
        let features = match (&self.features, self.is_trained) {
            (Some(features), true) => features,
            _ => return Err(PercolatorError::NotTrained),
        };

        let expected = features.iter().collect::<HashSet<_>>();
        let found = psms.feature_names().iter().collect::<HashSet<_>>();
        if expected != found {
            return Err(PercolatorError::FeatureMismatch {
                expected: features.clone(),
                found: psms.feature_names().to_vec(),
            });
        }

        let x = psms.select_features(features)?;
        let x = self.scaler.transform(&x)?;
        self.estimator.classifier().decision_function(&x)
    }

    /// Alias for `decision_function`.
    pub fn predict(&self, psms: &PsmDataset) -> Result<Array1<f64>> {
        self.decision_function(psms)
    }

    /// Fit the model using the Percolator algorithm.
    ///
    /// # Arguments
    ///
    /// * `psms` - The PSMs to learn from.
    /// * `train_fdr` - Maximum FDR at which a target is used as a positive example.
    /// * `max_iter` - Number of training iterations; all of them are run.
    /// * `direction` - Feature used as the initial ranking. Ignored when the
    ///   model is already trained, in which case its own scores seed training.
    ///   Defaults to the feature accepting the most PSMs at `train_fdr`. A
    ///   named feature is ranked both ways; descending wins ties.
    ///
    /// On error the model is left unchanged.
    pub fn fit(
        &mut self,
        psms: &PsmDataset,
        train_fdr: f64,
        max_iter: usize,
        direction: Option<&str>,
    ) -> Result<()> {
        if max_iter == 0 {
            return Err(PercolatorError::Estimator(
                "max_iter must be at least 1".to_string(),
            ));
        }

        log::info!("Finding initial direction...");
        let start_labels = if self.is_trained {
            let scores = self.decision_function(psms)?;
            let labels = psms.update_labels(&scores, train_fdr, true)?;
            log::info!(
                "  - The pretrained model found {} PSMs at q<={}",
                count_positives(&labels),
                train_fdr
            );
            labels
        } else if let Some(name) = direction {
            let values = psms.column(name)?.to_owned();
            let desc_labels = psms.update_labels(&values, train_fdr, true)?;
            let asc_labels = psms.update_labels(&values, train_fdr, false)?;
            let (labels, desc) = if count_positives(&desc_labels) >= count_positives(&asc_labels) {
                (desc_labels, true)
            } else {
                (asc_labels, false)
            };
            log::info!(
                "  - Using feature {} ({}) with {} PSMs at q<={}.",
                name,
                if desc { "descending" } else { "ascending" },
                count_positives(&labels),
                train_fdr
            );
            labels
        } else {
            let best = psms.find_best_feature(train_fdr)?;
            log::info!(
                "  - Selected feature {} with {} PSMs at q<={}.",
                best.name,
                best.positives,
                train_fdr
            );
            best.labels
        };

        if count_positives(&start_labels) == 0 {
            return Err(PercolatorError::NoPassingPsms { fdr: train_fdr });
        }

        // Work on copies so a failed fit leaves the model untouched.
        let mut scaler = self.scaler.clone();
        let norm_feat = scaler.fit_transform(psms.features())?;

        let mut model: Box<dyn ClassifierModel> = match &self.estimator {
            Estimator::Direct(model) => model.clone(),
            Estimator::Search(search) => {
                log::info!("Selecting hyperparameters...");
                let mut search = search.clone();
                let (cv_samples, cv_targ) = labeled_rows(&norm_feat, &start_labels);
                let best_params = search.fit(&cv_samples, &cv_targ)?;
                let mut model = search.estimator.clone();
                model.set_params(best_params.clone())?;
                log::info!("  - best parameters: {:?}", best_params);
                model
            }
        };

        let mut target = start_labels;
        let mut num_passed = Vec::with_capacity(max_iter);
        log::info!("Beginning training loop...");
        for i in 0..max_iter {
            let (samples, iter_targ) = labeled_rows(&norm_feat, &target);
            model.fit(&samples, &iter_targ)?;

            let scores = model.decision_function(&norm_feat)?;
            target = psms.update_labels(&scores, train_fdr, true)?;
            num_passed.push(count_positives(&target));
            log::info!("  - Iteration {}: {} training PSMs passed.", i, num_passed[i]);
        }

        self.scaler = scaler;
        self.estimator = Estimator::Direct(model);
        self.features = Some(psms.feature_names().to_vec());
        self.pass_history = num_passed;
        self.is_trained = true;
        log::info!("Done training.");
        Ok(())
    }
}

fn count_positives(labels: &Array1<i32>) -> usize {
    labels.iter().filter(|&&l| l == 1).count()
}

/// Rows with a nonzero working label, with labels recoded to {0, 1}.
fn labeled_rows(x: &Array2<f64>, labels: &Array1<i32>) -> (Array2<f64>, Vec<i32>) {
    let rows = labels
        .iter()
        .enumerate()
        .filter(|(_, &l)| l != 0)
        .map(|(i, _)| i)
        .collect::<Vec<usize>>();
    let y = rows.iter().map(|&i| (labels[i] + 1) / 2).collect();
    (x.select(Axis(0), &rows), y)
}
