//! One-time hyperparameter selection by stratified cross-validation.
//!
//! The Percolator trainer runs the search on its first training iteration
//! only. The best parameter set is then applied to a fresh copy of the base
//! estimator, which is used for every remaining iteration.

use ndarray::{Array2, Axis};

use crate::config::{ModelConfig, ModelType, SearchConfig};
use crate::error::{PercolatorError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::factory::build_model;
use crate::models::utils::check_training_data;

#[derive(Debug, Clone)]
pub struct GridSearch {
    pub estimator: Box<dyn ClassifierModel>,
    pub grid: Vec<ModelType>,
    pub cv: usize,
    best_params: Option<ModelType>,
    cv_scores: Vec<f64>,
}

impl GridSearch {
    pub fn new(estimator: Box<dyn ClassifierModel>, search: SearchConfig) -> Self {
        GridSearch {
            estimator,
            grid: search.grid,
            cv: search.cv,
            best_params: None,
            cv_scores: Vec::new(),
        }
    }

    pub fn best_params(&self) -> Option<&ModelType> {
        self.best_params.as_ref()
    }

    /// Mean held-out accuracy of each grid entry from the last search.
    pub fn cv_scores(&self) -> &[f64] {
        &self.cv_scores
    }

    /// Rank every grid entry by mean held-out accuracy and return the best.
    ///
    /// Ties go to the earliest entry. When the grid is empty or the minority
    /// class is too small for two folds, the base estimator's parameters are
    /// returned unchanged.
    pub fn fit(&mut self, x: &Array2<f64>, y: &[i32]) -> Result<ModelType> {
        check_training_data(x, y)?;
        self.cv_scores.clear();

        let base = self.estimator.params();
        if self.grid.is_empty() {
            self.best_params = Some(base.clone());
            return Ok(base);
        }

        let positives = y.iter().filter(|&&l| l == 1).count();
        let minority = positives.min(y.len() - positives);
        let k = self.cv.min(minority);
        if k < 2 {
            log::warn!(
                "Too few examples ({} in the minority class) for a {}-fold grid search; keeping the base parameters.",
                minority,
                self.cv
            );
            self.best_params = Some(base.clone());
            return Ok(base);
        }

        let folds = stratified_folds(y, k);
        let mut best: Option<(usize, f64)> = None;
        for (idx, candidate) in self.grid.iter().enumerate() {
            let mut total = 0.0;
            for test in &folds {
                let mut in_test = vec![false; y.len()];
                test.iter().for_each(|&i| in_test[i] = true);
                let train = (0..y.len()).filter(|&i| !in_test[i]).collect::<Vec<_>>();

                let mut model = self.estimator.clone();
                model.set_params(candidate.clone())?;
                let y_train = train.iter().map(|&i| y[i]).collect::<Vec<i32>>();
                model.fit(&x.select(Axis(0), &train), &y_train)?;

                let scores = model.decision_function(&x.select(Axis(0), test))?;
                let correct = test
                    .iter()
                    .zip(scores.iter())
                    .filter(|(&i, &s)| (s > 0.0) == (y[i] == 1))
                    .count();
                total += correct as f64 / test.len() as f64;
            }
            let mean = total / folds.len() as f64;
            log::trace!("Grid entry {} ({:?}): mean accuracy {:.4}", idx, candidate, mean);
            self.cv_scores.push(mean);
            if best.map_or(true, |(_, score)| mean > score) {
                best = Some((idx, mean));
            }
        }

        let (idx, score) = best.ok_or_else(|| {
            PercolatorError::Estimator("grid search produced no candidates".to_string())
        })?;
        let params = self.grid[idx].clone();
        log::debug!("Selected hyperparameters {:?} (accuracy {:.4})", params, score);
        self.best_params = Some(params.clone());
        Ok(params)
    }
}

/// Deal the examples of each class round-robin into `k` folds.
fn stratified_folds(y: &[i32], k: usize) -> Vec<Vec<usize>> {
    let mut folds = vec![Vec::new(); k];
    for class in [1, 0] {
        y.iter()
            .enumerate()
            .filter(|(_, &l)| l == class)
            .enumerate()
            .for_each(|(n, (i, _))| folds[n % k].push(i));
    }
    for fold in folds.iter_mut() {
        fold.sort_unstable();
    }
    folds
}

/// The estimator wrapped by a Percolator model: either a plain classifier or
/// a grid search that resolves to one after the first iteration.
#[derive(Debug, Clone)]
pub enum Estimator {
    Direct(Box<dyn ClassifierModel>),
    Search(GridSearch),
}

impl Estimator {
    /// Build the estimator for `model`, searching over `search` if given.
    ///
    /// Grid entries for a different model type are dropped with a warning;
    /// if none remain the estimator is used directly.
    pub fn from_config(model: &ModelConfig, search: Option<&SearchConfig>) -> Self {
        let base = build_model(model.clone());
        let search = match search {
            Some(search) => search,
            None => return Estimator::Direct(base),
        };

        let kind = std::mem::discriminant(&model.model_type);
        let (grid, dropped): (Vec<ModelType>, Vec<ModelType>) = search
            .grid
            .iter()
            .cloned()
            .partition(|candidate| std::mem::discriminant(candidate) == kind);
        if !dropped.is_empty() {
            log::warn!(
                "Ignoring {} grid entries that do not match the {} model",
                dropped.len(),
                base.name()
            );
        }
        if grid.is_empty() {
            return Estimator::Direct(base);
        }
        Estimator::Search(GridSearch::new(
            base,
            SearchConfig {
                grid,
                cv: search.cv,
            },
        ))
    }

    pub fn is_search(&self) -> bool {
        matches!(self, Estimator::Search(_))
    }

    /// The underlying classifier (the base estimator for a search).
    pub fn classifier(&self) -> &dyn ClassifierModel {
        match self {
            Estimator::Direct(model) => model.as_ref(),
            Estimator::Search(search) => search.estimator.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use ndarray::Array2;

    fn separable(n: usize) -> (Array2<f64>, Vec<i32>) {
        let mut x = Array2::zeros((2 * n, 2));
        let mut y = Vec::with_capacity(2 * n);
        for i in 0..n {
            let offset = i as f64 * 0.1;
            x[[2 * i, 0]] = 2.0 + offset;
            x[[2 * i, 1]] = 1.0 - offset;
            x[[2 * i + 1, 0]] = -2.0 - offset;
            x[[2 * i + 1, 1]] = -1.0 + offset;
            y.push(1);
            y.push(0);
        }
        (x, y)
    }

    #[test]
    fn test_stratified_folds_balance_classes() {
        let y = vec![1, 1, 1, 0, 0, 0];
        let folds = stratified_folds(&y, 3);
        assert_eq!(folds, vec![vec![0, 3], vec![1, 4], vec![2, 5]]);
    }

    #[test]
    fn test_grid_search_scores_every_candidate() {
        let (x, y) = separable(12);
        let mut search = GridSearch::new(
            build_model(ModelConfig::default()),
            SearchConfig::percolator_grid(),
        );
        let best = search.fit(&x, &y).unwrap();
        assert_eq!(search.cv_scores().len(), 9);
        // Every candidate separates the classes, so the first one wins.
        assert_eq!(&best, &search.grid[0]);
        assert_eq!(search.best_params(), Some(&best));
    }

    #[test]
    fn test_grid_search_falls_back_on_tiny_minority() {
        let x = Array2::from_shape_vec((3, 1), vec![1.0, 2.0, -1.0]).unwrap();
        let y = vec![1, 1, 0];
        let mut search = GridSearch::new(
            build_model(ModelConfig::default()),
            SearchConfig::percolator_grid(),
        );
        let best = search.fit(&x, &y).unwrap();
        assert_eq!(best, ModelType::default());
        assert!(search.cv_scores().is_empty());
    }

    #[test]
    fn test_estimator_from_config() {
        let config = ModelConfig::default();
        assert!(!Estimator::from_config(&config, None).is_search());
        let search = SearchConfig::percolator_grid();
        let estimator = Estimator::from_config(&config, Some(&search));
        assert!(estimator.is_search());
        assert_eq!(estimator.classifier().name(), "linear_svm");
    }

    #[test]
    fn test_estimator_drops_grid_entries_for_other_models() {
        let gbdt = ModelConfig::new(0.1, "gbdt".parse().unwrap());
        let estimator = Estimator::from_config(&gbdt, Some(&SearchConfig::percolator_grid()));
        assert!(!estimator.is_search());
        assert_eq!(estimator.classifier().name(), "gbdt");

        let mut mixed = SearchConfig::percolator_grid();
        mixed.grid.push(gbdt.model_type.clone());
        match Estimator::from_config(&ModelConfig::default(), Some(&mixed)) {
            Estimator::Search(search) => {
                assert_eq!(search.grid.len(), 9);
                assert!(search
                    .grid
                    .iter()
                    .all(|candidate| matches!(candidate, ModelType::LinearSvm { .. })));
            }
            Estimator::Direct(_) => panic!("expected a grid search"),
        }
    }
}
