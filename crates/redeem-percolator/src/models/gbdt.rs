use std::sync::Arc;

use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use ndarray::{Array1, Array2};

use crate::config::{ModelConfig, ModelType};
use crate::error::{PercolatorError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::utils::check_training_data;

/// Gradient Boosting Decision Tree (GBDT) classifier
#[derive(Clone)]
pub struct GBDTClassifier {
    /// Fitted ensemble and the number of features it was trained on.
    model: Option<(Arc<GBDT>, usize)>,
    params: ModelConfig,
}

impl GBDTClassifier {
    pub fn new(params: ModelConfig) -> Self {
        GBDTClassifier {
            model: None,
            params,
        }
    }

    fn to_data(x: &Array2<f64>, y: Option<&[i32]>) -> DataVec {
        let mut data = DataVec::with_capacity(x.nrows());
        for (i, row) in x.outer_iter().enumerate() {
            let features = row.iter().map(|&v| v as f32).collect::<Vec<f32>>();
            // LogLikelyhood loss expects labels in {-1, 1}
            let label = match y {
                Some(y) if y[i] == 1 => 1.0,
                Some(_) => -1.0,
                None => 0.0,
            };
            data.push(Data::new_training_data(features, 1.0, label, None));
        }
        data
    }
}

/// Raw boosting margin from a `LogLikelyhood` probability, so that 0 is the
/// decision boundary.
fn margin(p: f64) -> f64 {
    let p = p.clamp(MIN_PROBABILITY, 1.0 - MIN_PROBABILITY);
    0.5 * (p / (1.0 - p)).ln()
}

const MIN_PROBABILITY: f64 = 1e-12;

impl ClassifierModel for GBDTClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[i32]) -> Result<()> {
        check_training_data(x, y)?;
        let feature_size = x.ncols();

        match &self.params.model_type {
            ModelType::GBDT {
                max_depth,
                num_boost_round,
                debug,
                training_optimization_level,
                loss_type,
            } => {
                let mut config = Config::new();

                config.set_feature_size(feature_size);
                config.set_shrinkage(self.params.learning_rate);
                config.set_max_depth(*max_depth);
                config.set_iterations(*num_boost_round as usize);
                config.set_debug(*debug);
                config.set_training_optimization_level(*training_optimization_level);
                config.set_loss(loss_type);

                let mut gbdt = GBDT::new(&config);
                let mut train_x = Self::to_data(x, Some(y));
                gbdt.fit(&mut train_x);

                self.model = Some((Arc::new(gbdt), feature_size));
                Ok(())
            }
            other => Err(PercolatorError::Estimator(format!(
                "Expected ModelType::GBDT params, got {:?}",
                other
            ))),
        }
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (model, feature_size) = self.model.as_ref().ok_or(PercolatorError::NotTrained)?;
        if x.ncols() != *feature_size {
            return Err(PercolatorError::LengthMismatch {
                expected: *feature_size,
                found: x.ncols(),
            });
        }
        let test_x = Self::to_data(x, None);
        let predictions = model.predict(&test_x);
        Ok(predictions.into_iter().map(|p| margin(f64::from(p))).collect())
    }

    fn params(&self) -> ModelType {
        self.params.model_type.clone()
    }

    fn set_params(&mut self, params: ModelType) -> Result<()> {
        if !matches!(params, ModelType::GBDT { .. }) {
            return Err(PercolatorError::Estimator(format!(
                "Cannot apply {:?} to a GBDT classifier",
                params
            )));
        }
        self.params.model_type = params;
        self.model = None;
        Ok(())
    }

    fn boxed_clone(&self) -> Box<dyn ClassifierModel> {
        Box::new(self.clone())
    }

    fn name(&self) -> &str {
        "gbdt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gbdt_params() -> ModelConfig {
        ModelConfig {
            learning_rate: 0.1,
            model_type: ModelType::GBDT {
                max_depth: 3,
                num_boost_round: 20,
                debug: false,
                training_optimization_level: 2,
                loss_type: "LogLikelyhood".to_string(),
            },
        }
    }

    #[test]
    fn test_gbdt_classifier() {
        // 10 samples, 5 features; the label follows the sign of the second feature
        let x = Array2::from_shape_vec(
            (10, 5),
            vec![
                0.1, 1.0, 5.0, 0.2, -0.3, 0.4, -1.0, 5.0, 0.8, 0.1, 0.6, 1.0, 5.0, 1.2, 0.2, 0.9,
                -1.0, 5.0, 1.8, -0.1, 1.2, 1.0, 5.0, 2.4, 0.3, 1.5, -1.0, 5.0, 3.0, 0.0, 1.8, 1.0,
                5.0, 3.6, -0.2, 2.1, -1.0, 5.0, 4.2, 0.4, 2.4, 1.0, 5.0, 4.8, -0.1, 2.7, -1.0, 5.0,
                5.4, 0.2,
            ],
        )
        .unwrap();
        let y = vec![1, 0, 1, 0, 1, 0, 1, 0, 1, 0];

        let mut classifier = GBDTClassifier::new(gbdt_params());
        classifier.fit(&x, &y).unwrap();
        let predictions = classifier.decision_function(&x).unwrap();

        assert_eq!(predictions.len(), y.len());
        let worst_target = (0..10)
            .filter(|&i| y[i] == 1)
            .map(|i| predictions[i])
            .fold(f64::INFINITY, f64::min);
        let best_decoy = (0..10)
            .filter(|&i| y[i] == 0)
            .map(|i| predictions[i])
            .fold(f64::NEG_INFINITY, f64::max);
        assert!(worst_target > best_decoy);
        assert!(worst_target > 0.0);
        assert!(best_decoy < 0.0);
    }

    #[test]
    fn test_margin_is_centered_on_even_odds() {
        assert_eq!(margin(0.5), 0.0);
        assert!(margin(0.9) > 0.0);
        assert!(margin(0.1) < 0.0);
        assert!((margin(0.9) + margin(0.1)).abs() < 1e-12);
        assert!(margin(1.0).is_finite());
        assert!(margin(0.0).is_finite());
    }

    #[test]
    fn test_untrained_gbdt_errors() {
        let classifier = GBDTClassifier::new(gbdt_params());
        let x = Array2::zeros((2, 5));
        assert!(matches!(
            classifier.decision_function(&x),
            Err(PercolatorError::NotTrained)
        ));
    }

    #[test]
    fn test_gbdt_rejects_svm_params() {
        let mut classifier = GBDTClassifier::new(gbdt_params());
        assert!(classifier.set_params(ModelType::default()).is_err());
    }
}
