use ndarray::{Array1, Array2};

use crate::config::ModelType;
use crate::error::Result;

/// A small trait abstraction for the discriminant classifiers used by the
/// Percolator trainer. Implementations must be deterministic for a given
/// input so that brewing is reproducible regardless of worker count.
pub trait ClassifierModel: Send + Sync {
    /// Fit the model. `y` is 1 for positive (target) examples and 0 for
    /// negative (decoy) examples.
    fn fit(&mut self, x: &Array2<f64>, y: &[i32]) -> Result<()>;

    /// Real-valued discriminant score; higher is more target-like.
    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Current hyper-parameters.
    fn params(&self) -> ModelType;

    /// Replace the hyper-parameters. Any fitted state is discarded.
    fn set_params(&mut self, params: ModelType) -> Result<()>;

    fn boxed_clone(&self) -> Box<dyn ClassifierModel>;

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }
}

impl Clone for Box<dyn ClassifierModel> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

impl std::fmt::Debug for dyn ClassifierModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:?})", self.name(), self.params())
    }
}
