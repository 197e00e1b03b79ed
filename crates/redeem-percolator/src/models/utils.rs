use ndarray::Array2;

use crate::error::{PercolatorError, Result};

/// Validate a training batch: one label per row, labels in {0, 1}, and both
/// classes present.
pub fn check_training_data(x: &Array2<f64>, y: &[i32]) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(PercolatorError::LengthMismatch {
            expected: x.nrows(),
            found: y.len(),
        });
    }
    if let Some(&bad) = y.iter().find(|&&l| l != 0 && l != 1) {
        return Err(PercolatorError::Estimator(format!(
            "training labels must be 0 or 1, found {}",
            bad
        )));
    }
    if !y.contains(&1) || !y.contains(&0) {
        return Err(PercolatorError::EmptyTrainingSet);
    }
    Ok(())
}
