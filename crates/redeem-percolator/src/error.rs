use std::error::Error;
use std::fmt;

/// Errors raised while training Percolator models or brewing PSM confidences.
#[derive(Debug)]
pub enum PercolatorError {
    /// `decision_function`/`predict` called on a model that was never fit.
    NotTrained,
    /// The feature set at prediction time differs from the training set.
    FeatureMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    /// A feature name that is not part of the dataset.
    UnknownFeature(String),
    /// No target PSM was accepted at the requested FDR threshold.
    NoPassingPsms { fdr: f64 },
    /// Number of NaN values found in a score vector.
    NaNFound(usize),
    LengthMismatch { expected: usize, found: usize },
    InvalidDataset(String),
    InvalidFolds { folds: usize, spectra: usize },
    /// The current working labels select only one class.
    EmptyTrainingSet,
    Estimator(String),
    ThreadPool(String),
    /// Training on a cross-validation fold failed; the whole brew is aborted.
    WorkerFailure {
        fold: usize,
        source: Box<PercolatorError>,
    },
}

pub type Result<T> = std::result::Result<T, PercolatorError>;

impl fmt::Display for PercolatorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PercolatorError::NotTrained => {
                write!(f, "This model is untrained. Run fit() first.")
            }
            PercolatorError::FeatureMismatch { expected, found } => write!(
                f,
                "Features of the input data {:?} do not match the features of this model {:?}",
                found, expected
            ),
            PercolatorError::UnknownFeature(name) => {
                write!(f, "Feature '{}' is not present in the PSM dataset", name)
            }
            PercolatorError::NoPassingPsms { fdr } => {
                write!(f, "No target PSMs were found at q <= {}", fdr)
            }
            PercolatorError::NaNFound(count) => {
                write!(f, "Found {} NaN values in scores array", count)
            }
            PercolatorError::LengthMismatch { expected, found } => write!(
                f,
                "Expected an array of length {} but got length {}",
                expected, found
            ),
            PercolatorError::InvalidDataset(msg) => write!(f, "Invalid PSM dataset: {}", msg),
            PercolatorError::InvalidFolds { folds, spectra } => write!(
                f,
                "Cannot split {} spectra into {} cross-validation folds",
                spectra, folds
            ),
            PercolatorError::EmptyTrainingSet => write!(
                f,
                "Training examples must contain both positive and negative labels"
            ),
            PercolatorError::Estimator(msg) => write!(f, "Estimator error: {}", msg),
            PercolatorError::ThreadPool(msg) => {
                write!(f, "Failed to build training thread pool: {}", msg)
            }
            PercolatorError::WorkerFailure { fold, source } => {
                write!(f, "Training failed on fold {}: {}", fold, source)
            }
        }
    }
}

impl Error for PercolatorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PercolatorError::WorkerFailure { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
