//! Feature normalization applied before model fitting and prediction.
//!
//! Provides a standard scaler (per-column mean/std) and a pass-through
//! variant. A `FeatureScaler` is fit once per training run and reused at
//! prediction time.

use ndarray::{Array1, Array2, Axis};

use crate::config::ScalerType;
use crate::error::{PercolatorError, Result};

/// Simple standard scaler (per-column mean/std).
#[derive(Clone, Debug, PartialEq)]
pub struct Scaler {
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
}

impl Scaler {
    /// Columns with a smaller stddev are only centered.
    const MIN_STD: f64 = 1e-12;
}

/// Fit a `Scaler` on a matrix where rows are samples and columns are features.
pub fn fit_scaler(x: &Array2<f64>) -> Result<Scaler> {
    let mean = x.mean_axis(Axis(0)).ok_or_else(|| {
        PercolatorError::InvalidDataset("cannot fit a scaler on an empty matrix".to_string())
    })?;
    let std = x
        .std_axis(Axis(0), 0.0)
        .mapv(|s| if s < Scaler::MIN_STD { 1.0 } else { s });
    Ok(Scaler { mean, std })
}

/// Transform all rows using the provided `Scaler`.
pub fn transform_all(x: &Array2<f64>, sc: &Scaler) -> Result<Array2<f64>> {
    if x.ncols() != sc.mean.len() {
        return Err(PercolatorError::LengthMismatch {
            expected: sc.mean.len(),
            found: x.ncols(),
        });
    }
    Ok((x - &sc.mean) / &sc.std)
}

/// Feature scaler held by a model.
#[derive(Clone, Debug, PartialEq)]
pub enum FeatureScaler {
    /// Standardization; `None` until fit.
    Standard(Option<Scaler>),
    AsIs,
}

impl FeatureScaler {
    pub fn new(scaler_type: ScalerType) -> Self {
        match scaler_type {
            ScalerType::Standard => FeatureScaler::Standard(None),
            ScalerType::AsIs => FeatureScaler::AsIs,
        }
    }

    /// Fit the scaler on `x` and return the transformed matrix.
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            FeatureScaler::Standard(fitted) => {
                let sc = fit_scaler(x)?;
                let out = transform_all(x, &sc)?;
                *fitted = Some(sc);
                Ok(out)
            }
            FeatureScaler::AsIs => Ok(x.clone()),
        }
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            FeatureScaler::Standard(Some(sc)) => transform_all(x, sc),
            FeatureScaler::Standard(None) => Err(PercolatorError::NotTrained),
            FeatureScaler::AsIs => Ok(x.clone()),
        }
    }
}
