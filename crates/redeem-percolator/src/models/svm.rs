//! Linear L2-SVM trained with a modified finite Newton method.
//!
//! Solves
//!
//! min_w 0.5 * |w|^2 + 0.5 * sum_i C[i] * max(0, 1 - y[i] * (w'x[i] + b))^2
//!
//! where `C[i]` is `c` times the class weight of example `i`. The bias `b` is
//! not regularized. Each Newton step solves the normal equations restricted to
//! the examples inside the margin (the active set), followed by step halving
//! until the objective decreases.

use ndarray::{s, Array1, Array2};

use crate::config::{ModelConfig, ModelType};
use crate::error::{PercolatorError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::utils::check_training_data;

const RELATIVE_STOP_EPS: f64 = 1e-9;
/// Keeps the bias row of the Newton system non-singular.
const BIAS_RIDGE: f64 = 1e-8;
const MIN_STEP: f64 = 1e-10;

#[derive(Debug, Clone)]
pub struct LinearSvm {
    params: ModelConfig,
    /// Feature weights followed by the bias term.
    weights: Option<Array1<f64>>,
}

impl LinearSvm {
    pub fn new(params: ModelConfig) -> Self {
        LinearSvm {
            params,
            weights: None,
        }
    }

    /// Learned feature weights and bias, if fit.
    pub fn coefficients(&self) -> Option<(Array1<f64>, f64)> {
        self.weights.as_ref().map(|w| {
            let n = w.len() - 1;
            (w.slice(s![..n]).to_owned(), w[n])
        })
    }

    fn hyper_params(&self) -> Result<(f64, (f64, f64), usize)> {
        match &self.params.model_type {
            ModelType::LinearSvm {
                c,
                class_weight,
                max_newton_iter,
            } => Ok((*c, *class_weight, *max_newton_iter)),
            other => Err(PercolatorError::Estimator(format!(
                "Expected ModelType::LinearSvm params, got {:?}",
                other
            ))),
        }
    }
}

/// Append a constant column for the bias term.
fn with_bias(x: &Array2<f64>) -> Array2<f64> {
    let mut xa = Array2::ones((x.nrows(), x.ncols() + 1));
    xa.slice_mut(s![.., ..x.ncols()]).assign(x);
    xa
}

fn objective(w: &Array1<f64>, outputs: &Array1<f64>, y: &[f64], cost: &[f64]) -> f64 {
    let n = w.len() - 1;
    let reg = 0.5 * w.slice(s![..n]).iter().map(|v| v * v).sum::<f64>();
    let loss = outputs
        .iter()
        .zip(y.iter().zip(cost.iter()))
        .map(|(&o, (&yi, &ci))| {
            let margin = 1.0 - yi * o;
            if margin > 0.0 {
                0.5 * ci * margin * margin
            } else {
                0.0
            }
        })
        .sum::<f64>();
    reg + loss
}

/// Solve `a * x = b` by Gaussian elimination with partial pivoting.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        if a[[pivot, col]].abs() < f64::MIN_POSITIVE {
            return Err(PercolatorError::Estimator(
                "singular system in SVM Newton step".to_string(),
            ));
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }
        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let tail = (row + 1..n).map(|k| a[[row, k]] * x[k]).sum::<f64>();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Ok(x)
}

impl ClassifierModel for LinearSvm {
    fn fit(&mut self, x: &Array2<f64>, y: &[i32]) -> Result<()> {
        check_training_data(x, y)?;
        let (c, (neg_weight, pos_weight), max_newton_iter) = self.hyper_params()?;

        let xa = with_bias(x);
        let n = xa.ncols();
        let labels = y
            .iter()
            .map(|&l| if l == 1 { 1.0 } else { -1.0 })
            .collect::<Vec<f64>>();
        let cost = y
            .iter()
            .map(|&l| if l == 1 { c * pos_weight } else { c * neg_weight })
            .collect::<Vec<f64>>();

        let mut w = Array1::<f64>::zeros(n);
        let mut outputs = Array1::<f64>::zeros(xa.nrows());
        let mut f = objective(&w, &outputs, &labels, &cost);

        for iter in 0..max_newton_iter {
            let active = (0..xa.nrows())
                .filter(|&i| labels[i] * outputs[i] < 1.0)
                .collect::<Vec<usize>>();
            if active.is_empty() {
                break;
            }

            // Normal equations on the active set
            let mut hessian = Array2::<f64>::eye(n);
            hessian[[n - 1, n - 1]] = BIAS_RIDGE;
            let mut rhs = Array1::<f64>::zeros(n);
            for &i in &active {
                let row = xa.row(i);
                let ci = cost[i];
                for j in 0..n {
                    rhs[j] += ci * labels[i] * row[j];
                    for k in j..n {
                        hessian[[j, k]] += ci * row[j] * row[k];
                    }
                }
            }
            for j in 0..n {
                for k in 0..j {
                    hessian[[j, k]] = hessian[[k, j]];
                }
            }
            let w_bar = solve(hessian, rhs)?;
            let direction = &w_bar - &w;

            let mut step = 1.0;
            let accepted = loop {
                let candidate = &w + &(&direction * step);
                let candidate_outputs = xa.dot(&candidate);
                let f_candidate = objective(&candidate, &candidate_outputs, &labels, &cost);
                if f_candidate < f {
                    break Some((candidate, candidate_outputs, f_candidate));
                }
                step /= 2.0;
                if step < MIN_STEP {
                    break None;
                }
            };

            let Some((w_new, outputs_new, f_new)) = accepted else {
                log::trace!("L2-SVM converged (no descent) after {} iterations", iter);
                break;
            };

            let improvement = f - f_new;
            w = w_new;
            outputs = outputs_new;
            f = f_new;
            if improvement < RELATIVE_STOP_EPS * f.abs() {
                log::trace!(
                    "L2-SVM converged (relative improvement) in {} iterations",
                    iter + 1
                );
                break;
            }
        }

        log::trace!("L2-SVM objective = {}", f);
        self.weights = Some(w);
        Ok(())
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let w = self.weights.as_ref().ok_or(PercolatorError::NotTrained)?;
        let n = w.len() - 1;
        if x.ncols() != n {
            return Err(PercolatorError::LengthMismatch {
                expected: n,
                found: x.ncols(),
            });
        }
        Ok(x.dot(&w.slice(s![..n])) + w[n])
    }

    fn params(&self) -> ModelType {
        self.params.model_type.clone()
    }

    fn set_params(&mut self, params: ModelType) -> Result<()> {
        if !matches!(params, ModelType::LinearSvm { .. }) {
            return Err(PercolatorError::Estimator(format!(
                "Cannot apply {:?} to a linear SVM",
                params
            )));
        }
        self.params.model_type = params;
        self.weights = None;
        Ok(())
    }

    fn boxed_clone(&self) -> Box<dyn ClassifierModel> {
        Box::new(self.clone())
    }

    fn name(&self) -> &str {
        "linear_svm"
    }
}
