use ndarray::Array1;

use crate::error::{PercolatorError, Result};

/// Estimate q-values using target-decoy competition.
///
/// For the set of target and decoy PSMs meeting a score threshold, the false
/// discovery rate (FDR) is estimated as:
///
/// FDR = (Decoys + 1) / Targets
///
/// PSMs with tied scores share the FDR computed at the end of their tie group,
/// and the q-value of a PSM is the minimum FDR at its score or any worse score.
///
/// # Arguments
///
/// * `scores` - The scores to rank by.
/// * `target` - `true` if the entry is a target hit, `false` for a decoy.
/// * `desc` - `true` if higher scores are better.
///
/// # Returns
///
/// The estimated q-value for each entry, in the input order.
pub fn tdc(scores: &Array1<f64>, target: &[bool], desc: bool) -> Result<Array1<f64>> {
    if scores.len() != target.len() {
        return Err(PercolatorError::LengthMismatch {
            expected: target.len(),
            found: scores.len(),
        });
    }

    let nan_count = scores.iter().filter(|s| s.is_nan()).count();
    if nan_count > 0 {
        return Err(PercolatorError::NaNFound(nan_count));
    }

    if scores.is_empty() {
        return Ok(Array1::zeros(0));
    }

    let mut sorted_indices = (0..scores.len()).collect::<Vec<usize>>();
    if desc {
        sorted_indices.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    } else {
        sorted_indices.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
    }

    // Cumulative FDR at each rank
    let mut cum_targets = 0usize;
    let mut cum_decoys = 0usize;
    let fdr = sorted_indices
        .iter()
        .map(|&i| {
            if target[i] {
                cum_targets += 1;
            } else {
                cum_decoys += 1;
            }
            if cum_targets == 0 {
                1.0
            } else {
                (cum_decoys + 1) as f64 / cum_targets as f64
            }
        })
        .collect::<Vec<f64>>();

    // Boundaries of tie groups: [start, end)
    let mut groups = Vec::new();
    let mut start = 0;
    for pos in 1..=sorted_indices.len() {
        if pos == sorted_indices.len()
            || scores[sorted_indices[pos]] != scores[sorted_indices[start]]
        {
            groups.push((start, pos));
            start = pos;
        }
    }

    let mut qvals = Array1::<f64>::ones(scores.len());
    let mut min_q = 1.0f64;
    for &(start, end) in groups.iter().rev() {
        min_q = min_q.min(fdr[end - 1]);
        for &idx in &sorted_indices[start..end] {
            qvals[idx] = min_q;
        }
    }

    Ok(qvals)
}
