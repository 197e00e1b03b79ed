//! Confidence estimates for brewed PSM scores.
//!
//! Q-values are reported per PSM (over all rows) and for two deduplicated
//! levels: the best PSM per spectrum and, when peptide sequences are known,
//! the best PSM per peptide.
use std::collections::HashSet;
use std::fmt;

use ndarray::Array1;

use crate::data_handling::PsmDataset;
use crate::error::{PercolatorError, Result};
use crate::stats::tdc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfidenceLevel {
    Psms,
    Peptides,
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfidenceLevel::Psms => write!(f, "PSMs"),
            ConfidenceLevel::Peptides => write!(f, "peptides"),
        }
    }
}

/// Q-values for one deduplicated level, best entry first.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelConfidence {
    pub level: ConfidenceLevel,
    /// Dataset rows kept at this level.
    pub rows: Vec<usize>,
    pub scores: Vec<f64>,
    pub qvalues: Vec<f64>,
    pub targets: Vec<bool>,
}

impl LevelConfidence {
    fn new(
        level: ConfidenceLevel,
        rows: Vec<usize>,
        all_scores: &Array1<f64>,
        all_targets: &[bool],
        desc: bool,
    ) -> Result<Self> {
        let scores = rows.iter().map(|&r| all_scores[r]).collect::<Array1<f64>>();
        let targets = rows.iter().map(|&r| all_targets[r]).collect::<Vec<bool>>();
        let qvalues = tdc(&scores, &targets, desc)?;
        Ok(LevelConfidence {
            level,
            rows,
            scores: scores.to_vec(),
            qvalues: qvalues.to_vec(),
            targets,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of targets accepted at `fdr`.
    pub fn passing(&self, fdr: f64) -> usize {
        self.targets
            .iter()
            .zip(self.qvalues.iter())
            .filter(|(&t, &q)| t && q <= fdr)
            .count()
    }
}

/// Confidence report produced from the final brewed scores.
#[derive(Debug, Clone, PartialEq)]
pub struct PsmConfidence {
    /// Score of every PSM, in dataset order.
    pub scores: Array1<f64>,
    /// Q-value of every PSM over all rows, in dataset order.
    pub qvalues: Array1<f64>,
    pub targets: Vec<bool>,
    pub desc: bool,
    levels: Vec<LevelConfidence>,
}

impl PsmConfidence {
    pub fn new(psms: &PsmDataset, scores: &Array1<f64>, desc: bool) -> Result<Self> {
        if scores.len() != psms.len() {
            return Err(PercolatorError::LengthMismatch {
                expected: psms.len(),
                found: scores.len(),
            });
        }
        let targets = psms.targets().to_vec();
        let qvalues = tdc(scores, &targets, desc)?;

        // Rows ordered best first; ties keep dataset order.
        let mut ranked = (0..psms.len()).collect::<Vec<usize>>();
        if desc {
            ranked.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        } else {
            ranked.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
        }

        let metadata = psms.metadata();
        let mut seen_spectra = HashSet::new();
        let psm_rows = ranked
            .iter()
            .copied()
            .filter(|&r| seen_spectra.insert(metadata.spectrum_key(r)))
            .collect::<Vec<usize>>();

        let mut levels = Vec::new();
        if let Some(peptides) = &metadata.peptide {
            let mut seen_peptides = HashSet::new();
            let peptide_rows = psm_rows
                .iter()
                .copied()
                .filter(|&r| seen_peptides.insert(peptides[r].as_str()))
                .collect::<Vec<usize>>();
            levels.push(LevelConfidence::new(
                ConfidenceLevel::Psms,
                psm_rows,
                scores,
                &targets,
                desc,
            )?);
            levels.push(LevelConfidence::new(
                ConfidenceLevel::Peptides,
                peptide_rows,
                scores,
                &targets,
                desc,
            )?);
        } else {
            levels.push(LevelConfidence::new(
                ConfidenceLevel::Psms,
                psm_rows,
                scores,
                &targets,
                desc,
            )?);
        }

        Ok(PsmConfidence {
            scores: scores.clone(),
            qvalues,
            targets,
            desc,
            levels,
        })
    }

    /// Number of scored PSMs.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn level(&self, level: ConfidenceLevel) -> Option<&LevelConfidence> {
        self.levels.iter().find(|l| l.level == level)
    }

    pub fn levels(&self) -> &[LevelConfidence] {
        &self.levels
    }

    /// Accepted targets per confidence level at `fdr`.
    pub fn level_summary(&self, fdr: f64) -> Vec<(ConfidenceLevel, usize)> {
        self.levels
            .iter()
            .map(|level| (level.level, level.passing(fdr)))
            .collect()
    }

    pub fn log_summary(&self, fdr: f64) {
        for (level, passing) in self.level_summary(fdr) {
            log::info!("  - Found {} {} at q<={}.", passing, level, fdr);
        }
    }

    /// Number of target PSMs (over all rows) accepted at `fdr`.
    pub fn passing(&self, fdr: f64) -> usize {
        self.targets
            .iter()
            .zip(self.qvalues.iter())
            .filter(|(&t, &q)| t && q <= fdr)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_handling::PsmMetadata;
    use ndarray::array;

    #[test]
    fn test_levels_deduplicate_spectra_and_peptides() {
        let metadata = PsmMetadata {
            spec_id: vec!["s1", "s1", "s2", "s3"]
                .into_iter()
                .map(String::from)
                .collect(),
            file_id: vec![0; 4],
            peptide: Some(
                vec!["PEPTIDE", "DECOY", "PEPTIDE", "OTHER"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
            ),
            proteins: None,
        };
        let psms = PsmDataset::new(
            array![[1.0], [2.0], [3.0], [4.0]],
            vec!["f".to_string()],
            &[1, -1, 1, 1],
            metadata,
        )
        .unwrap();
        let scores = array![4.0, 3.0, 2.0, 1.0];
        let conf = psms.assign_confidence(&scores, true).unwrap();

        assert_eq!(conf.len(), 4);
        let psm_level = conf.level(ConfidenceLevel::Psms).unwrap();
        assert_eq!(psm_level.rows, vec![0, 2, 3]);
        let peptide_level = conf.level(ConfidenceLevel::Peptides).unwrap();
        assert_eq!(peptide_level.rows, vec![0, 3]);

        // No decoy is left at either level: q is 1/3 for PSMs, 1/2 for peptides.
        assert_eq!(
            conf.level_summary(0.4),
            vec![(ConfidenceLevel::Psms, 3), (ConfidenceLevel::Peptides, 0)]
        );
        assert_eq!(
            conf.level_summary(0.5),
            vec![(ConfidenceLevel::Psms, 3), (ConfidenceLevel::Peptides, 2)]
        );
        assert_eq!(
            conf.level_summary(0.0),
            vec![(ConfidenceLevel::Psms, 0), (ConfidenceLevel::Peptides, 0)]
        );
    }
}
