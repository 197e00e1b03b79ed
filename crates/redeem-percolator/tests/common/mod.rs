#![allow(dead_code)]

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use redeem_percolator::data_handling::{PsmDataset, PsmMetadata};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One target and one decoy PSM per spectrum.
///
/// "score" separates the classes with a wide gap (targets in [20, 30),
/// decoys in [-10, 0)); "noise" is shared by both PSMs of a spectrum and
/// carries no class information.
pub fn synthetic_psms(n_spectra: usize, seed: u64) -> PsmDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(4 * n_spectra);
    let mut labels = Vec::with_capacity(2 * n_spectra);
    let mut spec_ids = Vec::with_capacity(2 * n_spectra);
    let mut peptides = Vec::with_capacity(2 * n_spectra);

    for i in 0..n_spectra {
        let noise: f64 = rng.gen();
        let target_score = 20.0 + 10.0 * rng.gen::<f64>();
        let decoy_score = -10.0 * rng.gen::<f64>();

        rows.extend([target_score, noise]);
        labels.push(1);
        spec_ids.push(format!("scan={}", i));
        peptides.push(format!("PEPTIDE{}K", i));

        rows.extend([decoy_score, noise]);
        labels.push(-1);
        spec_ids.push(format!("scan={}", i));
        peptides.push(format!("KEDITPEP{}", i));
    }

    let metadata = PsmMetadata {
        spec_id: spec_ids,
        file_id: vec![0; 2 * n_spectra],
        peptide: Some(peptides),
        proteins: None,
    };
    PsmDataset::new(
        Array2::from_shape_vec((2 * n_spectra, 2), rows).unwrap(),
        vec!["score".to_string(), "noise".to_string()],
        &labels,
        metadata,
    )
    .unwrap()
}

/// Build a dataset with one PSM per spectrum from explicit columns.
pub fn dataset(feature_names: &[&str], columns: &[Vec<f64>], labels: &[i32]) -> PsmDataset {
    let n = labels.len();
    let mut features = Array2::zeros((n, columns.len()));
    for (j, column) in columns.iter().enumerate() {
        for (i, &value) in column.iter().enumerate() {
            features[[i, j]] = value;
        }
    }
    PsmDataset::new(
        features,
        feature_names.iter().map(|s| s.to_string()).collect(),
        labels,
        PsmMetadata::from_spec_ids((0..n).map(|i| format!("scan={}", i)).collect()),
    )
    .unwrap()
}
