mod common;

use ndarray::{array, Array1};
use redeem_percolator::data_handling::{PsmDataset, PsmMetadata};
use redeem_percolator::error::PercolatorError;
use redeem_percolator::stats::tdc;

use common::{dataset, synthetic_psms};

#[test]
fn test_stricter_fdr_never_adds_positives() {
    let psms = synthetic_psms(200, 13);
    // A deliberately mediocre score so that q-values spread out.
    let scores = psms
        .column("score")
        .unwrap()
        .iter()
        .zip(psms.column("noise").unwrap().iter())
        .map(|(s, n)| s * 0.05 + n * 10.0)
        .collect::<Array1<f64>>();
    let qvalues = tdc(&scores, psms.targets(), true).unwrap();

    let mut previous = usize::MAX;
    for fdr in [0.5, 0.2, 0.1, 0.05, 0.01, 0.001] {
        let labels = psms.update_labels(&scores, fdr, true).unwrap();
        let positives = labels.iter().filter(|&&l| l == 1).count();
        assert!(positives <= previous);
        previous = positives;

        for (i, &label) in labels.iter().enumerate() {
            match label {
                1 => assert!(psms.targets()[i] && qvalues[i] <= fdr),
                -1 => assert!(!psms.targets()[i]),
                _ => assert!(psms.targets()[i] && qvalues[i] > fdr),
            }
        }
    }
}

#[test]
fn test_split_is_reproducible_for_a_seed() {
    let psms = synthetic_psms(40, 1);
    assert_eq!(psms.split(4, 99).unwrap(), psms.split(4, 99).unwrap());
    let folds = psms.split(4, 99).unwrap();
    assert_eq!(folds.len(), 4);
    assert!(folds.iter().all(|f| f.len() == 20));
    assert!(folds.iter().all(|f| f.windows(2).all(|w| w[0] < w[1])));
}

#[test]
fn test_split_rejects_single_fold() {
    let psms = synthetic_psms(10, 1);
    assert!(matches!(
        psms.split(1, 1),
        Err(PercolatorError::InvalidFolds { .. })
    ));
}

#[test]
fn test_find_best_feature_checks_both_directions() {
    // "low" is better when smaller.
    let psms = dataset(
        &["flat", "low"],
        &[
            vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
            vec![-3.0, 3.0, -2.0, 2.0, -1.0, 1.0],
        ],
        &[1, -1, 1, -1, 1, -1],
    );
    let best = psms.find_best_feature(0.5).unwrap();
    assert_eq!(best.name, "low");
    assert!(!best.desc);
    assert_eq!(best.positives, 3);
    assert_eq!(best.labels, array![1, -1, 1, -1, 1, -1]);
}

#[test]
fn test_find_best_feature_without_passing_psms() {
    let psms = dataset(&["f"], &[vec![1.0, 2.0]], &[1, -1]);
    assert!(matches!(
        psms.find_best_feature(0.01),
        Err(PercolatorError::NoPassingPsms { .. })
    ));
}

#[test]
fn test_calibration_is_direction_aware() {
    let psms = dataset(
        &["f"],
        &[vec![1.0, 9.0, 2.0, 8.0, 3.0, 7.0]],
        &[1, -1, 1, -1, 1, -1],
    );
    let scores = psms.column("f").unwrap().to_owned();
    let calibrated = psms.calibrate_scores(&scores, 0.5, false).unwrap();
    // Negated: passing targets -1, -2, -3 (threshold -3), median decoy -8.
    assert!((calibrated[4] - 0.0).abs() < 1e-12);
    assert!((calibrated[3] + 1.0).abs() < 1e-12);
    assert!(calibrated[0] > calibrated[4]);
}

fn assert_order_kept(raw: &Array1<f64>, calibrated: &Array1<f64>) {
    for i in 0..raw.len() {
        for j in 0..raw.len() {
            if raw[i] < raw[j] {
                assert!(
                    calibrated[i] < calibrated[j],
                    "{:?} -> {:?}",
                    raw,
                    calibrated
                );
            }
        }
    }
}

#[test]
fn test_calibration_keeps_order_when_targets_trail_decoys() {
    // No target passes at 1%, and the best target sits below the median decoy.
    let psms = dataset(&["f"], &[vec![1.0, 2.0, 5.0, 6.0, 7.0]], &[1, 1, -1, -1, -1]);
    let scores = psms.column("f").unwrap().to_owned();
    let calibrated = psms.calibrate_scores(&scores, 0.01, true).unwrap();
    assert_order_kept(&scores, &calibrated);
    assert!((calibrated[1] - 0.0).abs() < 1e-12);

    // Every target passes at 100%, so the threshold is the worst target.
    let psms = dataset(&["f"], &[vec![1.0, 9.0, 5.0, 6.0, 7.0]], &[1, 1, -1, -1, -1]);
    let scores = psms.column("f").unwrap().to_owned();
    let calibrated = psms.calibrate_scores(&scores, 1.0, true).unwrap();
    assert_order_kept(&scores, &calibrated);
    assert!((calibrated[0] - 0.0).abs() < 1e-12);
    assert_eq!(
        calibrated
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i),
        Some(1)
    );
}

#[test]
fn test_dataset_validation() {
    let metadata = PsmMetadata::from_spec_ids(vec!["a".to_string(), "b".to_string()]);
    let bad_label = PsmDataset::new(
        array![[1.0], [2.0]],
        vec!["f".to_string()],
        &[1, 0],
        metadata.clone(),
    );
    assert!(matches!(bad_label, Err(PercolatorError::InvalidDataset(_))));

    let only_targets = PsmDataset::new(
        array![[1.0], [2.0]],
        vec!["f".to_string()],
        &[1, 1],
        metadata.clone(),
    );
    assert!(only_targets.is_err());

    let nan = PsmDataset::new(
        array![[1.0], [f64::NAN]],
        vec!["f".to_string()],
        &[1, -1],
        metadata.clone(),
    );
    assert!(nan.is_err());

    let duplicate_names = PsmDataset::new(
        array![[1.0, 2.0], [2.0, 1.0]],
        vec!["f".to_string(), "f".to_string()],
        &[1, -1],
        metadata,
    );
    assert!(duplicate_names.is_err());
}
