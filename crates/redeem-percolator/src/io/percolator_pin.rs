//! Percolator .pin TSV reader.
//!
//! A PIN file has one PSM per row: an identifier, a target/decoy label,
//! optional spectrum columns, the features, and finally the peptide and its
//! proteins. Proteins may spill over into extra tab-separated fields.
use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use csv::StringRecord;
use ndarray::Array2;

use crate::data_handling::{PsmDataset, PsmMetadata};

/// Configuration for reading Percolator .pin TSV files.
#[derive(Debug, Clone)]
pub struct PinReaderConfig {
    /// Column name holding target/decoy labels (1 / -1).
    pub label_column: String,
    /// Column name for PSM identifiers.
    pub spec_id_column: String,
    /// Columns that together identify the spectrum a PSM comes from. When
    /// none of them is present, the PSM identifier is used.
    pub spectrum_columns: Vec<String>,
    /// Optional column name for file id/name.
    pub file_id_column: Option<String>,
    pub peptide_column: String,
    /// Protein column; everything after it is also read as proteins.
    pub proteins_column: String,
    /// Optional list of feature columns to load (in order).
    /// When `None`, all non-metadata columns are treated as features.
    pub feature_columns: Option<Vec<String>>,
    /// Columns to ignore when auto-selecting features.
    pub ignore_columns: Vec<String>,
}

impl Default for PinReaderConfig {
    fn default() -> Self {
        Self {
            label_column: "Label".to_string(),
            spec_id_column: "SpecId".to_string(),
            spectrum_columns: vec!["ScanNr".to_string(), "ExpMass".to_string()],
            file_id_column: None,
            peptide_column: "Peptide".to_string(),
            proteins_column: "Proteins".to_string(),
            feature_columns: None,
            ignore_columns: vec![
                "SpecFile".to_string(),
                "File".to_string(),
                "FileName".to_string(),
                "FileId".to_string(),
                "ProteinId".to_string(),
            ],
        }
    }
}

/// Column positions resolved from the header row.
struct PinColumns {
    label: usize,
    spec_id: Option<usize>,
    spectrum: Vec<usize>,
    file: Option<usize>,
    peptide: Option<usize>,
    proteins: Option<usize>,
    features: Vec<usize>,
}

/// Read a Percolator .pin file into a `PsmDataset`.
pub fn read_pin<P: AsRef<Path>>(path: P) -> Result<PsmDataset> {
    read_pin_with_config(path, &PinReaderConfig::default())
}

/// Read a Percolator .pin file using a custom configuration.
pub fn read_pin_with_config<P: AsRef<Path>>(
    path: P,
    config: &PinReaderConfig,
) -> Result<PsmDataset> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_path(&path)
        .with_context(|| format!("Failed to open PIN file: {}", path.as_ref().display()))?;

    let headers = reader
        .headers()
        .context("Failed to read PIN header row")?
        .clone();
    let columns = resolve_columns(&headers, config)?;

    let mut features = Vec::new();
    let mut labels = Vec::new();
    let mut spec_ids = Vec::new();
    let mut file_ids = Vec::new();
    let mut peptides = Vec::new();
    let mut proteins = Vec::new();
    let mut file_id_map: HashMap<String, usize> = HashMap::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        // Percolator allows a second header-like row with default weights.
        let psm_id = columns.spec_id.and_then(|idx| record.get(idx)).map(str::trim);
        if psm_id.map_or(false, |id| id.eq_ignore_ascii_case("DefaultDirection")) {
            log::debug!("Skipping DefaultDirection row");
            continue;
        }

        let label = record
            .get(columns.label)
            .ok_or_else(|| anyhow!("Missing label value at row {}", row_idx + 1))?
            .trim()
            .parse::<i32>()
            .with_context(|| format!("Invalid label at row {}", row_idx + 1))?;
        labels.push(label);

        spec_ids.push(spectrum_id(&record, &columns, psm_id, row_idx));

        let file_id = match columns.file {
            Some(idx) => map_file_id(record.get(idx).unwrap_or_default(), &mut file_id_map),
            None => 0,
        };
        file_ids.push(file_id);

        if let Some(idx) = columns.peptide {
            peptides.push(record.get(idx).unwrap_or_default().trim().to_string());
        }
        if let Some(idx) = columns.proteins {
            let accessions = record
                .iter()
                .skip(idx)
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>();
            proteins.push(accessions.join(";"));
        }

        for &idx in &columns.features {
            let value = record
                .get(idx)
                .ok_or_else(|| anyhow!("Missing feature value at row {}", row_idx + 1))?;
            let parsed = value.trim().parse::<f64>().with_context(|| {
                format!(
                    "Invalid feature '{}' at row {}",
                    headers.get(idx).unwrap_or(""),
                    row_idx + 1
                )
            })?;
            features.push(parsed);
        }
    }

    let n_samples = labels.len();
    let n_features = columns.features.len();
    let x = Array2::from_shape_vec((n_samples, n_features), features)
        .context("Failed to build feature matrix")?;

    let feature_names = columns
        .features
        .iter()
        .map(|&idx| headers.get(idx).unwrap_or("").to_string())
        .collect();

    let metadata = PsmMetadata {
        spec_id: spec_ids,
        file_id: file_ids,
        peptide: columns.peptide.map(|_| peptides),
        proteins: columns.proteins.map(|_| proteins),
    };

    log::info!(
        "Read {} PSMs with {} features from {}",
        n_samples,
        n_features,
        path.as_ref().display()
    );
    let psms = PsmDataset::new(x, feature_names, &labels, metadata)
        .with_context(|| format!("Invalid PIN file: {}", path.as_ref().display()))?;
    Ok(psms)
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.trim().eq_ignore_ascii_case(name))
}

fn resolve_columns(headers: &StringRecord, config: &PinReaderConfig) -> Result<PinColumns> {
    let label = find_column(headers, &config.label_column)
        .ok_or_else(|| anyhow!("Missing label column '{}'", config.label_column))?;
    let spec_id = find_column(headers, &config.spec_id_column);
    let spectrum = config
        .spectrum_columns
        .iter()
        .filter_map(|name| find_column(headers, name))
        .collect::<Vec<_>>();
    let file = config
        .file_id_column
        .as_ref()
        .and_then(|name| find_column(headers, name));
    let peptide = find_column(headers, &config.peptide_column);
    let proteins = find_column(headers, &config.proteins_column);

    let mut reserved = vec![label];
    reserved.extend(spec_id);
    reserved.extend(spectrum.iter().copied());
    reserved.extend(file);
    reserved.extend(peptide);

    let features = match &config.feature_columns {
        Some(names) => names
            .iter()
            .map(|name| {
                find_column(headers, name)
                    .ok_or_else(|| anyhow!("Missing feature column '{}'", name))
            })
            .collect::<Result<Vec<usize>>>()?,
        None => {
            let ignore = config
                .ignore_columns
                .iter()
                .map(|name| name.to_ascii_lowercase())
                .collect::<HashSet<_>>();
            // Proteins is the last column; anything after it is overflow.
            let end = proteins.unwrap_or(headers.len());
            (0..end)
                .filter(|idx| !reserved.contains(idx))
                .filter(|&idx| {
                    let header = headers.get(idx).unwrap_or("").trim().to_ascii_lowercase();
                    !ignore.contains(&header)
                })
                .collect()
        }
    };
    if features.is_empty() {
        return Err(anyhow!("No feature columns detected in PIN header"));
    }

    Ok(PinColumns {
        label,
        spec_id,
        spectrum,
        file,
        peptide,
        proteins,
        features,
    })
}

/// Spectrum identity of a row: the spectrum columns joined by `_`, falling
/// back to the PSM identifier and then to the row number.
fn spectrum_id(
    record: &StringRecord,
    columns: &PinColumns,
    psm_id: Option<&str>,
    row_idx: usize,
) -> String {
    if !columns.spectrum.is_empty() {
        return columns
            .spectrum
            .iter()
            .map(|&idx| record.get(idx).unwrap_or_default().trim())
            .collect::<Vec<_>>()
            .join("_");
    }
    match psm_id {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => format!("row_{}", row_idx + 1),
    }
}

fn map_file_id(value: &str, map: &mut HashMap<String, usize>) -> usize {
    let key = value.trim();
    if key.is_empty() {
        return 0;
    }
    if let Some(&id) = map.get(key) {
        return id;
    }
    let next_id = map.len();
    map.insert(key.to_string(), next_id);
    next_id
}
