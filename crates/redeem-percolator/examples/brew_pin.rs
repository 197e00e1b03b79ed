//! Run a cross-validated Percolator analysis on a PIN file.
//!
//! Usage: cargo run --example brew_pin -- <input.pin> [config.json]
use anyhow::{anyhow, Context, Result};
use log::LevelFilter;

use redeem_percolator::config::{load_config, PercolatorConfig};
use redeem_percolator::confidence::ConfidenceLevel;
use redeem_percolator::io::percolator_pin::read_pin;
use redeem_percolator::psm_scorer::Model;

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(
            env_logger::Env::default().filter_or("REDEEM_LOG", "error,redeem_percolator=info"),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let pin_path = args
        .next()
        .ok_or_else(|| anyhow!("usage: brew_pin <input.pin> [config.json]"))?;
    let config = match args.next() {
        Some(path) => load_config(&path)?,
        None => PercolatorConfig::default(),
    };

    let psms = read_pin(&pin_path)?;
    let model = Model::from_config(&config);
    let (confidence, models) = redeem_percolator::brew(&psms, &model, &config.brew)
        .with_context(|| format!("Percolator analysis of {} failed", pin_path))?;

    for (fold, model) in models.iter().enumerate() {
        println!(
            "fold {}: positives per iteration {:?}, stable from iteration {:?}",
            fold + 1,
            model.pass_history(),
            model.converged_at()
        );
    }
    let fdr = config.brew.test_fdr;
    println!("PSMs at q<={}: {}", fdr, confidence.passing(fdr));
    for level in [ConfidenceLevel::Psms, ConfidenceLevel::Peptides] {
        if let Some(table) = confidence.level(level) {
            println!("{} at q<={}: {}", level, fdr, table.passing(fdr));
        }
    }
    Ok(())
}
