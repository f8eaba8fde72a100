use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::cli::{ModelOptions, PriceInputs};
use crate::data::distance::pivot_distances;
use crate::data::filter::{filter_to_targets, missing_targets};
use crate::data::join::{PERCENT_CHANGE, join};
use crate::data::loader::{
    load_distance_matrix, load_growth_table, load_price_table, load_target_zips,
};
use crate::data::model::GrowthRecord;
use crate::data::reshape::{to_long, write_long_csv};
use crate::growth::{GrowthReport, compute_growth, write_growth_csv};
use crate::report::histogram::{bin_counts, format_bin_table};
use crate::report::html::write_table;
use crate::report::plot::render_histogram;
use crate::study::{
    ModelGroup, StudyResults, add_engineered_columns, fit_all, model_catalogue, resolve_core_pois,
};

pub const SINGLE_TABLE: &str = "regression_single.html";
pub const MULTI_TABLE: &str = "regression_multi.html";
pub const RESULTS_JSON: &str = "regression_results.json";
pub const HISTOGRAM_PNG: &str = "percent_change_histogram.png";

// ---------------------------------------------------------------------------
// Stage 1: prices → growth export
// ---------------------------------------------------------------------------

/// Load, filter, reshape, compute growth and write the export.
pub fn run_growth(inputs: &PriceInputs, out: &Path) -> Result<GrowthReport> {
    let table = load_price_table(&inputs.prices)?;
    let targets = load_target_zips(&inputs.targets)?;

    let missing = missing_targets(&table, &targets);
    if !missing.is_empty() {
        log::warn!(
            "{} target ZIPs have no price series (first: {})",
            missing.len(),
            missing[0]
        );
    }

    let filtered = filter_to_targets(&table, &targets);
    if filtered.is_empty() {
        log::warn!("No target ZIP appears in {}", inputs.prices.display());
    }
    log::info!(
        "Kept {} of {} ZIP series after filtering",
        filtered.len(),
        table.len()
    );

    let long = to_long(&filtered);
    if let Some(path) = &inputs.long_out {
        write_long_csv(&long, path)?;
    }

    let report = compute_growth(&long);
    ensure_parent(out)?;
    write_growth_csv(&report.records, Some(&filtered), out)?;
    Ok(report)
}

// ---------------------------------------------------------------------------
// Stage 2: growth + distances → models and artifacts
// ---------------------------------------------------------------------------

/// Join, fit, and write every artifact into `opts.out_dir`.
pub fn run_regress(growth: &[GrowthRecord], opts: &ModelOptions) -> Result<StudyResults> {
    let entries = load_distance_matrix(&opts.distances)?;
    let distances = pivot_distances(&entries);

    let (mut frame, _summary) = join(growth, &distances);

    let core = resolve_core_pois(&distances.pois, &opts.core_pois)?;
    match &core {
        Some(core) => add_engineered_columns(&mut frame, core)?,
        None => log::warn!("Fewer than two POIs: urban core models skipped"),
    }

    let specs = model_catalogue(&distances.pois, core.is_some());
    let results = fit_all(&frame, &specs)?;

    std::fs::create_dir_all(&opts.out_dir)
        .with_context(|| format!("creating {}", opts.out_dir.display()))?;

    let single = results.group(ModelGroup::SinglePredictor);
    if !single.is_empty() {
        write_table(
            &opts.out_dir.join(SINGLE_TABLE),
            "Single-predictor models: 5-year log growth on distance",
            &single,
        )?;
    }
    let multi = results.group(ModelGroup::Multi);
    if !multi.is_empty() {
        write_table(
            &opts.out_dir.join(MULTI_TABLE),
            "Multivariate models: 5-year log growth",
            &multi,
        )?;
    }

    let json_path = opts.out_dir.join(RESULTS_JSON);
    let json = serde_json::to_string_pretty(&results).context("serialising results")?;
    std::fs::write(&json_path, json)
        .with_context(|| format!("writing {}", json_path.display()))?;

    // Histogram over the joined sample.
    let bins = bin_counts(frame.column(PERCENT_CHANGE).unwrap_or_default());
    println!("5-year percent change\n{}", format_bin_table(&bins));
    if opts.no_histogram {
        log::info!("Histogram rendering skipped");
    } else {
        let png = opts.out_dir.join(HISTOGRAM_PNG);
        render_histogram(&bins, "5-Year Home Price Change by ZIP Code", &png)
            .with_context(|| format!("rendering {}", png.display()))?;
    }

    Ok(results)
}

/// `regress` subcommand: read a growth export back in first.
pub fn run_regress_from_file(growth_path: &Path, opts: &ModelOptions) -> Result<StudyResults> {
    let growth = load_growth_table(growth_path)?;
    run_regress(&growth, opts)
}

/// `run` subcommand: both stages, handing the export over through disk.
pub fn run_all(inputs: &PriceInputs, opts: &ModelOptions) -> Result<StudyResults> {
    let growth_path: PathBuf = opts.out_dir.join("growth_metrics.csv");
    run_growth(inputs, &growth_path)?;
    run_regress_from_file(&growth_path, opts)
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display())),
        _ => Ok(()),
    }
}
