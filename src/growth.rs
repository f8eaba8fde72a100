use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};

use crate::data::model::{GrowthRecord, MetadataValue, PriceObservation, PriceTable};

/// Calendar months between the start and end observation of the growth window.
pub const GROWTH_WINDOW_MONTHS: usize = 60;

/// Why a ZIP has no growth figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    /// History starts after the first month of the window.
    ShortSeries,
    MissingPrice,
    NonPositivePrice,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exclusion::ShortSeries => write!(f, "short series"),
            Exclusion::MissingPrice => write!(f, "missing endpoint price"),
            Exclusion::NonPositivePrice => write!(f, "non-positive endpoint price"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GrowthReport {
    /// Included ZIPs, in ZIP order.
    pub records: Vec<GrowthRecord>,
    pub excluded: Vec<(String, Exclusion)>,
}

impl GrowthReport {
    pub fn exclusion_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for (_, reason) in &self.excluded {
            *counts.entry(reason.to_string()).or_insert(0) += 1;
        }
        counts
    }
}

/// Compute 5-year log growth per ZIP from the long table.
///
/// For each ZIP the end point is its most recent month and the start point
/// is the observation exactly [`GROWTH_WINDOW_MONTHS`] calendar months
/// earlier. Repeated months of one ZIP keep the first observation.
pub fn compute_growth(observations: &[PriceObservation]) -> GrowthReport {
    let mut by_zip: BTreeMap<&str, Vec<&PriceObservation>> = BTreeMap::new();
    for obs in observations {
        by_zip.entry(obs.region_name.as_str()).or_default().push(obs);
    }

    let mut report = GrowthReport::default();
    for (zip, mut series) in by_zip {
        // Stable: a repeated row for the same ZIP loses to the first one.
        series.sort_by_key(|o| o.date);
        let before = series.len();
        series.dedup_by_key(|o| o.date);
        if series.len() < before {
            log::warn!(
                "{zip}: {} duplicate monthly observations, keeping the first row",
                before - series.len()
            );
        }
        match growth_for(&series) {
            Ok(record) => report.records.push(record),
            Err(reason) => {
                log::debug!("{zip}: excluded ({reason})");
                report.excluded.push((zip.to_string(), reason));
            }
        }
    }

    log::info!(
        "Computed growth for {} ZIPs, excluded {} {:?}",
        report.records.len(),
        report.excluded.len(),
        report.exclusion_counts()
    );
    report
}

fn growth_for(series: &[&PriceObservation]) -> std::result::Result<GrowthRecord, Exclusion> {
    let (Some(first), Some(end)) = (series.first(), series.last()) else {
        return Err(Exclusion::ShortSeries);
    };
    let month = |d: NaiveDate| d.year() * 12 + d.month0() as i32;
    let start_month = month(end.date) - GROWTH_WINDOW_MONTHS as i32;
    if month(first.date) > start_month {
        return Err(Exclusion::ShortSeries);
    }
    // A month absent from the date axis counts as a missing start price.
    let Some(start) = series.iter().find(|o| month(o.date) == start_month) else {
        return Err(Exclusion::MissingPrice);
    };

    let (Some(p0), Some(p1)) = (start.price, end.price) else {
        return Err(Exclusion::MissingPrice);
    };
    if p0 <= 0.0 || p1 <= 0.0 {
        return Err(Exclusion::NonPositivePrice);
    }

    let log_initial_price = p0.ln();
    Ok(GrowthRecord {
        region_name: end.region_name.clone(),
        start_date: Some(start.date),
        end_date: Some(end.date),
        start_price: Some(p0),
        end_price: Some(p1),
        log_initial_price: Some(log_initial_price),
        growth_5yr: Some(p1.ln() - log_initial_price),
        percent_change: Some((p1 / p0 - 1.0) * 100.0),
    })
}

/// Write the growth export.
///
/// Identifier columns of the price table (City, State, Metro, ...) are
/// appended after the metrics when `table` is given.
pub fn write_growth_csv(
    records: &[GrowthRecord],
    table: Option<&PriceTable>,
    path: &Path,
) -> Result<()> {
    let meta_columns: &[String] = table
        .map(|t| t.metadata_columns.as_slice())
        .unwrap_or_default();
    let metadata: BTreeMap<&str, &BTreeMap<String, MetadataValue>> = table
        .map(|t| {
            t.series
                .iter()
                .map(|s| (s.region_name.as_str(), &s.metadata))
                .collect()
        })
        .unwrap_or_default();

    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;

    let mut header: Vec<String> = [
        "RegionName",
        "StartDate",
        "EndDate",
        "StartPrice",
        "EndPrice",
        "log_initial_price",
        "growth_5yr",
        "percent_change",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    header.extend(meta_columns.iter().cloned());
    writer.write_record(&header)?;

    let num = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
    let date = |d: Option<NaiveDate>| {
        d.map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    };

    for rec in records {
        let mut row = vec![
            rec.region_name.clone(),
            date(rec.start_date),
            date(rec.end_date),
            num(rec.start_price),
            num(rec.end_price),
            num(rec.log_initial_price),
            num(rec.growth_5yr),
            num(rec.percent_change),
        ];
        let meta = metadata.get(rec.region_name.as_str());
        for col in meta_columns {
            row.push(
                meta.and_then(|m| m.get(col))
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            );
        }
        writer.write_record(&row)?;
    }

    writer.flush().context("flushing growth table")?;
    log::info!("Wrote {} growth rows to {}", records.len(), path.display());
    Ok(())
}
