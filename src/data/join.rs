use std::collections::BTreeSet;

use anyhow::{Context, Result};

use super::distance::distance_column;
use super::model::{DistanceTable, GrowthRecord};

pub const GROWTH: &str = "growth_5yr";
pub const LOG_INITIAL_PRICE: &str = "log_initial_price";
pub const PERCENT_CHANGE: &str = "percent_change";

// ---------------------------------------------------------------------------
// StudyFrame – growth joined with distances
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct StudyRow {
    pub region_name: String,
    /// Aligned with [`StudyFrame::columns`].
    pub values: Vec<Option<f64>>,
}

/// Joined analysis table: one row per ZIP, named numeric columns.
#[derive(Debug, Clone, Default)]
pub struct StudyFrame {
    pub columns: Vec<String>,
    pub rows: Vec<StudyRow>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinSummary {
    pub matched: usize,
    pub growth_only: usize,
    pub distance_only: usize,
}

impl StudyFrame {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Every value of a column, missing cells included.
    pub fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r.values[idx]).collect())
    }

    /// Append a column computed from existing ones.
    ///
    /// `f` receives the source values in the order of `sources`.
    pub fn derive_column<F>(&mut self, name: &str, sources: &[&str], f: F) -> Result<()>
    where
        F: Fn(&[Option<f64>]) -> Option<f64>,
    {
        let idx: Vec<usize> = sources
            .iter()
            .map(|s| {
                self.column_index(s)
                    .with_context(|| format!("unknown column '{s}'"))
            })
            .collect::<Result<_>>()?;

        let mut scratch = Vec::with_capacity(idx.len());
        for row in &mut self.rows {
            scratch.clear();
            scratch.extend(idx.iter().map(|&i| row.values[i]));
            row.values.push(f(&scratch));
        }
        self.columns.push(name.to_string());
        Ok(())
    }
}

/// Inner join of growth metrics and pivoted distances on `RegionName`.
///
/// Distance columns are renamed to `dist_<poi>`. Rows follow the growth
/// table's order.
pub fn join(growth: &[GrowthRecord], distances: &DistanceTable) -> (StudyFrame, JoinSummary) {
    let mut columns = vec![
        GROWTH.to_string(),
        LOG_INITIAL_PRICE.to_string(),
        PERCENT_CHANGE.to_string(),
    ];
    columns.extend(distances.pois.iter().map(|p| distance_column(p)));

    let mut rows = Vec::new();
    let mut seen = BTreeSet::new();
    let mut growth_only = 0;

    for rec in growth {
        let Some(dist) = distances.rows.get(&rec.region_name) else {
            log::debug!("{}: no distances, dropped", rec.region_name);
            growth_only += 1;
            continue;
        };
        seen.insert(rec.region_name.as_str());

        let mut values = vec![rec.growth_5yr, rec.log_initial_price, rec.percent_change];
        values.extend(dist.iter().copied());
        rows.push(StudyRow {
            region_name: rec.region_name.clone(),
            values,
        });
    }

    let distance_only = distances
        .rows
        .keys()
        .filter(|zip| !seen.contains(zip.as_str()))
        .count();

    let summary = JoinSummary {
        matched: rows.len(),
        growth_only,
        distance_only,
    };
    log::info!(
        "Joined {} ZIPs ({} growth-only, {} distance-only dropped)",
        summary.matched,
        summary.growth_only,
        summary.distance_only
    );

    (StudyFrame { columns, rows }, summary)
}

// ---------------------------------------------------------------------------
// Regression samples
// ---------------------------------------------------------------------------

/// Complete cases for one model: response plus regressor rows.
#[derive(Debug, Clone, Default)]
pub struct Sample {
    pub y: Vec<f64>,
    /// One inner vector per observation, aligned with the requested regressors.
    pub x: Vec<Vec<f64>>,
    pub dropped: usize,
}

/// Collect complete cases for `growth_5yr ~ regressors`.
///
/// Rows missing growth or the initial price are always dropped, as are rows
/// missing any requested regressor.
pub fn regression_sample(frame: &StudyFrame, regressors: &[&str]) -> Result<Sample> {
    let find = |name: &str| {
        frame
            .column_index(name)
            .with_context(|| format!("unknown column '{name}'"))
    };
    let y_idx = find(GROWTH)?;
    let price_idx = find(LOG_INITIAL_PRICE)?;
    let x_idx: Vec<usize> = regressors.iter().map(|&r| find(r)).collect::<Result<_>>()?;

    let mut sample = Sample::default();
    for row in &frame.rows {
        let (Some(y), Some(_)) = (row.values[y_idx], row.values[price_idx]) else {
            sample.dropped += 1;
            continue;
        };
        let x: Option<Vec<f64>> = x_idx.iter().map(|&i| row.values[i]).collect();
        match x {
            Some(x) if y.is_finite() && x.iter().all(|v| v.is_finite()) => {
                sample.y.push(y);
                sample.x.push(x);
            }
            _ => sample.dropped += 1,
        }
    }
    Ok(sample)
}
