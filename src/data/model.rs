use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// MetadataValue – a single identifier cell (City, State, Metro, ...)
// ---------------------------------------------------------------------------

/// A dynamically-typed identifier value carried next to each price series.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Null,
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Null => Ok(()),
        }
    }
}

impl MetadataValue {
    /// Best-effort typing of a raw CSV cell.
    pub fn guess(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return MetadataValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return MetadataValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return MetadataValue::Float(f);
        }
        MetadataValue::String(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// ZIP codes
// ---------------------------------------------------------------------------

/// Normalise a `RegionName` cell to a 5-digit ZIP string.
///
/// Spreadsheet round-trips routinely strip leading zeros (`"501"`), and
/// some exports write ZIPs as floats (`"2134.0"`), so both are repaired.
pub fn normalize_zip(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_suffix(".0").unwrap_or(trimmed);
    if digits.is_empty() || digits.len() > 5 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        bail!("'{raw}' is not a ZIP code");
    }
    Ok(format!("{digits:0>5}"))
}

// ---------------------------------------------------------------------------
// PriceTable – the wide price table
// ---------------------------------------------------------------------------

/// One row of the wide price table: a ZIP and its monthly prices.
#[derive(Debug, Clone)]
pub struct ZipSeries {
    pub region_name: String,
    /// Identifier columns (everything that is neither `RegionName` nor a date).
    pub metadata: BTreeMap<String, MetadataValue>,
    /// One entry per [`PriceTable::dates`] element; `None` when missing.
    pub prices: Vec<Option<f64>>,
}

/// The full wide table: shared month axis plus one series per ZIP.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    /// Month-end dates, ascending.
    pub dates: Vec<NaiveDate>,
    /// Metadata column names in file order.
    pub metadata_columns: Vec<String>,
    pub series: Vec<ZipSeries>,
}

impl PriceTable {
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// One row of the long table.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceObservation {
    pub region_name: String,
    pub date: NaiveDate,
    pub price: Option<f64>,
}

// ---------------------------------------------------------------------------
// Distances
// ---------------------------------------------------------------------------

/// One line of the long distance matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceEntry {
    pub origin: String,
    pub poi: String,
    pub distance: f64,
}

/// Distances pivoted to one row per ZIP, one column per POI.
#[derive(Debug, Clone, Default)]
pub struct DistanceTable {
    /// POI labels in first-seen order.
    pub pois: Vec<String>,
    /// ZIP → distances aligned with `pois`.
    pub rows: BTreeMap<String, Vec<Option<f64>>>,
}

// ---------------------------------------------------------------------------
// Growth export
// ---------------------------------------------------------------------------

/// Per-ZIP appreciation metrics, as written to and read from the growth CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthRecord {
    #[serde(rename = "RegionName")]
    pub region_name: String,
    #[serde(rename = "StartDate")]
    pub start_date: Option<NaiveDate>,
    #[serde(rename = "EndDate")]
    pub end_date: Option<NaiveDate>,
    #[serde(rename = "StartPrice")]
    pub start_price: Option<f64>,
    #[serde(rename = "EndPrice")]
    pub end_price: Option<f64>,
    pub log_initial_price: Option<f64>,
    pub growth_5yr: Option<f64>,
    pub percent_change: Option<f64>,
}
