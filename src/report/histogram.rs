//! Fixed-bin histogram of 5-year percent change.
//!
//! Six bins with inclusive lower and exclusive upper bounds. Counts are
//! printed as an ASCII table with [`tabled`] and drawn by
//! [`super::plot::render_histogram`].

use tabled::{Table, Tabled};

/// Inner bin edges in percent; the outer bins are open-ended.
pub const BIN_EDGES: [f64; 5] = [0.0, 25.0, 50.0, 75.0, 100.0];

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBin {
    pub label: String,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub count: usize,
}

impl HistogramBin {
    pub fn contains(&self, v: f64) -> bool {
        self.lower.map_or(true, |lo| v >= lo) && self.upper.map_or(true, |hi| v < hi)
    }
}

/// The six empty bins, lowest first.
pub fn empty_bins() -> Vec<HistogramBin> {
    let mut bins = Vec::with_capacity(BIN_EDGES.len() + 1);
    bins.push(HistogramBin {
        label: format!("< {}%", BIN_EDGES[0]),
        lower: None,
        upper: Some(BIN_EDGES[0]),
        count: 0,
    });
    for pair in BIN_EDGES.windows(2) {
        bins.push(HistogramBin {
            label: format!("{}-{}%", pair[0], pair[1]),
            lower: Some(pair[0]),
            upper: Some(pair[1]),
            count: 0,
        });
    }
    let last = BIN_EDGES[BIN_EDGES.len() - 1];
    bins.push(HistogramBin {
        label: format!(">= {last}%"),
        lower: Some(last),
        upper: None,
        count: 0,
    });
    bins
}

/// Count values per bin. Missing and non-finite values are skipped.
pub fn bin_counts<I>(values: I) -> Vec<HistogramBin>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut bins = empty_bins();
    for v in values.into_iter().flatten().filter(|v| v.is_finite()) {
        if let Some(bin) = bins.iter_mut().find(|b| b.contains(v)) {
            bin.count += 1;
        }
    }
    bins
}

#[derive(Debug, Clone, Tabled)]
struct BinRow {
    #[tabled(rename = "Percent change")]
    range: String,
    #[tabled(rename = "ZIPs")]
    count: usize,
    #[tabled(rename = "Share")]
    share: String,
}

/// Formats the bins as an ASCII table with counts and shares.
pub fn format_bin_table(bins: &[HistogramBin]) -> String {
    let total: usize = bins.iter().map(|b| b.count).sum();
    let rows: Vec<BinRow> = bins
        .iter()
        .map(|b| BinRow {
            range: b.label.clone(),
            count: b.count,
            share: if total == 0 {
                "0.00%".to_string()
            } else {
                format!("{:.2}%", b.count as f64 / total as f64 * 100.0)
            },
        })
        .collect();
    Table::new(rows).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_labelled_bins() {
        let labels: Vec<String> = empty_bins().into_iter().map(|b| b.label).collect();
        assert_eq!(
            labels,
            vec!["< 0%", "0-25%", "25-50%", "50-75%", "75-100%", ">= 100%"]
        );
    }

    #[test]
    fn edges_are_lower_inclusive() {
        let bins = bin_counts([Some(-0.1), Some(0.0), Some(25.0), Some(99.9), Some(100.0)]);
        let counts: Vec<usize> = bins.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![1, 1, 1, 0, 1, 1]);
    }

    #[test]
    fn counts_sum_to_non_missing_values() {
        let values = vec![
            Some(12.0),
            None,
            Some(48.0),
            Some(f64::NAN),
            Some(310.0),
            Some(-4.0),
            None,
            Some(60.0),
        ];
        let present = values
            .iter()
            .filter(|v| v.is_some_and(f64::is_finite))
            .count();
        let bins = bin_counts(values);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), present);
        assert_eq!(present, 5);
    }

    #[test]
    fn table_shows_shares() {
        let bins = bin_counts([Some(10.0), Some(30.0), Some(35.0), Some(200.0)]);
        let table = format_bin_table(&bins);
        assert!(table.contains("Percent change"));
        assert!(table.contains("25-50%"));
        assert!(table.contains("50.00%"));
        assert!(table.contains("25.00%"));

        let empty = format_bin_table(&empty_bins());
        assert!(empty.contains("0.00%"));
    }
}
