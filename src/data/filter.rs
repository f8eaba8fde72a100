use std::collections::BTreeSet;

use super::model::PriceTable;

// ---------------------------------------------------------------------------
// Target-set predicate
// ---------------------------------------------------------------------------

/// Keep only the series whose `RegionName` is in `targets`.
///
/// Row order of the input table is preserved; the month axis and metadata
/// column list are carried over untouched.
pub fn filter_to_targets(table: &PriceTable, targets: &BTreeSet<String>) -> PriceTable {
    let series = table
        .series
        .iter()
        .filter(|sp| targets.contains(&sp.region_name))
        .cloned()
        .collect();

    PriceTable {
        dates: table.dates.clone(),
        metadata_columns: table.metadata_columns.clone(),
        series,
    }
}

/// Targets with no row in the table, in ZIP order.
pub fn missing_targets(table: &PriceTable, targets: &BTreeSet<String>) -> Vec<String> {
    let present: BTreeSet<&str> = table
        .series
        .iter()
        .map(|sp| sp.region_name.as_str())
        .collect();
    targets
        .iter()
        .filter(|zip| !present.contains(zip.as_str()))
        .cloned()
        .collect()
}
