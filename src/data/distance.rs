use super::model::{DistanceEntry, DistanceTable};

/// Number of points of interest the study is designed around.
pub const EXPECTED_POIS: usize = 5;

/// Pivot the long matrix to one row per ZIP and one column per POI.
///
/// POI columns keep the order in which they first appear. A repeated
/// (ZIP, POI) pair overwrites the earlier value.
pub fn pivot_distances(entries: &[DistanceEntry]) -> DistanceTable {
    let mut table = DistanceTable::default();

    for entry in entries {
        if !table.pois.contains(&entry.poi) {
            table.pois.push(entry.poi.clone());
        }
    }

    let width = table.pois.len();
    for entry in entries {
        // Present by construction above.
        let Some(col) = table.pois.iter().position(|p| *p == entry.poi) else {
            continue;
        };
        let row = table
            .rows
            .entry(entry.origin.clone())
            .or_insert_with(|| vec![None; width]);
        if let Some(prev) = row[col] {
            log::warn!(
                "Duplicate distance {} -> {}: {prev} replaced by {}",
                entry.origin,
                entry.poi,
                entry.distance
            );
        }
        row[col] = Some(entry.distance);
    }

    if width != EXPECTED_POIS {
        log::warn!("Distance matrix has {width} POIs, expected {EXPECTED_POIS}");
    }
    log::info!(
        "Pivoted distances: {} ZIPs x {} POIs",
        table.rows.len(),
        width
    );
    table
}

/// Regressor column name for a POI label: `dist_` plus a lower-case slug.
pub fn distance_column(poi: &str) -> String {
    let mut slug = String::with_capacity(poi.len());
    let mut pending_sep = false;
    for c in poi.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    format!("dist_{slug}")
}
