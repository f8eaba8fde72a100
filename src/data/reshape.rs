use std::path::Path;

use anyhow::{Context, Result};

use super::model::{PriceObservation, PriceTable};

/// Melt the wide table into one row per (ZIP, month), sorted by ZIP then date.
///
/// Missing prices stay in the output as `None` so the month axis of every
/// ZIP has the same length.
pub fn to_long(table: &PriceTable) -> Vec<PriceObservation> {
    let mut long: Vec<PriceObservation> = table
        .series
        .iter()
        .flat_map(|sp| {
            table
                .dates
                .iter()
                .zip(sp.prices.iter())
                .map(|(date, price)| PriceObservation {
                    region_name: sp.region_name.clone(),
                    date: *date,
                    price: *price,
                })
        })
        .collect();

    // Stable sort: duplicate ZIP rows keep their file order.
    long.sort_by(|a, b| {
        a.region_name
            .cmp(&b.region_name)
            .then_with(|| a.date.cmp(&b.date))
    });
    long
}

/// Write the long table as `RegionName,Date,Price`.
pub fn write_long_csv(observations: &[PriceObservation], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["RegionName", "Date", "Price"])?;
    for obs in observations {
        writer.write_record([
            obs.region_name.clone(),
            obs.date.format("%Y-%m-%d").to_string(),
            obs.price.map(|p| p.to_string()).unwrap_or_default(),
        ])?;
    }
    writer.flush().context("flushing long table")?;
    log::info!("Wrote {} long rows to {}", observations.len(), path.display());
    Ok(())
}
