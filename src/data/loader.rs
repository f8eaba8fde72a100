use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, AsArray, Float32Array, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::DataType;
use chrono::NaiveDate;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::model::{
    DistanceEntry, GrowthRecord, MetadataValue, PriceTable, ZipSeries, normalize_zip,
};

pub const REGION_COLUMN: &str = "RegionName";

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load the wide price table.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – one row per ZIP, `RegionName` plus one `YYYY-MM-DD` column per month
/// * `.parquet` – same layout; numeric date columns, `RegionName` as text or integer
pub fn load_price_table(path: &Path) -> Result<PriceTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "csv" => load_price_csv(path),
        "parquet" | "pq" => load_price_parquet(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading price table {}", path.display()))?;

    log::info!(
        "Loaded {} ZIP series over {} months from {}",
        table.len(),
        table.dates.len(),
        path.display()
    );
    Ok(table)
}

/// Load the list of ZIP codes under study.
///
/// The first column whose header is a known ZIP alias is used, otherwise the
/// first column of the file.
pub fn load_target_zips(path: &Path) -> Result<BTreeSet<String>> {
    const ALIASES: [&str; 4] = ["zip", "zipcode", "zip_code", "regionname"];

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening target ZIP list {}", path.display()))?;
    let headers = reader.headers().context("reading CSV headers")?.clone();
    let zip_idx = headers
        .iter()
        .position(|h| ALIASES.contains(&h.trim().to_ascii_lowercase().as_str()))
        .unwrap_or(0);

    let mut zips = BTreeSet::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let raw = record.get(zip_idx).unwrap_or("");
        if raw.trim().is_empty() {
            continue;
        }
        let zip = normalize_zip(raw).with_context(|| format!("target list row {row_no}"))?;
        zips.insert(zip);
    }

    log::info!("Loaded {} target ZIP codes from {}", zips.len(), path.display());
    Ok(zips)
}

/// Load a long distance matrix (`InputID,TargetID,Distance`).
pub fn load_distance_matrix(path: &Path) -> Result<Vec<DistanceEntry>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening distance matrix {}", path.display()))?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();

    let find = |names: &[&str]| headers.iter().position(|h| names.contains(&h.as_str()));
    let origin_idx =
        find(&["inputid", "origin"]).context("distance matrix missing 'InputID' column")?;
    let poi_idx =
        find(&["targetid", "destination"]).context("distance matrix missing 'TargetID' column")?;
    let dist_idx = find(&["distance"]).context("distance matrix missing 'Distance' column")?;

    let mut entries = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let origin = normalize_zip(record.get(origin_idx).unwrap_or(""))
            .with_context(|| format!("distance matrix row {row_no}"))?;
        let poi = record.get(poi_idx).unwrap_or("").trim().to_string();
        if poi.is_empty() {
            bail!("distance matrix row {row_no}: empty TargetID");
        }
        let raw = record.get(dist_idx).unwrap_or("");
        let distance = raw.trim().parse::<f64>().with_context(|| {
            format!("distance matrix row {row_no}: '{raw}' is not a number")
        })?;
        entries.push(DistanceEntry {
            origin,
            poi,
            distance,
        });
    }

    log::info!(
        "Loaded {} distance entries from {}",
        entries.len(),
        path.display()
    );
    Ok(entries)
}

/// Read a growth export back in.
pub fn load_growth_table(path: &Path) -> Result<Vec<GrowthRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening growth table {}", path.display()))?;

    let mut records = Vec::new();
    for (row_no, result) in reader.deserialize::<GrowthRecord>().enumerate() {
        let mut record = result.with_context(|| format!("growth table row {row_no}"))?;
        record.region_name = normalize_zip(&record.region_name)
            .with_context(|| format!("growth table row {row_no}"))?;
        records.push(record);
    }

    log::info!(
        "Loaded {} growth rows from {}",
        records.len(),
        path.display()
    );
    Ok(records)
}

// ---------------------------------------------------------------------------
// Column classification
// ---------------------------------------------------------------------------

fn parse_date_header(h: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(h.trim(), "%Y-%m-%d").ok()
}

/// `RegionName` index, date columns (sorted by date), metadata columns (file order).
type ColumnLayout = (usize, Vec<(NaiveDate, usize)>, Vec<(usize, String)>);

fn classify_columns<'a, I>(headers: I) -> Result<ColumnLayout>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut region_idx = None;
    let mut dates = Vec::new();
    let mut meta = Vec::new();

    for (idx, h) in headers.into_iter().enumerate() {
        if h.trim() == REGION_COLUMN {
            region_idx = Some(idx);
        } else if let Some(date) = parse_date_header(h) {
            dates.push((date, idx));
        } else {
            meta.push((idx, h.trim().to_string()));
        }
    }

    let region_idx = region_idx.with_context(|| format!("missing '{REGION_COLUMN}' column"))?;
    if dates.is_empty() {
        bail!("no YYYY-MM-DD price columns found");
    }
    dates.sort_by_key(|(date, _)| *date);
    Ok((region_idx, dates, meta))
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_price_csv(path: &Path) -> Result<PriceTable> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers = reader.headers().context("reading CSV headers")?.clone();
    let (region_idx, dates, meta_cols) = classify_columns(headers.iter())?;

    let mut series = Vec::new();
    let mut unparseable = 0usize;

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let region_name = normalize_zip(record.get(region_idx).unwrap_or(""))
            .with_context(|| format!("CSV row {row_no}"))?;

        let prices: Vec<Option<f64>> = dates
            .iter()
            .map(|(date, idx)| {
                let cell = record.get(*idx).unwrap_or("").trim();
                if cell.is_empty() {
                    return None;
                }
                match cell.parse::<f64>() {
                    Ok(v) if v.is_finite() => Some(v),
                    _ => {
                        log::debug!("{region_name} {date}: unparseable price '{cell}'");
                        unparseable += 1;
                        None
                    }
                }
            })
            .collect();

        let metadata = meta_cols
            .iter()
            .map(|(idx, name)| {
                (
                    name.clone(),
                    MetadataValue::guess(record.get(*idx).unwrap_or("")),
                )
            })
            .collect();

        series.push(ZipSeries {
            region_name,
            metadata,
            prices,
        });
    }

    if unparseable > 0 {
        log::warn!("{unparseable} non-numeric price cells treated as missing");
    }

    Ok(PriceTable {
        dates: dates.into_iter().map(|(d, _)| d).collect(),
        metadata_columns: meta_cols.into_iter().map(|(_, n)| n).collect(),
        series,
    })
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet price table.
///
/// Expected schema:
/// - `RegionName`: Utf8 / LargeUtf8 or Int32 / Int64
/// - one Float64 / Float32 / Int64 / Int32 column per `YYYY-MM-DD` month
/// - any other columns are treated as metadata
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_price_parquet(path: &Path) -> Result<PriceTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;

    let schema = builder.schema().clone();
    let (region_idx, dates, meta_cols) =
        classify_columns(schema.fields().iter().map(|f| f.name().as_str()))?;

    let reader = builder.build().context("building parquet reader")?;
    let mut series = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let region_col = batch.column(region_idx);

        for row in 0..batch.num_rows() {
            let raw = match extract_metadata_value(region_col, row) {
                MetadataValue::Null => bail!("Row {row}: null {REGION_COLUMN}"),
                other => other.to_string(),
            };
            let region_name =
                normalize_zip(&raw).with_context(|| format!("Row {row}: bad {REGION_COLUMN}"))?;

            let mut prices = Vec::with_capacity(dates.len());
            for (date, idx) in &dates {
                let price = extract_f64(batch.column(*idx), row)
                    .with_context(|| format!("Row {row}: failed to read '{date}'"))?;
                prices.push(price.filter(|v| v.is_finite()));
            }

            let metadata: BTreeMap<String, MetadataValue> = meta_cols
                .iter()
                .map(|(idx, name)| (name.clone(), extract_metadata_value(batch.column(*idx), row)))
                .collect();

            series.push(ZipSeries {
                region_name,
                metadata,
                prices,
            });
        }
    }

    Ok(PriceTable {
        dates: dates.into_iter().map(|(d, _)| d).collect(),
        metadata_columns: meta_cols.into_iter().map(|(_, n)| n).collect(),
        series,
    })
}

// -- Parquet / Arrow helpers --

/// Extract a numeric cell as `f64`; nulls become `None`.
fn extract_f64(col: &Arc<dyn Array>, row: usize) -> Result<Option<f64>> {
    if col.is_null(row) {
        return Ok(None);
    }
    let any = col.as_any();
    if let Some(arr) = any.downcast_ref::<Float64Array>() {
        Ok(Some(arr.value(row)))
    } else if let Some(arr) = any.downcast_ref::<Float32Array>() {
        Ok(Some(arr.value(row) as f64))
    } else if let Some(arr) = any.downcast_ref::<Int64Array>() {
        Ok(Some(arr.value(row) as f64))
    } else if let Some(arr) = any.downcast_ref::<Int32Array>() {
        Ok(Some(arr.value(row) as f64))
    } else {
        bail!("price column type is {:?}, expected a number", col.data_type())
    }
}

/// Extract a single metadata value from an Arrow column at a given row.
fn extract_metadata_value(col: &Arc<dyn Array>, row: usize) -> MetadataValue {
    if col.is_null(row) {
        return MetadataValue::Null;
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Utf8 => match any.downcast_ref::<StringArray>() {
            Some(s) => MetadataValue::String(s.value(row).to_string()),
            None => MetadataValue::Null,
        },
        DataType::LargeUtf8 => MetadataValue::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map_or(MetadataValue::Null, |a| MetadataValue::Integer(a.value(row) as i64)),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map_or(MetadataValue::Null, |a| MetadataValue::Integer(a.value(row))),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map_or(MetadataValue::Null, |a| MetadataValue::Float(a.value(row) as f64)),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map_or(MetadataValue::Null, |a| MetadataValue::Float(a.value(row))),
        other => MetadataValue::String(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp(name: &str, contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn price_csv_sorts_dates_and_keeps_metadata() {
        let (_dir, path) = write_tmp(
            "prices.csv",
            "RegionID,RegionName,City,2000-02-29,2000-01-31\n\
             1,2134,Boston,110.5,100\n\
             2,94110,San Francisco,,n/a\n",
        );
        let table = load_price_table(&path).unwrap();

        assert_eq!(
            table.dates,
            vec![
                NaiveDate::from_ymd_opt(2000, 1, 31).unwrap(),
                NaiveDate::from_ymd_opt(2000, 2, 29).unwrap()
            ]
        );
        assert_eq!(table.metadata_columns, vec!["RegionID", "City"]);
        assert_eq!(table.series[0].region_name, "02134");
        assert_eq!(table.series[0].prices, vec![Some(100.0), Some(110.5)]);
        assert_eq!(table.series[1].prices, vec![None, None]);
        assert_eq!(
            table.series[1].metadata["City"],
            MetadataValue::String("San Francisco".into())
        );
    }

    #[test]
    fn price_csv_requires_region_and_dates() {
        let (_dir, path) = write_tmp("a.csv", "Zip,2000-01-31\n1,2\n");
        assert!(load_price_table(&path).is_err());

        let (_dir, path) = write_tmp("b.csv", "RegionName,City\n02134,Boston\n");
        assert!(load_price_table(&path).is_err());
    }

    #[test]
    fn price_parquet_integer_zips_and_nulls() {
        use arrow::datatypes::{Field, Schema};
        use arrow::record_batch::RecordBatch;
        use parquet::arrow::ArrowWriter;

        let schema = Arc::new(Schema::new(vec![
            Field::new("RegionName", DataType::Int64, false),
            Field::new("City", DataType::Utf8, true),
            Field::new("2000-02-29", DataType::Float64, true),
            Field::new("2000-01-31", DataType::Int64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(vec![501, 94110])),
                Arc::new(StringArray::from(vec![Some("Holtsville"), None])),
                Arc::new(Float64Array::from(vec![Some(101.5), None])),
                Arc::new(Int64Array::from(vec![Some(100), Some(900)])),
            ],
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.parquet");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let table = load_price_table(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.dates[0], NaiveDate::from_ymd_opt(2000, 1, 31).unwrap());
        assert_eq!(table.series[0].region_name, "00501");
        assert_eq!(table.series[0].prices, vec![Some(100.0), Some(101.5)]);
        assert_eq!(table.series[1].prices, vec![Some(900.0), None]);
        assert_eq!(table.series[1].metadata["City"], MetadataValue::Null);
    }

    #[test]
    fn unsupported_extension() {
        let (_dir, path) = write_tmp("prices.xlsx", "");
        let err = load_price_table(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Unsupported file extension"));
    }

    #[test]
    fn target_zips_use_alias_column_and_dedupe() {
        let (_dir, path) = write_tmp("zips.csv", "name,zip\nA,501\nB,00501\nC,94110\nD,\n");
        let zips = load_target_zips(&path).unwrap();
        assert_eq!(zips.into_iter().collect::<Vec<_>>(), vec!["00501", "94110"]);
    }

    #[test]
    fn target_zips_fall_back_to_first_column() {
        let (_dir, path) = write_tmp("zips.csv", "code\n2134\n");
        let zips = load_target_zips(&path).unwrap();
        assert!(zips.contains("02134"));
    }

    #[test]
    fn distance_matrix_case_insensitive_headers() {
        let (_dir, path) = write_tmp(
            "dist.csv",
            "inputid,TARGETID,Distance\n2134,Airport,4.5\n2134,Downtown,2.0\n",
        );
        let entries = load_distance_matrix(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].origin, "02134");
        assert_eq!(entries[1].poi, "Downtown");
        assert_eq!(entries[1].distance, 2.0);
    }

    #[test]
    fn distance_matrix_rejects_bad_number() {
        let (_dir, path) = write_tmp("dist.csv", "InputID,TargetID,Distance\n2134,Airport,far\n");
        let err = load_distance_matrix(&path).unwrap_err();
        assert!(format!("{err:#}").contains("row 0"));
    }

    #[test]
    fn growth_table_reads_empty_cells_as_none() {
        let (_dir, path) = write_tmp(
            "growth.csv",
            "RegionName,StartDate,EndDate,StartPrice,EndPrice,log_initial_price,growth_5yr,percent_change,City\n\
             2134,2015-01-31,2020-01-31,100,150,4.605,0.405,50,Boston\n\
             94110,,,,,,,,\n",
        );
        let rows = load_growth_table(&path).unwrap();
        assert_eq!(rows[0].region_name, "02134");
        assert_eq!(rows[0].percent_change, Some(50.0));
        assert_eq!(rows[1].growth_5yr, None);
        assert_eq!(rows[1].start_date, None);
    }
}
