use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Months, NaiveDate};

const N_ZIPS: usize = 60;
const N_MONTHS: u32 = 84;
const POIS: [(&str, f64, f64); 5] = [
    ("Downtown", 0.0, 0.0),
    ("Financial District", 1.5, -0.5),
    ("Airport", 12.0, 4.0),
    ("University", -4.0, 6.0),
    ("Harbor", 3.0, -9.0),
];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

struct SampleZip {
    zip: String,
    location: (f64, f64),
    prices: Vec<Option<f64>>,
}

fn month_ends() -> Vec<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(2017, 2, 1).unwrap_or_default();
    (0..N_MONTHS)
        .map(|i| {
            first
                .checked_add_months(Months::new(i))
                .and_then(|d| d.pred_opt())
                .unwrap_or_default()
        })
        .collect()
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

fn generate(rng: &mut SimpleRng) -> Vec<SampleZip> {
    (0..N_ZIPS)
        .map(|i| {
            // Every ZIP has a leading zero to exercise normalisation.
            let zip = if i < 3 {
                format!("{:05}", 501 + i)
            } else {
                format!("{:05}", 2100 + i * 7)
            };
            let location = (rng.uniform(-15.0, 15.0), rng.uniform(-15.0, 15.0));
            let core = (distance(location, (POIS[0].1, POIS[0].2))
                + distance(location, (POIS[1].1, POIS[1].2)))
                / 2.0;

            // Appreciation fades with distance from the urban core.
            let annual = 0.09 - 0.003 * core + rng.gauss(0.0, 0.01);
            let monthly = annual / 12.0;
            let base = rng.uniform(250_000.0, 900_000.0);

            let mut prices: Vec<Option<f64>> = (0..N_MONTHS)
                .map(|m| {
                    let trend = base * (monthly * m as f64).exp();
                    Some((trend * (1.0 + rng.gauss(0.0, 0.003))).round())
                })
                .collect();

            // Missing history and missing or zero endpoints for a handful of ZIPs.
            match i {
                5 => prices.iter_mut().take(40).for_each(|p| *p = None),
                6 => prices[N_MONTHS as usize - 1] = None,
                7 => prices[N_MONTHS as usize - 61] = Some(0.0),
                8 => prices[30] = None,
                _ => {}
            }

            SampleZip {
                zip,
                location,
                prices,
            }
        })
        .collect()
}

fn main() -> Result<()> {
    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_data"));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let mut rng = SimpleRng::new(42);
    let zips = generate(&mut rng);
    let dates = month_ends();

    // Wide price table
    let prices_path = out_dir.join("prices.csv");
    let mut w = csv::Writer::from_path(&prices_path).context("creating prices.csv")?;
    let mut header = vec![
        "RegionID".to_string(),
        "SizeRank".to_string(),
        "RegionName".to_string(),
        "State".to_string(),
        "City".to_string(),
    ];
    header.extend(dates.iter().map(|d| d.format("%Y-%m-%d").to_string()));
    w.write_record(&header)?;
    for (i, z) in zips.iter().enumerate() {
        // Leading zeros dropped, as spreadsheet exports do.
        let mut row = vec![
            (60_000 + i).to_string(),
            i.to_string(),
            z.zip.trim_start_matches('0').to_string(),
            "MA".to_string(),
            format!("Town {}", i % 7),
        ];
        row.extend(
            z.prices
                .iter()
                .map(|p| p.map(|v| v.to_string()).unwrap_or_default()),
        );
        w.write_record(&row)?;
    }
    w.flush()?;

    // Target list: all but the last two ZIPs, plus one with no price data
    let targets_path = out_dir.join("targets.csv");
    let mut w = csv::Writer::from_path(&targets_path).context("creating targets.csv")?;
    w.write_record(["zip"])?;
    for z in &zips[..N_ZIPS - 2] {
        w.write_record([z.zip.as_str()])?;
    }
    w.write_record(["99999"])?;
    w.flush()?;

    // Long distance matrix; ZIP 10 has no distances at all
    let dist_path = out_dir.join("distances.csv");
    let mut w = csv::Writer::from_path(&dist_path).context("creating distances.csv")?;
    w.write_record(["InputID", "TargetID", "Distance"])?;
    for (i, z) in zips.iter().enumerate() {
        if i == 10 {
            continue;
        }
        for (poi, x, y) in POIS {
            let d = distance(z.location, (x, y)) * rng.uniform(1.05, 1.25);
            w.write_record([z.zip.clone(), poi.to_string(), format!("{d:.3}")])?;
        }
    }
    w.flush()?;

    println!(
        "Wrote {} ZIPs x {} months and {} POIs to {}",
        zips.len(),
        dates.len(),
        POIS.len(),
        out_dir.display()
    );
    Ok(())
}
