use anyhow::{Result, bail};
use serde::Serialize;

use crate::data::distance::distance_column;
use crate::data::join::{GROWTH, LOG_INITIAL_PRICE, StudyFrame, regression_sample};
use crate::stats::ols::{self, OlsFit};

pub const URBAN_CORE: &str = "urban_core_dist";
pub const CORE_X_PRICE: &str = "urban_core_dist:log_initial_price";

// ---------------------------------------------------------------------------
// Model catalogue
// ---------------------------------------------------------------------------

/// Which output table a model belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelGroup {
    SinglePredictor,
    Multi,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub name: String,
    pub group: ModelGroup,
    pub terms: Vec<String>,
}

impl ModelSpec {
    fn new(name: impl Into<String>, group: ModelGroup, terms: &[&str]) -> Self {
        Self {
            name: name.into(),
            group,
            terms: terms.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Resolve the two urban-core POIs.
///
/// Each request may name a POI label or its `dist_` column. With no request
/// the first two POIs are used.
pub fn resolve_core_pois(pois: &[String], requested: &[String]) -> Result<Option<[String; 2]>> {
    if requested.is_empty() {
        return Ok(match pois {
            [a, b, ..] => Some([a.clone(), b.clone()]),
            _ => None,
        });
    }
    if requested.len() != 2 {
        bail!("expected exactly two core POIs, got {}", requested.len());
    }

    let find = |want: &str| {
        pois.iter()
            .find(|p| p.as_str() == want || distance_column(p) == want)
            .cloned()
    };
    match (find(requested[0].as_str()), find(requested[1].as_str())) {
        (Some(a), Some(b)) if a != b => Ok(Some([a, b])),
        (Some(_), Some(_)) => bail!("core POIs must be distinct"),
        (None, _) => bail!("unknown core POI '{}'", requested[0]),
        (_, None) => bail!("unknown core POI '{}'", requested[1]),
    }
}

/// Add the urban-core composite and its interaction with the initial price.
pub fn add_engineered_columns(frame: &mut StudyFrame, core: &[String; 2]) -> Result<()> {
    let a = distance_column(&core[0]);
    let b = distance_column(&core[1]);
    frame.derive_column(URBAN_CORE, &[a.as_str(), b.as_str()], |v| Some((v[0]? + v[1]?) / 2.0))?;
    frame.derive_column(CORE_X_PRICE, &[URBAN_CORE, LOG_INITIAL_PRICE], |v| {
        Some(v[0]? * v[1]?)
    })?;
    log::info!("Urban core distance = mean({a}, {b})");
    Ok(())
}

/// The study's models, in presentation order.
///
/// `pois` are the distance-matrix labels; engineered models are included only
/// when `with_core` is set (see [`add_engineered_columns`]).
pub fn model_catalogue(pois: &[String], with_core: bool) -> Vec<ModelSpec> {
    let columns: Vec<String> = pois.iter().map(|p| distance_column(p)).collect();
    let mut specs: Vec<ModelSpec> = pois
        .iter()
        .zip(&columns)
        .map(|(poi, col)| ModelSpec::new(poi.clone(), ModelGroup::SinglePredictor, &[col.as_str()]))
        .collect();

    let mut full: Vec<&str> = columns.iter().map(String::as_str).collect();
    full.push(LOG_INITIAL_PRICE);
    specs.push(ModelSpec::new("Full", ModelGroup::Multi, &full));

    if with_core {
        specs.push(ModelSpec::new(
            "Urban core",
            ModelGroup::Multi,
            &[URBAN_CORE, LOG_INITIAL_PRICE],
        ));
        specs.push(ModelSpec::new(
            "Interaction",
            ModelGroup::Multi,
            &[URBAN_CORE, LOG_INITIAL_PRICE, CORE_X_PRICE],
        ));
    }
    specs
}

// ---------------------------------------------------------------------------
// Fitting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct FittedModel {
    pub group: ModelGroup,
    pub dropped_rows: usize,
    #[serde(flatten)]
    pub fit: OlsFit,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StudyResults {
    pub models: Vec<FittedModel>,
    /// Model name → reason it could not be fit.
    pub failures: Vec<(String, String)>,
}

impl StudyResults {
    pub fn group(&self, group: ModelGroup) -> Vec<&OlsFit> {
        self.models
            .iter()
            .filter(|m| m.group == group)
            .map(|m| &m.fit)
            .collect()
    }
}

/// Fit every model; a failing model is recorded, not fatal.
pub fn fit_all(frame: &StudyFrame, specs: &[ModelSpec]) -> Result<StudyResults> {
    let mut results = StudyResults::default();

    for spec in specs {
        let terms: Vec<&str> = spec.terms.iter().map(String::as_str).collect();
        let sample = regression_sample(frame, &terms)?;

        match ols::fit(&spec.name, GROWTH, &terms, &sample.y, &sample.x) {
            Ok(fit) => {
                log::info!(
                    "{}: n = {}, R² = {:.4} ({} rows dropped)",
                    spec.name,
                    fit.n_obs,
                    fit.r_squared,
                    sample.dropped
                );
                results.models.push(FittedModel {
                    group: spec.group,
                    dropped_rows: sample.dropped,
                    fit,
                });
            }
            Err(e) => {
                log::error!("{}: {e}", spec.name);
                results.failures.push((spec.name.clone(), e.to_string()));
            }
        }
    }

    if results.models.is_empty() {
        bail!("no model could be fit ({} attempted)", specs.len());
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::join::StudyRow;

    fn pois() -> Vec<String> {
        ["Airport", "City Hall", "Harbor"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Growth falls with airport distance; the other distances are unrelated.
    fn frame() -> StudyFrame {
        let columns = [
            "growth_5yr",
            "log_initial_price",
            "percent_change",
            "dist_airport",
            "dist_city_hall",
            "dist_harbor",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let rows = (0..20)
            .map(|i| {
                let f = i as f64;
                let airport = 1.0 + f;
                let city = 2.0 + (f * 1.3).sin() * 4.0 + f * 0.5;
                let harbor = 3.0 + (f * 0.9).cos() * 2.0;
                let price = 12.0 + (f * 0.37).sin();
                let growth = 0.5 - 0.02 * airport + 0.01 * (f * 2.1).sin();
                StudyRow {
                    region_name: format!("{:05}", 10000 + i),
                    values: vec![
                        Some(growth),
                        Some(price),
                        Some((growth.exp() - 1.0) * 100.0),
                        Some(airport),
                        Some(city),
                        Some(harbor),
                    ],
                }
            })
            .collect();
        StudyFrame { columns, rows }
    }

    #[test]
    fn core_pois_default_and_lookup() {
        let p = pois();
        assert_eq!(
            resolve_core_pois(&p, &[]).unwrap(),
            Some(["Airport".to_string(), "City Hall".to_string()])
        );
        let req = vec!["dist_harbor".to_string(), "Airport".to_string()];
        assert_eq!(
            resolve_core_pois(&p, &req).unwrap(),
            Some(["Harbor".to_string(), "Airport".to_string()])
        );
        assert!(resolve_core_pois(&p, &["Airport".into()]).is_err());
        assert!(resolve_core_pois(&p, &["Airport".into(), "Airport".into()]).is_err());
        assert!(resolve_core_pois(&p, &["Airport".into(), "Moon".into()]).is_err());
        assert_eq!(resolve_core_pois(&p[..1], &[]).unwrap(), None);
    }

    #[test]
    fn catalogue_layout() {
        let specs = model_catalogue(&pois(), true);
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Airport", "City Hall", "Harbor", "Full", "Urban core", "Interaction"]
        );
        assert_eq!(specs[1].terms, vec!["dist_city_hall"]);
        assert_eq!(
            specs[3].terms,
            vec!["dist_airport", "dist_city_hall", "dist_harbor", "log_initial_price"]
        );
        assert_eq!(specs[5].terms.len(), 3);
        assert_eq!(model_catalogue(&pois(), false).len(), 4);
    }

    #[test]
    fn engineered_columns_are_mean_and_product() {
        let mut f = frame();
        add_engineered_columns(&mut f, &["Airport".into(), "City Hall".into()]).unwrap();

        let row = &f.rows[3];
        let core = row.values[f.column_index(URBAN_CORE).unwrap()].unwrap();
        assert!((core - (row.values[3].unwrap() + row.values[4].unwrap()) / 2.0).abs() < 1e-12);
        let inter = row.values[f.column_index(CORE_X_PRICE).unwrap()].unwrap();
        assert!((inter - core * row.values[1].unwrap()).abs() < 1e-12);
    }

    #[test]
    fn fits_full_catalogue_with_expected_signs() {
        let mut f = frame();
        let p = pois();
        add_engineered_columns(&mut f, &[p[0].clone(), p[1].clone()]).unwrap();
        let results = fit_all(&f, &model_catalogue(&p, true)).unwrap();

        assert!(results.failures.is_empty());
        assert_eq!(results.group(ModelGroup::SinglePredictor).len(), 3);
        assert_eq!(results.group(ModelGroup::Multi).len(), 3);

        let airport = results.group(ModelGroup::SinglePredictor)[0];
        let slope = airport.coefficient("dist_airport").unwrap();
        assert!(slope.estimate < 0.0);
        assert!(slope.p_value < 0.01);
        assert!(airport.r_squared > 0.9);
    }

    #[test]
    fn failing_model_is_recorded() {
        let mut f = frame();
        // Harbor becomes a constant → singular design for its single model.
        for row in &mut f.rows {
            row.values[5] = Some(1.0);
        }
        let results = fit_all(&f, &model_catalogue(&pois(), false)).unwrap();
        let failed: Vec<&str> = results.failures.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(failed, vec!["Harbor", "Full"]);
        assert_eq!(results.models.len(), 2);
    }
}
