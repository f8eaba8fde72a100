use serde::Serialize;
use thiserror::Error;

use super::dist::{f_upper_tail, student_t_two_sided};

pub const INTERCEPT: &str = "(Intercept)";

/// Relative pivot tolerance for the normal-equation inverse.
const SINGULAR_TOL: f64 = 1e-10;

/// Errors that can occur while fitting a model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OlsError {
    #[error("{n} observations for {k} coefficients")]
    TooFewObservations { n: usize, k: usize },

    #[error("design matrix is singular (collinear or constant regressor)")]
    Singular,

    #[error("row {row} has {got} regressors, expected {expected}")]
    LengthMismatch {
        row: usize,
        got: usize,
        expected: usize,
    },

    #[error("response has no variance")]
    ConstantResponse,
}

type Result<T> = core::result::Result<T, OlsError>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coefficient {
    pub term: String,
    pub estimate: f64,
    pub std_error: f64,
    pub t_value: f64,
    pub p_value: f64,
}

/// A fitted linear model with intercept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OlsFit {
    pub name: String,
    pub response: String,
    /// Intercept first, then regressors in the order given.
    pub coefficients: Vec<Coefficient>,
    pub n_obs: usize,
    pub df_resid: usize,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub residual_std_error: f64,
    /// Absent for intercept-only models.
    pub f_statistic: Option<f64>,
    pub f_p_value: Option<f64>,
}

impl OlsFit {
    pub fn coefficient(&self, term: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.term == term)
    }

    /// Numerator degrees of freedom of the F test.
    pub fn df_model(&self) -> usize {
        self.coefficients.len() - 1
    }
}

/// Ordinary least squares of `y` on `x` plus an intercept.
///
/// `x` holds one row per observation; `terms` names its columns.
pub fn fit(
    name: &str,
    response: &str,
    terms: &[&str],
    y: &[f64],
    x: &[Vec<f64>],
) -> Result<OlsFit> {
    let n = y.len();
    let k = terms.len() + 1;

    if x.len() != n {
        return Err(OlsError::LengthMismatch {
            row: x.len().min(n),
            got: x.len(),
            expected: n,
        });
    }
    if let Some((row, r)) = x.iter().enumerate().find(|(_, r)| r.len() != terms.len()) {
        return Err(OlsError::LengthMismatch {
            row,
            got: r.len(),
            expected: terms.len(),
        });
    }
    if n <= k {
        return Err(OlsError::TooFewObservations { n, k });
    }

    // Normal equations: X'X b = X'y with a leading column of ones.
    fn design(row: &[f64], j: usize) -> f64 {
        if j == 0 { 1.0 } else { row[j - 1] }
    }
    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &yi) in x.iter().zip(y) {
        for a in 0..k {
            let xa = design(row, a);
            xty[a] += xa * yi;
            for b in a..k {
                xtx[a][b] += xa * design(row, b);
            }
        }
    }
    for a in 0..k {
        for b in 0..a {
            xtx[a][b] = xtx[b][a];
        }
    }

    let inv = invert(xtx)?;
    let beta: Vec<f64> = inv
        .iter()
        .map(|r| r.iter().zip(&xty).map(|(a, b)| a * b).sum())
        .collect();

    let mean_y = y.iter().sum::<f64>() / n as f64;
    let mut ssr = 0.0;
    let mut sst = 0.0;
    for (row, &yi) in x.iter().zip(y) {
        let fitted: f64 = (0..k).map(|j| beta[j] * design(row, j)).sum();
        ssr += (yi - fitted).powi(2);
        sst += (yi - mean_y).powi(2);
    }
    if sst == 0.0 {
        return Err(OlsError::ConstantResponse);
    }

    let df_resid = n - k;
    let sigma2 = ssr / df_resid as f64;
    let coefficients = std::iter::once(INTERCEPT)
        .chain(terms.iter().copied())
        .enumerate()
        .map(|(j, term)| {
            let std_error = (sigma2 * inv[j][j]).max(0.0).sqrt();
            let t_value = if std_error > 0.0 {
                beta[j] / std_error
            } else {
                f64::INFINITY.copysign(beta[j])
            };
            Coefficient {
                term: term.to_string(),
                estimate: beta[j],
                std_error,
                t_value,
                p_value: student_t_two_sided(t_value, df_resid as f64),
            }
        })
        .collect();

    let r_squared = 1.0 - ssr / sst;
    let adj_r_squared = 1.0 - (1.0 - r_squared) * (n - 1) as f64 / df_resid as f64;
    let (f_statistic, f_p_value) = if k > 1 {
        let df1 = (k - 1) as f64;
        let f = if ssr > 0.0 {
            ((sst - ssr) / df1) / sigma2
        } else {
            f64::INFINITY
        };
        (Some(f), Some(f_upper_tail(f, df1, df_resid as f64)))
    } else {
        (None, None)
    };

    Ok(OlsFit {
        name: name.to_string(),
        response: response.to_string(),
        coefficients,
        n_obs: n,
        df_resid,
        r_squared,
        adj_r_squared,
        residual_std_error: sigma2.sqrt(),
        f_statistic,
        f_p_value,
    })
}

/// Gauss-Jordan inverse with partial pivoting.
fn invert(mut m: Vec<Vec<f64>>) -> Result<Vec<Vec<f64>>> {
    let k = m.len();
    let scale = (0..k).map(|i| m[i][i].abs()).fold(0.0, f64::max);
    if scale == 0.0 {
        return Err(OlsError::Singular);
    }

    let mut inv: Vec<Vec<f64>> = (0..k)
        .map(|i| (0..k).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for col in 0..k {
        let pivot_row = (col..k)
            .max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))
            .unwrap_or(col);
        if m[pivot_row][col].abs() <= SINGULAR_TOL * scale {
            return Err(OlsError::Singular);
        }
        m.swap(col, pivot_row);
        inv.swap(col, pivot_row);

        let p = m[col][col];
        m[col].iter_mut().for_each(|v| *v /= p);
        inv[col].iter_mut().for_each(|v| *v /= p);
        let pivot = m[col].clone();
        let pivot_inv = inv[col].clone();

        for r in (0..k).filter(|&r| r != col) {
            let factor = m[r][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..k {
                m[r][j] -= factor * pivot[j];
                inv[r][j] -= factor * pivot_inv[j];
            }
        }
    }
    Ok(inv)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(v: &[f64]) -> Vec<Vec<f64>> {
        v.iter().map(|&x| vec![x]).collect()
    }

    #[test]
    fn simple_regression_textbook_values() {
        let y = [2.0, 4.0, 5.0, 4.0, 5.0];
        let x = col(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let fit = fit("m", "y", &["x"], &y, &x).unwrap();

        let b0 = fit.coefficient(INTERCEPT).unwrap();
        let b1 = fit.coefficient("x").unwrap();
        assert!((b0.estimate - 2.2).abs() < 1e-12);
        assert!((b1.estimate - 0.6).abs() < 1e-12);
        assert!((fit.r_squared - 0.6).abs() < 1e-12);
        assert!((fit.adj_r_squared - (1.0 - 0.4 * 4.0 / 3.0)).abs() < 1e-12);
        assert!((b1.std_error - (0.08f64).sqrt()).abs() < 1e-12);
        assert!((fit.residual_std_error - 0.8f64.sqrt()).abs() < 1e-12);
        assert!(b1.p_value > 0.12 && b1.p_value < 0.13);

        // One regressor: F = t^2 and the p-values agree.
        let f = fit.f_statistic.unwrap();
        assert!((f - b1.t_value.powi(2)).abs() < 1e-9);
        assert!((fit.f_p_value.unwrap() - b1.p_value).abs() < 1e-12);
        assert_eq!(fit.n_obs, 5);
        assert_eq!(fit.df_resid, 3);
        assert_eq!(fit.df_model(), 1);
    }

    #[test]
    fn recovers_exact_multivariate_plane() {
        let x: Vec<Vec<f64>> = (0..12)
            .map(|i| {
                let a = i as f64;
                vec![a, (a * 0.7).sin() * 3.0]
            })
            .collect();
        let y: Vec<f64> = x.iter().map(|r| 1.0 + 2.0 * r[0] - 3.0 * r[1]).collect();
        let fit = fit("plane", "y", &["a", "b"], &y, &x).unwrap();

        assert!((fit.coefficients[0].estimate - 1.0).abs() < 1e-9);
        assert!((fit.coefficients[1].estimate - 2.0).abs() < 1e-9);
        assert!((fit.coefficients[2].estimate + 3.0).abs() < 1e-9);
        assert!((fit.r_squared - 1.0).abs() < 1e-12);
    }

    #[test]
    fn collinear_regressors_are_singular() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, 2.0 * i as f64]).collect();
        let y: Vec<f64> = (0..10).map(|i| (i * i) as f64).collect();
        assert_eq!(fit("m", "y", &["a", "b"], &y, &x), Err(OlsError::Singular));

        // A constant regressor is collinear with the intercept.
        let x = col(&[3.0; 6]);
        let y = [1.0, 2.0, 3.0, 4.0, 5.0, 7.0];
        assert_eq!(fit("m", "y", &["c"], &y, &x), Err(OlsError::Singular));
    }

    #[test]
    fn rejects_degenerate_inputs() {
        assert_eq!(
            fit("m", "y", &["x"], &[1.0, 2.0], &col(&[1.0, 2.0])),
            Err(OlsError::TooFewObservations { n: 2, k: 2 })
        );
        assert!(matches!(
            fit("m", "y", &["x"], &[1.0, 2.0, 3.0], &[vec![1.0], vec![2.0, 3.0], vec![4.0]]),
            Err(OlsError::LengthMismatch { row: 1, .. })
        ));
        assert_eq!(
            fit("m", "y", &["x"], &[1.0; 4], &col(&[1.0, 2.0, 3.0, 4.0])),
            Err(OlsError::ConstantResponse)
        );
    }

    #[test]
    fn identical_inputs_give_identical_fits() {
        let y = [0.31, 0.12, 0.44, 0.27, 0.38, 0.19, 0.22];
        let x = col(&[4.2, 11.0, 1.3, 6.8, 2.9, 9.1, 7.7]);
        let a = fit("m", "y", &["d"], &y, &x).unwrap();
        let b = fit("m", "y", &["d"], &y, &x).unwrap();
        assert_eq!(a, b);
        assert!(a.coefficient("d").unwrap().estimate < 0.0);
    }
}
