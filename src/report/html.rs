use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use crate::stats::ols::{INTERCEPT, OlsFit};

const STYLE: &str = "\
body { font-family: Georgia, 'Times New Roman', serif; margin: 2em; }
table.regression { border-collapse: collapse; text-align: center; }
table.regression caption { font-weight: bold; padding-bottom: 0.5em; }
table.regression td { padding: 2px 14px; }
table.regression td.term { text-align: left; }
table.regression tr.rule td { border-bottom: 1px solid black; padding: 0; }
table.regression tr.se td { padding-bottom: 6px; }
table.regression td.note { text-align: right; font-size: 0.9em; }
";

/// Significance stars at the 10%, 5% and 1% levels.
pub fn stars(p: f64) -> &'static str {
    if p < 0.01 {
        "***"
    } else if p < 0.05 {
        "**"
    } else if p < 0.1 {
        "*"
    } else {
        ""
    }
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn sup(p: f64) -> String {
    match stars(p) {
        "" => String::new(),
        s => format!("<sup>{s}</sup>"),
    }
}

/// Terms across all models: regressors in first-seen order, intercept last.
fn term_order(fits: &[&OlsFit]) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for fit in fits {
        for c in &fit.coefficients {
            if c.term != INTERCEPT && !terms.contains(&c.term) {
                terms.push(c.term.clone());
            }
        }
    }
    terms.push(INTERCEPT.to_string());
    terms
}

/// Render fits side by side as a self-contained HTML page.
///
/// One column per model; estimates carry significance stars with the
/// standard error in parentheses underneath. Terms a model lacks are blank.
pub fn render_table(title: &str, fits: &[&OlsFit]) -> String {
    let cols = fits.len();
    let mut h = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(h, "<!DOCTYPE html>");
    let _ = writeln!(h, "<html>\n<head>\n<meta charset=\"utf-8\">");
    let _ = writeln!(h, "<title>{}</title>", escape(title));
    let _ = writeln!(h, "<style>\n{STYLE}</style>\n</head>\n<body>");
    let _ = writeln!(h, "<table class=\"regression\">");
    let _ = writeln!(h, "<caption>{}</caption>", escape(title));

    let rule = format!("<tr class=\"rule\"><td colspan=\"{}\"></td></tr>", cols + 1);
    let _ = writeln!(h, "{rule}");

    let response = fits.first().map_or("", |f| f.response.as_str());
    let _ = writeln!(
        h,
        "<tr><td></td><td colspan=\"{cols}\"><em>Dependent variable:</em></td></tr>"
    );
    let _ = writeln!(
        h,
        "<tr><td></td><td colspan=\"{cols}\">{}</td></tr>",
        escape(response)
    );

    h.push_str("<tr><td></td>");
    for i in 1..=cols {
        let _ = write!(h, "<td>({i})</td>");
    }
    h.push_str("</tr>\n<tr><td></td>");
    for fit in fits {
        let _ = write!(h, "<td>{}</td>", escape(&fit.name));
    }
    let _ = writeln!(h, "</tr>\n{rule}");

    for term in term_order(fits) {
        let label = if term == INTERCEPT { "Constant" } else { term.as_str() };
        let _ = write!(h, "<tr><td class=\"term\">{}</td>", escape(label));
        for fit in fits {
            match fit.coefficient(&term) {
                Some(c) => {
                    let _ = write!(h, "<td>{:.4}{}</td>", c.estimate, sup(c.p_value));
                }
                None => h.push_str("<td></td>"),
            }
        }
        h.push_str("</tr>\n<tr class=\"se\"><td></td>");
        for fit in fits {
            match fit.coefficient(&term) {
                Some(c) => {
                    let _ = write!(h, "<td>({:.4})</td>", c.std_error);
                }
                None => h.push_str("<td></td>"),
            }
        }
        h.push_str("</tr>\n");
    }
    let _ = writeln!(h, "{rule}");

    footer_row(&mut h, "Observations", fits, |f| f.n_obs.to_string());
    footer_row(&mut h, "R<sup>2</sup>", fits, |f| format!("{:.3}", f.r_squared));
    footer_row(&mut h, "Adjusted R<sup>2</sup>", fits, |f| {
        format!("{:.3}", f.adj_r_squared)
    });
    footer_row(&mut h, "Residual Std. Error", fits, |f| {
        format!("{:.3} (df = {})", f.residual_std_error, f.df_resid)
    });
    footer_row(&mut h, "F Statistic", fits, |f| match (f.f_statistic, f.f_p_value) {
        (Some(stat), Some(p)) => format!(
            "{:.3}{} (df = {}; {})",
            stat,
            sup(p),
            f.df_model(),
            f.df_resid
        ),
        _ => String::new(),
    });

    let _ = writeln!(h, "{rule}");
    let _ = writeln!(
        h,
        "<tr><td class=\"term\"><em>Note:</em></td><td class=\"note\" colspan=\"{cols}\">\
         <sup>*</sup>p&lt;0.1; <sup>**</sup>p&lt;0.05; <sup>***</sup>p&lt;0.01</td></tr>"
    );
    let _ = writeln!(h, "</table>\n</body>\n</html>");
    h
}

/// `label` is inserted verbatim so it may carry markup.
fn footer_row<F>(h: &mut String, label: &str, fits: &[&OlsFit], cell: F)
where
    F: Fn(&OlsFit) -> String,
{
    let _ = write!(h, "<tr><td class=\"term\">{label}</td>");
    for fit in fits {
        let _ = write!(h, "<td>{}</td>", cell(fit));
    }
    h.push_str("</tr>\n");
}

pub fn write_table(path: &Path, title: &str, fits: &[&OlsFit]) -> Result<()> {
    std::fs::write(path, render_table(title, fits))
        .with_context(|| format!("writing {}", path.display()))?;
    log::info!("Wrote {} models to {}", fits.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::ols::Coefficient;

    fn coef(term: &str, estimate: f64, p_value: f64) -> Coefficient {
        Coefficient {
            term: term.to_string(),
            estimate,
            std_error: 0.01,
            t_value: estimate / 0.01,
            p_value,
        }
    }

    fn model(name: &str, coefficients: Vec<Coefficient>) -> OlsFit {
        OlsFit {
            name: name.to_string(),
            response: "growth_5yr".to_string(),
            df_resid: 100 - coefficients.len(),
            coefficients,
            n_obs: 100,
            r_squared: 0.25,
            adj_r_squared: 0.24,
            residual_std_error: 0.1,
            f_statistic: Some(32.0),
            f_p_value: Some(0.0001),
        }
    }

    #[test]
    fn star_thresholds() {
        assert_eq!(stars(0.009), "***");
        assert_eq!(stars(0.01), "**");
        assert_eq!(stars(0.049), "**");
        assert_eq!(stars(0.05), "*");
        assert_eq!(stars(0.1), "");
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
    }

    #[test]
    fn side_by_side_layout() {
        let a = model(
            "Airport",
            vec![coef(INTERCEPT, 0.5, 0.0), coef("dist_airport", -0.0213, 0.03)],
        );
        let b = model(
            "Harbor <east>",
            vec![coef(INTERCEPT, 0.4, 0.2), coef("dist_harbor", 0.0101, 0.5)],
        );
        let html = render_table("Single predictors", &[&a, &b]);

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<caption>Single predictors</caption>"));
        assert!(html.contains("<td>(1)</td><td>(2)</td>"));
        assert!(html.contains("Harbor &lt;east&gt;"));
        assert!(html.contains("<td>-0.0213<sup>**</sup></td><td></td>"));
        assert!(html.contains("<td></td><td>0.0101</td>"));
        assert!(html.contains("<td>(0.0100)</td>"));
        assert!(html.contains("(df = 1; 98)"));

        // Regressors first, constant last.
        let airport = html.find("dist_airport").unwrap();
        let harbor = html.find("dist_harbor").unwrap();
        let constant = html.find("Constant").unwrap();
        assert!(airport < harbor && harbor < constant);
    }
}
