//! Command-line arguments

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "zip-appreciation")]
#[command(version)]
#[command(about = "5-year ZIP-level housing appreciation vs. distance to points of interest", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Filter and reshape the price table, compute 5-year growth, export CSV
    Growth(GrowthArgs),
    /// Join growth with distances, fit the models, write tables and histogram
    Regress(RegressArgs),
    /// Run `growth` then `regress` in one go
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct PriceInputs {
    /// Wide monthly price table (.csv or .parquet) with a RegionName column
    #[arg(long, value_name = "FILE")]
    pub prices: PathBuf,

    /// CSV listing the ZIP codes under study
    #[arg(long, value_name = "FILE")]
    pub targets: PathBuf,

    /// Also write the long (ZIP, month, price) table here
    #[arg(long = "long-out", value_name = "FILE")]
    pub long_out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ModelOptions {
    /// Long distance matrix CSV (InputID, TargetID, Distance)
    #[arg(long, value_name = "FILE")]
    pub distances: PathBuf,

    /// Directory for HTML tables, JSON results and the histogram
    #[arg(long = "out-dir", value_name = "DIR", default_value = "output")]
    pub out_dir: PathBuf,

    /// POI (label or dist_ column) forming the urban core; give exactly two
    #[arg(long = "core-poi", value_name = "POI")]
    pub core_pois: Vec<String>,

    /// Skip rendering the percent-change histogram PNG
    #[arg(long = "no-histogram")]
    pub no_histogram: bool,
}

#[derive(Args, Debug, Clone)]
pub struct GrowthArgs {
    #[command(flatten)]
    pub inputs: PriceInputs,

    /// Growth export path
    #[arg(long, value_name = "FILE", default_value = "growth_metrics.csv")]
    pub out: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct RegressArgs {
    /// Growth export written by `growth`
    #[arg(long, value_name = "FILE")]
    pub growth: PathBuf,

    #[command(flatten)]
    pub model: ModelOptions,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub inputs: PriceInputs,

    #[command(flatten)]
    pub model: ModelOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_core_pois() {
        let cli = Cli::try_parse_from([
            "zip-appreciation",
            "-vv",
            "run",
            "--prices",
            "p.csv",
            "--targets",
            "t.csv",
            "--distances",
            "d.csv",
            "--core-poi",
            "Airport",
            "--core-poi",
            "City Hall",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.model.core_pois, vec!["Airport", "City Hall"]);
        assert_eq!(args.model.out_dir, PathBuf::from("output"));
        assert!(!args.model.no_histogram);
        assert!(args.inputs.long_out.is_none());
    }

    #[test]
    fn growth_defaults_output_path() {
        let cli = Cli::try_parse_from([
            "zip-appreciation",
            "growth",
            "--prices",
            "p.parquet",
            "--targets",
            "t.csv",
        ])
        .unwrap();
        let Command::Growth(args) = cli.command else {
            panic!("expected growth");
        };
        assert_eq!(args.out, PathBuf::from("growth_metrics.csv"));
    }

    #[test]
    fn regress_requires_distances() {
        assert!(Cli::try_parse_from(["zip-appreciation", "regress", "--growth", "g.csv"]).is_err());
    }
}
