mod cli;
mod color;
mod data;
mod growth;
mod pipeline;
mod report;
mod stats;
mod study;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};

/// `RUST_LOG` wins; otherwise `-v` flags pick the level (default: warn).
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Command::Growth(args) => {
            let report = pipeline::run_growth(&args.inputs, &args.out)?;
            println!(
                "Wrote growth for {} ZIPs to {} ({} excluded)",
                report.records.len(),
                args.out.display(),
                report.excluded.len()
            );
        }
        Command::Regress(args) => {
            let results = pipeline::run_regress_from_file(&args.growth, &args.model)?;
            print_summary(&results, &args.model.out_dir);
        }
        Command::Run(args) => {
            let results = pipeline::run_all(&args.inputs, &args.model)?;
            print_summary(&results, &args.model.out_dir);
        }
    }
    Ok(())
}

fn print_summary(results: &study::StudyResults, out_dir: &std::path::Path) {
    for m in &results.models {
        println!(
            "{:<28} n = {:<6} R² = {:.4}",
            m.fit.name, m.fit.n_obs, m.fit.r_squared
        );
    }
    for (name, reason) in &results.failures {
        println!("{name:<28} not fit: {reason}");
    }
    println!("Artifacts written to {}", out_dir.display());
}
