use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use pbcorr::data::loader::{load_run, write_comments, write_run_table};
use pbcorr::pipeline::process_run;
use pbcorr::Config;

/// Blank, Hg-interference and mass-bias corrections for one LA-ICP-MS run.
#[derive(Parser, Debug)]
#[command(name = "pbcorr", version, about)]
struct Cli {
    /// Raw cycles of the run (.csv or .json), in acquisition order
    #[arg(short, long)]
    input: PathBuf,

    /// JSON configuration: cycle windows, Hg_4_2 and the standard's accepted values
    #[arg(short, long)]
    config: PathBuf,

    /// Calibrated run table (CSV)
    #[arg(short, long)]
    output: PathBuf,

    /// Dropped-cycle audit trail (CSV)
    #[arg(long)]
    comments: Option<PathBuf>,

    /// Internally corrected run table, before mass-bias correction (CSV)
    #[arg(long)]
    internal: Option<PathBuf>,
}

fn run(cli: &Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;

    let samples = load_run(&cli.input)
        .with_context(|| format!("loading {}", cli.input.display()))?;
    log::info!("loaded {} samples from {}", samples.len(), cli.input.display());

    let report = process_run(&config, &samples)?;

    for failure in &report.failures {
        eprintln!("skipped {}: {}", failure.sample, failure.error);
    }
    if let Some(path) = &cli.comments {
        write_comments(path, &report.comments)?;
    }
    if let Some(path) = &cli.internal {
        write_run_table(path, &report.internal)?;
    }

    let calibrated = report.calibration?;
    if let Some(warning) = &calibrated.trailing {
        eprintln!("warning: {warning}");
    }
    write_run_table(&cli.output, &calibrated.rows)?;
    log::info!("wrote {} rows to {}", calibrated.rows.len(), cli.output.display());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
