//! Command line front end: map a directory of XML metadata records.
//!
//! ```text
//! facetmap [--parallel] key=value...
//! ```
//!
//! Known keys are `mapfile`, `inputdir`, `outputdir`, `savestats` and
//! `config`. Log verbosity follows `RUST_LOG` and defaults to `info`.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use clap::Parser;
use facetmap::{processor, Configuration};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "facetmap", version, about = "Map XML metadata records to facet records")]
struct Cli {
    /// Map files on all cores
    #[arg(long)]
    parallel: bool,

    /// Parameters as key=value; the value may be empty
    #[arg(value_name = "KEY=VALUE")]
    params: Vec<String>,
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

fn write_stats(table: &facetmap::MappingTable, destination: &str) -> Result<()> {
    if destination.is_empty() {
        let mut out = io::stdout().lock();
        table.write_report(&mut out)?;
        out.flush()?;
        return Ok(());
    }
    let file = File::create(destination)
        .with_context(|| format!("cannot create statistics file {destination}"))?;
    let mut out = BufWriter::new(file);
    table.write_report(&mut out)?;
    out.flush()
        .with_context(|| format!("cannot write statistics file {destination}"))?;
    info!(path = destination, "statistics saved");
    Ok(())
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut config = Configuration::new();
    config.apply_args(&cli.params)?;
    config.read_config_file()?;

    let (table, summary) = processor::run(&config, cli.parallel)?;
    info!("{} records mapped", table.documents_processed());
    if summary.failed > 0 {
        info!(failed = summary.failed, "some files could not be mapped");
    }

    if let Some(destination) = config.savestats() {
        write_stats(&table, destination)?;
    }
    Ok(())
}
