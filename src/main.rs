use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use depsnap::build::SnapshotAssembler;
use depsnap::cli::{Cli, Command};
use depsnap::config;
use depsnap::models::{BuildRequest, RawScan};
use depsnap::queue::resolver_from_config;
use depsnap::scan::{DirScanStore, ScanProcessor};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Process { scan, pretty } => handle_process(&scan, pretty),
        Command::Build {
            request,
            scans,
            output,
            pretty,
        } => handle_build(&request, &scans, output.as_deref(), pretty).await,
    }
}

fn handle_process(scan_path: &Path, pretty: bool) -> Result<()> {
    let content = fs::read_to_string(scan_path)
        .with_context(|| format!("reading scan artifact {}", scan_path.display()))?;
    let raw: RawScan = serde_json::from_str(&content)
        .with_context(|| format!("parsing scan artifact {}", scan_path.display()))?;

    let processor = ScanProcessor::from_config(&config::global().queue_config());
    let output = processor.process(&raw)?;
    for warning in &output.warnings {
        eprintln!("warning: {warning}");
    }
    print_json(&output.scan, pretty)?;
    Ok(())
}

async fn handle_build(
    request_path: &Path,
    scans_dir: &Path,
    output: Option<&Path>,
    pretty: bool,
) -> Result<()> {
    let content = fs::read_to_string(request_path)
        .with_context(|| format!("reading build request {}", request_path.display()))?;
    let request: BuildRequest = serde_json::from_str(&content)
        .with_context(|| format!("parsing build request {}", request_path.display()))?;

    let store = DirScanStore::load(scans_dir)?;
    let queues = resolver_from_config(&config::global().queue_config())?;
    let assembler = SnapshotAssembler::new(&store, queues.as_ref());
    let snapshot = assembler.build(&request).await?;

    if !snapshot.is_complete {
        for warning in &snapshot.warnings {
            eprintln!("warning: {warning}");
        }
    }

    match output {
        Some(path) => {
            let json = to_json(&snapshot, pretty)?;
            fs::write(path, json)
                .with_context(|| format!("writing snapshot to {}", path.display()))?;
        }
        None => print_json(&snapshot, pretty)?,
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<()> {
    println!("{}", to_json(value, pretty)?);
    Ok(())
}
