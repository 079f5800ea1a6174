use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Assemble composite application dependency snapshots from per-service scan artifacts",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the scan processor on one raw artifact and print the processed
    /// form (debugging aid for scanner output)
    Process {
        /// Path to a raw scan artifact (JSON)
        scan: PathBuf,

        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
    },

    /// Assemble a snapshot for a build request from a directory of scan
    /// artifacts
    Build {
        /// Path to the build request (JSON)
        #[arg(long)]
        request: PathBuf,

        /// Directory of scan artifacts ({service}@{commit}.json and
        /// {service}@{commit}.failed.json files)
        #[arg(long)]
        scans: PathBuf,

        /// Write the snapshot here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
    },
}
