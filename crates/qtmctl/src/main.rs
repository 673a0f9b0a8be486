use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd_inspect;
mod cmd_roundtrip;

#[derive(Parser, Debug)]
#[command(name = "qtmctl", version, about = "QTM settings CLI")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Summarize the sections of a parameters XML file
    Inspect { file: PathBuf },
    /// Re-emit each section of a parameters file and verify the output is
    /// stable across a read back
    Roundtrip {
        file: PathBuf,
        /// Restrict to one domain (general, 3d, 6dof, gaze, eye-tracker,
        /// analog, force, image, skeleton, calibration)
        #[arg(long)]
        domain: Option<String>,
    },
}

fn main() -> Result<()> {
    let Cli { verbose, cmd } = Cli::parse();

    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| level.into()),
        ))
        .with_target(false)
        .init();

    match cmd {
        Cmd::Inspect { file } => cmd_inspect::run(&file)?,
        Cmd::Roundtrip { file, domain } => cmd_roundtrip::run(&file, domain.as_deref())?,
    }

    Ok(())
}
