use std::{path::PathBuf, process::ExitCode};

use anyhow::{ensure, Context};
use clap::{error::ErrorKind, ArgAction, Parser};
use gpkg::archive::ArchiveContainer;
use tap::Pipe;

/// Packs a directory tree into a GPKG archive.
#[derive(Debug, Parser)]
#[command(name = "gpkg", version, disable_version_flag = true)]
struct Cli {
    /// Directory whose files become archive entries
    #[arg(short, long)]
    pub input: PathBuf,

    /// Archive to create
    #[arg(short, long)]
    pub output: PathBuf,

    /// Print version
    #[arg(short = 'v', long, action = ArgAction::Version)]
    version: Option<bool>,
}

fn main() -> ExitCode {
    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // Help and version go to stdout, usage errors to stderr
            e.print().ok();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    match pack(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn pack(args: &Cli) -> anyhow::Result<()> {
    ensure!(
        args.input.is_dir(),
        "Input {} is not a directory",
        args.input.display()
    );

    gpkg::archive::build(&args.input, &args.output).with_context(|| {
        format!(
            "Unable to build {} from {}",
            args.output.display(),
            args.input.display()
        )
    })?;

    // Reopen what was written so a broken archive never goes unnoticed
    let entries = ArchiveContainer::open(&args.output)
        .with_context(|| format!("Unable to reopen {}", args.output.display()))?
        .pipe(|container| container.len());
    println!("{}: {entries} entries", args.output.display());

    Ok(())
}
