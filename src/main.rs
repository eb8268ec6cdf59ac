use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use unigen::bundle::Bundle;
use unigen::config::Config;
use unigen::error::Error;

#[derive(Parser, Debug)]
#[clap(version, about = "Build the runtime's Unicode data tables.")]
struct Args {
    /// Path to the configuration file
    #[clap(long, value_parser, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Path to the character data bundle
    #[clap(long, value_parser, value_name = "FILE", default_value = "unicode.bin")]
    bundle: PathBuf,

    /// Directory to write the generated C source files into
    #[clap(long, value_parser, value_name = "DIR", default_value = "")]
    output: PathBuf,

    /// Report added features and their size contributions
    #[clap(long)]
    verbose: bool,
}

const BANNER: &str = "/* Generated by unigen. Do not edit. */\n";

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Error> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let mut bundle = Bundle::open(&args.bundle)?;

    let artifacts = unigen::generate(&config, &mut bundle)?;

    // Static analyzers take a very long time on the data tables; the
    // guard lets analysis builds skip them.
    let source = format!(
        "{}#if !defined(__analysis__)\n#include \"unidata.h\"\n#include \"common.h\"\n{}#endif\n",
        BANNER, artifacts.source
    );
    write_artifact(&args.output.join("unidata.c"), &source)?;

    let header = format!(
        "{}#ifndef UNI_DATA_H\n#define UNI_DATA_H\n{}#endif\n",
        BANNER, artifacts.header
    );
    write_artifact(&args.output.join("unidata.h"), &header)?;

    let public_header = format!("{}{}", BANNER, artifacts.public_header);
    write_artifact(&args.output.join("_api.h"), &public_header)?;

    Ok(())
}

fn write_artifact(path: &Path, contents: &str) -> Result<(), Error> {
    fs::write(path, contents).map_err(|err| format!("cannot write {}: {}", path.display(), err))?;
    println!("writing: {}", path.display());
    Ok(())
}
