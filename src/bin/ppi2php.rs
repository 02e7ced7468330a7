//! ppi2php
//!
//! Rebuilds a PPI dump of a Perl file and writes the generated PHP.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use ppi_rs::{dump_json, ConvertOptions, Converter, Result, SourceEcho};

#[derive(Parser)]
#[command(name = "ppi2php")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Perl source file (or a dump file with --from-dump)
    source: PathBuf,

    /// Output file; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Suppress progress messages
    #[arg(short, long)]
    quiet: bool,

    /// Write the reconstructed structure to this file
    #[arg(long)]
    dump_struct: Option<PathBuf>,

    /// Write the reconstructed tree as JSON to this file
    #[arg(long)]
    json_tree: Option<PathBuf>,

    /// Seconds to wait for the dumper (0 disables the limit)
    #[arg(long)]
    timeout: Option<u64>,

    /// Perl executable
    #[arg(long)]
    perl: Option<PathBuf>,

    /// Extra perl include directories
    #[arg(short = 'I', long = "include")]
    include: Vec<PathBuf>,

    /// JSON options file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Treat SOURCE as an existing dump instead of Perl source
    #[arg(long)]
    from_dump: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_options(cli: &Cli) -> Result<ConvertOptions> {
    let mut options = match &cli.config {
        Some(path) => ConvertOptions::from_json(&fs::read_to_string(path)?)?,
        None => ConvertOptions::default(),
    };
    options.quiet |= cli.quiet;
    if cli.dump_struct.is_some() {
        options.debug_dump = cli.dump_struct.clone();
    }
    if let Some(secs) = cli.timeout {
        options.timeout_secs = (secs > 0).then_some(secs);
    }
    if let Some(perl) = &cli.perl {
        options.perl = perl.clone();
    }
    options.include_dirs.extend(cli.include.iter().cloned());
    Ok(options)
}

fn run(cli: &Cli) -> Result<()> {
    let options = load_options(cli)?;
    let mut converter = Converter::with_options(SourceEcho, options);

    if cli.from_dump {
        let bytes = fs::read(&cli.source)?;
        converter.read_lines(String::from_utf8_lossy(&bytes).lines())?;
    } else {
        converter.read_file(&cli.source)?;
    }

    if let (Some(path), Some(tree)) = (&cli.json_tree, converter.tree()) {
        fs::write(path, dump_json(tree)?)?;
    }

    let conversion = converter.convert()?;
    write_output(cli.output.as_deref(), &conversion.output)
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => fs::write(path, text)?,
        None => print!("{}", text),
    }
    Ok(())
}
