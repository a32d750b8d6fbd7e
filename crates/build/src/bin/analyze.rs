//! Render graph analysis tool
//!
//! Loads a graph manifest (YAML, JSON or script), builds it against the
//! standard pass types and compiles it. On success the compiled schedule, or
//! the graph re-emitted in another manifest format, is written to stdout.
//! Diagnostics go to stderr and the process exits with a non-zero status.

use clap::{Parser, ValueEnum};
use framegraph_build::{Extent, GraphManifest, ManifestFormat, PassRegistry, compile};
use std::path::PathBuf;
use std::process;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    Yaml,
    Json,
    Script,
    /// The compiled schedule as JSON
    Schedule,
}

#[derive(Parser)]
#[command(version, about = "Validates a render graph manifest and dumps the compiled result")]
struct Args {
    /// Graph manifest (.yaml, .json or .py)
    manifest: PathBuf,

    /// Only validate; print a one-line summary instead of the schedule
    #[arg(long)]
    validate: bool,

    /// What to write to stdout
    #[arg(long, value_enum, default_value = "schedule")]
    emit: Emit,

    /// Reference width, overriding the manifest
    #[arg(long, requires = "height")]
    width: Option<u32>,

    /// Reference height, overriding the manifest
    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let subscriber = tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to install logger: {e}");
    }

    if !args.manifest.exists() {
        eprintln!("Error: Manifest file '{}' does not exist", args.manifest.display());
        process::exit(1);
    }

    match analyze(&args) {
        Ok(output) => print!("{output}"),
        Err(e) => {
            eprintln!("Error compiling manifest '{}': {e}", args.manifest.display());
            process::exit(1);
        }
    }
}

fn analyze(args: &Args) -> Result<String, Box<dyn std::error::Error>> {
    let registry = PassRegistry::with_standard_types();
    let manifest = GraphManifest::from_file(&args.manifest)?;
    let mut graph = manifest.to_graph(&registry)?;
    if let (Some(width), Some(height)) = (args.width, args.height) {
        graph.set_reference_extent(Extent::new(width, height));
    }

    let schedule = compile(&graph)?;
    if args.validate {
        return Ok(format!(
            "{}: ok ({} passes, {} resources, {} allocations, {} of {} bytes after aliasing)\n",
            schedule.name,
            schedule.passes.len(),
            schedule.resources.len(),
            schedule.allocations.len(),
            schedule.physical_bytes(),
            schedule.logical_bytes(),
        ));
    }

    let output = match args.emit {
        Emit::Yaml => GraphManifest::from_graph(&graph).emit(ManifestFormat::Yaml)?,
        Emit::Json => GraphManifest::from_graph(&graph).emit(ManifestFormat::Json)?,
        Emit::Script => GraphManifest::from_graph(&graph).emit(ManifestFormat::Script)?,
        Emit::Schedule => schedule.to_json()?,
    };
    Ok(if output.ends_with('\n') { output } else { output + "\n" })
}
