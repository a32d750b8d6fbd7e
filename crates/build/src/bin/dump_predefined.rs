//! Predefined graph dumping tool
//!
//! This binary compiles every predefined render graph against the standard
//! pass types and dumps the resulting schedules to a single JSON file, keyed
//! by graph name.

use clap::Parser;
use framegraph_build::{CompiledSchedule, compile_manifest_file, predefined::PREDEFINED_GRAPHS};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(version, about = "Compiles all predefined render graphs and dumps their schedules to a JSON file")]
struct Args {
    /// Path to the workspace root containing `graphs/`
    project_root: PathBuf,

    /// Path to the output JSON file
    output_file: PathBuf,

    /// Increase log verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose > 0 { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let subscriber = tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to install logger: {e}");
    }

    if !args.project_root.exists() {
        eprintln!("Error: Project root '{}' does not exist", args.project_root.display());
        process::exit(1);
    }

    let mut schedules: BTreeMap<&str, CompiledSchedule> = BTreeMap::new();
    let mut failures = 0;
    for &(name, path) in PREDEFINED_GRAPHS {
        tracing::info!(graph = name, path, "compiling predefined graph");
        match compile_manifest_file(args.project_root.join(path), None) {
            Ok(schedule) => {
                schedules.insert(name, schedule);
            }
            Err(e) => {
                eprintln!("Error: Failed to compile predefined graph '{name}' ({path}): {e}");
                failures += 1;
            }
        }
    }
    if failures > 0 {
        eprintln!("{failures} of {} predefined graphs failed to compile", PREDEFINED_GRAPHS.len());
        process::exit(1);
    }

    match serde_json::to_string_pretty(&schedules) {
        Ok(json) => {
            if let Err(e) = fs::write(&args.output_file, json) {
                eprintln!("Error writing output file '{}': {e}", args.output_file.display());
                process::exit(1);
            }
            println!("Successfully wrote {} schedules to '{}'", schedules.len(), args.output_file.display());
        }
        Err(e) => {
            eprintln!("Error serializing schedules to JSON: {e}");
            process::exit(1);
        }
    }
}
