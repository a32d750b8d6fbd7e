//! Dry run of a render graph
//!
//! Compiles a graph manifest and executes it for a number of frames with
//! null passes over host memory, printing resource pool statistics after
//! every frame.

use clap::Parser;
use framegraph::{Executor, FrameContext, HostAllocator, HostResource, PassLibrary, ResourcePool, RuntimeConfig};
use framegraph_build::{compile, load_graph};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(version, about = "Runs a render graph for a few frames and reports resource pool usage")]
struct Args {
    /// Graph manifest (.yaml, .json or .py)
    graph: PathBuf,

    /// Number of frames to run
    #[arg(long, default_value_t = 4)]
    frames: u64,

    /// Runtime configuration (YAML)
    #[arg(long)]
    config: Option<PathBuf>,

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

    if let Err(e) = simulate(&args) {
        eprintln!("Error simulating '{}': {e}", args.graph.display());
        process::exit(1);
    }
}

fn simulate(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => RuntimeConfig::from_file(path)?,
        None => RuntimeConfig::default(),
    };

    let library = PassLibrary::<HostResource>::with_standard_passes();
    let graph = load_graph(&args.graph, library.registry())?;
    let schedule = Arc::new(compile(&graph)?);
    println!(
        "{}: {} passes, {} resources, {} allocations ({} of {} bytes after aliasing)",
        schedule.name,
        schedule.passes.len(),
        schedule.resources.len(),
        schedule.allocations.len(),
        schedule.physical_bytes(),
        schedule.logical_bytes(),
    );

    let mut pool = ResourcePool::new(HostAllocator::new(), config.pool);
    let mut executor = Executor::new(Arc::clone(&schedule), &library, config.executor)?;
    for index in 0..args.frames {
        executor.run_frame(&mut pool, &FrameContext::new(index))?;
        println!(
            "frame {index}: {} entries ({} free), {} bytes, {} references held, {} allocations so far",
            pool.len(),
            pool.free_count(),
            pool.allocated_bytes(),
            pool.outstanding_references(),
            pool.allocator().allocations(),
        );
    }

    for output in &schedule.outputs {
        let socket = output.socket.to_string();
        if let Some(handle) = executor.output(&socket) {
            println!("output {socket}: {handle}");
        }
    }

    executor.shutdown(&mut pool)?;
    Ok(())
}
