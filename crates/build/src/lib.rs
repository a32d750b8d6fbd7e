//! Render graph build utilities
//!
//! This crate holds everything needed to describe and compile a render graph
//! without executing it: the resource model, pass type schemas and their
//! registry, the mutable graph builder, manifest formats, and the compiler
//! that turns a graph into an immutable, resource-bound schedule.

pub mod catalog;
pub mod compiler;
pub mod config;
pub mod error;
pub mod graph;
pub mod manifest;
pub mod pass_type;
pub mod predefined;
pub mod registry;
pub mod resource;

pub use compiler::{CompiledSchedule, ScheduleCache, compile, validate};
pub use config::{ConfigMap, ConfigObject, ConfigSchema, ConfigValue, PassConfig};
pub use error::CompileError;
pub use graph::{GraphCollection, PassInstance, RenderGraph, SocketRef};
pub use manifest::{GraphManifest, ManifestError, ManifestFormat, load_graph};
pub use pass_type::{InputSocket, OutputSocket, PassType};
pub use registry::{PassRegistry, RegistryError};
pub use resource::{Extent, Format, ResourceDesc, ResourceKind, SizeClass, SizePolicy};

/// Compiles a graph manifest file against the standard pass types
///
/// # Arguments
/// * `manifest_path` - Path to a YAML, JSON or script manifest
/// * `extent` - Reference extent overriding the manifest's, if any
///
/// # Returns
/// The compiled schedule of the described graph
pub fn compile_manifest_file<P: AsRef<std::path::Path>>(manifest_path: P, extent: Option<Extent>) -> Result<CompiledSchedule, ManifestError> {
    let registry = PassRegistry::with_standard_types();
    let mut graph = load_graph(manifest_path, &registry)?;
    if let Some(extent) = extent {
        graph.set_reference_extent(extent);
    }
    Ok(compile(&graph)?)
}
