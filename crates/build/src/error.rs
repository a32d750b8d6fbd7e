//! Structural errors raised while building or compiling a render graph

use crate::config::ConfigError;
use crate::pass_type::SocketDirection;
use crate::resource::ResourceKind;

/// Reasons a graph description is rejected
///
/// Every variant names the offending pass, socket or edge. Compilation aborts
/// on the first error; no partial schedule is ever produced.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("pass instance '{name}' already exists")]
    DuplicateInstanceName { name: String },
    #[error("graph '{name}' already exists")]
    DuplicateGraphName { name: String },
    #[error("unknown pass type '{type_name}'")]
    UnknownPassType { type_name: String },
    #[error("invalid configuration for pass '{instance}': {source}")]
    InvalidConfig {
        instance: String,
        #[source]
        source: ConfigError,
    },
    #[error("'{name}' is not a valid pass instance name")]
    InvalidInstanceName { name: String },
    #[error("unknown pass '{name}'")]
    UnknownPass { name: String },
    #[error("unknown {direction} socket '{socket}'")]
    UnknownSocket { socket: String, direction: SocketDirection },
    #[error("edge {src} -> {dst} connects a {produced} output to a {expected} input")]
    SocketKindMismatch {
        src: String,
        dst: String,
        produced: ResourceKind,
        expected: ResourceKind,
    },
    #[error("input '{dst}' is already bound to '{existing}'")]
    InputAlreadyBound { dst: String, existing: String },
    #[error("cycle detected between passes {}", .passes.join(", "))]
    CycleDetected { passes: Vec<String> },
    #[error("required input '{input}' has no producer{}", .elided_by.as_ref().map(|pass| format!(" (its producer '{pass}' is disabled and cannot pass through)")).unwrap_or_default())]
    UnresolvedRequiredInput { input: String, elided_by: Option<String> },
    #[error("marked output '{output}' is not produced by any enabled pass")]
    UnresolvedMarkedOutput { output: String },
}
