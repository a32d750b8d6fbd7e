//! Compiled schedule produced by the compiler

use crate::config::PassConfig;
use crate::graph::{Edge, SocketRef};
use crate::resource::{Extent, ResourceDesc};
use serde::Serialize;

/// A fully validated, ordered and resource-bound execution plan
///
/// Immutable once produced. Serializes to JSON for inspection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledSchedule {
    /// Name of the compiled graph
    pub name: String,
    /// Extent that `Reference` and `Scaled` outputs were sized against
    pub reference_extent: Extent,
    /// Enabled passes in execution order
    pub passes: Vec<ScheduledPass>,
    /// Edges between enabled passes after pass-through rewiring
    pub edges: Vec<Edge>,
    /// Logical resources, indexed by their id
    pub resources: Vec<LogicalResource>,
    /// Physical allocations, indexed by their id
    pub allocations: Vec<Allocation>,
    /// Marked graph outputs
    pub outputs: Vec<MarkedOutput>,
}

/// One pass of the schedule with its resolved bindings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledPass {
    pub instance: String,
    pub type_name: String,
    pub config: PassConfig,
    /// Connected inputs in declaration order; unconnected optional inputs are absent
    pub inputs: Vec<ResourceBinding>,
    /// Outputs that back a logical resource; unused optional outputs are absent
    pub outputs: Vec<ResourceBinding>,
}

/// Binding of a logical resource to a socket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceBinding {
    pub socket: String,
    pub resource: usize,
    pub allocation: usize,
    pub desc: ResourceDesc,
}

/// A value produced by one output socket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogicalResource {
    pub id: usize,
    pub producer: SocketRef,
    pub desc: ResourceDesc,
    /// Schedule index of the producing pass
    pub first_use: usize,
    /// Schedule index of the last pass reading it
    pub last_use: usize,
    pub persistent: bool,
    pub marked: bool,
    pub allocation: usize,
}

/// A physical allocation serving one or more logical resources
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Allocation {
    pub id: usize,
    pub desc: ResourceDesc,
    /// Union of the lifetimes of the resources it serves
    pub first_use: usize,
    pub last_use: usize,
    /// Logical resources served, in the order they were assigned
    pub resources: Vec<usize>,
    pub persistent: bool,
}

/// A marked graph output and the logical resource holding it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkedOutput {
    /// The socket as it was marked
    pub socket: SocketRef,
    pub resource: usize,
}

impl CompiledSchedule {
    pub fn pass(&self, instance: &str) -> Option<&ScheduledPass> {
        self.passes.iter().find(|pass| pass.instance == instance)
    }

    /// Position of a pass in the execution order
    pub fn position(&self, instance: &str) -> Option<usize> {
        self.passes.iter().position(|pass| pass.instance == instance)
    }

    /// The logical resource produced by an output socket
    pub fn resource_of(&self, producer: &SocketRef) -> Option<&LogicalResource> {
        self.resources.iter().find(|resource| &resource.producer == producer)
    }

    /// The marked output registered under `socket` (`"Pass.socket"`)
    pub fn output(&self, socket: &str) -> Option<&MarkedOutput> {
        self.outputs.iter().find(|output| output.socket.to_string() == socket)
    }

    /// Whether an allocation backs a marked output
    pub fn is_marked_allocation(&self, allocation: usize) -> bool {
        self.outputs.iter().any(|output| self.resources[output.resource].allocation == allocation)
    }

    /// Bytes that would be allocated without aliasing
    pub fn logical_bytes(&self) -> u64 {
        self.resources.iter().map(|resource| resource.desc.size_in_bytes()).sum()
    }

    /// Bytes actually allocated
    pub fn physical_bytes(&self) -> u64 {
        self.allocations.iter().map(|allocation| allocation.desc.size_in_bytes()).sum()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
