//! Graph description and its builder operations
//!
//! A [`RenderGraph`] is the mutable authoring surface: pass instances, the edges
//! wiring output sockets to input sockets, and the set of marked outputs.
//! Builder operations validate locally (socket existence, kinds, single
//! producer per input); whole-graph properties are checked by the compiler.

use crate::config::{ConfigMap, PassConfig};
use crate::error::CompileError;
use crate::pass_type::{InputSocket, OutputSocket, PassType, SocketDirection};
use crate::resource::Extent;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of revision stamps; shared by all graphs so a revision identifies one structural state
static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, Ordering::Relaxed)
}

/// Reference to a socket of a pass instance, written `"Instance.socket"`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SocketRef {
    pub pass: String,
    pub socket: String,
}

impl SocketRef {
    pub fn new(pass: &str, socket: &str) -> Self {
        Self {
            pass: pass.to_string(),
            socket: socket.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("socket reference '{0}' is not of the form 'Pass.socket'")]
pub struct SocketRefParseError(pub String);

impl FromStr for SocketRef {
    type Err = SocketRefParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((pass, socket)) if !pass.is_empty() && !socket.is_empty() => Ok(Self::new(pass, socket)),
            _ => Err(SocketRefParseError(s.to_string())),
        }
    }
}

impl fmt::Display for SocketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.pass, self.socket)
    }
}

impl Serialize for SocketRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SocketRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A named instance of a pass type inside one graph
#[derive(Debug, Clone, PartialEq)]
pub struct PassInstance {
    pass_type: Arc<PassType>,
    name: String,
    config: PassConfig,
    overrides: ConfigMap,
    enabled: bool,
}

impl PassInstance {
    pub(crate) fn new(pass_type: Arc<PassType>, name: &str, config: PassConfig, overrides: ConfigMap) -> Self {
        Self {
            pass_type,
            name: name.to_string(),
            config,
            overrides,
            enabled: true,
        }
    }

    /// Sets the initial enabled flag, before the instance is added to a graph
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn pass_type(&self) -> &Arc<PassType> {
        &self.pass_type
    }

    pub fn type_name(&self) -> &str {
        self.pass_type.name()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved configuration: schema defaults overridden by author values
    pub fn config(&self) -> &PassConfig {
        &self.config
    }

    /// Only the values the author wrote, in the order they were written
    pub fn overrides(&self) -> &ConfigMap {
        &self.overrides
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// A binding from a producer output socket to a consumer input socket
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub src: SocketRef,
    pub dst: SocketRef,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}

/// Mutable description of a render graph
#[derive(Debug, Clone)]
pub struct RenderGraph {
    name: String,
    reference_extent: Extent,
    passes: Vec<PassInstance>,
    edges: Vec<Edge>,
    outputs: Vec<SocketRef>,
    revision: u64,
}

impl RenderGraph {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reference_extent: Extent::default(),
            passes: Vec::new(),
            edges: Vec::new(),
            outputs: Vec::new(),
            revision: next_revision(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reference_extent(&self) -> Extent {
        self.reference_extent
    }

    /// Pass instances in the order they were added
    pub fn passes(&self) -> &[PassInstance] {
        &self.passes
    }

    pub fn pass(&self, name: &str) -> Option<&PassInstance> {
        self.passes.iter().find(|pass| pass.name == name)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn outputs(&self) -> &[SocketRef] {
        &self.outputs
    }

    /// Structural revision, changed by every builder operation that alters the graph
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision = next_revision();
    }

    /// The output socket currently bound to `dst`, if any
    pub fn producer_of(&self, dst: &SocketRef) -> Option<&SocketRef> {
        self.edges.iter().find(|edge| &edge.dst == dst).map(|edge| &edge.src)
    }

    pub fn add_pass(&mut self, instance: PassInstance) -> Result<(), CompileError> {
        if self.pass(&instance.name).is_some() {
            return Err(CompileError::DuplicateInstanceName { name: instance.name });
        }
        tracing::debug!(graph = %self.name, pass = %instance.name, pass_type = instance.type_name(), "added pass");
        self.passes.push(instance);
        self.touch();
        Ok(())
    }

    /// Removes a pass together with every edge and mark touching it
    pub fn remove_pass(&mut self, name: &str) -> Result<PassInstance, CompileError> {
        let index = self
            .passes
            .iter()
            .position(|pass| pass.name == name)
            .ok_or_else(|| CompileError::UnknownPass { name: name.to_string() })?;
        let removed = self.passes.remove(index);
        self.edges.retain(|edge| edge.src.pass != name && edge.dst.pass != name);
        self.outputs.retain(|output| output.pass != name);
        self.touch();
        Ok(removed)
    }

    /// Connects the output socket `src` to the input socket `dst`, both written `"Pass.socket"`
    pub fn add_edge(&mut self, src: &str, dst: &str) -> Result<(), CompileError> {
        let (src_ref, output) = self.resolve_output(src)?;
        let (dst_ref, input) = self.resolve_input(dst)?;

        if !output.kind.can_feed(input.kind) {
            return Err(CompileError::SocketKindMismatch {
                src: src.to_string(),
                dst: dst.to_string(),
                produced: output.kind,
                expected: input.kind,
            });
        }
        if let Some(existing) = self.producer_of(&dst_ref) {
            return Err(CompileError::InputAlreadyBound {
                dst: dst.to_string(),
                existing: existing.to_string(),
            });
        }

        self.edges.push(Edge { src: src_ref, dst: dst_ref });
        self.touch();
        Ok(())
    }

    /// Removes the edge `src -> dst`, returning whether it existed
    pub fn remove_edge(&mut self, src: &str, dst: &str) -> bool {
        let before = self.edges.len();
        self.edges.retain(|edge| edge.src.to_string() != src || edge.dst.to_string() != dst);
        let removed = self.edges.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    /// Marks an output socket as a graph output; marking twice is a no-op
    pub fn mark_output(&mut self, socket: &str) -> Result<(), CompileError> {
        let (socket_ref, _) = self.resolve_output(socket)?;
        if !self.outputs.contains(&socket_ref) {
            self.outputs.push(socket_ref);
            self.touch();
        }
        Ok(())
    }

    /// Unmarks a graph output, returning whether it was marked
    pub fn unmark_output(&mut self, socket: &str) -> bool {
        let before = self.outputs.len();
        self.outputs.retain(|output| output.to_string() != socket);
        let removed = self.outputs.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    /// Toggles a pass; the pass and its edges stay in the graph either way
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), CompileError> {
        let pass = self
            .passes
            .iter_mut()
            .find(|pass| pass.name == name)
            .ok_or_else(|| CompileError::UnknownPass { name: name.to_string() })?;
        if pass.enabled != enabled {
            pass.enabled = enabled;
            tracing::debug!(graph = %self.name, pass = name, enabled, "toggled pass");
            self.touch();
        }
        Ok(())
    }

    pub fn set_reference_extent(&mut self, extent: Extent) {
        if self.reference_extent != extent {
            self.reference_extent = extent;
            self.touch();
        }
    }

    fn resolve_output(&self, socket: &str) -> Result<(SocketRef, &OutputSocket), CompileError> {
        let unknown = || CompileError::UnknownSocket {
            socket: socket.to_string(),
            direction: SocketDirection::Output,
        };
        let socket_ref: SocketRef = socket.parse().map_err(|_| unknown())?;
        let output = self.pass(&socket_ref.pass).and_then(|pass| pass.pass_type.find_output(&socket_ref.socket)).ok_or_else(unknown)?;
        Ok((socket_ref, output))
    }

    fn resolve_input(&self, socket: &str) -> Result<(SocketRef, &InputSocket), CompileError> {
        let unknown = || CompileError::UnknownSocket {
            socket: socket.to_string(),
            direction: SocketDirection::Input,
        };
        let socket_ref: SocketRef = socket.parse().map_err(|_| unknown())?;
        let input = self.pass(&socket_ref.pass).and_then(|pass| pass.pass_type.find_input(&socket_ref.socket)).ok_or_else(unknown)?;
        Ok((socket_ref, input))
    }
}

/// Explicit owner of a set of named graphs
#[derive(Debug, Clone, Default)]
pub struct GraphCollection {
    graphs: Vec<RenderGraph>,
}

impl GraphCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, graph: RenderGraph) -> Result<(), CompileError> {
        if self.get(graph.name()).is_some() {
            return Err(CompileError::DuplicateGraphName { name: graph.name });
        }
        self.graphs.push(graph);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<RenderGraph> {
        let index = self.graphs.iter().position(|graph| graph.name == name)?;
        Some(self.graphs.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&RenderGraph> {
        self.graphs.iter().find(|graph| graph.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut RenderGraph> {
        self.graphs.iter_mut().find(|graph| graph.name == name)
    }

    /// Graphs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &RenderGraph> {
        self.graphs.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.graphs.iter().map(|graph| graph.name())
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigMap;
    use crate::pass_type::OutputSocket;
    use crate::registry::PassRegistry;
    use crate::resource::{Format, ResourceKind};

    fn registry() -> PassRegistry {
        let mut registry = PassRegistry::new();
        registry
            .register(PassType::new("Source").output(OutputSocket::new("color", ResourceKind::Texture, Format::Rgba32Float)).output(OutputSocket::new(
                "depth",
                ResourceKind::Depth,
                Format::D32Float,
            )))
            .unwrap();
        registry
            .register(
                PassType::new("Filter")
                    .input("src", ResourceKind::Texture)
                    .output(OutputSocket::new("dst", ResourceKind::Texture, Format::Rgba32Float)),
            )
            .unwrap();
        registry
            .register(PassType::new("DepthOnly").input("depth", ResourceKind::Depth).output(OutputSocket::new("dst", ResourceKind::Buffer, Format::Raw)))
            .unwrap();
        registry
    }

    fn graph(registry: &PassRegistry) -> RenderGraph {
        let mut graph = RenderGraph::new("Test");
        graph.add_pass(registry.create("Source", "Src", ConfigMap::new()).unwrap()).unwrap();
        graph.add_pass(registry.create("Filter", "F", ConfigMap::new()).unwrap()).unwrap();
        graph.add_pass(registry.create("DepthOnly", "D", ConfigMap::new()).unwrap()).unwrap();
        graph
    }

    #[test]
    fn test_socket_ref_parsing() {
        assert_eq!("GBuffer.posW".parse::<SocketRef>().unwrap(), SocketRef::new("GBuffer", "posW"));
        assert!("GBuffer".parse::<SocketRef>().is_err());
        assert!(".posW".parse::<SocketRef>().is_err());
        assert!("GBuffer.".parse::<SocketRef>().is_err());
        assert_eq!(SocketRef::new("A", "b").to_string(), "A.b");
    }

    #[test]
    fn test_duplicate_instance_name() {
        let registry = registry();
        let mut graph = graph(&registry);
        let err = graph.add_pass(registry.create("Filter", "F", ConfigMap::new()).unwrap()).unwrap_err();
        assert_eq!(err, CompileError::DuplicateInstanceName { name: "F".to_string() });
    }

    #[test]
    fn test_add_edge_validates_endpoints() {
        let registry = registry();
        let mut graph = graph(&registry);

        graph.add_edge("Src.color", "F.src").unwrap();
        assert!(matches!(
            graph.add_edge("Src.missing", "F.src"),
            Err(CompileError::UnknownSocket {
                direction: SocketDirection::Output,
                ..
            })
        ));
        // An input socket is not a valid source
        assert!(matches!(graph.add_edge("F.src", "D.depth"), Err(CompileError::UnknownSocket { .. })));
        assert!(matches!(
            graph.add_edge("Src.color", "Nope.src"),
            Err(CompileError::UnknownSocket {
                direction: SocketDirection::Input,
                ..
            })
        ));
        assert!(matches!(graph.add_edge("Src.color", "D.depth"), Err(CompileError::SocketKindMismatch { .. })));
        assert_eq!(
            graph.add_edge("Src.color", "F.src"),
            Err(CompileError::InputAlreadyBound {
                dst: "F.src".to_string(),
                existing: "Src.color".to_string()
            })
        );
        assert_eq!(graph.edges().len(), 1);
    }

    #[test]
    fn test_depth_feeds_texture_input() {
        let registry = registry();
        let mut graph = graph(&registry);
        graph.add_edge("Src.depth", "F.src").unwrap();
        graph.add_edge("Src.depth", "D.depth").unwrap();
        assert_eq!(graph.edges().len(), 2);
    }

    #[test]
    fn test_mark_output_twice_is_noop() {
        let registry = registry();
        let mut graph = graph(&registry);
        graph.mark_output("F.dst").unwrap();
        let revision = graph.revision();
        graph.mark_output("F.dst").unwrap();
        assert_eq!(graph.revision(), revision);
        assert_eq!(graph.outputs().len(), 1);
        assert!(graph.mark_output("F.src").is_err());

        assert!(graph.unmark_output("F.dst"));
        assert!(!graph.unmark_output("F.dst"));
        assert!(graph.revision() > revision);
    }

    #[test]
    fn test_revision_changes_only_on_structural_change() {
        let registry = registry();
        let mut graph = graph(&registry);

        let revision = graph.revision();
        graph.set_enabled("F", true).unwrap();
        assert_eq!(graph.revision(), revision);
        graph.set_enabled("F", false).unwrap();
        assert!(graph.revision() > revision);
        assert!(!graph.pass("F").unwrap().is_enabled());

        let revision = graph.revision();
        graph.set_reference_extent(graph.reference_extent());
        assert_eq!(graph.revision(), revision);
        graph.set_reference_extent(Extent::new(640, 480));
        assert!(graph.revision() > revision);

        assert_eq!(graph.set_enabled("Nope", true), Err(CompileError::UnknownPass { name: "Nope".to_string() }));
    }

    #[test]
    fn test_remove_pass_drops_edges_and_marks() {
        let registry = registry();
        let mut graph = graph(&registry);
        graph.add_edge("Src.color", "F.src").unwrap();
        graph.add_edge("Src.depth", "D.depth").unwrap();
        graph.mark_output("F.dst").unwrap();

        let removed = graph.remove_pass("F").unwrap();
        assert_eq!(removed.name(), "F");
        assert_eq!(graph.edges().len(), 1);
        assert!(graph.outputs().is_empty());
        assert!(graph.remove_pass("F").is_err());

        assert!(graph.remove_edge("Src.depth", "D.depth"));
        assert!(!graph.remove_edge("Src.depth", "D.depth"));
        assert!(graph.edges().is_empty());
    }

    #[test]
    fn test_collection_rejects_duplicate_names() {
        let mut collection = GraphCollection::new();
        collection.insert(RenderGraph::new("A")).unwrap();
        collection.insert(RenderGraph::new("B")).unwrap();
        assert_eq!(collection.insert(RenderGraph::new("A")), Err(CompileError::DuplicateGraphName { name: "A".to_string() }));
        assert_eq!(collection.names().collect::<Vec<_>>(), vec!["A", "B"]);

        collection.get_mut("B").unwrap().set_reference_extent(Extent::new(1, 1));
        assert_eq!(collection.get("B").unwrap().reference_extent(), Extent::new(1, 1));
        assert!(collection.remove("A").is_some());
        assert_eq!(collection.len(), 1);
    }
}
