//! Per-graph cache of compiled schedules

use super::{CompiledSchedule, compile};
use crate::error::CompileError;
use crate::graph::RenderGraph;
use std::collections::HashMap;
use std::sync::Arc;

/// Caches the compiled schedule of each graph, keyed by graph name
///
/// A cached schedule is returned while the graph's revision is unchanged.
/// Compile errors are never cached.
#[derive(Debug, Default)]
pub struct ScheduleCache {
    entries: HashMap<String, (u64, Arc<CompiledSchedule>)>,
    compilations: usize,
}

impl ScheduleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the schedule for the graph's current revision, compiling it if needed
    pub fn get_or_compile(&mut self, graph: &RenderGraph) -> Result<Arc<CompiledSchedule>, CompileError> {
        if let Some((revision, schedule)) = self.entries.get(graph.name()) {
            if *revision == graph.revision() {
                return Ok(Arc::clone(schedule));
            }
        }

        tracing::debug!(graph = graph.name(), revision = graph.revision(), "schedule cache miss");
        let schedule = match compile(graph) {
            Ok(schedule) => Arc::new(schedule),
            Err(err) => {
                self.entries.remove(graph.name());
                return Err(err);
            }
        };
        self.compilations += 1;
        self.entries.insert(graph.name().to_string(), (graph.revision(), Arc::clone(&schedule)));
        Ok(schedule)
    }

    /// Cached schedule for a graph, regardless of its current revision
    pub fn get(&self, name: &str) -> Option<&Arc<CompiledSchedule>> {
        self.entries.get(name).map(|(_, schedule)| schedule)
    }

    pub fn invalidate(&mut self, name: &str) {
        self.entries.remove(name);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of compilations performed so far
    pub fn compilations(&self) -> usize {
        self.compilations
    }
}
