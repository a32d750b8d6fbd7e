//! Render graph compiler
//!
//! Turns a [`RenderGraph`] into an immutable [`CompiledSchedule`] in stages:
//!
//! 1. enablement resolution (pass-through rewiring of disabled passes),
//! 2. topological ordering with cycle detection,
//! 3. binding resolution for required inputs and marked outputs,
//! 4. size and format propagation,
//! 5. lifetime analysis,
//! 6. physical allocation assignment.
//!
//! Each stage fails fast with a [`CompileError`] naming the offending pass,
//! socket or edge.

mod aliasing;
mod cache;
mod schedule;

pub use aliasing::{ResourceLifetime, assign_allocations};
pub use cache::ScheduleCache;
pub use schedule::{Allocation, CompiledSchedule, LogicalResource, MarkedOutput, ResourceBinding, ScheduledPass};

use crate::error::CompileError;
use crate::graph::{Edge, PassInstance, RenderGraph, SocketRef};
use crate::pass_type::OutputSocket;
use crate::resource::{Extent, OutputSize, ResourceDesc, ScaleFactor, SizeClass, SizePolicy};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Compiles a graph description into an execution schedule
pub fn compile(graph: &RenderGraph) -> Result<CompiledSchedule, CompileError> {
    let enablement = resolve_enablement(graph)?;
    let order = topological_order(graph, &enablement.edges)?;
    check_required_inputs(graph, &order, &enablement)?;
    let marked = resolve_marked_outputs(graph)?;

    let passes: Vec<&PassInstance> = order.iter().map(|&index| &graph.passes()[index]).collect();
    let position: HashMap<&str, usize> = passes.iter().enumerate().map(|(position, pass)| (pass.name(), position)).collect();
    let producer_of: HashMap<&SocketRef, &SocketRef> = enablement.edges.iter().map(|edge| (&edge.dst, &edge.src)).collect();

    // Size/format propagation and lifetime analysis
    let last_position = passes.len().saturating_sub(1);
    let mut lifetimes: Vec<ResourceLifetime> = Vec::new();
    let mut producers: Vec<SocketRef> = Vec::new();
    let mut resource_of: HashMap<SocketRef, usize> = HashMap::new();
    for (index, pass) in passes.iter().enumerate() {
        for output in pass.pass_type().outputs() {
            let socket = SocketRef::new(pass.name(), &output.name);
            let consumers: Vec<usize> = enablement
                .edges
                .iter()
                .filter(|edge| edge.src == socket)
                .filter_map(|edge| position.get(edge.dst.pass.as_str()).copied())
                .collect();
            let is_marked = marked.iter().any(|(_, live)| live == &socket);
            if consumers.is_empty() && !is_marked && !output.persistent && output.optional {
                continue;
            }

            let desc = output_desc(graph.reference_extent(), pass, output, |input| {
                let producer = producer_of.get(&SocketRef::new(pass.name(), input))?;
                let id = resource_of.get(*producer)?;
                Some(lifetimes[*id].desc)
            });
            let (first_use, last_use) = if output.persistent {
                (0, last_position)
            } else if is_marked {
                (index, last_position)
            } else {
                (index, consumers.iter().copied().max().unwrap_or(index))
            };

            let id = lifetimes.len();
            lifetimes.push(ResourceLifetime {
                id,
                desc,
                first_use,
                last_use,
                persistent: output.persistent,
            });
            producers.push(socket.clone());
            resource_of.insert(socket, id);
        }
    }

    let (allocations, assignments) = assign_allocations(&lifetimes);

    let resources: Vec<LogicalResource> = lifetimes
        .iter()
        .zip(producers)
        .map(|(lifetime, producer)| LogicalResource {
            id: lifetime.id,
            desc: lifetime.desc,
            marked: marked.iter().any(|(_, live)| live == &producer),
            producer,
            first_use: lifetime.first_use,
            last_use: lifetime.last_use,
            persistent: lifetime.persistent,
            allocation: assignments[lifetime.id],
        })
        .collect();

    let binding = |socket: &str, id: usize| ResourceBinding {
        socket: socket.to_string(),
        resource: id,
        allocation: assignments[id],
        desc: lifetimes[id].desc,
    };

    let scheduled: Vec<ScheduledPass> = passes
        .iter()
        .map(|pass| ScheduledPass {
            instance: pass.name().to_string(),
            type_name: pass.type_name().to_string(),
            config: pass.config().clone(),
            inputs: pass
                .pass_type()
                .inputs()
                .iter()
                .filter_map(|input| {
                    let producer = producer_of.get(&SocketRef::new(pass.name(), &input.name))?;
                    Some(binding(&input.name, *resource_of.get(*producer)?))
                })
                .collect(),
            outputs: pass
                .pass_type()
                .outputs()
                .iter()
                .filter_map(|output| Some(binding(&output.name, *resource_of.get(&SocketRef::new(pass.name(), &output.name))?)))
                .collect(),
        })
        .collect();

    let outputs: Vec<MarkedOutput> = marked
        .iter()
        .filter_map(|(socket, live)| {
            Some(MarkedOutput {
                socket: socket.clone(),
                resource: *resource_of.get(live)?,
            })
        })
        .collect();

    let schedule = CompiledSchedule {
        name: graph.name().to_string(),
        reference_extent: graph.reference_extent(),
        passes: scheduled,
        edges: enablement.edges,
        resources,
        allocations,
        outputs,
    };

    tracing::info!(
        graph = %schedule.name,
        passes = schedule.passes.len(),
        resources = schedule.resources.len(),
        allocations = schedule.allocations.len(),
        physical_bytes = schedule.physical_bytes(),
        "compiled render graph"
    );
    Ok(schedule)
}

/// Runs every compiler stage and discards the schedule
pub fn validate(graph: &RenderGraph) -> Result<(), CompileError> {
    compile(graph).map(|_| ())
}

/// Effective wiring once disabled passes are rewired or elided
struct Enablement {
    /// Edges between enabled passes, in the order the original edges were added
    edges: Vec<Edge>,
    /// Consumer inputs that lost their producer, with the disabled pass that elided it
    elided: HashMap<SocketRef, String>,
}

/// Where an output socket's value effectively comes from
enum Producer {
    /// An output socket of an enabled pass
    Live(SocketRef),
    /// Dropped by this disabled pass
    Elided(String),
}

/// Follows pass-throughs of disabled passes back to a live producer
fn resolve_producer(graph: &RenderGraph, socket: &SocketRef) -> Producer {
    let mut current = socket.clone();
    let mut visited: HashSet<String> = HashSet::new();
    loop {
        let Some(pass) = graph.pass(&current.pass) else {
            return Producer::Elided(current.pass);
        };
        if pass.is_enabled() {
            return Producer::Live(current);
        }
        // A cycle made only of disabled passes terminates as elision
        if !visited.insert(pass.name().to_string()) {
            return Producer::Elided(pass.name().to_string());
        }
        let upstream = match pass.pass_type().pass_through() {
            Some((input, output)) if output.name == current.socket => graph.producer_of(&SocketRef::new(pass.name(), &input.name)),
            _ => None,
        };
        match upstream {
            Some(next) => current = next.clone(),
            None => return Producer::Elided(pass.name().to_string()),
        }
    }
}

fn resolve_enablement(graph: &RenderGraph) -> Result<Enablement, CompileError> {
    let mut edges = Vec::new();
    let mut elided = HashMap::new();

    for edge in graph.edges() {
        let Some(consumer) = graph.pass(&edge.dst.pass).filter(|pass| pass.is_enabled()) else {
            continue;
        };
        match resolve_producer(graph, &edge.src) {
            Producer::Live(src) => {
                if src != edge.src {
                    let produced = graph.pass(&src.pass).and_then(|pass| pass.pass_type().find_output(&src.socket)).map(|output| output.kind);
                    let expected = consumer.pass_type().find_input(&edge.dst.socket).map(|input| input.kind);
                    if let (Some(produced), Some(expected)) = (produced, expected) {
                        if !produced.can_feed(expected) {
                            return Err(CompileError::SocketKindMismatch {
                                src: src.to_string(),
                                dst: edge.dst.to_string(),
                                produced,
                                expected,
                            });
                        }
                    }
                    tracing::debug!(from = %edge.src, to = %src, consumer = %edge.dst, "rewired through disabled pass");
                }
                edges.push(Edge {
                    src,
                    dst: edge.dst.clone(),
                });
            }
            Producer::Elided(disabled) => {
                tracing::debug!(consumer = %edge.dst, disabled = %disabled, "input elided by disabled pass");
                elided.insert(edge.dst.clone(), disabled);
            }
        }
    }

    Ok(Enablement { edges, elided })
}

/// Kahn's algorithm over enabled passes; ties go to the pass added first
///
/// Returns indices into `graph.passes()`.
fn topological_order(graph: &RenderGraph, edges: &[Edge]) -> Result<Vec<usize>, CompileError> {
    let index_of: HashMap<&str, usize> = graph.passes().iter().enumerate().map(|(index, pass)| (pass.name(), index)).collect();
    let nodes: Vec<usize> = graph.passes().iter().enumerate().filter(|(_, pass)| pass.is_enabled()).map(|(index, _)| index).collect();

    let mut in_degree: HashMap<usize, usize> = nodes.iter().map(|&node| (node, 0)).collect();
    let mut successors: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut arcs: Vec<(usize, usize)> = Vec::new();
    for edge in edges {
        let (Some(&from), Some(&to)) = (index_of.get(edge.src.pass.as_str()), index_of.get(edge.dst.pass.as_str())) else {
            continue;
        };
        successors.entry(from).or_default().push(to);
        *in_degree.entry(to).or_default() += 1;
        arcs.push((from, to));
    }

    let mut ready: BTreeSet<usize> = nodes.iter().copied().filter(|node| in_degree[node] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(node) = ready.pop_first() {
        order.push(node);
        for &next in successors.get(&node).map(Vec::as_slice).unwrap_or_default() {
            let degree = in_degree.entry(next).or_default();
            *degree -= 1;
            if *degree == 0 {
                ready.insert(next);
            }
        }
    }

    if order.len() < nodes.len() {
        let scheduled: HashSet<usize> = order.iter().copied().collect();
        let remaining: Vec<usize> = nodes.into_iter().filter(|node| !scheduled.contains(node)).collect();
        let passes = passes_on_cycles(&remaining, &arcs).into_iter().map(|index| graph.passes()[index].name().to_string()).collect();
        return Err(CompileError::CycleDetected { passes });
    }

    Ok(order)
}

/// Passes among `remaining` that lie on a cycle, in insertion order
fn passes_on_cycles(remaining: &[usize], arcs: &[(usize, usize)]) -> Vec<usize> {
    let mut graph = petgraph::graph::DiGraph::<usize, ()>::new();
    let nodes: HashMap<usize, petgraph::graph::NodeIndex> = remaining.iter().map(|&pass| (pass, graph.add_node(pass))).collect();
    for (from, to) in arcs {
        if let (Some(&a), Some(&b)) = (nodes.get(from), nodes.get(to)) {
            graph.add_edge(a, b, ());
        }
    }

    let mut on_cycle: Vec<usize> = petgraph::algo::tarjan_scc(&graph)
        .into_iter()
        .filter(|component| component.len() > 1 || graph.contains_edge(component[0], component[0]))
        .flatten()
        .map(|node| graph[node])
        .collect();
    on_cycle.sort_unstable();
    on_cycle
}

fn check_required_inputs(graph: &RenderGraph, order: &[usize], enablement: &Enablement) -> Result<(), CompileError> {
    let bound: HashSet<&SocketRef> = enablement.edges.iter().map(|edge| &edge.dst).collect();
    for &index in order {
        let pass = &graph.passes()[index];
        for input in pass.pass_type().inputs().iter().filter(|input| !input.optional) {
            let socket = SocketRef::new(pass.name(), &input.name);
            if !bound.contains(&socket) {
                return Err(CompileError::UnresolvedRequiredInput {
                    elided_by: enablement.elided.get(&socket).cloned(),
                    input: socket.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Pairs each marked socket with the live output socket that produces its value
fn resolve_marked_outputs(graph: &RenderGraph) -> Result<Vec<(SocketRef, SocketRef)>, CompileError> {
    graph
        .outputs()
        .iter()
        .map(|socket| match resolve_producer(graph, socket) {
            Producer::Live(live) => Ok((socket.clone(), live)),
            Producer::Elided(_) => Err(CompileError::UnresolvedMarkedOutput { output: socket.to_string() }),
        })
        .collect()
}

/// Resolves the descriptor of an output socket
///
/// `input_desc` looks up the descriptor bound to one of the pass's inputs.
fn output_desc(reference: Extent, pass: &PassInstance, output: &OutputSocket, input_desc: impl Fn(&str) -> Option<ResourceDesc>) -> ResourceDesc {
    let size = match &output.size {
        SizePolicy::Reference => {
            let scale = pass.config().get_str(OutputSize::OPTION).and_then(OutputSize::parse).map_or(ScaleFactor::UNITY, |size| size.scale());
            SizeClass::image(reference.scaled(scale, scale))
        }
        SizePolicy::Scaled(x, y) => SizeClass::image(reference.scaled(*x, *y)),
        SizePolicy::Fixed(extent) => SizeClass::image(*extent),
        SizePolicy::MatchInput(input) => input_desc(input).map_or(SizeClass::image(reference), |desc| desc.size),
        SizePolicy::Bytes(bytes) => SizeClass::Buffer { bytes: *bytes },
    };
    ResourceDesc {
        format: output.format,
        size,
        kind: output.kind,
    }
}
