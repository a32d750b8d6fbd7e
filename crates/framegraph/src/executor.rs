//! Frame executor
//!
//! Runs one frame of a [`CompiledSchedule`] at a time against a
//! [`ResourcePool`]. A frame goes through `Acquiring → Executing → Releasing`
//! and always ends back in `Idle`, whether it succeeded or not.

use crate::library::PassLibrary;
use crate::pass::{FrameContext, Pass, PassError, PassResources};
use crate::pool::{PoolError, ResourceAllocator, ResourceHandle, ResourcePool};
use framegraph_build::ResourceDesc;
use framegraph_build::compiler::{CompiledSchedule, ScheduledPass};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error("resource pool exhausted while allocating {desc}")]
    ResourceExhausted { desc: ResourceDesc },
    #[error("pass '{instance}' failed: {cause}")]
    PassExecutionFailed {
        instance: String,
        #[source]
        cause: PassError,
    },
    #[error("no factory registered for pass type '{type_name}'")]
    UnknownPassType { type_name: String },
    #[error(transparent)]
    Pool(PoolError),
}

impl From<PoolError> for RuntimeError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::ResourceExhausted { desc } => Self::ResourceExhausted { desc },
            err => Self::Pool(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Frames that may be in flight at once; at least one
    pub frames_in_flight: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { frames_in_flight: 2 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameState {
    Idle,
    Acquiring,
    Executing,
    Releasing,
}

/// One step of a frame, recorded in execution order
///
/// Allocations are identified by their schedule id, so traces of the same
/// schedule are comparable across frames.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TraceEvent {
    /// An allocation was bound for the frame
    Acquire(usize),
    /// A pass ran successfully
    Execute(String),
    /// A transient allocation was released after its last use
    Release(usize),
}

/// Executes compiled schedules frame by frame
pub struct Executor<R> {
    config: ExecutorConfig,
    schedule: Arc<CompiledSchedule>,
    passes: Vec<Box<dyn Pass<R>>>,
    /// Persistent allocations held across frames, by allocation id
    persistent: HashMap<usize, ResourceHandle>,
    /// Marked-output allocations of the last successful frame, each holding its own reference
    outputs: HashMap<usize, ResourceHandle>,
    state: FrameState,
    trace: Vec<TraceEvent>,
}

impl<R: 'static> Executor<R> {
    /// Instantiates one pass object per scheduled pass
    pub fn new(schedule: Arc<CompiledSchedule>, library: &PassLibrary<R>, config: ExecutorConfig) -> Result<Self, RuntimeError> {
        let passes = instantiate(&schedule, library)?;
        Ok(Self {
            config: ExecutorConfig {
                frames_in_flight: config.frames_in_flight.max(1),
            },
            schedule,
            passes,
            persistent: HashMap::new(),
            outputs: HashMap::new(),
            state: FrameState::Idle,
            trace: Vec::new(),
        })
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn schedule(&self) -> &Arc<CompiledSchedule> {
        &self.schedule
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Acquisition and execution order of the last frame, successful or not
    pub fn last_trace(&self) -> &[TraceEvent] {
        &self.trace
    }

    /// Handle of a marked output (`"Pass.socket"`) produced by the last successful frame
    pub fn output(&self, socket: &str) -> Option<ResourceHandle> {
        let output = self.schedule.output(socket)?;
        let allocation = self.schedule.resources[output.resource].allocation;
        self.outputs.get(&allocation).copied()
    }

    /// Swaps in a new schedule
    ///
    /// Passing the schedule already in use does nothing. Otherwise the new
    /// passes are instantiated first, then every persistent and retained
    /// resource of the old schedule is released.
    pub fn set_schedule<A>(&mut self, schedule: Arc<CompiledSchedule>, library: &PassLibrary<R>, pool: &mut ResourcePool<A>) -> Result<(), RuntimeError>
    where
        A: ResourceAllocator<Resource = R>,
    {
        if Arc::ptr_eq(&schedule, &self.schedule) {
            return Ok(());
        }
        let passes = instantiate(&schedule, library)?;
        self.release_held(pool)?;
        tracing::info!(from = %self.schedule.name, to = %schedule.name, "switched schedule");
        self.schedule = schedule;
        self.passes = passes;
        Ok(())
    }

    /// Releases every resource held across frames
    pub fn shutdown<A>(&mut self, pool: &mut ResourcePool<A>) -> Result<(), RuntimeError>
    where
        A: ResourceAllocator<Resource = R>,
    {
        self.release_held(pool)
    }

    fn release_held<A>(&mut self, pool: &mut ResourcePool<A>) -> Result<(), RuntimeError>
    where
        A: ResourceAllocator<Resource = R>,
    {
        let mut result = Ok(());
        for (_, handle) in self.outputs.drain().chain(self.persistent.drain()) {
            if let Err(err) = pool.release(handle) {
                result = Err(err.into());
            }
        }
        self.state = FrameState::Idle;
        result
    }

    /// Runs one frame
    ///
    /// On failure the remaining passes are skipped, every resource acquired
    /// during the frame is released and the previous frame's outputs are
    /// kept.
    pub fn run_frame<A>(&mut self, pool: &mut ResourcePool<A>, frame: &FrameContext) -> Result<(), RuntimeError>
    where
        A: ResourceAllocator<Resource = R>,
    {
        let schedule = Arc::clone(&self.schedule);
        self.trace.clear();
        pool.begin_frame(frame.index);

        // Handles acquired during this frame and not yet released
        let mut held: Vec<Option<ResourceHandle>> = vec![None; schedule.allocations.len()];
        let mut bound: Vec<ResourceHandle> = Vec::with_capacity(schedule.allocations.len());

        let mut result = self.acquire(pool, &schedule, &mut bound, &mut held);
        if result.is_ok() {
            result = self.execute(pool, &schedule, frame, &bound, &mut held);
        }

        self.state = FrameState::Releasing;
        let result = match result {
            Ok(()) => self.finish(pool, &schedule, &bound, &mut held),
            Err(err) => {
                tracing::warn!(frame = frame.index, error = %err, "frame failed");
                for handle in held.iter_mut().filter_map(Option::take) {
                    // The frame error takes precedence
                    let _ = pool.release(handle);
                }
                Err(err)
            }
        };

        if let Some(fence) = frame.index.checked_sub(self.config.frames_in_flight - 1) {
            let destroyed = pool.retire(fence);
            if destroyed > 0 {
                tracing::debug!(fence, destroyed, "retired pool entries");
            }
        }
        self.state = FrameState::Idle;
        result
    }

    fn acquire<A>(
        &mut self,
        pool: &mut ResourcePool<A>,
        schedule: &CompiledSchedule,
        bound: &mut Vec<ResourceHandle>,
        held: &mut [Option<ResourceHandle>],
    ) -> Result<(), RuntimeError>
    where
        A: ResourceAllocator<Resource = R>,
    {
        self.state = FrameState::Acquiring;
        for allocation in &schedule.allocations {
            let handle = match self.persistent.get(&allocation.id) {
                Some(&handle) if allocation.persistent => handle,
                _ => {
                    let handle = pool.acquire(&allocation.desc)?;
                    held[allocation.id] = Some(handle);
                    handle
                }
            };
            bound.push(handle);
            self.trace.push(TraceEvent::Acquire(allocation.id));
        }
        Ok(())
    }

    fn execute<A>(
        &mut self,
        pool: &mut ResourcePool<A>,
        schedule: &CompiledSchedule,
        frame: &FrameContext,
        bound: &[ResourceHandle],
        held: &mut [Option<ResourceHandle>],
    ) -> Result<(), RuntimeError>
    where
        A: ResourceAllocator<Resource = R>,
    {
        self.state = FrameState::Executing;
        for (index, (scheduled, pass)) in schedule.passes.iter().zip(self.passes.iter_mut()).enumerate() {
            run_pass(pool, scheduled, pass.as_mut(), frame, bound)?;
            self.trace.push(TraceEvent::Execute(scheduled.instance.clone()));

            let expired = schedule
                .allocations
                .iter()
                .filter(|allocation| allocation.last_use == index && !allocation.persistent && !schedule.is_marked_allocation(allocation.id));
            for allocation in expired {
                if let Some(handle) = held[allocation.id].take() {
                    pool.release(handle)?;
                    self.trace.push(TraceEvent::Release(allocation.id));
                }
            }
        }
        Ok(())
    }

    /// Hands the frame's outputs and new persistent resources over to the executor
    fn finish<A>(
        &mut self,
        pool: &mut ResourcePool<A>,
        schedule: &CompiledSchedule,
        bound: &[ResourceHandle],
        held: &mut [Option<ResourceHandle>],
    ) -> Result<(), RuntimeError>
    where
        A: ResourceAllocator<Resource = R>,
    {
        for allocation in schedule.allocations.iter().filter(|allocation| allocation.persistent) {
            if let Some(handle) = held[allocation.id].take() {
                self.persistent.insert(allocation.id, handle);
            }
        }

        let mut outputs = HashMap::new();
        for output in &schedule.outputs {
            let allocation = &schedule.allocations[schedule.resources[output.resource].allocation];
            if outputs.contains_key(&allocation.id) {
                continue;
            }
            let handle = if allocation.persistent {
                pool.retain(bound[allocation.id])?;
                bound[allocation.id]
            } else {
                let Some(handle) = held[allocation.id].take() else { continue };
                handle
            };
            outputs.insert(allocation.id, handle);
        }

        let previous = std::mem::replace(&mut self.outputs, outputs);
        for handle in previous.into_values() {
            pool.release(handle)?;
        }

        // Anything left was bound without a consumer past the end of the frame
        for handle in held.iter_mut().filter_map(Option::take) {
            pool.release(handle)?;
        }
        Ok(())
    }
}

fn instantiate<R: 'static>(schedule: &CompiledSchedule, library: &PassLibrary<R>) -> Result<Vec<Box<dyn Pass<R>>>, RuntimeError> {
    schedule.passes.iter().map(|pass| library.instantiate(pass)).collect()
}

/// Lends the pass's bound resources out of the pool, runs it and gives them back
fn run_pass<A: ResourceAllocator>(
    pool: &mut ResourcePool<A>,
    scheduled: &ScheduledPass,
    pass: &mut dyn Pass<A::Resource>,
    frame: &FrameContext,
    bound: &[ResourceHandle],
) -> Result<(), RuntimeError> {
    let mut lent_inputs = Vec::new();
    let mut lent_outputs = Vec::new();
    let lent = lend(pool, scheduled.inputs.iter().map(|binding| binding.allocation), bound, &mut lent_inputs)
        .and_then(|()| lend(pool, scheduled.outputs.iter().map(|binding| binding.allocation), bound, &mut lent_outputs));
    if let Err(err) = lent {
        give_back(pool, lent_inputs);
        give_back(pool, lent_outputs);
        return Err(err.into());
    }

    // Several inputs may read the same allocation; outputs never share one
    let inputs: Vec<(&str, &A::Resource)> = scheduled
        .inputs
        .iter()
        .filter_map(|binding| {
            let (_, _, resource) = lent_inputs.iter().find(|(id, _, _)| *id == binding.allocation)?;
            Some((binding.socket.as_str(), resource))
        })
        .collect();
    let outputs: Vec<(&str, &mut A::Resource)> = scheduled
        .outputs
        .iter()
        .zip(lent_outputs.iter_mut())
        .map(|(binding, (_, _, resource))| (binding.socket.as_str(), resource))
        .collect();

    let mut resources = PassResources::new(inputs, outputs);
    let result = pass.execute(&mut resources, &scheduled.config, frame);
    drop(resources);
    give_back(pool, lent_inputs);
    give_back(pool, lent_outputs);

    result.map_err(|cause| {
        tracing::error!(pass = %scheduled.instance, frame = frame.index, error = %cause, "pass execution failed");
        RuntimeError::PassExecutionFailed {
            instance: scheduled.instance.clone(),
            cause,
        }
    })
}

fn lend<A: ResourceAllocator>(
    pool: &mut ResourcePool<A>,
    allocations: impl Iterator<Item = usize>,
    bound: &[ResourceHandle],
    lent: &mut Vec<(usize, ResourceHandle, A::Resource)>,
) -> Result<(), PoolError> {
    for allocation in allocations {
        if lent.iter().any(|(id, _, _)| *id == allocation) {
            continue;
        }
        let handle = bound[allocation];
        let resource = pool.take(handle)?;
        lent.push((allocation, handle, resource));
    }
    Ok(())
}

fn give_back<A: ResourceAllocator>(pool: &mut ResourcePool<A>, lent: Vec<(usize, ResourceHandle, A::Resource)>) {
    for (_, handle, resource) in lent {
        // Handles were validated by take
        let _ = pool.restore(handle, resource);
    }
}
