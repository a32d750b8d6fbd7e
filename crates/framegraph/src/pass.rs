//! Pass contract
//!
//! A pass is an opaque unit of work. The executor hands it the resources bound
//! to its sockets, its resolved configuration and the frame context; it never
//! looks inside a pass beyond this trait.

use framegraph_build::{PassConfig, PassType};
use std::sync::Arc;

/// Errors a pass may report from [`Pass::execute`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PassError {
    #[error("input '{0}' is not bound")]
    MissingInput(String),
    #[error("output '{0}' is not bound")]
    MissingOutput(String),
    #[error("{0}")]
    Failed(String),
}

/// Per-frame information shared by every pass of a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    /// Monotonically increasing frame index, also used as the frame's fence
    pub index: u64,
    /// Seconds elapsed since the previous frame
    pub delta_time: f32,
}

impl FrameContext {
    pub fn new(index: u64) -> Self {
        Self { index, delta_time: 0.0 }
    }
}

/// Resources bound to a pass for one execution
///
/// Inputs are shared, outputs are exclusive. Unconnected optional inputs and
/// unused optional outputs are absent.
pub struct PassResources<'a, R> {
    inputs: Vec<(&'a str, &'a R)>,
    outputs: Vec<(&'a str, &'a mut R)>,
}

impl<'a, R> PassResources<'a, R> {
    pub fn new(inputs: Vec<(&'a str, &'a R)>, outputs: Vec<(&'a str, &'a mut R)>) -> Self {
        Self { inputs, outputs }
    }

    pub fn input(&self, socket: &str) -> Option<&R> {
        self.inputs.iter().find(|(name, _)| *name == socket).map(|(_, resource)| *resource)
    }

    pub fn output(&mut self, socket: &str) -> Option<&mut R> {
        self.outputs.iter_mut().find(|(name, _)| *name == socket).map(|(_, resource)| &mut **resource)
    }

    /// Like [`input`](Self::input), failing with [`PassError::MissingInput`]
    pub fn require_input(&self, socket: &str) -> Result<&R, PassError> {
        self.input(socket).ok_or_else(|| PassError::MissingInput(socket.to_string()))
    }

    /// Like [`output`](Self::output), failing with [`PassError::MissingOutput`]
    pub fn require_output(&mut self, socket: &str) -> Result<&mut R, PassError> {
        self.output(socket).ok_or_else(|| PassError::MissingOutput(socket.to_string()))
    }

    pub fn input_names(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().map(|(name, _)| *name)
    }

    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(|(name, _)| *name)
    }
}

/// A unit of rendering or compute work
///
/// `R` is the resource type produced by the pool's allocator.
pub trait Pass<R>: Send {
    /// Declares the pass's sockets and configuration options
    fn reflect(&self) -> PassType;

    /// Runs the pass for one frame
    fn execute(&mut self, resources: &mut PassResources<'_, R>, config: &PassConfig, frame: &FrameContext) -> Result<(), PassError>;
}

/// A pass that does nothing; used for dry runs of a schedule
#[derive(Debug, Clone)]
pub struct NullPass {
    pass_type: Arc<PassType>,
}

impl NullPass {
    pub fn new(pass_type: Arc<PassType>) -> Self {
        Self { pass_type }
    }
}

impl<R> Pass<R> for NullPass {
    fn reflect(&self) -> PassType {
        (*self.pass_type).clone()
    }

    fn execute(&mut self, resources: &mut PassResources<'_, R>, _config: &PassConfig, frame: &FrameContext) -> Result<(), PassError> {
        tracing::trace!(pass_type = self.pass_type.name(), frame = frame.index, outputs = resources.output_names().count(), "null pass");
        Ok(())
    }
}
