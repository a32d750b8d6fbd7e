//! Render graph runtime
//!
//! Executes schedules produced by [`framegraph_build`] frame by frame: a
//! [`PassLibrary`] builds pass objects from their type names, a
//! [`ResourcePool`] recycles physical resources between frames and the
//! [`Executor`] drives one frame at a time.
//!
//! ```no_run
//! use framegraph::{Executor, FrameContext, HostAllocator, HostResource, PassLibrary, ResourcePool, RuntimeConfig};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let library = PassLibrary::<HostResource>::with_standard_passes();
//! let graph = framegraph_build::load_graph("graphs/restir_gi.yaml", library.registry())?;
//! let schedule = Arc::new(framegraph_build::compile(&graph)?);
//!
//! let config = RuntimeConfig::default();
//! let mut pool = ResourcePool::new(HostAllocator::new(), config.pool);
//! let mut executor = Executor::new(schedule, &library, config.executor)?;
//! for index in 0..3 {
//!     executor.run_frame(&mut pool, &FrameContext::new(index))?;
//! }
//! executor.shutdown(&mut pool)?;
//! # Ok(())
//! # }
//! ```

mod config;
mod executor;
mod host;
mod library;
mod pass;
mod pool;
#[cfg(feature = "wgpu")]
mod wgpu_allocator;

pub use config::{RuntimeConfig, RuntimeConfigError};
pub use executor::{Executor, ExecutorConfig, FrameState, RuntimeError, TraceEvent};
pub use host::{HostAllocator, HostResource};
pub use library::{PassFactory, PassLibrary};
pub use pass::{FrameContext, NullPass, Pass, PassError, PassResources};
pub use pool::{AllocationError, PoolConfig, PoolError, ResourceAllocator, ResourceHandle, ResourcePool};
#[cfg(feature = "wgpu")]
pub use wgpu_allocator::{WgpuAllocator, WgpuResource, texture_format};
