//! Resource pool
//!
//! Physical resources are allocated on demand through a [`ResourceAllocator`]
//! and recycled by descriptor. Every entry carries a reference count and the
//! fence of the most recent frame that may still access it; an unreferenced
//! entry only becomes reusable once that fence has been retired, so frames in
//! flight never observe a resource being recycled under them.

use framegraph_build::ResourceDesc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure reported by a [`ResourceAllocator`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to allocate {desc}: {reason}")]
pub struct AllocationError {
    pub desc: ResourceDesc,
    pub reason: String,
}

impl AllocationError {
    pub fn new(desc: &ResourceDesc, reason: impl Into<String>) -> Self {
        Self {
            desc: *desc,
            reason: reason.into(),
        }
    }
}

/// Creates physical resources for the pool
pub trait ResourceAllocator {
    type Resource;

    fn allocate(&mut self, desc: &ResourceDesc) -> Result<Self::Resource, AllocationError>;

    /// Bytes accounted against the pool budget for a resource of `desc`
    fn size_in_bytes(&self, desc: &ResourceDesc) -> u64 {
        desc.size_in_bytes()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("resource pool exhausted while allocating {desc}")]
    ResourceExhausted { desc: ResourceDesc },
    #[error("stale resource handle {0}")]
    StaleHandle(ResourceHandle),
    #[error("resource {0} is not referenced")]
    NotReferenced(ResourceHandle),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
}

/// Budget and recycling policy of a [`ResourcePool`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of live entries
    pub max_entries: usize,
    /// Maximum number of bytes across live entries
    pub max_bytes: u64,
    /// Frames an unreferenced entry is kept past its fence before it is destroyed
    pub retention_frames: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_entries: 1024,
            max_bytes: 4 << 30,
            retention_frames: 4,
        }
    }
}

/// Handle to a pool entry
///
/// Handles are generational: once the entry is destroyed the handle is stale,
/// even if its slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle {
    index: u32,
    generation: u32,
}

impl ResourceHandle {
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Entry<R> {
    /// `None` while lent out through [`ResourcePool::take`]
    resource: Option<R>,
    desc: ResourceDesc,
    bytes: u64,
    ref_count: u32,
    /// Most recent frame that may still access the resource
    fence: u64,
}

#[derive(Debug)]
struct Slot<R> {
    generation: u32,
    entry: Option<Entry<R>>,
}

/// Pool of physical resources keyed by descriptor
pub struct ResourcePool<A: ResourceAllocator> {
    allocator: A,
    config: PoolConfig,
    slots: Vec<Slot<A::Resource>>,
    current_fence: u64,
    completed_fence: Option<u64>,
    allocated_bytes: u64,
}

impl<A: ResourceAllocator> ResourcePool<A> {
    pub fn new(allocator: A, config: PoolConfig) -> Self {
        Self {
            allocator,
            config,
            slots: Vec::new(),
            current_fence: 0,
            completed_fence: None,
            allocated_bytes: 0,
        }
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Records the fence stamped on entries acquired or released from now on
    pub fn begin_frame(&mut self, fence: u64) {
        self.current_fence = fence;
    }

    pub fn current_fence(&self) -> u64 {
        self.current_fence
    }

    pub fn completed_fence(&self) -> Option<u64> {
        self.completed_fence
    }

    /// Acquires a resource matching `desc`, with a reference count of one
    ///
    /// Reuses the lowest-indexed unreferenced entry with an equal descriptor
    /// whose fence has been retired; otherwise allocates a new entry if the
    /// budget allows.
    pub fn acquire(&mut self, desc: &ResourceDesc) -> Result<ResourceHandle, PoolError> {
        let completed = self.completed_fence;
        let reusable = self.slots.iter().position(|slot| {
            slot.entry
                .as_ref()
                .is_some_and(|entry| entry.ref_count == 0 && entry.desc == *desc && completed.is_some_and(|completed| entry.fence <= completed))
        });

        if let Some(index) = reusable {
            let slot = &mut self.slots[index];
            if let Some(entry) = slot.entry.as_mut() {
                entry.ref_count = 1;
                entry.fence = self.current_fence;
            }
            tracing::trace!(index, %desc, "reused pool entry");
            return Ok(ResourceHandle {
                index: index as u32,
                generation: slot.generation,
            });
        }

        let bytes = self.allocator.size_in_bytes(desc);
        if self.len() >= self.config.max_entries || self.allocated_bytes.saturating_add(bytes) > self.config.max_bytes {
            tracing::warn!(%desc, entries = self.len(), allocated_bytes = self.allocated_bytes, "resource pool exhausted");
            return Err(PoolError::ResourceExhausted { desc: *desc });
        }

        let resource = self.allocator.allocate(desc)?;
        let entry = Entry {
            resource: Some(resource),
            desc: *desc,
            bytes,
            ref_count: 1,
            fence: self.current_fence,
        };
        self.allocated_bytes += bytes;

        let index = match self.slots.iter().position(|slot| slot.entry.is_none()) {
            Some(index) => {
                self.slots[index].entry = Some(entry);
                index
            }
            None => {
                self.slots.push(Slot { generation: 0, entry: Some(entry) });
                self.slots.len() - 1
            }
        };
        tracing::debug!(index, %desc, bytes, "allocated pool entry");
        Ok(ResourceHandle {
            index: index as u32,
            generation: self.slots[index].generation,
        })
    }

    fn entry_mut(&mut self, handle: ResourceHandle) -> Result<&mut Entry<A::Resource>, PoolError> {
        self.slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_mut())
            .ok_or(PoolError::StaleHandle(handle))
    }

    fn entry(&self, handle: ResourceHandle) -> Option<&Entry<A::Resource>> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    /// Adds a reference to a referenced entry
    pub fn retain(&mut self, handle: ResourceHandle) -> Result<(), PoolError> {
        let entry = self.entry_mut(handle)?;
        if entry.ref_count == 0 {
            return Err(PoolError::NotReferenced(handle));
        }
        entry.ref_count += 1;
        Ok(())
    }

    /// Drops a reference; the entry's fence becomes the current frame's
    pub fn release(&mut self, handle: ResourceHandle) -> Result<(), PoolError> {
        let fence = self.current_fence;
        let entry = self.entry_mut(handle)?;
        if entry.ref_count == 0 {
            return Err(PoolError::NotReferenced(handle));
        }
        entry.ref_count -= 1;
        entry.fence = entry.fence.max(fence);
        Ok(())
    }

    /// Marks every frame up to `fence` as completed
    ///
    /// Unreferenced entries whose fence lies more than `retention_frames`
    /// behind the completed fence are destroyed. Returns the number destroyed.
    pub fn retire(&mut self, fence: u64) -> usize {
        let completed = self.completed_fence.map_or(fence, |completed| completed.max(fence));
        self.completed_fence = Some(completed);

        let retention = self.config.retention_frames;
        let mut destroyed = 0;
        for slot in &mut self.slots {
            let expired = slot
                .entry
                .as_ref()
                .is_some_and(|entry| entry.ref_count == 0 && entry.resource.is_some() && completed.saturating_sub(entry.fence) > retention);
            if expired {
                if let Some(entry) = slot.entry.take() {
                    self.allocated_bytes -= entry.bytes;
                    tracing::debug!(desc = %entry.desc, fence = entry.fence, completed, "destroyed pool entry");
                }
                slot.generation = slot.generation.wrapping_add(1);
                destroyed += 1;
            }
        }
        destroyed
    }

    /// The resource behind a handle, unless the handle is stale or the resource is lent out
    pub fn resource(&self, handle: ResourceHandle) -> Option<&A::Resource> {
        self.entry(handle)?.resource.as_ref()
    }

    pub fn resource_mut(&mut self, handle: ResourceHandle) -> Option<&mut A::Resource> {
        self.entry_mut(handle).ok()?.resource.as_mut()
    }

    pub fn desc(&self, handle: ResourceHandle) -> Option<ResourceDesc> {
        self.entry(handle).map(|entry| entry.desc)
    }

    pub fn ref_count(&self, handle: ResourceHandle) -> Option<u32> {
        self.entry(handle).map(|entry| entry.ref_count)
    }

    /// Lends a referenced resource out of the pool; give it back with [`restore`](Self::restore)
    pub fn take(&mut self, handle: ResourceHandle) -> Result<A::Resource, PoolError> {
        let entry = self.entry_mut(handle)?;
        if entry.ref_count == 0 {
            return Err(PoolError::NotReferenced(handle));
        }
        entry.resource.take().ok_or(PoolError::StaleHandle(handle))
    }

    pub fn restore(&mut self, handle: ResourceHandle, resource: A::Resource) -> Result<(), PoolError> {
        let entry = self.entry_mut(handle)?;
        entry.resource = Some(resource);
        Ok(())
    }

    /// Sum of the reference counts of every live entry
    pub fn outstanding_references(&self) -> u64 {
        self.entries().map(|entry| u64::from(entry.ref_count)).sum()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live entries without references
    pub fn free_count(&self) -> usize {
        self.entries().filter(|entry| entry.ref_count == 0).count()
    }

    pub fn allocated_bytes(&self) -> u64 {
        self.allocated_bytes
    }

    fn entries(&self) -> impl Iterator<Item = &Entry<A::Resource>> {
        self.slots.iter().filter_map(|slot| slot.entry.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framegraph_build::{Extent, Format, ResourceKind};

    /// Hands out increasing serial numbers
    #[derive(Debug, Default)]
    struct Serial {
        next: u32,
    }

    impl ResourceAllocator for Serial {
        type Resource = u32;

        fn allocate(&mut self, _desc: &ResourceDesc) -> Result<u32, AllocationError> {
            self.next += 1;
            Ok(self.next)
        }
    }

    fn image(width: u32) -> ResourceDesc {
        ResourceDesc::image(ResourceKind::Texture, Format::R32Float, Extent::new(width, width))
    }

    fn pool() -> ResourcePool<Serial> {
        ResourcePool::new(Serial::default(), PoolConfig::default())
    }

    #[test]
    fn test_released_entry_waits_for_its_fence() {
        let mut pool = pool();
        pool.begin_frame(0);
        let first = pool.acquire(&image(4)).unwrap();
        pool.release(first).unwrap();

        // Not retired yet
        let second = pool.acquire(&image(4)).unwrap();
        assert_ne!(first, second);

        pool.retire(0);
        pool.begin_frame(1);
        let third = pool.acquire(&image(4)).unwrap();
        assert_eq!(third, first);
        assert_eq!(pool.resource(third), Some(&1));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_descriptors_must_match() {
        let mut pool = pool();
        let small = pool.acquire(&image(4)).unwrap();
        pool.release(small).unwrap();
        pool.retire(0);
        let large = pool.acquire(&image(8)).unwrap();
        assert_ne!(small, large);
        assert_eq!(pool.free_count(), 1);
    }

    #[test]
    fn test_reference_counting() {
        let mut pool = pool();
        let handle = pool.acquire(&image(4)).unwrap();
        pool.retain(handle).unwrap();
        assert_eq!(pool.outstanding_references(), 2);
        pool.release(handle).unwrap();
        pool.release(handle).unwrap();
        assert_eq!(pool.outstanding_references(), 0);
        assert_eq!(pool.release(handle), Err(PoolError::NotReferenced(handle)));
        assert_eq!(pool.retain(handle), Err(PoolError::NotReferenced(handle)));
    }

    #[test]
    fn test_budget_exhaustion() {
        let mut pool = ResourcePool::new(
            Serial::default(),
            PoolConfig {
                max_entries: 2,
                ..PoolConfig::default()
            },
        );
        pool.acquire(&image(4)).unwrap();
        pool.acquire(&image(4)).unwrap();
        assert_eq!(pool.acquire(&image(4)), Err(PoolError::ResourceExhausted { desc: image(4) }));

        let mut pool = ResourcePool::new(
            Serial::default(),
            PoolConfig {
                max_bytes: image(4).size_in_bytes(),
                ..PoolConfig::default()
            },
        );
        pool.acquire(&image(4)).unwrap();
        assert!(matches!(pool.acquire(&image(4)), Err(PoolError::ResourceExhausted { .. })));
    }

    #[test]
    fn test_retention_destroys_idle_entries() {
        let mut pool = ResourcePool::new(
            Serial::default(),
            PoolConfig {
                retention_frames: 2,
                ..PoolConfig::default()
            },
        );
        pool.begin_frame(0);
        let idle = pool.acquire(&image(4)).unwrap();
        let busy = pool.acquire(&image(4)).unwrap();
        pool.release(idle).unwrap();

        assert_eq!(pool.retire(2), 0);
        assert_eq!(pool.retire(3), 1);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.allocated_bytes(), image(4).size_in_bytes());
        assert_eq!(pool.release(idle), Err(PoolError::StaleHandle(idle)));
        assert!(pool.resource(busy).is_some());

        // The freed slot is reused under a new generation
        let fresh = pool.acquire(&image(4)).unwrap();
        assert_eq!(fresh.index(), idle.index());
        assert_ne!(fresh, idle);
    }

    #[test]
    fn test_take_and_restore() {
        let mut pool = pool();
        let handle = pool.acquire(&image(4)).unwrap();
        let resource = pool.take(handle).unwrap();
        assert!(pool.resource(handle).is_none());
        assert_eq!(pool.take(handle), Err(PoolError::StaleHandle(handle)));
        pool.restore(handle, resource).unwrap();
        assert_eq!(pool.resource(handle), Some(&resource));
    }
}
