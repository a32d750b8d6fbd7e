//! Host memory allocator
//!
//! Backs every resource with zeroed system memory. Used for dry runs of a
//! schedule and for tests; passes read and write elements through `bytemuck`.

use crate::pool::{AllocationError, ResourceAllocator};
use bytemuck::Pod;
use bytes::{Bytes, BytesMut};
use framegraph_build::{ResourceDesc, SizeClass};

/// An image or buffer living in host memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostResource {
    desc: ResourceDesc,
    data: BytesMut,
}

impl HostResource {
    pub fn desc(&self) -> &ResourceDesc {
        &self.desc
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Width and height for images, `None` for buffers
    pub fn extent(&self) -> Option<(u32, u32)> {
        match self.desc.size {
            SizeClass::Image { width, height } => Some((width, height)),
            SizeClass::Buffer { .. } => None,
        }
    }

    /// Number of `T` elements that fit in the resource
    pub fn len_of<T: Pod>(&self) -> usize {
        self.data.len() / size_of::<T>().max(1)
    }

    /// Reads element `index`, interpreting the storage as a packed array of `T`
    pub fn read<T: Pod>(&self, index: usize) -> Option<T> {
        let size = size_of::<T>();
        let start = index.checked_mul(size)?;
        let bytes = self.data.get(start..start.checked_add(size)?)?;
        Some(bytemuck::pod_read_unaligned(bytes))
    }

    /// Writes element `index`; returns false when out of bounds
    pub fn write<T: Pod>(&mut self, index: usize, value: T) -> bool {
        let size = size_of::<T>();
        let Some(range) = index.checked_mul(size).and_then(|start| Some(start..start.checked_add(size)?)) else {
            return false;
        };
        match self.data.get_mut(range) {
            Some(bytes) => {
                bytes.copy_from_slice(bytemuck::bytes_of(&value));
                true
            }
            None => false,
        }
    }

    /// Fills every whole element with `value`
    pub fn fill<T: Pod>(&mut self, value: T) {
        let pattern = bytemuck::bytes_of(&value);
        if pattern.is_empty() {
            return;
        }
        for chunk in self.data.chunks_exact_mut(pattern.len()) {
            chunk.copy_from_slice(pattern);
        }
    }

    /// An immutable copy of the current contents
    pub fn snapshot(&self) -> Bytes {
        Bytes::copy_from_slice(&self.data)
    }
}

/// Allocates zeroed host memory for every descriptor
#[derive(Debug, Default)]
pub struct HostAllocator {
    allocations: usize,
}

impl HostAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of resources allocated so far
    pub fn allocations(&self) -> usize {
        self.allocations
    }
}

impl ResourceAllocator for HostAllocator {
    type Resource = HostResource;

    fn allocate(&mut self, desc: &ResourceDesc) -> Result<HostResource, AllocationError> {
        let bytes = usize::try_from(desc.size_in_bytes()).map_err(|_| AllocationError::new(desc, "size exceeds the address space"))?;
        self.allocations += 1;
        Ok(HostResource {
            desc: *desc,
            data: BytesMut::zeroed(bytes),
        })
    }
}
