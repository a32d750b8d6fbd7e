//! GPU allocator backed by a `wgpu::Device`

use crate::pool::{AllocationError, ResourceAllocator};
use framegraph_build::{Format, ResourceDesc, ResourceKind, SizeClass};

/// A texture with its default view, or a buffer
#[derive(Debug)]
pub enum WgpuResource {
    Texture { texture: wgpu::Texture, view: wgpu::TextureView },
    Buffer(wgpu::Buffer),
}

impl WgpuResource {
    pub fn texture(&self) -> Option<&wgpu::Texture> {
        match self {
            Self::Texture { texture, .. } => Some(texture),
            Self::Buffer(_) => None,
        }
    }

    pub fn view(&self) -> Option<&wgpu::TextureView> {
        match self {
            Self::Texture { view, .. } => Some(view),
            Self::Buffer(_) => None,
        }
    }

    pub fn buffer(&self) -> Option<&wgpu::Buffer> {
        match self {
            Self::Buffer(buffer) => Some(buffer),
            Self::Texture { .. } => None,
        }
    }
}

/// Maps a resource format to the texture format backing it
pub fn texture_format(format: Format) -> Option<wgpu::TextureFormat> {
    Some(match format {
        Format::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        Format::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        Format::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        Format::Rg32Float => wgpu::TextureFormat::Rg32Float,
        Format::Rg16Float => wgpu::TextureFormat::Rg16Float,
        Format::R32Float => wgpu::TextureFormat::R32Float,
        Format::R32Uint => wgpu::TextureFormat::R32Uint,
        Format::Rg32Uint => wgpu::TextureFormat::Rg32Uint,
        Format::Rgba32Uint => wgpu::TextureFormat::Rgba32Uint,
        Format::D32Float => wgpu::TextureFormat::Depth32Float,
        Format::Raw => return None,
    })
}

/// Creates textures and buffers on a device
pub struct WgpuAllocator {
    device: wgpu::Device,
    created: u64,
}

impl WgpuAllocator {
    pub fn new(device: wgpu::Device) -> Self {
        Self { device, created: 0 }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    fn create_texture(&mut self, desc: &ResourceDesc, width: u32, height: u32) -> Result<WgpuResource, AllocationError> {
        let format = texture_format(desc.format).ok_or_else(|| AllocationError::new(desc, "format has no texture equivalent"))?;
        let max_dimension = self.device.limits().max_texture_dimension_2d;
        if width > max_dimension || height > max_dimension {
            return Err(AllocationError::new(desc, format!("exceeds the device limit of {max_dimension} texels")));
        }

        let usage = match desc.kind {
            ResourceKind::Depth => wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            _ => wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::COPY_SRC,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("Pooled Texture {}", self.created)),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(WgpuResource::Texture { texture, view })
    }

    fn create_buffer(&mut self, desc: &ResourceDesc, size: u64) -> Result<WgpuResource, AllocationError> {
        let max_size = self.device.limits().max_buffer_size;
        if size > max_size {
            return Err(AllocationError::new(desc, format!("exceeds the device limit of {max_size} bytes")));
        }
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("Pooled Buffer {}", self.created)),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        Ok(WgpuResource::Buffer(buffer))
    }
}

impl ResourceAllocator for WgpuAllocator {
    type Resource = WgpuResource;

    fn allocate(&mut self, desc: &ResourceDesc) -> Result<WgpuResource, AllocationError> {
        let resource = match (desc.kind, desc.size) {
            (ResourceKind::Buffer, _) => self.create_buffer(desc, desc.size_in_bytes())?,
            (_, SizeClass::Image { width, height }) => self.create_texture(desc, width, height)?,
            (_, SizeClass::Buffer { .. }) => return Err(AllocationError::new(desc, "image resource with a buffer size class")),
        };
        self.created += 1;
        tracing::debug!(%desc, created = self.created, "created gpu resource");
        Ok(resource)
    }
}
