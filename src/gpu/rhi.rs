//! RHI facade: the render-hardware-interface boundary the core records
//! through without ever instantiating a concrete backend (spec §6.1).
//!
//! Descriptor value types reuse `wgpu`'s own enums where the shapes line up
//! 1:1, so the vocabulary here matches a real backend exactly; `RhiDevice`
//! and `CommandList` are traits implemented by whatever owns the actual
//! graphics API outside this crate.

use wgpu::{BufferUsages, Extent3d, TextureFormat};

/// Opaque handle to a GPU buffer. The core never dereferences this — it is
/// only ever passed back to the RHI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// Opaque handle to a GPU texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// Where a resource's memory lives, spec §6.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryUsage {
    GpuOnly,
    CpuToGpu,
    GpuToCpu,
}

#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    pub size: u64,
    pub usage: BufferUsages,
    pub memory_usage: MemoryUsage,
    pub debug_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureDimension {
    D1,
    D2,
    D3,
    Cube,
}

#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub dimension: TextureDimension,
    pub extent: Extent3d,
    pub format: TextureFormat,
    pub usage: wgpu::TextureUsages,
    pub mip_levels: u32,
    pub array_layers: u32,
}

/// A texture copy region for a buffer-to-texture upload, spec §4.6/§4.7.
#[derive(Debug, Clone, Copy)]
pub struct TextureCopyRegion {
    pub buffer_offset: u64,
    pub mip_level: u32,
    pub array_layer: u32,
    pub texture_offset: (u32, u32, u32),
    pub texture_extent: (u32, u32, u32),
}

/// Minimal device-side capabilities the core needs: create/destroy resources
/// and upload bytes. A real backend implements this over its native API; a
/// `NullRhi` test double implements it in-memory for unit tests.
pub trait RhiDevice {
    fn create_buffer(&mut self, descriptor: &BufferDescriptor) -> BufferHandle;
    fn destroy_buffer(&mut self, handle: BufferHandle);
    fn upload_buffer_data(&mut self, handle: BufferHandle, offset: u64, bytes: &[u8]);

    fn create_texture(&mut self, descriptor: &TextureDescriptor) -> TextureHandle;
    fn destroy_texture(&mut self, handle: TextureHandle);
}

/// Command-list recording surface consumed by C8/C9 (spec §6.1). Only the
/// operations the core actually records through are named here; the rest of
/// a real RHI's surface is out of scope.
pub trait CommandList {
    fn copy_buffer(&mut self, src: BufferHandle, src_offset: u64, dst: BufferHandle, dst_offset: u64, size: u64);
    fn copy_buffer_to_texture(&mut self, src: BufferHandle, dst: TextureHandle, region: TextureCopyRegion);
    fn draw_indexed_indirect(&mut self, indirect_buffer: BufferHandle, offset: u64, draw_count: u32);
}

/// In-memory `RhiDevice`/`CommandList` double used by the crate's own test
/// suite, grounded in the teacher's mock `WgpuContext` pattern for tests.
#[cfg(any(test, feature = "test-util"))]
pub mod null_rhi {
    use super::{BufferDescriptor, BufferHandle, CommandList, RhiDevice, TextureCopyRegion, TextureDescriptor, TextureHandle};

    #[derive(Default)]
    pub struct NullRhi {
        next_buffer: u64,
        next_texture: u64,
        pub destroyed_buffers: Vec<BufferHandle>,
        pub destroyed_textures: Vec<TextureHandle>,
        pub uploads: Vec<(BufferHandle, u64, usize)>,
    }

    impl NullRhi {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl RhiDevice for NullRhi {
        fn create_buffer(&mut self, _descriptor: &BufferDescriptor) -> BufferHandle {
            self.next_buffer += 1;
            BufferHandle(self.next_buffer)
        }

        fn destroy_buffer(&mut self, handle: BufferHandle) {
            self.destroyed_buffers.push(handle);
        }

        fn upload_buffer_data(&mut self, handle: BufferHandle, offset: u64, bytes: &[u8]) {
            self.uploads.push((handle, offset, bytes.len()));
        }

        fn create_texture(&mut self, _descriptor: &TextureDescriptor) -> TextureHandle {
            self.next_texture += 1;
            TextureHandle(self.next_texture)
        }

        fn destroy_texture(&mut self, handle: TextureHandle) {
            self.destroyed_textures.push(handle);
        }
    }

    #[derive(Default)]
    pub struct NullCommandList {
        pub buffer_copies: Vec<(BufferHandle, u64, BufferHandle, u64, u64)>,
        pub copies: Vec<TextureCopyRegion>,
        pub indirect_draws: Vec<(BufferHandle, u64, u32)>,
    }

    impl CommandList for NullCommandList {
        fn copy_buffer(&mut self, src: BufferHandle, src_offset: u64, dst: BufferHandle, dst_offset: u64, size: u64) {
            self.buffer_copies.push((src, src_offset, dst, dst_offset, size));
        }

        fn copy_buffer_to_texture(&mut self, _src: BufferHandle, _dst: TextureHandle, region: TextureCopyRegion) {
            self.copies.push(region);
        }

        fn draw_indexed_indirect(&mut self, indirect_buffer: BufferHandle, offset: u64, draw_count: u32) {
            self.indirect_draws.push((indirect_buffer, offset, draw_count));
        }
    }
}
