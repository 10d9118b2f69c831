//! Per-texture upload state machine (C6): block geometry, copy planning, and
//! cursor advancement.
//!
//! Grounded in `original_source/engine/src/renderer/TextureStreamer.cpp`'s
//! `planNextCopy`/`advanceRequestState`/`getInitialMipLevel`.

use crate::assets::imported_model::LoadPriority;
use crate::gpu::rhi::TextureCopyRegion;

/// Which end of the mip chain is uploaded first (spec §3/§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Coarsest mip first — default, makes the texture sampleable at reduced
    /// quality as soon as possible.
    LowToHighRes,
    HighToLowRes,
}

impl Default for Direction {
    fn default() -> Self {
        Direction::LowToHighRes
    }
}

/// Compressed/uncompressed pixel format, reduced to what block-geometry math
/// needs. Mirrors the source's `getBlockDim` switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFormat {
    Rgba8,
    Bc1,
    Bc3,
    Bc7,
    R8,
    Rg8,
    R32Float,
    Rgba16Float,
    Rgba32Float,
}

/// `(blockWidth, blockHeight, bytesPerBlock)`.
pub struct BlockInfo {
    pub width: u32,
    pub height: u32,
    pub bytes: u32,
}

impl BlockFormat {
    pub fn block_info(self) -> BlockInfo {
        match self {
            BlockFormat::Bc1 => BlockInfo { width: 4, height: 4, bytes: 8 },
            BlockFormat::Bc3 | BlockFormat::Bc7 => BlockInfo { width: 4, height: 4, bytes: 16 },
            BlockFormat::R8 => BlockInfo { width: 1, height: 1, bytes: 1 },
            BlockFormat::Rg8 => BlockInfo { width: 1, height: 1, bytes: 2 },
            BlockFormat::R32Float => BlockInfo { width: 1, height: 1, bytes: 4 },
            BlockFormat::Rgba16Float => BlockInfo { width: 1, height: 1, bytes: 8 },
            BlockFormat::Rgba32Float => BlockInfo { width: 1, height: 1, bytes: 16 },
            BlockFormat::Rgba8 => BlockInfo { width: 1, height: 1, bytes: 4 },
        }
    }
}

/// Extent plus mip/layer/face counts of a decoded image, whatever its source
/// container (KTX2 container or a plain decoded RGBA buffer).
#[derive(Debug, Clone)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub format: BlockFormat,
    pub mip_levels: u32,
    pub num_layers: u32,
    pub num_faces: u32,
    /// Entire image payload held in memory (`None` means stream from `file_path`
    /// by positional read instead).
    pub owned_data: Option<Vec<u8>>,
    pub file_path: Option<String>,
}

/// Where `CopyRegionPlan::copy_size` bytes should be read from.
#[derive(Debug, Clone, Copy)]
pub enum CopySource {
    /// Offset into `ImageData::owned_data`.
    Memory { offset: usize },
    /// Positional read from `ImageData::file_path`.
    File { offset: u64 },
}

/// Cursor through a request's mip/layer/face/row space (spec §3 C6).
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamRequestState {
    pub direction: Direction,
    pub base_mip: u32,
    pub current_level: i32,
    pub current_layer: u32,
    pub current_face: u32,
    pub current_row: u32,
}

impl StreamRequestState {
    pub fn new(direction: Direction, base_mip: u32, image: &ImageData) -> Self {
        Self {
            direction,
            base_mip,
            current_level: initial_mip_level(image, base_mip, direction),
            current_layer: 0,
            current_face: 0,
            current_row: 0,
        }
    }
}

/// Initial value of `currentLevel`: the coarsest mip index for
/// [`Direction::LowToHighRes`], `0` otherwise.
pub fn initial_mip_level(image: &ImageData, base_mip: u32, direction: Direction) -> i32 {
    let effective = (image.mip_levels.saturating_sub(base_mip)).max(1);
    match direction {
        Direction::LowToHighRes => effective as i32 - 1,
        Direction::HighToLowRes => 0,
    }
}

/// One planned `bufferToTexture` copy: source bytes plus the RHI copy region.
#[derive(Debug, Clone)]
pub struct CopyRegionPlan {
    pub source: CopySource,
    pub copy_size: u64,
    pub region: TextureCopyRegion,
    pub rows_copied: u32,
    pub is_mip_finished: bool,
}

/// Plans the next buffer-to-texture copy given remaining staging space,
/// advancing no cursor state itself (spec §4.6). Returns `None` when the
/// request is finished in its current direction, or when there isn't room
/// for even one block row (the caller retries next frame).
pub fn plan_next_copy(
    image: &ImageData,
    state: &StreamRequestState,
    staging_capacity: u64,
    current_staging_offset: u64,
) -> Option<CopyRegionPlan> {
    let effective_mip_levels = (image.mip_levels.saturating_sub(state.base_mip)).max(1) as i32;

    match state.direction {
        Direction::LowToHighRes if state.current_level < 0 => return None,
        Direction::HighToLowRes if state.current_level >= effective_mip_levels => return None,
        _ => {}
    }

    let source_level = state.base_mip + state.current_level as u32;
    let block = image.format.block_info();

    let mip_w = (image.width >> source_level).max(1);
    let mip_h = (image.height >> source_level).max(1);
    let mip_d = (image.depth >> source_level).max(1);

    let width_blocks = mip_w.div_ceil(block.width);
    let height_blocks = mip_h.div_ceil(block.height);

    let bytes_per_row = (width_blocks * block.bytes) as u64;
    let bytes_per_slice = bytes_per_row * height_blocks as u64;
    let bytes_total_mip = bytes_per_slice * mip_d as u64;

    let start_block_row = state.current_row / block.height;
    let bytes_already_copied = start_block_row as u64 * bytes_per_row;

    if bytes_already_copied >= bytes_total_mip {
        return None;
    }

    let bytes_remaining = bytes_total_mip - bytes_already_copied;
    let space_available = staging_capacity.saturating_sub(current_staging_offset);

    if space_available < block.bytes as u64 {
        return None;
    }

    let (copy_bytes, rows_to_copy) = if bytes_remaining <= space_available {
        (bytes_remaining, height_blocks - start_block_row)
    } else {
        let max_rows = space_available / bytes_per_row;
        if max_rows == 0 {
            return None;
        }
        (max_rows * bytes_per_row, max_rows as u32)
    };

    let source = match (&image.owned_data, &image.file_path) {
        (Some(_), _) => CopySource::Memory { offset: bytes_already_copied as usize },
        (None, Some(_)) => CopySource::File { offset: bytes_already_copied },
        (None, None) => return None,
    };

    let array_layer = state.current_layer * image.num_faces + state.current_face;
    let mut copy_height_pixels = rows_to_copy * block.height;
    let y_offset = start_block_row * block.height;
    if y_offset + copy_height_pixels > mip_h {
        copy_height_pixels = mip_h - y_offset;
    }

    Some(CopyRegionPlan {
        source,
        copy_size: copy_bytes,
        region: TextureCopyRegion {
            buffer_offset: current_staging_offset,
            mip_level: state.current_level as u32,
            array_layer,
            texture_offset: (0, y_offset, 0),
            texture_extent: (mip_w, copy_height_pixels, 1),
        },
        rows_copied: rows_to_copy * block.height,
        is_mip_finished: bytes_already_copied + copy_bytes >= bytes_total_mip,
    })
}

/// Advances `(face, layer, level)` after a plane finishes, per spec §4.6.
pub fn advance_request_state(state: &mut StreamRequestState, image: &ImageData) {
    state.current_row = 0;
    state.current_face += 1;
    if state.current_face >= image.num_faces {
        state.current_face = 0;
        state.current_layer += 1;
        if state.current_layer >= image.num_layers {
            state.current_layer = 0;
            match state.direction {
                Direction::LowToHighRes => state.current_level -= 1,
                Direction::HighToLowRes => state.current_level += 1,
            }
        }
    }
}

/// A texture streaming request: the upload state machine plus its scheduling
/// metadata (spec §3/§4.7).
pub struct StreamingRequest {
    pub id: u64,
    pub priority: LoadPriority,
    pub target_texture: crate::gpu::rhi::TextureHandle,
    pub image: ImageData,
    pub state: StreamRequestState,
    pub target_mip_levels: u32,
    pub retry_count: u32,
}

impl StreamingRequest {
    pub fn new(
        id: u64,
        priority: LoadPriority,
        target_texture: crate::gpu::rhi::TextureHandle,
        image: ImageData,
        direction: Direction,
        base_mip: u32,
    ) -> Self {
        let state = StreamRequestState::new(direction, base_mip, &image);
        let target_mip_levels = image.mip_levels.max(1);
        Self { id, priority, target_texture, image, state, target_mip_levels, retry_count: 0 }
    }

    /// `true` once every mip/layer/face plane has been copied in the current
    /// direction (i.e. `plan_next_copy` will keep returning `None`).
    pub fn is_finished(&self) -> bool {
        match self.state.direction {
            Direction::LowToHighRes => self.state.current_level < 0,
            Direction::HighToLowRes => {
                let effective = (self.image.mip_levels.saturating_sub(self.state.base_mip)).max(1) as i32;
                self.state.current_level >= effective
            }
        }
    }
}
