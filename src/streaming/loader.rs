//! Priority work queue draining texture streaming requests onto the transfer
//! path (C7).
//!
//! Grounded in `original_source/engine/src/renderer/AsyncLoaderStagingManager.cpp`
//! and `tests/renderer/Test_AsyncLoader.cpp`'s per-iteration worker loop:
//! dequeue by priority (FIFO within a priority), plan one copy, reserve
//! staging bytes, record the transfer, requeue or publish completion.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use rustc_hash::FxHashMap;

use crate::assets::imported_model::LoadPriority;
use crate::errors::{EngineError, Result};
use crate::gpu::ring_allocator::RingStagingAllocator;
use crate::gpu::rhi::{CommandList, RhiDevice, TextureHandle};
use crate::streaming::request::{advance_request_state, plan_next_copy, CopySource, StreamingRequest};

/// Default retry cap before a capacity-exceeded request is abandoned (spec
/// §7 error kind 2).
pub const DEFAULT_MAX_RETRIES: u32 = 8;

/// Final disposition of a request published to the render thread (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Ready,
    Failed,
}

/// One entry of the completed-texture publish list drained once per frame
/// (spec §5 SPSC queue).
#[derive(Debug, Clone, Copy)]
pub struct CompletedTexture {
    pub handle: TextureHandle,
    pub status: LoadStatus,
}

struct QueueEntry {
    priority: LoadPriority,
    seq: u64,
    request_id: u64,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: higher priority pops first; within equal
        // priority, the lower sequence number (earlier enqueue) pops first.
        self.priority.cmp(&other.priority).then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Drains a priority queue of [`StreamingRequest`]s, one planned copy per
/// [`AsyncLoader::process_one`] call (spec §4.7).
pub struct AsyncLoader {
    queue: BinaryHeap<QueueEntry>,
    requests: FxHashMap<u64, StreamingRequest>,
    /// Tracks which request id is currently streaming a given texture, so a
    /// second request for the same handle coalesces into the first instead
    /// of enqueuing a duplicate (spec §8 boundary behavior).
    in_flight: FxHashMap<TextureHandle, u64>,
    next_seq: u64,
    next_request_id: u64,
    completed: Vec<CompletedTexture>,
    max_retries: u32,
    /// Handle of the ring allocator's single persistently mapped staging
    /// buffer (spec §4.5 "created once at startup, persistently mapped").
    staging_buffer: crate::gpu::rhi::BufferHandle,
    pub failed_loads: u64,
}

impl Default for AsyncLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncLoader {
    pub fn new() -> Self {
        Self::with_max_retries(DEFAULT_MAX_RETRIES)
    }

    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            queue: BinaryHeap::new(),
            requests: FxHashMap::default(),
            in_flight: FxHashMap::default(),
            next_seq: 0,
            next_request_id: 1,
            completed: Vec::new(),
            max_retries,
            staging_buffer: crate::gpu::rhi::BufferHandle(0),
            failed_loads: 0,
        }
    }

    /// Binds the ring allocator's staging buffer handle, created by the
    /// caller once at startup (spec §4.5).
    pub fn set_staging_buffer(&mut self, handle: crate::gpu::rhi::BufferHandle) {
        self.staging_buffer = handle;
    }

    /// Enqueues `request` and returns the id it is tracked under. If a
    /// request already in flight targets the same texture, `request` is
    /// dropped and the existing one's priority is raised to the max of the
    /// two instead of enqueuing a duplicate (spec §8 boundary behavior).
    pub fn submit(&mut self, mut request: StreamingRequest) -> u64 {
        if let Some(&existing_id) = self.in_flight.get(&request.target_texture) {
            if let Some(existing) = self.requests.get_mut(&existing_id) {
                if request.priority > existing.priority {
                    existing.priority = request.priority;
                    self.push(existing_id, existing.priority);
                }
                return existing_id;
            }
        }

        let id = self.next_request_id;
        self.next_request_id += 1;
        request.id = id;
        let priority = request.priority;
        self.in_flight.insert(request.target_texture, id);
        self.requests.insert(id, request);
        self.push(id, priority);
        id
    }

    fn push(&mut self, request_id: u64, priority: LoadPriority) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(QueueEntry { priority, seq, request_id });
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    /// Drains the completed-texture publish list (spec §5: SPSC, drained
    /// exactly once per frame by the render thread).
    pub fn consume_completed(&mut self) -> Vec<CompletedTexture> {
        std::mem::take(&mut self.completed)
    }

    /// Runs one iteration of the transfer worker loop: dequeue the
    /// highest-priority request, plan one copy, reserve staging bytes, record
    /// the transfer, and either requeue or publish completion. No-op if the
    /// queue is empty.
    pub fn process_one(
        &mut self,
        ring: &RingStagingAllocator,
        device: &mut dyn RhiDevice,
        commands: &mut dyn CommandList,
    ) {
        // A coalesced priority raise leaves the request's old queue entry
        // behind with a stale priority; skip those rather than processing
        // the same request twice in one call.
        let (entry, mut request) = loop {
            let Some(entry) = self.queue.pop() else { return };
            let is_stale = match self.requests.get(&entry.request_id) {
                Some(req) => req.priority != entry.priority,
                None => true,
            };
            if is_stale {
                continue;
            }
            let request = self.requests.remove(&entry.request_id).expect("checked above");
            break (entry, request);
        };

        match self.step(&mut request, ring, device, commands) {
            Ok(StepOutcome::Requeued) => {
                let priority = request.priority;
                self.requests.insert(entry.request_id, request);
                self.push(entry.request_id, priority);
            }
            Ok(StepOutcome::Ready) => {
                self.in_flight.remove(&request.target_texture);
                self.completed.push(CompletedTexture { handle: request.target_texture, status: LoadStatus::Ready });
            }
            Err(_) => {
                self.in_flight.remove(&request.target_texture);
                self.failed_loads += 1;
                self.completed.push(CompletedTexture { handle: request.target_texture, status: LoadStatus::Failed });
            }
        }
    }

    fn step(
        &self,
        request: &mut StreamingRequest,
        ring: &RingStagingAllocator,
        device: &mut dyn RhiDevice,
        commands: &mut dyn CommandList,
    ) -> Result<StepOutcome> {
        let batch_id = ring.begin_batch();
        // Plan against the full ring capacity with a zero provisional offset;
        // the reservation below supplies the real byte offset once sized.
        let plan = plan_next_copy(&request.image, &request.state, ring.capacity(), 0);
        let Some(mut plan) = plan else {
            return Ok(StepOutcome::Ready);
        };

        let reservation = match ring.reserve(plan.copy_size, batch_id) {
            Ok(r) => r,
            Err(EngineError::StagingCapacityExceeded { .. } | EngineError::TemporaryBufferPoolExhausted { .. }) => {
                request.retry_count += 1;
                if request.retry_count > self.max_retries {
                    log::error!(
                        "streaming: request for texture {:?} exceeded retry cap ({}), marking failed",
                        request.target_texture,
                        self.max_retries
                    );
                    return Err(EngineError::StagingCapacityExceeded { requested: plan.copy_size });
                }
                return Ok(StepOutcome::Requeued);
            }
            Err(e) => return Err(e),
        };

        plan.region.buffer_offset = reservation.offset;

        let bytes = read_copy_bytes(&plan.source, plan.copy_size as usize, &request.image)?;
        device.upload_buffer_data(self.staging_buffer, reservation.offset, &bytes);
        commands.copy_buffer_to_texture(self.staging_buffer, request.target_texture, plan.region);

        ring.mark_pages(reservation.offset, reservation.size, batch_id);
        ring.notify_batch_complete(batch_id);
        reservation.release();

        if plan.is_mip_finished {
            advance_request_state(&mut request.state, &request.image);
        }

        if request.is_finished() {
            Ok(StepOutcome::Ready)
        } else {
            Ok(StepOutcome::Requeued)
        }
    }
}

enum StepOutcome {
    Requeued,
    Ready,
}

fn read_copy_bytes(source: &CopySource, size: usize, image: &crate::streaming::request::ImageData) -> Result<Vec<u8>> {
    match source {
        CopySource::Memory { offset } => {
            let data = image.owned_data.as_ref().ok_or_else(|| EngineError::Io {
                path: image.file_path.clone().unwrap_or_default(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no in-memory image data"),
            })?;
            let end = offset + size;
            if end > data.len() {
                return Err(EngineError::Io {
                    path: image.file_path.clone().unwrap_or_default(),
                    source: std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short image buffer"),
                });
            }
            Ok(data[*offset..end].to_vec())
        }
        CopySource::File { offset } => {
            let path = image.file_path.as_deref().unwrap_or_default();
            let mut file = File::open(path).map_err(|e| EngineError::Io { path: path.to_string(), source: e })?;
            file.seek(SeekFrom::Start(*offset)).map_err(|e| EngineError::Io { path: path.to_string(), source: e })?;
            let mut buf = vec![0u8; size];
            file.read_exact(&mut buf).map_err(|e| EngineError::Io { path: path.to_string(), source: e })?;
            Ok(buf)
        }
    }
}
