//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! The main error type [`EngineError`] covers every failure mode described in
//! the engine's error-handling design: capacity exhaustion in the staging
//! allocator, I/O and format failures surfaced by the texture streamer, cache
//! corruption, and fatal internal invariant violations.
//!
//! All public APIs that can fail return [`Result<T>`].

use thiserror::Error;

/// The crate-wide error type.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A queried entity does not have the requested component.
    #[error("entity {entity} has no component of type {component}")]
    MissingComponent {
        /// The entity that was queried.
        entity: u32,
        /// Name of the missing component type, for diagnostics.
        component: &'static str,
    },

    /// The ring staging allocator could not satisfy a reservation even after
    /// waiting for in-flight batches to complete.
    #[error("staging allocator out of capacity: requested {requested} bytes")]
    StagingCapacityExceeded {
        /// Bytes requested by the reservation.
        requested: u64,
    },

    /// The temporary (oversize) staging buffer pool has no free slot.
    #[error("temporary staging buffer pool exhausted (max {max} concurrent buffers)")]
    TemporaryBufferPoolExhausted {
        /// Configured maximum concurrent temporary buffers.
        max: usize,
    },

    /// A requested asset file could not be read.
    #[error("I/O error loading '{path}': {source}")]
    Io {
        /// Path that failed to load.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The image/texture container format (or its compression scheme) is not
    /// supported by the active backend.
    #[error("unsupported texture format for '{path}': {reason}")]
    UnsupportedFormat {
        /// Path of the offending asset.
        path: String,
        /// Human-readable reason.
        reason: String,
    },

    /// The on-disk cache file failed magic/version validation and was
    /// discarded; the caller should fall back to re-importing from source.
    #[error("cache file corrupt or outdated: {reason}")]
    CacheCorrupt {
        /// Human-readable reason (bad magic, version mismatch, short chunk…).
        reason: String,
    },

    /// A scene-graph or registry invariant was violated. This indicates a
    /// programmer bug, never a user/data error, and is never expected to be
    /// recovered from.
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;
