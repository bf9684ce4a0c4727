//! Error types shared by the simulation core.

use crate::backend::Kernel;
use thiserror::Error;

/// Invalid startup configuration. Always fatal: the pipeline never runs
/// with settings that failed validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("domain must be at least 1x1, got {width}x{height}")]
    EmptyDomain { width: usize, height: usize },

    #[error("domain {width}x{height} does not fit in memory addressing")]
    DomainTooLarge { width: usize, height: usize },

    #[error("at least one scale must be configured")]
    NoScales,

    #[error("scale {index}: {which} radius must be a positive finite number, got {value}")]
    InvalidRadius {
        index: usize,
        which: &'static str,
        value: f32,
    },

    #[error("scale {index}: {which} radius {value} exceeds the domain extent {limit}")]
    RadiusTooLarge {
        index: usize,
        which: &'static str,
        value: f32,
        limit: usize,
    },

    #[error("scale {index}: activator radius {activator} exceeds inhibitor radius {inhibitor}")]
    RadiiOrder {
        index: usize,
        activator: f32,
        inhibitor: f32,
    },

    #[error("scale {index}: small_amount must be a positive finite number, got {value}")]
    InvalidStep { index: usize, value: f32 },

    #[error("scale {index}: symmetry must be at least 1")]
    InvalidSymmetry { index: usize },

    #[error("{field}: colour channels must be finite and within [0, 1]")]
    InvalidColour { field: String },
}

/// Failures reported by a compute backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("could not allocate {bytes} bytes")]
    OutOfMemory { bytes: usize },

    #[error("{kernel} pass: buffer holds {got} elements, expected {expected}")]
    SizeMismatch {
        kernel: Kernel,
        expected: usize,
        got: usize,
    },

    #[error("{kernel} pass failed: {reason}")]
    PassFailed { kernel: Kernel, reason: String },

    #[error("could not build worker pool: {0}")]
    ThreadPool(String),
}

/// Errors surfaced by the frame orchestrator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("startup allocation failed: {0}")]
    Resource(BackendError),

    #[error("frame {frame} dropped: {source}")]
    FrameFailed {
        frame: u64,
        #[source]
        source: BackendError,
    },

    #[error("scale index {index} out of range ({count} scales)")]
    ScaleOutOfRange { index: usize, count: usize },

    #[error("upload rejected: {0}")]
    Upload(BackendError),
}
