//! Error types for the harness.

use thiserror::Error;

use crate::session::DeviceClass;

/// Main error type for harness operations.
///
/// Every OpenCL failure is mapped onto one of these variants at the call
/// site that encountered it, so composite operations (`setup_kernel`,
/// `run`) surface the first failing step distinctly instead of logging
/// and continuing.
#[derive(Debug, Error)]
pub enum Error {
    /// No device of the requested class exists on any platform.
    #[error("no {class} device found on any OpenCL platform")]
    NoDevice { class: DeviceClass },

    /// Compute context creation failed.
    #[error("failed to create compute context: {0}")]
    Context(String),

    /// Command queue creation failed.
    #[error("failed to create command queue: {0}")]
    Queue(String),

    /// Device buffer allocation failed.
    #[error("failed to allocate {bytes} byte device buffer: {reason}")]
    BufferAlloc { bytes: usize, reason: String },

    /// A host/device copy failed or was given mismatched lengths.
    #[error("host/device transfer failed: {0}")]
    Transfer(String),

    /// Kernel source failed to compile; carries the compiler build log.
    #[error("kernel compilation failed:\n{build_log}")]
    Compile { build_log: String },

    /// A named entry point could not be resolved in a built program.
    #[error("no kernel entry point named `{name}`: {reason}")]
    EntryPoint { name: String, reason: String },

    /// Binding a single argument to its parameter slot failed.
    #[error("failed to bind kernel argument {index}: {reason}")]
    Bind { index: usize, reason: String },

    /// The argument list exceeds the harness capacity.
    #[error("argument list has {count} entries, harness supports at most {max}")]
    TooManyArgs { count: usize, max: usize },

    /// A work-item dimension query outside the 0..=2 range.
    #[error("work-item dimension {0} out of range (expected 0, 1 or 2)")]
    InvalidDimension(usize),

    /// Global and local extents disagree in rank, or the rank is not 1..=3.
    #[error("index space has {global} global axes but {local} local axes")]
    DimensionMismatch { global: usize, local: usize },

    /// A slot order passed to `attach_permuted` is not a permutation.
    #[error("invalid argument permutation: {0}")]
    InvalidPermutation(String),

    /// Kernel enqueue or queue drain failed.
    #[error("kernel dispatch failed: {0}")]
    Launch(String),
}

pub type Result<T> = std::result::Result<T, Error>;
