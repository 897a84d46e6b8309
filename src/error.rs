//! Error types for the frame allocator.
//!
//! Out-of-memory is not an error: allocation returns `None`.

use thiserror::Error;

use crate::bootstrap::Phase;

/// A frame address that breaks the allocator's contract.
///
/// The kernel treats all of these as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Address is not aligned to a frame boundary.
    #[error("frame address 0x{addr:x} is not page aligned")]
    Misaligned { addr: u64 },
    /// Address lies below the kernel image end or at/above the physical limit.
    #[error("frame address 0x{addr:x} is outside managed memory")]
    OutOfRange { addr: u64 },
    /// Frame is already free.
    #[error("frame 0x{addr:x} released twice")]
    DoubleFree { addr: u64 },
}

/// Bootstrap sequencing errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BootstrapError {
    #[error("bootstrap out of order: expected {expected}, found {found}")]
    OutOfOrder { expected: Phase, found: Phase },
    #[error("bad bootstrap range: {0}")]
    Frame(#[from] FrameError),
}

/// Ownership export errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExportError {
    /// An output buffer is missing or the requested count is zero.
    #[error("invalid argument")]
    InvalidArgument,
}

/// Allocator configuration errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("ownership table capacity must be non-zero")]
    ZeroCapacity,
    #[error("ownership table capacity {0} exceeds the frame index width")]
    CapacityTooLarge(usize),
    #[error("physical range 0x{start:x}..0x{end:x} holds no frame")]
    EmptyRange { start: u64, end: u64 },
    #[error("physical range spans more frames than the index can address")]
    RangeTooLarge,
    #[error("unknown allocation policy (expected `simple` or `locality`)")]
    UnknownPolicy,
}
