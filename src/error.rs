//! # Allocation Errors
//!
//! The only failure an allocator reports at runtime. Misuse (zero-sized
//! requests, bad alignment, foreign pointers) is a programming error and
//! panics instead.

use thiserror::Error;

/// Errors returned by [`Allocator::allocate`](crate::Allocator::allocate).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
  /// No block in the region can hold the request at the requested alignment.
  #[error("out of memory: cannot allocate {size} bytes aligned to {alignment}")]
  OutOfMemory {
    /// Requested usable size in bytes.
    size: usize,
    /// Requested alignment in bytes.
    alignment: usize,
  },
}
