//! # carve - Allocators over Caller-Supplied Memory
//!
//! This crate carves a fixed, caller-owned byte region into blocks without
//! touching the global heap. Two strategies share one contract:
//!
//! - [`LinearAllocator`]: a bump pointer with mark/rewind, for scope-based
//!   lifetimes (one frame, one phase, one request).
//! - [`FreeListAllocator`]: best-fit allocation with per-block headers,
//!   splitting and coalescing, for blocks released in any order.
//!
//! ## Overview
//!
//! ```text
//!   Linear:
//!
//!   ┌─────┬─────┬─────┬─────┬───────────────────────────────────────┐
//!   │ A1  │ A2  │ A3  │ A4  │            Free Space                 │
//!   └─────┴─────┴─────┴─────┴───────────────────────────────────────┘
//!                           ▲
//!                           └── current (rewind moves it back)
//!
//!   Free list:
//!
//!   ┌─────┬──────────┬─────┬──────┬─────┬─────────────────────────────┐
//!   │ A1  │   free   │ A2  │ free │ A3  │            free             │
//!   └─────┴──────────┴─────┴──────┴─────┴─────────────────────────────┘
//!          ▲     │          ▲  │          ▲
//!   head ──┘     └──────────┘  └──────────┘   (address ordered)
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   carve
//!   ├── align      - Alignment macro and adjustment math
//!   ├── allocator  - Allocator trait and shared accounting
//!   ├── block      - In-region records: FreeBlock, AllocationHeader
//!   ├── error      - AllocError
//!   ├── free_list  - FreeListAllocator
//!   ├── linear     - LinearAllocator
//!   ├── page       - PageRegion, mmap-backed regions (unix)
//!   └── region     - Region, the borrowed backing memory
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use carve::{Allocator, FreeListAllocator, LinearAllocator, Region};
//!
//! let mut backing = vec![0u8; 1024];
//!
//! {
//!   let mut allocator = FreeListAllocator::new(Region::new(&mut backing));
//!   let first = allocator.allocate(100, 8).unwrap();
//!   assert!(allocator.allocate(2000, 8).is_err());
//!
//!   unsafe { allocator.free(first) };
//!   assert_eq!(allocator.allocate(100, 8).unwrap(), first);
//!   unsafe { allocator.free(first) };
//! }
//!
//! let mut allocator = LinearAllocator::new(Region::new(&mut backing));
//! allocator.allocate_default(100).unwrap();
//! let mark = allocator.current();
//! allocator.allocate_default(50).unwrap();
//! allocator.rewind(mark);
//! allocator.clear();
//! ```
//!
//! ## Errors
//!
//! Running out of space is the only runtime failure and comes back as
//! [`AllocError::OutOfMemory`]. Zero-sized requests, non-power-of-two
//! alignments, rewinding forward and dropping a free-list allocator with live
//! blocks are programming errors and panic.
//!
//! ## Limitations
//!
//! - **Single owner only**: no synchronization, wrap in a mutex to share
//! - **Fixed regions**: nothing grows, an exhausted region stays exhausted
//! - **Trusting headers**: a corrupted header corrupts the free list
//!
//! ## Logging
//!
//! Allocation events go through the [`log`](https://docs.rs/log) facade at
//! `trace` level, merges and out-of-memory at `debug`. Install any logger to
//! see them.

pub mod align;
mod allocator;
mod block;
mod error;
mod free_list;
mod linear;
#[cfg(unix)]
mod page;
mod region;

pub use align::DEFAULT_ALIGNMENT;
pub use allocator::{Allocator, AllocatorState};
pub use block::{AllocationHeader, FreeBlock};
pub use error::AllocError;
pub use free_list::{FreeBlocks, FreeListAllocator};
pub use linear::{LinearAllocator, Mark};
#[cfg(unix)]
pub use page::{PageRegion, page_size};
pub use region::Region;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_strategies_behind_one_contract() {
    let mut linear_backing = vec![0u8; 512];
    let mut free_list_backing = vec![0u8; 512];

    let mut allocators: Vec<Box<dyn Allocator + '_>> = vec![
      Box::new(LinearAllocator::new(Region::new(&mut linear_backing))),
      Box::new(FreeListAllocator::new(Region::new(&mut free_list_backing))),
    ];

    for allocator in allocators.iter_mut() {
      let ptr = allocator.allocate(64, 16).unwrap();
      assert_eq!(ptr.as_ptr() as usize % 16, 0);
      assert!(allocator.used() >= 64);
      assert_eq!(allocator.num_allocations(), 1);
      assert_eq!(allocator.size(), 512);
      assert!(allocator.allocate(1024, 8).is_err());
      unsafe { allocator.free(ptr) };
    }

    // Only the free list actually gives the block back.
    assert_eq!(allocators[0].num_allocations(), 1);
    assert_eq!(allocators[1].num_allocations(), 0);
    assert_eq!(allocators[1].used(), 0);
  }
}
