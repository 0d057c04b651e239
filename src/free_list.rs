use std::{ptr::NonNull, thread};

use log::{debug, trace};

use crate::{
  align::align_forward_adjustment_with_header,
  allocator::{Allocator, AllocatorState, check_request},
  block::{AllocationHeader, FREE_BLOCK_SIZE, FreeBlock, HEADER_SIZE, NO_BLOCK},
  error::AllocError,
  region::Region,
};

/// Best-fit allocator that coalesces neighbouring free blocks.
///
/// Free space is tracked by a singly linked list of [`FreeBlock`] nodes living
/// inside the free ranges themselves, kept in increasing address order:
///
/// ```text
///   head ──────────┐             ┌──────────────────────┐
///                  ▼             │                      ▼
///   ┌────────┬─────────────┬─────────┬────────┬──────────────────┐
///   │ alloc  │    free     │  alloc  │ alloc  │       free       │
///   └────────┴─────────────┴─────────┴────────┴──────────────────┘
///
///   Each allocation:
///   ┌─────────┬──────────────────┬───────────────────────────┐
///   │ padding │ AllocationHeader │        user data          │
///   └─────────┴──────────────────┴───────────────────────────┘
///   ◄──────── adjustment ────────►▲
///                                 └── address returned to caller
/// ```
///
/// Because the list is address ordered, the only merge candidates for a freed
/// range are its immediate list neighbours.
pub struct FreeListAllocator<'a> {
  state: AllocatorState<'a>,
  /// Offset of the first free block, or [`NO_BLOCK`] when the region is full.
  head: usize,
  /// Leftovers no larger than this are handed out with the allocation
  /// instead of becoming a new free block.
  min_fragment: usize,
}

#[derive(Debug, Clone, Copy)]
struct Fit {
  prev: usize,
  offset: usize,
  block: FreeBlock,
  adjustment: usize,
  total: usize,
}

impl<'a> FreeListAllocator<'a> {
  /// Creates an allocator whose free list is one block spanning `region`.
  ///
  /// # Panics
  ///
  /// Panics if the region cannot hold a single free-block node.
  pub fn new(region: Region<'a>) -> Self {
    Self::with_min_fragment(region, HEADER_SIZE)
  }

  /// Like [`new`](Self::new), but only splits a block when the leftover is
  /// strictly larger than `min_fragment` bytes.
  ///
  /// # Panics
  ///
  /// Panics if `min_fragment` is smaller than the allocation header, or if
  /// the region cannot hold a single free-block node.
  pub fn with_min_fragment(
    region: Region<'a>,
    min_fragment: usize,
  ) -> Self {
    assert!(
      min_fragment >= HEADER_SIZE,
      "minimum fragment must be at least {} bytes",
      HEADER_SIZE
    );
    assert!(
      region.len() >= FREE_BLOCK_SIZE,
      "region of {} bytes cannot hold a free block",
      region.len()
    );

    let len = region.len();
    let mut allocator = Self {
      state: AllocatorState::new(region),
      head: 0,
      min_fragment,
    };
    allocator.write_node(0, FreeBlock::new(len, NO_BLOCK));

    allocator
  }

  pub fn min_fragment(&self) -> usize {
    self.min_fragment
  }

  /// Free blocks as `(offset, size)` pairs, in address order.
  pub fn free_blocks(&self) -> FreeBlocks<'_> {
    FreeBlocks {
      region: self.state.region(),
      cursor: self.head,
    }
  }

  pub fn free_block_count(&self) -> usize {
    self.free_blocks().count()
  }

  /// Size of the largest free block, header space included.
  pub fn largest_free_block(&self) -> usize {
    self.free_blocks().map(|(_, size)| size).max().unwrap_or(0)
  }

  fn read_node(
    &self,
    offset: usize,
  ) -> FreeBlock {
    debug_assert!(offset + FREE_BLOCK_SIZE <= self.state.size());
    // SAFETY: free-list offsets always point at a node inside the region.
    unsafe { FreeBlock::read(self.state.region().ptr_at(offset)) }
  }

  fn write_node(
    &mut self,
    offset: usize,
    block: FreeBlock,
  ) {
    debug_assert!(offset + FREE_BLOCK_SIZE <= self.state.size());
    // SAFETY: the range is free, inside the region and large enough for a node.
    unsafe { block.write(self.state.region().ptr_at(offset)) }
  }

  /// Points `prev` (or the head when `prev` is [`NO_BLOCK`]) at `next`.
  fn relink(
    &mut self,
    prev: usize,
    next: usize,
  ) {
    if prev == NO_BLOCK {
      self.head = next;
    } else {
      let mut node = self.read_node(prev);
      node.next = next;
      self.write_node(prev, node);
    }
  }

  /// Single pass over the free list, keeping the smallest block that fits.
  fn find_best_fit(
    &self,
    size: usize,
    alignment: usize,
  ) -> Option<Fit> {
    let base = self.state.region().start_address();

    let mut best: Option<Fit> = None;
    let mut prev = NO_BLOCK;
    let mut offset = self.head;

    while offset != NO_BLOCK {
      let block = self.read_node(offset);
      let adjustment = align_forward_adjustment_with_header(base + offset, alignment, HEADER_SIZE);

      if let Some(total) = size.checked_add(adjustment) {
        if block.size >= total {
          let exact = block.size == total;

          if exact || best.is_none_or(|fit| block.size < fit.block.size) {
            best = Some(Fit {
              prev,
              offset,
              block,
              adjustment,
              total,
            });
          }

          if exact {
            break;
          }
        }
      }

      prev = offset;
      offset = block.next;
    }

    best
  }

  /// Checks that the free list is address ordered, in bounds and coalesced.
  #[cfg(test)]
  fn assert_consistent(&self) {
    let mut free = 0;
    let mut last_end: Option<usize> = None;

    for (offset, size) in self.free_blocks() {
      assert!(size >= FREE_BLOCK_SIZE);
      assert!(offset + size <= self.size());
      if let Some(end) = last_end {
        assert!(end < offset, "free blocks overlap or were not merged");
      }
      last_end = Some(offset + size);
      free += size;
    }

    assert_eq!(free + self.used(), self.size());
  }
}

impl Allocator for FreeListAllocator<'_> {
  fn allocate(
    &mut self,
    size: usize,
    alignment: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    check_request(size, alignment);

    let Some(fit) = self.find_best_fit(size, alignment) else {
      debug!(
        "free list allocate: out of memory, {} bytes at align {} (largest free block {})",
        size,
        alignment,
        self.largest_free_block()
      );
      return Err(AllocError::OutOfMemory { size, alignment });
    };

    let mut total = fit.total;
    let leftover = fit.block.size - total;

    if leftover <= self.min_fragment {
      total = fit.block.size;
      self.relink(fit.prev, fit.block.next);
    } else {
      let split = fit.offset + total;
      self.write_node(split, FreeBlock::new(leftover, fit.block.next));
      self.relink(fit.prev, split);
    }

    let aligned = self.state.region().ptr_at(fit.offset + fit.adjustment);
    // SAFETY: `adjustment >= HEADER_SIZE`, so the header lands inside the
    // reserved range, before the caller's bytes.
    unsafe { AllocationHeader::new(total, fit.adjustment).write_before(aligned) };

    self.state.record_allocation(total);

    trace!(
      "free list allocate: {} bytes at {:?} (block {} of {}, reserved {}, adjustment {})",
      size, aligned, fit.offset, fit.block.size, total, fit.adjustment
    );

    Ok(aligned)
  }

  unsafe fn free(
    &mut self,
    address: NonNull<u8>,
  ) {
    let header = unsafe { AllocationHeader::read_before(address) };
    let offset = self.state.region().offset_of(address.as_ptr() as usize);

    debug_assert!(header.adjustment >= HEADER_SIZE && header.adjustment <= offset);
    let block_start = offset - header.adjustment;
    let block_size = header.size;
    let block_end = block_start + block_size;
    debug_assert!(block_end <= self.state.size(), "corrupt allocation header");

    // First free block at or past the end of the freed range; `prev` is the
    // candidate left neighbour.
    let mut prev = NO_BLOCK;
    let mut next = self.head;
    while next != NO_BLOCK && next < block_end {
      prev = next;
      next = self.read_node(next).next;
    }

    let merged = if prev == NO_BLOCK {
      self.write_node(block_start, FreeBlock::new(block_size, self.head));
      self.head = block_start;
      block_start
    } else {
      let mut left = self.read_node(prev);
      debug_assert!(prev + left.size <= block_start, "double free at {:?}", address);

      if prev + left.size == block_start {
        debug!("free list: merging {} freed bytes into block {}", block_size, prev);
        left.size += block_size;
        self.write_node(prev, left);
        prev
      } else {
        self.write_node(block_start, FreeBlock::new(block_size, left.next));
        left.next = block_start;
        self.write_node(prev, left);
        block_start
      }
    };

    let mut node = self.read_node(merged);
    if node.next != NO_BLOCK && merged + node.size == node.next {
      let absorbed = self.read_node(node.next);
      debug!("free list: merging block {} into block {}", node.next, merged);
      node.size += absorbed.size;
      node.next = absorbed.next;
      self.write_node(merged, node);
    }

    self.state.record_free(block_size);

    trace!(
      "free list free: {:?} (block {} of {}, used {})",
      address,
      block_start,
      block_size,
      self.state.used_bytes()
    );
  }

  fn state(&self) -> &AllocatorState<'_> {
    &self.state
  }
}

impl Drop for FreeListAllocator<'_> {
  fn drop(&mut self) {
    if !thread::panicking() {
      debug_assert!(
        self.state.is_idle(),
        "free list allocator dropped with {} live allocations ({} bytes)",
        self.state.num_allocations(),
        self.state.used_bytes()
      );
    }
  }
}

/// Iterator returned by [`FreeListAllocator::free_blocks`].
pub struct FreeBlocks<'r> {
  region: &'r Region<'r>,
  cursor: usize,
}

impl Iterator for FreeBlocks<'_> {
  type Item = (usize, usize);

  fn next(&mut self) -> Option<Self::Item> {
    if self.cursor == NO_BLOCK {
      return None;
    }

    let offset = self.cursor;
    // SAFETY: the cursor only ever holds offsets taken from the free list.
    let block = unsafe { FreeBlock::read(self.region.ptr_at(offset)) };
    self.cursor = block.next;

    Some((offset, block.size))
  }
}
