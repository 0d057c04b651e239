use std::ptr::NonNull;

use log::{debug, trace};

use crate::{
  align::align_forward_adjustment,
  allocator::{Allocator, AllocatorState, check_request},
  error::AllocError,
  region::Region,
};

/// A cursor position previously observed with [`LinearAllocator::current`].
///
/// Only meaningful for the allocator that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Mark(usize);

impl Mark {
  /// Byte offset of the cursor from the region start.
  pub fn offset(self) -> usize {
    self.0
  }
}

/// Bump-pointer allocator with mark/rewind.
///
/// ```text
///   start                              current                      end
///   │                                  │                            │
///   ▼                                  ▼                            ▼
///   ┌────┬──────┬──┬─────────┬───┬─────┬────────────────────────────┐
///   │ A1 │  A2  │░░│   A3    │░░░│ A4  │          free              │
///   └────┴──────┴──┴─────────┴───┴─────┴────────────────────────────┘
///                ▲              ▲
///                └──────────────┴── alignment padding
/// ```
///
/// Allocations carry no header. Individual blocks cannot be released; use
/// [`rewind`](LinearAllocator::rewind) or [`clear`](LinearAllocator::clear)
/// to drop everything allocated after a point.
pub struct LinearAllocator<'a> {
  state: AllocatorState<'a>,
  current: usize,
}

impl<'a> LinearAllocator<'a> {
  pub fn new(region: Region<'a>) -> Self {
    Self {
      state: AllocatorState::new(region),
      current: 0,
    }
  }

  /// The live cursor. Pass it to [`rewind`](Self::rewind) later to release
  /// everything allocated after this point.
  pub fn current(&self) -> Mark {
    Mark(self.current)
  }

  /// Address the next allocation would start from, before alignment.
  pub fn current_ptr(&self) -> NonNull<u8> {
    self.state.region().ptr_at(self.current)
  }

  /// Moves the cursor back to `mark`.
  ///
  /// The allocation count is left alone: the rewound blocks are invalidated
  /// as a group, not counted back one by one.
  ///
  /// # Panics
  ///
  /// Panics if `mark` lies ahead of the current cursor.
  pub fn rewind(
    &mut self,
    mark: Mark,
  ) {
    assert!(
      mark.0 <= self.current,
      "cannot rewind forward: mark at {} but cursor at {}",
      mark.0,
      self.current
    );

    trace!("linear rewind: cursor {} -> {}", self.current, mark.0);

    self.current = mark.0;
    self.state.set_used_bytes(self.current);
  }

  /// Releases every allocation and moves the cursor back to the region start.
  pub fn clear(&mut self) {
    trace!(
      "linear clear: dropping {} allocations ({} bytes)",
      self.state.num_allocations(),
      self.state.used_bytes()
    );

    self.current = 0;
    self.state.reset();
  }

  /// Runs `f` and rewinds to the cursor observed before it ran.
  ///
  /// Every block allocated inside `f` is invalid once this returns.
  pub fn scoped<R>(
    &mut self,
    f: impl FnOnce(&mut Self) -> R,
  ) -> R {
    let mark = self.current();
    let result = f(self);
    self.rewind(mark);
    result
  }
}

impl Allocator for LinearAllocator<'_> {
  fn allocate(
    &mut self,
    size: usize,
    alignment: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    check_request(size, alignment);

    let address = self.state.region().start_address() + self.current;
    let adjustment = align_forward_adjustment(address, alignment);
    let available = self.state.size() - self.current;

    let fits = adjustment
      .checked_add(size)
      .is_some_and(|needed| needed <= available);

    if !fits {
      debug!(
        "linear allocate: out of memory, {} bytes at align {} with {} available",
        size, alignment, available
      );
      return Err(AllocError::OutOfMemory { size, alignment });
    }

    let aligned = self.state.region().ptr_at(self.current + adjustment);

    self.current += adjustment + size;
    self.state.record_allocation(adjustment + size);
    debug_assert_eq!(self.state.used_bytes(), self.current);

    trace!(
      "linear allocate: {} bytes at {:?} (adjustment {}, used {})",
      size,
      aligned,
      adjustment,
      self.state.used_bytes()
    );

    Ok(aligned)
  }

  /// Does nothing: individual blocks are only released by `rewind` or `clear`.
  unsafe fn free(
    &mut self,
    _address: NonNull<u8>,
  ) {
  }

  fn state(&self) -> &AllocatorState<'_> {
    &self.state
  }
}

impl Drop for LinearAllocator<'_> {
  fn drop(&mut self) {
    self.clear();
    debug_assert!(self.state.is_idle());
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::align::DEFAULT_ALIGNMENT;

  #[repr(C, align(64))]
  struct Aligned([u8; 1024]);

  fn buffer() -> Box<Aligned> {
    Box::new(Aligned([0; 1024]))
  }

  #[test]
  fn test_alloc() {
    let mut backing = buffer();
    let mut allocator = LinearAllocator::new(Region::new(&mut backing.0));
    let start = allocator.start().as_ptr() as usize;

    let first = allocator.allocate(3, 1).unwrap();
    assert_eq!(first.as_ptr() as usize, start);

    let second = allocator.allocate(8, 8).unwrap();
    assert_eq!(second.as_ptr() as usize, start + 8);

    assert_eq!(allocator.used(), 16);
    assert_eq!(allocator.num_allocations(), 2);

    unsafe {
      first.as_ptr().write_bytes(0xAB, 3);
      second.cast::<u64>().write(0x1122334455667788);
      assert_eq!(second.cast::<u64>().read(), 0x1122334455667788);
      assert_eq!(first.as_ptr().read(), 0xAB);
    }
  }

  #[test]
  fn test_alignment_and_no_overlap() {
    let mut backing = buffer();
    let mut allocator = LinearAllocator::new(Region::new(&mut backing.0));

    let mut blocks = Vec::new();
    for (size, alignment) in [(1, 1), (7, 4), (13, 16), (2, 64), (30, 8), (5, 2)] {
      let ptr = allocator.allocate(size, alignment).unwrap();
      assert_eq!(ptr.as_ptr() as usize % alignment, 0);
      blocks.push((ptr.as_ptr() as usize, size));
    }

    for pair in blocks.windows(2) {
      let (a, a_size) = pair[0];
      let (b, _) = pair[1];
      assert!(a + a_size <= b);
    }

    let end = blocks.last().map(|(addr, size)| addr + size).unwrap();
    assert_eq!(allocator.used(), end - allocator.start().as_ptr() as usize);
  }

  #[test]
  fn test_out_of_memory() {
    let mut backing = buffer();
    let mut allocator = LinearAllocator::new(Region::new(&mut backing.0));

    allocator.allocate(1000, 8).unwrap();
    let used = allocator.used();

    assert_eq!(
      allocator.allocate(32, 8),
      Err(AllocError::OutOfMemory { size: 32, alignment: 8 })
    );
    // A failed request leaves the cursor where it was.
    assert_eq!(allocator.used(), used);
    assert_eq!(allocator.num_allocations(), 1);

    // The remaining 24 bytes are still usable.
    allocator.allocate(24, 8).unwrap();
    assert_eq!(allocator.used(), 1024);
    assert_eq!(allocator.remaining(), 0);
  }

  #[test]
  fn test_overflowing_request_is_out_of_memory() {
    let mut backing = buffer();
    let mut allocator = LinearAllocator::new(Region::new(&mut backing.0));
    allocator.allocate(1, 1).unwrap();

    assert!(allocator.allocate(usize::MAX, 8).is_err());
  }

  #[test]
  fn test_rewind_restores_used_bytes() {
    let mut backing = buffer();
    let mut allocator = LinearAllocator::new(Region::new(&mut backing.0));

    allocator.allocate_default(100).unwrap();
    let used_after_first = allocator.used();
    let mark = allocator.current();

    allocator.allocate_default(50).unwrap();
    assert!(allocator.used() > used_after_first);

    allocator.rewind(mark);
    assert_eq!(allocator.used(), used_after_first);
    assert_eq!(allocator.current(), mark);
    // The count is not rolled back by a rewind.
    assert_eq!(allocator.num_allocations(), 2);

    // The next allocation reuses the rewound space.
    let again = allocator.allocate_default(50).unwrap();
    assert_eq!(
      again.as_ptr() as usize,
      allocator.start().as_ptr() as usize + crate::align_up!(100, DEFAULT_ALIGNMENT)
    );
  }

  #[test]
  #[should_panic(expected = "cannot rewind forward")]
  fn test_rewind_forward_panics() {
    let mut backing = buffer();
    let mut allocator = LinearAllocator::new(Region::new(&mut backing.0));

    allocator.allocate_default(64).unwrap();
    let mark = allocator.current();
    allocator.clear();
    allocator.rewind(mark);
  }

  #[test]
  fn test_clear_resets_to_start() {
    let mut backing = buffer();
    let mut allocator = LinearAllocator::new(Region::new(&mut backing.0));
    let start = allocator.start();

    for size in [10, 20, 30, 40] {
      allocator.allocate(size, 4).unwrap();
    }

    allocator.clear();
    assert_eq!(allocator.used(), 0);
    assert_eq!(allocator.num_allocations(), 0);
    assert_eq!(allocator.current_ptr(), start);

    let first = allocator.allocate(16, 16).unwrap();
    assert_eq!(first, start);
  }

  #[test]
  fn test_free_is_a_no_op() {
    let mut backing = buffer();
    let mut allocator = LinearAllocator::new(Region::new(&mut backing.0));

    let ptr = allocator.allocate(32, 8).unwrap();
    unsafe { allocator.free(ptr) };

    assert_eq!(allocator.used(), 32);
    assert_eq!(allocator.num_allocations(), 1);
  }

  #[test]
  fn test_scoped_rewinds() {
    let mut backing = buffer();
    let mut allocator = LinearAllocator::new(Region::new(&mut backing.0));

    allocator.allocate(64, 8).unwrap();
    let before = allocator.current();

    let inner_used = allocator.scoped(|scope| {
      scope.allocate(128, 8).unwrap();
      scope.allocate(256, 16).unwrap();
      scope.used()
    });

    assert!(inner_used > 64);
    assert_eq!(allocator.current(), before);
    assert_eq!(allocator.used(), 64);
  }

  #[test]
  fn test_through_trait_object() {
    let mut backing = buffer();
    let mut linear = LinearAllocator::new(Region::new(&mut backing.0));
    let allocator: &mut dyn Allocator = &mut linear;

    let ptr = allocator
      .allocate_layout(std::alloc::Layout::new::<u128>())
      .unwrap();
    assert_eq!(ptr.as_ptr() as usize % std::mem::align_of::<u128>(), 0);
    assert_eq!(allocator.size(), 1024);
  }
}
