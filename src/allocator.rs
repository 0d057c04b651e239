use std::{alloc::Layout, ptr::NonNull};

use crate::{align::DEFAULT_ALIGNMENT, error::AllocError, region::Region};

/// Region bounds plus the accounting every strategy keeps.
///
/// Strategies compose this rather than re-implementing the counters.
#[derive(Debug)]
pub struct AllocatorState<'a> {
  region: Region<'a>,
  used_bytes: usize,
  num_allocations: usize,
}

impl<'a> AllocatorState<'a> {
  pub fn new(region: Region<'a>) -> Self {
    Self {
      region,
      used_bytes: 0,
      num_allocations: 0,
    }
  }

  #[inline]
  pub fn region(&self) -> &Region<'a> {
    &self.region
  }

  #[inline]
  pub fn size(&self) -> usize {
    self.region.len()
  }

  #[inline]
  pub fn used_bytes(&self) -> usize {
    self.used_bytes
  }

  #[inline]
  pub fn num_allocations(&self) -> usize {
    self.num_allocations
  }

  /// Counts one live allocation with a footprint of `bytes`.
  pub(crate) fn record_allocation(
    &mut self,
    bytes: usize,
  ) {
    self.used_bytes += bytes;
    self.num_allocations += 1;
    debug_assert!(self.used_bytes <= self.region.len());
  }

  /// Releases one live allocation with a footprint of `bytes`.
  pub(crate) fn record_free(
    &mut self,
    bytes: usize,
  ) {
    debug_assert!(self.num_allocations > 0, "free without a live allocation");
    debug_assert!(self.used_bytes >= bytes);
    self.used_bytes -= bytes;
    self.num_allocations -= 1;
  }

  /// Overwrites the byte count without touching the allocation count.
  pub(crate) fn set_used_bytes(
    &mut self,
    bytes: usize,
  ) {
    debug_assert!(bytes <= self.region.len());
    self.used_bytes = bytes;
  }

  pub(crate) fn reset(&mut self) {
    self.used_bytes = 0;
    self.num_allocations = 0;
  }

  /// Whether every allocation has been released.
  #[inline]
  pub fn is_idle(&self) -> bool {
    self.used_bytes == 0 && self.num_allocations == 0
  }
}

/// The contract shared by every allocation strategy.
///
/// Implementors carve blocks out of a single [`Region`]. The accessors are
/// plain snapshots; nothing here is synchronized, so one owner at a time.
pub trait Allocator {
  /// Reserves at least `size` usable bytes whose address is a multiple of
  /// `alignment`.
  ///
  /// # Panics
  ///
  /// Panics if `size` is zero or `alignment` is not a power of two.
  fn allocate(
    &mut self,
    size: usize,
    alignment: usize,
  ) -> Result<NonNull<u8>, AllocError>;

  /// Releases a block returned by [`Allocator::allocate`].
  ///
  /// # Safety
  ///
  /// `address` must come from `allocate` on this same instance and must not
  /// have been freed already. The block must not be used afterwards.
  unsafe fn free(
    &mut self,
    address: NonNull<u8>,
  );

  fn state(&self) -> &AllocatorState<'_>;

  /// Allocates with the native word alignment.
  fn allocate_default(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    self.allocate(size, DEFAULT_ALIGNMENT)
  }

  /// Allocates a block that fits `layout`.
  fn allocate_layout(
    &mut self,
    layout: Layout,
  ) -> Result<NonNull<u8>, AllocError> {
    self.allocate(layout.size(), layout.align())
  }

  /// Length of the backing region in bytes.
  fn size(&self) -> usize {
    self.state().size()
  }

  /// Bytes currently held by live allocations, overhead included.
  fn used(&self) -> usize {
    self.state().used_bytes()
  }

  fn num_allocations(&self) -> usize {
    self.state().num_allocations()
  }

  fn start(&self) -> NonNull<u8> {
    self.state().region().start()
  }

  fn remaining(&self) -> usize {
    self.size() - self.used()
  }
}

/// Checks the arguments every `allocate` implementation must validate.
#[inline]
pub(crate) fn check_request(
  size: usize,
  alignment: usize,
) {
  assert!(size > 0, "zero-size allocation is not allowed");
  assert!(
    crate::align::is_power_of_two(alignment),
    "alignment {} is not a power of two",
    alignment
  );
}
