use std::{marker::PhantomData, ptr::NonNull};

/// A contiguous byte range `[start, start + len)` handed to an allocator.
///
/// The region only describes memory owned by someone else: it never allocates
/// or frees the bytes it points at. Borrowing a slice ties the allocator to the
/// slice's lifetime; [`Region::from_raw_parts`] leaves that to the caller.
#[derive(Debug)]
pub struct Region<'a> {
  start: NonNull<u8>,
  len: usize,
  _marker: PhantomData<&'a mut [u8]>,
}

impl<'a> Region<'a> {
  /// Borrows `buffer` as the backing memory of an allocator.
  ///
  /// # Panics
  ///
  /// Panics if `buffer` is empty.
  pub fn new(buffer: &'a mut [u8]) -> Self {
    assert!(!buffer.is_empty(), "region must not be empty");
    let len = buffer.len();

    Self {
      start: NonNull::from(buffer).cast(),
      len,
      _marker: PhantomData,
    }
  }

  /// Builds a region from a raw start address and length.
  ///
  /// # Safety
  ///
  /// `start` must be valid for reads and writes of `len` bytes for as long as
  /// the region (and any allocator built on it) is alive, and nothing else may
  /// access those bytes except through pointers the allocator hands out.
  ///
  /// # Panics
  ///
  /// Panics if `len` is zero or the range wraps around the address space.
  pub unsafe fn from_raw_parts(
    start: NonNull<u8>,
    len: usize,
  ) -> Self {
    assert!(len > 0, "region must not be empty");
    assert!(
      (start.as_ptr() as usize).checked_add(len).is_some(),
      "region wraps around the address space"
    );

    Self {
      start,
      len,
      _marker: PhantomData,
    }
  }

  #[inline]
  pub fn start(&self) -> NonNull<u8> {
    self.start
  }

  #[inline]
  pub fn start_address(&self) -> usize {
    self.start.as_ptr() as usize
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.len
  }

  /// Regions are never empty; provided for API symmetry with slices.
  #[inline]
  pub fn is_empty(&self) -> bool {
    false
  }

  /// One past the last byte of the region.
  #[inline]
  pub fn end_address(&self) -> usize {
    self.start_address() + self.len
  }

  /// Whether `address` falls inside `[start, end)`.
  #[inline]
  pub fn contains(
    &self,
    address: usize,
  ) -> bool {
    address >= self.start_address() && address < self.end_address()
  }

  /// Byte offset of `address` from the start of the region.
  ///
  /// # Panics
  ///
  /// Panics if `address` lies outside `[start, end]`.
  #[inline]
  pub fn offset_of(
    &self,
    address: usize,
  ) -> usize {
    assert!(
      address >= self.start_address() && address <= self.end_address(),
      "address {:#x} is outside the region",
      address
    );
    address - self.start_address()
  }

  /// Pointer to the byte at `offset`. `offset == len` yields the end pointer.
  #[inline]
  pub fn ptr_at(
    &self,
    offset: usize,
  ) -> NonNull<u8> {
    debug_assert!(offset <= self.len);
    // SAFETY: `offset` stays within the region or one past its end.
    unsafe { self.start.add(offset) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_region_from_slice() {
    let mut buffer = [0u8; 64];
    let base = buffer.as_ptr() as usize;
    let region = Region::new(&mut buffer);

    assert_eq!(region.len(), 64);
    assert_eq!(region.start_address(), base);
    assert_eq!(region.end_address(), base + 64);
    assert!(region.contains(base));
    assert!(region.contains(base + 63));
    assert!(!region.contains(base + 64));
    assert_eq!(region.offset_of(base + 10), 10);
    assert_eq!(region.ptr_at(10).as_ptr() as usize, base + 10);
  }

  #[test]
  fn test_region_from_raw_parts() {
    let mut buffer = vec![0u8; 128];
    let start = NonNull::new(buffer.as_mut_ptr()).unwrap();
    let region = unsafe { Region::from_raw_parts(start, buffer.len()) };

    assert_eq!(region.start(), start);
    assert_eq!(region.len(), 128);
  }

  #[test]
  #[should_panic(expected = "region must not be empty")]
  fn test_empty_region_panics() {
    let mut buffer: [u8; 0] = [];
    let _ = Region::new(&mut buffer);
  }

  #[test]
  #[should_panic(expected = "outside the region")]
  fn test_offset_outside_region_panics() {
    let mut buffer = [0u8; 16];
    let region = Region::new(&mut buffer);
    let _ = region.offset_of(region.end_address() + 1);
  }
}
