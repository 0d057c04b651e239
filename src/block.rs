use std::{mem, ptr::NonNull};

/// Sentinel stored in [`FreeBlock::next`] for the last block of the list.
pub const NO_BLOCK: usize = usize::MAX;

/// Node of the free list, written at the first byte of a free range.
///
/// `next` is a byte offset from the region start rather than an address, so
/// the list stays meaningful however the host moves the region around.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeBlock {
  /// Bytes of free space from this node onwards, the node itself included.
  pub size: usize,
  /// Offset of the next free block, or [`NO_BLOCK`].
  pub next: usize,
}

/// Record written right before every address the free-list allocator returns.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationHeader {
  /// Bytes reserved for the allocation: padding, header and user data.
  pub size: usize,
  /// Distance from the start of the reserved range to the returned address.
  pub adjustment: usize,
}

pub const FREE_BLOCK_SIZE: usize = mem::size_of::<FreeBlock>();
pub const HEADER_SIZE: usize = mem::size_of::<AllocationHeader>();

// A freed range is always at least a header long, so it can always host a node.
const _: () = assert!(FREE_BLOCK_SIZE <= HEADER_SIZE);

impl FreeBlock {
  pub fn new(
    size: usize,
    next: usize,
  ) -> Self {
    Self { size, next }
  }

  /// # Safety
  ///
  /// `at` must be valid for reads of [`FREE_BLOCK_SIZE`] bytes holding a node.
  #[inline]
  pub unsafe fn read(at: NonNull<u8>) -> Self {
    unsafe { at.cast::<Self>().read_unaligned() }
  }

  /// # Safety
  ///
  /// `at` must be valid for writes of [`FREE_BLOCK_SIZE`] bytes.
  #[inline]
  pub unsafe fn write(
    self,
    at: NonNull<u8>,
  ) {
    unsafe { at.cast::<Self>().write_unaligned(self) }
  }
}

impl AllocationHeader {
  pub fn new(
    size: usize,
    adjustment: usize,
  ) -> Self {
    Self { size, adjustment }
  }

  /// Reads the header that precedes `address`.
  ///
  /// # Safety
  ///
  /// `address` must have been returned by the free-list allocator, so a
  /// header sits in the [`HEADER_SIZE`] bytes before it.
  #[inline]
  pub unsafe fn read_before(address: NonNull<u8>) -> Self {
    unsafe { address.sub(HEADER_SIZE).cast::<Self>().read_unaligned() }
  }

  /// Writes this header into the [`HEADER_SIZE`] bytes before `address`.
  ///
  /// # Safety
  ///
  /// Those bytes must be valid for writes.
  #[inline]
  pub unsafe fn write_before(
    self,
    address: NonNull<u8>,
  ) {
    unsafe { address.sub(HEADER_SIZE).cast::<Self>().write_unaligned(self) }
  }
}
