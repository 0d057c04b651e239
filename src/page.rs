use std::{io, ptr::NonNull};

use libc::{
  _SC_PAGESIZE, MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, c_void, mmap, munmap,
  sysconf,
};
use log::trace;

use crate::{align_up, region::Region};

/// Anonymous private pages obtained straight from the OS.
///
/// A ready-made backing store for hosts that have no buffer of their own:
///
/// ```rust,ignore
/// use carve::{Allocator, FreeListAllocator, PageRegion};
///
/// let mut pages = PageRegion::map(64 * 1024)?;
/// let mut allocator = FreeListAllocator::new(pages.region());
/// let ptr = allocator.allocate(256, 16)?;
/// unsafe { allocator.free(ptr) };
/// ```
///
/// The mapping is released with `munmap` on drop, so every allocator built on
/// [`region`](PageRegion::region) must be gone by then; the borrow enforces it.
pub struct PageRegion {
  start: NonNull<u8>,
  len: usize,
}

/// Size of a memory page as reported by `sysconf(_SC_PAGESIZE)`.
pub fn page_size() -> usize {
  let size = unsafe { sysconf(_SC_PAGESIZE) };
  if size <= 0 { 4096 } else { size as usize }
}

impl PageRegion {
  /// Maps at least `len` bytes, rounded up to whole pages.
  ///
  /// # Panics
  ///
  /// Panics if `len` is zero.
  pub fn map(len: usize) -> io::Result<Self> {
    assert!(len > 0, "cannot map an empty region");
    let len = align_up!(len, page_size());

    let address = unsafe {
      mmap(
        std::ptr::null_mut(),
        len,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if address == MAP_FAILED {
      return Err(io::Error::last_os_error());
    }

    let start =
      NonNull::new(address as *mut u8).ok_or_else(|| io::Error::other("mmap returned null"))?;
    trace!("mapped {} bytes at {:?}", len, start);

    Ok(Self { start, len })
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    false
  }

  /// Lends the mapping out as a [`Region`] for one allocator at a time.
  pub fn region(&mut self) -> Region<'_> {
    // SAFETY: the mapping is readable, writable and outlives the borrow of `self`.
    unsafe { Region::from_raw_parts(self.start, self.len) }
  }
}

impl Drop for PageRegion {
  fn drop(&mut self) {
    trace!("unmapping {} bytes at {:?}", self.len, self.start);
    unsafe {
      munmap(self.start.as_ptr() as *mut c_void, self.len);
    }
  }
}
