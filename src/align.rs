use std::mem;

/// Native word alignment, used when the caller does not ask for a specific one.
pub const DEFAULT_ALIGNMENT: usize = mem::size_of::<usize>();

/// Rounds `value` up to the next multiple of `align`, which must be a power of two.
///
/// # Examples
///
/// ```rust
/// use carve::align_up;
///
/// assert_eq!(align_up!(13, 8), 16);
/// assert_eq!(align_up!(16, 8), 16);
/// assert_eq!(align_up!(1, 64), 64);
/// ```
#[macro_export]
macro_rules! align_up {
  ($value:expr, $align:expr) => {
    ($value + $align - 1) & !($align - 1)
  };
}

#[inline]
pub const fn is_power_of_two(value: usize) -> bool {
  value != 0 && value & (value - 1) == 0
}

/// Bytes needed to move `address` forward to the next multiple of `alignment`.
///
/// Returns 0 when `address` is already aligned.
#[inline]
pub fn align_forward_adjustment(
  address: usize,
  alignment: usize,
) -> usize {
  debug_assert!(is_power_of_two(alignment));
  let aligned = (address.wrapping_add(alignment - 1)) & !(alignment - 1);
  aligned.wrapping_sub(address)
}

/// Like [`align_forward_adjustment`], but guarantees at least `header_size`
/// bytes between `address` and the aligned result.
///
/// ```text
///   address                       aligned
///   │                             │
///   ▼                             ▼
///   ┌──────────────┬──────────────┬──────────────────────┐
///   │   padding    │    header    │      user data       │
///   └──────────────┴──────────────┴──────────────────────┘
///   ◄──────── adjustment ────────►
/// ```
///
/// When the plain adjustment is too small to hold the header, it is pushed
/// forward by whole `alignment` steps until the header fits.
#[inline]
pub fn align_forward_adjustment_with_header(
  address: usize,
  alignment: usize,
  header_size: usize,
) -> usize {
  let mut adjustment = align_forward_adjustment(address, alignment);

  if adjustment < header_size {
    let needed = header_size - adjustment;
    adjustment += alignment * needed.div_ceil(alignment);
  }

  adjustment
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_align_up() {
    let ptr_size = mem::size_of::<usize>();

    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (ptr_size * i + 1)..=(ptr_size * (i + 1));

      let expected_alignment = ptr_size * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align_up!(size, ptr_size));
      }
    }
  }

  #[test]
  fn test_power_of_two() {
    assert!(!is_power_of_two(0));
    assert!(is_power_of_two(1));
    assert!(is_power_of_two(2));
    assert!(!is_power_of_two(3));
    assert!(is_power_of_two(4096));
    assert!(!is_power_of_two(4097));
  }

  #[test]
  fn test_forward_adjustment() {
    assert_eq!(align_forward_adjustment(0x1000, 8), 0);
    assert_eq!(align_forward_adjustment(0x1001, 8), 7);
    assert_eq!(align_forward_adjustment(0x1007, 8), 1);
    assert_eq!(align_forward_adjustment(0x1001, 1), 0);
    assert_eq!(align_forward_adjustment(0x1010, 64), 48);
  }

  #[test]
  fn test_adjustment_leaves_room_for_header() {
    // Already aligned: a whole header's worth of alignment steps is added.
    assert_eq!(align_forward_adjustment_with_header(0x1000, 8, 16), 16);
    // 7 bytes of padding is not enough, one more step of 8 gives 15, another 23.
    assert_eq!(align_forward_adjustment_with_header(0x1001, 8, 16), 23);
    // Large alignment already covers the header.
    assert_eq!(align_forward_adjustment_with_header(0x1010, 64, 16), 48);
    // Alignment of one: exactly the header.
    assert_eq!(align_forward_adjustment_with_header(0x1003, 1, 16), 16);

    for address in 0x1000..0x1100 {
      for alignment in [1, 2, 4, 8, 16, 32, 64] {
        let adjustment = align_forward_adjustment_with_header(address, alignment, 16);
        assert!(adjustment >= 16);
        assert_eq!((address + adjustment) % alignment, 0);
        assert!(adjustment < 16 + alignment);
      }
    }
  }
}
