use std::{io::Read, ptr::NonNull};

use carve::{Allocator, FreeListAllocator, LinearAllocator, PageRegion};

/// Waits until the user presses ENTER when the demo runs with `--step`.
/// Handy for watching the mapping with `pmap` or `gdb` between phases.
fn pause(step: bool) {
  if step {
    println!("\n>>> Press ENTER to continue...");
    let _ = std::io::stdin().bytes().next();
  }
}

fn print_alloc(
  label: &str,
  allocator: &dyn Allocator,
  size: usize,
  address: NonNull<u8>,
) {
  println!(
    "[{}] {} bytes at {:?} (offset {}), used = {}/{}, allocations = {}",
    label,
    size,
    address,
    address.as_ptr() as usize - allocator.start().as_ptr() as usize,
    allocator.used(),
    allocator.size(),
    allocator.num_allocations(),
  );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  simple_logger::init_with_env()?;
  let step = std::env::args().any(|arg| arg == "--step");

  let mut pages = PageRegion::map(1024)?;
  println!("Mapped {} bytes", pages.len());

  // --------------------------------------------------------------------
  // 1) Linear: bump, mark, rewind, clear.
  // --------------------------------------------------------------------
  {
    let mut linear = LinearAllocator::new(pages.region());

    let first = linear.allocate_default(100)?;
    print_alloc("linear 1", &linear, 100, first);

    let mark = linear.current();
    println!("[linear] mark at offset {}", mark.offset());

    let second = linear.allocate_default(50)?;
    print_alloc("linear 2", &linear, 50, second);

    linear.rewind(mark);
    println!("[linear] rewound, used = {}", linear.used());

    linear.clear();
    println!("[linear] cleared, used = {}", linear.used());
  }

  pause(step);

  // --------------------------------------------------------------------
  // 2) Free list: allocate, hit out-of-memory, free and reuse.
  // --------------------------------------------------------------------
  let mut free_list = FreeListAllocator::new(pages.region());

  let first = free_list.allocate(100, 8)?;
  print_alloc("free list 1", &free_list, 100, first);

  let value = first.cast::<u64>();
  unsafe { value.write(0xDEADBEEF) };
  println!("[free list 1] value written = 0x{:X}", unsafe { value.read() });

  match free_list.allocate(free_list.size() + 1, 8) {
    Ok(_) => println!("[free list 2] unexpectedly fit"),
    Err(error) => println!("[free list 2] {}", error),
  }

  let second = free_list.allocate(32, 64)?;
  print_alloc("free list 3", &free_list, 32, second);

  pause(step);

  unsafe { free_list.free(first) };
  println!(
    "[free list] freed first block, free blocks = {:?}",
    free_list.free_blocks().collect::<Vec<_>>()
  );

  let reused = free_list.allocate(100, 8)?;
  print_alloc("free list 4", &free_list, 100, reused);
  println!(
    "[free list 4] reused the freed block? {}",
    if reused == first { "Yes" } else { "No" }
  );

  unsafe {
    free_list.free(second);
    free_list.free(reused);
  }
  println!(
    "[free list] all freed, free blocks = {:?}",
    free_list.free_blocks().collect::<Vec<_>>()
  );

  Ok(())
}
