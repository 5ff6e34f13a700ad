use std::io::Read;

use libc::sbrk;
use log::info;
use rallocator::Allocator;

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change the program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
/// The program break is the upper boundary of the heap managed via brk/sbrk.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn main() {
  env_logger::init();

  // Run with RUST_LOG=debug to see placement decisions (heap preallocation,
  // best-fit hits, heap extension, mmap promotion) as they happen.
  let mut allocator = Allocator::new();

  print_program_break("start");
  block_until_enter_pressed();

  // ----------------------------------------------------------------------
  // 1) Allocate 100 bytes. This triggers the lazy 128 KiB heap
  //    preallocation, then carves an ALLOC block out of the front of it.
  // ----------------------------------------------------------------------
  let first = allocator.malloc(100);
  println!("\n[1] malloc(100) -> {:?}", first);
  assert!(!first.is_null());

  unsafe {
    (first as *mut u32).write(0xDEADBEEF);
    println!("[1] value written = 0x{:X}", (first as *mut u32).read());
  }
  block_until_enter_pressed();

  // ----------------------------------------------------------------------
  // 2) Allocate two more blocks, so freeing the middle one later has
  //    something to coalesce with in both directions.
  // ----------------------------------------------------------------------
  let second = allocator.malloc(200);
  let third = allocator.malloc(100);
  println!("\n[2] malloc(200) -> {:?}", second);
  println!("[2] malloc(100) -> {:?}", third);
  block_until_enter_pressed();

  // ----------------------------------------------------------------------
  // 3) Free the first and third blocks, then request something that fits
  //    in the first block's slot but not the third's larger neighbor.
  //    Best-fit (earliest-on-ties) should reuse the first block exactly.
  // ----------------------------------------------------------------------
  allocator.free(first);
  allocator.free(third);
  info!("freed first and third blocks, heap now has two FREE holes");

  let reused = allocator.malloc(90);
  println!(
    "\n[3] malloc(90) -> {:?} (reused first block? {})",
    reused,
    reused == first
  );
  block_until_enter_pressed();

  // ----------------------------------------------------------------------
  // 4) Free the second block too. Since it sits between two FREE blocks
  //    once `reused` is freed, coalescing merges all three into one hole.
  // ----------------------------------------------------------------------
  allocator.free(second);
  allocator.free(reused);
  info!("coalesced the whole allocated region back into one FREE block");
  block_until_enter_pressed();

  // ----------------------------------------------------------------------
  // 5) Allocate something large enough to cross the mmap threshold. This
  //    block lives in the mapped region, not the heap.
  // ----------------------------------------------------------------------
  print_program_break("before large alloc");
  let big = allocator.calloc(1, 256 * 1024);
  println!("\n[5] calloc(1, 256 KiB) -> {:?} (zero-filled, mapped)", big);
  print_program_break("after large alloc");
  block_until_enter_pressed();

  allocator.free(big);
  println!("\n[6] freed the mapped block; its mapping has been released");

  println!("\n[7] end of demo. Heap memory is retained until process exit.");
}
