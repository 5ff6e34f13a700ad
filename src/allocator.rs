//! Public allocation API: the four entry points plus the heap-realloc
//! algorithm that carries most of the conditional logic.

use std::ptr;

use crate::block::{self, payload_of, Block, Status};
use crate::config::Config;
use crate::region;

/// A best-fit, threshold-routed allocator over a program-break heap and an
/// anonymous-mapping region, replacing the platform's `malloc` family for a
/// single-threaded process.
///
/// Not `Send`/`Sync`: there is no internal synchronization, and mixing two
/// `Allocator` instances in the same process is unsafe since both would
/// fight over the one program break.
pub struct Allocator {
  pub(crate) config: Config,
  pub(crate) heap_start: *mut Block,
  pub(crate) mmap_start: *mut Block,
  pub(crate) threshold: usize,
}

impl Default for Allocator {
  fn default() -> Self {
    Self::new()
  }
}

impl Allocator {
  /// Creates an allocator using the spec's default constants (128 KiB
  /// initial heap, 128 KiB mmap threshold). The heap itself is not
  /// preallocated yet; that happens lazily on first heap-backed request.
  pub fn new() -> Self {
    Self::with_config(Config::default())
  }

  /// Creates an allocator with overridden tunables. Primarily useful for
  /// tests that want to exercise heap extension or the mmap threshold
  /// boundary without growing the real process break by 128 KiB per case.
  pub fn with_config(config: Config) -> Self {
    Self {
      threshold: config.mmap_threshold,
      config,
      heap_start: ptr::null_mut(),
      mmap_start: ptr::null_mut(),
    }
  }

  /// Allocates `size` bytes, routed to the heap or to an anonymous mapping
  /// by comparing the aligned total size against the current threshold.
  /// Returns null for `size == 0` (the unsigned equivalent of the spec's
  /// `size ≤ 0` rejection).
  pub fn malloc(&mut self, size: usize) -> *mut u8 {
    if size == 0 {
      return ptr::null_mut();
    }

    let aligned = crate::align!(size);
    let required_total = block::total(aligned);

    if required_total < self.threshold {
      self.malloc_sbrk(aligned)
    } else {
      self.malloc_mmap(aligned)
    }
  }

  /// Heap allocation path (spec §4.3): preallocate on first use, try
  /// best-fit, split on an oversized hit, otherwise extend the heap.
  pub(crate) fn malloc_sbrk(&mut self, size: usize) -> *mut u8 {
    if self.heap_start.is_null() {
      self.preallocate_heap();
    }

    let required_total = block::total(size);
    let (best, last) = self.find_best_fit(required_total);

    let block = if !best.is_null() {
      unsafe {
        (*best).status = Status::Alloc;
        if (*best).size > required_total {
          self.split_block(best, required_total);
        }
      }
      best
    } else {
      let block = unsafe { self.request_space(last, required_total) };
      unsafe { (*block).status = Status::Alloc };
      block
    };

    unsafe { payload_of(block) }
  }

  fn malloc_mmap(&mut self, size: usize) -> *mut u8 {
    let block = self.map_block(size);
    unsafe { payload_of(block) }
  }

  /// Frees a payload pointer previously returned by `malloc`/`calloc`/
  /// `realloc`. Null is a no-op.
  pub fn free(&mut self, ptr: *mut u8) {
    if ptr.is_null() {
      return;
    }

    let block = unsafe { block::block_of(ptr) };
    match unsafe { (*block).status } {
      Status::Mapped => self.unmap_block(block),
      Status::Free | Status::Alloc => self.heap_free(block),
    }
  }

  /// Marks a heap block FREE and coalesces it forward, after verifying it
  /// is actually reachable from `heap_start` (defensive against a
  /// double-free or a foreign pointer, which is silently ignored per spec).
  fn heap_free(&mut self, block: *mut Block) {
    if !self.is_heap_member(block) {
      return;
    }
    unsafe {
      (*block).status = Status::Free;
      self.coalesce_forward(block);
    }
  }

  fn is_heap_member(&self, block: *mut Block) -> bool {
    let mut current = self.heap_start;
    while !current.is_null() {
      if current == block {
        return true;
      }
      current = unsafe { (*current).next };
    }
    false
  }

  /// Allocates `nmemb * size` zeroed bytes. Temporarily lowers the region
  /// threshold to the OS page size so requests spanning at least one page
  /// favor a fresh (hence already-zero) mapping, while still explicitly
  /// zero-filling the payload. The spec does not let the implementation
  /// rely on the mapping's zero-fill guarantee alone.
  pub fn calloc(&mut self, nmemb: usize, size: usize) -> *mut u8 {
    let total_bytes = nmemb.wrapping_mul(size);
    let page = region::page_size();
    let mut guard = ThresholdGuard::acquire(self, page);

    let ptr = guard.alloc.malloc(total_bytes);
    if !ptr.is_null() {
      unsafe { ptr::write_bytes(ptr, 0, total_bytes) };
    }
    ptr
  }

  /// Resizes a previous allocation. `ptr == null` behaves as `malloc`;
  /// `size == 0` behaves as `free` and returns null; a pointer into a FREE
  /// block returns null without mutating anything (non-standard, but
  /// matches the source this spec was distilled from (see DESIGN.md).
  pub fn realloc(&mut self, ptr: *mut u8, size: usize) -> *mut u8 {
    if ptr.is_null() {
      return self.malloc(size);
    }
    if size == 0 {
      self.free(ptr);
      return ptr::null_mut();
    }

    let aligned = crate::align!(size);
    let block = unsafe { block::block_of(ptr) };

    match unsafe { (*block).status } {
      Status::Free => ptr::null_mut(),
      Status::Mapped => self.realloc_mapped(block, ptr, aligned),
      Status::Alloc => self.realloc_heap(block, ptr, aligned),
    }
  }

  fn realloc_mapped(&mut self, block: *mut Block, ptr: *mut u8, size: usize) -> *mut u8 {
    let old_size = unsafe { (*block).size };
    let new_ptr = self.malloc(size);
    unsafe { ptr::copy_nonoverlapping(ptr, new_ptr, old_size.min(size)) };
    self.unmap_block(block);
    new_ptr
  }

  /// The central heap-realloc algorithm (spec §4.6): promote to a mapped
  /// block if the new size crosses the threshold, otherwise attempt an
  /// in-place grow via forward coalescing, falling back to relocation (or,
  /// for the last block specifically, to in-place heap extension).
  fn realloc_heap(&mut self, block: *mut Block, ptr: *mut u8, size: usize) -> *mut u8 {
    if !self.is_heap_member(block) {
      return ptr::null_mut();
    }

    let old_size = unsafe { (*block).size };
    let required_total = block::total(size);

    if required_total >= self.threshold {
      let mapped_block = self.map_block(size);
      let new_ptr = unsafe { payload_of(mapped_block) };
      unsafe { ptr::copy_nonoverlapping(ptr, new_ptr, old_size.min(size)) };
      self.heap_free(block);
      return new_ptr;
    }

    unsafe {
      (*block).status = Status::Free;
      while block::total((*block).size) < required_total {
        let next = (*block).next;
        if next.is_null() || (*next).status != Status::Free {
          break;
        }
        (*block).size += block::total((*next).size);
        (*block).next = (*next).next;
      }
      (*block).status = Status::Alloc;

      if block::total((*block).size) >= required_total {
        if (*block).size > required_total {
          self.split_block(block, required_total);
        }
        return ptr;
      }
    }

    let has_successor = unsafe { !(*block).next.is_null() };

    if has_successor {
      unsafe {
        if (*block).size != old_size {
          let old_total = block::total(old_size);
          if (*block).size > old_total {
            self.split_block(block, old_total);
          }
        }
      }

      let size_now = unsafe { (*block).size };
      let new_ptr = self.malloc_sbrk(size);
      unsafe { ptr::copy_nonoverlapping(ptr, new_ptr, size_now.min(size)) };
      self.heap_free(block);
      return new_ptr;
    }

    // Last block, grow failed: search for an interior hole before paying
    // for heap extension.
    unsafe { (*block).status = Status::Free };
    let (candidate, last) = self.find_best_fit(required_total);

    if candidate.is_null() {
      let grown = unsafe { self.request_space(last, required_total) };
      unsafe { (*grown).status = Status::Alloc };
      // `request_space` expands the free tail in place when it is the
      // block it was handed, so `grown == block` and `ptr` is still valid.
      ptr
    } else {
      unsafe { (*candidate).status = Status::Alloc };
      let candidate_ptr = unsafe { payload_of(candidate) };
      unsafe { ptr::copy_nonoverlapping(ptr, candidate_ptr, old_size) };
      self.heap_free(block);
      candidate_ptr
    }
  }
}

/// Scoped override of the region threshold, restored on drop so every exit
/// path from [`Allocator::calloc`] (including an early return) restores
/// the configured threshold, matching the spec's guidance to use a scoped
/// acquisition rather than manual cleanup at each return site.
struct ThresholdGuard<'a> {
  alloc: &'a mut Allocator,
  previous: usize,
}

impl<'a> ThresholdGuard<'a> {
  fn acquire(alloc: &'a mut Allocator, temporary: usize) -> Self {
    let previous = alloc.threshold;
    alloc.threshold = temporary;
    Self { alloc, previous }
  }
}

impl Drop for ThresholdGuard<'_> {
  fn drop(&mut self) {
    self.alloc.threshold = self.previous;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Config;

  fn small_alloc() -> Allocator {
    Allocator::with_config(Config {
      initial_heap: 4096,
      mmap_threshold: 4096,
    })
  }

  fn is_aligned(ptr: *mut u8) -> bool {
    (ptr as usize) % crate::ALIGNMENT == 0
  }

  #[test]
  fn malloc_zero_returns_null() {
    let mut alloc = small_alloc();
    assert!(alloc.malloc(0).is_null());
  }

  #[test]
  fn malloc_one_is_aligned_with_payload_size_eight() {
    let mut alloc = small_alloc();
    let ptr = alloc.malloc(1);
    assert!(!ptr.is_null());
    assert!(is_aligned(ptr));
    unsafe {
      let block = block::block_of(ptr);
      assert_eq!((*block).size, 8);
    }
  }

  #[test]
  fn preallocation_and_first_allocation_shapes_the_heap() {
    let mut alloc = small_alloc();
    let ptr = alloc.malloc(100);
    assert!(!ptr.is_null());

    unsafe {
      let head = alloc.heap_start;
      assert_eq!(head as *mut u8, block::block_of(ptr) as *mut u8);
      assert_eq!((*head).size, 104);
      assert_eq!((*head).status, Status::Alloc);

      let tail = (*head).next;
      assert!(!tail.is_null());
      assert_eq!((*tail).status, Status::Free);
      assert_eq!((*tail).size, 4096 - block::meta() - 128);
      assert!((*tail).next.is_null());
    }
  }

  #[test]
  fn free_then_malloc_reuses_earliest_best_fit_slot() {
    let mut alloc = small_alloc();
    let a = alloc.malloc(100);
    let b = alloc.malloc(200);
    let c = alloc.malloc(100);

    alloc.free(a);
    alloc.free(c);

    let reused = alloc.malloc(90);
    assert_eq!(reused, a);
    let _ = b;
  }

  #[test]
  fn freeing_middle_blocks_coalesces_them() {
    let mut alloc = small_alloc();
    let a = alloc.malloc(100);
    let b = alloc.malloc(100);
    let c = alloc.malloc(100);

    alloc.free(b);
    alloc.free(a);

    unsafe {
      let head = alloc.heap_start;
      assert_eq!((*head).status, Status::Free);
      assert_eq!((*head).size, 104 + block::meta() + 104);
      assert_eq!((*head).next, block::block_of(c));
    }
  }

  #[test]
  fn realloc_null_behaves_as_malloc() {
    let mut alloc = small_alloc();
    let ptr = alloc.realloc(ptr::null_mut(), 64);
    assert!(!ptr.is_null());
  }

  #[test]
  fn realloc_zero_frees_and_returns_null() {
    let mut alloc = small_alloc();
    let ptr = alloc.malloc(64);
    let result = alloc.realloc(ptr, 0);
    assert!(result.is_null());

    unsafe {
      let block = block::block_of(ptr);
      assert_eq!((*block).status, Status::Free);
    }
  }

  #[test]
  fn realloc_grows_in_place_into_a_freed_neighbor() {
    let mut alloc = small_alloc();
    let a = alloc.malloc(100);
    let b = alloc.malloc(100);
    alloc.free(b);

    let grown = alloc.realloc(a, 150);
    assert_eq!(grown, a);

    unsafe {
      let block = block::block_of(grown);
      assert!((*block).size >= 152);
      assert_eq!((*block).status, Status::Alloc);
    }
  }

  #[test]
  fn realloc_on_free_block_returns_null() {
    let mut alloc = small_alloc();
    let ptr = alloc.malloc(64);
    alloc.free(ptr);
    assert!(alloc.realloc(ptr, 128).is_null());
  }

  #[test]
  fn realloc_same_size_preserves_bytes_and_size() {
    let mut alloc = small_alloc();
    let ptr = alloc.malloc(64);
    unsafe {
      ptr::write_bytes(ptr, 0xAB, 64);
    }

    let same = alloc.realloc(ptr, 64);
    assert!(!same.is_null());
    unsafe {
      let block = block::block_of(same);
      assert_eq!((*block).size, 64);
      for i in 0..64 {
        assert_eq!(*same.add(i), 0xAB);
      }
    }
  }

  #[test]
  fn calloc_zero_fills_payload() {
    let mut alloc = small_alloc();
    let ptr = alloc.calloc(16, 4);
    assert!(!ptr.is_null());
    unsafe {
      for i in 0..64 {
        assert_eq!(*ptr.add(i), 0);
      }
    }
  }

  #[test]
  fn calloc_restores_threshold_after_the_call() {
    let mut alloc = small_alloc();
    let before = alloc.threshold;
    let _ = alloc.calloc(8, 8);
    assert_eq!(alloc.threshold, before);
  }

  #[test]
  fn large_malloc_crosses_threshold_into_mapped_region() {
    let mut alloc = small_alloc();
    let ptr = alloc.malloc(8192);
    assert!(!ptr.is_null());
    unsafe {
      let block = block::block_of(ptr);
      assert_eq!((*block).status, Status::Mapped);
    }
    alloc.free(ptr);
  }

  #[test]
  fn free_of_foreign_block_not_in_the_heap_list_is_ignored() {
    let mut alloc = small_alloc();
    // A validly-shaped Block that simply never got linked into heap_start,
    // distinct from truly corrupt input, which the spec leaves undefined.
    let mut foreign = Block::new(64, Status::Alloc, ptr::null_mut());
    let foreign_block = &mut foreign as *mut Block;
    let foreign_ptr = unsafe { payload_of(foreign_block) };

    alloc.free(foreign_ptr);
    assert_eq!(foreign.status, Status::Alloc);

    let ptr = alloc.malloc(16);
    assert!(!ptr.is_null());
  }

  #[test]
  fn realloc_extends_heap_in_place_when_block_is_the_last_free_tail() {
    // A small initial heap and a large threshold so the realloc below is
    // forced down the "last block, grow failed" path (spec §4.6 case 5)
    // instead of promoting to a mapped block.
    let mut alloc = Allocator::with_config(Config {
      initial_heap: 256,
      mmap_threshold: 1_000_000,
    });

    // Consume the preallocated heap exactly, so `a` is the sole block and
    // has no FREE successor to coalesce with.
    let first_size = 256 - block::meta();
    let a = alloc.malloc(first_size);
    assert!(!a.is_null());
    unsafe {
      let block = block::block_of(a);
      assert!((*block).next.is_null());
    }

    let new_size = first_size + 512;
    let break_before = unsafe { libc::sbrk(0) };
    let grown = alloc.realloc(a, new_size);
    let break_after = unsafe { libc::sbrk(0) };

    assert_eq!(grown, a);
    assert!(break_after as usize > break_before as usize);
    unsafe {
      let block = block::block_of(grown);
      assert_eq!((*block).status, Status::Alloc);
      assert_eq!((*block).size, new_size);
      assert!((*block).next.is_null());
    }
  }

  #[test]
  fn realloc_promotes_heap_block_to_mapped_region() {
    let mut alloc = small_alloc();
    let a = alloc.malloc(100);
    assert!(!a.is_null());
    let old_block = unsafe { block::block_of(a) };

    let big = alloc.realloc(a, 200_000);
    assert!(!big.is_null());
    unsafe {
      let block = block::block_of(big);
      assert_eq!((*block).status, Status::Mapped);
      assert_eq!((*block).size, block::total(crate::align!(200_000)) - block::meta());
    }

    // The old heap slot was freed and coalesced with the tail it was split
    // from, leaving a single FREE block spanning the whole preallocated heap.
    unsafe {
      assert_eq!((*old_block).status, Status::Free);
      assert!((*old_block).next.is_null());
      assert_eq!((*old_block).size, 4096 - block::meta());
    }

    alloc.free(big);
  }

  #[test]
  fn realloc_on_mapped_block_grows_then_shrinks_back_under_threshold() {
    let mut alloc = small_alloc();

    let big = alloc.malloc(8192);
    assert!(!big.is_null());
    unsafe {
      assert_eq!((*block::block_of(big)).status, Status::Mapped);
      (big as *mut u32).write(0xDEADBEEF);
    }

    // Grow while staying above the threshold: still mapped.
    let grown = alloc.realloc(big, 16384);
    assert!(!grown.is_null());
    unsafe {
      assert_eq!((*block::block_of(grown)).status, Status::Mapped);
      assert_eq!((grown as *mut u32).read(), 0xDEADBEEF);
    }

    // Shrink back under the threshold. `realloc_mapped` always allocates
    // fresh via `malloc`, so a small-enough request demotes back to the heap.
    let shrunk = alloc.realloc(grown, 64);
    assert!(!shrunk.is_null());
    unsafe {
      assert_eq!((*block::block_of(shrunk)).status, Status::Alloc);
      assert_eq!((shrunk as *mut u32).read(), 0xDEADBEEF);
    }

    alloc.free(shrunk);
  }
}
