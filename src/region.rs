//! Region Manager: preallocation and growth of the heap, and creation /
//! destruction of individually-mapped blocks.
//!
//! Every function here either succeeds or reports a fatal [`AllocError`].
//! Syscall failure in this layer is not something `malloc`'s caller can
//! recover from (see the spec's "OS resource exhaustion" error class), so
//! the `Allocator` methods built on top of these always resolve the
//! `Result` via [`crate::fatal`] rather than propagating it further.

use std::io;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use libc::{c_void, intptr_t};

use crate::block::{self, Block, Status};
use crate::error::AllocError;
use crate::Allocator;

static PAGE_SIZE: AtomicUsize = AtomicUsize::new(0);

/// Byte size of a virtual memory page on this host, cached after the first
/// `sysconf` call.
pub fn page_size() -> usize {
  let cached = PAGE_SIZE.load(Ordering::Relaxed);
  if cached != 0 {
    return cached;
  }

  let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
  PAGE_SIZE.store(size, Ordering::Relaxed);
  size
}

/// Advances the program break by `delta` bytes and returns the address of
/// the region just past the old break (i.e. the start of the newly
/// acquired span), mirroring `sbrk`'s return value.
fn advance_break(delta: isize) -> Result<*mut u8, AllocError> {
  let old_break = unsafe { libc::sbrk(delta as intptr_t) };
  if old_break == usize::MAX as *mut c_void {
    return Err(AllocError::BreakAdvance {
      requested: delta,
      source: io::Error::last_os_error(),
    });
  }
  Ok(old_break as *mut u8)
}

fn map_anonymous(len: usize) -> Result<*mut u8, AllocError> {
  let addr = unsafe {
    libc::mmap(
      ptr::null_mut(),
      len,
      libc::PROT_READ | libc::PROT_WRITE,
      libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
      -1,
      0,
    )
  };
  if addr == libc::MAP_FAILED {
    return Err(AllocError::Mmap {
      requested: len,
      source: io::Error::last_os_error(),
    });
  }
  Ok(addr as *mut u8)
}

fn unmap_anonymous(addr: *mut u8, len: usize) {
  let result = unsafe { libc::munmap(addr as *mut c_void, len) };
  if result != 0 {
    log::warn!(
      "munmap({:p}, {}) failed: {}",
      addr,
      len,
      io::Error::last_os_error()
    );
  }
}

impl Allocator {
  /// Preallocates the initial heap region (`config.initial_heap` bytes) as
  /// a single FREE block and records it as `heap_start`. Called lazily on
  /// first heap-backed allocation.
  pub(crate) fn preallocate_heap(&mut self) {
    let requested = self.config.initial_heap;
    let addr = match advance_break(requested as isize) {
      Ok(addr) => addr,
      Err(e) => crate::fatal(e),
    };

    let block = addr as *mut Block;
    unsafe {
      ptr::write(block, Block::new(requested - block::meta(), Status::Free, ptr::null_mut()));
    }
    self.heap_start = block;
    log::debug!("preallocated heap: {} bytes at {:p}", requested, block);
  }

  /// Grows the heap to accommodate `required_total` bytes, reusing the
  /// tail block in place if it is FREE, or appending a fresh block
  /// otherwise. See spec §4.2 for the two cases.
  ///
  /// # Safety
  /// `last` must be null or point to the current tail of the heap list.
  pub(crate) unsafe fn request_space(&mut self, last: *mut Block, required_total: usize) -> *mut Block {
    unsafe {
      if !last.is_null() && (*last).status == Status::Free {
        let current_total = block::total((*last).size);
        let delta = required_total - current_total;
        if let Err(e) = advance_break(delta as isize) {
          crate::fatal(e);
        }
        (*last).size += delta;
        return last;
      }

      let addr = match advance_break(required_total as isize) {
        Ok(addr) => addr,
        Err(e) => crate::fatal(e),
      };

      let block = addr as *mut Block;
      ptr::write(
        block,
        Block::new(required_total - block::meta(), Status::Free, ptr::null_mut()),
      );
      if !last.is_null() {
        (*last).next = block;
      }
      block
    }
  }

  /// Creates a new individually-mapped block holding `size` payload bytes
  /// and inserts it at the head of the mapped list.
  pub(crate) fn map_block(&mut self, size: usize) -> *mut Block {
    let required_total = block::total(size);
    let addr = match map_anonymous(required_total) {
      Ok(addr) => addr,
      Err(e) => crate::fatal(e),
    };

    let block = addr as *mut Block;
    unsafe {
      ptr::write(
        block,
        Block::new(required_total - block::meta(), Status::Mapped, self.mmap_start),
      );
    }
    self.mmap_start = block;
    log::debug!("mapped block: {} bytes at {:p}", size, block);
    block
  }

  /// Unlinks `block` from the mapped list by pointer identity and unmaps
  /// its backing memory. No-op (beyond the unmap) if `block` is somehow
  /// not found (mirrors the spec's note that mapped-pointer validation is
  /// asymmetric with heap-pointer validation).
  pub(crate) fn unmap_block(&mut self, block: *mut Block) {
    unsafe {
      if self.mmap_start == block {
        self.mmap_start = (*block).next;
      } else {
        let mut current = self.mmap_start;
        while !current.is_null() && (*current).next != block {
          current = (*current).next;
        }
        if !current.is_null() {
          (*current).next = (*block).next;
        }
      }

      let len = block::total((*block).size);
      unmap_anonymous(block as *mut u8, len);
    }
  }
}
