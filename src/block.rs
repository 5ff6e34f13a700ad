use std::mem;

/// Which of the two lists a block belongs to, and in what state.
///
/// `Free`/`Alloc` blocks live on the heap list; `Mapped` blocks live on the
/// mapped list. A block's status is the single source of truth for which
/// list it belongs to; there is no separate "kind" field to keep in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
  Free,
  Alloc,
  Mapped,
}

/// The in-band header prefixing every user payload.
///
/// `size` is always the aligned payload size in bytes, never the total
/// block size; callers that need the total compute it via [`total`].
#[repr(C)]
pub struct Block {
  pub size: usize,
  pub status: Status,
  pub next: *mut Block,
}

impl Block {
  pub fn new(size: usize, status: Status, next: *mut Block) -> Self {
    Self { size, status, next }
  }
}

/// Size of an aligned header: every block is preceded by exactly this many
/// bytes of metadata, regardless of payload size.
pub fn meta() -> usize {
  crate::align!(mem::size_of::<Block>())
}

/// Total on-wire size of a block (header + aligned payload) for a requested
/// payload size `n`.
pub fn total(n: usize) -> usize {
  crate::align!(n + meta())
}

/// Payload pointer for a given header address.
///
/// # Safety
/// `block` must point to a valid, initialized `Block`.
pub unsafe fn payload_of(block: *mut Block) -> *mut u8 {
  unsafe { (block as *mut u8).add(meta()) }
}

/// Header address for a given payload pointer.
///
/// # Safety
/// `payload` must have been produced by [`payload_of`] on some live block.
/// Passing an arbitrary pointer is undefined behavior.
pub unsafe fn block_of(payload: *mut u8) -> *mut Block {
  unsafe { payload.sub(meta()) as *mut Block }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::ptr;

  #[test]
  fn meta_is_aligned() {
    assert_eq!(meta() % crate::ALIGNMENT, 0);
  }

  #[test]
  fn total_is_aligned_and_covers_meta_plus_payload() {
    for n in [0usize, 1, 7, 8, 9, 100, 4096] {
      let t = total(n);
      assert_eq!(t % crate::ALIGNMENT, 0);
      assert!(t >= meta() + n);
    }
  }

  #[test]
  fn payload_and_block_round_trip() {
    let mut block = Block::new(64, Status::Free, ptr::null_mut());
    let block_ptr = &mut block as *mut Block;
    unsafe {
      let payload = payload_of(block_ptr);
      assert_eq!(block_of(payload), block_ptr);
    }
  }
}
