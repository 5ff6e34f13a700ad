//! # rallocator - A Best-Fit Memory Allocator Library
//!
//! This crate replaces the platform's `malloc`/`free`/`calloc`/`realloc` for
//! a single-threaded process. It manages two distinct backing regions:
//!
//! - a contiguous **heap** grown by advancing the program break (`sbrk`),
//!   searched with best-fit and coalesced as blocks are freed;
//! - a **mapped region** of individually `mmap`'d blocks, used once a
//!   request is large enough that the heap would rather not carry it.
//!
//! ## Overview
//!
//! ```text
//!   HEAP (program break)                         MAPPED REGION
//!   ┌─────┬─────┬───────────────────┐             ┌─────────┐   ┌─────────┐
//!   │ A1  │ A2  │   free (tail)     │             │  Big 1  │   │  Big 2  │
//!   └─────┴─────┴───────────────────┘             └─────────┘   └─────────┘
//!     ▲                           ▲                    ▲
//!     heap_start            program break          mmap_start (LIFO)
//! ```
//!
//! Each allocation carries an in-band header:
//!
//! ```text
//!   Single Block:
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │      Block Header     │           Payload              │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ size: N         │  │  ┌──────────────────────────┐  │
//!   │  │ status: Alloc   │  │  │                          │  │
//!   │  │ next: null/ptr  │  │  │     N bytes usable       │  │
//!   │  └─────────────────┘  │  │                          │  │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Pointer returned to the caller
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   rallocator
//!   ├── align      - The ALIGNMENT constant and align! macro
//!   ├── block      - Block header layout and address arithmetic
//!   ├── config     - Tunable constants (initial heap size, mmap threshold)
//!   ├── error      - AllocError, the internal syscall-failure surface
//!   ├── region     - Region Manager: heap preallocation/extension, mmap
//!   ├── placement  - Placement Engine: best-fit search, split, coalesce
//!   └── allocator  - Allocator and its four public entry points
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rallocator::Allocator;
//!
//! let mut alloc = Allocator::new();
//!
//! let ptr = alloc.malloc(64);
//! assert!(!ptr.is_null());
//!
//! unsafe {
//!     ptr.write(42);
//!     assert_eq!(ptr.read(), 42);
//! }
//!
//! alloc.free(ptr);
//! ```
//!
//! ## Placement Strategy
//!
//! Unlike a bump allocator, freed blocks are reused: `malloc` runs a
//! best-fit search over the heap list before falling back to extending the
//! program break, and adjacent free blocks are coalesced both lazily
//! (during search) and eagerly (on free). See [`Allocator::realloc`] for
//! the more involved in-place-grow/promote/relocate logic reallocation
//! needs.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronization primitives; concurrent
//!   use of one `Allocator` (or mixing it with any other caller of the
//!   program break) is unsafe.
//! - **Heap memory is never released to the OS**: only mapped blocks are
//!   unmapped on free; the break only ever grows.
//! - **Unix-only**: requires `libc`'s `sbrk`/`mmap`/`munmap`/`sysconf`
//!   (POSIX systems).
//!
//! ## Safety
//!
//! This crate is inherently unsafe as it deals with raw memory management.
//! Allocation and deallocation internals require `unsafe` blocks; the four
//! public entry points (`malloc`, `free`, `calloc`, `realloc`) are safe to
//! call but, like their C namesakes, place the usual obligations on the
//! caller (no double-free, no use-after-free, pointers passed to `free`/
//! `realloc` must have come from this same `Allocator`).

pub mod align;
mod allocator;
mod block;
mod config;
mod error;
mod placement;
mod region;

pub use allocator::Allocator;
pub use config::Config;
pub use error::AllocError;

/// Fixed alignment, in bytes, of every header and every returned payload
/// pointer. The spec pins this at 8 regardless of target word size.
pub const ALIGNMENT: usize = 8;

/// Logs `err` and aborts the process. This is the host-delegated fatal path
/// for the "OS resource exhaustion" error class (break-advance or mapping
/// failure). The allocator never attempts to recover or return null for
/// these; callers must expect termination, matching real `malloc`'s
/// behavior under `MAP_FAILED`/`ENOMEM` once overcommit is exhausted.
pub(crate) fn fatal(err: AllocError) -> ! {
  log::error!("fatal allocator error: {err}");
  std::process::abort();
}
