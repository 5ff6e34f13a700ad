/// Tunable constants for an [`crate::Allocator`] instance.
///
/// The defaults match the spec's fixed constants (`INITIAL_HEAP` and
/// `MMAP_THRESHOLD`, both 128 KiB). Tests construct a `Config` with smaller
/// values so that exercising heap extension or the mmap threshold boundary
/// doesn't require growing the real process break by 128 KiB per case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
  /// Size, in bytes, of the single preallocation made on first heap use.
  pub initial_heap: usize,
  /// Byte count at or above which a request is served by an anonymous
  /// mapping instead of the heap.
  pub mmap_threshold: usize,
}

/// 128 KiB, the spec's `INITIAL_HEAP` and `MMAP_THRESHOLD` constant.
pub const DEFAULT_INITIAL_HEAP: usize = 131_072;

/// 128 KiB, the spec's `MMAP_THRESHOLD` constant.
pub const DEFAULT_MMAP_THRESHOLD: usize = 131_072;

impl Default for Config {
  fn default() -> Self {
    Self {
      initial_heap: DEFAULT_INITIAL_HEAP,
      mmap_threshold: DEFAULT_MMAP_THRESHOLD,
    }
  }
}
