use std::io;

/// Internal syscall-failure surface used by the Region Manager.
///
/// This type is never returned from `malloc`/`free`/`calloc`/`realloc`. The
/// public API stays total, exactly as POSIX `malloc` is. It exists only so
/// the fatal-abort call site (see [`crate::fatal`]) has something
/// `Display`-able to log before terminating the process, matching the
/// spec's "fatal, reported via the host's abort path" directive.
#[derive(Debug, thiserror::Error)]
pub enum AllocError {
  #[error("failed to advance the program break by {requested} bytes: {source}")]
  BreakAdvance { requested: isize, source: io::Error },

  #[error("failed to map {requested} anonymous bytes: {source}")]
  Mmap { requested: usize, source: io::Error },
}
