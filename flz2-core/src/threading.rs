//! Utilities for configuring safe worker thread counts.

use crate::error::{Error, Result};

/// Thread configuration options for compression and decompression sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Threading {
    /// Automatically choose a thread count that keeps a safety margin for the
    /// rest of the system.
    ///
    /// This option detects the number of available CPU cores and reserves some
    /// threads for system processes to prevent resource starvation.
    #[default]
    Auto,
    /// Use an explicit number of worker threads.
    ///
    /// The specified count must not exceed the safe maximum determined by the
    /// system. If 0 is specified, it is treated as `Auto`.
    Exact(u32),
}

/// Validates and converts a threading configuration to a concrete thread count.
///
/// # Parameters
///
/// * `threads` - The threading configuration to validate and convert
///
/// # Returns
///
/// * `Ok(u32)` - A safe thread count to use
/// * `Err(Error::InvalidThreadCount)` - If the requested count exceeds system limits
pub(crate) fn sanitize_threads(threads: Threading) -> Result<u32> {
    let maximum = get_safe_max_threads();
    match threads {
        // Zero threads means "auto-detect"
        Threading::Auto | Threading::Exact(0) => Ok(maximum),
        Threading::Exact(requested) if requested <= maximum => Ok(requested),
        Threading::Exact(requested) => Err(Error::InvalidThreadCount { requested, maximum }),
    }
}

/// Resolves a threading configuration for a session, clamping oversized
/// explicit requests to the safe maximum instead of failing.
pub(crate) fn clamp_threads(threads: Threading) -> u32 {
    match sanitize_threads(threads) {
        Ok(count) => count.max(1),
        Err(Error::InvalidThreadCount { maximum, .. }) => maximum.max(1),
        Err(_) => 1,
    }
}

/// Determines the maximum safe number of worker threads for this host.
///
/// If thread detection fails, defaults to 1 thread.
fn get_safe_max_threads() -> u32 {
    let available_threads_count = match std::thread::available_parallelism() {
        Ok(n) => n.get(),
        Err(_) => 1, // Conservative fallback for systems where detection fails
    };

    // Reserve threads for system processes based on total available threads
    let system_reserve = match available_threads_count {
        1 => 0,
        2..=4 => 1,
        5..=7 => 2,
        _ => 3,
    };

    let safe_threads = available_threads_count
        .saturating_sub(system_reserve)
        .max(1);

    u32::try_from(safe_threads).unwrap_or(u32::MAX)
}
