//! State directory discovery.
//!
//! Commands operate against a `.krmfn/` state directory found by walking
//! upward from the working directory, the same way build tools locate a
//! project root. If no ancestor carries one, the working directory gets a
//! fresh `.krmfn/` of its own.

use std::path::{Path, PathBuf};

/// Name of the marker state directory.
pub const STATE_DIR_NAME: &str = ".krmfn";

/// Locate the state directory for the current working directory.
///
/// # Errors
///
/// Returns an error if the working directory cannot be determined.
pub fn find_state_dir() -> std::io::Result<PathBuf> {
    Ok(find_state_dir_from(&std::env::current_dir()?))
}

/// Locate the state directory starting from `start`.
///
/// Walks up through `start`'s ancestors looking for an existing
/// `.krmfn/` directory; falls back to `<start>/.krmfn` (possibly not yet
/// created) when none is found.
#[must_use]
pub fn find_state_dir_from(start: &Path) -> PathBuf {
    for dir in start.ancestors() {
        let candidate = dir.join(STATE_DIR_NAME);
        if candidate.is_dir() {
            return candidate;
        }
    }
    start.join(STATE_DIR_NAME)
}
