//! PATH-based executable lookup with fallback locations.

use std::path::PathBuf;

/// Locations package installers use that are often missing from a
/// non-login shell's PATH (sudo's secure_path, snaps, Homebrew).
const FALLBACK_PATHS: &[&str] = &[
    "/usr/local/bin",
    "/usr/bin",
    "/usr/sbin",
    "/snap/bin",
    "/opt/homebrew/bin",
];

/// Find an executable by name.
///
/// PATH lookup via the `which` crate first, then the fallback directories,
/// then `~/.local/bin` and `~/bin`.
pub(crate) fn find_executable(name: &str) -> Option<PathBuf> {
    if let Ok(path) = which::which(name) {
        return Some(path);
    }

    for dir in FALLBACK_PATHS {
        let path = PathBuf::from(dir).join(name);
        if path.is_file() {
            return Some(path);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        for sub in [".local/bin", "bin"] {
            let path = PathBuf::from(&home).join(sub).join(name);
            if path.is_file() {
                return Some(path);
            }
        }
    }

    None
}
