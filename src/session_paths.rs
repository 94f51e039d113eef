//! Purpose: Session-file path resolution shared by the CLI and API.
//! Exports: `default_session_dir`, `session_file_path`.
//! Role: Keep CLI and library session semantics aligned from one source.
//! Invariants: Default directory remains `~/.remodel`; `REMODEL_DIR` overrides.

use std::path::{Path, PathBuf};

pub(crate) fn default_session_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("REMODEL_DIR") {
        return PathBuf::from(dir);
    }
    let home = std::env::var_os("HOME").unwrap_or_default();
    PathBuf::from(home).join(".remodel")
}

pub(crate) fn session_file_path(dir: &Path) -> PathBuf {
    dir.join("sessions.json")
}
