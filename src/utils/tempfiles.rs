//! Atomic file replacement: write a sibling `<name>.tmp`, then rename over the target.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::utils::config::PackagePaths;

/// Get the temporary sibling path for `path`.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_else(|| PackagePaths::get().pkg_name());
    path.parent()
        .unwrap_or(Path::new("."))
        .join(format!("{name}.tmp"))
}

/// Remove a leftover temp file from an interrupted write. Missing file is fine.
pub fn remove_stale_temp(path: &Path) -> io::Result<()> {
    match fs::remove_file(temp_path_for(path)) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

pub fn rename_temp_to_final(temp_path: &Path, final_path: &Path) -> io::Result<()> {
    fs::rename(temp_path, final_path)
}

/// Write `bytes` to `path` via temp + rename. Readers see either the old or the new file, never a partial one.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let temp_path = temp_path_for(path);
    let result = (|| {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        rename_temp_to_final(&temp_path, path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}
