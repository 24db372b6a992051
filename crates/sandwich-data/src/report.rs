//! JSON report output.

use eyre::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Writes `value` as pretty-printed JSON to `result_dir/file_name`.
///
/// Creates `result_dir` when it does not exist yet and returns the path of
/// the written file.
///
/// # Errors
/// Returns error if the directory cannot be created, serialization fails,
/// or the file cannot be written.
pub fn write_json<T: Serialize + ?Sized>(
    result_dir: &Path,
    file_name: &str,
    value: &T,
) -> Result<PathBuf> {
    std::fs::create_dir_all(result_dir)
        .wrap_err_with(|| format!("failed to create result directory {}", result_dir.display()))?;

    let path = result_dir.join(file_name);
    let json = serde_json::to_string_pretty(value).wrap_err("failed to serialize report")?;
    std::fs::write(&path, json).wrap_err_with(|| format!("failed to write {}", path.display()))?;

    tracing::debug!(path = %path.display(), "report written");
    Ok(path)
}
