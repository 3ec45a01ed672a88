//! Dataset files: load, atomic flush, and result artifact naming.
//!
//! A flush serializes the whole sheet to `<path>.part`, syncs it, and renames
//! it over the target so a crash mid-write never leaves a torn dataset.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::{Sheet, ROW_WIDTH};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

const RESULT_PREFIX: &str = "outreach_result_";
const RESULT_EXT: &str = ".json";

/// Path for the temp file: appends `.part` to the final path.
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Name of a result dataset created at `created_at_ms`.
pub fn result_filename(created_at_ms: i64) -> String {
    format!("{RESULT_PREFIX}{created_at_ms}{RESULT_EXT}")
}

/// Accepts only names produced by [`result_filename`] (no path components).
pub fn is_safe_result_filename(name: &str) -> bool {
    name.strip_prefix(RESULT_PREFIX)
        .and_then(|rest| rest.strip_suffix(RESULT_EXT))
        .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
}

/// Read a dataset from disk.
pub async fn load(path: &Path) -> Result<Sheet> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("read dataset {}", path.display()))?;
    let sheet: Sheet = serde_json::from_slice(&data)
        .with_context(|| format!("parse dataset {}", path.display()))?;
    let wide = sheet.rows_wider_than_layout();
    if wide > 0 {
        tracing::warn!(
            path = %path.display(),
            rows = wide,
            width = ROW_WIDTH,
            "dataset has cells beyond the output columns; resume assumes the fixed layout"
        );
    }
    Ok(sheet)
}

/// Write the dataset to `path` atomically.
pub async fn flush(sheet: &Sheet, path: &Path) -> Result<()> {
    let data = serde_json::to_vec_pretty(sheet).context("serialize dataset")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create dataset dir {}", parent.display()))?;
    }
    let tmp = temp_path(path);
    let mut file = tokio::fs::File::create(&tmp)
        .await
        .with_context(|| format!("create {}", tmp.display()))?;
    file.write_all(&data)
        .await
        .with_context(|| format!("write {}", tmp.display()))?;
    file.sync_all()
        .await
        .with_context(|| format!("sync {}", tmp.display()))?;
    drop(file);
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    tracing::debug!(path = %path.display(), rows = sheet.len(), "dataset flushed");
    Ok(())
}
