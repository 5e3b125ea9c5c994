use crate::model::RunSummary;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Write a run summary as pretty JSON, creating parent directories as needed.
pub fn export_json(path: &Path, summary: &RunSummary) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let body = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, body).with_context(|| format!("write {}", path.display()))?;
    Ok(path.to_path_buf())
}
