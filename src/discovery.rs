//! Input discovery: expand configured paths into manifest files.
//!
//! Directories are walked recursively and filtered to manifest extensions;
//! plain files pass straight through regardless of extension (the operator
//! named them explicitly). Unreadable inputs become error results on the
//! pipeline's results channel and never abort their siblings.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::ValidationError;
use crate::pipeline::CheckResult;

const MANIFEST_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

fn is_manifest(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| MANIFEST_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Discovery producer: deliver every discovered file path on `files`, one
/// error result per unreadable input on `results`. The files channel closes
/// when this task returns and drops its sender.
pub async fn discover_inputs(
    paths: Vec<PathBuf>,
    files: mpsc::Sender<PathBuf>,
    results: mpsc::Sender<CheckResult>,
) {
    for path in paths {
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                let name = path.display().to_string();
                let _ = results
                    .send(CheckResult::input_error(&name, &ValidationError::Io(e)))
                    .await;
                continue;
            }
        };

        if metadata.is_dir() {
            if let Err(e) = walk_dir(&path, &files).await {
                let name = path.display().to_string();
                let _ = results.send(CheckResult::input_error(&name, &e)).await;
            }
        } else if files.send(path).await.is_err() {
            return;
        }
    }
}

/// Recursive directory walk delivering manifest files in discovery order.
fn walk_dir<'a>(
    dir: &'a Path,
    files: &'a mpsc::Sender<PathBuf>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = crate::error::Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let mut read_dir = fs::read_dir(dir).await?;

        while let Some(entry) = read_dir.next_entry().await? {
            let entry_path = entry.path();
            let file_type = entry.file_type().await?;

            if file_type.is_dir() {
                walk_dir(&entry_path, files).await?;
            } else if is_manifest(&entry_path) {
                debug!(path = %entry_path.display(), "discovered manifest");
                if files.send(entry_path).await.is_err() {
                    break;
                }
            }
        }

        Ok(())
    })
}
