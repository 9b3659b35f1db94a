//! Atomic on-disk emission of an asset mapping.
//!
//! Writing the output directory is really the packaging layer's job, but
//! callers that just want files on disk get a safe default here: paths are
//! validated against directory traversal, every file is written to a
//! temporary name first, and the batch either fully renames into place or
//! rolls back.

use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;

use crate::assets::Assets;
use crate::{Error, Result};

/// Write every asset under `dir`.
///
/// With `overwrite` disabled, an existing target file fails the whole batch
/// before anything is renamed into place.
///
/// # Errors
///
/// - [`Error::InvalidOutputPath`] for traversal attempts or unusable paths
/// - [`Error::WriteFailure`] for I/O failures (after rollback)
pub fn write_assets_to(assets: &Assets, dir: &Path, overwrite: bool) -> Result<()> {
    let dir = normalize_dir(dir)?;
    fs::create_dir_all(&dir).map_err(|e| {
        Error::WriteFailure(format!(
            "Failed to create output directory '{}': {}",
            dir.display(),
            e
        ))
    })?;

    let mut operations: Vec<(PathBuf, &[u8])> = Vec::with_capacity(assets.len());
    for (path, content) in assets.iter() {
        let target = validate_output_path(&dir, path)?;
        if !overwrite && target.exists() {
            return Err(Error::WriteFailure(format!(
                "File already exists: '{}'. Pass overwrite=true to replace.",
                target.display()
            )));
        }
        operations.push((target, content.as_bytes()));
    }

    write_files_atomic(&operations)
}

fn normalize_dir(dir: &Path) -> Result<PathBuf> {
    let cleaned = dir.clean();
    if cleaned.is_absolute() {
        return Ok(cleaned);
    }
    let cwd = std::env::current_dir()
        .map_err(|e| Error::InvalidOutputPath(format!("Failed to get current directory: {e}")))?;
    Ok(cwd.join(cleaned).clean())
}

/// Resolve a filename under the output directory, rejecting anything that
/// escapes it.
fn validate_output_path(base_dir: &Path, filename: &str) -> Result<PathBuf> {
    if filename.is_empty() || filename.contains('\0') {
        return Err(Error::InvalidOutputPath(format!(
            "Unusable output filename: {filename:?}"
        )));
    }

    let full = base_dir.join(Path::new(filename).clean()).clean();
    if !full.starts_with(base_dir) {
        return Err(Error::InvalidOutputPath(format!(
            "Path '{}' escapes output directory '{}'",
            filename,
            base_dir.display()
        )));
    }
    Ok(full)
}

/// Two-phase write: everything lands under a temporary name, then the whole
/// batch renames into place. Any failure deletes the temporaries.
fn write_files_atomic(operations: &[(PathBuf, &[u8])]) -> Result<()> {
    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(operations.len());

    for (target, content) in operations {
        if let Some(parent) = target.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                cleanup(&staged);
                return Err(Error::WriteFailure(format!(
                    "Failed to create directory '{}': {}",
                    parent.display(),
                    e
                )));
            }
        }
        let temp = target.with_extension("weft-tmp");
        if let Err(e) = fs::write(&temp, content) {
            cleanup(&staged);
            return Err(Error::WriteFailure(format!(
                "Failed to write temporary file '{}': {}",
                temp.display(),
                e
            )));
        }
        staged.push((temp, target.clone()));
    }

    for (temp, target) in &staged {
        if let Err(e) = fs::rename(temp, target) {
            cleanup(&staged);
            return Err(Error::WriteFailure(format!(
                "Failed to rename '{}' to '{}': {}",
                temp.display(),
                target.display(),
                e
            )));
        }
    }
    Ok(())
}

fn cleanup(staged: &[(PathBuf, PathBuf)]) {
    for (temp, _) in staged {
        if temp.exists() {
            if let Err(e) = fs::remove_file(temp) {
                tracing::warn!(path = %temp.display(), error = %e, "failed to remove temporary file");
            }
        }
    }
}
