use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// Resolve `path` against `workdir`, refusing anything that escapes it.
///
/// Relative paths are joined onto the workdir; absolute paths must already
/// live under it. Existing paths are canonicalized so symlinks cannot be used
/// to step outside.
pub fn resolve_path(workdir: &Path, path: &str) -> Result<PathBuf> {
    let requested = Path::new(path);

    if requested
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        warn!(path = %path, "Path traversal attempt detected");
        return Err(Error::PermissionDenied(
            "Path traversal (..) is not allowed".to_string(),
        ));
    }

    let root = workdir
        .canonicalize()
        .unwrap_or_else(|_| workdir.to_path_buf());
    let joined = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        root.join(requested)
    };

    let resolved = if joined.exists() {
        joined.canonicalize()?
    } else {
        joined
    };

    if !resolved.starts_with(&root) {
        warn!(path = %path, workdir = %root.display(), "Path outside workdir");
        return Err(Error::PermissionDenied(format!(
            "'{}' is outside the tool workdir",
            path
        )));
    }

    Ok(resolved)
}
