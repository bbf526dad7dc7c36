//! Folder-backed persistence with a direct-download fallback.
//!
//! A `FolderHandle` is the capability a user grants over one writable
//! directory. Writes prefer the granted folder; when no handle exists or the
//! scoped write fails for any reason, the content degrades to a direct
//! download into the Downloads directory instead of surfacing a terminal
//! error.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use shared::error::ContextError;

/// Opaque capability over a user-granted writable directory.
#[derive(Debug, Clone)]
pub struct FolderHandle {
    dir: PathBuf,
    name: String,
}

impl FolderHandle {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Display name of the granted folder.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Acquires folder capabilities and performs writes with fallback.
pub struct FolderAccess {
    downloads_dir: PathBuf,
}

impl FolderAccess {
    /// Resolve the platform Downloads directory for the fallback path.
    pub fn new() -> Result<Self, ContextError> {
        let dirs =
            directories::UserDirs::new().ok_or_else(|| ContextError::UnsupportedPlatform {
                reason: "no home directory available".to_string(),
            })?;
        let downloads_dir = dirs
            .download_dir()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| dirs.home_dir().join("Downloads"));
        Ok(Self { downloads_dir })
    }

    /// Use an explicit fallback directory (settings override, tests).
    pub fn with_downloads_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            downloads_dir: dir.into(),
        }
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }

    /// Turn a user's directory selection into a capability.
    ///
    /// `None` models cancellation and returns `Ok(None)` silently. Any other
    /// acquisition failure (missing directory, unwritable directory) is a
    /// blocking error; there is no fallback for reading a directory.
    pub fn acquire_folder(
        &self,
        selection: Option<&Path>,
    ) -> Result<Option<FolderHandle>, ContextError> {
        let Some(path) = selection else {
            return Ok(None);
        };
        if !path.is_dir() {
            return Err(ContextError::UnsupportedPlatform {
                reason: format!("{} is not an accessible directory", path.display()),
            });
        }
        // Probe writability with a scoped temporary file.
        if let Err(e) = tempfile::tempfile_in(path) {
            return Err(ContextError::UnsupportedPlatform {
                reason: format!("{} is not writable: {}", path.display(), e),
            });
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Some(FolderHandle {
            dir: path.to_path_buf(),
            name,
        }))
    }

    /// Write `content` under `filename`, preferring the granted folder.
    ///
    /// With a handle, the content is written through a scoped stream that is
    /// released on every exit path. Without a handle, or when the scoped
    /// write fails, the direct-download fallback executes instead; a storage
    /// error becomes a successful download rather than a caller-visible
    /// failure. Only a failure of the fallback itself is returned. The path
    /// actually written is the result.
    pub fn write_file(
        &self,
        handle: Option<&FolderHandle>,
        filename: &str,
        content: &str,
    ) -> Result<PathBuf, ContextError> {
        if let Some(handle) = handle {
            match write_scoped(handle.dir(), filename, content) {
                Ok(path) => {
                    tracing::info!(path = %path.display(), "context written to granted folder");
                    return Ok(path);
                }
                Err(e) => {
                    tracing::warn!(
                        folder = %handle.dir().display(),
                        error = %e,
                        "folder write failed, falling back to direct download"
                    );
                }
            }
        }
        self.download(filename, content)
    }

    /// The direct-download fallback: stage in a temporary file, then persist
    /// under the target name. The staged file is removed on any failure.
    fn download(&self, filename: &str, content: &str) -> Result<PathBuf, ContextError> {
        std::fs::create_dir_all(&self.downloads_dir)?;
        let mut staged = tempfile::NamedTempFile::new_in(&self.downloads_dir)?;
        staged.write_all(content.as_bytes())?;
        staged.flush()?;
        let target = self.downloads_dir.join(filename);
        staged
            .persist(&target)
            .map_err(|e| ContextError::Write(e.error))?;
        tracing::info!(path = %target.display(), "context saved as direct download");
        Ok(target)
    }
}

fn write_scoped(dir: &Path, filename: &str, content: &str) -> std::io::Result<PathBuf> {
    let path = dir.join(filename);
    {
        let mut file = File::create(&path)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
    }
    Ok(path)
}
