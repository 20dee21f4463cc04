//! The primitives the function metadata manager needs, behind a trait so it
//! never touches `tokio::fs` directly.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::errors::{Error, Result};

#[async_trait]
pub trait Filesystem: Send + Sync {
    async fn exists(&self, path: &Path) -> bool;
    async fn directory_exists(&self, path: &Path) -> bool;
    async fn ensure_directory(&self, path: &Path) -> Result<()>;

    /// When `ignore_errors` is true, a failing (not just missing) path is
    /// swallowed rather than propagated.
    async fn delete_directory_safe(&self, path: &Path, ignore_errors: bool) -> Result<()>;
    async fn delete_directory_contents_safe(&self, path: &Path) -> Result<()>;
    async fn delete_file_safe(&self, path: &Path);

    async fn get_directories(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Recurses unless `top_only`; `pattern` is glob-like (`"*"` for all).
    async fn get_files(&self, path: &Path, pattern: &str, top_only: bool) -> Result<Vec<PathBuf>>;

    async fn read_all_text(&self, path: &Path) -> Result<String>;
    async fn write_all_text(&self, path: &Path, content: &str) -> Result<()>;
}

/// `*` and `?` only — the only shapes the manager needs.
fn glob_match(pattern: &str, name: &str) -> bool {
    fn helper(p: &[u8], n: &[u8]) -> bool {
        match (p.first(), n.first()) {
            (None, None) => true,
            (Some(b'*'), _) => helper(&p[1..], n) || (!n.is_empty() && helper(p, &n[1..])),
            (Some(b'?'), Some(_)) => helper(&p[1..], &n[1..]),
            (Some(pc), Some(nc)) if pc == nc => helper(&p[1..], &n[1..]),
            _ => false,
        }
    }
    helper(pattern.as_bytes(), name.as_bytes())
}

pub struct TokioFilesystem;

impl TokioFilesystem {
    pub fn new() -> Self {
        TokioFilesystem
    }
}

impl Default for TokioFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Filesystem for TokioFilesystem {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }

    async fn directory_exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    async fn ensure_directory(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| Error::io(path, e))
    }

    async fn delete_directory_safe(&self, path: &Path, ignore_errors: bool) -> Result<()> {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) if ignore_errors => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring directory delete failure");
                Ok(())
            }
            Err(e) => Err(Error::io(path, e)),
        }
    }

    async fn delete_directory_contents_safe(&self, path: &Path) -> Result<()> {
        let mut entries = match tokio::fs::read_dir(path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::io(path, e)),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io(path, e))?
        {
            let entry_path = entry.path();
            let result = if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                tokio::fs::remove_dir_all(&entry_path).await
            } else {
                tokio::fs::remove_file(&entry_path).await
            };
            if let Err(e) = result {
                tracing::warn!(path = %entry_path.display(), error = %e, "ignoring directory-contents delete failure");
            }
        }
        Ok(())
    }

    async fn delete_file_safe(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "ignoring file delete failure");
            }
        }
    }

    async fn get_directories(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(path).await.map_err(|e| Error::io(path, e))?;
        let mut dirs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io(path, e))?
        {
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                dirs.push(entry.path());
            }
        }
        Ok(dirs)
    }

    async fn get_files(&self, path: &Path, pattern: &str, top_only: bool) -> Result<Vec<PathBuf>> {
        let mut stack = vec![path.to_path_buf()];
        let mut files = Vec::new();
        while let Some(dir) = stack.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(e) => e,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::io(&dir, e)),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Error::io(&dir, e))?
            {
                let entry_path = entry.path();
                let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
                if is_dir {
                    if !top_only {
                        stack.push(entry_path);
                    }
                    continue;
                }
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if glob_match(pattern, &name) {
                    files.push(entry_path);
                }
            }
        }
        Ok(files)
    }

    async fn read_all_text(&self, path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::io(path, e))
    }

    async fn write_all_text(&self, path: &Path, content: &str) -> Result<()> {
        tokio::fs::write(path, content)
            .await
            .map_err(|e| Error::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_star_matches_any_extension() {
        assert!(glob_match("run.*", "run.csx"));
        assert!(glob_match("run.*", "run.js"));
        assert!(!glob_match("run.*", "helper.csx"));
    }

    #[test]
    fn glob_star_alone_matches_everything() {
        assert!(glob_match("*", "anything.txt"));
        assert!(glob_match("*", ""));
    }
}
