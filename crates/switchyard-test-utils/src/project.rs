//! Temporary project trees.
//!
//! [`TestProject`] owns a temp directory and writes source files into it. The
//! directory is deleted when the value is dropped, even on panic.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A throwaway project directory.
pub struct TestProject {
    root: PathBuf,
    _temp_dir: TempDir,
}

impl TestProject {
    /// An empty project.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        // canonical, so it compares equal to indexer paths
        let root = temp_dir
            .path()
            .canonicalize()
            .expect("failed to canonicalize temp dir");
        Self {
            root,
            _temp_dir: temp_dir,
        }
    }

    /// A project containing `files` as `(relative path, content)` pairs.
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let project = Self::new();
        for (rel, content) in files {
            project.write(rel, content);
        }
        project
    }

    /// Builder form of [`write`](Self::write).
    pub fn file(self, rel: &str, content: impl AsRef<[u8]>) -> Self {
        self.write(rel, content);
        self
    }

    /// Write (or overwrite) a file, creating parent directories.
    pub fn write(&self, rel: &str, content: impl AsRef<[u8]>) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        std::fs::write(&path, content).expect("failed to write test file");
    }

    /// Delete a file.
    pub fn remove(&self, rel: &str) {
        std::fs::remove_file(self.path(rel)).expect("failed to remove test file");
    }

    /// Canonical project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a project-relative file.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Write `switchyard.toml` at the project root and return its path.
    pub async fn write_config(&self, toml_content: &str) -> PathBuf {
        let path = self.path("switchyard.toml");
        tokio::fs::write(&path, toml_content)
            .await
            .expect("failed to write test config");
        path
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}
