//! Context engine — pick the project files a request should see.
//!
//! Three layers, each usable on its own:
//!
//! 1. **File Indexer** — walks the project, records language, imports and
//!    exports per file, and resolves imports to local dependency edges.
//!
//! 2. **Relevance Scorer** — ranks indexed files against a query from
//!    explicit mentions, dependency edges, recency, name similarity and focus.
//!
//! 3. **Context Builder** — packs the ranked files into a token budget, full
//!    or summarized.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                 ContextEngine                 │
//! │                                               │
//! │  ┌───────────┐   ┌───────────┐   ┌──────────┐ │
//! │  │ File      │──▶│ Relevance │──▶│ Context  │ │
//! │  │ Indexer   │   │ Scorer    │   │ Builder  │ │
//! │  │           │   │           │   │          │ │
//! │  │ ·walk     │   │ ·explicit │   │ ·budget  │ │
//! │  │ ·imports  │   │ ·deps     │   │ ·truncate│ │
//! │  │ ·exports  │   │ ·recency  │   │ ·summary │ │
//! │  └───────────┘   └───────────┘   └──────────┘ │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Mutation (`refresh`, `update_file`, focus changes) takes `&mut self`;
//! scoring and building only read the index.

pub mod builder;
pub mod indexer;
pub mod scorer;

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use switchyard_config::{ContextConfig, MAX_FILES_LIMIT};

pub use builder::{
    ContextBuilder, ContextEntry, ContextPayload, ContextStats, FileSource, FsSource,
    estimate_tokens,
};
pub use indexer::{
    ExcludeRules, FileIndexer, FileOutcome, FileRecord, IndexReport, Language, SkipReason,
    SkippedEntry,
};
pub use scorer::{RelevanceScore, RelevanceScorer, ScoreReason, ScoreWeights};

/// Errors surfaced by the context engine.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("cannot index {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no readable file matched the query ({candidates} indexed files)")]
    Empty { candidates: usize },
}

/// Indexer, scorer and builder for one project.
#[derive(Debug)]
pub struct ContextEngine {
    indexer: FileIndexer,
    scorer: RelevanceScorer,
    builder: ContextBuilder,
    max_files: usize,
    last_report: IndexReport,
}

impl ContextEngine {
    /// Open `root` and index it.
    pub fn open(root: &Path, config: &ContextConfig) -> Result<Self, ContextError> {
        let io_err = |source: std::io::Error| ContextError::Io {
            path: root.to_path_buf(),
            source,
        };
        let excludes = ExcludeRules::new(config.exclude.iter().cloned());
        let mut indexer = FileIndexer::new(root, excludes).map_err(io_err)?;
        let last_report = indexer.index().map_err(io_err)?;

        Ok(Self {
            indexer,
            scorer: RelevanceScorer::new(),
            builder: ContextBuilder::new(
                config.max_tokens as usize,
                config.reserved_tokens as usize,
            ),
            max_files: config.max_files,
            last_report,
        })
    }

    /// Assemble the payload for `query`.
    ///
    /// Explicit files are re-read first so edits since the last index are seen.
    pub fn get_context(
        &mut self,
        query: &str,
        explicit_files: &[PathBuf],
        use_summaries: bool,
    ) -> Result<ContextPayload, ContextError> {
        for path in explicit_files {
            self.indexer.update_file(path);
        }

        let payload = if use_summaries {
            self.builder.build_summarized(
                &self.indexer,
                &self.scorer,
                query,
                explicit_files,
                self.max_files,
            )
        } else {
            self.builder
                .build(&self.indexer, &self.scorer, query, explicit_files, self.max_files)
        };

        if payload.is_empty() {
            return Err(ContextError::Empty {
                candidates: self.indexer.len(),
            });
        }

        let stats = self.builder.stats(&payload);
        debug!(
            files = stats.files,
            tokens = stats.tokens,
            tokens_remaining = stats.tokens_remaining,
            summaries = use_summaries,
            "context assembled"
        );
        Ok(payload)
    }

    /// Re-walk the whole project.
    pub fn refresh(&mut self) -> Result<&IndexReport, ContextError> {
        let report = self.indexer.index().map_err(|source| ContextError::Io {
            path: self.indexer.root().to_path_buf(),
            source,
        })?;
        info!(indexed = report.indexed, "context index refreshed");
        self.last_report = report;
        Ok(&self.last_report)
    }

    /// Re-read one file.
    pub fn update_file(&mut self, path: &Path) -> FileOutcome {
        self.indexer.update_file(path)
    }

    pub fn add_focus_file(&mut self, path: PathBuf) {
        self.scorer.add_focus_file(path);
    }

    pub fn clear_focus_files(&mut self) {
        self.scorer.clear_focus_files();
    }

    pub fn file_record(&self, path: &Path) -> Option<&FileRecord> {
        self.indexer.get(path)
    }

    /// Indexed files imported by `path`.
    pub fn dependencies(&self, path: &Path) -> Vec<PathBuf> {
        self.indexer.get_dependencies(path)
    }

    pub fn stats(&self, payload: &ContextPayload) -> ContextStats {
        self.builder.stats(payload)
    }

    /// Report of the most recent full index.
    pub fn last_report(&self) -> &IndexReport {
        &self.last_report
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    /// Override the file limit; clamped to `1..=MAX_FILES_LIMIT`.
    pub fn set_max_files(&mut self, max_files: usize) {
        self.max_files = max_files.clamp(1, MAX_FILES_LIMIT);
    }

    pub fn indexer(&self) -> &FileIndexer {
        &self.indexer
    }

    pub fn scorer(&self) -> &RelevanceScorer {
        &self.scorer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write(dir: &TempDir, rel: &str, content: &str) {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_open_indexes_project() {
        let dir = TempDir::new().unwrap();
        write(&dir, "app.py", "import util\n");
        write(&dir, "util.py", "def helper():\n    pass\n");
        write(&dir, "fixtures/big.json", "{}");

        let config = ContextConfig {
            exclude: vec!["fixtures".into()],
            ..ContextConfig::default()
        };
        let engine = ContextEngine::open(dir.path(), &config).unwrap();
        assert_eq!(engine.last_report().indexed, 2);
        assert_eq!(engine.max_files(), config.max_files);

        let util = engine.file_record(Path::new("util.py")).unwrap();
        assert_eq!(util.exports, vec!["helper".to_string()]);
        assert_eq!(engine.dependencies(Path::new("app.py")).len(), 1);
    }

    #[test]
    fn test_open_missing_root() {
        let dir = TempDir::new().unwrap();
        let err = ContextEngine::open(&dir.path().join("gone"), &ContextConfig::default())
            .unwrap_err();
        assert!(matches!(err, ContextError::Io { .. }));
    }

    #[test]
    fn test_get_context_sees_new_explicit_file() {
        let dir = TempDir::new().unwrap();
        write(&dir, "main.py", "print('hi')\n");
        let mut engine = ContextEngine::open(dir.path(), &ContextConfig::default()).unwrap();

        write(&dir, "late.py", "x = 1\n");
        let payload = engine
            .get_context("", &[PathBuf::from("late.py")], false)
            .unwrap();
        assert_eq!(payload.paths().next(), Some("late.py"));
        assert!(engine.file_record(Path::new("late.py")).is_some());
    }

    #[test]
    fn test_get_context_empty_project() {
        let dir = TempDir::new().unwrap();
        let mut engine = ContextEngine::open(dir.path(), &ContextConfig::default()).unwrap();
        let err = engine.get_context("anything", &[], false).unwrap_err();
        assert!(matches!(err, ContextError::Empty { candidates: 0 }));
    }

    #[cfg(unix)]
    #[test]
    fn test_get_context_through_symlinked_root() {
        let dir = TempDir::new().unwrap();
        write(&dir, "real/a.py", "import b\n");
        write(&dir, "real/b.py", "x = 1\n");
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(dir.path().join("real"), &link).unwrap();

        let mut engine = ContextEngine::open(&link, &ContextConfig::default()).unwrap();
        let payload = engine
            .get_context("", &[link.join("a.py")], false)
            .unwrap();

        assert_eq!(engine.indexer().len(), 2);
        assert_eq!(payload.paths().collect::<Vec<_>>(), vec!["a.py", "b.py"]);
        assert_eq!(
            engine.dependencies(&link.join("a.py")),
            vec![engine.indexer().root().join("b.py")]
        );
    }

    #[test]
    fn test_get_context_summaries_fall_back_to_truncation() {
        let dir = TempDir::new().unwrap();
        write(&dir, "big.txt", &"x".repeat(50_000));
        let config = ContextConfig {
            max_tokens: 3000,
            reserved_tokens: 2000,
            ..ContextConfig::default()
        };
        let mut engine = ContextEngine::open(dir.path(), &config).unwrap();

        let payload = engine.get_context("", &[], true).unwrap();
        assert_eq!(payload.paths().collect::<Vec<_>>(), vec!["big.txt"]);
    }

    #[test]
    fn test_set_max_files_is_clamped() {
        let dir = TempDir::new().unwrap();
        let mut engine = ContextEngine::open(dir.path(), &ContextConfig::default()).unwrap();
        engine.set_max_files(usize::MAX);
        assert_eq!(engine.max_files(), MAX_FILES_LIMIT);
        engine.set_max_files(0);
        assert_eq!(engine.max_files(), 1);
    }

    #[test]
    fn test_refresh_picks_up_new_files() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.py", "");
        let mut engine = ContextEngine::open(dir.path(), &ContextConfig::default()).unwrap();
        write(&dir, "b.py", "");
        assert_eq!(engine.refresh().unwrap().indexed, 2);
    }

    #[test]
    fn test_focus_files_round_trip() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.py", "");
        let mut engine = ContextEngine::open(dir.path(), &ContextConfig::default()).unwrap();
        engine.add_focus_file(PathBuf::from("a.py"));
        assert_eq!(engine.scorer().focus_files().count(), 1);
        engine.clear_focus_files();
        assert_eq!(engine.scorer().focus_files().count(), 0);
    }
}
