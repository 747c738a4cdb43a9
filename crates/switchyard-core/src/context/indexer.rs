//! Codebase indexer — per-file metadata and the project import graph.
//!
//! Walks a project tree, skipping excluded entries, and records size, language,
//! imports, exports and modification time for every regular file. Python sources
//! are parsed with tree-sitter; JavaScript and TypeScript imports/exports come from
//! `import`/`require`/`export` patterns, which miss non-standard syntax.
//!
//! ## Import graph
//!
//! [`FileIndexer::get_dependencies`] resolves import identifiers to files. Only
//! files that are themselves in the index count, so third-party imports never
//! produce an edge.

use std::collections::{BTreeSet, HashMap};
use std::ffi::OsString;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tree_sitter::{Node, Parser};

/// Patterns excluded from every walk, in addition to configured ones.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "__pycache__",
    "*.pyc",
    ".git",
    ".venv",
    "venv",
    "node_modules",
    ".pytest_cache",
    ".mypy_cache",
    ".ruff_cache",
    "*.egg-info",
    "dist",
    "build",
    "target",
    ".switchyard",
];

/// Source language detected from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Java,
    Go,
    Rust,
    Cpp,
    C,
}

impl Language {
    /// Look up the language for a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "py" | "pyi" => Some(Language::Python),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "ts" | "tsx" => Some(Language::TypeScript),
            "java" => Some(Language::Java),
            "go" => Some(Language::Go),
            "rs" => Some(Language::Rust),
            "cpp" | "cc" | "cxx" | "hpp" | "h" => Some(Language::Cpp),
            "c" => Some(Language::C),
            _ => None,
        }
    }

    /// Extension tried when resolving an extension-less import.
    pub fn default_extension(self) -> &'static str {
        match self {
            Language::Python => "py",
            Language::JavaScript => "js",
            Language::TypeScript => "ts",
            Language::Java => "java",
            Language::Go => "go",
            Language::Rust => "rs",
            Language::Cpp => "cpp",
            Language::C => "c",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Python => write!(f, "python"),
            Language::JavaScript => write!(f, "javascript"),
            Language::TypeScript => write!(f, "typescript"),
            Language::Java => write!(f, "java"),
            Language::Go => write!(f, "go"),
            Language::Rust => write!(f, "rust"),
            Language::Cpp => write!(f, "cpp"),
            Language::C => write!(f, "c"),
        }
    }
}

/// Metadata recorded for one indexed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path (the index key).
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Detected language, if the extension is known.
    pub language: Option<Language>,
    /// Imported module identifiers, in source order.
    pub imports: Vec<String>,
    /// Public top-level symbol names, in source order.
    pub exports: Vec<String>,
    /// Last modification time.
    pub modified: SystemTime,
}

/// Why an entry was left out of the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The directory could not be listed; nothing below it was indexed.
    UnreadableDirectory(String),
    /// File metadata could not be read.
    Metadata(String),
    /// Source text could not be read (I/O error or not UTF-8).
    UnreadableContent(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnreadableDirectory(e) => write!(f, "unreadable directory: {e}"),
            SkipReason::Metadata(e) => write!(f, "metadata unavailable: {e}"),
            SkipReason::UnreadableContent(e) => write!(f, "unreadable content: {e}"),
        }
    }
}

/// A path the walk saw but did not index.
#[derive(Debug, Clone)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Summary of a full [`FileIndexer::index`] run.
#[derive(Debug, Clone, Default)]
pub struct IndexReport {
    /// Number of files in the new index.
    pub indexed: usize,
    /// Entries skipped during the walk, sorted by path.
    pub skipped: Vec<SkippedEntry>,
}

/// Result of [`FileIndexer::update_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// The entry was inserted or replaced.
    Indexed,
    /// The path matches an exclusion pattern; the index is unchanged.
    Excluded,
    /// The path does not exist (or is not a regular file); the index is unchanged.
    Missing,
    /// Extraction failed; the index is unchanged.
    Skipped(SkipReason),
}

/// Exclusion rules: exact names, `*.ext` suffixes, and path substrings.
///
/// Substring matching is applied to the project-relative path and is coarse:
/// `build` also excludes `rebuild.py`.
#[derive(Debug, Clone)]
pub struct ExcludeRules {
    patterns: BTreeSet<String>,
}

impl ExcludeRules {
    /// Built-in patterns plus `extra`.
    pub fn new<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut patterns: BTreeSet<String> =
            DEFAULT_EXCLUDES.iter().map(|p| p.to_string()).collect();
        patterns.extend(extra.into_iter().map(Into::into));
        Self { patterns }
    }

    /// Whether a project-relative path is excluded.
    pub fn is_excluded(&self, relative: &Path) -> bool {
        let name = relative
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if self.patterns.contains(name) {
            return true;
        }

        let full = relative.to_string_lossy();
        self.patterns.iter().any(|pattern| {
            if let Some(suffix) = pattern.strip_prefix('*')
                && suffix.starts_with('.')
            {
                name.ends_with(suffix)
            } else {
                full.contains(pattern.as_str())
            }
        })
    }
}

impl Default for ExcludeRules {
    fn default() -> Self {
        Self::new(std::iter::empty::<String>())
    }
}

/// In-memory file index for one project root.
#[derive(Debug)]
pub struct FileIndexer {
    root: PathBuf,
    excludes: ExcludeRules,
    index: HashMap<PathBuf, FileRecord>,
}

impl FileIndexer {
    /// Create an empty indexer for `root`. The root is canonicalized.
    pub fn new(root: &Path, excludes: ExcludeRules) -> std::io::Result<Self> {
        Ok(Self {
            root: std::fs::canonicalize(root)?,
            excludes,
            index: HashMap::new(),
        })
    }

    /// The canonical project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the whole project and replace the index.
    ///
    /// Fails only when the root itself cannot be listed; the previous index is
    /// kept in that case. Per-entry failures are reported, not returned.
    pub fn index(&mut self) -> std::io::Result<IndexReport> {
        let entries = std::fs::read_dir(&self.root)?;

        let mut fresh = HashMap::new();
        let mut report = IndexReport::default();
        self.walk_entries(entries, &self.root, &mut fresh, &mut report);

        report.indexed = fresh.len();
        report.skipped.sort_by(|a, b| a.path.cmp(&b.path));
        self.index = fresh;

        info!(
            root = %self.root.display(),
            files = report.indexed,
            skipped = report.skipped.len(),
            "Indexed project"
        );
        Ok(report)
    }

    fn walk_dir(
        &self,
        dir: &Path,
        index: &mut HashMap<PathBuf, FileRecord>,
        report: &mut IndexReport,
    ) {
        match std::fs::read_dir(dir) {
            Ok(entries) => self.walk_entries(entries, dir, index, report),
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Cannot read directory");
                report.skipped.push(SkippedEntry {
                    path: dir.to_path_buf(),
                    reason: SkipReason::UnreadableDirectory(e.to_string()),
                });
            }
        }
    }

    fn walk_entries(
        &self,
        entries: std::fs::ReadDir,
        dir: &Path,
        index: &mut HashMap<PathBuf, FileRecord>,
        report: &mut IndexReport,
    ) {
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "Cannot read directory entry");
                    report.skipped.push(SkippedEntry {
                        path: dir.to_path_buf(),
                        reason: SkipReason::UnreadableDirectory(e.to_string()),
                    });
                    continue;
                }
            };
            let path = entry.path();
            if self.is_excluded(&path) {
                continue;
            }

            // Symlinks are neither followed nor indexed.
            match entry.file_type() {
                Ok(ft) if ft.is_dir() => self.walk_dir(&path, index, report),
                Ok(ft) if ft.is_file() => match extract_record(&path) {
                    Ok(record) => {
                        index.insert(path, record);
                    }
                    Err(reason) => {
                        debug!(path = %path.display(), %reason, "Skipping file");
                        report.skipped.push(SkippedEntry { path, reason });
                    }
                },
                Ok(_) => {}
                Err(e) => report.skipped.push(SkippedEntry {
                    path,
                    reason: SkipReason::Metadata(e.to_string()),
                }),
            }
        }
    }

    /// Re-extract a single file, leaving every other entry untouched.
    pub fn update_file(&mut self, path: &Path) -> FileOutcome {
        let path = self.resolve_path(path);
        if self.is_excluded(&path) {
            return FileOutcome::Excluded;
        }
        if !path.is_file() {
            return FileOutcome::Missing;
        }
        match extract_record(&path) {
            Ok(record) => {
                debug!(path = %path.display(), "Updated index entry");
                self.index.insert(path, record);
                FileOutcome::Indexed
            }
            Err(reason) => {
                debug!(path = %path.display(), %reason, "Update skipped");
                FileOutcome::Skipped(reason)
            }
        }
    }

    /// Resolve a caller-supplied path to its index key.
    ///
    /// Relative paths are taken from the root. Existing paths are canonicalized,
    /// so a root reached through a symlink maps onto the same keys as the walk.
    /// For a path that does not exist, the deepest existing ancestor is
    /// canonicalized and the rest is appended after lexical normalization.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        if let Ok(canonical) = std::fs::canonicalize(&joined) {
            return canonical;
        }

        let lexical = normalize(&joined);
        let mut tail = Vec::new();
        let mut ancestor = lexical.as_path();
        while let (Some(parent), Some(name)) = (ancestor.parent(), ancestor.file_name()) {
            tail.push(name);
            ancestor = parent;
            if let Ok(mut resolved) = std::fs::canonicalize(ancestor) {
                resolved.extend(tail.iter().rev());
                return resolved;
            }
        }
        lexical
    }

    /// Path relative to the project root, if it lies under it.
    pub fn relative_path<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.root).ok()
    }

    fn is_excluded(&self, path: &Path) -> bool {
        match path.strip_prefix(&self.root) {
            Ok(relative) => self.excludes.is_excluded(relative),
            Err(_) => self.excludes.is_excluded(path),
        }
    }

    /// Metadata for one file.
    pub fn get(&self, path: &Path) -> Option<&FileRecord> {
        self.index.get(&self.resolve_path(path))
    }

    /// Whether a path is in the index.
    pub fn contains(&self, path: &Path) -> bool {
        self.get(path).is_some()
    }

    /// Iterate over all records (unordered).
    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.index.values()
    }

    /// Number of indexed files.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Is the index empty?
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Indexed files imported by `path`, in import order.
    pub fn get_dependencies(&self, path: &Path) -> Vec<PathBuf> {
        let path = self.resolve_path(path);
        let Some(record) = self.index.get(&path) else {
            return Vec::new();
        };

        let mut deps = Vec::new();
        for import in &record.imports {
            if let Some(dep) = self.resolve_import(import, &path, record.language)
                && !deps.contains(&dep)
            {
                deps.push(dep);
            }
        }
        deps
    }

    /// Resolve one import identifier to an indexed file.
    ///
    /// Relative specifiers (`./x`, `../x`) resolve against the importing file.
    /// Anything else is a dotted module name: dots become directory separators
    /// and the root is tried before the importing file's directory. Each base is
    /// tried as-is and with the language's default extension.
    fn resolve_import(
        &self,
        import: &str,
        from: &Path,
        language: Option<Language>,
    ) -> Option<PathBuf> {
        let from_dir = from.parent().unwrap_or(&self.root);
        let bases = if import.starts_with("./") || import.starts_with("../") {
            vec![from_dir.join(import)]
        } else {
            let relative = import.replace('.', "/");
            vec![self.root.join(&relative), from_dir.join(&relative)]
        };

        bases.into_iter().map(|b| normalize(&b)).find_map(|base| {
            let with_ext = language.map(|lang| {
                let mut name: OsString = base.clone().into_os_string();
                name.push(".");
                name.push(lang.default_extension());
                PathBuf::from(name)
            });
            std::iter::once(base)
                .chain(with_ext)
                .find(|candidate| self.index.contains_key(candidate))
        })
    }
}

/// Lexically normalize `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Build the record for one regular file.
fn extract_record(path: &Path) -> Result<FileRecord, SkipReason> {
    let meta = std::fs::metadata(path).map_err(|e| SkipReason::Metadata(e.to_string()))?;
    let language = Language::from_path(path);

    let (imports, exports) = match language {
        Some(Language::Python) => extract_python(&read_source(path)?),
        Some(Language::JavaScript | Language::TypeScript) => extract_script(&read_source(path)?),
        _ => (Vec::new(), Vec::new()),
    };

    Ok(FileRecord {
        path: path.to_path_buf(),
        size: meta.len(),
        language,
        imports,
        exports,
        modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
    })
}

fn read_source(path: &Path) -> Result<String, SkipReason> {
    std::fs::read_to_string(path).map_err(|e| SkipReason::UnreadableContent(e.to_string()))
}

// ── Language-specific extraction ────────────────────────────────────────

/// Extract imports and public top-level definitions from Python source.
///
/// Source that does not parse cleanly yields empty lists.
fn extract_python(content: &str) -> (Vec<String>, Vec<String>) {
    let mut parser = Parser::new();
    if parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .is_err()
    {
        return (Vec::new(), Vec::new());
    }
    let Some(tree) = parser.parse(content, None) else {
        return (Vec::new(), Vec::new());
    };
    let root = tree.root_node();
    if root.has_error() {
        return (Vec::new(), Vec::new());
    }

    let source = content.as_bytes();
    let mut imports = Vec::new();
    collect_python_imports(root, source, &mut imports);

    let mut exports = Vec::new();
    for child in root.named_children(&mut root.walk()) {
        let definition = if child.kind() == "decorated_definition" {
            child.child_by_field_name("definition")
        } else {
            Some(child)
        };
        if let Some(def) = definition
            && matches!(def.kind(), "function_definition" | "class_definition")
            && let Some(name) = def
                .child_by_field_name("name")
                .and_then(|n| n.utf8_text(source).ok())
            && !name.starts_with('_')
        {
            exports.push(name.to_string());
        }
    }

    (imports, exports)
}

fn collect_python_imports(node: Node, source: &[u8], imports: &mut Vec<String>) {
    match node.kind() {
        "import_statement" => {
            for name in node.children_by_field_name("name", &mut node.walk()) {
                let target = if name.kind() == "aliased_import" {
                    name.child_by_field_name("name")
                } else {
                    Some(name)
                };
                if let Some(text) = target.and_then(|t| t.utf8_text(source).ok()) {
                    imports.push(text.to_string());
                }
            }
            return;
        }
        "import_from_statement" => {
            // `from . import x` names no module
            if let Some(text) = node
                .child_by_field_name("module_name")
                .and_then(|m| m.utf8_text(source).ok())
            {
                let module = text.trim_start_matches('.');
                if !module.is_empty() {
                    imports.push(module.to_string());
                }
            }
            return;
        }
        _ => {}
    }

    for child in node.children(&mut node.walk()) {
        collect_python_imports(child, source, imports);
    }
}

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"import\s+(?:(?:\*\s+as\s+\w+)|(?:\{[^}]*\})|(?:\w+))\s+from\s+['"]([^'"]+)['"]"#)
        .expect("valid regex")
});

static REQUIRE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"require\s*\(\s*['"]([^'"]+)['"]\s*\)"#).expect("valid regex")
});

static EXPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"export\s+(?:function|class|const|let|var)\s+(\w+)").expect("valid regex")
});

/// Extract imports and exports from JavaScript/TypeScript source by pattern.
fn extract_script(content: &str) -> (Vec<String>, Vec<String>) {
    let captures = |re: &Regex| -> Vec<String> {
        re.captures_iter(content)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect::<Vec<_>>()
    };

    let mut imports = captures(&IMPORT_RE);
    imports.extend(captures(&REQUIRE_RE));
    (imports, captures(&EXPORT_RE))
}
