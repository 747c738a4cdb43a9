//! Context assembly — pack the most relevant files into a token budget.
//!
//! Token counts are estimated as characters ÷ [`CHARS_PER_TOKEN`]; no real
//! tokenizer is involved. Files are accepted greedily in relevance order and a
//! file that does not fit is skipped, leaving room for smaller ones behind it.

use std::io;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use super::indexer::{FileIndexer, Language};
use super::scorer::RelevanceScorer;

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Tokens held back for the prompt and the response.
pub const DEFAULT_RESERVED_TOKENS: usize = 2000;

/// Lines of file header kept in a summary.
pub const SUMMARY_HEADER_LINES: usize = 20;

/// Definitions listed in a summary.
pub const SUMMARY_MAX_DEFINITIONS: usize = 10;

/// Candidates must score above this to be summarized.
pub const SUMMARY_MIN_SCORE: f64 = 10.0;

/// Estimated token count of `text`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / CHARS_PER_TOKEN
}

/// Read access to file content.
pub trait FileSource: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<String>;
}

/// Reads straight from the filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSource;

impl FileSource for FsSource {
    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// One file in a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum ContextEntry {
    /// Complete file content (possibly truncated, see [`ContextBuilder::build`]).
    Full(String),
    /// Generated summary standing in for the file.
    Summary(String),
}

impl ContextEntry {
    pub fn text(&self) -> &str {
        match self {
            ContextEntry::Full(text) | ContextEntry::Summary(text) => text,
        }
    }

    pub fn is_summary(&self) -> bool {
        matches!(self, ContextEntry::Summary(_))
    }
}

/// Selected files keyed by project-relative path, in selection order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContextPayload {
    entries: IndexMap<String, ContextEntry>,
}

impl ContextPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: String, entry: ContextEntry) {
        self.entries.insert(path, entry);
    }

    pub fn get(&self, path: &str) -> Option<&ContextEntry> {
        self.entries.get(path)
    }

    /// Entries in selection order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContextEntry)> {
        self.entries.iter().map(|(path, entry)| (path.as_str(), entry))
    }

    /// Paths in selection order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total characters across all entries.
    pub fn characters(&self) -> usize {
        self.entries.values().map(|e| e.text().chars().count()).sum()
    }

    /// Render the payload as a prompt preamble, one fenced block per file.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (path, entry) in &self.entries {
            let label = if entry.is_summary() { " (summary)" } else { "" };
            out.push_str(&format!("## {path}{label}\n```\n{}\n```\n\n", entry.text()));
        }
        out
    }
}

/// Size figures for a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContextStats {
    pub files: usize,
    pub characters: usize,
    pub tokens: usize,
    pub tokens_remaining: usize,
}

/// Greedy, budget-bounded payload assembly.
#[derive(Clone)]
pub struct ContextBuilder {
    max_tokens: usize,
    reserved_tokens: usize,
    source: Arc<dyn FileSource>,
}

impl std::fmt::Debug for ContextBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextBuilder")
            .field("max_tokens", &self.max_tokens)
            .field("reserved_tokens", &self.reserved_tokens)
            .finish_non_exhaustive()
    }
}

impl ContextBuilder {
    /// Builder reading from the filesystem.
    pub fn new(max_tokens: usize, reserved_tokens: usize) -> Self {
        Self::with_source(max_tokens, reserved_tokens, Arc::new(FsSource))
    }

    pub fn with_source(
        max_tokens: usize,
        reserved_tokens: usize,
        source: Arc<dyn FileSource>,
    ) -> Self {
        Self {
            max_tokens,
            reserved_tokens,
            source,
        }
    }

    /// Tokens available for file content.
    pub fn budget(&self) -> usize {
        self.max_tokens.saturating_sub(self.reserved_tokens)
    }

    /// Select up to `max_files` full files within the budget.
    ///
    /// If the best readable candidate alone exceeds the budget and nothing has
    /// been accepted, it is truncated to the budget and becomes the only entry.
    pub fn build(
        &self,
        index: &FileIndexer,
        scorer: &RelevanceScorer,
        query: &str,
        explicit_files: &[std::path::PathBuf],
        max_files: usize,
    ) -> ContextPayload {
        let candidates = scorer.score(index, query, explicit_files, max_files.saturating_mul(2));
        let budget = self.budget();
        let mut payload = ContextPayload::new();
        let mut used = 0;

        for candidate in &candidates {
            if payload.len() >= max_files {
                break;
            }
            let Some(content) = self.read(&candidate.path) else {
                continue;
            };
            let tokens = estimate_tokens(&content);

            if used + tokens <= budget {
                used += tokens;
                payload.insert(key(index, &candidate.path), ContextEntry::Full(content));
            } else if payload.is_empty() {
                self.insert_truncated(&mut payload, index, &candidate.path, &content);
                break;
            }
        }

        payload
    }

    /// Like [`build`](Self::build), but candidates that miss the full-content
    /// cut are summarized when they score above [`SUMMARY_MIN_SCORE`].
    ///
    /// Scanning stops at the first candidate that is neither taken in full nor
    /// eligible for a summary. Summaries that do not fit the remaining budget are
    /// dropped. If nothing has been accepted when the best readable candidate
    /// fits neither way, it is truncated as in [`build`](Self::build).
    pub fn build_summarized(
        &self,
        index: &FileIndexer,
        scorer: &RelevanceScorer,
        query: &str,
        explicit_files: &[std::path::PathBuf],
        max_files: usize,
    ) -> ContextPayload {
        let candidates = scorer.score(index, query, explicit_files, max_files.saturating_mul(3));
        let budget = self.budget();
        let mut payload = ContextPayload::new();
        let mut used = 0;
        let mut full = 0;

        for candidate in &candidates {
            let Some(content) = self.read(&candidate.path) else {
                continue;
            };
            let tokens = estimate_tokens(&content);

            if full < max_files && used + tokens <= budget {
                used += tokens;
                full += 1;
                payload.insert(key(index, &candidate.path), ContextEntry::Full(content));
                continue;
            }

            let eligible = candidate.score > SUMMARY_MIN_SCORE;
            if eligible {
                let summary = summarize(&candidate.path, &content);
                let summary_tokens = estimate_tokens(&summary);
                if used + summary_tokens <= budget {
                    used += summary_tokens;
                    payload.insert(key(index, &candidate.path), ContextEntry::Summary(summary));
                    continue;
                }
            }

            if payload.is_empty() && max_files > 0 {
                self.insert_truncated(&mut payload, index, &candidate.path, &content);
                break;
            }
            if !eligible {
                break;
            }
        }

        payload
    }

    /// Size figures for `payload` against this builder's budget.
    pub fn stats(&self, payload: &ContextPayload) -> ContextStats {
        let characters = payload.characters();
        let tokens = characters / CHARS_PER_TOKEN;
        ContextStats {
            files: payload.len(),
            characters,
            tokens,
            tokens_remaining: self.budget().saturating_sub(tokens),
        }
    }

    fn insert_truncated(
        &self,
        payload: &mut ContextPayload,
        index: &FileIndexer,
        path: &Path,
        content: &str,
    ) {
        let budget = self.budget();
        let truncated: String = content
            .chars()
            .take(budget.saturating_mul(CHARS_PER_TOKEN))
            .collect();
        debug!(
            path = %path.display(),
            tokens = estimate_tokens(content),
            budget,
            "truncating oversized first file"
        );
        payload.insert(key(index, path), ContextEntry::Full(truncated));
    }

    fn read(&self, path: &Path) -> Option<String> {
        match self.source.read(path) {
            Ok(content) => Some(content),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping unreadable candidate");
                None
            }
        }
    }
}

fn key(index: &FileIndexer, path: &Path) -> String {
    index
        .relative_path(path)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

/// Deterministic summary: header lines, top-level definitions, and a marker
/// for the lines left out.
pub fn summarize(path: &Path, content: &str) -> String {
    let lines: Vec<&str> = content.split('\n').collect();
    let total = lines.len();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    let prefixes = definition_prefixes(Language::from_path(path));

    let mut parts = vec![
        format!("# {name}"),
        format!("# Total lines: {total}"),
        String::new(),
        "# Header:".to_string(),
        lines[..total.min(SUMMARY_HEADER_LINES)].join("\n"),
    ];

    let definitions: Vec<&str> = lines
        .iter()
        .filter(|line| prefixes.iter().any(|p| line.starts_with(p)))
        .map(|line| line.trim_end())
        .take(SUMMARY_MAX_DEFINITIONS)
        .collect();
    if !definitions.is_empty() {
        parts.push(String::new());
        parts.push("# Definitions:".to_string());
        parts.push(definitions.join("\n"));
    }

    if total > SUMMARY_HEADER_LINES {
        parts.push(String::new());
        parts.push(format!(
            "# ... ({} more lines)",
            total - SUMMARY_HEADER_LINES
        ));
    }

    parts.join("\n")
}

fn definition_prefixes(language: Option<Language>) -> &'static [&'static str] {
    match language {
        Some(Language::Python) => &["def ", "async def ", "class "],
        Some(Language::JavaScript | Language::TypeScript) => &[
            "function ",
            "async function ",
            "class ",
            "export function ",
            "export async function ",
            "export class ",
            "export default ",
            "export interface ",
            "interface ",
        ],
        Some(Language::Rust) => &[
            "fn ", "pub fn ", "async fn ", "pub async fn ", "struct ", "pub struct ", "enum ",
            "pub enum ", "trait ", "pub trait ", "impl",
        ],
        Some(Language::Go) => &["func ", "type "],
        Some(Language::Java) => &["public class ", "class ", "public interface ", "interface "],
        Some(Language::Cpp | Language::C) => &["struct ", "class ", "typedef "],
        None => &[],
    }
}
