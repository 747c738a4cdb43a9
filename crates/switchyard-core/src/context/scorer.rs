//! Relevance scoring — rank indexed files against a query.
//!
//! Each file's score is the sum of independent weighted signals (see
//! [`ScoreWeights`]). Files scoring zero are dropped; the rest are ordered by
//! descending score with ascending path as the tiebreaker.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use super::indexer::{FileIndexer, FileRecord};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Weights of the scoring signals.
///
/// The forward dependency weight is twice the reverse one: a file the explicit
/// files import is more likely needed than a file that imports them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// File is in the caller's explicit set.
    pub explicit: f64,
    /// File is imported by an explicit file.
    pub forward_dependency: f64,
    /// File imports an explicit file.
    pub reverse_dependency: f64,
    /// Modified within the last 24 hours.
    pub modified_day: f64,
    /// Modified within the last 7 days.
    pub modified_week: f64,
    /// Modified within the last 30 days.
    pub modified_month: f64,
    /// Maximum name-similarity bonus, scaled by the fraction of query words matched.
    pub name_similarity: f64,
    /// Shares a parent directory with an explicit file.
    pub same_directory: f64,
    /// Marked as a focus file.
    pub focus: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            explicit: 100.0,
            forward_dependency: 50.0,
            reverse_dependency: 25.0,
            modified_day: 30.0,
            modified_week: 15.0,
            modified_month: 6.0,
            name_similarity: 20.0,
            same_directory: 10.0,
            focus: 20.0,
        }
    }
}

/// Why a file received points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreReason {
    ExplicitMention,
    ForwardDependency,
    ReverseDependency,
    RecentlyModified,
    NameSimilarity,
    SameDirectory,
    FocusFile,
}

impl fmt::Display for ScoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreReason::ExplicitMention => write!(f, "explicitly mentioned"),
            ScoreReason::ForwardDependency => write!(f, "imported by an explicit file"),
            ScoreReason::ReverseDependency => write!(f, "imports an explicit file"),
            ScoreReason::RecentlyModified => write!(f, "recently modified"),
            ScoreReason::NameSimilarity => write!(f, "name similarity"),
            ScoreReason::SameDirectory => write!(f, "same directory"),
            ScoreReason::FocusFile => write!(f, "user focus file"),
        }
    }
}

/// The score of one file for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceScore {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Summed signal weights. Always positive in scorer output.
    pub score: f64,
    /// Signals that contributed, in evaluation order.
    pub reasons: Vec<ScoreReason>,
}

/// Scores indexed files; holds the caller-managed focus set.
#[derive(Debug, Clone, Default)]
pub struct RelevanceScorer {
    weights: ScoreWeights,
    focus: BTreeSet<PathBuf>,
}

impl RelevanceScorer {
    /// Create a scorer with the default weights.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scorer with custom weights.
    pub fn with_weights(weights: ScoreWeights) -> Self {
        Self {
            weights,
            focus: BTreeSet::new(),
        }
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Mark a file as one the user keeps returning to.
    pub fn add_focus_file(&mut self, path: PathBuf) {
        self.focus.insert(path);
    }

    /// Forget all focus files.
    pub fn clear_focus_files(&mut self) {
        self.focus.clear();
    }

    /// Current focus set.
    pub fn focus_files(&self) -> impl Iterator<Item = &Path> {
        self.focus.iter().map(PathBuf::as_path)
    }

    /// Score every indexed file against `query`, as of now.
    pub fn score(
        &self,
        index: &FileIndexer,
        query: &str,
        explicit_files: &[PathBuf],
        max_results: usize,
    ) -> Vec<RelevanceScore> {
        self.score_at(index, query, explicit_files, max_results, SystemTime::now())
    }

    /// Score every indexed file against `query`, measuring recency from `now`.
    ///
    /// Relative explicit and focus paths are resolved against the index root.
    pub fn score_at(
        &self,
        index: &FileIndexer,
        query: &str,
        explicit_files: &[PathBuf],
        max_results: usize,
        now: SystemTime,
    ) -> Vec<RelevanceScore> {
        let explicit: HashSet<PathBuf> = explicit_files
            .iter()
            .map(|p| index.resolve_path(p))
            .collect();
        let focus: HashSet<PathBuf> = self.focus.iter().map(|p| index.resolve_path(p)).collect();
        let explicit_parents: HashSet<&Path> = explicit.iter().filter_map(|p| p.parent()).collect();
        let imported_by_explicit: HashSet<PathBuf> = explicit
            .iter()
            .flat_map(|p| index.get_dependencies(p))
            .collect();

        let query_lower = query.to_lowercase();
        let query_words: HashSet<&str> = query_lower.split_whitespace().collect();

        let mut scores: Vec<RelevanceScore> = index
            .records()
            .filter_map(|record| {
                let mut score = 0.0;
                let mut reasons = Vec::new();
                let mut add = |points: f64, reason: ScoreReason| {
                    if points > 0.0 {
                        score += points;
                        reasons.push(reason);
                    }
                };

                let path = &record.path;
                if explicit.contains(path) {
                    add(self.weights.explicit, ScoreReason::ExplicitMention);
                }
                if imported_by_explicit.contains(path) {
                    add(
                        self.weights.forward_dependency,
                        ScoreReason::ForwardDependency,
                    );
                }
                if !explicit.is_empty()
                    && index
                        .get_dependencies(path)
                        .iter()
                        .any(|dep| explicit.contains(dep))
                {
                    add(
                        self.weights.reverse_dependency,
                        ScoreReason::ReverseDependency,
                    );
                }
                add(self.recency(record, now), ScoreReason::RecentlyModified);
                add(
                    self.name_similarity(path, &query_words),
                    ScoreReason::NameSimilarity,
                );
                if path
                    .parent()
                    .is_some_and(|parent| explicit_parents.contains(parent))
                {
                    add(self.weights.same_directory, ScoreReason::SameDirectory);
                }
                if focus.contains(path) {
                    add(self.weights.focus, ScoreReason::FocusFile);
                }

                (score > 0.0).then(|| RelevanceScore {
                    path: path.clone(),
                    score,
                    reasons,
                })
            })
            .collect();

        scores.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.path.cmp(&b.path)));
        scores.truncate(max_results);
        scores
    }

    fn recency(&self, record: &FileRecord, now: SystemTime) -> f64 {
        // Modification times in the future count as fresh.
        let age = now.duration_since(record.modified).unwrap_or_default();
        if age < DAY {
            self.weights.modified_day
        } else if age < DAY * 7 {
            self.weights.modified_week
        } else if age < DAY * 30 {
            self.weights.modified_month
        } else {
            0.0
        }
    }

    /// Fraction of query words found among the file stem's `_`/`-` separated
    /// words, scaled to the name-similarity weight.
    fn name_similarity(&self, path: &Path, query_words: &HashSet<&str>) -> f64 {
        if query_words.is_empty() {
            return 0.0;
        }
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_lowercase();
        let mut file_words: HashSet<&str> = stem.split(['_', '-']).collect();
        file_words.insert(stem.as_str());

        let matches = query_words.intersection(&file_words).count();
        self.weights.name_similarity * matches as f64 / query_words.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::indexer::ExcludeRules;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const YEAR: Duration = Duration::from_secs(365 * 24 * 60 * 60);

    fn project(files: &[(&str, &str)]) -> (TempDir, FileIndexer) {
        let dir = TempDir::new().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        let mut indexer = FileIndexer::new(dir.path(), ExcludeRules::default()).unwrap();
        indexer.index().unwrap();
        (dir, indexer)
    }

    /// A clock far enough ahead that no file earns recency points.
    fn stale_clock() -> SystemTime {
        SystemTime::now() + YEAR
    }

    fn score_of<'a>(scores: &'a [RelevanceScore], index: &FileIndexer, rel: &str) -> Option<&'a RelevanceScore> {
        let path = index.resolve_path(Path::new(rel));
        scores.iter().find(|s| s.path == path)
    }

    #[test]
    fn test_zero_scores_are_excluded() {
        let (_dir, index) = project(&[("a.py", "x = 1\n"), ("b.py", "y = 2\n")]);
        let scores = RelevanceScorer::new().score_at(&index, "unrelated words", &[], 10, stale_clock());
        assert!(scores.is_empty());
    }

    #[test]
    fn test_explicit_and_dependency_weights() {
        let (_dir, index) = project(&[
            ("a.py", "import b\n"),
            ("b.py", "x = 1\n"),
            ("c.py", "import a\n"),
            ("sub/d.py", "y = 2\n"),
        ]);
        let scorer = RelevanceScorer::new();
        let scores = scorer.score_at(&index, "", &[PathBuf::from("a.py")], 10, stale_clock());

        let a = score_of(&scores, &index, "a.py").unwrap();
        assert_eq!(a.score, 100.0 + 10.0);
        assert_eq!(a.reasons, vec![ScoreReason::ExplicitMention, ScoreReason::SameDirectory]);

        // Forward (50) and reverse (25) keep their 2:1 ratio.
        let b = score_of(&scores, &index, "b.py").unwrap();
        assert_eq!(b.score, 50.0 + 10.0);
        assert!(b.reasons.contains(&ScoreReason::ForwardDependency));

        let c = score_of(&scores, &index, "c.py").unwrap();
        assert_eq!(c.score, 25.0 + 10.0);
        assert!(c.reasons.contains(&ScoreReason::ReverseDependency));

        assert!(score_of(&scores, &index, "sub/d.py").is_none());
    }

    #[test]
    fn test_recency_tiers() {
        let (_dir, index) = project(&[("a.txt", "x")]);
        let scorer = RelevanceScorer::new();
        let modified = index.records().next().unwrap().modified;

        let at = |offset: Duration| {
            scorer
                .score_at(&index, "", &[], 10, modified + offset)
                .first()
                .map(|s| s.score)
        };
        assert_eq!(at(Duration::from_secs(60)), Some(30.0));
        assert_eq!(at(DAY * 3), Some(15.0));
        assert_eq!(at(DAY * 20), Some(6.0));
        assert_eq!(at(DAY * 45), None);
    }

    #[test]
    fn test_name_similarity_is_linear_in_match_ratio() {
        let (_dir, index) = project(&[("user_auth.py", ""), ("billing.py", "")]);
        let scorer = RelevanceScorer::new();

        let scores = scorer.score_at(&index, "fix user auth flow", &[], 10, stale_clock());
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].score, 20.0 * 2.0 / 4.0);
        assert_eq!(scores[0].reasons, vec![ScoreReason::NameSimilarity]);

        let scores = scorer.score_at(&index, "Billing", &[], 10, stale_clock());
        assert_eq!(scores[0].score, 20.0);
    }

    #[test]
    fn test_focus_files() {
        let (_dir, index) = project(&[("notes.md", "")]);
        let mut scorer = RelevanceScorer::new();
        scorer.add_focus_file(PathBuf::from("notes.md"));

        let scores = scorer.score_at(&index, "", &[], 10, stale_clock());
        assert_eq!(scores[0].score, 20.0);
        assert_eq!(scores[0].reasons, vec![ScoreReason::FocusFile]);

        scorer.clear_focus_files();
        assert!(scorer.score_at(&index, "", &[], 10, stale_clock()).is_empty());
    }

    #[test]
    fn test_ordering_and_truncation() {
        let (_dir, index) = project(&[
            ("zeta.py", ""),
            ("alpha.py", ""),
            ("mid.py", ""),
            ("other.py", ""),
        ]);
        let mut scorer = RelevanceScorer::new();
        scorer.add_focus_file(PathBuf::from("mid.py"));

        // zeta and alpha tie on name similarity; mid adds a focus bonus
        let scores = scorer.score_at(&index, "zeta alpha mid", &[], 3, stale_clock());
        assert_eq!(scores.len(), 3);
        assert!(scores[0].path.ends_with("mid.py"));
        assert!(scores[1].path.ends_with("alpha.py"));
        assert!(scores[2].path.ends_with("zeta.py"));
        assert!(scores.windows(2).all(|w| w[0].score >= w[1].score));

        let limited = scorer.score_at(&index, "zeta alpha mid", &[], 1, stale_clock());
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_custom_weights() {
        let (_dir, index) = project(&[("a.py", "")]);
        let scorer = RelevanceScorer::with_weights(ScoreWeights {
            explicit: 7.0,
            same_directory: 0.0,
            ..ScoreWeights::default()
        });
        let scores = scorer.score_at(&index, "", &[PathBuf::from("a.py")], 10, stale_clock());
        assert_eq!(scores[0].score, 7.0);
        assert_eq!(scores[0].reasons, vec![ScoreReason::ExplicitMention]);
    }
}
