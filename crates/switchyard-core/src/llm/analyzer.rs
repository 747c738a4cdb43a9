//! Task analysis — keyword heuristics that classify a query.
//!
//! Matching is on lowercase substrings, so "fix" also fires inside "prefix".

use std::fmt;

use serde::{Deserialize, Serialize};

/// What kind of work a query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    CodeGeneration,
    Debugging,
    Explanation,
    Refactoring,
    Testing,
    Documentation,
}

impl TaskType {
    /// All types, in tie-break order.
    pub const ALL: [TaskType; 6] = [
        TaskType::CodeGeneration,
        TaskType::Debugging,
        TaskType::Explanation,
        TaskType::Refactoring,
        TaskType::Testing,
        TaskType::Documentation,
    ];

    /// Keywords whose presence votes for this type.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            TaskType::CodeGeneration => &["create", "generate", "write", "build", "make", "add"],
            TaskType::Debugging => &["fix", "debug", "error", "bug", "issue", "problem"],
            TaskType::Explanation => &["explain", "describe", "how", "what", "why"],
            TaskType::Refactoring => &["refactor", "improve", "optimize", "clean", "restructure"],
            TaskType::Testing => &["test", "testing", "coverage", "spec"],
            TaskType::Documentation => &["document", "doc", "comment", "readme"],
        }
    }

    /// Complexity before length and keyword adjustments.
    pub fn base_complexity(self) -> f64 {
        match self {
            TaskType::CodeGeneration => 40.0,
            TaskType::Debugging => 60.0,
            TaskType::Explanation => 30.0,
            TaskType::Refactoring => 70.0,
            TaskType::Testing => 50.0,
            TaskType::Documentation => 25.0,
        }
    }

    /// System prompt used when the caller supplies none.
    pub fn system_prompt(self) -> &'static str {
        match self {
            TaskType::CodeGeneration => {
                "You are an expert software engineer. Write complete, working code that \
                 follows the conventions of the surrounding project."
            }
            TaskType::Debugging => {
                "You are an expert debugger. Identify the root cause before proposing a fix, \
                 and keep the fix minimal."
            }
            TaskType::Explanation => {
                "You are a patient senior engineer. Explain the code clearly and accurately, \
                 referring to the files provided."
            }
            TaskType::Refactoring => {
                "You are an expert at refactoring. Preserve behavior exactly while improving \
                 structure and readability."
            }
            TaskType::Testing => {
                "You are an expert in software testing. Write focused tests that cover edge \
                 cases and failure paths."
            }
            TaskType::Documentation => {
                "You are a technical writer. Produce accurate, concise documentation that \
                 matches the code as written."
            }
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskType::CodeGeneration => "code-generation",
            TaskType::Debugging => "debugging",
            TaskType::Explanation => "explanation",
            TaskType::Refactoring => "refactoring",
            TaskType::Testing => "testing",
            TaskType::Documentation => "documentation",
        };
        f.write_str(s)
    }
}

/// Bucketed size of the context available to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextSize {
    Small,
    Medium,
    Large,
}

impl ContextSize {
    pub fn from_tokens(tokens: usize) -> Self {
        if tokens < 4_000 {
            ContextSize::Small
        } else if tokens < 32_000 {
            ContextSize::Medium
        } else {
            ContextSize::Large
        }
    }
}

/// How much reasoning the task likely needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReasoningDepth {
    Surface,
    StepByStep,
    Deep,
}

/// Result of [`TaskAnalyzer::analyze`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskComplexity {
    /// 0–100.
    pub score: f64,
    pub task_type: TaskType,
    pub context_size: ContextSize,
    pub reasoning_depth: ReasoningDepth,
}

const COMPLEXITY_KEYWORDS: &[&str] = &["complex", "multiple", "all", "entire", "refactor", "migrate"];
const COMPLEXITY_KEYWORD_BONUS: f64 = 10.0;
const LENGTH_BONUS_MAX: f64 = 20.0;
const LENGTH_BONUS_WORDS: f64 = 50.0;
const MAX_COMPLEXITY: f64 = 100.0;

/// Stateless query classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskAnalyzer;

impl TaskAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, query: &str, available_context_tokens: usize) -> TaskComplexity {
        let query = query.to_lowercase();
        let task_type = classify(&query);
        let score = complexity(&query, task_type);

        let reasoning_depth = if score > 80.0
            || matches!(task_type, TaskType::Refactoring | TaskType::Debugging)
        {
            ReasoningDepth::Deep
        } else if score > 50.0 {
            ReasoningDepth::StepByStep
        } else {
            ReasoningDepth::Surface
        };

        TaskComplexity {
            score,
            task_type,
            context_size: ContextSize::from_tokens(available_context_tokens),
            reasoning_depth,
        }
    }
}

/// Type with the most keyword hits; earlier types win ties.
fn classify(query: &str) -> TaskType {
    let mut best = (TaskType::CodeGeneration, 0);
    for task_type in TaskType::ALL {
        let hits = task_type
            .keywords()
            .iter()
            .filter(|k| query.contains(*k))
            .count();
        if hits > best.1 {
            best = (task_type, hits);
        }
    }
    best.0
}

fn complexity(query: &str, task_type: TaskType) -> f64 {
    let words = query.split_whitespace().count() as f64;
    let length_bonus = (words / LENGTH_BONUS_WORDS).min(1.0) * LENGTH_BONUS_MAX;
    let keyword_bonus = COMPLEXITY_KEYWORDS
        .iter()
        .filter(|k| query.contains(*k))
        .count() as f64
        * COMPLEXITY_KEYWORD_BONUS;
    (task_type.base_complexity() + length_bonus + keyword_bonus).min(MAX_COMPLEXITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn analyze(query: &str) -> TaskComplexity {
        TaskAnalyzer::new().analyze(query, 0)
    }

    #[test]
    fn test_refactor_across_project() {
        let c = analyze("refactor the entire authentication module across all files");
        assert_eq!(c.task_type, TaskType::Refactoring);
        assert!(c.score >= 70.0);
        assert_eq!(c.score, 100.0);
        assert_eq!(c.reasoning_depth, ReasoningDepth::Deep);
    }

    #[test]
    fn test_classification_buckets() {
        assert_eq!(analyze("fix the login bug").task_type, TaskType::Debugging);
        assert_eq!(analyze("explain this function").task_type, TaskType::Explanation);
        assert_eq!(analyze("increase coverage of the parser").task_type, TaskType::Testing);
        assert_eq!(analyze("update the readme").task_type, TaskType::Documentation);
        assert_eq!(analyze("create a cli").task_type, TaskType::CodeGeneration);
    }

    #[test]
    fn test_no_keywords_defaults_to_code_generation() {
        let c = analyze("hello there");
        assert_eq!(c.task_type, TaskType::CodeGeneration);
        // 40 base + 2/50*20 length
        assert!((c.score - 40.8).abs() < 1e-9);
        assert_eq!(c.reasoning_depth, ReasoningDepth::Surface);
    }

    #[test]
    fn test_ties_follow_bucket_order() {
        // one code-generation hit ("write"), one testing hit ("test")
        assert_eq!(analyze("write a test").task_type, TaskType::CodeGeneration);
        // one debugging hit ("error"), one explanation hit ("why")
        assert_eq!(analyze("why this error").task_type, TaskType::Debugging);
    }

    #[test]
    fn test_length_bonus_caps_at_twenty() {
        let long = vec!["word"; 200].join(" ");
        let c = analyze(&long);
        assert_eq!(c.score, 60.0);
        assert_eq!(c.reasoning_depth, ReasoningDepth::StepByStep);
    }

    #[test]
    fn test_context_size_buckets() {
        let analyzer = TaskAnalyzer::new();
        assert_eq!(analyzer.analyze("q", 3_999).context_size, ContextSize::Small);
        assert_eq!(analyzer.analyze("q", 4_000).context_size, ContextSize::Medium);
        assert_eq!(analyzer.analyze("q", 31_999).context_size, ContextSize::Medium);
        assert_eq!(analyzer.analyze("q", 32_000).context_size, ContextSize::Large);
    }

    #[test]
    fn test_debugging_is_always_deep() {
        let c = analyze("bug");
        assert_eq!(c.task_type, TaskType::Debugging);
        assert!(c.score < 80.0);
        assert_eq!(c.reasoning_depth, ReasoningDepth::Deep);
    }

    #[test]
    fn test_display() {
        assert_eq!(TaskType::CodeGeneration.to_string(), "code-generation");
        assert_eq!(TaskType::Refactoring.to_string(), "refactoring");
    }
}
