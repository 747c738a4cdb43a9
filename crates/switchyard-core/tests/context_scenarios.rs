//! End-to-end context scenarios over real temp projects.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use pretty_assertions::assert_eq;
use switchyard_config::{AppConfig, ContextConfig};
use switchyard_core::context::{
    ContextBuilder, ContextEngine, ContextError, ExcludeRules, FileIndexer, RelevanceScorer,
    ScoreReason, estimate_tokens,
};
use switchyard_test_utils::{TestConfigBuilder, TestProject};

fn indexed(project: &TestProject) -> FileIndexer {
    let mut indexer = FileIndexer::new(project.root(), ExcludeRules::default()).unwrap();
    indexer.index().unwrap();
    indexer
}

#[test_log::test]
fn test_forward_dependency_outranks_unrelated_file() {
    let project = TestProject::with_files(&[
        ("a.py", "import b\n\ndef main():\n    b.run()\n"),
        ("b.py", "def run():\n    pass\n"),
        ("c.py", "def other():\n    pass\n"),
    ]);
    let index = indexed(&project);

    let scores = RelevanceScorer::new().score(&index, "fix b", &[PathBuf::from("a.py")], 10);
    let rank = |name: &str| scores.iter().position(|s| s.path == project.path(name));

    assert_eq!(rank("a.py"), Some(0));
    assert!(rank("b.py").unwrap() < rank("c.py").unwrap());

    let b = &scores[rank("b.py").unwrap()];
    assert!(b.reasons.contains(&ScoreReason::ForwardDependency));
    assert!(b.reasons.contains(&ScoreReason::NameSimilarity));
    let c = &scores[rank("c.py").unwrap()];
    assert!(b.score - c.score >= 50.0);
}

#[test_log::test]
fn test_scores_are_positive_sorted_and_bounded() {
    let project = TestProject::new();
    for i in 0..12 {
        project.write(&format!("pkg/mod_{i}.py"), format!("import pkg.mod_{}\n", (i + 1) % 12));
    }
    let index = indexed(&project);
    let scorer = RelevanceScorer::new();
    let explicit = [PathBuf::from("pkg/mod_3.py")];

    for (query, max) in [("mod", 5), ("pkg mod 7", 20), ("", 3), ("nothing here", 50)] {
        let scores = scorer.score(&index, query, &explicit, max);
        assert!(scores.len() <= max);
        assert!(scores.iter().all(|s| s.score > 0.0));
        assert!(scores.windows(2).all(|w| w[0].score >= w[1].score));
    }
}

#[test_log::test]
fn test_stale_files_without_signals_are_dropped() {
    let project = TestProject::with_files(&[("old.txt", "x"), ("notes.txt", "y")]);
    let index = indexed(&project);
    let later = SystemTime::now() + Duration::from_secs(90 * 24 * 60 * 60);

    let scores = RelevanceScorer::new().score_at(&index, "notes", &[], 10, later);
    assert_eq!(scores.len(), 1);
    assert!(scores[0].path.ends_with("notes.txt"));
}

#[test_log::test]
fn test_dependencies_are_local_files_only() {
    let project = TestProject::with_files(&[
        (
            "app/main.py",
            "import os\nimport numpy as np\nfrom app.models import User\nimport app.services.billing\n",
        ),
        ("app/models.py", ""),
        ("app/services/billing.py", ""),
        ("web/index.ts", "import { h } from 'preact';\nimport { api } from './api';\n"),
        ("web/api.ts", "export function api() {}\n"),
    ]);
    let index = indexed(&project);

    let deps = index.get_dependencies(Path::new("app/main.py"));
    assert_eq!(
        deps,
        vec![
            project.path("app/models.py"),
            project.path("app/services/billing.py")
        ]
    );
    assert!(deps.iter().all(|d| index.contains(d)));

    let deps = index.get_dependencies(Path::new("web/index.ts"));
    assert_eq!(deps, vec![project.path("web/api.ts")]);
}

#[test_log::test]
fn test_budget_admits_first_file_only() {
    let project = TestProject::new()
        .file("first.txt", "a".repeat(3000))
        .file("second.txt", "b".repeat(2000));
    let index = indexed(&project);
    let builder = ContextBuilder::new(3000, 2000);
    let mut scorer = RelevanceScorer::new();
    scorer.add_focus_file(PathBuf::from("first.txt"));

    let payload = builder.build(&index, &scorer, "", &[], 10);
    assert_eq!(payload.paths().collect::<Vec<_>>(), vec!["first.txt"]);

    let stats = builder.stats(&payload);
    assert_eq!(stats.tokens, 750);
    assert!(stats.tokens <= builder.budget());
}

#[test_log::test]
fn test_truncation_escape_is_the_only_overrun() {
    let project = TestProject::new().file("only.md", "z".repeat(50_000));
    let index = indexed(&project);
    let builder = ContextBuilder::new(3000, 2000);

    let payload = builder.build(&index, &RelevanceScorer::new(), "", &[], 10);
    let text = payload.get("only.md").unwrap().text();
    assert_eq!(estimate_tokens(text), builder.budget());
}

#[test_log::test]
fn test_engine_end_to_end() {
    let project = TestProject::with_files(&[
        ("src/auth/login.py", "from src.auth import session\n\ndef login():\n    pass\n"),
        ("src/auth/session.py", "class Session:\n    pass\n"),
        ("src/billing/invoice.py", "def total():\n    return 0\n"),
        ("build/generated.py", "x = 1\n"),
    ]);
    let config = TestConfigBuilder::new().max_files(2).build();
    let mut engine = ContextEngine::open(project.root(), &config.context).unwrap();

    assert_eq!(engine.last_report().indexed, 3);
    let payload = engine
        .get_context("login session", &[PathBuf::from("src/auth/login.py")], false)
        .unwrap();
    assert_eq!(
        payload.paths().collect::<Vec<_>>(),
        vec!["src/auth/login.py", "src/auth/session.py"]
    );

    let summarized = engine
        .get_context("login session", &[PathBuf::from("src/auth/login.py")], true)
        .unwrap();
    assert!(summarized.len() >= payload.len());
}

#[test_log::test]
fn test_engine_reports_empty_context() {
    let project = TestProject::new();
    let mut engine = ContextEngine::open(project.root(), &ContextConfig::default()).unwrap();
    assert!(matches!(
        engine.get_context("anything", &[], false),
        Err(ContextError::Empty { .. })
    ));
}

#[tokio::test]
async fn test_engine_from_config_file() {
    let project = TestProject::with_files(&[
        ("src/app.py", "def run():\n    pass\n"),
        ("fixtures/data.py", "x = 1\n"),
        ("stale.py", "y = 2\n"),
    ]);
    let path = project
        .write_config("[context]\nmax_files = 5\nexclude = [\"fixtures\"]\nuse_summaries = true\n")
        .await;
    let config = AppConfig::load(&path).await.unwrap();
    assert!(config.context.use_summaries);

    let mut engine = ContextEngine::open(project.root(), &config.context).unwrap();
    assert!(engine.file_record(Path::new("fixtures/data.py")).is_none());
    assert!(engine.file_record(Path::new("src/app.py")).is_some());

    project.remove("stale.py");
    // src/app.py and switchyard.toml remain
    assert_eq!(engine.refresh().unwrap().indexed, 2);
    assert!(engine.file_record(Path::new("stale.py")).is_none());

    let payload = engine
        .get_context("run app", &[], config.context.use_summaries)
        .unwrap();
    assert_eq!(payload.paths().next(), Some("src/app.py"));
}
