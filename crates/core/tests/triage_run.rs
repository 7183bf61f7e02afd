use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use gray_sweep_core::{
    run_triage_with_source, AppClass, IgnoreReason, StaticPackages, TriageConfig, TriageOptions,
    TriagePhase, TriageReport,
};
use walkdir::WalkDir;

fn build_fixture(root: &Path) {
    for dir in [
        "Applications/Foo.app/Contents",
        "Applications/Safari.app",
        "Applications/Mine.app",
        "Applications/Utilities/Terminal.app",
        "Users/alice/Desktop/projects",
        "Users/alice/Music/Logic",
        "Users/alice/Library/Application Support/com.apple.sharedfilelist",
        "Users/alice/Library/Application Support/Slack/logs",
        "Users/alice/Library/Caches/com.foo",
        "Users/alice/.Trash/old",
        "Users/Shared/junk",
        "data/stuff",
        "System/Library",
    ] {
        fs::create_dir_all(root.join(dir)).expect("create dir");
    }
    fs::write(root.join("Users/alice/Desktop/notes.txt"), "hello").expect("write");
    fs::write(root.join("Users/alice/Desktop/projects/plan.md"), "abc").expect("write");
    fs::write(root.join("Users/alice/Desktop/.DS_Store"), "zz").expect("write");
}

fn options(root: &Path) -> TriageOptions {
    TriageOptions {
        config: TriageConfig {
            package_manager: None,
            ..TriageConfig::with_root(root)
        },
        run_id: Some("fixture".to_string()),
        ..TriageOptions::default()
    }
}

fn packages() -> StaticPackages {
    StaticPackages {
        casks: vec!["foo".to_string()],
        formulas: vec!["wget".to_string()],
    }
}

fn run(root: &Path) -> TriageReport {
    run_triage_with_source(&options(root), &packages(), |_| {}).expect("triage succeeds")
}

fn ignored_reason(report: &TriageReport, path: &Path) -> Option<IgnoreReason> {
    let wanted = path.to_string_lossy();
    report
        .ignored
        .iter()
        .find(|item| item.path == wanted)
        .map(|item| item.reason)
}

#[test]
fn managed_bundle_is_registered_once_and_not_regrayed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    build_fixture(root);

    let report = run(root);

    let managed = &report.applications.managed;
    assert_eq!(managed.len(), 1);
    assert_eq!(managed[0].name, "Foo.app");
    assert_eq!(managed[0].class, AppClass::Managed);
    assert_eq!(report.applications.custom.len(), 1);
    assert_eq!(report.applications.custom[0].name, "Mine.app");
    assert_eq!(
        ignored_reason(&report, &root.join("Applications/Safari.app")),
        Some(IgnoreReason::DefaultApplication)
    );
    assert_eq!(report.managed_formulas, vec!["wget".to_string()]);

    let foo = root.join("Applications/Foo.app");
    let foo = foo.to_string_lossy();
    assert_eq!(
        report
            .recorded_paths()
            .iter()
            .filter(|path| path.starts_with(foo.as_ref()))
            .count(),
        1
    );
    assert!(report.coverage_overlaps().is_empty());

    let utilities = root.join("Applications/Utilities");
    let utilities = utilities.to_string_lossy().to_string();
    let listing = report
        .top_level_gray
        .get(&utilities)
        .expect("unclaimed applications subfolder found by the crawl");
    assert_eq!(listing.entries, vec!["Terminal.app".to_string()]);
}

#[test]
fn passes_route_every_directory_to_its_category() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    build_fixture(root);

    let report = run(root);
    assert_eq!(report.run.owners, vec!["alice".to_string()]);
    assert!(!report.run.cancelled);

    let desktop = &report.manual_summaries["alice"][0];
    assert_eq!(desktop.folder, "Desktop");
    assert_eq!(desktop.immediate_entries, 2);
    assert_eq!(desktop.file_count, 2);
    assert_eq!(desktop.total_bytes, 8);

    let labels = report.owner_gray["alice"]
        .iter()
        .map(|listing| listing.label.as_str())
        .collect::<Vec<_>>();
    assert_eq!(labels, vec!["Library/Application Support/Slack", "Music"]);

    let home = root.join("Users/alice");
    assert_eq!(
        ignored_reason(&report, &home.join("Library/Caches")),
        Some(IgnoreReason::Noise)
    );
    assert_eq!(
        ignored_reason(&report, &home.join("Library/Application Support/com.apple.sharedfilelist")),
        Some(IgnoreReason::ExcludedFolder)
    );
    assert_eq!(
        ignored_reason(&report, &home.join(".Trash")),
        Some(IgnoreReason::ExcludedFolder)
    );
    assert_eq!(
        ignored_reason(&report, &root.join("Users/Shared")),
        Some(IgnoreReason::SkippedAccount)
    );
    assert_eq!(
        ignored_reason(&report, &root.join("System")),
        Some(IgnoreReason::ExcludedRoot)
    );

    let data = root.join("data").to_string_lossy().to_string();
    assert_eq!(report.top_level_gray[&data].entries, vec!["stuff".to_string()]);
    assert_eq!(report.metrics.records as usize, report.record_count());
    assert_eq!(report.metrics.registered_paths as usize, report.record_count());
}

#[test]
fn every_directory_is_covered_exactly_once_or_drilled() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    build_fixture(root);

    let report = run(root);
    let recorded = report
        .recorded_paths()
        .into_iter()
        .map(PathBuf::from)
        .collect::<Vec<_>>();
    assert!(report.coverage_overlaps().is_empty());

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.expect("walk fixture");
        if !entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        let covering = recorded
            .iter()
            .filter(|record| path.starts_with(record))
            .count();
        assert!(covering <= 1, "{} covered {covering} times", path.display());
        if covering == 0 {
            assert!(
                recorded
                    .iter()
                    .any(|record| record.starts_with(path) && record.as_path() != path),
                "{} neither recorded nor drilled",
                path.display()
            );
        }
    }
}

#[test]
fn progress_events_walk_the_phases_in_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    build_fixture(root);

    let mut options = options(root);
    options.emit_progress_events = true;
    let mut events = Vec::new();
    let report = run_triage_with_source(&options, &packages(), |event| events.push(event))
        .expect("triage succeeds");

    assert_eq!(events.first().map(|event| &event.phase), Some(&TriagePhase::ResolvingRoot));
    assert_eq!(events.last().map(|event| &event.phase), Some(&TriagePhase::Done));
    assert!(events.iter().any(|event| event.phase == TriagePhase::Crawling));
    assert!(events.windows(2).all(|pair| pair[0].seq < pair[1].seq));
    assert!(events.iter().all(|event| event.run_id == "fixture"));
    assert_eq!(report.progress_summary.total_events, events.len() as u64);
    assert!(report.progress_summary.completed);
}

#[test]
fn cancellation_before_the_passes_yields_partial_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    build_fixture(root);

    let mut options = options(root);
    options.cancel_flag = Some(Arc::new(AtomicBool::new(true)));
    let report =
        run_triage_with_source(&options, &packages(), |_| {}).expect("triage returns partial");

    assert!(report.run.cancelled);
    assert_eq!(report.record_count(), 0);
    assert!(report
        .warnings
        .iter()
        .any(|warning| warning.contains("canceled")));
}

#[test]
fn missing_root_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = run_triage_with_source(&options(&dir.path().join("absent")), &packages(), |_| {});
    assert!(result.is_err());
}
