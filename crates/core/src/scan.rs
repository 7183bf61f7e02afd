use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use chrono::{SecondsFormat, Utc};
use tracing::info;
use uuid::Uuid;

use crate::config::TriageConfig;
use crate::crawl::{Crawl, CrawlStats};
use crate::ledger::{display_path, Ledger};
use crate::model::{
    AppClass, ClassificationRecord, PhaseCount, ProgressSummary, RunMetadata, RunMetrics,
    TriageEvent, TriagePhase, TriageReport, REPORT_VERSION,
};
use crate::packages::{BrewCli, PackageCategory, PackageSource, StaticPackages};
use crate::registry::normalize;
use crate::rules::RuleSet;
use crate::summarize::{
    discover_owners, ignore_user_folders, scan_secondary_folders, scan_top_level,
    summarize_applications, summarize_included_folders,
};

#[derive(Debug, Clone)]
pub struct TriageOptions {
    pub config: TriageConfig,
    pub run_id: Option<String>,
    pub progress: bool,
    pub emit_progress_events: bool,
    pub cancel_flag: Option<Arc<AtomicBool>>,
}

impl Default for TriageOptions {
    fn default() -> Self {
        Self {
            config: TriageConfig::default(),
            run_id: None,
            progress: false,
            emit_progress_events: false,
            cancel_flag: None,
        }
    }
}

pub struct TriageRunOutput {
    pub report: TriageReport,
    pub events: Vec<TriageEvent>,
}

pub fn run_triage(options: &TriageOptions) -> Result<TriageReport> {
    run_triage_with_callback(options, |_| {})
}

pub fn run_triage_with_events(options: &TriageOptions) -> Result<TriageRunOutput> {
    let mut events = Vec::new();
    let report = run_triage_with_callback(options, |event| events.push(event))?;
    Ok(TriageRunOutput { report, events })
}

pub fn run_triage_with_callback<F>(options: &TriageOptions, on_event: F) -> Result<TriageReport>
where
    F: FnMut(TriageEvent),
{
    match &options.config.package_manager {
        Some(program) => run_triage_with_source(options, &BrewCli::new(program.clone()), on_event),
        None => run_triage_with_source(options, &StaticPackages::default(), on_event),
    }
}

pub fn run_triage_with_source<F>(
    options: &TriageOptions,
    packages: &dyn PackageSource,
    on_event: F,
) -> Result<TriageReport>
where
    F: FnMut(TriageEvent),
{
    let started = Instant::now();
    let run_id = options
        .run_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let mut progress = ProgressEmitter {
        enabled: options.emit_progress_events,
        on_event,
        run_id: run_id.clone(),
        total_events: 0,
        phase_counts: HashMap::new(),
    };

    let mut config = options.config.clone();
    config.validate().context("invalid triage configuration")?;
    config.root = resolve_root(&config.root)?;

    let mut warnings = Vec::new();
    let rules = RuleSet::from_config(&config, &mut warnings);
    let mut ledger = Ledger::with_warnings(warnings);
    progress.emit(TriagePhase::ResolvingRoot, Some(display_path(&config.root)), &ledger);

    progress.emit(TriagePhase::QueryingPackages, None, &ledger);
    let casks = packages.installed(PackageCategory::Cask);
    let managed_formulas = packages.installed(PackageCategory::Formula);
    info!(
        "package source reported {} cask(s), {} formula(s)",
        casks.len(),
        managed_formulas.len()
    );

    let cancelled = || is_cancelled(options);
    let users_dir = config.users_path();
    let mut owners = Vec::new();
    let mut crawl_stats = CrawlStats::default();

    'passes: {
        if cancelled() {
            break 'passes;
        }
        progress.emit(
            TriagePhase::Applications,
            Some(display_path(&config.applications_path())),
            &ledger,
        );
        summarize_applications(&mut ledger, &config, &rules, &casks);
        log_pass(options, "applications", &ledger);

        if cancelled() {
            break 'passes;
        }
        progress.emit(TriagePhase::UserFolders, Some(display_path(&users_dir)), &ledger);
        owners = discover_owners(&mut ledger, &config, &rules);
        summarize_included_folders(&mut ledger, &config, &rules, &owners);
        ignore_user_folders(&mut ledger, &config, &owners);
        log_pass(options, "user folders", &ledger);

        if cancelled() {
            break 'passes;
        }
        progress.emit(TriagePhase::SecondaryFolders, None, &ledger);
        scan_secondary_folders(&mut ledger, &config, &rules, &owners);
        log_pass(options, "secondary folders", &ledger);

        if cancelled() {
            break 'passes;
        }
        progress.emit(TriagePhase::TopLevel, Some(display_path(&config.root)), &ledger);
        scan_top_level(&mut ledger, &config, &rules);
        log_pass(options, "top-level", &ledger);

        if cancelled() {
            break 'passes;
        }
        progress.emit(TriagePhase::Crawling, Some(display_path(&config.root)), &ledger);
        crawl_stats = Crawl {
            root: &config.root,
            users_dir: &users_dir,
            rules: &rules,
            cancel_flag: options.cancel_flag.as_deref(),
        }
        .run(&mut ledger);
        log_pass(options, "crawl", &ledger);
    }

    let was_cancelled = cancelled();
    if was_cancelled && !crawl_stats.cancelled {
        ledger.warn("triage canceled by caller; report contains partial data".to_string());
    }

    progress.emit(TriagePhase::Done, None, &ledger);

    let (registry, records, warnings, listing_errors) = ledger.into_parts();
    let metrics = RunMetrics {
        elapsed_ms: started.elapsed().as_millis().try_into().unwrap_or(u64::MAX),
        registered_paths: registry.len() as u64,
        records: records.len() as u64,
        directories_visited: crawl_stats.visited,
        skipped: crawl_stats.skipped,
        symlinks: crawl_stats.symlinks,
        drilled: crawl_stats.drilled,
        recorded: crawl_stats.recorded,
        listing_errors,
    };

    let run = RunMetadata {
        root: display_path(&config.root),
        applications_dir: display_path(&config.applications_path()),
        users_dir: display_path(&users_dir),
        owners: owners.iter().map(|owner| owner.name.clone()).collect(),
        package_manager: packages.name().map(str::to_string),
        progress: options.progress,
        emit_progress_events: options.emit_progress_events,
        cancelled: was_cancelled,
    };

    let mut report = assemble_report(run_id, run, records, warnings);
    report.metrics = metrics;
    report.managed_formulas = managed_formulas;
    report.progress_summary = progress.summary();
    Ok(report)
}

pub fn assemble_report(
    run_id: String,
    run: RunMetadata,
    records: Vec<ClassificationRecord>,
    warnings: Vec<String>,
) -> TriageReport {
    let mut report = TriageReport {
        report_version: REPORT_VERSION.to_string(),
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        run_id,
        run,
        metrics: RunMetrics::default(),
        progress_summary: ProgressSummary::default(),
        applications: Default::default(),
        managed_formulas: Vec::new(),
        manual_summaries: Default::default(),
        owner_gray: Default::default(),
        top_level_gray: Default::default(),
        ignored: Vec::new(),
        warnings,
    };

    for record in records {
        match record {
            ClassificationRecord::Application(app) => match app.class {
                AppClass::Managed => report.applications.managed.push(app),
                AppClass::Custom => report.applications.custom.push(app),
            },
            ClassificationRecord::ManualSummary(summary) => report
                .manual_summaries
                .entry(summary.owner.clone())
                .or_default()
                .push(summary),
            ClassificationRecord::GrayListing(listing) => match listing.owner.clone() {
                Some(owner) => report.owner_gray.entry(owner).or_default().push(listing),
                None => {
                    report.top_level_gray.insert(listing.path.clone(), listing);
                }
            },
            ClassificationRecord::Ignored(item) => report.ignored.push(item),
        }
    }

    report.applications.managed.sort_by(|a, b| a.name.cmp(&b.name));
    report.applications.custom.sort_by(|a, b| a.name.cmp(&b.name));
    for listings in report.owner_gray.values_mut() {
        listings.sort_by(|a, b| a.label.cmp(&b.label));
    }
    report.ignored.sort_by(|a, b| a.path.cmp(&b.path));
    report
}

struct ProgressEmitter<F> {
    enabled: bool,
    on_event: F,
    run_id: String,
    total_events: u64,
    phase_counts: HashMap<TriagePhase, u64>,
}

impl<F> ProgressEmitter<F>
where
    F: FnMut(TriageEvent),
{
    fn emit(&mut self, phase: TriagePhase, current_path: Option<String>, ledger: &Ledger) {
        self.total_events = self.total_events.saturating_add(1);
        *self.phase_counts.entry(phase.clone()).or_insert(0) += 1;

        if self.enabled {
            (self.on_event)(TriageEvent {
                seq: self.total_events,
                run_id: self.run_id.clone(),
                phase,
                current_path,
                registered_paths: ledger.registry().len() as u64,
                records: ledger.records().len() as u64,
                warnings: ledger.warnings().len() as u64,
                timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            });
        }
    }

    fn summary(&self) -> ProgressSummary {
        let mut phase_counts = self
            .phase_counts
            .iter()
            .map(|(phase, events)| PhaseCount {
                phase: phase.clone(),
                events: *events,
            })
            .collect::<Vec<_>>();
        phase_counts.sort_by_key(|count| phase_order(&count.phase));
        ProgressSummary {
            total_events: self.total_events,
            phase_counts,
            completed: true,
        }
    }
}

fn phase_order(phase: &TriagePhase) -> u8 {
    match phase {
        TriagePhase::ResolvingRoot => 0,
        TriagePhase::QueryingPackages => 1,
        TriagePhase::Applications => 2,
        TriagePhase::UserFolders => 3,
        TriagePhase::SecondaryFolders => 4,
        TriagePhase::TopLevel => 5,
        TriagePhase::Crawling => 6,
        TriagePhase::Done => 7,
    }
}

fn log_pass(options: &TriageOptions, pass: &str, ledger: &Ledger) {
    if options.progress {
        info!(
            "triage progress: {pass} pass complete ({} registered path(s), {} record(s))",
            ledger.registry().len(),
            ledger.records().len()
        );
    }
}

/// Absolute, lexically normalized root. Symlinks are not resolved.
fn resolve_root(root: &std::path::Path) -> Result<PathBuf> {
    let absolute = if root.is_absolute() {
        root.to_path_buf()
    } else {
        env::current_dir()
            .context("failed to resolve current directory")?
            .join(root)
    };
    let root = normalize(&absolute);
    let metadata = std::fs::metadata(&root)
        .with_context(|| format!("triage root not found: {}", root.display()))?;
    if !metadata.is_dir() {
        return Err(anyhow!("triage root is not a directory: {}", root.display()));
    }
    Ok(root)
}

fn is_cancelled(options: &TriageOptions) -> bool {
    options
        .cancel_flag
        .as_ref()
        .is_some_and(|flag| flag.load(Ordering::Relaxed))
}
