use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

pub const REPORT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriageReport {
    pub report_version: String,
    pub generated_at: String,
    #[serde(default = "default_run_id")]
    pub run_id: String,
    pub run: RunMetadata,
    #[serde(default)]
    pub metrics: RunMetrics,
    #[serde(default)]
    pub progress_summary: ProgressSummary,
    #[serde(default)]
    pub applications: ApplicationInventory,
    #[serde(default)]
    pub managed_formulas: Vec<String>,
    #[serde(default)]
    pub manual_summaries: BTreeMap<String, Vec<ManualSummary>>,
    #[serde(default)]
    pub owner_gray: BTreeMap<String, Vec<GrayListing>>,
    #[serde(default)]
    pub top_level_gray: BTreeMap<String, GrayListing>,
    #[serde(default)]
    pub ignored: Vec<IgnoredPath>,
    pub warnings: Vec<String>,
}

fn default_run_id() -> String {
    "unknown".to_string()
}

impl TriageReport {
    pub fn recorded_paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        out.extend(
            self.applications
                .managed
                .iter()
                .chain(&self.applications.custom)
                .map(|app| app.path.as_str()),
        );
        out.extend(
            self.manual_summaries
                .values()
                .flatten()
                .map(|summary| summary.path.as_str()),
        );
        out.extend(
            self.owner_gray
                .values()
                .flatten()
                .chain(self.top_level_gray.values())
                .map(|listing| listing.path.as_str()),
        );
        out.extend(self.ignored.iter().map(|item| item.path.as_str()));
        out
    }

    pub fn coverage_overlaps(&self) -> Vec<String> {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for path in self.recorded_paths() {
            *seen.entry(path).or_insert(0) += 1;
        }
        let mut overlaps = seen
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(path, _)| path.to_string())
            .collect::<Vec<_>>();
        overlaps.sort();
        overlaps
    }

    pub fn record_count(&self) -> usize {
        self.recorded_paths().len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunMetadata {
    pub root: String,
    pub applications_dir: String,
    pub users_dir: String,
    pub owners: Vec<String>,
    #[serde(default)]
    pub package_manager: Option<String>,
    #[serde(default)]
    pub progress: bool,
    #[serde(default)]
    pub emit_progress_events: bool,
    #[serde(default)]
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RunMetrics {
    #[serde(default)]
    pub elapsed_ms: u64,
    #[serde(default)]
    pub registered_paths: u64,
    #[serde(default)]
    pub records: u64,
    #[serde(default)]
    pub directories_visited: u64,
    #[serde(default)]
    pub skipped: u64,
    #[serde(default)]
    pub symlinks: u64,
    #[serde(default)]
    pub drilled: u64,
    #[serde(default)]
    pub recorded: u64,
    #[serde(default)]
    pub listing_errors: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProgressSummary {
    #[serde(default)]
    pub total_events: u64,
    #[serde(default)]
    pub phase_counts: Vec<PhaseCount>,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseCount {
    pub phase: TriagePhase,
    pub events: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriageEvent {
    pub seq: u64,
    pub run_id: String,
    pub phase: TriagePhase,
    pub current_path: Option<String>,
    pub registered_paths: u64,
    pub records: u64,
    pub warnings: u64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TriagePhase {
    ResolvingRoot,
    QueryingPackages,
    Applications,
    UserFolders,
    SecondaryFolders,
    TopLevel,
    Crawling,
    Done,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassificationRecord {
    ManualSummary(ManualSummary),
    GrayListing(GrayListing),
    Ignored(IgnoredPath),
    Application(AppBundle),
}

impl ClassificationRecord {
    pub fn path(&self) -> &str {
        match self {
            Self::ManualSummary(summary) => &summary.path,
            Self::GrayListing(listing) => &listing.path,
            Self::Ignored(item) => &item.path,
            Self::Application(app) => &app.path,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManualSummary {
    pub owner: String,
    pub folder: String,
    pub path: String,
    pub immediate_entries: u64,
    pub file_count: u64,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GrayListing {
    pub path: String,
    pub label: String,
    #[serde(default)]
    pub owner: Option<String>,
    pub entries: Vec<String>,
    #[serde(default)]
    pub listing_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IgnoredPath {
    pub path: String,
    pub reason: IgnoreReason,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    DefaultApplication,
    ExcludedFolder,
    ExcludedRoot,
    Noise,
    SkippedAccount,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ApplicationInventory {
    #[serde(default)]
    pub managed: Vec<AppBundle>,
    #[serde(default)]
    pub custom: Vec<AppBundle>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppBundle {
    pub name: String,
    pub path: String,
    pub class: AppClass,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppClass {
    Managed,
    Custom,
}
