use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::thread;

use anyhow::{anyhow, Context, Result};
use gray_sweep_core::{
    render_markdown_summary, run_triage_with_callback, write_output_dir, TriageConfig,
    TriageEvent, TriageOptions, TriageReport,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub config: Option<TriageConfig>,
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub no_packages: bool,
    #[serde(default)]
    pub progress: bool,
    #[serde(default = "default_emit_progress_events")]
    pub emit_progress_events: bool,
}

fn default_emit_progress_events() -> bool {
    true
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            run_id: None,
            config: None,
            root: None,
            output: None,
            no_packages: false,
            progress: false,
            emit_progress_events: default_emit_progress_events(),
        }
    }
}

impl RunRequest {
    fn triage_config(&self) -> TriageConfig {
        let mut config = self.config.clone().unwrap_or_default();
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if self.no_packages {
            config.package_manager = None;
        }
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunSessionStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSessionSnapshot {
    pub run_id: String,
    pub status: RunSessionStatus,
    pub report_path: Option<PathBuf>,
    pub error: Option<String>,
    pub total_events: u64,
    pub records: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRunResponse {
    pub run_id: String,
    pub status: RunSessionStatus,
}

#[derive(Debug, Clone)]
struct RunSession {
    status: RunSessionStatus,
    report_path: Option<PathBuf>,
    report: Option<TriageReport>,
    error: Option<String>,
    events: Vec<TriageEvent>,
    cancel_flag: Arc<AtomicBool>,
}

static SESSIONS: Lazy<Mutex<HashMap<String, RunSession>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

pub fn start_run(request: RunRequest) -> Result<String> {
    let run_id = request
        .run_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let cancel_flag = Arc::new(AtomicBool::new(false));

    {
        let mut sessions = lock_sessions()?;
        if sessions
            .get(&run_id)
            .is_some_and(|session| session.status == RunSessionStatus::Running)
        {
            return Err(anyhow!("run session already running: {run_id}"));
        }
        sessions.insert(
            run_id.clone(),
            RunSession {
                status: RunSessionStatus::Running,
                report_path: request.output.clone(),
                report: None,
                error: None,
                events: Vec::new(),
                cancel_flag: Arc::clone(&cancel_flag),
            },
        );
    }

    let thread_run_id = run_id.clone();
    thread::spawn(move || {
        let options = TriageOptions {
            config: request.triage_config(),
            run_id: Some(thread_run_id.clone()),
            progress: request.progress,
            emit_progress_events: request.emit_progress_events,
            cancel_flag: Some(Arc::clone(&cancel_flag)),
        };

        let run_result = run_triage_with_callback(&options, |event| {
            if let Ok(mut sessions) = lock_sessions() {
                if let Some(session) = sessions.get_mut(&thread_run_id) {
                    session.events.push(event);
                }
            }
        });

        let outcome = run_result.and_then(|report| {
            if let Some(path) = &request.output {
                write_report(&report, path)?;
            }
            Ok(report)
        });

        if let Ok(mut sessions) = lock_sessions() {
            if let Some(session) = sessions.get_mut(&thread_run_id) {
                match outcome {
                    Ok(report) => {
                        session.status = if report.run.cancelled {
                            RunSessionStatus::Cancelled
                        } else {
                            RunSessionStatus::Completed
                        };
                        session.report = Some(report);
                        session.error = None;
                    }
                    Err(err) => {
                        session.status = RunSessionStatus::Failed;
                        session.error = Some(format!("{err:#}"));
                    }
                }
            }
        }
    });

    Ok(run_id)
}

pub fn poll_run_events(run_id: &str, from_seq: u64) -> Result<Vec<TriageEvent>> {
    let sessions = lock_sessions()?;
    let session = sessions
        .get(run_id)
        .ok_or_else(|| anyhow!("run session not found: {run_id}"))?;

    Ok(session
        .events
        .iter()
        .filter(|event| event.seq > from_seq)
        .cloned()
        .collect())
}

pub fn cancel_run(run_id: &str) -> Result<CancelRunResponse> {
    let sessions = lock_sessions()?;
    let session = sessions
        .get(run_id)
        .ok_or_else(|| anyhow!("run session not found: {run_id}"))?;

    session.cancel_flag.store(true, Ordering::Relaxed);

    Ok(CancelRunResponse {
        run_id: run_id.to_string(),
        status: session.status.clone(),
    })
}

pub fn get_run_session(run_id: &str) -> Result<RunSessionSnapshot> {
    let sessions = lock_sessions()?;
    let session = sessions
        .get(run_id)
        .ok_or_else(|| anyhow!("run session not found: {run_id}"))?;

    Ok(RunSessionSnapshot {
        run_id: run_id.to_string(),
        status: session.status.clone(),
        report_path: session.report_path.clone(),
        error: session.error.clone(),
        total_events: session.events.len() as u64,
        records: session
            .report
            .as_ref()
            .map(|report| report.record_count() as u64),
    })
}

pub fn get_run_report(run_id: &str) -> Result<TriageReport> {
    let sessions = lock_sessions()?;
    let session = sessions
        .get(run_id)
        .ok_or_else(|| anyhow!("run session not found: {run_id}"))?;
    session
        .report
        .clone()
        .ok_or_else(|| anyhow!("run {run_id} has no report yet"))
}

pub fn load_report(path: impl AsRef<Path>) -> Result<TriageReport> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read report {}", path.display()))?;
    let report: TriageReport = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(report)
}

pub fn render_report(report: &TriageReport) -> String {
    render_markdown_summary(report)
}

pub fn export_report(report: &TriageReport, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    write_output_dir(report, dir)
}

fn write_report(report: &TriageReport, path: &Path) -> Result<()> {
    let payload =
        serde_json::to_string_pretty(report).context("failed to serialize report payload")?;
    fs::write(path, payload).with_context(|| format!("failed to write report to {}", path.display()))
}

fn lock_sessions() -> Result<std::sync::MutexGuard<'static, HashMap<String, RunSession>>> {
    SESSIONS
        .lock()
        .map_err(|_| anyhow!("run session registry lock poisoned"))
}
