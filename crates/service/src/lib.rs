pub mod service;

pub use service::{
    cancel_run, export_report, get_run_report, get_run_session, load_report, poll_run_events,
    render_report, start_run, CancelRunResponse, RunRequest, RunSessionSnapshot, RunSessionStatus,
};
