pub mod config;
pub mod crawl;
pub mod export;
pub mod ledger;
pub mod listing;
pub mod markdown;
pub mod model;
pub mod packages;
pub mod registry;
pub mod rules;
pub mod scan;
pub mod summarize;

pub use config::{ConfigError, TriageConfig};
pub use crawl::{classify, Crawl, CrawlDecision, CrawlStats};
pub use export::write_output_dir;
pub use ledger::Ledger;
pub use markdown::{human_bytes, render_markdown_summary};
pub use model::{
    AppBundle, AppClass, ApplicationInventory, ClassificationRecord, GrayListing, IgnoreReason,
    IgnoredPath, ManualSummary, PhaseCount, ProgressSummary, RunMetadata, RunMetrics,
    TriageEvent, TriagePhase, TriageReport, REPORT_VERSION,
};
pub use packages::{BrewCli, PackageCategory, PackageSource, StaticPackages};
pub use registry::PathRegistry;
pub use rules::RuleSet;
pub use scan::{
    run_triage, run_triage_with_callback, run_triage_with_events, run_triage_with_source,
    TriageOptions, TriageRunOutput,
};
