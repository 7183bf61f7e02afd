use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gray_sweep_core::{
    human_bytes, render_markdown_summary, run_triage_with_callback, write_output_dir,
    TriageConfig, TriageOptions, TriageReport,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "gray-sweep",
    version,
    about = "Find macOS customizations that no known category accounts for. Read-only."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run every pass plus the crawl and emit a JSON report.
    Scan(ScanArgs),
    /// Re-render Markdown or the output directory from an existing report.
    Render(RenderArgs),
    /// Print or write the default configuration.
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct ScanArgs {
    /// JSON configuration file. Missing keys take the macOS defaults.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Filesystem root to triage, overriding the configured one.
    #[arg(long, value_name = "PATH")]
    root: Option<PathBuf>,

    /// Output report path.
    #[arg(long, default_value = "gray-sweep-report.json", value_name = "FILE")]
    output: PathBuf,

    /// Optional markdown summary output file.
    #[arg(long, value_name = "FILE")]
    md: Option<PathBuf>,

    /// Also write the per-owner and per-directory text files into DIR.
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Do not query the package manager; every app bundle is custom or default.
    #[arg(long)]
    no_packages: bool,

    /// Log a line after each pass.
    #[arg(long)]
    progress: bool,
}

#[derive(Debug, Args)]
struct RenderArgs {
    /// Input report file.
    #[arg(long, value_name = "FILE")]
    report: PathBuf,

    /// Markdown summary output file. Printed to stdout when neither output is given.
    #[arg(long, value_name = "FILE")]
    md: Option<PathBuf>,

    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    /// Write the configuration here instead of stdout.
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan(args) => run_scan_command(args),
        Commands::Render(args) => run_render_command(args),
        Commands::Config(args) => run_config_command(args),
    }
}

fn run_scan_command(args: ScanArgs) -> Result<()> {
    let ScanArgs {
        config,
        root,
        output,
        md,
        output_dir,
        no_packages,
        progress,
    } = args;

    let mut config = match config {
        Some(path) => TriageConfig::from_file(&path)?,
        None => TriageConfig::default(),
    };
    if let Some(root) = root {
        config.root = root;
    }
    if no_packages {
        config.package_manager = None;
    }

    let options = TriageOptions {
        config,
        progress,
        ..TriageOptions::default()
    };

    let report = run_triage_with_callback(&options, |_| {})?;
    write_report(&report, &output)?;
    println!("Report written to {}", output.display());
    print_summary(&report);

    if let Some(md_path) = md {
        write_markdown(&report, &md_path)?;
    }
    if let Some(dir) = output_dir {
        write_dir(&report, &dir)?;
    }

    Ok(())
}

fn run_render_command(args: RenderArgs) -> Result<()> {
    let data = fs::read_to_string(&args.report)
        .with_context(|| format!("failed to read {}", args.report.display()))?;
    let report: TriageReport = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse {}", args.report.display()))?;

    if args.md.is_none() && args.output_dir.is_none() {
        print!("{}", render_markdown_summary(&report));
        return Ok(());
    }
    if let Some(md_path) = args.md {
        write_markdown(&report, &md_path)?;
    }
    if let Some(dir) = args.output_dir {
        write_dir(&report, &dir)?;
    }
    Ok(())
}

fn run_config_command(args: ConfigArgs) -> Result<()> {
    let payload = serde_json::to_string_pretty(&TriageConfig::default())
        .context("failed to serialize configuration")?;
    match args.output {
        Some(path) => {
            fs::write(&path, payload)
                .with_context(|| format!("failed to write configuration to {}", path.display()))?;
            println!("Configuration written to {}", path.display());
        }
        None => println!("{payload}"),
    }
    Ok(())
}

fn print_summary(report: &TriageReport) {
    let gray_owner = report.owner_gray.values().map(Vec::len).sum::<usize>();
    let manual_bytes = report
        .manual_summaries
        .values()
        .flatten()
        .map(|summary| summary.total_bytes)
        .sum::<u64>();
    println!(
        "Triaged {} for {} owner(s): {} custom app(s), {} managed app(s), {} formula(s).",
        report.run.root,
        report.run.owners.len(),
        report.applications.custom.len(),
        report.applications.managed.len(),
        report.managed_formulas.len()
    );
    println!(
        "Manual folders hold {}; gray area: {} user listing(s), {} top-level listing(s); {} ignored.",
        human_bytes(manual_bytes),
        gray_owner,
        report.top_level_gray.len(),
        report.ignored.len()
    );
    println!(
        "Crawl visited {} director(ies) in {} ms with {} warning(s).",
        report.metrics.directories_visited,
        report.metrics.elapsed_ms,
        report.warnings.len()
    );
    if report.run.cancelled {
        println!("Run was canceled; the report is partial.");
    }
}

fn write_report(report: &TriageReport, path: &Path) -> Result<()> {
    let payload = serde_json::to_string_pretty(report).context("failed to serialize report")?;
    fs::write(path, payload)
        .with_context(|| format!("failed to write report to {}", path.display()))
}

fn write_markdown(report: &TriageReport, path: &Path) -> Result<()> {
    fs::write(path, render_markdown_summary(report))
        .with_context(|| format!("failed to write markdown summary to {}", path.display()))?;
    println!("Markdown summary written to {}", path.display());
    Ok(())
}

fn write_dir(report: &TriageReport, dir: &Path) -> Result<()> {
    let written = write_output_dir(report, dir)?;
    info!("wrote {} file(s) into {}", written.len(), dir.display());
    println!("Output directory written to {}", dir.display());
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
