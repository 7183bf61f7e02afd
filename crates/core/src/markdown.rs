use crate::model::{AppBundle, IgnoreReason, TriageReport};

pub fn render_markdown_summary(report: &TriageReport) -> String {
    let mut out = String::new();
    out.push_str("# Manual Customizations Report\n\n");
    out.push_str(&format!(
        "- Report version: `{}`\n- Generated at: `{}`\n- Root: `{}`\n- Owners: `{}`\n- Registered paths: `{}`\n- Elapsed: `{} ms`\n\n",
        report.report_version,
        report.generated_at,
        report.run.root,
        report.run.owners.join("`, `"),
        report.metrics.registered_paths,
        report.metrics.elapsed_ms
    ));
    if report.run.cancelled {
        out.push_str("> Run was canceled; sections below are partial.\n\n");
    }

    out.push_str(&format!("## {}\n\n", report.run.applications_dir));
    push_apps(&mut out, "Custom applications", &report.applications.custom);
    push_apps(&mut out, "Package-managed applications", &report.applications.managed);

    out.push_str("## Package-managed formulas\n\n");
    push_names(&mut out, &report.managed_formulas);
    out.push('\n');

    out.push_str("## User Customizations\n\n");
    if report.manual_summaries.is_empty() {
        out.push_str("No included folders found.\n\n");
    }
    for (owner, summaries) in &report.manual_summaries {
        out.push_str(&format!("### {owner}\n\n"));
        for summary in summaries {
            out.push_str(&format!(
                "- {}: {} item(s) (immediate), {} file(s) total, {}\n",
                summary.folder,
                summary.immediate_entries,
                summary.file_count,
                human_bytes(summary.total_bytes)
            ));
        }
        out.push('\n');
    }

    out.push_str("## Gray Area by User\n\n");
    if report.owner_gray.is_empty() {
        out.push_str("No unclassified user folders.\n\n");
    }
    for (owner, listings) in &report.owner_gray {
        out.push_str(&format!("### {owner}\n\n"));
        for listing in listings {
            out.push_str(&format!("- `{}`", listing.label));
            match &listing.listing_error {
                Some(err) => out.push_str(&format!(" (unreadable: {err})\n")),
                None => out.push_str(&format!(" ({} item(s))\n", listing.entries.len())),
            }
            for entry in &listing.entries {
                out.push_str(&format!("  - {entry}\n"));
            }
        }
        out.push('\n');
    }

    out.push_str("## Top-level Gray Area\n\n");
    if report.top_level_gray.is_empty() {
        out.push_str("No unclassified top-level directories.\n\n");
    } else {
        for (path, listing) in &report.top_level_gray {
            out.push_str(&format!("- `{}` ({} item(s))\n", path, listing.entries.len()));
            for entry in &listing.entries {
                out.push_str(&format!("  - {entry}\n"));
            }
        }
        out.push('\n');
    }

    out.push_str("## Ignored\n\n");
    if report.ignored.is_empty() {
        out.push_str("Nothing ignored.\n\n");
    } else {
        for item in &report.ignored {
            out.push_str(&format!(
                "- `{}` ({})\n",
                item.path,
                ignore_reason_label(item.reason)
            ));
        }
        out.push('\n');
    }

    if !report.warnings.is_empty() {
        out.push_str("## Warnings\n\n");
        for warning in &report.warnings {
            out.push_str(&format!("- {}\n", warning));
        }
    }

    out
}

fn push_apps(out: &mut String, title: &str, apps: &[AppBundle]) {
    out.push_str(&format!("{title}:\n\n"));
    let names = apps.iter().map(|app| app.name.clone()).collect::<Vec<_>>();
    push_names(out, &names);
    out.push('\n');
}

fn push_names(out: &mut String, names: &[String]) {
    if names.is_empty() {
        out.push_str("- (None found)\n");
    }
    for name in names {
        out.push_str(&format!("- {name}\n"));
    }
}

pub fn ignore_reason_label(reason: IgnoreReason) -> &'static str {
    match reason {
        IgnoreReason::DefaultApplication => "default application",
        IgnoreReason::ExcludedFolder => "excluded folder",
        IgnoreReason::ExcludedRoot => "excluded root",
        IgnoreReason::Noise => "noise",
        IgnoreReason::SkippedAccount => "skipped account",
    }
}

pub fn human_bytes(value: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];
    if value == 0 {
        return "0 B".to_string();
    }
    let mut size = value as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::{human_bytes, render_markdown_summary};
    use crate::model::{
        AppBundle, AppClass, ClassificationRecord, GrayListing, IgnoreReason, IgnoredPath,
        ManualSummary, RunMetadata,
    };
    use crate::scan::assemble_report;

    #[test]
    fn formats_sizes_with_binary_units() {
        assert_eq!(human_bytes(0), "0 B");
        assert_eq!(human_bytes(512), "512.0 B");
        assert_eq!(human_bytes(1536), "1.5 KB");
        assert_eq!(human_bytes(5 * 1024 * 1024 * 1024), "5.0 GB");
    }

    #[test]
    fn renders_every_section() {
        let mut report = assemble_report(
            "run".to_string(),
            RunMetadata {
                root: "/".to_string(),
                applications_dir: "/Applications".to_string(),
                users_dir: "/Users".to_string(),
                owners: vec!["alice".to_string()],
                package_manager: Some("brew".to_string()),
                progress: false,
                emit_progress_events: false,
                cancelled: false,
            },
            vec![
                ClassificationRecord::Application(AppBundle {
                    name: "Firefox.app".to_string(),
                    path: "/Applications/Firefox.app".to_string(),
                    class: AppClass::Managed,
                }),
                ClassificationRecord::ManualSummary(ManualSummary {
                    owner: "alice".to_string(),
                    folder: "Desktop".to_string(),
                    path: "/Users/alice/Desktop".to_string(),
                    immediate_entries: 3,
                    file_count: 10,
                    total_bytes: 2048,
                }),
                ClassificationRecord::GrayListing(GrayListing {
                    path: "/Users/alice/Music".to_string(),
                    label: "Music".to_string(),
                    owner: Some("alice".to_string()),
                    entries: vec!["Logic".to_string()],
                    listing_error: None,
                }),
                ClassificationRecord::Ignored(IgnoredPath {
                    path: "/System".to_string(),
                    reason: IgnoreReason::ExcludedRoot,
                }),
            ],
            vec!["listing failed for /private: denied".to_string()],
        );
        report.managed_formulas = vec!["wget".to_string()];

        let markdown = render_markdown_summary(&report);
        assert!(markdown.contains("- Firefox.app"));
        assert!(markdown.contains("- wget"));
        assert!(markdown.contains("Desktop: 3 item(s) (immediate), 10 file(s) total, 2.0 KB"));
        assert!(markdown.contains("- `Music` (1 item(s))"));
        assert!(markdown.contains("`/System` (excluded root)"));
        assert!(markdown.contains("## Warnings"));
        assert!(markdown.contains("Custom applications:\n\n- (None found)"));
    }
}
