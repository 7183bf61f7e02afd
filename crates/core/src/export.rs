use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::markdown::{ignore_reason_label, render_markdown_summary};
use crate::model::{GrayListing, TriageReport};

pub const MANUAL_FILE: &str = "manual_customizations.md";
pub const GRAY_AREA_DIR: &str = "gray_area";
pub const IGNORED_FILE: &str = "ignored.txt";
pub const REPORT_FILE: &str = "report.json";

pub fn write_output_dir(report: &TriageReport, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let gray_dir = dir.join(GRAY_AREA_DIR);
    fs::create_dir_all(&gray_dir)
        .with_context(|| format!("failed to create {}", gray_dir.display()))?;

    let mut written = Vec::new();
    let mut gray_names = HashSet::new();

    let payload = serde_json::to_string_pretty(report).context("failed to serialize report")?;
    written.push(write_file(&dir.join(REPORT_FILE), &payload)?);
    written.push(write_file(
        &dir.join(MANUAL_FILE),
        &render_markdown_summary(report),
    )?);

    for (owner, listings) in &report.owner_gray {
        let mut text = format!("Gray Area for user: {owner}\n");
        for listing in listings {
            text.push_str(&format!("\n-- {} (top-level listing) --\n", listing.label));
            push_entries(&mut text, listing);
        }
        let name = unique_name(&mut gray_names, &format!("user_{}", sanitize(owner)));
        written.push(write_file(&gray_dir.join(name), &text)?);
    }

    for (path, listing) in &report.top_level_gray {
        let mut text = format!("Gray Area for {path} (top-level listing):\n");
        push_entries(&mut text, listing);
        let name = unique_name(&mut gray_names, &flatten_path(path));
        written.push(write_file(&gray_dir.join(name), &text)?);
    }

    let mut ignored = String::from("Ignored (not scanned):\n");
    for item in &report.ignored {
        ignored.push_str(&format!(
            " - {} ({})\n",
            item.path,
            ignore_reason_label(item.reason)
        ));
    }
    written.push(write_file(&dir.join(IGNORED_FILE), &ignored)?);

    Ok(written)
}

fn push_entries(text: &mut String, listing: &GrayListing) {
    if let Some(err) = &listing.listing_error {
        text.push_str(&format!(" (unreadable: {err})\n"));
    }
    for entry in &listing.entries {
        text.push_str(&format!(" - {entry}\n"));
    }
}

/// `<stem>_gray_area.txt`, suffixed `_2`, `_3`, ... when a stem repeats.
fn unique_name(used: &mut HashSet<String>, stem: &str) -> String {
    let mut name = format!("{stem}_gray_area.txt");
    let mut counter = 1;
    while !used.insert(name.clone()) {
        counter += 1;
        name = format!("{stem}_{counter}_gray_area.txt");
    }
    name
}

fn write_file(path: &Path, contents: &str) -> Result<PathBuf> {
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path.to_path_buf())
}

pub fn flatten_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return "root".to_string();
    }
    sanitize(&trimmed.replace('/', "_"))
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect()
}
