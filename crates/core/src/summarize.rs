use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::TriageConfig;
use crate::ledger::{display_path, Ledger};
use crate::listing::{is_real_dir, read_children, shallow_listing};
use crate::model::{
    AppBundle, AppClass, ClassificationRecord, GrayListing, IgnoreReason, ManualSummary,
};
use crate::rules::{bundle_base_name, RuleSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    pub name: String,
    pub home: PathBuf,
}

pub fn discover_owners(ledger: &mut Ledger, config: &TriageConfig, rules: &RuleSet) -> Vec<Owner> {
    let users = config.users_path();
    if !is_real_dir(&users) {
        debug!("users directory {} not present", users.display());
        return Vec::new();
    }
    let children = match read_children(&users) {
        Ok(children) => children,
        Err(err) => {
            ledger.listing_failed(&users, &err);
            return Vec::new();
        }
    };

    let skipped = config
        .skipped_accounts
        .iter()
        .map(|name| name.to_lowercase())
        .collect::<HashSet<_>>();

    let mut owners = Vec::new();
    for child in children {
        if !child.is_dir {
            continue;
        }
        if skipped.contains(&child.name.to_lowercase()) || rules.is_hidden_name(&child.name) {
            ledger.ignore(&child.path, IgnoreReason::SkippedAccount);
            continue;
        }
        owners.push(Owner {
            name: child.name,
            home: child.path,
        });
    }
    info!("discovered {} account(s) under {}", owners.len(), users.display());
    owners
}

pub fn summarize_applications(
    ledger: &mut Ledger,
    config: &TriageConfig,
    rules: &RuleSet,
    managed_casks: &[String],
) -> usize {
    let apps_dir = config.applications_path();
    if !is_real_dir(&apps_dir) {
        debug!("applications directory {} not present", apps_dir.display());
        return 0;
    }
    let children = match read_children(&apps_dir) {
        Ok(children) => children,
        Err(err) => {
            ledger.listing_failed(&apps_dir, &err);
            return 0;
        }
    };

    let casks = managed_casks
        .iter()
        .map(|name| name.to_lowercase())
        .collect::<HashSet<_>>();

    let mut registered = 0;
    for child in children {
        let base = bundle_base_name(&child.name);
        if base.len() == child.name.len() {
            continue;
        }

        let accepted = if casks.contains(&base.to_lowercase()) {
            record_app(ledger, &child.name, &child.path, AppClass::Managed)
        } else if rules.is_whitelisted_default(&child.name) {
            ledger.ignore(&child.path, IgnoreReason::DefaultApplication)
        } else {
            record_app(ledger, &child.name, &child.path, AppClass::Custom)
        };
        if accepted {
            registered += 1;
        }
    }
    info!("application inventory registered {registered} bundle(s)");
    registered
}

fn record_app(ledger: &mut Ledger, name: &str, path: &Path, class: AppClass) -> bool {
    ledger.record(
        path,
        ClassificationRecord::Application(AppBundle {
            name: name.to_string(),
            path: display_path(path),
            class,
        }),
    )
}

pub fn summarize_included_folders(
    ledger: &mut Ledger,
    config: &TriageConfig,
    rules: &RuleSet,
    owners: &[Owner],
) {
    for owner in owners {
        for folder in &config.included_user_folders {
            let target = owner.home.join(folder);
            if !is_real_dir(&target) || !ledger.accepts(&target) {
                continue;
            }

            let immediate_entries = match shallow_listing(&target, rules) {
                Ok(names) => names.len() as u64,
                Err(err) => {
                    ledger.listing_failed(&target, &err);
                    0
                }
            };
            let totals = folder_totals(&target, rules);

            ledger.record(
                &target,
                ClassificationRecord::ManualSummary(ManualSummary {
                    owner: owner.name.clone(),
                    folder: folder.clone(),
                    path: display_path(&target),
                    immediate_entries,
                    file_count: totals.file_count,
                    total_bytes: totals.total_bytes,
                }),
            );
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FolderTotals {
    pub file_count: u64,
    pub total_bytes: u64,
}

/// Hidden directories are not entered and symlinks are not followed. Entries
/// that disappear mid-walk are skipped, so the result is best effort.
pub fn folder_totals(path: &Path, rules: &RuleSet) -> FolderTotals {
    let mut totals = FolderTotals::default();
    let walker = WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !rules.is_hidden_name(&entry.file_name().to_string_lossy())
        });

    for item in walker {
        let Ok(entry) = item else {
            continue;
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        totals.file_count += 1;
        totals.total_bytes = totals.total_bytes.saturating_add(metadata.len());
    }
    totals
}

pub fn ignore_user_folders(ledger: &mut Ledger, config: &TriageConfig, owners: &[Owner]) {
    for owner in owners {
        for folder in &config.ignored_user_folders {
            let target = owner.home.join(folder);
            if is_real_dir(&target) {
                ledger.ignore(&target, IgnoreReason::ExcludedFolder);
            }
        }
    }
}

pub fn scan_secondary_folders(
    ledger: &mut Ledger,
    config: &TriageConfig,
    rules: &RuleSet,
    owners: &[Owner],
) {
    for owner in owners {
        for location in &config.secondary_user_locations {
            let base = owner.home.join(location);
            if !is_real_dir(&base) || ledger.registry().covers(&base) {
                continue;
            }
            let children = match read_children(&base) {
                Ok(children) => children,
                Err(err) => {
                    ledger.listing_failed(&base, &err);
                    continue;
                }
            };

            for child in children {
                if !child.is_dir || rules.is_hidden_name(&child.name) {
                    continue;
                }
                if rules.is_noise_path(&child.path) {
                    ledger.ignore(&child.path, IgnoreReason::Noise);
                } else if rules.is_excluded_child(&child.name) {
                    ledger.ignore(&child.path, IgnoreReason::ExcludedFolder);
                } else {
                    record_gray(ledger, rules, &child.path, Some(owner));
                }
            }
        }
    }
}

pub fn scan_top_level(ledger: &mut Ledger, config: &TriageConfig, rules: &RuleSet) {
    let root = &config.root;
    let children = match read_children(root) {
        Ok(children) => children,
        Err(err) => {
            ledger.listing_failed(root, &err);
            return;
        }
    };

    let mut special = config.special_areas.iter().cloned().collect::<HashSet<_>>();
    for area in [&config.applications_dir, &config.users_dir] {
        if let Some(first) = area.components().next() {
            special.insert(first.as_os_str().to_string_lossy().to_string());
        }
    }
    let ignored = config.ignored_root_dirs.iter().collect::<HashSet<_>>();

    let mut listed = 0;
    for child in children {
        if !child.is_dir || special.contains(&child.name) {
            continue;
        }
        if ignored.contains(&child.name) {
            ledger.ignore(&child.path, IgnoreReason::ExcludedRoot);
        } else if record_gray(ledger, rules, &child.path, None) {
            listed += 1;
        }
    }
    info!("top-level scan gray-listed {listed} director(ies)");
}

pub(crate) fn record_gray(
    ledger: &mut Ledger,
    rules: &RuleSet,
    dir: &Path,
    owner: Option<&Owner>,
) -> bool {
    if !ledger.accepts(dir) {
        return false;
    }
    let (entries, listing_error) = match shallow_listing(dir, rules) {
        Ok(entries) => (entries, None),
        Err(err) => (Vec::new(), Some(ledger.listing_failed(dir, &err))),
    };
    let label = match owner {
        Some(owner) => owner_relative_label(&owner.home, dir),
        None => display_path(dir),
    };
    ledger.record(
        dir,
        ClassificationRecord::GrayListing(GrayListing {
            path: display_path(dir),
            label,
            owner: owner.map(|owner| owner.name.clone()),
            entries,
            listing_error,
        }),
    )
}

pub fn owner_relative_label(home: &Path, dir: &Path) -> String {
    match dir.strip_prefix(home) {
        Ok(relative) if relative.as_os_str().is_empty() => ".".to_string(),
        Ok(relative) => relative.to_string_lossy().replace('\\', "/"),
        Err(_) => display_path(dir),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::{
        discover_owners, folder_totals, ignore_user_folders, owner_relative_label,
        scan_secondary_folders, scan_top_level, summarize_applications,
        summarize_included_folders,
    };
    use crate::config::TriageConfig;
    use crate::ledger::Ledger;
    use crate::model::{AppClass, ClassificationRecord, IgnoreReason};
    use crate::rules::RuleSet;

    fn mkdirs(root: &Path, paths: &[&str]) {
        for path in paths {
            fs::create_dir_all(root.join(path)).expect("create dir");
        }
    }

    fn setup(root: &Path) -> (TriageConfig, RuleSet) {
        let config = TriageConfig::with_root(root);
        let rules = RuleSet::from_config(&config, &mut Vec::new());
        (config, rules)
    }

    #[test]
    fn managed_bundles_match_casks_case_insensitively() {
        let dir = tempfile::tempdir().expect("tempdir");
        mkdirs(
            dir.path(),
            &[
                "Applications/Foo.app",
                "Applications/Safari.app",
                "Applications/Tool.app",
                "Applications/Utilities Folder",
            ],
        );
        let (config, rules) = setup(dir.path());
        let mut ledger = Ledger::new();

        let count = summarize_applications(&mut ledger, &config, &rules, &["foo".to_string()]);
        assert_eq!(count, 3);

        let foo = dir.path().join("Applications/Foo.app");
        assert!(ledger.is_registered(&foo));
        let classes = ledger
            .records()
            .iter()
            .map(|record| match record {
                ClassificationRecord::Application(app) => (app.name.clone(), Some(app.class)),
                ClassificationRecord::Ignored(item) => {
                    assert_eq!(item.reason, IgnoreReason::DefaultApplication);
                    ("Safari.app".to_string(), None)
                }
                other => panic!("unexpected record {other:?}"),
            })
            .collect::<Vec<_>>();
        assert_eq!(
            classes,
            vec![
                ("Foo.app".to_string(), Some(AppClass::Managed)),
                ("Safari.app".to_string(), None),
                ("Tool.app".to_string(), Some(AppClass::Custom)),
            ]
        );
        assert!(!ledger.is_registered(&dir.path().join("Applications/Utilities Folder")));

        assert_eq!(
            summarize_applications(&mut ledger, &config, &rules, &["foo".to_string()]),
            0
        );
        assert_eq!(ledger.registry().len(), 3);
    }

    #[test]
    fn included_folders_produce_manual_summaries() {
        let dir = tempfile::tempdir().expect("tempdir");
        mkdirs(dir.path(), &["Users/alice/Desktop/nested", "Users/Shared/stuff"]);
        let desktop = dir.path().join("Users/alice/Desktop");
        fs::write(desktop.join("a.txt"), "hello").expect("file");
        fs::write(desktop.join(".DS_Store"), "xxxxxxxx").expect("file");
        fs::write(desktop.join("nested/b.txt"), "abc").expect("file");

        let (config, rules) = setup(dir.path());
        let mut ledger = Ledger::new();
        let owners = discover_owners(&mut ledger, &config, &rules);
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].name, "alice");
        assert!(ledger.is_registered(&dir.path().join("Users/Shared")));

        summarize_included_folders(&mut ledger, &config, &rules, &owners);
        let summary = ledger
            .records()
            .iter()
            .find_map(|record| match record {
                ClassificationRecord::ManualSummary(summary) => Some(summary.clone()),
                _ => None,
            })
            .expect("desktop summary");
        assert_eq!(summary.owner, "alice");
        assert_eq!(summary.folder, "Desktop");
        assert_eq!(summary.immediate_entries, 2);
        assert_eq!(summary.file_count, 2);
        assert_eq!(summary.total_bytes, 8);
        assert!(ledger.is_registered(&desktop));
    }

    #[test]
    fn folder_totals_skip_hidden_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        mkdirs(dir.path(), &[".git/objects", "src"]);
        fs::write(dir.path().join(".git/objects/blob"), "0123456789").expect("file");
        fs::write(dir.path().join("src/main.rs"), "fn main() {}").expect("file");

        let (_, rules) = setup(dir.path());
        let totals = folder_totals(dir.path(), &rules);
        assert_eq!(totals.file_count, 1);
        assert_eq!(totals.total_bytes, 12);
    }

    #[test]
    fn secondary_scan_lists_ignores_and_excludes() {
        let dir = tempfile::tempdir().expect("tempdir");
        mkdirs(
            dir.path(),
            &[
                "Users/alice/Library/Application Support/Foo/data",
                "Users/alice/Library/Application Support/com.apple.TCC",
                "Users/alice/Library/Application Support/.hidden",
                "Users/alice/.Trash",
            ],
        );
        let (config, rules) = setup(dir.path());
        let mut ledger = Ledger::new();
        let owners = discover_owners(&mut ledger, &config, &rules);
        ignore_user_folders(&mut ledger, &config, &owners);
        scan_secondary_folders(&mut ledger, &config, &rules, &owners);

        let support = dir.path().join("Users/alice/Library/Application Support");
        assert!(ledger.is_registered(&support.join("Foo")));
        assert!(ledger.is_registered(&support.join("com.apple.TCC")));
        assert!(!ledger.is_registered(&support.join(".hidden")));
        assert!(ledger.is_registered(&dir.path().join("Users/alice/.Trash")));

        let listing = ledger
            .records()
            .iter()
            .find_map(|record| match record {
                ClassificationRecord::GrayListing(listing) => Some(listing.clone()),
                _ => None,
            })
            .expect("gray listing");
        assert_eq!(listing.owner.as_deref(), Some("alice"));
        assert_eq!(listing.label, "Library/Application Support/Foo");
        assert_eq!(listing.entries, vec!["data".to_string()]);
    }

    #[test]
    fn top_level_scan_skips_special_areas() {
        let dir = tempfile::tempdir().expect("tempdir");
        mkdirs(
            dir.path(),
            &["Applications", "Users", "System/Library", "opt/homebrew", "data/x"],
        );
        let (config, rules) = setup(dir.path());
        let mut ledger = Ledger::new();
        scan_top_level(&mut ledger, &config, &rules);

        assert!(!ledger.is_registered(&dir.path().join("Applications")));
        assert!(!ledger.is_registered(&dir.path().join("Users")));
        assert!(ledger.is_registered(&dir.path().join("System")));
        assert!(ledger.is_registered(&dir.path().join("opt")));
        assert!(ledger.is_registered(&dir.path().join("data")));
        let gray = ledger
            .records()
            .iter()
            .filter(|record| matches!(record, ClassificationRecord::GrayListing(_)))
            .count();
        assert_eq!(gray, 1);
    }

    #[test]
    fn labels_are_relative_to_home() {
        let home = Path::new("/Users/alice");
        assert_eq!(owner_relative_label(home, home), ".");
        assert_eq!(
            owner_relative_label(home, Path::new("/Users/alice/Music/Logic")),
            "Music/Logic"
        );
    }
}
