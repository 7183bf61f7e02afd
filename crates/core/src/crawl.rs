//! Full top-down sweep of the root that only reports what no earlier pass
//! accounted for.
//!
//! Each directory reached is classified once, before any descent:
//!
//! | registered | symlink | registered descendant | decision |
//! |------------|---------|-----------------------|----------|
//! | yes        | any     | any                   | Skip     |
//! | no         | yes     | any                   | Symlink  |
//! | no         | no      | yes                   | Drill    |
//! | no         | no      | no                    | Record   |
//!
//! Skip and Symlink end the branch, Drill descends without recording, Record
//! captures a one-level listing and ends the branch. Files and symlinks to
//! files are never evaluated.

use std::path::{Component, Path};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::ledger::Ledger;
use crate::model::IgnoreReason;
use crate::registry::PathRegistry;
use crate::rules::RuleSet;
use crate::summarize::{record_gray, Owner};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CrawlDecision {
    Skip,
    Symlink,
    Drill,
    Record,
}

pub fn classify(registry: &PathRegistry, path: &Path, is_symlink: bool) -> CrawlDecision {
    if registry.contains(path) {
        CrawlDecision::Skip
    } else if is_symlink {
        CrawlDecision::Symlink
    } else if registry.has_registered_descendant(path) {
        CrawlDecision::Drill
    } else {
        CrawlDecision::Record
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlStats {
    pub visited: u64,
    pub skipped: u64,
    pub symlinks: u64,
    pub drilled: u64,
    pub recorded: u64,
    pub walk_errors: u64,
    pub cancelled: bool,
}

impl CrawlStats {
    fn count(&mut self, decision: CrawlDecision) {
        self.visited += 1;
        match decision {
            CrawlDecision::Skip => self.skipped += 1,
            CrawlDecision::Symlink => self.symlinks += 1,
            CrawlDecision::Drill => self.drilled += 1,
            CrawlDecision::Record => self.recorded += 1,
        }
    }
}

pub struct Crawl<'a> {
    pub root: &'a Path,
    /// Directories strictly below this path route to the owner named by
    /// their first segment.
    pub users_dir: &'a Path,
    pub rules: &'a RuleSet,
    pub cancel_flag: Option<&'a AtomicBool>,
}

impl Crawl<'_> {
    pub fn run(&self, ledger: &mut Ledger) -> CrawlStats {
        self.run_with_observer(ledger, &mut |_, _| {})
    }

    pub fn run_with_observer(
        &self,
        ledger: &mut Ledger,
        on_step: &mut dyn FnMut(&Path, CrawlDecision),
    ) -> CrawlStats {
        let mut stats = CrawlStats::default();
        let mut iter = WalkDir::new(self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        loop {
            let entry = match iter.next() {
                None => break,
                Some(Ok(entry)) => entry,
                Some(Err(err)) => {
                    stats.walk_errors += 1;
                    match (err.path(), err.io_error()) {
                        (Some(path), Some(io_err)) => {
                            ledger.listing_failed(path, io_err);
                        }
                        _ => ledger.warn(format!("walk error under {}: {}", self.root.display(), err)),
                    }
                    continue;
                }
            };

            if self
                .cancel_flag
                .is_some_and(|flag| flag.load(Ordering::Relaxed))
            {
                stats.cancelled = true;
                ledger.warn(format!(
                    "crawl canceled at {}; report contains partial data",
                    entry.path().display()
                ));
                break;
            }

            let file_type = entry.file_type();
            let is_symlink = entry.path_is_symlink();
            if !file_type.is_dir() && !(is_symlink && entry.path().is_dir()) {
                continue;
            }

            let path = entry.path();
            let decision = classify(ledger.registry(), path, is_symlink);
            stats.count(decision);
            on_step(path, decision);

            match decision {
                CrawlDecision::Drill => {
                    debug!("drilling into {}", path.display());
                }
                CrawlDecision::Skip | CrawlDecision::Symlink => {
                    if file_type.is_dir() {
                        iter.skip_current_dir();
                    }
                }
                CrawlDecision::Record => {
                    if file_type.is_dir() {
                        iter.skip_current_dir();
                    }
                    // Lists the directory again; walkdir does not expose the entries it read.
                    self.record(ledger, path);
                }
            }
        }

        info!(
            "crawl visited {} director(ies): {} skipped, {} symlink(s), {} drilled, {} recorded",
            stats.visited, stats.skipped, stats.symlinks, stats.drilled, stats.recorded
        );
        stats
    }

    fn record(&self, ledger: &mut Ledger, path: &Path) {
        if self.rules.is_noise_path(path) {
            ledger.ignore(path, IgnoreReason::Noise);
            return;
        }
        let owner = owner_of(self.users_dir, path);
        record_gray(ledger, self.rules, path, owner.as_ref());
    }
}

pub fn owner_of(users_dir: &Path, path: &Path) -> Option<Owner> {
    let relative = path.strip_prefix(users_dir).ok()?;
    match relative.components().next()? {
        Component::Normal(name) => Some(Owner {
            name: name.to_string_lossy().to_string(),
            home: users_dir.join(name),
        }),
        _ => None,
    }
}
