use std::io;
use std::path::Path;

use tracing::{debug, warn};

use crate::model::{ClassificationRecord, IgnoreReason, IgnoredPath};
use crate::registry::{normalize, PathRegistry};

#[derive(Debug, Default)]
pub struct Ledger {
    registry: PathRegistry,
    records: Vec<ClassificationRecord>,
    warnings: Vec<String>,
    listing_errors: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_warnings(warnings: Vec<String>) -> Self {
        Self {
            warnings,
            ..Self::default()
        }
    }

    pub fn registry(&self) -> &PathRegistry {
        &self.registry
    }

    pub fn is_registered(&self, path: &Path) -> bool {
        self.registry.contains(path)
    }

    pub fn accepts(&self, path: &Path) -> bool {
        !self.registry.covers(path) && !self.registry.has_registered_descendant(path)
    }

    /// Registers `path` and keeps `record`. Returns `false`, dropping the
    /// record, when the path or part of its subtree is already accounted for.
    pub fn record(&mut self, path: &Path, record: ClassificationRecord) -> bool {
        if !self.accepts(path) {
            debug!("{} already accounted for; dropping record", path.display());
            return false;
        }
        self.registry.register(path);
        debug!("registered {}", record.path());
        self.records.push(record);
        true
    }

    pub fn ignore(&mut self, path: &Path, reason: IgnoreReason) -> bool {
        self.record(
            path,
            ClassificationRecord::Ignored(IgnoredPath {
                path: display_path(path),
                reason,
            }),
        )
    }

    pub fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }

    pub fn listing_failed(&mut self, path: &Path, err: &io::Error) -> String {
        self.listing_errors += 1;
        let message = format!("listing failed for {}: {}", path.display(), err);
        self.warn(message.clone());
        message
    }

    pub fn records(&self) -> &[ClassificationRecord] {
        &self.records
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn listing_errors(&self) -> u64 {
        self.listing_errors
    }

    pub fn into_parts(self) -> (PathRegistry, Vec<ClassificationRecord>, Vec<String>, u64) {
        (
            self.registry,
            self.records,
            self.warnings,
            self.listing_errors,
        )
    }
}

pub fn display_path(path: &Path) -> String {
    normalize(path).to_string_lossy().to_string()
}
