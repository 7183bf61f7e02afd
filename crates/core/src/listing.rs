use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::rules::RuleSet;

#[derive(Debug, Clone)]
pub struct ChildEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    pub is_symlink: bool,
}

pub fn read_children(dir: &Path) -> io::Result<Vec<ChildEntry>> {
    let mut children = Vec::new();
    for item in fs::read_dir(dir)? {
        let Ok(entry) = item else {
            continue;
        };
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        children.push(ChildEntry {
            name: entry.file_name().to_string_lossy().to_string(),
            path: entry.path(),
            is_dir: file_type.is_dir(),
            is_symlink: file_type.is_symlink(),
        });
    }
    children.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(children)
}

pub fn shallow_listing(dir: &Path, rules: &RuleSet) -> io::Result<Vec<String>> {
    Ok(read_children(dir)?
        .into_iter()
        .filter(|child| !rules.is_hidden_name(&child.name))
        .map(|child| child.name)
        .collect())
}

pub fn is_real_dir(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|metadata| metadata.is_dir())
}
