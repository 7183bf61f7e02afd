use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PackageCategory {
    Cask,
    Formula,
}

/// Implementations never fail: an unavailable tool yields an empty list.
pub trait PackageSource {
    fn name(&self) -> Option<&str>;

    fn installed(&self, category: PackageCategory) -> Vec<String>;
}

#[derive(Debug, Clone)]
pub struct BrewCli {
    program: String,
}

impl BrewCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[&str]) -> Vec<String> {
        let output = match Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
        {
            Ok(output) => output,
            Err(err) => {
                debug!("{} {:?} unavailable: {}", self.program, args, err);
                return Vec::new();
            }
        };
        if !output.status.success() {
            debug!(
                "{} {:?} exited with {}; treating as empty",
                self.program, args, output.status
            );
            return Vec::new();
        }
        parse_lines(&String::from_utf8_lossy(&output.stdout))
    }
}

impl PackageSource for BrewCli {
    fn name(&self) -> Option<&str> {
        Some(&self.program)
    }

    fn installed(&self, category: PackageCategory) -> Vec<String> {
        match category {
            PackageCategory::Cask => self.run(&["list", "--cask"]),
            PackageCategory::Formula => self.run(&["leaves"]),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticPackages {
    pub casks: Vec<String>,
    pub formulas: Vec<String>,
}

impl PackageSource for StaticPackages {
    fn name(&self) -> Option<&str> {
        None
    }

    fn installed(&self, category: PackageCategory) -> Vec<String> {
        match category {
            PackageCategory::Cask => self.casks.clone(),
            PackageCategory::Formula => self.formulas.clone(),
        }
    }
}

fn parse_lines(stdout: &str) -> Vec<String> {
    let mut names = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
    names.sort();
    names.dedup();
    names
}
