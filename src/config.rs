//! Engine tuning knobs and the dataset layout under a base directory.

use std::path::{Path, PathBuf};

use crate::record::MalformedPolicy;
use crate::standalone::engine::PART_PREFIX;

/// Output files written by the tagging stage.
pub const DEFAULT_PARTITIONS: u32 = 960;
/// Buckets used when grouping by key.
pub const DEFAULT_REDUCE_PARTITIONS: u32 = 11;

/// Subdirectory holding the raw hourly dumps.
pub const RAW_DIR: &str = "raw";
/// Subdirectory the tagged lines are written to.
pub const DATED_DIR: &str = "dated";
/// Subdirectory the per-key hit counts are written to.
pub const COUNTS_DIR: &str = "obama-counts";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Worker threads; `None` lets rayon pick one per core.
    pub threads: Option<usize>,
    pub partitions: u32,
    pub reduce_partitions: u32,
    pub malformed: MalformedPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: None,
            partitions: DEFAULT_PARTITIONS,
            reduce_partitions: DEFAULT_REDUCE_PARTITIONS,
            malformed: MalformedPolicy::default(),
        }
    }
}

/// Where the stages read and write, relative to one base directory.
#[derive(Debug, Clone)]
pub struct Layout {
    pub base: PathBuf,
}

impl Layout {
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
        }
    }

    /// Glob matching every raw dump.
    pub fn raw_glob(&self) -> String {
        glob_under(&self.base.join(RAW_DIR))
    }

    pub fn dated_dir(&self) -> PathBuf {
        self.base.join(DATED_DIR)
    }

    /// Glob matching the tagged partition files, skipping markers like `_SUCCESS`.
    pub fn dated_glob(&self) -> String {
        format!("{}/{PART_PREFIX}*", self.dated_dir().display())
    }

    pub fn counts_dir(&self) -> PathBuf {
        self.base.join(COUNTS_DIR)
    }
}

fn glob_under(dir: &Path) -> String {
    format!("{}/*", dir.display())
}
