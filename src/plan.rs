//! Deferred computations.
//!
//! A [`Plan`] names its input files and a chain of [`Stage`]s. Nothing runs
//! while it is being built; [`crate::standalone::engine::Engine::materialize`]
//! executes it for one terminal [`Action`].

use std::path::PathBuf;

use anyhow::{bail, Result};
use bytes::Bytes;

use crate::{CombineFn, KeyValue, MapFn, ReduceFn, Workload};

/// One step of a plan.
#[derive(Clone, Copy)]
pub enum Stage {
    /// Flat-maps every record of every partition. Partitioning is unchanged.
    Map(MapFn),
    /// Spreads records round-robin over `n` partitions.
    Repartition(u32),
    /// Hash-partitions by key, groups equal keys and reduces each group.
    ReduceByKey {
        reduce_fn: ReduceFn,
        combine_fn: Option<CombineFn>,
        partitions: u32,
    },
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Map(_) => write!(f, "Map"),
            Stage::Repartition(n) => write!(f, "Repartition({n})"),
            Stage::ReduceByKey {
                combine_fn,
                partitions,
                ..
            } => write!(
                f,
                "ReduceByKey(partitions={partitions}, combine={})",
                combine_fn.is_some()
            ),
        }
    }
}

/// The terminal operation that makes a plan run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Number of records after the last stage.
    Count,
    /// Every record after the last stage, partition by partition.
    Collect,
    /// The first `n` records, in partition order.
    Take(usize),
    /// One `part-NNNNN` file per final partition, each record's value on a line.
    Save(PathBuf),
}

/// What an [`Action`] produced.
#[derive(Debug)]
pub enum Materialized {
    Count(u64),
    Records(Vec<KeyValue>),
    Saved { dir: PathBuf, files: usize, records: u64 },
}

impl Materialized {
    pub fn count(self) -> Result<u64> {
        match self {
            Materialized::Count(n) => Ok(n),
            other => bail!("expected a count, got {other:?}"),
        }
    }

    pub fn records(self) -> Result<Vec<KeyValue>> {
        match self {
            Materialized::Records(records) => Ok(records),
            other => bail!("expected records, got {other:?}"),
        }
    }
}

/// Whole input files, one `(path, content)` record each, followed by stages.
#[derive(Debug, Clone)]
pub struct Plan {
    pub input: String,
    pub stages: Vec<Stage>,
    /// Handed to every map, combine and reduce function.
    pub aux: Bytes,
}

impl Plan {
    /// Starts from the files matching the glob `input`.
    pub fn read(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            stages: Vec::new(),
            aux: Bytes::new(),
        }
    }

    /// Serializes workload arguments the way map and reduce functions parse them.
    pub fn with_args(mut self, args: &[String]) -> Result<Self> {
        self.aux = Bytes::from(serde_json::to_string(args)?);
        Ok(self)
    }

    pub fn map(mut self, map_fn: MapFn) -> Self {
        self.stages.push(Stage::Map(map_fn));
        self
    }

    pub fn repartition(mut self, n: u32) -> Self {
        self.stages.push(Stage::Repartition(n));
        self
    }

    pub fn reduce_by_key(
        mut self,
        reduce_fn: ReduceFn,
        combine_fn: Option<CombineFn>,
        partitions: u32,
    ) -> Self {
        self.stages.push(Stage::ReduceByKey {
            reduce_fn,
            combine_fn,
            partitions,
        });
        self
    }

    /// Appends a workload: its map, then either its reduction or, for a
    /// map-only workload, a repartition.
    pub fn workload(self, workload: Workload, partitions: u32) -> Self {
        let plan = self.map(workload.map_fn);
        match workload.reduce_fn {
            Some(reduce_fn) => plan.reduce_by_key(reduce_fn, workload.combine_fn, partitions),
            None => plan.repartition(partitions),
        }
    }

    /// Rejects plans the engine cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.input.is_empty() {
            bail!("plan has no input");
        }
        for stage in &self.stages {
            match stage {
                Stage::Repartition(0) | Stage::ReduceByKey { partitions: 0, .. } => {
                    bail!("stage {stage:?} needs at least one partition")
                }
                _ => {}
            }
        }
        Ok(())
    }
}
