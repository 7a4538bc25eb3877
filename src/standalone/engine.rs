use anyhow::{bail, Context, Result};
use bytes::Bytes;
use dashmap::DashMap;
use glob::glob;
use itertools::Itertools;
use rayon::prelude::*;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::plan::{Action, Materialized, Plan, Stage};
use crate::utils::read_input;
use crate::*;

/// Prefix of every file written by [`Action::Save`].
pub const PART_PREFIX: &str = "part-";
/// Empty file marking a completely written output directory.
pub const SUCCESS_MARKER: &str = "_SUCCESS";

// types related to this engine
type BucketIndex = u32;
type Buckets = DashMap<BucketIndex, Vec<KeyValue>>;
type Partition = Vec<KeyValue>;

/// Runs plans on a private worker pool.
///
/// Create one with [`Engine::new`], pass it to whatever needs to run a
/// plan, and release its threads with [`Engine::shutdown`].
pub struct Engine {
    config: EngineConfig,
    pool: rayon::ThreadPool,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|i| format!("pagecounts-worker-{i}"));
        if let Some(n) = config.threads {
            builder = builder.num_threads(n);
        }
        let pool = builder.build().context("starting worker pool")?;
        info!(threads = pool.current_num_threads(), "engine started");
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Executes `plan` and performs `action` on its result.
    pub fn materialize(&self, plan: &Plan, action: Action) -> Result<Materialized> {
        plan.validate()?;
        if let Action::Save(dir) = &action {
            if dir.exists() {
                bail!("output directory {} already exists", dir.display());
            }
        }
        let partitions = self.pool.install(|| execute(plan))?;
        match action {
            Action::Count => Ok(Materialized::Count(
                partitions.iter().map(|p| p.len() as u64).sum(),
            )),
            Action::Collect => Ok(Materialized::Records(
                partitions.into_iter().flatten().collect(),
            )),
            Action::Take(n) => Ok(Materialized::Records(
                partitions.into_iter().flatten().take(n).collect(),
            )),
            Action::Save(dir) => save_partitions(&partitions, &dir),
        }
    }

    pub fn shutdown(self) {
        info!("engine stopped");
        drop(self.pool);
    }
}

fn execute(plan: &Plan) -> Result<Vec<Partition>> {
    let mut partitions = read_source(&plan.input)?;
    for (index, stage) in plan.stages.iter().enumerate() {
        let started = Instant::now();
        partitions = match *stage {
            Stage::Map(map_fn) => perform_map(partitions, map_fn, &plan.aux)?,
            Stage::Repartition(n) => perform_repartition(partitions, n),
            Stage::ReduceByKey {
                reduce_fn,
                combine_fn,
                partitions: n,
            } => {
                let buckets = perform_shuffle(partitions, n, combine_fn, &plan.aux)?;
                perform_reduce(buckets, n, reduce_fn, &plan.aux)?
            }
        };
        info!(
            stage = index,
            kind = ?stage,
            partitions = partitions.len(),
            records = partitions.iter().map(Vec::len).sum::<usize>(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "stage finished"
        );
    }
    Ok(partitions)
}

/// One partition per input file, holding a single `<path, content>` record.
fn read_source(input: &str) -> Result<Vec<Partition>> {
    // Iterator going through all files matching the input glob
    let mut paths: Vec<PathBuf> = glob(input)?
        .flatten()
        .filter(|path| path.is_file())
        .collect();
    if paths.is_empty() {
        bail!("no input files match {input}");
    }
    paths.sort();
    info!(files = paths.len(), input, "reading input");
    paths
        .par_iter()
        .map(|pathspec| -> Result<Partition> {
            let buf = read_input(pathspec)?;
            debug!(file = %pathspec.display(), bytes = buf.len(), "read input file");
            let filename = pathspec.to_string_lossy().into_owned();
            Ok(vec![KeyValue::new(Bytes::from(filename), buf)])
        })
        .collect()
}

pub fn perform_map(partitions: Vec<Partition>, map_fn: MapFn, aux: &Bytes) -> Result<Vec<Partition>> {
    partitions
        .into_par_iter()
        .map(|partition| -> Result<Partition> {
            let mut out = Vec::new();
            for kv in partition {
                for item in map_fn(kv, aux.clone())? {
                    out.push(item?);
                }
            }
            Ok(out)
        })
        .collect()
}

/// Deals records round-robin; partition `i` starts dealing at output `i`.
pub fn perform_repartition(partitions: Vec<Partition>, n: u32) -> Vec<Partition> {
    let n = n as usize;
    let mut out: Vec<Partition> = (0..n).map(|_| Vec::new()).collect();
    for (i, partition) in partitions.into_iter().enumerate() {
        for (j, kv) in partition.into_iter().enumerate() {
            out[(i + j) % n].push(kv);
        }
    }
    out
}

/// Groups sorted records by key and folds each group with `fold_fn`.
fn fold_groups(mut records: Partition, fold_fn: ReduceFn, aux: &Bytes) -> Result<Partition> {
    records.sort_by_key(KeyValue::key);
    let mut out = Vec::new();
    for (key, value_group) in &records.into_iter().chunk_by(KeyValue::key) {
        let iter = value_group.map(KeyValue::into_value);
        let value = fold_fn(key.clone(), Box::new(iter), aux.clone())?;
        out.push(KeyValue::new(key, value));
    }
    Ok(out)
}

/// Moves every record into bucket `ihash(key) % n`, pre-combining each
/// input partition when the reduction allows it.
pub fn perform_shuffle(
    partitions: Vec<Partition>,
    n: u32,
    combine_fn: Option<CombineFn>,
    aux: &Bytes,
) -> Result<Buckets> {
    let buckets = Buckets::new();
    partitions
        .into_par_iter()
        .try_for_each(|partition| -> Result<()> {
            let partition = match combine_fn {
                Some(combine_fn) => fold_groups(partition, combine_fn, aux)?,
                None => partition,
            };
            let mut local: Vec<Partition> = (0..n).map(|_| Vec::new()).collect();
            for kv in partition {
                local[(ihash(&kv.key) % n) as usize].push(kv);
            }
            for (bucket_no, kvs) in local.into_iter().enumerate() {
                if !kvs.is_empty() {
                    buckets
                        .entry(bucket_no as BucketIndex)
                        .or_default()
                        .extend(kvs);
                }
            }
            Ok(())
        })?;
    Ok(buckets)
}

/// Reduces each bucket into the output partition with the same index.
pub fn perform_reduce(
    buckets: Buckets,
    n: u32,
    reduce_fn: ReduceFn,
    aux: &Bytes,
) -> Result<Vec<Partition>> {
    let reduced: Vec<(BucketIndex, Partition)> = buckets
        .into_par_iter()
        .map(|(reduce_id, bkt)| -> Result<(BucketIndex, Partition)> {
            Ok((reduce_id, fold_groups(bkt, reduce_fn, aux)?))
        })
        .collect::<Result<_>>()?;
    let mut out: Vec<Partition> = (0..n).map(|_| Vec::new()).collect();
    for (reduce_id, partition) in reduced {
        out[reduce_id as usize] = partition;
    }
    Ok(out)
}

/// Writes into a sibling staging directory and renames it into place, so a
/// reader never sees a partly written output. Two runs racing on the same
/// `dir` are not locked against each other; the later rename fails.
fn save_partitions(partitions: &[Partition], dir: &Path) -> Result<Materialized> {
    let name = dir
        .file_name()
        .with_context(|| format!("output path {} has no directory name", dir.display()))?;
    let staging = dir.with_file_name(format!(
        ".{}.staging-{}",
        name.to_string_lossy(),
        Uuid::new_v4()
    ));
    fs::create_dir_all(&staging)
        .with_context(|| format!("creating {}", staging.display()))?;

    let written = write_parts(partitions, &staging).and_then(|records| {
        fs::rename(&staging, dir)
            .with_context(|| format!("moving output into {}", dir.display()))?;
        Ok(records)
    });
    let records = match written {
        Ok(records) => records,
        Err(e) => {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }
    };
    info!(dir = %dir.display(), files = partitions.len(), records, "output saved");
    Ok(Materialized::Saved {
        dir: dir.to_path_buf(),
        files: partitions.len(),
        records,
    })
}

fn write_parts(partitions: &[Partition], staging: &Path) -> Result<u64> {
    let mut records = 0;
    for (reduce_id, partition) in partitions.iter().enumerate() {
        let out_pathspec = staging.join(format!("{PART_PREFIX}{reduce_id:05}"));
        let mut out_file = BufWriter::new(File::create(&out_pathspec)?);
        for kv in partition {
            out_file.write_all(&kv.value)?;
            out_file.write_all(b"\n")?;
            records += 1;
        }
        out_file.flush()?;
    }
    File::create(staging.join(SUCCESS_MARKER))?;
    Ok(records)
}
