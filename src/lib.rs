//! Map/reduce over Wikipedia page-traffic logs.
//!
//! Raw hourly dumps are tagged with the date and hour found in their
//! filename, then filtered and aggregated by a small standalone engine.
//! The same data can be loaded into a typed table and queried with SQL.
//!
//! Users describe a computation as a [`plan::Plan`] built from map and
//! reduce functions, and hand it to a [`standalone::engine::Engine`]
//! together with a terminal [`plan::Action`].

use bytes::Bytes;
use std::hash::Hasher;

pub mod config;
pub mod error;
pub mod output;
pub mod plan;
pub mod record;
pub mod standalone;
pub mod table;
pub mod tagger;
pub mod utils;
pub mod workload;

/////////////////////////////////////////////////////////////////////////////
// MapReduce application types
/////////////////////////////////////////////////////////////////////////////

/// The output of an application map function.
///
/// There are 2 layers of [`anyhow::Result`]s here. The outer layer
/// accounts for errors that arise while creating the iterator.
/// The inner layer accounts for errors that occur during iteration.
///
/// This accomodates both batch (all keys emitted at once) and lazy
/// (keys only emitted when the iterator is consumed) map operations.
pub type MapOutput = anyhow::Result<Box<dyn Iterator<Item = anyhow::Result<KeyValue>>>>;

/// A map function takes a key-value pair and auxiliary arguments.
///
/// It returns an iterator that yields new key-value pairs.
pub type MapFn = fn(kv: KeyValue, aux: Bytes) -> MapOutput;

/// A reduce function takes in a key, an iterator over values for that key,
/// and an auxiliary argument. It returns an [`anyhow::Result`]
/// containing a single output value.
pub type ReduceFn = fn(
    key: Bytes,
    values: Box<dyn Iterator<Item = Bytes> + '_>,
    aux: Bytes,
) -> anyhow::Result<Bytes>;

/// A combine function has the shape of a [`ReduceFn`], but its output must
/// be encoded like its inputs so it can be fed to the reducer again.
///
/// Only associative, commutative reductions may register one.
pub type CombineFn = ReduceFn;

/// A map reduce application.
///
/// A workload without a reduce function is map-only: its output is
/// redistributed across partitions instead of grouped by key.
#[derive(Copy, Clone)]
pub struct Workload {
    pub map_fn: MapFn,
    pub combine_fn: Option<CombineFn>,
    pub reduce_fn: Option<ReduceFn>,
}

/////////////////////////////////////////////////////////////////////////////
// Key-value pairs
/////////////////////////////////////////////////////////////////////////////

/// A single key-value pair.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct KeyValue {
    /// The key.
    pub key: Bytes,
    /// The value.
    pub value: Bytes,
}

impl KeyValue {
    /// Construct a new key-value pair from the given key and value.
    pub fn new(key: Bytes, value: Bytes) -> Self {
        Self { key, value }
    }

    /// Get the key of this key-value pair.
    ///
    /// This method is cheap, since [`Bytes`] are cheaply cloneable.
    #[inline]
    pub fn key(&self) -> Bytes {
        self.key.clone()
    }

    /// Get the value of this key-value pair.
    ///
    /// This method is cheap, since [`Bytes`] are cheaply cloneable.
    #[inline]
    pub fn value(&self) -> Bytes {
        self.value.clone()
    }

    /// Consumes the key-value pair and returns the value.
    #[inline]
    pub fn into_value(self) -> Bytes {
        self.value
    }
}

/// Hashes an intermediate key. Compute a reduce bucket for a given key
/// by calculating `ihash(key) % n_reduce`.
pub fn ihash(key: &[u8]) -> u32 {
    let mut hasher = fnv::FnvHasher::with_key(0);
    hasher.write(key);
    let value = hasher.finish() & 0x7fffffff;
    // masked to 31 bits above
    value as u32
}
