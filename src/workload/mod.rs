//! Converts workload names to actual application code.
//!
//! # Example
//!
//! To get the hit-count application:
//! ```
//! # use anyhow::Result;
//! use pagecounts::workload;
//! # fn main() -> Result<()> {
//! let hits = workload::named("hits")?;
//! assert!(hits.reduce_fn.is_some());
//! # Ok(())
//! # }
//! ```

use crate::Workload;
use anyhow::{bail, Result};
use bytes::Bytes;
use clap::Parser;

pub mod find;
pub mod hits;
pub mod lines;
pub mod median;
pub mod tag;

/// Gets the [`Workload`] named `name`.
///
/// Returns [`None`] if no application with the given name was found.
pub fn try_named(name: &str) -> Option<Workload> {
    match name {
        "tag" => Some(Workload {
            map_fn: tag::map,
            combine_fn: None,
            reduce_fn: None,
        }),
        "lines" => Some(Workload {
            map_fn: lines::map,
            combine_fn: None,
            reduce_fn: None,
        }),
        "find" => Some(Workload {
            map_fn: find::map,
            combine_fn: None,
            reduce_fn: None,
        }),
        "hits" => Some(Workload {
            map_fn: hits::map,
            combine_fn: Some(hits::combine),
            reduce_fn: Some(hits::reduce),
        }),
        // no combiner: a median cannot be built from partial medians
        "median" => Some(Workload {
            map_fn: median::map,
            combine_fn: None,
            reduce_fn: Some(median::reduce),
        }),
        _ => None,
    }
}

/// Gets the [`Workload`] named `name`.
///
/// Returns an [`anyhow::Error`] if no application with the given name was found.
pub fn named(name: &str) -> Result<Workload> {
    match try_named(name) {
        Some(app) => Ok(app),
        None => bail!("No app named `{}` found.", name),
    }
}

/// Parses the JSON argv a plan hands to its functions. Empty means no flags.
pub(crate) fn parse_aux<T: Parser>(aux: &Bytes) -> Result<T> {
    let argv: Vec<String> = if aux.is_empty() {
        Vec::new()
    } else {
        serde_json::from_slice(aux)?
    };
    Ok(T::try_parse_from(argv)?)
}
