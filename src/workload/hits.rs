//! Sums hits per (date, hour, language) over the rows passing the row filter.
//!
//! Map emits `date-hour-lang -> hits`, the combiner and the reducer add
//! them up, and the reducer renders each total as `date,hour,lang,count`.

use crate::output::{format_count_row, AggKey};
use crate::record::Fields;
use crate::utils::{string_from_bytes, u64_from_bytes, u64_to_bytes};
use crate::workload::{find::Args, parse_aux};
use crate::*;
use anyhow::{anyhow, Result};
use bytes::Bytes;

pub fn map(kv: KeyValue, aux: Bytes) -> MapOutput {
    let args: Args = parse_aux(&aux)?;
    let filter = args.row_filter()?;
    let policy = args.malformed;

    let s = string_from_bytes(kv.value)?;
    let mut pairs = Vec::new();
    for line in s.lines() {
        let Some(fields) = policy.screen(Fields::split(line))? else {
            continue;
        };
        if !filter.matches(&fields) {
            continue;
        }
        let Some(hits) = policy.screen(fields.hits())? else {
            continue;
        };
        let Some(key) = policy.screen(AggKey::from_fields(&fields))? else {
            continue;
        };
        pairs.push((key.encode(), hits));
    }

    let iter = pairs
        .into_iter()
        .map(|(key, hits)| Ok(KeyValue::new(Bytes::from(key), u64_to_bytes(hits))));
    Ok(Box::new(iter))
}

fn total(values: Box<dyn Iterator<Item = Bytes> + '_>) -> Result<u64> {
    let mut sum = 0u64;
    for value in values {
        sum = sum
            .checked_add(u64_from_bytes(value)?)
            .ok_or_else(|| anyhow!("hit count overflows u64"))?;
    }
    Ok(sum)
}

/// Partial sums, still encoded as counts.
pub fn combine(
    _key: Bytes,
    values: Box<dyn Iterator<Item = Bytes> + '_>,
    _aux: Bytes,
) -> Result<Bytes> {
    Ok(u64_to_bytes(total(values)?))
}

pub fn reduce(
    key: Bytes,
    values: Box<dyn Iterator<Item = Bytes> + '_>,
    _aux: Bytes,
) -> Result<Bytes> {
    let count = total(values)?;
    let key = AggKey::decode(&string_from_bytes(key)?)?;
    Ok(Bytes::from(format_count_row(&key, count)))
}
