//! Map-only workload emitting one record per line of every input file.
//!

use crate::utils::string_from_bytes;
use crate::*;
use bytes::Bytes;

pub fn map(kv: KeyValue, _aux: Bytes) -> MapOutput {
    let s = string_from_bytes(kv.value())?;
    let key = kv.key;
    let lines = s.lines().map(str::to_string).collect::<Vec<_>>();
    let iter = lines
        .into_iter()
        .map(move |line| Ok(KeyValue::new(key.clone(), Bytes::from(line))));
    Ok(Box::new(iter))
}
