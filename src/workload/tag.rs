//! Map-only workload prefixing raw lines with their file's date and hour.
//!

use crate::tagger::FileTag;
use crate::utils::string_from_bytes;
use crate::*;
use anyhow::Context;
use bytes::Bytes;

pub fn map(kv: KeyValue, _aux: Bytes) -> MapOutput {
    let filename = string_from_bytes(kv.key())?;
    let tag = FileTag::from_path(&filename)
        .with_context(|| format!("cannot tag {filename}"))?;
    // raw dumps are percent-encoded ASCII; stray bytes are replaced, not fatal
    let content = String::from_utf8_lossy(&kv.value);
    let lines = tag.tag_lines(&content).collect::<Vec<_>>();

    let key = kv.key;
    let iter = lines
        .into_iter()
        .map(move |line| Ok(KeyValue::new(key.clone(), Bytes::from(line))));
    Ok(Box::new(iter))
}
