//! Map-only workload keeping the tagged lines that pass the row filter.
//!

use crate::record::{MalformedPolicy, RowFilter, DEFAULT_SITE_PATTERN};
use crate::utils::string_from_bytes;
use crate::workload::parse_aux;
use crate::*;
use bytes::Bytes;
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug, Serialize, Deserialize)]
#[clap(no_binary_name = true)]
pub(crate) struct Args {
    #[clap(short, long, default_value = DEFAULT_SITE_PATTERN)]
    pub regex: String,
    #[clap(short, long)]
    pub lang: Option<String>,
    #[clap(long, value_enum, default_value_t = MalformedPolicy::Drop)]
    pub malformed: MalformedPolicy,
}

impl Args {
    pub fn row_filter(&self) -> anyhow::Result<RowFilter> {
        Ok(RowFilter::new(&self.regex, self.lang.clone())?)
    }
}

pub fn map(kv: KeyValue, aux: Bytes) -> MapOutput {
    let args: Args = parse_aux(&aux)?;
    let filter = args.row_filter()?;

    let s = string_from_bytes(kv.value())?;
    let mut matched = Vec::new();
    for line in s.lines() {
        if args.malformed.screen(filter.check(line))? == Some(true) {
            matched.push(line.to_string());
        }
    }

    let key = kv.key;
    let iter = matched
        .into_iter()
        .map(move |line| Ok(KeyValue::new(key.clone(), Bytes::from(line))));
    Ok(Box::new(iter))
}
