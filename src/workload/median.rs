//! Median page size per language.
//!
//! Unlike a sum, a median needs every value of its key at once, so this
//! workload registers no combiner and the reducer sorts the full group.

use crate::output::format_median_row;
use crate::record::{Fields, MalformedPolicy};
use crate::utils::{string_from_bytes, u64_from_bytes, u64_to_bytes};
use crate::workload::parse_aux;
use crate::*;
use anyhow::{bail, Result};
use bytes::Bytes;
use clap::Parser;

#[derive(Parser, Debug)]
#[clap(no_binary_name = true)]
struct Args {
    #[clap(long, value_enum, default_value_t = MalformedPolicy::Drop)]
    malformed: MalformedPolicy,
}

pub fn map(kv: KeyValue, aux: Bytes) -> MapOutput {
    let args: Args = parse_aux(&aux)?;
    let s = string_from_bytes(kv.value)?;
    let mut pairs = Vec::new();
    for line in s.lines() {
        let Some(fields) = args.malformed.screen(Fields::split(line))? else {
            continue;
        };
        let Some(size) = args.malformed.screen(fields.size())? else {
            continue;
        };
        pairs.push((fields.lang.to_string(), size));
    }

    let iter = pairs
        .into_iter()
        .map(|(lang, size)| Ok(KeyValue::new(Bytes::from(lang), u64_to_bytes(size))));
    Ok(Box::new(iter))
}

/// Middle value of `values`, or the mean of the two middle values when the
/// count is even. Reorders `values`.
pub fn median(values: &mut [u64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid] as f64)
    } else {
        Some((values[mid - 1] as f64 + values[mid] as f64) / 2.0)
    }
}

pub fn reduce(
    key: Bytes,
    values: Box<dyn Iterator<Item = Bytes> + '_>,
    _aux: Bytes,
) -> Result<Bytes> {
    let mut sizes = values.map(u64_from_bytes).collect::<Result<Vec<u64>>>()?;
    let lang = string_from_bytes(key)?;
    let Some(med) = median(&mut sizes) else {
        bail!("no values for language '{lang}'");
    };
    Ok(Bytes::from(format_median_row(&lang, med)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_and_even_medians() {
        assert_eq!(median(&mut []), None);
        assert_eq!(median(&mut [7]), Some(7.0));
        assert_eq!(median(&mut [9, 1, 5]), Some(5.0));
        assert_eq!(median(&mut [4, 1, 3, 2]), Some(2.5));
        assert_eq!(median(&mut [10, 10, 1, 10]), Some(10.0));
    }

    #[test]
    fn large_sizes_do_not_overflow() {
        assert_eq!(median(&mut [u64::MAX, u64::MAX]), Some(u64::MAX as f64));
    }

    #[test]
    fn map_keys_by_language() {
        let kv = KeyValue::new(
            Bytes::from("dated/part-00000"),
            Bytes::from("20081104 110000 en Barack_Obama 13890 2291741206\nbad\n"),
        );
        let out: Vec<(String, u64)> = map(kv, Bytes::new())
            .unwrap()
            .map(|kv| {
                let kv = kv.unwrap();
                (
                    string_from_bytes(kv.key).unwrap(),
                    u64_from_bytes(kv.value).unwrap(),
                )
            })
            .collect();
        assert_eq!(out, vec![("en".to_string(), 2291741206)]);
    }

    #[test]
    fn reduce_formats_row() {
        let values = vec![u64_to_bytes(3), u64_to_bytes(1), u64_to_bytes(2), u64_to_bytes(10)];
        let out = reduce(Bytes::from("de"), Box::new(values.into_iter()), Bytes::new()).unwrap();
        assert_eq!(out, Bytes::from("de,2.5"));
    }
}
