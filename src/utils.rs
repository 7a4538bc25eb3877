//! Utility functions shared by the engine and the workloads.
//!

use anyhow::{Context, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use flate2::read::GzDecoder;
use std::{fs::File, io::Read, path::Path};

/// Read an entire [`Bytes`] slice into a [`String`].
///
/// Returns an error if the slice contains invalid UTF-8.
pub fn string_from_bytes(buf: Bytes) -> Result<String> {
    Ok(String::from_utf8(buf.as_ref().into())?)
}

/// Encode a count the way the summing workloads exchange values.
#[inline]
pub fn u64_to_bytes(n: u64) -> Bytes {
    let mut buf = BytesMut::with_capacity(8);
    buf.put_u64(n);
    buf.freeze()
}

/// Decode a value written by [`u64_to_bytes`].
pub fn u64_from_bytes(mut buf: Bytes) -> Result<u64> {
    anyhow::ensure!(buf.len() == 8, "expected 8 bytes, got {}", buf.len());
    Ok(buf.get_u64())
}

/// Reads a whole input file, gunzipping it when the name ends in `.gz`.
pub fn read_input(path: &Path) -> Result<Bytes> {
    let mut buf = Vec::new();
    {
        // a scope so that the file is closed right after reading
        let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let read = if path.extension().is_some_and(|ext| ext == "gz") {
            GzDecoder::new(file).read_to_end(&mut buf)
        } else {
            file.read_to_end(&mut buf)
        };
        read.with_context(|| format!("reading {}", path.display()))?;
    }
    Ok(Bytes::from(buf))
}
