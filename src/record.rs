//! Tagged page-traffic lines and the predicates applied to them.
//!
//! A tagged line looks like `20081104 110000 en Barack_Obama 13890 2291741206`:
//! date, hour, language, site, hits and page size separated by single spaces.
//! [`Fields`] splits a line without copying, [`PageView`] is the typed row,
//! and [`RowFilter`] is the predicate used before aggregation.

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::RecordError;

/// Number of fields a tagged line must carry.
pub const FIELD_COUNT: usize = 6;

/// The positional fields of a tagged line, borrowed from the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fields<'a> {
    pub date: &'a str,
    pub hour: &'a str,
    pub lang: &'a str,
    pub site: &'a str,
    pub hits: &'a str,
    pub size: &'a str,
}

impl<'a> Fields<'a> {
    /// Splits on single spaces. Fields past the sixth are ignored.
    pub fn split(line: &'a str) -> Result<Self, RecordError> {
        let mut it = line.split(' ');
        let mut vals = [""; FIELD_COUNT];
        for (i, slot) in vals.iter_mut().enumerate() {
            *slot = it.next().ok_or_else(|| RecordError::TooFewFields {
                line: line.to_string(),
                found: i,
            })?;
        }
        let [date, hour, lang, site, hits, size] = vals;
        Ok(Self {
            date,
            hour,
            lang,
            site,
            hits,
            size,
        })
    }

    pub fn hits(&self) -> Result<u64, RecordError> {
        parse_int("hits", self.hits)
    }

    pub fn size(&self) -> Result<u64, RecordError> {
        parse_int("size", self.size)
    }
}

fn parse_int<T>(field: &'static str, value: &str) -> Result<T, RecordError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    value.parse().map_err(|source| RecordError::BadNumber {
        field,
        value: value.to_string(),
        source,
    })
}

/// One typed row of the tabular view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageView {
    pub date: i64,
    pub hour: i64,
    pub lang: String,
    pub site: String,
    pub hits: i64,
    pub size: i64,
}

impl PageView {
    pub fn parse(line: &str) -> Result<Self, RecordError> {
        let f = Fields::split(line)?;
        Ok(Self {
            date: parse_int("date", f.date)?,
            hour: parse_int("hour", f.hour)?,
            lang: f.lang.to_string(),
            site: f.site.to_string(),
            hits: parse_int("hits", f.hits)?,
            size: parse_int("size", f.size)?,
        })
    }
}

/// What to do with a line that fails to parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Skip the line without a trace.
    #[default]
    Drop,
    /// Skip the line and log it.
    Warn,
    /// Abort the run.
    Fail,
}

impl MalformedPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            MalformedPolicy::Drop => "drop",
            MalformedPolicy::Warn => "warn",
            MalformedPolicy::Fail => "fail",
        }
    }

    /// Applies the policy to a parse result. `Ok(None)` means the line is skipped.
    pub fn screen<T>(self, parsed: Result<T, RecordError>) -> anyhow::Result<Option<T>> {
        match parsed {
            Ok(v) => Ok(Some(v)),
            Err(e) => match self {
                MalformedPolicy::Drop => Ok(None),
                MalformedPolicy::Warn => {
                    warn!(error = %e, "skipping malformed line");
                    Ok(None)
                }
                MalformedPolicy::Fail => Err(e.into()),
            },
        }
    }
}

/// Selects lines whose site matches a pattern, optionally in one language.
#[derive(Debug, Clone)]
pub struct RowFilter {
    site: Regex,
    lang: Option<String>,
}

impl RowFilter {
    pub fn new(pattern: &str, lang: Option<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            site: Regex::new(pattern)?,
            lang,
        })
    }

    /// Tests already split fields.
    pub fn matches(&self, f: &Fields<'_>) -> bool {
        if let Some(lang) = &self.lang {
            if f.lang != lang {
                return false;
            }
        }
        self.site.is_match(f.site)
    }

    /// Splits and tests a line, reporting why it could not be split.
    pub fn check(&self, line: &str) -> Result<bool, RecordError> {
        Ok(self.matches(&Fields::split(line)?))
    }

    /// Short lines never match.
    pub fn find(&self, line: &str) -> bool {
        self.check(line).unwrap_or(false)
    }
}

/// Site pattern used when the caller supplies none.
pub const DEFAULT_SITE_PATTERN: &str = "Barack_Obama";
