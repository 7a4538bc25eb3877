//! Aggregation keys and the comma-separated rows written for them.

use anyhow::{anyhow, Result};

use crate::error::RecordError;
use crate::record::Fields;

/// Separator inside an encoded [`AggKey`].
pub const KEY_DELIMITER: char = '-';

/// The (date, hour, language) triple hits are summed over.
///
/// Encoded as `date-hour-lang`. Date and hour never contain a hyphen since
/// they were cut out of a hyphen-separated filename; the language goes last
/// so codes like `zh-min-nan` decode unchanged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AggKey {
    pub date: String,
    pub hour: String,
    pub lang: String,
}

impl AggKey {
    pub fn new(date: &str, hour: &str, lang: &str) -> Result<Self> {
        Ok(Self::checked(date, hour, lang)?)
    }

    /// Like [`AggKey::new`], but a delimiter clash is a [`RecordError`] so
    /// callers can screen it with their malformed-row policy.
    pub fn from_fields(f: &Fields<'_>) -> Result<Self, RecordError> {
        Self::checked(f.date, f.hour, f.lang)
    }

    fn checked(date: &str, hour: &str, lang: &str) -> Result<Self, RecordError> {
        for (field, value) in [("date", date), ("hour", hour)] {
            if value.contains(KEY_DELIMITER) {
                return Err(RecordError::KeyDelimiter {
                    field,
                    value: value.to_string(),
                });
            }
        }
        Ok(Self {
            date: date.to_string(),
            hour: hour.to_string(),
            lang: lang.to_string(),
        })
    }

    pub fn encode(&self) -> String {
        format!(
            "{}{KEY_DELIMITER}{}{KEY_DELIMITER}{}",
            self.date, self.hour, self.lang
        )
    }

    pub fn decode(key: &str) -> Result<Self> {
        let mut parts = key.splitn(3, KEY_DELIMITER);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(date), Some(hour), Some(lang)) => Ok(Self {
                date: date.to_string(),
                hour: hour.to_string(),
                lang: lang.to_string(),
            }),
            _ => Err(anyhow!("aggregation key '{key}' has fewer than 3 parts")),
        }
    }
}

/// `date,hour,lang,count`
pub fn format_count_row(key: &AggKey, count: u64) -> String {
    format!("{},{},{},{}", key.date, key.hour, key.lang, count)
}

/// Inverse of [`format_count_row`].
pub fn parse_count_row(row: &str) -> Result<(AggKey, u64)> {
    let malformed = || anyhow!("count row '{row}' is not date,hour,lang,count");
    let (head, count) = row.rsplit_once(',').ok_or_else(malformed)?;
    let mut parts = head.splitn(3, ',');
    let (date, hour, lang) = match (parts.next(), parts.next(), parts.next()) {
        (Some(d), Some(h), Some(l)) => (d, h, l),
        _ => return Err(malformed()),
    };
    Ok((AggKey::new(date, hour, lang)?, count.parse()?))
}

/// `lang,median`
pub fn format_median_row(lang: &str, median: f64) -> String {
    format!("{lang},{median}")
}

/// Inverse of [`format_median_row`].
pub fn parse_median_row(row: &str) -> Result<(String, f64)> {
    let (lang, median) = row
        .rsplit_once(',')
        .ok_or_else(|| anyhow!("median row '{row}' is not lang,median"))?;
    Ok((lang.to_string(), median.parse()?))
}
