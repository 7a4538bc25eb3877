//! Tags raw hourly dumps with the date and hour encoded in their filename.
//!
//! `pagecounts-20081104-110000.gz` holds lines like
//! `en Barack_Obama 13890 2291741206`; tagging turns each into
//! `20081104 110000 en Barack_Obama 13890 2291741206`.

use crate::error::TagError;

/// Characters dropped from the end of the hour token (the file extension).
pub const HOUR_SUFFIX_LEN: usize = 3;

/// The date and hour taken from a dump's filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTag {
    pub date: String,
    pub hour: String,
}

impl FileTag {
    /// Reads the tag from the last `/`-separated segment of `path`.
    pub fn from_path(path: &str) -> Result<Self, TagError> {
        let name = path.rsplit('/').next().unwrap_or(path);
        let tokens: Vec<&str> = name.split('-').collect();
        if tokens.len() < 3 {
            return Err(TagError::MissingTokens {
                name: name.to_string(),
                found: tokens.len(),
            });
        }
        let hour = tokens[2];
        let cut = hour
            .char_indices()
            .rev()
            .nth(HOUR_SUFFIX_LEN - 1)
            .map(|(i, _)| i)
            .ok_or_else(|| TagError::ShortHour {
                name: name.to_string(),
                token: hour.to_string(),
            })?;
        Ok(Self {
            date: tokens[1].to_string(),
            hour: hour[..cut].to_string(),
        })
    }

    /// The `"<date> <hour> "` prefix put in front of every line.
    pub fn prefix(&self) -> String {
        format!("{} {} ", self.date, self.hour)
    }

    /// Prefixes every `\n`-separated line of `content`, keeping their order.
    ///
    /// A final newline does not start another line; `\r` is left in place.
    pub fn tag_lines<'a>(&self, content: &'a str) -> impl Iterator<Item = String> + 'a {
        let prefix = self.prefix();
        let body = content.strip_suffix('\n').unwrap_or(content);
        body.split('\n')
            .filter(move |_| !content.is_empty())
            .map(move |line| format!("{prefix}{line}"))
    }
}
