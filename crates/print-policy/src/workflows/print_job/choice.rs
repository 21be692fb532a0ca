//! Remembered answer to the external-account prompt.
//!
//! Stored in a single user property as `<value>|<expires-at-epoch-millis>`,
//! for example `false|1767225600000`.

use chrono::{DateTime, Duration, Utc};
use std::fmt;

use super::rules::PolicyDefect;

const SEPARATOR: char = '|';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChoiceToken {
    pub value: bool,
    pub expires_at_millis: i64,
}

impl ChoiceToken {
    /// `None` when the expiry would fall outside the representable date range.
    pub fn remembered(value: bool, days: u32, now: DateTime<Utc>) -> Option<Self> {
        let expires_at = Duration::try_days(i64::from(days))
            .and_then(|period| now.checked_add_signed(period))?;
        Some(Self {
            value,
            expires_at_millis: expires_at.timestamp_millis(),
        })
    }

    pub fn parse(raw: &str) -> Result<Self, PolicyDefect> {
        let malformed = || PolicyDefect::MalformedChoice {
            raw: raw.to_string(),
        };

        let (value, expires) = raw.trim().split_once(SEPARATOR).ok_or_else(malformed)?;
        if expires.contains(SEPARATOR) {
            return Err(malformed());
        }

        let value = match value.trim().to_ascii_lowercase().as_str() {
            "true" => true,
            "false" => false,
            _ => return Err(malformed()),
        };
        let expires_at_millis = expires.trim().parse::<i64>().map_err(|_| malformed())?;

        Ok(Self {
            value,
            expires_at_millis,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at_millis <= now.timestamp_millis()
    }

    /// A stored token that is present, well formed and unexpired.
    ///
    /// Malformed data collapses to "no preference" the same way a missing
    /// property does; the error is handed back for logging only.
    pub fn load(
        raw: Option<&str>,
        now: DateTime<Utc>,
    ) -> (Option<Self>, Option<PolicyDefect>) {
        let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
            return (None, None);
        };

        match Self::parse(raw) {
            Ok(token) if token.is_expired(now) => (None, None),
            Ok(token) => (Some(token), None),
            Err(defect) => (None, Some(defect)),
        }
    }
}

impl fmt::Display for ChoiceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.value, SEPARATOR, self.expires_at_millis)
    }
}
