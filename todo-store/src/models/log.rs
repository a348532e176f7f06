//! Request telemetry entries and cursor pagination
//!
//! Log rows are append-only. Reads page backwards in time using a
//! `(timestamp, id)` cursor so ties on `timestamp` never skip or repeat a row.

use std::time::Instant;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::validation::check_text;
use super::{LogId, ValidationError};

/// Maximum length for a user agent string, in characters
const MAX_USER_AGENT_LEN: usize = 512;

/// Maximum entries per `recent` page
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// Log record from database.
///
/// `timestamp` is UTC wall time; the column has no zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LogEntry {
    pub id: LogId,
    pub user_agent: String,
    pub response_time: i32,
    pub timestamp: NaiveDateTime,
}

impl LogEntry {
    /// Cursor that continues strictly after this entry (older).
    pub fn cursor(&self) -> LogCursor {
        LogCursor {
            timestamp: self.timestamp,
            id: Some(self.id),
        }
    }
}

/// Validated, non-empty user agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserAgent(String);

impl UserAgent {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        check_text("user_agent", s, MAX_USER_AGENT_LEN)?;
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserAgent {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        check_text("user_agent", &s, MAX_USER_AGENT_LEN)?;
        Ok(Self(s))
    }
}

impl From<UserAgent> for String {
    fn from(u: UserAgent) -> Self {
        u.0
    }
}

/// Response time in milliseconds, fits the `int` column and is never negative
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i32")]
pub struct ResponseTime(i32);

impl ResponseTime {
    pub fn from_millis(ms: i64) -> Result<Self, ValidationError> {
        i32::try_from(ms)
            .ok()
            .filter(|v| *v >= 0)
            .map(Self)
            .ok_or(ValidationError::OutOfRange {
                field: "response_time",
                value: ms,
                min: 0,
                max: i64::from(i32::MAX),
            })
    }

    pub fn as_millis(self) -> i32 {
        self.0
    }
}

impl TryFrom<i64> for ResponseTime {
    type Error = ValidationError;

    fn try_from(ms: i64) -> Result<Self, Self::Error> {
        Self::from_millis(ms)
    }
}

impl From<ResponseTime> for i32 {
    fn from(r: ResponseTime) -> Self {
        r.0
    }
}

/// Entry to append. `timestamp: None` lets the store stamp it at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLog {
    pub user_agent: UserAgent,
    pub response_time: ResponseTime,
    #[serde(default)]
    pub timestamp: Option<NaiveDateTime>,
}

impl NewLog {
    /// Validate raw request telemetry.
    ///
    /// # Example
    /// ```
    /// use todo_store::models::NewLog;
    ///
    /// assert!(NewLog::new("curl/8.0", 42).is_ok());
    /// assert!(NewLog::new("curl/8.0", -1).is_err());
    /// assert!(NewLog::new("", 42).is_err());
    /// ```
    pub fn new(user_agent: &str, response_time_ms: i64) -> Result<Self, ValidationError> {
        Ok(Self {
            user_agent: UserAgent::new(user_agent)?,
            response_time: ResponseTime::from_millis(response_time_ms)?,
            timestamp: None,
        })
    }

    /// Pin the timestamp instead of using write time.
    pub fn at(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Position in the log, exclusive.
///
/// With `id: None` the page starts strictly before `timestamp`; with an id it
/// also continues among entries that share `timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogCursor {
    pub timestamp: NaiveDateTime,
    pub id: Option<LogId>,
}

impl LogCursor {
    pub fn before(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            id: None,
        }
    }

    /// Does `entry` fall strictly after this cursor in newest-first order?
    pub fn admits(&self, entry: &LogEntry) -> bool {
        match self.id {
            None => entry.timestamp < self.timestamp,
            Some(id) => {
                entry.timestamp < self.timestamp
                    || (entry.timestamp == self.timestamp && entry.id < id)
            }
        }
    }
}

/// One page of `recent` results, newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPage {
    pub entries: Vec<LogEntry>,
    /// Cursor for the next (older) page, `None` when exhausted
    pub next: Option<LogCursor>,
}

impl LogPage {
    /// Build a page from up to `limit + 1` rows; the extra row only signals
    /// that more data exists.
    /// Page for a zero limit: nothing read, no cursor.
    pub(crate) fn empty() -> Self {
        Self {
            entries: Vec::new(),
            next: None,
        }
    }

    pub(crate) fn from_overfetch(mut rows: Vec<LogEntry>, limit: u32) -> Self {
        let limit = limit as usize;
        let more = rows.len() > limit;
        rows.truncate(limit);
        let next = if more {
            rows.last().map(LogEntry::cursor)
        } else {
            None
        };
        Self {
            entries: rows,
            next,
        }
    }
}

/// Cap a requested page size at MAX_PAGE_LIMIT. Zero stays zero.
pub fn clamp_limit(limit: u32) -> u32 {
    limit.min(MAX_PAGE_LIMIT)
}

/// Measures one request for the log sink.
#[derive(Debug)]
pub struct RequestTimer {
    user_agent: UserAgent,
    started: Instant,
}

impl RequestTimer {
    pub fn start(user_agent: UserAgent) -> Self {
        Self {
            user_agent,
            started: Instant::now(),
        }
    }

    /// Stop timing and produce the entry, stamped now.
    pub fn finish(self) -> NewLog {
        let elapsed = self.started.elapsed().as_millis();
        NewLog {
            user_agent: self.user_agent,
            response_time: ResponseTime(i32::try_from(elapsed).unwrap_or(i32::MAX)),
            timestamp: Some(Utc::now().naive_utc()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn ts(secs: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, secs)
            .unwrap()
    }

    fn entry(id: i64, secs: u32) -> LogEntry {
        LogEntry {
            id: LogId(id),
            user_agent: "ua".into(),
            response_time: 1,
            timestamp: ts(secs),
        }
    }

    #[test]
    fn rejects_negative_response_time() {
        let err = NewLog::new("curl/8.0", -1).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::OutOfRange {
                field: "response_time",
                value: -1,
                ..
            }
        ));
    }

    #[test]
    fn rejects_overflowing_response_time() {
        assert!(ResponseTime::from_millis(i64::from(i32::MAX)).is_ok());
        assert!(ResponseTime::from_millis(i64::from(i32::MAX) + 1).is_err());
    }

    #[test]
    fn rejects_empty_user_agent() {
        let err = NewLog::new("   ", 10).unwrap_err();
        assert_eq!(err.field(), "user_agent");
    }

    #[test]
    fn user_agent_length_counts_characters() {
        // 512 chars, 1536 bytes
        assert!(UserAgent::new(&"é".repeat(512)).is_ok());
        let err = UserAgent::new(&"é".repeat(513)).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::TooLong {
                field: "user_agent",
                max: 512
            }
        ));
    }

    #[test]
    fn cursor_breaks_timestamp_ties_by_id() {
        let cursor = entry(5, 10).cursor();
        assert!(cursor.admits(&entry(4, 10)));
        assert!(!cursor.admits(&entry(6, 10)));
        assert!(!cursor.admits(&entry(5, 10)));
        assert!(cursor.admits(&entry(9, 9)));

        let bare = LogCursor::before(ts(10));
        assert!(!bare.admits(&entry(1, 10)));
        assert!(bare.admits(&entry(1, 9)));
    }

    #[test]
    fn overfetch_sets_next_cursor() {
        let rows = vec![entry(3, 3), entry(2, 2), entry(1, 1)];
        let page = LogPage::from_overfetch(rows.clone(), 2);
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.next, Some(entry(2, 2).cursor()));

        let page = LogPage::from_overfetch(rows, 3);
        assert_eq!(page.entries.len(), 3);
        assert_eq!(page.next, None);
    }

    #[test]
    fn clamps_limit() {
        assert_eq!(clamp_limit(0), 0);
        assert_eq!(clamp_limit(50), 50);
        assert_eq!(clamp_limit(5000), MAX_PAGE_LIMIT);
    }

    #[test]
    fn timer_produces_stamped_entry() {
        let before = Utc::now().naive_utc();
        let log = RequestTimer::start(UserAgent::new("test").unwrap()).finish();
        assert!(log.timestamp.unwrap() >= before);
        assert!(log.response_time.as_millis() >= 0);
    }

    proptest! {
        #[test]
        fn response_time_accepts_exactly_the_int_range(ms in any::<i64>()) {
            let ok = (0..=i64::from(i32::MAX)).contains(&ms);
            prop_assert_eq!(ResponseTime::from_millis(ms).is_ok(), ok);
        }

        #[test]
        fn non_blank_user_agents_accepted(ua in "[a-zA-Z0-9/._ -]{0,40}") {
            prop_assert_eq!(UserAgent::new(&ua).is_ok(), !ua.trim().is_empty());
        }
    }
}
