//! Experiment time window and the query parameters derived from it.

use chrono::{DateTime, Utc};

/// The active window of an experiment: routing rules ready → succeeded.
///
/// Construction guarantees `end >= start`, so the interval is never
/// negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl QueryWindow {
    /// Build a window, or `None` when `end` precedes `start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (end >= start).then_some(Self { start, end })
    }

    /// Parse both bounds as RFC 3339 timestamps.
    pub fn parse(start: &str, end: &str) -> Option<Self> {
        let start = DateTime::parse_from_rfc3339(start).ok()?.with_timezone(&Utc);
        let end = DateTime::parse_from_rfc3339(end).ok()?.with_timezone(&Utc);
        Self::new(start, end)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Whole seconds between start and end, truncated.
    pub fn interval_secs(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }

    /// Whole seconds between end and `now`, clamped at zero.
    pub fn offset_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.end).num_seconds().max(0)
    }

    /// Range selector duration, e.g. `"300s"`.
    pub fn interval(&self) -> String {
        format!("{}s", self.interval_secs())
    }

    /// Offset modifier with its leading space, e.g. `" offset 3600s"`,
    /// ready to be inlined after a range selector.
    pub fn offset_clause(&self, now: DateTime<Utc>) -> String {
        format!(" offset {}s", self.offset_secs(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn interval_and_offset_in_whole_seconds() {
        let window = QueryWindow::parse("2020-03-20T15:30:00Z", "2020-03-20T15:35:00.900Z").unwrap();
        let now = ts("2020-03-20T16:35:00.500Z");

        assert_eq!(window.interval(), "300s");
        assert_eq!(window.offset_clause(now), " offset 3599s");
    }

    #[test]
    fn rejects_end_before_start() {
        assert!(QueryWindow::parse("2020-03-20T15:35:00Z", "2020-03-20T15:30:00Z").is_none());
    }

    #[test]
    fn zero_length_window_is_valid() {
        let window = QueryWindow::parse("2020-03-20T15:30:00Z", "2020-03-20T15:30:00Z").unwrap();
        assert_eq!(window.interval(), "0s");
    }

    #[test]
    fn rejects_unparsable_timestamps() {
        assert!(QueryWindow::parse("yesterday", "2020-03-20T15:30:00Z").is_none());
        assert!(QueryWindow::parse("2020-03-20T15:30:00Z", "").is_none());
    }

    #[test]
    fn offset_clamps_when_clock_is_behind() {
        let window = QueryWindow::parse("2020-03-20T15:30:00Z", "2020-03-20T15:35:00Z").unwrap();
        let now = ts("2020-03-20T15:34:00Z");
        assert_eq!(window.offset_secs(now), 0);
        assert_eq!(window.offset_clause(now), " offset 0s");
    }

    #[test]
    fn honours_timezone_offsets() {
        let window = QueryWindow::parse("2020-03-20T17:30:00+02:00", "2020-03-20T15:31:00Z").unwrap();
        assert_eq!(window.interval_secs(), 60);
    }
}
