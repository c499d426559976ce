use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use clap::ValueEnum;

/// Lifecycle state of a member row. Stored uppercase in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MemberStatus {
    Pending,
    Verified,
    Blocked,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Pending => "PENDING",
            MemberStatus::Verified => "VERIFIED",
            MemberStatus::Blocked => "BLOCKED",
        }
    }

    pub fn parse(value: &str) -> Option<MemberStatus> {
        match value {
            "PENDING" => Some(MemberStatus::Pending),
            "VERIFIED" => Some(MemberStatus::Verified),
            "BLOCKED" => Some(MemberStatus::Blocked),
            _ => None,
        }
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One registrant row, read-only as far as this tool is concerned.
///
/// The timestamp columns are optional even though the schema requires
/// `created_at`/`updated_at`: a value the backend hands us in a shape we
/// cannot parse degrades to an empty cell in the export instead of
/// aborting the run.
#[derive(Debug, Clone)]
pub struct Member {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub major: Option<String>,
    pub campus: Option<String>,
    pub consent_comms: bool,
    pub accepted_code: bool,
    pub status: MemberStatus,
    pub verified_at: Option<NaiveDateTime>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct MajorCount {
    pub major: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ConsentSummary {
    pub consented: i64,
    pub total: i64,
    /// Percentage rounded to one decimal, 0.0 when `total` is 0.
    pub rate: f64,
}

/// Aggregate snapshot for the trailing seven-day window ending at
/// `period_end`. Recomputed from scratch on every run, never persisted.
#[derive(Debug, Clone)]
pub struct WeeklyStats {
    pub period_start: NaiveDateTime,
    pub period_end: NaiveDateTime,
    pub new_registrations: i64,
    pub new_verifications: i64,
    /// Status name to count over the whole table, not just the window.
    /// Keyed by the raw status string so an unexpected value still counts
    /// toward the table total.
    pub total_members: BTreeMap<String, i64>,
    pub pending_verifications: i64,
    pub new_member_majors: Vec<MajorCount>,
    pub email_consent: ConsentSummary,
}

impl WeeklyStats {
    pub fn total_member_count(&self) -> i64 {
        self.total_members.values().sum()
    }

    pub fn status_count(&self, status: MemberStatus) -> i64 {
        self.total_members.get(status.as_str()).copied().unwrap_or(0)
    }

    /// Window edges as `YYYY-MM-DD` strings, used by the report header
    /// and the digest subject line.
    pub fn period_dates(&self) -> (String, String) {
        (
            self.period_start.format("%Y-%m-%d").to_string(),
            self.period_end.format("%Y-%m-%d").to_string(),
        )
    }
}

/// Parse a timestamp the way the backends actually hand them out: MySQL
/// style `YYYY-MM-DD HH:MM:SS`, RFC 3339 with an offset or trailing `Z`,
/// or a bare date. Anything else is treated as absent.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(parsed);
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(parsed);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.naive_utc());
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return parsed.and_hms_opt(0, 0, 0);
    }
    None
}

/// `YYYY-MM-DD HH:MM:SS`, or empty when absent. Shared by the CSV export
/// and the report footer so both render dates identically.
pub fn format_timestamp(value: Option<NaiveDateTime>) -> String {
    value
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

pub fn format_bool(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_db_strings() {
        for status in [
            MemberStatus::Pending,
            MemberStatus::Verified,
            MemberStatus::Blocked,
        ] {
            assert_eq!(MemberStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(MemberStatus::parse("SUSPENDED"), None);
        assert_eq!(MemberStatus::parse("pending"), None);
    }

    #[test]
    fn parses_iso_timestamp_with_zulu_offset() {
        let parsed = parse_timestamp("2024-03-01T10:00:00Z").unwrap();
        assert_eq!(format_timestamp(Some(parsed)), "2024-03-01 10:00:00");
    }

    #[test]
    fn parses_space_separated_timestamp() {
        let parsed = parse_timestamp("2024-03-01 10:00:00").unwrap();
        assert_eq!(format_timestamp(Some(parsed)), "2024-03-01 10:00:00");
    }

    #[test]
    fn parses_bare_date_as_midnight() {
        let parsed = parse_timestamp("2024-03-01").unwrap();
        assert_eq!(format_timestamp(Some(parsed)), "2024-03-01 00:00:00");
    }

    #[test]
    fn unparsable_or_absent_timestamps_render_empty() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("not a date"), None);
        assert_eq!(format_timestamp(None), "");
    }

    #[test]
    fn booleans_render_yes_no() {
        assert_eq!(format_bool(true), "Yes");
        assert_eq!(format_bool(false), "No");
    }
}
