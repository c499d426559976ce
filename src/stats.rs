use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime};

use crate::db::{MemberStore, StoreError, WINDOW_DAYS};
use crate::models::{ConsentSummary, MajorCount, MemberStatus, WeeklyStats};

/// Ranked-major list is capped at this many entries.
pub const TOP_MAJORS: i64 = 5;

/// Compute the weekly snapshot. `now` is sampled once by the caller and
/// bound into every sub-query, so all five reads share one execution
/// instant.
pub async fn compute_weekly_stats(
    store: &dyn MemberStore,
    now: NaiveDateTime,
) -> Result<WeeklyStats, StoreError> {
    let new_registrations = store.count_created_since(now).await?;
    let new_verifications = store.count_verified_since(now).await?;
    let status_counts = store.count_by_status().await?;
    let majors = store.top_majors_since(now, TOP_MAJORS).await?;
    let (consented, total) = store.consent_since(now).await?;

    Ok(assemble(
        now,
        new_registrations,
        new_verifications,
        status_counts,
        majors,
        consented,
        total,
    ))
}

/// Percentage of consenting members, rounded to one decimal. The
/// denominator is floored at 1 so an empty window yields 0.0 instead of
/// a division error.
pub fn consent_rate(consented: i64, total: i64) -> f64 {
    let denominator = total.max(1) as f64;
    (consented as f64 / denominator * 1000.0).round() / 10.0
}

/// Pure assembly of the snapshot from the raw query outputs. Re-applies
/// the empty-major filter, the ranking order, and the top-5 cap even
/// though the SQL already enforces them, so the contract does not depend
/// on the backend.
fn assemble(
    now: NaiveDateTime,
    new_registrations: i64,
    new_verifications: i64,
    status_counts: Vec<(String, i64)>,
    majors: Vec<MajorCount>,
    consented: i64,
    total: i64,
) -> WeeklyStats {
    let total_members: BTreeMap<String, i64> = status_counts.into_iter().collect();
    let pending_verifications = total_members
        .get(MemberStatus::Pending.as_str())
        .copied()
        .unwrap_or(0);

    let mut ranked: Vec<MajorCount> = majors
        .into_iter()
        .filter(|entry| !entry.major.trim().is_empty())
        .collect();
    // Ties break alphabetically so the ranking is stable across runs.
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.major.cmp(&b.major)));
    ranked.truncate(TOP_MAJORS as usize);

    WeeklyStats {
        period_start: now - Duration::days(WINDOW_DAYS),
        period_end: now,
        new_registrations,
        new_verifications,
        total_members,
        pending_verifications,
        new_member_majors: ranked,
        email_consent: ConsentSummary {
            consented,
            total,
            rate: consent_rate(consented, total),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    use crate::db::MemberFilter;
    use crate::models::Member;

    fn sample_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 8)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn consent_rate_is_zero_guarded() {
        assert_eq!(consent_rate(0, 0), 0.0);
    }

    #[test]
    fn consent_rate_rounds_to_one_decimal() {
        assert_eq!(consent_rate(3, 4), 75.0);
        assert_eq!(consent_rate(1, 3), 33.3);
        assert_eq!(consent_rate(2, 3), 66.7);
        assert_eq!(consent_rate(5, 5), 100.0);
    }

    #[test]
    fn window_spans_seven_days_ending_now() {
        let stats = assemble(sample_now(), 0, 0, vec![], vec![], 0, 0);
        assert_eq!(stats.period_end, sample_now());
        assert_eq!(stats.period_end - stats.period_start, Duration::days(7));
        let (start, end) = stats.period_dates();
        assert_eq!(start, "2024-03-01");
        assert_eq!(end, "2024-03-08");
    }

    #[test]
    fn status_totals_sum_to_table_count() {
        let stats = assemble(
            sample_now(),
            2,
            1,
            vec![
                ("VERIFIED".to_string(), 10),
                ("PENDING".to_string(), 4),
                ("BLOCKED".to_string(), 1),
                ("LEGACY".to_string(), 2),
            ],
            vec![],
            1,
            2,
        );
        assert_eq!(stats.total_member_count(), 17);
        assert_eq!(stats.pending_verifications, 4);
        assert_eq!(stats.status_count(MemberStatus::Verified), 10);
        assert_eq!(stats.status_count(MemberStatus::Blocked), 1);
    }

    #[test]
    fn missing_statuses_count_as_zero() {
        let stats = assemble(
            sample_now(),
            0,
            0,
            vec![("VERIFIED".to_string(), 3)],
            vec![],
            0,
            0,
        );
        assert_eq!(stats.status_count(MemberStatus::Pending), 0);
        assert_eq!(stats.status_count(MemberStatus::Blocked), 0);
        assert_eq!(stats.pending_verifications, 0);
    }

    #[test]
    fn majors_are_ranked_filtered_and_capped() {
        let majors = vec![
            MajorCount { major: "".to_string(), count: 9 },
            MajorCount { major: "  ".to_string(), count: 8 },
            MajorCount { major: "Biology".to_string(), count: 2 },
            MajorCount { major: "Art".to_string(), count: 2 },
            MajorCount { major: "Computer Science".to_string(), count: 6 },
            MajorCount { major: "Math".to_string(), count: 3 },
            MajorCount { major: "Physics".to_string(), count: 1 },
            MajorCount { major: "History".to_string(), count: 1 },
        ];
        let stats = assemble(sample_now(), 0, 0, vec![], majors, 0, 0);
        let ranked: Vec<(&str, i64)> = stats
            .new_member_majors
            .iter()
            .map(|entry| (entry.major.as_str(), entry.count))
            .collect();
        assert_eq!(
            ranked,
            vec![
                ("Computer Science", 6),
                ("Math", 3),
                ("Art", 2),
                ("Biology", 2),
                ("History", 1),
            ]
        );
    }

    /// Canned-answer store for exercising the aggregation wiring without
    /// a live database.
    struct FixedStore {
        created: i64,
        verified: i64,
        statuses: Vec<(String, i64)>,
        majors: Vec<MajorCount>,
        consent: (i64, i64),
    }

    #[async_trait]
    impl MemberStore for FixedStore {
        async fn list_members(&self, _filter: &MemberFilter) -> Result<Vec<Member>, StoreError> {
            Ok(vec![])
        }

        async fn count_created_since(&self, _now: NaiveDateTime) -> Result<i64, StoreError> {
            Ok(self.created)
        }

        async fn count_verified_since(&self, _now: NaiveDateTime) -> Result<i64, StoreError> {
            Ok(self.verified)
        }

        async fn count_by_status(&self) -> Result<Vec<(String, i64)>, StoreError> {
            Ok(self.statuses.clone())
        }

        async fn top_majors_since(
            &self,
            _now: NaiveDateTime,
            limit: i64,
        ) -> Result<Vec<MajorCount>, StoreError> {
            let mut majors = self.majors.clone();
            majors.truncate(limit as usize);
            Ok(majors)
        }

        async fn consent_since(&self, _now: NaiveDateTime) -> Result<(i64, i64), StoreError> {
            Ok(self.consent)
        }

        async fn close(&self) {}
    }

    #[tokio::test]
    async fn snapshot_reflects_every_aggregate_read() {
        let store = FixedStore {
            created: 4,
            verified: 2,
            statuses: vec![
                ("PENDING".to_string(), 3),
                ("VERIFIED".to_string(), 12),
            ],
            majors: vec![MajorCount {
                major: "Computer Science".to_string(),
                count: 4,
            }],
            consent: (3, 4),
        };

        let stats = compute_weekly_stats(&store, sample_now()).await.unwrap();
        assert_eq!(stats.new_registrations, 4);
        assert_eq!(stats.new_verifications, 2);
        assert_eq!(stats.total_member_count(), 15);
        assert_eq!(stats.pending_verifications, 3);
        assert_eq!(stats.new_member_majors.len(), 1);
        assert_eq!(stats.email_consent.consented, 3);
        assert_eq!(stats.email_consent.total, 4);
        assert_eq!(stats.email_consent.rate, 75.0);
    }
}
