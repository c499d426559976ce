use std::fmt::Write;

use chrono::NaiveDateTime;

use crate::models::WeeklyStats;

/// Static reminders that close out the action-items section every week.
const REMINDER_LINES: [&str; 3] = [
    "Check Discord for member questions",
    "Plan upcoming events and workshops",
    "Follow up on any recent event feedback",
];

const NO_NEW_MEMBERS: &str = "No new members this week";

#[derive(Debug, Clone)]
pub struct RenderedDigest {
    pub text: String,
    pub html: String,
}

/// Render the snapshot into the plain-text and HTML digest bodies.
///
/// Pure function of its arguments: the footer timestamp is passed in
/// rather than sampled here. Both variants carry the same seven sections
/// and must agree on every number they display.
pub fn render(stats: &WeeklyStats, app_name: &str, generated_at: NaiveDateTime) -> RenderedDigest {
    RenderedDigest {
        text: render_text(stats, app_name, generated_at),
        html: render_html(stats, app_name, generated_at),
    }
}

fn render_text(stats: &WeeklyStats, app_name: &str, generated_at: NaiveDateTime) -> String {
    let (start, end) = stats.period_dates();
    let consent = &stats.email_consent;
    let mut out = String::new();

    let _ = writeln!(out, "{app_name} Weekly Digest");
    let _ = writeln!(out, "{start} to {end}");
    let _ = writeln!(out);

    let _ = writeln!(out, "MEMBERSHIP SUMMARY");
    let _ = writeln!(out, "- New registrations: {}", stats.new_registrations);
    let _ = writeln!(out, "- New verifications: {}", stats.new_verifications);
    let _ = writeln!(out, "- Pending verifications: {}", stats.pending_verifications);
    let _ = writeln!(out, "- Total members: {}", stats.total_member_count());
    let _ = writeln!(out);

    let _ = writeln!(out, "STATUS BREAKDOWN");
    for (label, count) in status_breakdown(stats) {
        let _ = writeln!(out, "- {label}: {count}");
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "NEW MEMBER MAJORS");
    if stats.new_member_majors.is_empty() {
        let _ = writeln!(out, "- {NO_NEW_MEMBERS}");
    } else {
        for entry in &stats.new_member_majors {
            let _ = writeln!(out, "- {}: {}", entry.major, entry.count);
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "EMAIL CONSENT");
    let _ = writeln!(
        out,
        "- {} of {} new members ({:.1}%) opted in for emails",
        consent.consented, consent.total, consent.rate
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "ACTION ITEMS");
    if stats.pending_verifications > 0 {
        let _ = writeln!(out, "- Review {} pending verifications", stats.pending_verifications);
    }
    for reminder in REMINDER_LINES {
        let _ = writeln!(out, "- {reminder}");
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "---");
    let _ = writeln!(out, "This is an automated weekly digest from the {app_name} website.");
    let _ = writeln!(
        out,
        "Generated on {}",
        generated_at.format("%Y-%m-%d at %H:%M:%S")
    );

    out
}

fn render_html(stats: &WeeklyStats, app_name: &str, generated_at: NaiveDateTime) -> String {
    let (start, end) = stats.period_dates();
    let consent = &stats.email_consent;
    let mut out = String::new();

    let _ = writeln!(out, "<!DOCTYPE html>");
    let _ = writeln!(out, "<html>");
    let _ = writeln!(out, "<head>");
    let _ = writeln!(out, "<meta charset=\"UTF-8\">");
    let _ = writeln!(out, "<title>{} Weekly Digest</title>", escape(app_name));
    let _ = writeln!(out, "<style>");
    let _ = writeln!(
        out,
        "body {{ font-family: Arial, sans-serif; color: #333; max-width: 600px; margin: 0 auto; padding: 20px; }}"
    );
    let _ = writeln!(
        out,
        ".header {{ background: #1a365d; color: white; padding: 20px; text-align: center; }}"
    );
    let _ = writeln!(out, ".section h3 {{ color: #1a365d; border-bottom: 2px solid #e2e8f0; }}");
    let _ = writeln!(out, ".footer {{ color: #666; font-size: 0.8em; text-align: center; }}");
    let _ = writeln!(out, "</style>");
    let _ = writeln!(out, "</head>");
    let _ = writeln!(out, "<body>");

    let _ = writeln!(out, "<div class=\"header\">");
    let _ = writeln!(out, "<h1>{} Weekly Digest</h1>", escape(app_name));
    let _ = writeln!(out, "<p>{start} to {end}</p>");
    let _ = writeln!(out, "</div>");

    let _ = writeln!(out, "<div class=\"section\">");
    let _ = writeln!(out, "<h3>This Week's Activity</h3>");
    let _ = writeln!(out, "<ul>");
    let _ = writeln!(out, "<li>New registrations: <strong>{}</strong></li>", stats.new_registrations);
    let _ = writeln!(out, "<li>New verifications: <strong>{}</strong></li>", stats.new_verifications);
    let _ = writeln!(out, "<li>Pending verifications: <strong>{}</strong></li>", stats.pending_verifications);
    let _ = writeln!(out, "<li>Total members: <strong>{}</strong></li>", stats.total_member_count());
    let _ = writeln!(out, "</ul>");
    let _ = writeln!(out, "</div>");

    let _ = writeln!(out, "<div class=\"section\">");
    let _ = writeln!(out, "<h3>Status Breakdown</h3>");
    let _ = writeln!(out, "<ul>");
    for (label, count) in status_breakdown(stats) {
        let _ = writeln!(out, "<li>{label}: <strong>{count}</strong></li>");
    }
    let _ = writeln!(out, "</ul>");
    let _ = writeln!(out, "</div>");

    let _ = writeln!(out, "<div class=\"section\">");
    let _ = writeln!(out, "<h3>New Member Majors</h3>");
    if stats.new_member_majors.is_empty() {
        let _ = writeln!(out, "<p><em>{NO_NEW_MEMBERS}</em></p>");
    } else {
        for entry in &stats.new_member_majors {
            let _ = writeln!(
                out,
                "<p><strong>{}</strong>: {} student(s)</p>",
                escape(&entry.major),
                entry.count
            );
        }
    }
    let _ = writeln!(out, "</div>");

    let _ = writeln!(out, "<div class=\"section\">");
    let _ = writeln!(out, "<h3>Email Consent</h3>");
    let _ = writeln!(
        out,
        "<p><strong>{}</strong> of <strong>{}</strong> new members ({:.1}%) opted in for emails.</p>",
        consent.consented, consent.total, consent.rate
    );
    let _ = writeln!(out, "</div>");

    let _ = writeln!(out, "<div class=\"section\">");
    let _ = writeln!(out, "<h3>Action Items</h3>");
    let _ = writeln!(out, "<ul>");
    if stats.pending_verifications > 0 {
        let _ = writeln!(
            out,
            "<li><strong>Review {} pending verifications</strong></li>",
            stats.pending_verifications
        );
    }
    for reminder in REMINDER_LINES {
        let _ = writeln!(out, "<li>{reminder}</li>");
    }
    let _ = writeln!(out, "</ul>");
    let _ = writeln!(out, "</div>");

    let _ = writeln!(out, "<div class=\"footer\">");
    let _ = writeln!(
        out,
        "<p>This is an automated weekly digest from the {} website.</p>",
        escape(app_name)
    );
    let _ = writeln!(
        out,
        "<p>Generated on {}</p>",
        generated_at.format("%Y-%m-%d at %H:%M:%S")
    );
    let _ = writeln!(out, "</div>");

    let _ = writeln!(out, "</body>");
    let _ = writeln!(out, "</html>");

    out
}

/// Fixed-order breakdown; statuses with no rows still show up as 0.
fn status_breakdown(stats: &WeeklyStats) -> [(&'static str, i64); 3] {
    use crate::models::MemberStatus;
    [
        ("Verified", stats.status_count(MemberStatus::Verified)),
        ("Pending", stats.status_count(MemberStatus::Pending)),
        ("Blocked", stats.status_count(MemberStatus::Blocked)),
    ]
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use super::*;
    use crate::models::{ConsentSummary, MajorCount, WeeklyStats};

    fn timestamp(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn sample_stats(pending: i64) -> WeeklyStats {
        let mut totals = BTreeMap::new();
        totals.insert("VERIFIED".to_string(), 12);
        totals.insert("PENDING".to_string(), pending);
        WeeklyStats {
            period_start: timestamp(1, 9),
            period_end: timestamp(8, 9),
            new_registrations: 4,
            new_verifications: 2,
            total_members: totals,
            pending_verifications: pending,
            new_member_majors: vec![
                MajorCount {
                    major: "Computer Science".to_string(),
                    count: 3,
                },
                MajorCount {
                    major: "Math".to_string(),
                    count: 1,
                },
            ],
            email_consent: ConsentSummary {
                consented: 3,
                total: 4,
                rate: 75.0,
            },
        }
    }

    #[test]
    fn both_variants_carry_the_period_header() {
        let rendered = render(&sample_stats(3), "CSA", timestamp(8, 10));
        assert!(rendered.text.contains("2024-03-01 to 2024-03-08"));
        assert!(rendered.html.contains("2024-03-01 to 2024-03-08"));
    }

    #[test]
    fn pending_action_line_appears_with_exact_count() {
        let rendered = render(&sample_stats(3), "CSA", timestamp(8, 10));
        assert!(rendered.text.contains("Review 3 pending verifications"));
        assert!(rendered.html.contains("Review 3 pending verifications"));
    }

    #[test]
    fn pending_action_line_is_omitted_at_zero() {
        let rendered = render(&sample_stats(0), "CSA", timestamp(8, 10));
        assert!(!rendered.text.contains("Review"));
        assert!(!rendered.html.contains("Review"));
        // The static reminders still close the section.
        assert!(rendered.text.contains("Check Discord for member questions"));
        assert!(rendered.html.contains("Check Discord for member questions"));
    }

    #[test]
    fn zero_statuses_render_as_zero_not_omitted() {
        let rendered = render(&sample_stats(0), "CSA", timestamp(8, 10));
        assert!(rendered.text.contains("- Blocked: 0"));
        assert!(rendered.html.contains("Blocked: <strong>0</strong>"));
    }

    #[test]
    fn empty_major_list_renders_placeholder() {
        let mut stats = sample_stats(1);
        stats.new_member_majors.clear();
        let rendered = render(&stats, "CSA", timestamp(8, 10));
        assert!(rendered.text.contains("No new members this week"));
        assert!(rendered.html.contains("No new members this week"));
    }

    #[test]
    fn text_and_html_agree_on_every_displayed_number() {
        let stats = sample_stats(3);
        let rendered = render(&stats, "CSA", timestamp(8, 10));
        for needle in [
            stats.new_registrations.to_string(),
            stats.new_verifications.to_string(),
            stats.pending_verifications.to_string(),
            stats.total_member_count().to_string(),
            format!("{:.1}", stats.email_consent.rate),
        ] {
            assert!(rendered.text.contains(&needle), "text missing {needle}");
            assert!(rendered.html.contains(&needle), "html missing {needle}");
        }
    }

    #[test]
    fn footer_carries_generation_timestamp() {
        let rendered = render(&sample_stats(1), "CSA", timestamp(8, 10));
        assert!(rendered.text.contains("Generated on 2024-03-08 at 10:00:00"));
        assert!(rendered.html.contains("Generated on 2024-03-08 at 10:00:00"));
    }
}
