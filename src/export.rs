use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use crate::models::{format_bool, format_timestamp, Member};

/// Outcome of an export run. An empty result set is expected and
/// reported, not raised: no file is touched in that case.
#[derive(Debug, PartialEq, Eq)]
pub enum ExportOutcome {
    Written(usize),
    Empty,
}

/// One CSV line. The renames define the exact 12-column header the admin
/// tooling expects; do not reorder.
#[derive(Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "ID")]
    id: i64,
    #[serde(rename = "First Name")]
    first_name: &'a str,
    #[serde(rename = "Last Name")]
    last_name: &'a str,
    #[serde(rename = "Email")]
    email: &'a str,
    #[serde(rename = "Major")]
    major: &'a str,
    #[serde(rename = "Campus")]
    campus: &'a str,
    #[serde(rename = "Email Consent")]
    email_consent: &'static str,
    #[serde(rename = "Code Accepted")]
    code_accepted: &'static str,
    #[serde(rename = "Status")]
    status: &'static str,
    #[serde(rename = "Verified Date")]
    verified_date: String,
    #[serde(rename = "Join Date")]
    join_date: String,
    #[serde(rename = "Last Updated")]
    last_updated: String,
}

impl<'a> ExportRow<'a> {
    fn from_member(member: &'a Member) -> ExportRow<'a> {
        ExportRow {
            id: member.id,
            first_name: &member.first_name,
            last_name: &member.last_name,
            email: &member.email,
            major: member.major.as_deref().unwrap_or(""),
            campus: member.campus.as_deref().unwrap_or(""),
            email_consent: format_bool(member.consent_comms),
            code_accepted: format_bool(member.accepted_code),
            status: member.status.as_str(),
            verified_date: format_timestamp(member.verified_at),
            join_date: format_timestamp(member.created_at),
            last_updated: format_timestamp(member.updated_at),
        }
    }
}

pub fn export_csv(members: &[Member], path: &Path) -> anyhow::Result<ExportOutcome> {
    if members.is_empty() {
        return Ok(ExportOutcome::Empty);
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for member in members {
        writer.serialize(ExportRow::from_member(member))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(ExportOutcome::Written(members.len()))
}
