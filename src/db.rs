use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions, MySqlRow};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{MySqlPool, Row, SqlitePool};
use thiserror::Error;

use crate::config::DbConfig;
use crate::models::{parse_timestamp, MajorCount, Member, MemberStatus};

/// Length of the trailing reporting window, shared by both dialects and
/// by the period arithmetic in the aggregator.
pub const WINDOW_DAYS: i64 = 7;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unsupported database driver `{0}` (expected `mysql` or `sqlite`)")]
    DriverUnavailable(String),
    #[error("database connection failed: {0}")]
    Connection(String),
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("unexpected value in member row: {0}")]
    Decode(String),
}

/// Filters for the member listing. The BLOCKED exclusion and the status
/// filter are independent conditions, ANDed when both apply.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemberFilter {
    pub status: Option<MemberStatus>,
    pub include_blocked: bool,
}

/// The logical operations both backends must answer. Callers never see
/// which dialect is underneath; `connect` is the only place the driver
/// name is inspected.
#[async_trait]
pub trait MemberStore: Send + Sync {
    async fn list_members(&self, filter: &MemberFilter) -> Result<Vec<Member>, StoreError>;
    async fn count_created_since(&self, now: NaiveDateTime) -> Result<i64, StoreError>;
    async fn count_verified_since(&self, now: NaiveDateTime) -> Result<i64, StoreError>;
    async fn count_by_status(&self) -> Result<Vec<(String, i64)>, StoreError>;
    async fn top_majors_since(
        &self,
        now: NaiveDateTime,
        limit: i64,
    ) -> Result<Vec<MajorCount>, StoreError>;
    /// Returns (consented, total) over members created in the window.
    async fn consent_since(&self, now: NaiveDateTime) -> Result<(i64, i64), StoreError>;
    async fn close(&self);
}

pub async fn connect(cfg: &DbConfig) -> Result<Box<dyn MemberStore>, StoreError> {
    match cfg.driver.as_str() {
        "mysql" => {
            let options = MySqlConnectOptions::new()
                .host(&cfg.host)
                .username(&cfg.user)
                .password(&cfg.pass)
                .database(&cfg.name);
            let pool = MySqlPoolOptions::new()
                .max_connections(1)
                .connect_with(options)
                .await
                .map_err(|err| StoreError::Connection(err.to_string()))?;
            Ok(Box::new(MySqlStore { pool }))
        }
        "sqlite" => {
            if !Path::new(&cfg.path).exists() {
                return Err(StoreError::Connection(format!(
                    "SQLite database not found at {}",
                    cfg.path
                )));
            }
            let options = SqliteConnectOptions::new()
                .filename(&cfg.path)
                .read_only(true);
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options)
                .await
                .map_err(|err| StoreError::Connection(err.to_string()))?;
            Ok(Box::new(SqliteStore { pool }))
        }
        other => Err(StoreError::DriverUnavailable(other.to_string())),
    }
}

const MEMBER_COLUMNS: &str = "id, first_name, last_name, email, major, campus, \
     consent_comms, accepted_code, status, verified_at, created_at, updated_at";

/// Member listing SQL is identical in both dialects (both use `?`
/// placeholders); only the relative-date predicates below diverge.
fn member_list_sql(filter: &MemberFilter) -> String {
    let mut sql = format!("SELECT {MEMBER_COLUMNS} FROM members");
    let mut conditions = Vec::new();
    if filter.status.is_some() {
        conditions.push("status = ?");
    }
    if !filter.include_blocked {
        conditions.push("status <> ?");
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY created_at DESC");
    sql
}

fn mysql_window_predicate(column: &str) -> String {
    format!("{column} >= DATE_SUB(?, INTERVAL {WINDOW_DAYS} DAY)")
}

/// `datetime()` on the column side normalizes ISO-8601 `T` separators so
/// the text comparison is well-defined regardless of how rows were
/// written.
fn sqlite_window_predicate(column: &str) -> String {
    format!("datetime({column}) >= datetime(?, '-{WINDOW_DAYS} days')")
}

fn parse_status(raw: &str) -> Result<MemberStatus, StoreError> {
    MemberStatus::parse(raw)
        .ok_or_else(|| StoreError::Decode(format!("unknown member status `{raw}`")))
}

pub struct MySqlStore {
    pool: MySqlPool,
}

fn mysql_member(row: &MySqlRow) -> Result<Member, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(Member {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        major: row.try_get("major")?,
        campus: row.try_get("campus")?,
        consent_comms: row.try_get("consent_comms")?,
        accepted_code: row.try_get("accepted_code")?,
        status: parse_status(&status)?,
        verified_at: row.try_get("verified_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl MemberStore for MySqlStore {
    async fn list_members(&self, filter: &MemberFilter) -> Result<Vec<Member>, StoreError> {
        let sql = member_list_sql(filter);
        let mut query = sqlx::query(&sql);
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if !filter.include_blocked {
            query = query.bind(MemberStatus::Blocked.as_str());
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(mysql_member).collect()
    }

    async fn count_created_since(&self, now: NaiveDateTime) -> Result<i64, StoreError> {
        let sql = format!(
            "SELECT COUNT(*) AS count FROM members WHERE {}",
            mysql_window_predicate("created_at")
        );
        let row = sqlx::query(&sql).bind(now).fetch_one(&self.pool).await?;
        Ok(row.try_get("count")?)
    }

    async fn count_verified_since(&self, now: NaiveDateTime) -> Result<i64, StoreError> {
        let sql = format!(
            "SELECT COUNT(*) AS count FROM members WHERE {}",
            mysql_window_predicate("verified_at")
        );
        let row = sqlx::query(&sql).bind(now).fetch_one(&self.pool).await?;
        Ok(row.try_get("count")?)
    }

    async fn count_by_status(&self) -> Result<Vec<(String, i64)>, StoreError> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM members GROUP BY status")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| Ok((row.try_get("status")?, row.try_get("count")?)))
            .collect()
    }

    async fn top_majors_since(
        &self,
        now: NaiveDateTime,
        limit: i64,
    ) -> Result<Vec<MajorCount>, StoreError> {
        let sql = format!(
            "SELECT major, COUNT(*) AS count FROM members \
             WHERE major IS NOT NULL AND major <> '' AND {} \
             GROUP BY major ORDER BY count DESC, major ASC LIMIT ?",
            mysql_window_predicate("created_at")
        );
        let rows = sqlx::query(&sql)
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(MajorCount {
                    major: row.try_get("major")?,
                    count: row.try_get("count")?,
                })
            })
            .collect()
    }

    async fn consent_since(&self, now: NaiveDateTime) -> Result<(i64, i64), StoreError> {
        // SUM over TINYINT comes back as DECIMAL in MySQL, hence the CAST.
        let sql = format!(
            "SELECT CAST(COALESCE(SUM(CASE WHEN consent_comms = 1 THEN 1 ELSE 0 END), 0) AS SIGNED) AS consented, \
             COUNT(*) AS total FROM members WHERE {}",
            mysql_window_predicate("created_at")
        );
        let row = sqlx::query(&sql).bind(now).fetch_one(&self.pool).await?;
        Ok((row.try_get("consented")?, row.try_get("total")?))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

pub struct SqliteStore {
    pool: SqlitePool,
}

fn sqlite_member(row: &SqliteRow) -> Result<Member, StoreError> {
    let status: String = row.try_get("status")?;
    let verified_at: Option<String> = row.try_get("verified_at")?;
    let created_at: Option<String> = row.try_get("created_at")?;
    let updated_at: Option<String> = row.try_get("updated_at")?;
    Ok(Member {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        major: row.try_get("major")?,
        campus: row.try_get("campus")?,
        consent_comms: row.try_get("consent_comms")?,
        accepted_code: row.try_get("accepted_code")?,
        status: parse_status(&status)?,
        verified_at: verified_at.as_deref().and_then(parse_timestamp),
        created_at: created_at.as_deref().and_then(parse_timestamp),
        updated_at: updated_at.as_deref().and_then(parse_timestamp),
    })
}

#[async_trait]
impl MemberStore for SqliteStore {
    async fn list_members(&self, filter: &MemberFilter) -> Result<Vec<Member>, StoreError> {
        let sql = member_list_sql(filter);
        let mut query = sqlx::query(&sql);
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if !filter.include_blocked {
            query = query.bind(MemberStatus::Blocked.as_str());
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(sqlite_member).collect()
    }

    async fn count_created_since(&self, now: NaiveDateTime) -> Result<i64, StoreError> {
        let sql = format!(
            "SELECT COUNT(*) AS count FROM members WHERE {}",
            sqlite_window_predicate("created_at")
        );
        let row = sqlx::query(&sql).bind(now).fetch_one(&self.pool).await?;
        Ok(row.try_get("count")?)
    }

    async fn count_verified_since(&self, now: NaiveDateTime) -> Result<i64, StoreError> {
        let sql = format!(
            "SELECT COUNT(*) AS count FROM members WHERE {}",
            sqlite_window_predicate("verified_at")
        );
        let row = sqlx::query(&sql).bind(now).fetch_one(&self.pool).await?;
        Ok(row.try_get("count")?)
    }

    async fn count_by_status(&self) -> Result<Vec<(String, i64)>, StoreError> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM members GROUP BY status")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| Ok((row.try_get("status")?, row.try_get("count")?)))
            .collect()
    }

    async fn top_majors_since(
        &self,
        now: NaiveDateTime,
        limit: i64,
    ) -> Result<Vec<MajorCount>, StoreError> {
        let sql = format!(
            "SELECT major, COUNT(*) AS count FROM members \
             WHERE major IS NOT NULL AND major <> '' AND {} \
             GROUP BY major ORDER BY count DESC, major ASC LIMIT ?",
            sqlite_window_predicate("created_at")
        );
        let rows = sqlx::query(&sql)
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(MajorCount {
                    major: row.try_get("major")?,
                    count: row.try_get("count")?,
                })
            })
            .collect()
    }

    async fn consent_since(&self, now: NaiveDateTime) -> Result<(i64, i64), StoreError> {
        let sql = format!(
            "SELECT COALESCE(SUM(CASE WHEN consent_comms = 1 THEN 1 ELSE 0 END), 0) AS consented, \
             COUNT(*) AS total FROM members WHERE {}",
            sqlite_window_predicate("created_at")
        );
        let row = sqlx::query(&sql).bind(now).fetch_one(&self.pool).await?;
        Ok((row.try_get("consented")?, row.try_get("total")?))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
