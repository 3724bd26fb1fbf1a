//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//! - Share one error type and one schema readiness check across repositories.
//!
//! # Invariants
//! - Repositories refuse connections whose schema lacks required tables or
//!   columns instead of failing later with opaque SQL errors.
//! - Repository APIs return semantic errors (`NotFound`, `QuotaExceeded`) in
//!   addition to DB transport errors.

use crate::db::DbError;
use crate::model::case::CaseId;
use crate::model::feature::QuotaViolation;
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod case_repo;
pub mod correspondence_repo;
pub mod directory_repo;
pub mod feature_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for case persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Target case does not exist.
    NotFound(CaseId),
    /// Persisted relation state exceeds a feature quota; the write was
    /// rolled back.
    QuotaExceeded(Vec<QuotaViolation>),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "case not found: {id}"),
            Self::QuotaExceeded(violations) => {
                write!(f, "feature option quota exceeded for {} feature(s)", violations.len())
            }
            Self::InvalidData(message) => write!(f, "invalid persisted case data: {message}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "case repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "case repository requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Table name plus the columns a repository reads or writes.
pub(crate) type TableRequirement = (&'static str, &'static [&'static str]);

/// Verifies that every required table and column exists on `conn`.
pub(crate) fn ensure_schema(conn: &Connection, required: &[TableRequirement]) -> RepoResult<()> {
    for &(table, columns) in required {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Returns the subset of `ids` present in `table.id`.
pub(crate) fn existing_ids(
    conn: &Connection,
    table: &'static str,
    ids: &[i64],
) -> RepoResult<BTreeSet<i64>> {
    let mut stmt = conn.prepare(&format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1);"))?;
    let mut found = BTreeSet::new();
    for id in ids {
        let exists: i64 = stmt.query_row([id], |row| row.get(0))?;
        if exists == 1 {
            found.insert(*id);
        }
    }
    Ok(found)
}
