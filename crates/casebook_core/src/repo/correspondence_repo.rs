//! Note/letter repository.
//!
//! Notes and letters are owned by their own services; the case core only
//! needs to attach them to a case and count them. Counting lives in
//! `case_repo` so the counters are always computed by the same query that
//! reads the case.

use crate::model::case::CaseId;
use crate::repo::{ensure_schema, RepoError, RepoResult, TableRequirement};
use rusqlite::{params, Connection};

const CORRESPONDENCE_SCHEMA: &[TableRequirement] = &[
    ("notes", &["id", "case_uuid", "comment"]),
    ("letters", &["id", "case_uuid", "name"]),
];

/// Repository interface for notes and letters attached to cases.
pub trait CorrespondenceRepository {
    /// Attaches one note to an existing case and returns the note id.
    fn add_note(&self, case_id: CaseId, comment: &str) -> RepoResult<i64>;
    /// Attaches one letter to an existing case and returns the letter id.
    fn add_letter(&self, case_id: CaseId, name: &str) -> RepoResult<i64>;
}

/// SQLite-backed note/letter repository.
pub struct SqliteCorrespondenceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCorrespondenceRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema(conn, CORRESPONDENCE_SCHEMA)?;
        Ok(Self { conn })
    }

    fn insert_for_case(&self, sql: &str, case_id: CaseId, text: &str) -> RepoResult<i64> {
        let changed = self.conn.execute(sql, params![case_id.to_string(), text])?;
        if changed == 0 {
            return Err(RepoError::NotFound(case_id));
        }
        Ok(self.conn.last_insert_rowid())
    }
}

impl CorrespondenceRepository for SqliteCorrespondenceRepository<'_> {
    fn add_note(&self, case_id: CaseId, comment: &str) -> RepoResult<i64> {
        self.insert_for_case(
            "INSERT INTO notes (case_uuid, comment)
             SELECT uuid, ?2 FROM cases WHERE uuid = ?1;",
            case_id,
            comment,
        )
    }

    fn add_letter(&self, case_id: CaseId, name: &str) -> RepoResult<i64> {
        self.insert_for_case(
            "INSERT INTO letters (case_uuid, name)
             SELECT uuid, ?2 FROM cases WHERE uuid = ?1;",
            case_id,
            name,
        )
    }
}
