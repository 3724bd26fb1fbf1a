//! User/institution directory repository.
//!
//! Users and audited institutions are owned by collaborators outside the case
//! core. This repository only seeds them; existence checks for case saves
//! run through `CaseRepository`.

use crate::model::case::{InstitutionId, UserId};
use crate::repo::{ensure_schema, RepoResult, TableRequirement};
use rusqlite::Connection;

const DIRECTORY_SCHEMA: &[TableRequirement] = &[
    ("users", &["id", "username"]),
    ("institutions", &["id", "name"]),
];

/// Repository interface for directory seeding.
pub trait DirectoryRepository {
    /// Inserts one user and returns its id.
    fn create_user(&self, username: &str) -> RepoResult<UserId>;
    /// Inserts one audited institution and returns its id.
    fn create_institution(&self, name: &str) -> RepoResult<InstitutionId>;
}

/// SQLite-backed directory repository.
pub struct SqliteDirectoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDirectoryRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema(conn, DIRECTORY_SCHEMA)?;
        Ok(Self { conn })
    }
}

impl DirectoryRepository for SqliteDirectoryRepository<'_> {
    fn create_user(&self, username: &str) -> RepoResult<UserId> {
        self.conn
            .execute("INSERT INTO users (username) VALUES (?1);", [username])?;
        Ok(self.conn.last_insert_rowid())
    }

    fn create_institution(&self, name: &str) -> RepoResult<InstitutionId> {
        self.conn
            .execute("INSERT INTO institutions (name) VALUES (?1);", [name])?;
        Ok(self.conn.last_insert_rowid())
    }
}
