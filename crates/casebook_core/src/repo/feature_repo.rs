//! Feature/feature-option repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Seed features with their `max_options` quota and their options.
//! - Resolve selected option ids to options joined with owning features, on
//!   whatever connection or transaction the case write is using.
//!
//! # Invariants
//! - `resolve_options_on` silently omits unknown ids; callers compare the
//!   result against the request to detect them.

use crate::model::feature::{Feature, FeatureId, FeatureOption, OptionId, ResolvedOption};
use crate::repo::{ensure_schema, RepoResult, TableRequirement};
use rusqlite::{params, Connection, OptionalExtension, Row};

const FEATURE_SCHEMA: &[TableRequirement] = &[
    ("features", &["id", "name", "max_options"]),
    ("feature_options", &["id", "feature_id", "name"]),
];

/// Repository interface for feature configuration.
pub trait FeatureRepository {
    /// Creates one feature with the given per-case option quota.
    fn create_feature(&self, name: &str, max_options: u32) -> RepoResult<Feature>;
    /// Creates one option under an existing feature.
    fn create_option(&self, feature_id: FeatureId, name: &str) -> RepoResult<FeatureOption>;
    /// Loads one feature by id.
    fn get_feature(&self, feature_id: FeatureId) -> RepoResult<Option<Feature>>;
}

/// SQLite-backed feature repository.
pub struct SqliteFeatureRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteFeatureRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema(conn, FEATURE_SCHEMA)?;
        Ok(Self { conn })
    }
}

impl FeatureRepository for SqliteFeatureRepository<'_> {
    fn create_feature(&self, name: &str, max_options: u32) -> RepoResult<Feature> {
        self.conn.execute(
            "INSERT INTO features (name, max_options) VALUES (?1, ?2);",
            params![name, max_options],
        )?;
        Ok(Feature {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            max_options,
        })
    }

    fn create_option(&self, feature_id: FeatureId, name: &str) -> RepoResult<FeatureOption> {
        self.conn.execute(
            "INSERT INTO feature_options (feature_id, name) VALUES (?1, ?2);",
            params![feature_id, name],
        )?;
        Ok(FeatureOption {
            id: self.conn.last_insert_rowid(),
            feature_id,
            name: name.to_string(),
        })
    }

    fn get_feature(&self, feature_id: FeatureId) -> RepoResult<Option<Feature>> {
        let feature = self
            .conn
            .query_row(
                "SELECT id, name, max_options FROM features WHERE id = ?1;",
                [feature_id],
                |row| {
                    Ok(Feature {
                        id: row.get("id")?,
                        name: row.get("name")?,
                        max_options: row.get("max_options")?,
                    })
                },
            )
            .optional()?;
        Ok(feature)
    }
}

/// Resolves option ids on any connection or open transaction.
pub(crate) fn resolve_options_on(
    conn: &Connection,
    ids: &[OptionId],
) -> RepoResult<Vec<ResolvedOption>> {
    let mut stmt = conn.prepare(
        "SELECT
            o.id AS option_id,
            o.name AS option_name,
            f.id AS feature_id,
            f.name AS feature_name,
            f.max_options
         FROM feature_options o
         INNER JOIN features f ON f.id = o.feature_id
         WHERE o.id = ?1;",
    )?;

    let mut resolved = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(option) = stmt.query_row([id], parse_resolved_row).optional()? {
            resolved.push(option);
        }
    }
    Ok(resolved)
}

fn parse_resolved_row(row: &Row<'_>) -> rusqlite::Result<ResolvedOption> {
    let feature_id: FeatureId = row.get("feature_id")?;
    Ok(ResolvedOption {
        option: FeatureOption {
            id: row.get("option_id")?,
            feature_id,
            name: row.get("option_name")?,
        },
        feature: Feature {
            id: feature_id,
            name: row.get("feature_name")?,
            max_options: row.get("max_options")?,
        },
    })
}
