//! Case repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist a validated `CaseDraft` together with all relation rows.
//! - Resolve tag names to existing-or-new `tags` rows inside the same write.
//! - Read cases back, optionally annotated with note/letter counters.
//!
//! # Invariants
//! - A case and its relation rows are written in one `IMMEDIATE` transaction;
//!   any failure (missing reference, quota overflow) rolls back every row.
//! - Tag rows are get-or-create by unique name (`INSERT OR IGNORE`), so
//!   concurrent writers never duplicate a tag.
//! - `note_count`/`letter_count` are aggregated from `notes`/`letters` at read
//!   time; nothing stores them.
//! - Listing is deterministic: `updated_at DESC, uuid ASC`.

use crate::model::case::{CaseDraft, CaseId, CaseRecord, CountedCase, InstitutionId, UserId};
use crate::model::feature::{OptionId, QuotaViolation, ResolvedOption};
use crate::repo::feature_repo::resolve_options_on;
use crate::repo::{ensure_schema, existing_ids, RepoError, RepoResult, TableRequirement};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, TransactionBehavior};
use std::collections::BTreeSet;
use uuid::Uuid;

const CASES_DEFAULT_LIMIT: u32 = 20;
const CASES_LIMIT_MAX: u32 = 100;

const CASE_SELECT_SQL: &str = "SELECT
    c.uuid,
    c.name,
    c.comment,
    c.created_by,
    c.modified_by,
    c.created_at,
    c.updated_at
FROM cases c";

const COUNTED_CASE_SELECT_SQL: &str = "SELECT
    c.uuid,
    c.name,
    c.comment,
    c.created_by,
    c.modified_by,
    c.created_at,
    c.updated_at,
    (SELECT COUNT(*) FROM notes n WHERE n.case_uuid = c.uuid) AS note_count,
    (SELECT COUNT(*) FROM letters l WHERE l.case_uuid = c.uuid) AS letter_count
FROM cases c";

/// Id-valued relation tables as `(table, id column)`.
const ID_RELATIONS: &[(&str, &str)] = &[
    ("case_audited_institutions", "institution_id"),
    ("case_responsible_users", "user_id"),
    ("case_notified_users", "user_id"),
    ("case_feature_options", "option_id"),
];

const CASE_SCHEMA: &[TableRequirement] = &[
    (
        "cases",
        &[
            "uuid",
            "name",
            "comment",
            "created_by",
            "modified_by",
            "created_at",
            "updated_at",
        ],
    ),
    ("tags", &["id", "name"]),
    ("case_tags", &["case_uuid", "tag_id", "position"]),
    ("case_audited_institutions", &["case_uuid", "institution_id"]),
    ("case_responsible_users", &["case_uuid", "user_id"]),
    ("case_notified_users", &["case_uuid", "user_id"]),
    ("case_feature_options", &["case_uuid", "option_id"]),
    ("notes", &["case_uuid"]),
    ("letters", &["case_uuid"]),
];

/// Query options for case list use-cases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseListQuery {
    /// Optional single-tag exact match filter.
    pub tag: Option<String>,
    /// Maximum rows to return. Defaults to 20 and clamps to 100.
    pub limit: Option<u32>,
    /// Number of rows to skip.
    pub offset: u32,
}

/// Repository interface for case persistence and reference lookups.
pub trait CaseRepository {
    /// Writes a new case and all its relations atomically.
    fn insert_case(&mut self, draft: &CaseDraft) -> RepoResult<CaseId>;
    /// Replaces all fields and relations of an existing case atomically.
    fn replace_case(&mut self, case_id: CaseId, draft: &CaseDraft) -> RepoResult<()>;
    /// Gets one case by id.
    fn get_case(&self, case_id: CaseId) -> RepoResult<Option<CaseRecord>>;
    /// Gets one case by id with note/letter counters.
    fn get_case_counted(&self, case_id: CaseId) -> RepoResult<Option<CountedCase>>;
    /// Lists counted cases using single-tag filter + pagination.
    fn list_cases(&self, query: &CaseListQuery) -> RepoResult<Vec<CountedCase>>;
    /// Returns all known tag names sorted by name.
    fn list_tags(&self) -> RepoResult<Vec<String>>;
    /// Returns which of `ids` are known users.
    fn existing_user_ids(&self, ids: &[UserId]) -> RepoResult<BTreeSet<UserId>>;
    /// Returns which of `ids` are known institutions.
    fn existing_institution_ids(&self, ids: &[InstitutionId])
        -> RepoResult<BTreeSet<InstitutionId>>;
    /// Resolves option ids to options joined with their owning feature.
    fn resolve_options(&self, ids: &[OptionId]) -> RepoResult<Vec<ResolvedOption>>;
}

/// SQLite-backed case repository.
pub struct SqliteCaseRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteCaseRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_schema(conn, CASE_SCHEMA)?;
        Ok(Self { conn })
    }
}

impl CaseRepository for SqliteCaseRepository<'_> {
    fn insert_case(&mut self, draft: &CaseDraft) -> RepoResult<CaseId> {
        let case_id = Uuid::new_v4();
        let case_uuid = case_id.to_string();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO cases (uuid, name, comment, created_by, modified_by)
             VALUES (?1, ?2, ?3, ?4, ?4);",
            params![
                case_uuid.as_str(),
                draft.name.as_str(),
                draft.comment.as_str(),
                draft.actor,
            ],
        )?;
        write_relations(&tx, case_uuid.as_str(), draft)?;
        ensure_within_quota(&tx, case_uuid.as_str())?;

        tx.commit()?;
        Ok(case_id)
    }

    fn replace_case(&mut self, case_id: CaseId, draft: &CaseDraft) -> RepoResult<()> {
        let case_uuid = case_id.to_string();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = tx.execute(
            "UPDATE cases
             SET
                name = ?2,
                comment = ?3,
                modified_by = ?4,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                case_uuid.as_str(),
                draft.name.as_str(),
                draft.comment.as_str(),
                draft.actor,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(case_id));
        }

        tx.execute(
            "DELETE FROM case_tags WHERE case_uuid = ?1;",
            [case_uuid.as_str()],
        )?;
        for (table, _) in ID_RELATIONS {
            tx.execute(
                &format!("DELETE FROM {table} WHERE case_uuid = ?1;"),
                [case_uuid.as_str()],
            )?;
        }
        write_relations(&tx, case_uuid.as_str(), draft)?;
        ensure_within_quota(&tx, case_uuid.as_str())?;

        tx.commit()?;
        Ok(())
    }

    fn get_case(&self, case_id: CaseId) -> RepoResult<Option<CaseRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CASE_SELECT_SQL} WHERE c.uuid = ?1;"))?;
        let mut rows = stmt.query([case_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_case_row(self.conn, row)?));
        }
        Ok(None)
    }

    fn get_case_counted(&self, case_id: CaseId) -> RepoResult<Option<CountedCase>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{COUNTED_CASE_SELECT_SQL} WHERE c.uuid = ?1;"))?;
        let mut rows = stmt.query([case_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_counted_row(self.conn, row)?));
        }
        Ok(None)
    }

    fn list_cases(&self, query: &CaseListQuery) -> RepoResult<Vec<CountedCase>> {
        let mut sql = format!("{COUNTED_CASE_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(tag) = query.tag.as_ref() {
            sql.push_str(
                " AND EXISTS (
                    SELECT 1
                    FROM case_tags ct
                    INNER JOIN tags t ON t.id = ct.tag_id
                    WHERE ct.case_uuid = c.uuid
                      AND t.name = ?
                )",
            );
            bind_values.push(Value::Text(tag.clone()));
        }

        sql.push_str(" ORDER BY c.updated_at DESC, c.uuid ASC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(normalize_case_limit(
            query.limit,
        ))));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut cases = Vec::new();
        while let Some(row) = rows.next()? {
            cases.push(parse_counted_row(self.conn, row)?);
        }
        Ok(cases)
    }

    fn list_tags(&self) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT name FROM tags ORDER BY name ASC;")?;
        let tags = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    fn existing_user_ids(&self, ids: &[UserId]) -> RepoResult<BTreeSet<UserId>> {
        existing_ids(self.conn, "users", ids)
    }

    fn existing_institution_ids(
        &self,
        ids: &[InstitutionId],
    ) -> RepoResult<BTreeSet<InstitutionId>> {
        existing_ids(self.conn, "institutions", ids)
    }

    fn resolve_options(&self, ids: &[OptionId]) -> RepoResult<Vec<ResolvedOption>> {
        resolve_options_on(self.conn, ids)
    }
}

/// Normalizes list limit according to the case list contract.
pub fn normalize_case_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => CASES_DEFAULT_LIMIT,
        Some(value) => value.min(CASES_LIMIT_MAX),
    }
}

fn write_relations(conn: &Connection, case_uuid: &str, draft: &CaseDraft) -> RepoResult<()> {
    for (position, tag) in draft.tags.iter().enumerate() {
        conn.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1);", [tag.as_str()])?;
        conn.execute(
            "INSERT OR IGNORE INTO case_tags (case_uuid, tag_id, position)
             SELECT ?1, id, ?3
             FROM tags
             WHERE name = ?2;",
            params![case_uuid, tag.as_str(), position as i64],
        )?;
    }

    let id_lists: [&[i64]; 4] = [
        &draft.audited_institution,
        &draft.responsible_user,
        &draft.notified_user,
        &draft.featureoptions,
    ];
    for ((table, column), ids) in ID_RELATIONS.iter().zip(id_lists) {
        let mut stmt = conn.prepare(&format!(
            "INSERT OR IGNORE INTO {table} (case_uuid, {column}) VALUES (?1, ?2);"
        ))?;
        for id in ids {
            stmt.execute(params![case_uuid, id])?;
        }
    }

    Ok(())
}

fn ensure_within_quota(conn: &Connection, case_uuid: &str) -> RepoResult<()> {
    let mut stmt = conn.prepare(
        "SELECT
            f.id,
            f.name,
            f.max_options,
            COUNT(*) AS selected
         FROM case_feature_options cfo
         INNER JOIN feature_options o ON o.id = cfo.option_id
         INNER JOIN features f ON f.id = o.feature_id
         WHERE cfo.case_uuid = ?1
         GROUP BY f.id, f.name, f.max_options
         HAVING COUNT(*) > f.max_options
         ORDER BY f.id ASC;",
    )?;
    let mut rows = stmt.query([case_uuid])?;
    let mut violations = Vec::new();
    while let Some(row) = rows.next()? {
        let selected: i64 = row.get("selected")?;
        violations.push(QuotaViolation {
            feature_id: row.get("id")?,
            feature_name: row.get("name")?,
            max_options: row.get("max_options")?,
            selected: usize::try_from(selected).map_err(|_| {
                RepoError::InvalidData(format!("negative option count `{selected}`"))
            })?,
        });
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(RepoError::QuotaExceeded(violations))
    }
}

fn parse_case_row(conn: &Connection, row: &Row<'_>) -> RepoResult<CaseRecord> {
    let uuid_text: String = row.get("uuid")?;
    let id = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in cases.uuid"))
    })?;

    Ok(CaseRecord {
        id,
        name: row.get("name")?,
        comment: row.get("comment")?,
        audited_institution: load_relation_ids(conn, ID_RELATIONS[0], &uuid_text)?,
        tag: load_tags_for_case(conn, &uuid_text)?,
        responsible_user: load_relation_ids(conn, ID_RELATIONS[1], &uuid_text)?,
        notified_user: load_relation_ids(conn, ID_RELATIONS[2], &uuid_text)?,
        featureoptions: load_relation_ids(conn, ID_RELATIONS[3], &uuid_text)?,
        created_by: row.get("created_by")?,
        modified_by: row.get("modified_by")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_counted_row(conn: &Connection, row: &Row<'_>) -> RepoResult<CountedCase> {
    Ok(CountedCase {
        case: parse_case_row(conn, row)?,
        note_count: parse_count(row, "note_count")?,
        letter_count: parse_count(row, "letter_count")?,
    })
}

fn parse_count(row: &Row<'_>, column: &str) -> RepoResult<u64> {
    let value: i64 = row.get(column)?;
    u64::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("negative counter `{value}` in {column}")))
}

fn load_tags_for_case(conn: &Connection, case_uuid: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT t.name
         FROM case_tags ct
         INNER JOIN tags t ON t.id = ct.tag_id
         WHERE ct.case_uuid = ?1
         ORDER BY ct.position ASC;",
    )?;
    let tags = stmt
        .query_map([case_uuid], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}

fn load_relation_ids(
    conn: &Connection,
    (table, column): (&str, &str),
    case_uuid: &str,
) -> RepoResult<Vec<i64>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {column} FROM {table} WHERE case_uuid = ?1 ORDER BY {column} ASC;"
    ))?;
    let ids = stmt
        .query_map([case_uuid], |row| row.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::normalize_case_limit;

    #[test]
    fn case_limit_defaults_to_20_and_caps_at_100() {
        assert_eq!(normalize_case_limit(None), 20);
        assert_eq!(normalize_case_limit(Some(0)), 20);
        assert_eq!(normalize_case_limit(Some(7)), 7);
        assert_eq!(normalize_case_limit(Some(500)), 100);
    }
}
