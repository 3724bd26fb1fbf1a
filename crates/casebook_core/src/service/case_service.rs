//! Case use-case service.
//!
//! # Responsibility
//! - Validate raw `CaseInput` into a `CaseDraft`, collecting every field
//!   error into one `ValidationErrors` map.
//! - Apply acting-principal defaults for responsible/notified users.
//! - Persist through `CaseRepository` and read the result back.
//! - Expose the counted case view and case listing.
//!
//! # Invariants
//! - Field errors never abort validation of other fields.
//! - `responsible_user`/`notified_user` default to `[actor]` only when absent.
//! - Feature-option quota is checked per feature before the write and again
//!   inside the write transaction; both surface as `featureoptions` errors.
//! - `comment` is stored verbatim; only `name` and tags are normalized.
//! - Log events carry ids and counts only, never names, comments or tags.

use crate::model::case::{
    CaseDraft, CaseId, CaseInput, CaseRecord, CountedCase, UserId, CASE_NAME_MAX_CHARS,
    FIELD_AUDITED_INSTITUTION, FIELD_FEATURE_OPTIONS, FIELD_NAME, FIELD_NOTIFIED_USER,
    FIELD_RESPONSIBLE_USER, FIELD_TAG,
};
use crate::model::feature::quota_violations;
use crate::model::tag::{normalize_tag, normalize_tags, TAG_NAME_MAX_CHARS};
use crate::model::validation::ValidationErrors;
use crate::repo::case_repo::{normalize_case_limit, CaseListQuery, CaseRepository};
use crate::repo::{RepoError, RepoResult};
use log::{info, warn};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for case use-cases.
#[derive(Debug)]
pub enum CaseServiceError {
    /// Input failed validation; the map is keyed by input field name.
    Validation(ValidationErrors),
    /// Acting principal does not exist.
    UnknownActor(UserId),
    /// Target case does not exist.
    CaseNotFound(CaseId),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for CaseServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(errors) => write!(f, "invalid case input: {errors}"),
            Self::UnknownActor(user_id) => write!(f, "acting user not found: {user_id}"),
            Self::CaseNotFound(case_id) => write!(f, "case not found: {case_id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent case state: {details}"),
        }
    }
}

impl Error for CaseServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(errors) => Some(errors),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CaseServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(case_id) => Self::CaseNotFound(case_id),
            RepoError::QuotaExceeded(violations) => {
                let mut errors = ValidationErrors::new();
                for violation in violations {
                    errors.add(FIELD_FEATURE_OPTIONS, violation.to_string());
                }
                Self::Validation(errors)
            }
            other => Self::Repo(other),
        }
    }
}

/// List result envelope used by service callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CasesListResult {
    /// List items sorted by `updated_at DESC, uuid ASC`.
    pub items: Vec<CountedCase>,
    /// Effective normalized limit used by the query.
    pub applied_limit: u32,
}

/// Case service facade over repository implementations.
pub struct CaseService<R: CaseRepository> {
    repo: R,
}

impl<R: CaseRepository> CaseService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Validates `input` on behalf of `actor` and returns the defaulted draft.
    ///
    /// # Errors
    /// - `UnknownActor` when `actor` is not a known user.
    /// - `Validation` with every failing field when the input is invalid.
    pub fn validate_case(
        &self,
        actor: UserId,
        input: &CaseInput,
    ) -> Result<CaseDraft, CaseServiceError> {
        if self.repo.existing_user_ids(&[actor])?.is_empty() {
            return Err(CaseServiceError::UnknownActor(actor));
        }

        let mut errors = ValidationErrors::new();

        let name = input.name.trim();
        if name.is_empty() {
            errors.add(FIELD_NAME, "this field may not be blank");
        } else if name.chars().count() > CASE_NAME_MAX_CHARS {
            errors.add(
                FIELD_NAME,
                format!("ensure this field has no more than {CASE_NAME_MAX_CHARS} characters"),
            );
        }

        for raw in &input.tag {
            match normalize_tag(raw) {
                None => errors.add(FIELD_TAG, "tag names may not be blank"),
                Some(tag) if tag.chars().count() > TAG_NAME_MAX_CHARS => errors.add(
                    FIELD_TAG,
                    format!("tag names may have at most {TAG_NAME_MAX_CHARS} characters"),
                ),
                Some(_) => {}
            }
        }

        let audited_institution = unique_ids(&input.audited_institution);
        let known = self.repo.existing_institution_ids(&audited_institution)?;
        report_unknown(&mut errors, FIELD_AUDITED_INSTITUTION, &audited_institution, &known);

        let responsible_user = unique_ids(input.responsible_user.as_deref().unwrap_or(&[actor]));
        let known = self.repo.existing_user_ids(&responsible_user)?;
        report_unknown(&mut errors, FIELD_RESPONSIBLE_USER, &responsible_user, &known);

        let notified_user = unique_ids(input.notified_user.as_deref().unwrap_or(&[actor]));
        let known = self.repo.existing_user_ids(&notified_user)?;
        report_unknown(&mut errors, FIELD_NOTIFIED_USER, &notified_user, &known);

        let featureoptions = unique_ids(&input.featureoptions);
        let resolved = self.repo.resolve_options(&featureoptions)?;
        let known = resolved
            .iter()
            .map(|resolved| resolved.option.id)
            .collect::<BTreeSet<_>>();
        report_unknown(&mut errors, FIELD_FEATURE_OPTIONS, &featureoptions, &known);
        for violation in quota_violations(&resolved) {
            errors.add(FIELD_FEATURE_OPTIONS, violation.to_string());
        }

        errors.into_result().map_err(CaseServiceError::Validation)?;

        Ok(CaseDraft {
            name: name.to_string(),
            comment: input.comment.clone().unwrap_or_default(),
            audited_institution,
            tags: normalize_tags(&input.tag),
            responsible_user,
            notified_user,
            featureoptions,
            actor,
        })
    }

    /// Validates and persists a new case, then returns its read-back.
    pub fn create_case(
        &mut self,
        actor: UserId,
        input: &CaseInput,
    ) -> Result<CaseRecord, CaseServiceError> {
        let draft = self
            .validate_case(actor, input)
            .inspect_err(|err| log_rejected("case_create", err))?;
        let case_id = self
            .repo
            .insert_case(&draft)
            .inspect_err(|err| log_write_failed("case_create", err))?;

        info!(
            "event=case_create module=service status=ok case_id={} actor={} tags={} options={}",
            case_id,
            actor,
            draft.tags.len(),
            draft.featureoptions.len()
        );
        self.repo
            .get_case(case_id)?
            .ok_or(CaseServiceError::InconsistentState(
                "created case not found in read-back",
            ))
    }

    /// Replaces all fields and relations of an existing case.
    ///
    /// Uses the same validation and defaulting rules as `create_case`.
    pub fn update_case(
        &mut self,
        actor: UserId,
        case_id: CaseId,
        input: &CaseInput,
    ) -> Result<CaseRecord, CaseServiceError> {
        let draft = self
            .validate_case(actor, input)
            .inspect_err(|err| log_rejected("case_update", err))?;
        self.repo
            .replace_case(case_id, &draft)
            .inspect_err(|err| log_write_failed("case_update", err))?;

        info!(
            "event=case_update module=service status=ok case_id={} actor={}",
            case_id, actor
        );
        self.repo
            .get_case(case_id)?
            .ok_or(CaseServiceError::InconsistentState(
                "updated case not found in read-back",
            ))
    }

    /// Gets one case by stable ID.
    pub fn get_case(&self, case_id: CaseId) -> RepoResult<Option<CaseRecord>> {
        self.repo.get_case(case_id)
    }

    /// Gets one case with `note_count`/`letter_count` computed now.
    pub fn get_case_counted(&self, case_id: CaseId) -> RepoResult<Option<CountedCase>> {
        self.repo.get_case_counted(case_id)
    }

    /// Lists counted cases using optional single-tag filter and pagination.
    ///
    /// A filter that normalizes to nothing is rejected as a `tag` field error
    /// instead of being dropped.
    pub fn list_cases(
        &self,
        tag: Option<String>,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<CasesListResult, CaseServiceError> {
        let tag = match tag {
            Some(raw) => match normalize_tag(&raw) {
                Some(tag) => Some(tag),
                None => {
                    let mut errors = ValidationErrors::new();
                    errors.add(FIELD_TAG, "tag filter may not be blank");
                    return Err(CaseServiceError::Validation(errors));
                }
            },
            None => None,
        };
        let applied_limit = normalize_case_limit(limit);
        let query = CaseListQuery {
            tag,
            limit: Some(applied_limit),
            offset,
        };
        let items = self.repo.list_cases(&query)?;
        Ok(CasesListResult {
            items,
            applied_limit,
        })
    }

    /// Lists tag names known by storage.
    pub fn list_tags(&self) -> RepoResult<Vec<String>> {
        self.repo.list_tags()
    }
}

/// Deduplicates ids into ascending order.
fn unique_ids(ids: &[i64]) -> Vec<i64> {
    ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}

fn report_unknown(errors: &mut ValidationErrors, field: &str, ids: &[i64], known: &BTreeSet<i64>) {
    for id in ids.iter().filter(|id| !known.contains(*id)) {
        errors.add(field, format!("invalid pk \"{id}\" - object does not exist"));
    }
}

fn log_rejected(event: &str, err: &CaseServiceError) {
    match err {
        CaseServiceError::Validation(errors) => warn!(
            "event={event} module=service status=rejected fields={}",
            errors.fields().collect::<Vec<_>>().join(",")
        ),
        other => warn!("event={event} module=service status=error error={other}"),
    }
}

fn log_write_failed(event: &str, err: &RepoError) {
    match err {
        RepoError::QuotaExceeded(violations) => warn!(
            "event={event} module=service status=rejected fields=featureoptions features={}",
            violations.len()
        ),
        other => warn!("event={event} module=service status=error error={other}"),
    }
}
