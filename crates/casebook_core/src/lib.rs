//! Core domain logic for the case record service.
//! This crate is the single source of truth for case validation rules.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::case::{
    CaseDraft, CaseId, CaseInput, CaseRecord, CountedCase, InstitutionId, UserId,
};
pub use model::feature::{Feature, FeatureId, FeatureOption, OptionId, QuotaViolation};
pub use model::validation::ValidationErrors;
pub use repo::case_repo::{CaseListQuery, CaseRepository, SqliteCaseRepository};
pub use repo::correspondence_repo::{CorrespondenceRepository, SqliteCorrespondenceRepository};
pub use repo::directory_repo::{DirectoryRepository, SqliteDirectoryRepository};
pub use repo::feature_repo::{FeatureRepository, SqliteFeatureRepository};
pub use repo::{RepoError, RepoResult};
pub use service::case_service::{CaseService, CaseServiceError, CasesListResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
