//! Domain model for case records and their collaborators.
//!
//! # Responsibility
//! - Define the input and read shapes of a Case.
//! - Define feature/option configuration and tag normalization rules.
//! - Define the field-keyed validation error map returned to callers.
//!
//! # Invariants
//! - Every Case is identified by a stable `CaseId` (UUID v4).
//! - Derived counters are never part of the writable shape.

pub mod case;
pub mod feature;
pub mod tag;
pub mod validation;
