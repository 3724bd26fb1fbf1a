//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Own input validation so repositories only ever see validated drafts.

pub mod case_service;
