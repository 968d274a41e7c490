//! # MobileMed Core
//!
//! Core business logic for the MobileMed patient and exam records service.
//!
//! This crate contains pure data operations over the relational store:
//! - Patient registration with unique, checksum-validated national IDs
//! - Idempotent exam creation keyed by a client-supplied idempotency key
//! - Referential checks between exams and patients
//! - Paginated listings
//!
//! **No API concerns**: authentication, HTTP servers, and wire formats belong in `api-rest`
//! and `api-shared`.

pub mod config;
pub mod constants;
pub mod error;
pub mod pagination;
pub mod repositories;
pub mod store;
pub mod validation;

pub use config::CoreConfig;
pub use error::{RecordsError, RecordsResult};
pub use pagination::{Page, PageRequest};
pub use repositories::exams::{Creation, Exam, ExamInput, ExamLedger};
pub use repositories::patients::{Patient, PatientInput, PatientRegistry};
pub use store::Store;

pub use mobilemed_types::{Cpf, Modality, NonEmptyText};
