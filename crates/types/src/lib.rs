//! # MobileMed Types
//!
//! Validated value types shared by the core services and the API layer.
//!
//! Each type guarantees its invariant once constructed, so code holding one never needs to
//! re-check it:
//! - [`NonEmptyText`]: trimmed, non-blank text
//! - [`Cpf`]: an 11-digit Brazilian national ID with valid check digits
//! - [`Modality`]: one of the fixed DICOM imaging modalities accepted for exams

mod cpf;
mod modality;
mod text;

pub use cpf::{Cpf, CpfError};
pub use modality::{Modality, ModalityError};
pub use text::{NonEmptyText, TextError};
