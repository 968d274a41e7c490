//! Record services.
//!
//! One service per table: [`patients::PatientRegistry`] and [`exams::ExamLedger`]. Both hold a
//! clone of the same [`crate::Store`] and enforce the referential rules between the tables.

pub mod exams;
pub mod patients;
