//! Exam ledger.
//!
//! Owns the `exams` table and the idempotent create protocol. A client tags every create with
//! an idempotency key; the ledger guarantees at most one exam per key, even when several
//! requests carrying the same key race each other:
//!
//! 1. If an exam with the key already exists, it is returned as [`Creation::Replayed`] and
//!    nothing is written.
//! 2. The referenced patient must exist.
//! 3. The row is written with `INSERT ... ON CONFLICT(idempotency_key) DO NOTHING RETURNING`.
//!    A returned row means this call created it. No row means a concurrent writer got there
//!    first, so that writer's row is fetched and returned as [`Creation::Replayed`].
//!
//! The `UNIQUE` constraint on `idempotency_key` is what makes step 3 safe; step 1 only saves a
//! write on the common replay path.

use crate::constants::{EXAM_NOT_FOUND, PATIENT_NOT_FOUND};
use crate::error::{is_foreign_key_violation, is_unique_violation};
use crate::pagination::{count_to_total, Page, PageRequest};
use crate::repositories::patients::patient_exists;
use crate::store::{Store, NOW_SQL};
use crate::validation::{self, calendar_date, required_text};
use crate::{RecordsError, RecordsResult};
use chrono::{DateTime, NaiveDate, Utc};
use mobilemed_types::{Modality, NonEmptyText};
use serde::Serialize;
use uuid::Uuid;

const EXAM_COLUMNS: &str =
    "id, modality, exam_date, result, idempotency_key, patient_id, created_at, updated_at";

/// A stored exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: Uuid,
    pub modality: Modality,
    pub exam_date: NaiveDate,
    pub result: String,
    pub idempotency_key: String,
    pub patient_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Unvalidated exam fields, as submitted by a client.
#[derive(Debug, Clone, Default)]
pub struct ExamInput {
    pub modality: String,
    pub exam_date: String,
    pub result: String,
    pub idempotency_key: String,
    pub patient_id: String,
}

struct ValidExam {
    modality: Modality,
    exam_date: NaiveDate,
    result: NonEmptyText,
    idempotency_key: String,
    patient_id: Uuid,
}

impl ExamInput {
    fn validate(&self) -> RecordsResult<ValidExam> {
        // Keys are opaque: blank ones are rejected but others are stored untrimmed.
        if self.idempotency_key.trim().is_empty() {
            return Err(RecordsError::validation(
                "idempotencyKey should not be empty",
            ));
        }

        Ok(ValidExam {
            modality: self.modality.parse()?,
            exam_date: calendar_date("examDate", &self.exam_date)?,
            result: required_text("result", &self.result)?,
            idempotency_key: self.idempotency_key.clone(),
            patient_id: validation::uuid("patientId", &self.patient_id)?,
        })
    }
}

/// Outcome of an idempotent create.
///
/// Both variants carry the stored exam; they differ only in whether this call wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Creation<T> {
    Created(T),
    Replayed(T),
}

impl<T> Creation<T> {
    pub fn is_created(&self) -> bool {
        matches!(self, Creation::Created(_))
    }

    pub fn get(&self) -> &T {
        match self {
            Creation::Created(value) | Creation::Replayed(value) => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Creation::Created(value) | Creation::Replayed(value) => value,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ExamRow {
    id: String,
    modality: String,
    exam_date: NaiveDate,
    result: String,
    idempotency_key: String,
    patient_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ExamRow> for Exam {
    type Error = RecordsError;

    fn try_from(row: ExamRow) -> RecordsResult<Self> {
        let corrupt = |what: &str, e: &dyn std::fmt::Display| {
            RecordsError::CorruptRow(format!("exam {} {what}: {e}", row.id))
        };
        Ok(Exam {
            id: Uuid::parse_str(&row.id).map_err(|e| corrupt("id", &e))?,
            modality: row.modality.parse().map_err(|e| corrupt("modality", &e))?,
            exam_date: row.exam_date,
            result: row.result,
            idempotency_key: row.idempotency_key,
            patient_id: Uuid::parse_str(&row.patient_id).map_err(|e| corrupt("patient_id", &e))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Service for exam records.
#[derive(Clone, Debug)]
pub struct ExamLedger {
    store: Store,
}

impl ExamLedger {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Creates an exam, or returns the one already recorded under the same idempotency key.
    ///
    /// A replay returns the stored exam unchanged, even if the submitted fields differ.
    ///
    /// # Errors
    ///
    /// - `Validation` if a field is malformed (including an unknown modality) or the patient
    ///   does not exist
    pub async fn create_exam(&self, input: ExamInput) -> RecordsResult<Creation<Exam>> {
        let valid = input.validate()?;

        if let Some(existing) = self.find_by_idempotency_key(&valid.idempotency_key).await? {
            tracing::debug!("replayed exam {} for idempotency key", existing.id);
            return Ok(Creation::Replayed(existing));
        }

        if !patient_exists(&self.store, valid.patient_id).await? {
            return Err(RecordsError::validation(PATIENT_NOT_FOUND));
        }

        self.insert(&valid).await
    }

    /// The conditional insert. Resolves a lost key race as a replay and a patient deleted
    /// after the existence check as `Validation`.
    async fn insert(&self, valid: &ValidExam) -> RecordsResult<Creation<Exam>> {
        let id = Uuid::new_v4();
        let sql = format!(
            "INSERT INTO exams (id, modality, exam_date, result, idempotency_key, patient_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(idempotency_key) DO NOTHING \
             RETURNING {EXAM_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, ExamRow>(&sql)
            .bind(id.to_string())
            .bind(valid.modality.as_str())
            .bind(valid.exam_date)
            .bind(valid.result.as_str())
            .bind(valid.idempotency_key.as_str())
            .bind(valid.patient_id.to_string())
            .fetch_optional(self.store.pool())
            .await;

        match inserted {
            Ok(Some(row)) => {
                let exam = Exam::try_from(row)?;
                tracing::info!("created exam {} for patient {}", exam.id, exam.patient_id);
                Ok(Creation::Created(exam))
            }
            Ok(None) => self.replay_lost_race(&valid.idempotency_key).await,
            Err(e) if is_unique_violation(&e) => {
                self.replay_lost_race(&valid.idempotency_key).await
            }
            // The patient was deleted after the existence check.
            Err(e) if is_foreign_key_violation(&e) => {
                Err(RecordsError::validation(PATIENT_NOT_FOUND))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn replay_lost_race(&self, idempotency_key: &str) -> RecordsResult<Creation<Exam>> {
        match self.find_by_idempotency_key(idempotency_key).await? {
            Some(existing) => {
                tracing::debug!("concurrent create won for exam {}", existing.id);
                Ok(Creation::Replayed(existing))
            }
            // The winning row was deleted or re-keyed before it could be read back.
            None => Err(RecordsError::conflict(
                "exam for this idempotencyKey changed concurrently; retry the request",
            )),
        }
    }

    /// Replaces every field of an existing exam.
    ///
    /// The idempotency key may change. It is not checked against other exams beforehand;
    /// if the store's unique constraint rejects it the call fails with `Conflict`.
    ///
    /// # Errors
    ///
    /// - `Validation` for malformed fields
    /// - `NotFound` if `id` is unknown
    /// - `Validation` if the patient does not exist
    /// - `Conflict` if the new idempotency key belongs to another exam
    pub async fn update_exam(&self, id: Uuid, input: ExamInput) -> RecordsResult<Exam> {
        let valid = input.validate()?;

        if self.get_exam(id).await?.is_none() {
            return Err(RecordsError::not_found(EXAM_NOT_FOUND));
        }
        if !patient_exists(&self.store, valid.patient_id).await? {
            return Err(RecordsError::validation(PATIENT_NOT_FOUND));
        }

        let sql = format!(
            "UPDATE exams SET \
                 modality = ?2, exam_date = ?3, result = ?4, idempotency_key = ?5, \
                 patient_id = ?6, updated_at = {NOW_SQL} \
             WHERE id = ?1 \
             RETURNING {EXAM_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ExamRow>(&sql)
            .bind(id.to_string())
            .bind(valid.modality.as_str())
            .bind(valid.exam_date)
            .bind(valid.result.as_str())
            .bind(valid.idempotency_key.as_str())
            .bind(valid.patient_id.to_string())
            .fetch_optional(self.store.pool())
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    tracing::warn!("rejected update of exam {id}: idempotency key in use");
                    RecordsError::conflict("idempotencyKey already used by another exam")
                } else if is_foreign_key_violation(&e) {
                    RecordsError::validation(PATIENT_NOT_FOUND)
                } else {
                    e.into()
                }
            })?
            .ok_or_else(|| RecordsError::not_found(EXAM_NOT_FOUND))?;

        let exam = Exam::try_from(row)?;
        tracing::info!("updated exam {}", exam.id);
        Ok(exam)
    }

    /// Deletes an exam. Nothing references exams, so this is unconditional.
    pub async fn delete_exam(&self, id: Uuid) -> RecordsResult<()> {
        let done = sqlx::query("DELETE FROM exams WHERE id = ?1")
            .bind(id.to_string())
            .execute(self.store.pool())
            .await?;

        if done.rows_affected() == 0 {
            return Err(RecordsError::not_found(EXAM_NOT_FOUND));
        }
        tracing::info!("deleted exam {id}");
        Ok(())
    }

    /// Lists exams newest first, optionally only those of one patient.
    pub async fn list_exams(
        &self,
        request: PageRequest,
        patient_id: Option<Uuid>,
    ) -> RecordsResult<Page<Exam>> {
        let patient_filter = patient_id.map(|id| id.to_string());

        let sql = format!(
            "SELECT {EXAM_COLUMNS} FROM exams \
             WHERE (?1 IS NULL OR patient_id = ?1) \
             ORDER BY created_at DESC, rowid DESC \
             LIMIT ?2 OFFSET ?3"
        );
        let rows = sqlx::query_as::<_, ExamRow>(&sql)
            .bind(patient_filter.as_deref())
            .bind(request.limit())
            .bind(request.offset())
            .fetch_all(self.store.pool())
            .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM exams WHERE (?1 IS NULL OR patient_id = ?1)")
                .bind(patient_filter.as_deref())
                .fetch_one(self.store.pool())
                .await?;

        let data = rows
            .into_iter()
            .map(Exam::try_from)
            .collect::<RecordsResult<Vec<_>>>()?;

        Ok(Page::new(data, count_to_total(total), request))
    }

    /// Looks up an exam; `None` when the id is unknown.
    pub async fn get_exam(&self, id: Uuid) -> RecordsResult<Option<Exam>> {
        let sql = format!("SELECT {EXAM_COLUMNS} FROM exams WHERE id = ?1");
        sqlx::query_as::<_, ExamRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(self.store.pool())
            .await?
            .map(Exam::try_from)
            .transpose()
    }

    /// Looks up the exam recorded under an idempotency key.
    pub async fn find_by_idempotency_key(
        &self,
        idempotency_key: &str,
    ) -> RecordsResult<Option<Exam>> {
        let sql = format!("SELECT {EXAM_COLUMNS} FROM exams WHERE idempotency_key = ?1");
        sqlx::query_as::<_, ExamRow>(&sql)
            .bind(idempotency_key)
            .fetch_optional(self.store.pool())
            .await?
            .map(Exam::try_from)
            .transpose()
    }
}
