//! Patient registry.
//!
//! Owns the `patients` table. Two integrity rules live here:
//!
//! - the national ID (CPF) is unique across patients, checked up front and backed by the
//!   `UNIQUE` constraint for writers that race past the check;
//! - a patient cannot be deleted while any exam references it, checked by counting exams and
//!   backed by the `ON DELETE RESTRICT` foreign key.

use crate::constants::PATIENT_NOT_FOUND;
use crate::error::{is_foreign_key_violation, is_unique_violation};
use crate::pagination::{count_to_total, Page, PageRequest};
use crate::store::{Store, NOW_SQL};
use crate::validation::{calendar_date, required_text};
use crate::{RecordsError, RecordsResult};
use chrono::{DateTime, NaiveDate, Utc};
use mobilemed_types::{Cpf, NonEmptyText};
use serde::Serialize;
use uuid::Uuid;

const PATIENT_COLUMNS: &str =
    "id, national_id, name, birth_date, sex, address, phone, created_at, updated_at";

const NATIONAL_ID_TAKEN: &str = "nationalId already registered";

/// A stored patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Uuid,
    pub national_id: Cpf,
    pub name: String,
    pub birth_date: NaiveDate,
    pub sex: String,
    pub address: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Unvalidated patient fields, as submitted by a client.
///
/// Used for both create and update; every field is replaced on update.
#[derive(Debug, Clone, Default)]
pub struct PatientInput {
    pub national_id: String,
    pub name: String,
    pub birth_date: String,
    pub sex: String,
    pub address: String,
    pub phone: String,
}

struct ValidPatient {
    national_id: Cpf,
    name: NonEmptyText,
    birth_date: NaiveDate,
    sex: NonEmptyText,
    address: NonEmptyText,
    phone: NonEmptyText,
}

impl PatientInput {
    fn validate(&self) -> RecordsResult<ValidPatient> {
        Ok(ValidPatient {
            national_id: Cpf::parse(self.national_id.trim())?,
            name: required_text("name", &self.name)?,
            birth_date: calendar_date("birthDate", &self.birth_date)?,
            sex: required_text("sex", &self.sex)?,
            address: required_text("address", &self.address)?,
            phone: required_text("phone", &self.phone)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PatientRow {
    id: String,
    national_id: String,
    name: String,
    birth_date: NaiveDate,
    sex: String,
    address: String,
    phone: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PatientRow> for Patient {
    type Error = RecordsError;

    fn try_from(row: PatientRow) -> RecordsResult<Self> {
        Ok(Patient {
            id: Uuid::parse_str(&row.id)
                .map_err(|e| RecordsError::CorruptRow(format!("patient id {}: {e}", row.id)))?,
            national_id: Cpf::parse(&row.national_id).map_err(|e| {
                RecordsError::CorruptRow(format!("patient {} national_id: {e}", row.id))
            })?,
            name: row.name,
            birth_date: row.birth_date,
            sex: row.sex,
            address: row.address,
            phone: row.phone,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Service for patient records.
#[derive(Clone, Debug)]
pub struct PatientRegistry {
    store: Store,
}

impl PatientRegistry {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Registers a new patient.
    ///
    /// # Errors
    ///
    /// - `Validation` if any field is blank, the birth date is malformed, or the CPF fails its
    ///   checksum
    /// - `Conflict` if another patient already holds the CPF
    pub async fn create_patient(&self, input: PatientInput) -> RecordsResult<Patient> {
        let valid = input.validate()?;

        if self.find_by_national_id(&valid.national_id).await?.is_some() {
            tracing::warn!("rejected patient create: national ID already registered");
            return Err(RecordsError::conflict(NATIONAL_ID_TAKEN));
        }

        self.insert(&valid).await
    }

    /// Writes a validated patient. A concurrent writer that took the CPF after the
    /// pre-check surfaces here as a `UNIQUE` violation.
    async fn insert(&self, valid: &ValidPatient) -> RecordsResult<Patient> {
        let id = Uuid::new_v4();
        let sql = format!(
            "INSERT INTO patients (id, national_id, name, birth_date, sex, address, phone) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             RETURNING {PATIENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PatientRow>(&sql)
            .bind(id.to_string())
            .bind(valid.national_id.as_str())
            .bind(valid.name.as_str())
            .bind(valid.birth_date)
            .bind(valid.sex.as_str())
            .bind(valid.address.as_str())
            .bind(valid.phone.as_str())
            .fetch_one(self.store.pool())
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    RecordsError::conflict(NATIONAL_ID_TAKEN)
                } else {
                    e.into()
                }
            })?;

        let patient = Patient::try_from(row)?;
        tracing::info!("created patient {}", patient.id);
        Ok(patient)
    }

    /// Replaces every field of an existing patient.
    ///
    /// # Errors
    ///
    /// - `NotFound` if `id` is unknown
    /// - `Validation` for malformed fields or a failed CPF checksum
    /// - `Conflict` if the CPF changed to one held by another patient
    pub async fn update_patient(&self, id: Uuid, input: PatientInput) -> RecordsResult<Patient> {
        let existing = self
            .get_patient(id)
            .await?
            .ok_or_else(|| RecordsError::not_found(PATIENT_NOT_FOUND))?;

        let valid = input.validate()?;

        if existing.national_id != valid.national_id {
            if let Some(holder) = self.find_by_national_id(&valid.national_id).await? {
                if holder.id != id {
                    tracing::warn!("rejected update of patient {id}: national ID in use");
                    return Err(RecordsError::conflict(NATIONAL_ID_TAKEN));
                }
            }
        }

        let sql = format!(
            "UPDATE patients SET \
                 national_id = ?2, name = ?3, birth_date = ?4, sex = ?5, \
                 address = ?6, phone = ?7, updated_at = {NOW_SQL} \
             WHERE id = ?1 \
             RETURNING {PATIENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PatientRow>(&sql)
            .bind(id.to_string())
            .bind(valid.national_id.as_str())
            .bind(valid.name.as_str())
            .bind(valid.birth_date)
            .bind(valid.sex.as_str())
            .bind(valid.address.as_str())
            .bind(valid.phone.as_str())
            .fetch_optional(self.store.pool())
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    RecordsError::conflict(NATIONAL_ID_TAKEN)
                } else {
                    e.into()
                }
            })?
            // Deleted between the existence check and the update.
            .ok_or_else(|| RecordsError::not_found(PATIENT_NOT_FOUND))?;

        let patient = Patient::try_from(row)?;
        tracing::info!("updated patient {}", patient.id);
        Ok(patient)
    }

    /// Deletes a patient that has no exams.
    ///
    /// # Errors
    ///
    /// - `NotFound` if `id` is unknown
    /// - `Validation` carrying the exam count if any exam references the patient
    pub async fn delete_patient(&self, id: Uuid) -> RecordsResult<()> {
        if !self.exists(id).await? {
            return Err(RecordsError::not_found(PATIENT_NOT_FOUND));
        }

        let exam_count = self.count_exams(id).await?;
        if exam_count > 0 {
            tracing::warn!("refused to delete patient {id}: {exam_count} exams reference it");
            return Err(has_exams(exam_count));
        }

        self.remove(id).await
    }

    /// Deletes the row, relying on `ON DELETE RESTRICT` for exams added after the count.
    async fn remove(&self, id: Uuid) -> RecordsResult<()> {
        let result = sqlx::query("DELETE FROM patients WHERE id = ?1")
            .bind(id.to_string())
            .execute(self.store.pool())
            .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(RecordsError::not_found(
                PATIENT_NOT_FOUND,
            )),
            Ok(_) => {
                tracing::info!("deleted patient {id}");
                Ok(())
            }
            // An exam was created for this patient after the count.
            Err(e) if is_foreign_key_violation(&e) => {
                let exam_count = self.count_exams(id).await?;
                Err(has_exams(exam_count))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Lists patients, newest first.
    pub async fn list_patients(&self, request: PageRequest) -> RecordsResult<Page<Patient>> {
        let sql = format!(
            "SELECT {PATIENT_COLUMNS} FROM patients \
             ORDER BY created_at DESC, rowid DESC \
             LIMIT ?1 OFFSET ?2"
        );
        let rows = sqlx::query_as::<_, PatientRow>(&sql)
            .bind(request.limit())
            .bind(request.offset())
            .fetch_all(self.store.pool())
            .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM patients")
            .fetch_one(self.store.pool())
            .await?;

        let data = rows
            .into_iter()
            .map(Patient::try_from)
            .collect::<RecordsResult<Vec<_>>>()?;

        Ok(Page::new(data, count_to_total(total), request))
    }

    /// Looks up a patient; `None` when the id is unknown.
    pub async fn get_patient(&self, id: Uuid) -> RecordsResult<Option<Patient>> {
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1");
        sqlx::query_as::<_, PatientRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(self.store.pool())
            .await?
            .map(Patient::try_from)
            .transpose()
    }

    /// Looks up the patient holding a national ID.
    pub async fn find_by_national_id(&self, national_id: &Cpf) -> RecordsResult<Option<Patient>> {
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE national_id = ?1");
        sqlx::query_as::<_, PatientRow>(&sql)
            .bind(national_id.as_str())
            .fetch_optional(self.store.pool())
            .await?
            .map(Patient::try_from)
            .transpose()
    }

    async fn exists(&self, id: Uuid) -> RecordsResult<bool> {
        patient_exists(&self.store, id).await
    }

    async fn count_exams(&self, id: Uuid) -> RecordsResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM exams WHERE patient_id = ?1")
            .bind(id.to_string())
            .fetch_one(self.store.pool())
            .await?;
        Ok(count)
    }
}

/// Whether a patient row with `id` exists. Shared with the exam ledger.
pub(crate) async fn patient_exists(store: &Store, id: Uuid) -> RecordsResult<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM patients WHERE id = ?1)")
        .bind(id.to_string())
        .fetch_one(store.pool())
        .await?;
    Ok(exists)
}

fn has_exams(count: i64) -> RecordsError {
    RecordsError::validation(format!(
        "cannot delete patient with associated exams. Total exams: {count}"
    ))
}


#[cfg(test)]
mod tests {
    use super::test_support::{nth_cpf, patient_input};
    use super::*;
    use crate::store::test_support::open_test_store;

    #[tokio::test]
    async fn create_assigns_id_and_timestamps() {
        let (_dir, store) = open_test_store().await;
        let registry = PatientRegistry::new(store);

        let patient = registry
            .create_patient(patient_input("11144477735"))
            .await
            .expect("create should succeed");

        assert_eq!(patient.national_id.as_str(), "11144477735");
        assert_eq!(patient.name, "João Silva");
        assert_eq!(patient.birth_date, NaiveDate::from_ymd_opt(1990, 1, 15).unwrap());
        assert_eq!(patient.created_at, patient.updated_at);

        let fetched = registry.get_patient(patient.id).await.unwrap();
        assert_eq!(fetched, Some(patient));
    }

    #[tokio::test]
    async fn create_rejects_bad_checksum() {
        let (_dir, store) = open_test_store().await;
        let registry = PatientRegistry::new(store);

        let err = registry
            .create_patient(patient_input("11144477736"))
            .await
            .unwrap_err();
        assert!(matches!(err, RecordsError::Validation(_)), "{err:?}");
        assert!(err.to_string().contains("nationalId"));
    }

    #[tokio::test]
    async fn create_rejects_blank_fields() {
        let (_dir, store) = open_test_store().await;
        let registry = PatientRegistry::new(store);

        let mut input = patient_input("11144477735");
        input.address = "   ".into();
        let err = registry.create_patient(input).await.unwrap_err();
        assert_eq!(err.to_string(), "address should not be empty");
    }

    #[tokio::test]
    async fn duplicate_national_id_yields_one_success_and_one_conflict() {
        let (_dir, store) = open_test_store().await;
        let registry = PatientRegistry::new(store);

        registry
            .create_patient(patient_input("52998224725"))
            .await
            .expect("first create should succeed");
        let err = registry
            .create_patient(patient_input("52998224725"))
            .await
            .unwrap_err();

        assert!(matches!(err, RecordsError::Conflict(_)), "{err:?}");
        let page = registry.list_patients(PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn concurrent_creates_with_one_national_id_persist_one_row() {
        let (_dir, store) = open_test_store().await;
        let registry = PatientRegistry::new(store);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.create_patient(patient_input("52998224725")).await
            }));
        }

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(RecordsError::Conflict(_)) => {}
                Err(other) => panic!("expected a conflict, got {other:?}"),
            }
        }
        assert_eq!(created, 1);
        let page = registry.list_patients(PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn insert_past_the_precheck_is_a_conflict() {
        let (_dir, store) = open_test_store().await;
        let registry = PatientRegistry::new(store);
        let valid = patient_input("52998224725").validate().unwrap();

        registry.insert(&valid).await.expect("first insert should succeed");
        let err = registry.insert(&valid).await.unwrap_err();

        assert!(matches!(err, RecordsError::Conflict(_)), "{err:?}");
        assert_eq!(err.to_string(), NATIONAL_ID_TAKEN);
    }

    #[tokio::test]
    async fn exam_added_after_the_count_still_blocks_delete() {
        let (_dir, store) = open_test_store().await;
        let registry = PatientRegistry::new(store.clone());
        let patient = registry
            .create_patient(patient_input("11144477735"))
            .await
            .unwrap();

        sqlx::query(
            "INSERT INTO exams (id, modality, exam_date, result, idempotency_key, patient_id) \
             VALUES (?1, 'CT', '2025-01-15', 'Normal', 'late', ?2)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(patient.id.to_string())
        .execute(store.pool())
        .await
        .unwrap();

        let err = registry.remove(patient.id).await.unwrap_err();
        assert!(matches!(err, RecordsError::Validation(_)), "{err:?}");
        assert!(err.to_string().contains("Total exams: 1"));
        assert!(registry.get_patient(patient.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn update_replaces_fields_and_keeps_created_at() {
        let (_dir, store) = open_test_store().await;
        let registry = PatientRegistry::new(store);
        let created = registry
            .create_patient(patient_input("11144477735"))
            .await
            .unwrap();

        let mut input = patient_input("52998224725");
        input.name = "Maria Souza".into();
        input.sex = "F".into();
        let updated = registry.update_patient(created.id, input).await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.national_id.as_str(), "52998224725");
        assert_eq!(updated.name, "Maria Souza");
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn update_allows_keeping_own_national_id() {
        let (_dir, store) = open_test_store().await;
        let registry = PatientRegistry::new(store);
        let created = registry
            .create_patient(patient_input("11144477735"))
            .await
            .unwrap();

        let mut input = patient_input("11144477735");
        input.phone = "21988887777".into();
        let updated = registry.update_patient(created.id, input).await.unwrap();
        assert_eq!(updated.phone, "21988887777");
    }

    #[tokio::test]
    async fn update_rejects_national_id_of_another_patient() {
        let (_dir, store) = open_test_store().await;
        let registry = PatientRegistry::new(store);
        registry
            .create_patient(patient_input("11144477735"))
            .await
            .unwrap();
        let second = registry
            .create_patient(patient_input("52998224725"))
            .await
            .unwrap();

        let err = registry
            .update_patient(second.id, patient_input("11144477735"))
            .await
            .unwrap_err();
        assert!(matches!(err, RecordsError::Conflict(_)), "{err:?}");
    }

    #[tokio::test]
    async fn update_unknown_patient_is_not_found_even_with_bad_input() {
        let (_dir, store) = open_test_store().await;
        let registry = PatientRegistry::new(store);

        let err = registry
            .update_patient(Uuid::new_v4(), patient_input("11144477736"))
            .await
            .unwrap_err();
        assert!(matches!(err, RecordsError::NotFound(_)), "{err:?}");
    }

    #[tokio::test]
    async fn delete_without_exams_removes_the_row() {
        let (_dir, store) = open_test_store().await;
        let registry = PatientRegistry::new(store);
        let patient = registry
            .create_patient(patient_input("11144477735"))
            .await
            .unwrap();

        registry.delete_patient(patient.id).await.unwrap();
        assert_eq!(registry.get_patient(patient.id).await.unwrap(), None);

        let err = registry.delete_patient(patient.id).await.unwrap_err();
        assert!(matches!(err, RecordsError::NotFound(_)), "{err:?}");
    }

    #[tokio::test]
    async fn get_unknown_patient_is_none() {
        let (_dir, store) = open_test_store().await;
        let registry = PatientRegistry::new(store);
        assert_eq!(registry.get_patient(Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_paginates_newest_first() {
        let (_dir, store) = open_test_store().await;
        let registry = PatientRegistry::new(store);

        let mut created = Vec::new();
        for n in 0..15 {
            created.push(registry.create_patient(patient_input(&nth_cpf(n))).await.unwrap());
        }

        let first = registry
            .list_patients(PageRequest::new(1, 10, 100).unwrap())
            .await
            .unwrap();
        assert_eq!(first.data.len(), 10);
        assert_eq!(first.total, 15);
        assert_eq!(first.total_pages, 2);
        assert_eq!(first.data[0].id, created[14].id);

        let second = registry
            .list_patients(PageRequest::new(2, 10, 100).unwrap())
            .await
            .unwrap();
        assert_eq!(second.data.len(), 5);
        assert_eq!(second.page, 2);
        assert_eq!(second.data[4].id, created[0].id);
    }

    #[tokio::test]
    async fn empty_listing_has_zero_pages() {
        let (_dir, store) = open_test_store().await;
        let registry = PatientRegistry::new(store);

        let page = registry.list_patients(PageRequest::default()).await.unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 0);
    }
}
