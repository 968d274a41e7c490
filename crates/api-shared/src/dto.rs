//! Wire types.
//!
//! Request bodies carry raw strings; validation happens in the core services so every client
//! (HTTP, CLI) gets the same rules and messages. Responses serialize the core records
//! (`Patient`, `Exam`, `Page<T>`) directly.

use mobilemed_core::validation;
use mobilemed_core::{ExamInput, PatientInput, RecordsResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /patients` and `PUT /patients/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PatientReq {
    #[serde(alias = "cpf")]
    pub national_id: String,
    pub name: String,
    pub birth_date: String,
    pub sex: String,
    pub address: String,
    pub phone: String,
}

impl From<PatientReq> for PatientInput {
    fn from(req: PatientReq) -> Self {
        PatientInput {
            national_id: req.national_id,
            name: req.name,
            birth_date: req.birth_date,
            sex: req.sex,
            address: req.address,
            phone: req.phone,
        }
    }
}

/// Body of `POST /exams` and `PUT /exams/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExamReq {
    pub modality: String,
    pub exam_date: String,
    pub result: String,
    pub idempotency_key: String,
    pub patient_id: String,
}

impl From<ExamReq> for ExamInput {
    fn from(req: ExamReq) -> Self {
        ExamInput {
            modality: req.modality,
            exam_date: req.exam_date,
            result: req.result,
            idempotency_key: req.idempotency_key,
            patient_id: req.patient_id,
        }
    }
}

/// Query string of `GET /patients`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPatientsQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Query string of `GET /exams`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListExamsQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub patient_id: Option<String>,
}

impl ListExamsQuery {
    /// The patient filter, if one was given. A blank value means no filter.
    pub fn patient_filter(&self) -> RecordsResult<Option<Uuid>> {
        self.patient_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .map(|id| validation::uuid("patientId", id))
            .transpose()
    }
}

/// Health status body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Body returned with every 4xx/5xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRes {
    pub status_code: u16,
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patient_req_accepts_cpf_alias() {
        let req: PatientReq = serde_json::from_value(serde_json::json!({
            "cpf": "11144477735",
            "name": "João Silva",
            "birthDate": "1990-01-15",
            "sex": "M",
            "address": "Rua A, 123",
            "phone": "11999999999"
        }))
        .unwrap();
        let input = PatientInput::from(req);
        assert_eq!(input.national_id, "11144477735");
        assert_eq!(input.birth_date, "1990-01-15");
    }

    #[test]
    fn exam_req_rejects_missing_and_unknown_fields() {
        let missing = serde_json::from_value::<ExamReq>(serde_json::json!({
            "modality": "CT",
            "examDate": "2025-01-15",
            "result": "Normal",
            "patientId": "550e8400-e29b-41d4-a716-446655440000"
        }));
        assert!(missing.unwrap_err().to_string().contains("idempotencyKey"));

        let unknown = serde_json::from_value::<ExamReq>(serde_json::json!({
            "modality": "CT",
            "examDate": "2025-01-15",
            "result": "Normal",
            "idempotencyKey": "k1",
            "patientId": "550e8400-e29b-41d4-a716-446655440000",
            "priority": "high"
        }));
        assert!(unknown.is_err());
    }

    #[test]
    fn patient_filter_parses_or_ignores_blank() {
        let blank = ListExamsQuery {
            patient_id: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(blank.patient_filter().unwrap(), None);

        let bad = ListExamsQuery {
            patient_id: Some("nope".into()),
            ..Default::default()
        };
        assert!(bad.patient_filter().is_err());

        let good = ListExamsQuery {
            patient_id: Some("550e8400-e29b-41d4-a716-446655440000".into()),
            ..Default::default()
        };
        assert!(good.patient_filter().unwrap().is_some());
    }
}
