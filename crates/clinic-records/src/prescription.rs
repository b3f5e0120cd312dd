//! 处方管理

use chrono::Utc;
use clinic_core::{
    ClinicError, PrescribedMedication, Prescription, PrescriptionStatus, Result,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// 新建处方请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPrescription {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub medications: Vec<PrescribedMedication>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
}

/// 处方管理器
#[derive(Debug, Default)]
pub struct PrescriptionManager {
    prescriptions: HashMap<Uuid, Prescription>,
    patient_index: HashMap<Uuid, Vec<Uuid>>,
}

impl PrescriptionManager {
    /// 创建新的处方管理器
    pub fn new() -> Self {
        Self {
            prescriptions: HashMap::new(),
            patient_index: HashMap::new(),
        }
    }

    /// 开具处方，初始状态为有效
    pub fn create(&mut self, request: NewPrescription) -> Result<Prescription> {
        if request.medications.is_empty() {
            return Err(ClinicError::validation(
                "medications",
                "a prescription requires at least one medication",
            ));
        }
        for (index, medication) in request.medications.iter().enumerate() {
            if medication.name.trim().is_empty() {
                return Err(ClinicError::validation(
                    format!("medications[{}].name", index),
                    "medication name is required",
                ));
            }
            if medication.dosage.trim().is_empty() {
                return Err(ClinicError::validation(
                    format!("medications[{}].dosage", index),
                    "dosage is required",
                ));
            }
            if medication.refills < 0 {
                return Err(ClinicError::validation(
                    format!("medications[{}].refills", index),
                    "refills cannot be negative",
                ));
            }
        }

        let now = Utc::now();
        let prescription = Prescription {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            medications: request.medications,
            diagnosis: request.diagnosis,
            status: PrescriptionStatus::Active,
            created_at: now,
            updated_at: now,
        };

        self.patient_index
            .entry(prescription.patient_id)
            .or_default()
            .push(prescription.id);
        self.prescriptions
            .insert(prescription.id, prescription.clone());

        tracing::info!(
            "Created prescription {} for patient {} by doctor {}",
            prescription.id,
            prescription.patient_id,
            prescription.doctor_id
        );
        Ok(prescription)
    }

    /// 获取处方
    pub fn get(&self, prescription_id: Uuid) -> Result<&Prescription> {
        self.prescriptions.get(&prescription_id).ok_or_else(|| {
            ClinicError::NotFound(format!("Prescription {} not found", prescription_id))
        })
    }

    /// 患者的全部处方
    pub fn for_patient(&self, patient_id: Uuid) -> Vec<&Prescription> {
        self.patient_index
            .get(&patient_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.prescriptions.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 处方状态转换：active -> discontinued | completed
    pub fn update_status(
        &mut self,
        prescription_id: Uuid,
        status: PrescriptionStatus,
    ) -> Result<Prescription> {
        let prescription = self.prescriptions.get_mut(&prescription_id).ok_or_else(|| {
            ClinicError::NotFound(format!("Prescription {} not found", prescription_id))
        })?;

        if prescription.status != PrescriptionStatus::Active
            || status == PrescriptionStatus::Active
        {
            return Err(ClinicError::InvalidStateTransition {
                from: prescription.status.as_str().to_string(),
                event: status.as_str().to_string(),
            });
        }

        prescription.status = status;
        prescription.updated_at = Utc::now();
        tracing::info!(
            "Prescription {} status set to {}",
            prescription_id,
            status.as_str()
        );
        Ok(prescription.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn medication(name: &str) -> PrescribedMedication {
        PrescribedMedication {
            name: name.to_string(),
            dosage: "500mg".to_string(),
            frequency: "twice daily".to_string(),
            duration: "7 days".to_string(),
            instructions: None,
            refills: 1,
        }
    }

    fn request() -> NewPrescription {
        NewPrescription {
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            medications: vec![medication("Amoxicillin")],
            diagnosis: Some("Sinus infection".to_string()),
        }
    }

    #[test]
    fn test_create_prescription() {
        let mut manager = PrescriptionManager::new();
        let prescription = manager.create(request()).unwrap();

        assert_eq!(prescription.status, PrescriptionStatus::Active);
        assert_eq!(manager.for_patient(prescription.patient_id).len(), 1);
    }

    #[test]
    fn test_create_requires_medications() {
        let mut manager = PrescriptionManager::new();
        let mut req = request();
        req.medications.clear();
        let err = manager.create(req).unwrap_err();
        assert!(matches!(err, ClinicError::Validation { field, .. } if field == "medications"));
    }

    #[test]
    fn test_status_transitions() {
        let mut manager = PrescriptionManager::new();
        let prescription = manager.create(request()).unwrap();

        let updated = manager
            .update_status(prescription.id, PrescriptionStatus::Discontinued)
            .unwrap();
        assert_eq!(updated.status, PrescriptionStatus::Discontinued);

        // 终态不可再转换
        let err = manager
            .update_status(prescription.id, PrescriptionStatus::Completed)
            .unwrap_err();
        assert!(matches!(err, ClinicError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_negative_refills_rejected() {
        let mut manager = PrescriptionManager::new();
        let mut req = request();
        req.medications[0].refills = -1;
        assert!(manager.create(req).is_err());
    }
}
