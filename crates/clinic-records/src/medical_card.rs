//! 就诊卡管理
//!
//! 每位患者一张就诊卡，按患者维度创建或更新（upsert），
//! 只随患者本人的删除一起移除。

use chrono::Utc;
use clinic_core::{ClinicError, MedicalCard, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// 就诊卡写入内容
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalCardInput {
    pub emergency_contact: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical_history: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_medications: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allergies: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_conditions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_history: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insurance_info: Option<String>,
}

/// 就诊卡管理器
#[derive(Debug, Default)]
pub struct MedicalCardManager {
    cards: HashMap<Uuid, MedicalCard>, // 以患者ID为键
}

impl MedicalCardManager {
    /// 创建新的就诊卡管理器
    pub fn new() -> Self {
        Self {
            cards: HashMap::new(),
        }
    }

    /// 创建或更新患者的就诊卡
    pub fn upsert(&mut self, patient_id: Uuid, input: MedicalCardInput) -> Result<MedicalCard> {
        if input.emergency_contact.trim().is_empty() {
            return Err(ClinicError::MissingRequiredField(
                "emergency_contact".to_string(),
            ));
        }

        let now = Utc::now();
        let card = match self.cards.get_mut(&patient_id) {
            Some(card) => {
                card.emergency_contact = input.emergency_contact;
                card.medical_history = input.medical_history;
                card.current_medications = input.current_medications;
                card.allergies = input.allergies;
                card.previous_conditions = input.previous_conditions;
                card.family_history = input.family_history;
                card.insurance_info = input.insurance_info;
                card.updated_at = now;
                card.clone()
            }
            None => {
                let card = MedicalCard {
                    id: Uuid::new_v4(),
                    patient_id,
                    emergency_contact: input.emergency_contact,
                    medical_history: input.medical_history,
                    current_medications: input.current_medications,
                    allergies: input.allergies,
                    previous_conditions: input.previous_conditions,
                    family_history: input.family_history,
                    insurance_info: input.insurance_info,
                    created_at: now,
                    updated_at: now,
                };
                self.cards.insert(patient_id, card.clone());
                card
            }
        };

        tracing::info!("Upserted medical card for patient {}", patient_id);
        Ok(card)
    }

    /// 获取患者的就诊卡
    pub fn get(&self, patient_id: Uuid) -> Result<&MedicalCard> {
        self.cards.get(&patient_id).ok_or_else(|| {
            ClinicError::NotFound(format!("Medical card for patient {} not found", patient_id))
        })
    }

    /// 随患者删除一起移除就诊卡
    pub fn remove_for_patient(&mut self, patient_id: Uuid) -> Option<MedicalCard> {
        self.cards.remove(&patient_id)
    }
}
