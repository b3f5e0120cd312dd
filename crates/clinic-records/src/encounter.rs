//! 临床就诊记录存储
//!
//! 管理预约生命周期和追加式病历记录：记录创建后只允许
//! 任务完成这一种后续变更，生命体征记录创建时同步评估告警。

use crate::state_machine::{AppointmentEvent, AppointmentStateMachine};
use crate::vitals::{self, VitalAlert};
use chrono::{NaiveDate, NaiveTime, Utc};
use clinic_core::{
    Appointment, AppointmentPriority, AppointmentStatus, ClinicError, MedicalRecord,
    MedicationContent, RecordContent, Result, TaskContent, TaskStatus, UserRole,
    VitalSignsContent,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// 新建预约请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    #[serde(rename = "type")]
    pub appointment_type: String,
    pub duration_minutes: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub priority: AppointmentPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

/// 预约更新请求
///
/// doctor_id / patient_id 的改派仅限医生和管理员。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<AppointmentPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<Uuid>,
}

/// 新建病历记录请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecord {
    pub patient_id: Uuid,
    /// 主诊医生，缺省时按回退链解析
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<Uuid>,
    #[serde(flatten)]
    pub content: RecordContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treatment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visit_date: Option<NaiveDate>,
}

/// 就诊记录存储
#[derive(Debug, Default)]
pub struct EncounterStore {
    appointments: HashMap<Uuid, Appointment>,
    patient_appointments: HashMap<Uuid, Vec<Uuid>>,
    records: HashMap<Uuid, MedicalRecord>,
    patient_records: HashMap<Uuid, Vec<Uuid>>,
    state_machine: AppointmentStateMachine,
}

impl EncounterStore {
    /// 创建空的就诊记录存储
    pub fn new() -> Self {
        Self {
            appointments: HashMap::new(),
            patient_appointments: HashMap::new(),
            records: HashMap::new(),
            patient_records: HashMap::new(),
            state_machine: AppointmentStateMachine::new(),
        }
    }

    // ========== 预约相关操作 ==========

    /// 创建预约，初始状态为已预约
    pub fn create_appointment(&mut self, request: NewAppointment) -> Result<Appointment> {
        if request.duration_minutes <= 0 {
            return Err(ClinicError::validation(
                "duration_minutes",
                "duration must be positive",
            ));
        }

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            date: request.date,
            time: request.time,
            appointment_type: request.appointment_type,
            duration_minutes: request.duration_minutes,
            reason: request.reason,
            priority: request.priority,
            status: AppointmentStatus::Scheduled,
            room: request.room,
            created_at: now,
            updated_at: now,
        };

        self.patient_appointments
            .entry(appointment.patient_id)
            .or_default()
            .push(appointment.id);
        self.appointments.insert(appointment.id, appointment.clone());

        tracing::info!(
            "Created appointment {} for patient {} with doctor {}",
            appointment.id,
            appointment.patient_id,
            appointment.doctor_id
        );
        Ok(appointment)
    }

    /// 获取预约
    pub fn get_appointment(&self, appointment_id: Uuid) -> Result<&Appointment> {
        self.appointments.get(&appointment_id).ok_or_else(|| {
            ClinicError::NotFound(format!("Appointment {} not found", appointment_id))
        })
    }

    /// 患者的所有预约
    pub fn patient_appointments(&self, patient_id: Uuid) -> Vec<&Appointment> {
        self.patient_appointments
            .get(&patient_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.appointments.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 更新预约
    ///
    /// 临床职员不得改派 doctor_id / patient_id：该检查在任何字段
    /// 落地之前执行，整个更新要么全部生效要么全部拒绝。
    pub fn update_appointment(
        &mut self,
        actor_role: UserRole,
        appointment_id: Uuid,
        update: AppointmentUpdate,
    ) -> Result<Appointment> {
        if actor_role == UserRole::ClinicalStaff {
            if update.doctor_id.is_some() {
                return Err(ClinicError::ForbiddenFieldChange("doctor_id".to_string()));
            }
            if update.patient_id.is_some() {
                return Err(ClinicError::ForbiddenFieldChange("patient_id".to_string()));
            }
        }

        // 先完成全部校验再落地任何字段
        let current = self.get_appointment(appointment_id)?.status;
        let new_status = match update.status {
            Some(target) => {
                let event = AppointmentStateMachine::event_for_target(target).ok_or_else(|| {
                    ClinicError::InvalidStateTransition {
                        from: current.as_str().to_string(),
                        event: target.as_str().to_string(),
                    }
                })?;
                Some(self.state_machine.transition(current, &event)?)
            }
            None => None,
        };

        if let Some(new_patient) = update.patient_id {
            let old_patient = self.get_appointment(appointment_id)?.patient_id;
            if let Some(ids) = self.patient_appointments.get_mut(&old_patient) {
                ids.retain(|&id| id != appointment_id);
            }
            self.patient_appointments
                .entry(new_patient)
                .or_default()
                .push(appointment_id);
        }

        let appointment = self
            .appointments
            .get_mut(&appointment_id)
            .ok_or_else(|| {
                ClinicError::NotFound(format!("Appointment {} not found", appointment_id))
            })?;

        if let Some(patient_id) = update.patient_id {
            appointment.patient_id = patient_id;
        }
        if let Some(doctor_id) = update.doctor_id {
            appointment.doctor_id = doctor_id;
        }
        if let Some(date) = update.date {
            appointment.date = date;
        }
        if let Some(time) = update.time {
            appointment.time = time;
        }
        if let Some(reason) = update.reason {
            appointment.reason = Some(reason);
        }
        if let Some(priority) = update.priority {
            appointment.priority = priority;
        }
        if let Some(room) = update.room {
            appointment.room = Some(room);
        }
        if let Some(status) = new_status {
            appointment.status = status;
        }
        appointment.updated_at = Utc::now();

        tracing::info!("Updated appointment {}", appointment_id);
        Ok(appointment.clone())
    }

    /// 显式改期：移动日期/时间并回到已预约状态
    pub fn reschedule_appointment(
        &mut self,
        appointment_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Appointment> {
        let current = self.get_appointment(appointment_id)?.status;
        let next = self
            .state_machine
            .transition(current, &AppointmentEvent::Reschedule)?;

        let appointment = self
            .appointments
            .get_mut(&appointment_id)
            .ok_or_else(|| {
                ClinicError::NotFound(format!("Appointment {} not found", appointment_id))
            })?;
        appointment.date = date;
        appointment.time = time;
        appointment.status = next;
        appointment.updated_at = Utc::now();

        tracing::info!(
            "Rescheduled appointment {} to {} {}",
            appointment_id,
            date,
            time
        );
        Ok(appointment.clone())
    }

    // ========== 病历记录相关操作 ==========

    /// 创建病历记录
    ///
    /// 生命体征记录创建成功后立即评估告警并随记录返回；
    /// 告警不持久化，只在读写时计算。
    pub fn create_record(
        &mut self,
        request: NewRecord,
        created_by: Uuid,
        today: NaiveDate,
    ) -> Result<(MedicalRecord, Vec<VitalAlert>)> {
        validate_content(&request.content)?;

        let doctor_id = match request.doctor_id {
            Some(id) => id,
            None => self.resolve_attending_doctor(request.patient_id, today, created_by),
        };

        let alerts = match &request.content {
            RecordContent::VitalSigns(reading) => {
                let alerts = vitals::evaluate(reading);
                if !alerts.is_empty() {
                    tracing::warn!(
                        "Vital signs for patient {} fired {} alert(s)",
                        request.patient_id,
                        alerts.len()
                    );
                }
                alerts
            }
            _ => Vec::new(),
        };

        let record = MedicalRecord {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            doctor_id,
            content: request.content,
            diagnosis: request.diagnosis,
            treatment: request.treatment,
            visit_date: request.visit_date.unwrap_or(today),
            created_by,
            created_at: Utc::now(),
        };

        self.patient_records
            .entry(record.patient_id)
            .or_default()
            .push(record.id);
        self.records.insert(record.id, record.clone());

        tracing::info!(
            "Created {} record {} for patient {}",
            record.content.type_str(),
            record.id,
            record.patient_id
        );
        Ok((record, alerts))
    }

    /// 获取病历记录
    pub fn get_record(&self, record_id: Uuid) -> Result<&MedicalRecord> {
        self.records
            .get(&record_id)
            .ok_or_else(|| ClinicError::NotFound(format!("Record {} not found", record_id)))
    }

    /// 患者的全部病历记录
    pub fn patient_records(&self, patient_id: Uuid) -> Vec<&MedicalRecord> {
        self.patient_records
            .get(&patient_id)
            .map(|ids| ids.iter().filter_map(|id| self.records.get(id)).collect())
            .unwrap_or_default()
    }

    /// 完成任务记录
    ///
    /// 这是记录创建后唯一允许的变更：pending -> completed，
    /// 并追加完成说明与完成人信息。
    pub fn complete_task(
        &mut self,
        record_id: Uuid,
        completed_by: Uuid,
        completion_notes: String,
        actual_duration_minutes: Option<i32>,
    ) -> Result<MedicalRecord> {
        let record = self
            .records
            .get_mut(&record_id)
            .ok_or_else(|| ClinicError::NotFound(format!("Record {} not found", record_id)))?;

        let RecordContent::Task(task) = &mut record.content else {
            return Err(ClinicError::validation(
                "type",
                format!("record {} is not a task", record_id),
            ));
        };
        if task.status == TaskStatus::Completed {
            return Err(ClinicError::InvalidStateTransition {
                from: "completed".to_string(),
                event: "complete_task".to_string(),
            });
        }

        task.status = TaskStatus::Completed;
        task.completion_notes = Some(completion_notes);
        task.completed_by = Some(completed_by);
        task.completed_at = Some(Utc::now());
        task.actual_duration_minutes = actual_duration_minutes;

        tracing::info!("Task record {} completed by {}", record_id, completed_by);
        Ok(record.clone())
    }

    /// 解析主诊医生
    ///
    /// 回退链：当日处于 in_progress / confirmed / scheduled 状态的预约
    /// （按此优先级）的医生 → 创建记录的操作者本人。
    pub fn resolve_attending_doctor(
        &self,
        patient_id: Uuid,
        today: NaiveDate,
        actor_id: Uuid,
    ) -> Uuid {
        let todays: Vec<&Appointment> = self
            .patient_appointments(patient_id)
            .into_iter()
            .filter(|a| a.date == today)
            .collect();

        for status in [
            AppointmentStatus::InProgress,
            AppointmentStatus::Confirmed,
            AppointmentStatus::Scheduled,
        ] {
            if let Some(appointment) = todays.iter().find(|a| a.status == status) {
                return appointment.doctor_id;
            }
        }
        actor_id
    }
}

/// 按记录类型校验内容模式与取值范围
fn validate_content(content: &RecordContent) -> Result<()> {
    match content {
        RecordContent::VitalSigns(reading) => validate_vital_signs(reading),
        RecordContent::Medication(medication) => validate_medication(medication),
        RecordContent::Task(task) => {
            if task.description.trim().is_empty() {
                return Err(ClinicError::MissingRequiredField("description".to_string()));
            }
            Ok(())
        }
        RecordContent::General(_) => Ok(()),
    }
}

fn check_range(field: &str, value: i32, min: i32, max: i32) -> Result<()> {
    if value < min || value > max {
        return Err(ClinicError::validation(
            field,
            format!("value {} outside range [{}, {}]", value, min, max),
        ));
    }
    Ok(())
}

fn validate_vital_signs(reading: &VitalSignsContent) -> Result<()> {
    if let Some(v) = reading.blood_pressure_systolic {
        check_range("blood_pressure_systolic", v, 60, 250)?;
    }
    if let Some(v) = reading.blood_pressure_diastolic {
        check_range("blood_pressure_diastolic", v, 40, 150)?;
    }
    if let Some(v) = reading.heart_rate {
        check_range("heart_rate", v, 30, 200)?;
    }
    // 体温范围按华氏度校验
    if let Some(f) = reading.temperature_fahrenheit() {
        if !(90.0..=110.0).contains(&f) {
            return Err(ClinicError::validation(
                "temperature",
                format!("value {:.1}F outside range [90.0, 110.0]", f),
            ));
        }
    }
    if let Some(v) = reading.respiratory_rate {
        check_range("respiratory_rate", v, 8, 40)?;
    }
    if let Some(v) = reading.oxygen_saturation {
        check_range("oxygen_saturation", v, 70, 100)?;
    }
    Ok(())
}

fn validate_medication(medication: &MedicationContent) -> Result<()> {
    if medication.medication_name.trim().is_empty() {
        return Err(ClinicError::MissingRequiredField(
            "medication_name".to_string(),
        ));
    }
    if medication.dosage.trim().is_empty() {
        return Err(ClinicError::MissingRequiredField("dosage".to_string()));
    }
    if medication.prescribing_doctor.trim().is_empty() {
        return Err(ClinicError::MissingRequiredField(
            "prescribing_doctor".to_string(),
        ));
    }
    Ok(())
}
