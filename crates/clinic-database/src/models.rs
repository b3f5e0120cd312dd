//! 数据库模型

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clinic_core::models::*;
use clinic_core::{ClinicError, Result};
use sqlx::FromRow;
use std::collections::BTreeSet;
use uuid::Uuid;

// 数据库表模型 - 使用FromRow trait用于SQL查询
// 用户表按关系型习惯保留稀疏列，转换回领域模型时重建角色变体

/// 数据库用户表
#[derive(Debug, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub status: String,
    pub phone: Option<String>,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub student_id: Option<String>,
    pub department: Option<String>,
    pub staff_no: Option<String>,
    pub faculty: Option<String>,
    pub medical_license_number: Option<String>,
    pub specialization: Option<String>,
    pub custom_permissions: serde_json::Value,
    pub doctor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn required_column(value: Option<String>, column: &str) -> Result<String> {
    value.ok_or_else(|| ClinicError::Database(format!("missing column value: {}", column)))
}

impl TryFrom<DbUser> for User {
    type Error = ClinicError;

    fn try_from(db_user: DbUser) -> Result<User> {
        let role = UserRole::parse(&db_user.role)
            .ok_or_else(|| ClinicError::Database(format!("unknown role: {}", db_user.role)))?;

        let attributes = match role {
            UserRole::Student => RoleAttributes::Student {
                student_id: required_column(db_user.student_id, "student_id")?,
                department: required_column(db_user.department, "department")?,
            },
            UserRole::Doctor => RoleAttributes::Doctor {
                medical_license_number: required_column(
                    db_user.medical_license_number,
                    "medical_license_number",
                )?,
                specialization: required_column(db_user.specialization, "specialization")?,
                staff_no: db_user.staff_no,
            },
            UserRole::ClinicalStaff => RoleAttributes::ClinicalStaff {
                staff_no: required_column(db_user.staff_no, "staff_no")?,
                department: required_column(db_user.department, "department")?,
            },
            UserRole::AcademicStaff => RoleAttributes::AcademicStaff {
                staff_no: required_column(db_user.staff_no, "staff_no")?,
                faculty: required_column(db_user.faculty, "faculty")?,
                department: db_user.department,
            },
            UserRole::Admin => RoleAttributes::Admin {
                staff_no: required_column(db_user.staff_no, "staff_no")?,
            },
        };

        let status = match db_user.status.as_str() {
            "active" => UserStatus::Active,
            "inactive" => UserStatus::Inactive,
            "pending_verification" => UserStatus::PendingVerification,
            "suspended" => UserStatus::Suspended,
            _ => UserStatus::Inactive, // 未知状态按停用处理
        };

        let custom_permissions: BTreeSet<String> =
            serde_json::from_value(db_user.custom_permissions).unwrap_or_default();

        Ok(User {
            id: db_user.id,
            name: db_user.name,
            email: db_user.email,
            password_hash: db_user.password_hash,
            status,
            phone: db_user.phone,
            email_verified_at: db_user.email_verified_at,
            attributes,
            custom_permissions,
            doctor_id: db_user.doctor_id,
            created_at: db_user.created_at,
            updated_at: db_user.updated_at,
        })
    }
}

/// 数据库预约表
#[derive(Debug, FromRow)]
pub struct DbAppointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub appointment_type: String,
    pub duration_minutes: i32,
    pub reason: Option<String>,
    pub priority: String,
    pub status: String,
    pub room: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) fn appointment_status_from_str(status: &str) -> AppointmentStatus {
    match status {
        "scheduled" => AppointmentStatus::Scheduled,
        "confirmed" => AppointmentStatus::Confirmed,
        "in_progress" => AppointmentStatus::InProgress,
        "completed" => AppointmentStatus::Completed,
        "cancelled" => AppointmentStatus::Cancelled,
        "no_show" => AppointmentStatus::NoShow,
        "rescheduled" => AppointmentStatus::Rescheduled,
        _ => AppointmentStatus::Scheduled, // 默认状态
    }
}

impl From<DbAppointment> for Appointment {
    fn from(db_appointment: DbAppointment) -> Self {
        Appointment {
            id: db_appointment.id,
            patient_id: db_appointment.patient_id,
            doctor_id: db_appointment.doctor_id,
            date: db_appointment.date,
            time: db_appointment.time,
            appointment_type: db_appointment.appointment_type,
            duration_minutes: db_appointment.duration_minutes,
            reason: db_appointment.reason,
            priority: match db_appointment.priority.as_str() {
                "high" => AppointmentPriority::High,
                "urgent" => AppointmentPriority::Urgent,
                _ => AppointmentPriority::Normal,
            },
            status: appointment_status_from_str(&db_appointment.status),
            room: db_appointment.room,
            created_at: db_appointment.created_at,
            updated_at: db_appointment.updated_at,
        }
    }
}

/// 数据库病历记录表
#[derive(Debug, FromRow)]
pub struct DbMedicalRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub record_type: String,
    pub content: serde_json::Value, // 标签化的记录内容，反序列化为RecordContent
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    pub visit_date: NaiveDate,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbMedicalRecord> for MedicalRecord {
    type Error = ClinicError;

    fn try_from(db_record: DbMedicalRecord) -> Result<MedicalRecord> {
        let content: RecordContent = serde_json::from_value(db_record.content)?;

        Ok(MedicalRecord {
            id: db_record.id,
            patient_id: db_record.patient_id,
            doctor_id: db_record.doctor_id,
            content,
            diagnosis: db_record.diagnosis,
            treatment: db_record.treatment,
            visit_date: db_record.visit_date,
            created_by: db_record.created_by,
            created_at: db_record.created_at,
        })
    }
}

/// 数据库处方表
#[derive(Debug, FromRow)]
pub struct DbPrescription {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub medications: serde_json::Value,
    pub diagnosis: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbPrescription> for Prescription {
    type Error = ClinicError;

    fn try_from(db_prescription: DbPrescription) -> Result<Prescription> {
        let medications: Vec<PrescribedMedication> =
            serde_json::from_value(db_prescription.medications)?;

        Ok(Prescription {
            id: db_prescription.id,
            patient_id: db_prescription.patient_id,
            doctor_id: db_prescription.doctor_id,
            medications,
            diagnosis: db_prescription.diagnosis,
            status: match db_prescription.status.as_str() {
                "discontinued" => PrescriptionStatus::Discontinued,
                "completed" => PrescriptionStatus::Completed,
                _ => PrescriptionStatus::Active,
            },
            created_at: db_prescription.created_at,
            updated_at: db_prescription.updated_at,
        })
    }
}

/// 数据库就诊卡表
#[derive(Debug, FromRow)]
pub struct DbMedicalCard {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub emergency_contact: String,
    pub medical_history: Option<String>,
    pub current_medications: Option<String>,
    pub allergies: Option<String>,
    pub previous_conditions: Option<String>,
    pub family_history: Option<String>,
    pub insurance_info: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbMedicalCard> for MedicalCard {
    fn from(db_card: DbMedicalCard) -> Self {
        MedicalCard {
            id: db_card.id,
            patient_id: db_card.patient_id,
            emergency_contact: db_card.emergency_contact,
            medical_history: db_card.medical_history,
            current_medications: db_card.current_medications,
            allergies: db_card.allergies,
            previous_conditions: db_card.previous_conditions,
            family_history: db_card.family_history,
            insurance_info: db_card.insurance_info,
            created_at: db_card.created_at,
            updated_at: db_card.updated_at,
        }
    }
}
