//! 核心数据模型定义

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// 用户角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Student,
    Doctor,
    ClinicalStaff,
    AcademicStaff,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Doctor => "doctor",
            UserRole::ClinicalStaff => "clinical_staff",
            UserRole::AcademicStaff => "academic_staff",
            UserRole::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "student" => Some(UserRole::Student),
            "doctor" => Some(UserRole::Doctor),
            "clinical_staff" => Some(UserRole::ClinicalStaff),
            "academic_staff" => Some(UserRole::AcademicStaff),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }

    /// 是否可以作为患者（可被指派医生并拥有临床记录）
    pub fn is_patient_capable(&self) -> bool {
        matches!(self, UserRole::Student | UserRole::AcademicStaff)
    }
}

/// 用户状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Inactive,
    PendingVerification,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::PendingVerification => "pending_verification",
            UserStatus::Suspended => "suspended",
        }
    }
}

/// 角色专属属性
///
/// 每个角色只携带自己的字段，序列化时自动排除不属于该角色的字段。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RoleAttributes {
    Student {
        student_id: String,
        department: String,
    },
    Doctor {
        medical_license_number: String,
        specialization: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        staff_no: Option<String>,
    },
    ClinicalStaff {
        staff_no: String,
        department: String,
    },
    AcademicStaff {
        staff_no: String,
        faculty: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        department: Option<String>,
    },
    Admin {
        staff_no: String,
    },
}

impl RoleAttributes {
    /// 属性变体对应的角色
    pub fn role(&self) -> UserRole {
        match self {
            RoleAttributes::Student { .. } => UserRole::Student,
            RoleAttributes::Doctor { .. } => UserRole::Doctor,
            RoleAttributes::ClinicalStaff { .. } => UserRole::ClinicalStaff,
            RoleAttributes::AcademicStaff { .. } => UserRole::AcademicStaff,
            RoleAttributes::Admin { .. } => UserRole::Admin,
        }
    }

    /// 学号（仅学生）
    pub fn student_id(&self) -> Option<&str> {
        match self {
            RoleAttributes::Student { student_id, .. } => Some(student_id),
            _ => None,
        }
    }

    /// 执业医师编号（仅医生）
    pub fn medical_license_number(&self) -> Option<&str> {
        match self {
            RoleAttributes::Doctor {
                medical_license_number,
                ..
            } => Some(medical_license_number),
            _ => None,
        }
    }

    /// 工号（医生的工号为可选项）
    pub fn staff_no(&self) -> Option<&str> {
        match self {
            RoleAttributes::Doctor { staff_no, .. } => staff_no.as_deref(),
            RoleAttributes::ClinicalStaff { staff_no, .. } => Some(staff_no),
            RoleAttributes::AcademicStaff { staff_no, .. } => Some(staff_no),
            RoleAttributes::Admin { staff_no } => Some(staff_no),
            RoleAttributes::Student { .. } => None,
        }
    }
}

/// 用户聚合
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub status: UserStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub attributes: RoleAttributes,
    /// 叠加在角色默认权限之上的自定义权限
    #[serde(skip_serializing, default)]
    pub custom_permissions: BTreeSet<String>,
    /// 指派的医生，仅对患者角色（学生/教职工）有意义
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> UserRole {
        self.attributes.role()
    }
}

/// 预约优先级
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentPriority {
    Normal,
    High,
    Urgent,
}

/// 预约状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
    Rescheduled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
            AppointmentStatus::Rescheduled => "rescheduled",
        }
    }
}

/// 预约信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
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
    pub status: AppointmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 体温单位
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TemperatureUnit {
    #[default]
    F,
    C,
}

/// 生命体征内容
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct VitalSignsContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_pressure_systolic: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_pressure_diastolic: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub temperature_unit: TemperatureUnit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub respiratory_rate: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oxygen_saturation: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl VitalSignsContent {
    /// 体温换算为华氏度（F = C * 9/5 + 32）
    pub fn temperature_fahrenheit(&self) -> Option<f64> {
        self.temperature.map(|t| match self.temperature_unit {
            TemperatureUnit::F => t,
            TemperatureUnit::C => t * 9.0 / 5.0 + 32.0,
        })
    }
}

/// 给药途径
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MedicationRoute {
    Oral,
    Injection,
    Topical,
    Inhalation,
    Iv,
    Im,
    Sc,
}

/// 给药记录内容
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicationContent {
    pub medication_name: String,
    pub dosage: String,
    pub route: MedicationRoute,
    pub administration_time: DateTime<Utc>,
    pub prescribing_doctor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// 创建即为已给药
    pub status: MedicationAdministrationStatus,
    pub administered_by: Uuid,
    pub administered_at: DateTime<Utc>,
}

/// 给药状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MedicationAdministrationStatus {
    Administered,
}

/// 任务状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
}

/// 任务记录内容
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskContent {
    pub description: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_duration_minutes: Option<i32>,
}

/// 一般记录内容
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GeneralContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// 病历记录内容
///
/// 按记录类型封闭的变体集合，每个变体携带自己的模式。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum RecordContent {
    VitalSigns(VitalSignsContent),
    Medication(MedicationContent),
    Task(TaskContent),
    General(GeneralContent),
}

impl RecordContent {
    pub fn type_str(&self) -> &'static str {
        match self {
            RecordContent::VitalSigns(_) => "vital_signs",
            RecordContent::Medication(_) => "medication",
            RecordContent::Task(_) => "task",
            RecordContent::General(_) => "general",
        }
    }
}

/// 病历记录
///
/// 追加式记录：创建后除任务完成与给药字段外不再整体替换。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    #[serde(flatten)]
    pub content: RecordContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treatment: Option<String>,
    pub visit_date: NaiveDate,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// 处方状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionStatus {
    Active,
    Discontinued,
    Completed,
}

impl PrescriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrescriptionStatus::Active => "active",
            PrescriptionStatus::Discontinued => "discontinued",
            PrescriptionStatus::Completed => "completed",
        }
    }
}

/// 处方中的单个药品
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrescribedMedication {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub refills: i32,
}

/// 处方
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub medications: Vec<PrescribedMedication>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    pub status: PrescriptionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 就诊卡
///
/// 每位患者一张，随患者创建或更新，不单独删除。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalCard {
    pub id: Uuid,
    pub patient_id: Uuid,
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
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_attributes_serialization_excludes_other_roles() {
        let attrs = RoleAttributes::Student {
            student_id: "S2024001".to_string(),
            department: "Computer Science".to_string(),
        };
        let value = serde_json::to_value(&attrs).unwrap();

        assert_eq!(value["role"], "student");
        assert_eq!(value["student_id"], "S2024001");
        // 学生变体不包含其他角色的字段
        assert!(value.get("medical_license_number").is_none());
        assert!(value.get("staff_no").is_none());
    }

    #[test]
    fn test_doctor_optional_staff_no_omitted_when_absent() {
        let attrs = RoleAttributes::Doctor {
            medical_license_number: "MD-1001".to_string(),
            specialization: "Internal Medicine".to_string(),
            staff_no: None,
        };
        let value = serde_json::to_value(&attrs).unwrap();
        assert!(value.get("staff_no").is_none());
    }

    #[test]
    fn test_temperature_conversion() {
        let reading = VitalSignsContent {
            temperature: Some(38.1),
            temperature_unit: TemperatureUnit::C,
            ..Default::default()
        };
        let f = reading.temperature_fahrenheit().unwrap();
        assert!((f - 100.58).abs() < 1e-9);

        let reading = VitalSignsContent {
            temperature: Some(98.6),
            temperature_unit: TemperatureUnit::F,
            ..Default::default()
        };
        assert_eq!(reading.temperature_fahrenheit(), Some(98.6));
    }

    #[test]
    fn test_record_content_tagged_serialization() {
        let content = RecordContent::Task(TaskContent {
            description: "Follow-up call".to_string(),
            status: TaskStatus::Pending,
            completion_notes: None,
            completed_by: None,
            completed_at: None,
            actual_duration_minutes: None,
        });
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(value["type"], "task");
        assert_eq!(value["content"]["status"], "pending");
        assert!(value["content"].get("completion_notes").is_none());
    }

    #[test]
    fn test_patient_capable_roles() {
        assert!(UserRole::Student.is_patient_capable());
        assert!(UserRole::AcademicStaff.is_patient_capable());
        assert!(!UserRole::Doctor.is_patient_capable());
        assert!(!UserRole::ClinicalStaff.is_patient_capable());
        assert!(!UserRole::Admin.is_patient_capable());
    }
}
