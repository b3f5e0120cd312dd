//! # 诊所记录模块
//!
//! 提供完整的临床就诊记录管理功能，包括：
//! - 预约状态机：管理预约的完整生命周期
//! - 就诊记录存储：预约与追加式病历记录
//! - 生命体征告警：确定性的安全规则引擎
//! - 处方与就诊卡管理

pub mod encounter;
pub mod medical_card;
pub mod prescription;
pub mod state_machine;
pub mod vitals;

// 重新导出主要类型
pub use encounter::{AppointmentUpdate, EncounterStore, NewAppointment, NewRecord};
pub use medical_card::{MedicalCardInput, MedicalCardManager};
pub use prescription::{NewPrescription, PrescriptionManager};
pub use state_machine::{AppointmentEvent, AppointmentStateMachine};
pub use vitals::{evaluate, AlertSeverity, AlertType, VitalAlert};
