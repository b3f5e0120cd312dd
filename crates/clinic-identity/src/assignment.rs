//! 医患指派管理
//!
//! 维护医生与患者之间的指派关系：一名医生可以有多名患者，
//! 每名患者至多指派一名医生。每次写入后校验关系图不变量。

use crate::registry::UserRegistry;
use chrono::Utc;
use clinic_core::{ClinicError, Result, User, UserRole};
use uuid::Uuid;

impl UserRegistry {
    /// 指派医生给患者
    ///
    /// 指派方必须是医生角色，被指派方必须是患者角色（学生/教职工）。
    /// 已有医生的患者会被改派给新的医生。
    pub fn assign_doctor(&mut self, doctor_id: Uuid, patient_id: Uuid) -> Result<()> {
        let doctor_role = self.get(doctor_id)?.role();
        let patient_role = self.get(patient_id)?.role();

        if doctor_role != UserRole::Doctor {
            return Err(ClinicError::InvalidRole(format!(
                "user {} has role {}, expected doctor",
                doctor_id,
                doctor_role.as_str()
            )));
        }
        if !patient_role.is_patient_capable() {
            return Err(ClinicError::InvalidRole(format!(
                "user {} has role {}, expected student or academic_staff",
                patient_id,
                patient_role.as_str()
            )));
        }

        let patient = self.get_mut(patient_id)?;
        patient.doctor_id = Some(doctor_id);
        patient.updated_at = Utc::now();

        self.check_assignment_graph()?;
        tracing::info!("Assigned patient {} to doctor {}", patient_id, doctor_id);
        Ok(())
    }

    /// 解除医患指派
    ///
    /// 当前没有该医生指派的患者时返回 NotFound。
    pub fn unassign_doctor(&mut self, doctor_id: Uuid, patient_id: Uuid) -> Result<()> {
        let patient = self.get_mut(patient_id)?;
        if patient.doctor_id != Some(doctor_id) {
            return Err(ClinicError::NotFound(format!(
                "patient {} is not assigned to doctor {}",
                patient_id, doctor_id
            )));
        }
        patient.doctor_id = None;
        patient.updated_at = Utc::now();

        self.check_assignment_graph()?;
        tracing::info!("Unassigned patient {} from doctor {}", patient_id, doctor_id);
        Ok(())
    }

    /// 医生当前指派的所有患者
    pub fn assigned_patients(&self, doctor_id: Uuid) -> Vec<&User> {
        self.all_users()
            .filter(|user| user.doctor_id == Some(doctor_id))
            .collect()
    }

    /// 关系图不变量校验
    ///
    /// 不允许患者指向非医生用户，也不允许非患者角色持有 doctor_id。
    pub fn check_assignment_graph(&self) -> Result<()> {
        for user in self.all_users() {
            if let Some(doctor_id) = user.doctor_id {
                if !user.role().is_patient_capable() {
                    return Err(ClinicError::Internal(format!(
                        "user {} with role {} holds a doctor assignment",
                        user.id,
                        user.role().as_str()
                    )));
                }
                match self.all_users().find(|u| u.id == doctor_id) {
                    Some(owner) if owner.role() == UserRole::Doctor => {}
                    Some(owner) => {
                        return Err(ClinicError::Internal(format!(
                            "patient {} references non-doctor {}",
                            user.id, owner.id
                        )));
                    }
                    None => {
                        return Err(ClinicError::Internal(format!(
                            "patient {} references missing doctor {}",
                            user.id, doctor_id
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::registry::{RegisterRequest, UserRegistry};
    use crate::role_rules::RoleAttributePayload;
    use clinic_core::{ClinicError, UserRole};

    fn registry_with_users() -> (UserRegistry, uuid::Uuid, uuid::Uuid, uuid::Uuid) {
        let mut registry = UserRegistry::new();
        let doctor = registry
            .register(RegisterRequest {
                name: "Dr. Grey".to_string(),
                email: "grey@hospital.org".to_string(),
                password: "secret123".to_string(),
                role: UserRole::Doctor,
                phone: None,
                attributes: RoleAttributePayload {
                    medical_license_number: Some("MD-100".to_string()),
                    specialization: Some("General".to_string()),
                    ..Default::default()
                },
            })
            .unwrap();
        let student = registry
            .register(RegisterRequest {
                name: "Stu Dent".to_string(),
                email: "stu@university.edu".to_string(),
                password: "secret123".to_string(),
                role: UserRole::Student,
                phone: None,
                attributes: RoleAttributePayload {
                    student_id: Some("S100".to_string()),
                    department: Some("Math".to_string()),
                    ..Default::default()
                },
            })
            .unwrap();
        let staff = registry
            .register(RegisterRequest {
                name: "Nurse Joy".to_string(),
                email: "joy@clinic.org".to_string(),
                password: "secret123".to_string(),
                role: UserRole::ClinicalStaff,
                phone: None,
                attributes: RoleAttributePayload {
                    staff_no: Some("C-1".to_string()),
                    department: Some("Nursing".to_string()),
                    ..Default::default()
                },
            })
            .unwrap();
        (registry, doctor.id, student.id, staff.id)
    }

    #[test]
    fn test_assign_and_unassign() {
        let (mut registry, doctor, student, _) = registry_with_users();

        registry.assign_doctor(doctor, student).unwrap();
        assert_eq!(registry.get(student).unwrap().doctor_id, Some(doctor));
        assert_eq!(registry.assigned_patients(doctor).len(), 1);

        registry.unassign_doctor(doctor, student).unwrap();
        assert_eq!(registry.get(student).unwrap().doctor_id, None);
    }

    #[test]
    fn test_assign_rejects_invalid_roles() {
        let (mut registry, doctor, student, staff) = registry_with_users();

        // 非医生作为指派方
        let err = registry.assign_doctor(student, student).unwrap_err();
        assert!(matches!(err, ClinicError::InvalidRole(_)));

        // 非患者角色作为被指派方
        let err = registry.assign_doctor(doctor, staff).unwrap_err();
        assert!(matches!(err, ClinicError::InvalidRole(_)));

        // 医生不能作为自己的患者
        let err = registry.assign_doctor(doctor, doctor).unwrap_err();
        assert!(matches!(err, ClinicError::InvalidRole(_)));
    }

    #[test]
    fn test_role_check_holds_when_already_linked() {
        let (mut registry, doctor, student, _) = registry_with_users();
        registry.assign_doctor(doctor, student).unwrap();

        // 已指派后再次以错误角色指派仍然失败
        let err = registry.assign_doctor(student, student).unwrap_err();
        assert!(matches!(err, ClinicError::InvalidRole(_)));

        // 合法的重复指派是幂等的
        registry.assign_doctor(doctor, student).unwrap();
        assert_eq!(registry.get(student).unwrap().doctor_id, Some(doctor));
    }

    #[test]
    fn test_unassign_unlinked_pair_is_not_found() {
        let (mut registry, doctor, student, _) = registry_with_users();
        let err = registry.unassign_doctor(doctor, student).unwrap_err();
        assert!(matches!(err, ClinicError::NotFound(_)));
    }

    #[test]
    fn test_delete_doctor_unassigns_all_patients() {
        let (mut registry, doctor, student, _) = registry_with_users();
        let second = registry
            .register(RegisterRequest {
                name: "Prof. Oak".to_string(),
                email: "oak@staff.university.edu".to_string(),
                password: "secret123".to_string(),
                role: UserRole::AcademicStaff,
                phone: None,
                attributes: RoleAttributePayload {
                    staff_no: Some("T-9".to_string()),
                    faculty: Some("Biology".to_string()),
                    ..Default::default()
                },
            })
            .unwrap();
        registry.assign_doctor(doctor, student).unwrap();
        registry.assign_doctor(doctor, second.id).unwrap();

        let unassigned = registry.delete_user(doctor).unwrap();
        assert_eq!(unassigned, 2);

        // 医生记录已删除，所有患者的指派已清空，无中间状态残留
        assert!(registry.get(doctor).is_err());
        assert_eq!(registry.get(student).unwrap().doctor_id, None);
        assert_eq!(registry.get(second.id).unwrap().doctor_id, None);
        registry.check_assignment_graph().unwrap();
    }
}
