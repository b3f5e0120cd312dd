//! 用户注册与身份管理
//!
//! 基于角色规则表完成注册验证、权限解析、角色视图投影
//! 和管理员的状态管理操作。

use crate::role_rules::{build_attributes, RoleAttributePayload, RoleRules, FULL_ACCESS};
use chrono::Utc;
use clinic_core::{utils, ClinicError, Result, User, UserRole, UserStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// 注册请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(flatten)]
    pub attributes: RoleAttributePayload,
}

/// 用户注册表
///
/// 以内存映射维护用户聚合，邮箱索引用于唯一性检查和查找。
#[derive(Debug, Default)]
pub struct UserRegistry {
    users: HashMap<Uuid, User>,
    email_index: HashMap<String, Uuid>,
}

impl UserRegistry {
    /// 创建空的用户注册表
    pub fn new() -> Self {
        Self {
            users: HashMap::new(),
            email_index: HashMap::new(),
        }
    }

    /// 注册新用户
    ///
    /// 注册即激活：本系统的注册不经过单独的审批步骤，
    /// 成功后状态为 active 且邮箱视为已验证。
    pub fn register(&mut self, request: RegisterRequest) -> Result<User> {
        self.create_user(request, UserStatus::Active)
    }

    /// 以待验证状态导入用户（管理员批量导入路径）
    pub fn register_unverified(&mut self, request: RegisterRequest) -> Result<User> {
        self.create_user(request, UserStatus::PendingVerification)
    }

    fn create_user(&mut self, request: RegisterRequest, status: UserStatus) -> Result<User> {
        if request.name.trim().is_empty() {
            return Err(ClinicError::MissingRequiredField("name".to_string()));
        }
        if request.password.trim().is_empty() {
            return Err(ClinicError::MissingRequiredField("password".to_string()));
        }
        if !utils::is_valid_email(&request.email) {
            return Err(ClinicError::validation("email", "invalid email format"));
        }

        // 患者角色必须使用大学邮箱域名
        if RoleRules::requires_university_domain(request.role)
            && !RoleRules::email_domain_allowed(&request.email)
        {
            return Err(ClinicError::DomainNotAllowed(request.email.clone()));
        }

        let attributes = build_attributes(request.role, &request.attributes)?;

        let email_key = request.email.to_lowercase();
        if self.email_index.contains_key(&email_key) {
            return Err(ClinicError::duplicate("email", &request.email));
        }
        self.check_unique_attributes(&attributes)?;

        let now = Utc::now();
        let verified_at = match status {
            UserStatus::PendingVerification => None,
            _ => Some(now),
        };
        let user = User {
            id: Uuid::new_v4(),
            name: request.name.trim().to_string(),
            email: request.email.clone(),
            password_hash: utils::hash_password(&request.password),
            status,
            phone: request.phone,
            email_verified_at: verified_at,
            attributes,
            custom_permissions: BTreeSet::new(),
            doctor_id: None,
            created_at: now,
            updated_at: now,
        };

        self.email_index.insert(email_key, user.id);
        self.users.insert(user.id, user.clone());

        tracing::info!(
            "Registered user {} with role {}",
            user.id,
            user.role().as_str()
        );
        Ok(user)
    }

    /// 角色标识属性的唯一性检查（学号/工号/执业医师编号）
    fn check_unique_attributes(&self, attributes: &clinic_core::RoleAttributes) -> Result<()> {
        for existing in self.users.values() {
            if let (Some(new), Some(old)) =
                (attributes.student_id(), existing.attributes.student_id())
            {
                if new == old {
                    return Err(ClinicError::duplicate("student_id", new));
                }
            }
            if let (Some(new), Some(old)) = (
                attributes.medical_license_number(),
                existing.attributes.medical_license_number(),
            ) {
                if new == old {
                    return Err(ClinicError::duplicate("medical_license_number", new));
                }
            }
            if let (Some(new), Some(old)) = (attributes.staff_no(), existing.attributes.staff_no())
            {
                if new == old {
                    return Err(ClinicError::duplicate("staff_no", new));
                }
            }
        }
        Ok(())
    }

    /// 按ID查找用户
    pub fn get(&self, user_id: Uuid) -> Result<&User> {
        self.users
            .get(&user_id)
            .ok_or_else(|| ClinicError::NotFound(format!("User {} not found", user_id)))
    }

    /// 按邮箱查找用户
    pub fn get_by_email(&self, email: &str) -> Option<&User> {
        self.email_index
            .get(&email.to_lowercase())
            .and_then(|id| self.users.get(id))
    }

    /// 所有用户
    pub fn all_users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub(crate) fn get_mut(&mut self, user_id: Uuid) -> Result<&mut User> {
        self.users
            .get_mut(&user_id)
            .ok_or_else(|| ClinicError::NotFound(format!("User {} not found", user_id)))
    }

    /// 解析用户的有效权限集
    ///
    /// 管理员无条件获得完全访问权限，不再合并自定义权限。
    pub fn resolve_permissions(&self, user: &User) -> BTreeSet<String> {
        if user.role() == UserRole::Admin {
            let mut set = BTreeSet::new();
            set.insert(FULL_ACCESS.to_string());
            return set;
        }

        let mut set: BTreeSet<String> = RoleRules::for_role(user.role())
            .default_permissions
            .iter()
            .map(|p| p.to_string())
            .collect();
        set.extend(user.custom_permissions.iter().cloned());
        set
    }

    /// 用户的展示标识
    pub fn display_identifier<'a>(&self, user: &'a User) -> &'a str {
        RoleRules::display_identifier(user)
    }

    /// 角色视图投影
    ///
    /// 只包含该角色存在的字段，缺失值不出现；权限不包含在投影中，
    /// 由调用方单独解析返回。
    pub fn project(&self, user: &User) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(user)?)
    }

    /// 叠加自定义权限
    pub fn grant_permission(&mut self, user_id: Uuid, permission: &str) -> Result<()> {
        let user = self.get_mut(user_id)?;
        user.custom_permissions.insert(permission.to_string());
        user.updated_at = Utc::now();
        Ok(())
    }

    /// 撤销自定义权限
    pub fn revoke_permission(&mut self, user_id: Uuid, permission: &str) -> Result<()> {
        let user = self.get_mut(user_id)?;
        user.custom_permissions.remove(permission);
        user.updated_at = Utc::now();
        Ok(())
    }

    /// 邮箱验证：pending_verification -> active
    pub fn verify_email(&mut self, user_id: Uuid) -> Result<()> {
        let user = self.get_mut(user_id)?;
        if user.status != UserStatus::PendingVerification {
            return Err(ClinicError::InvalidStateTransition {
                from: user.status.as_str().to_string(),
                event: "verify_email".to_string(),
            });
        }
        user.status = UserStatus::Active;
        user.email_verified_at = Some(Utc::now());
        user.updated_at = Utc::now();
        tracing::info!("User {} email verified", user_id);
        Ok(())
    }

    /// 管理员状态管理：active ⇄ inactive ⇄ suspended
    pub fn set_status(&mut self, user_id: Uuid, status: UserStatus) -> Result<()> {
        let user = self.get_mut(user_id)?;
        let managed = |s: UserStatus| {
            matches!(
                s,
                UserStatus::Active | UserStatus::Inactive | UserStatus::Suspended
            )
        };
        if !managed(user.status) || !managed(status) || user.status == status {
            return Err(ClinicError::InvalidStateTransition {
                from: user.status.as_str().to_string(),
                event: status.as_str().to_string(),
            });
        }
        user.status = status;
        user.updated_at = Utc::now();
        tracing::info!("User {} status set to {}", user_id, status.as_str());
        Ok(())
    }

    /// 删除用户
    ///
    /// 被删除者为医生时，先清除其所有患者的 doctor_id 再删除记录；
    /// 两步在同一次可变借用内完成，不会留下悬空引用。
    /// 返回被解除指派的患者数量。
    pub fn delete_user(&mut self, user_id: Uuid) -> Result<usize> {
        let role = self.get(user_id)?.role();

        let mut unassigned = 0;
        if role == UserRole::Doctor {
            for user in self.users.values_mut() {
                if user.doctor_id == Some(user_id) {
                    user.doctor_id = None;
                    user.updated_at = Utc::now();
                    unassigned += 1;
                }
            }
        }

        let user = self
            .users
            .remove(&user_id)
            .ok_or_else(|| ClinicError::NotFound(format!("User {} not found", user_id)))?;
        self.email_index.remove(&user.email.to_lowercase());

        tracing::info!(
            "Deleted user {} ({}), unassigned {} patients",
            user_id,
            role.as_str(),
            unassigned
        );
        Ok(unassigned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student_request(email: &str, student_id: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Ada Student".to_string(),
            email: email.to_string(),
            password: "secret123".to_string(),
            role: UserRole::Student,
            phone: None,
            attributes: RoleAttributePayload {
                student_id: Some(student_id.to_string()),
                department: Some("Computer Science".to_string()),
                ..Default::default()
            },
        }
    }

    fn doctor_request(email: &str, license: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Dr. House".to_string(),
            email: email.to_string(),
            password: "secret123".to_string(),
            role: UserRole::Doctor,
            phone: None,
            attributes: RoleAttributePayload {
                medical_license_number: Some(license.to_string()),
                specialization: Some("Diagnostics".to_string()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_register_student_success() {
        let mut registry = UserRegistry::new();
        let user = registry
            .register(student_request("a@university.edu", "S1"))
            .unwrap();

        assert_eq!(user.status, UserStatus::Active);
        assert!(user.email_verified_at.is_some());
        assert_eq!(user.role(), UserRole::Student);
    }

    #[test]
    fn test_register_rejects_non_university_domain_for_patients() {
        let mut registry = UserRegistry::new();
        let err = registry
            .register(student_request("a@gmail.com", "S1"))
            .unwrap_err();
        assert!(matches!(err, ClinicError::DomainNotAllowed(_)));

        // 同样的载荷换成大学域名则成功
        assert!(registry
            .register(student_request("a@university.edu", "S1"))
            .is_ok());
    }

    #[test]
    fn test_register_doctor_without_domain_restriction() {
        let mut registry = UserRegistry::new();
        // 医生不是患者角色，不受域名限制
        assert!(registry
            .register(doctor_request("house@hospital.org", "MD-1"))
            .is_ok());
    }

    #[test]
    fn test_register_missing_required_field() {
        let mut registry = UserRegistry::new();
        let mut request = student_request("a@university.edu", "S1");
        request.attributes.department = None;

        let err = registry.register(request).unwrap_err();
        assert!(matches!(err, ClinicError::MissingRequiredField(f) if f == "department"));
    }

    #[test]
    fn test_register_duplicate_email_and_student_id() {
        let mut registry = UserRegistry::new();
        registry
            .register(student_request("a@university.edu", "S1"))
            .unwrap();

        let err = registry
            .register(student_request("A@University.edu", "S2"))
            .unwrap_err();
        assert!(matches!(err, ClinicError::DuplicateKey { field, .. } if field == "email"));

        let err = registry
            .register(student_request("b@university.edu", "S1"))
            .unwrap_err();
        assert!(matches!(err, ClinicError::DuplicateKey { field, .. } if field == "student_id"));
    }

    #[test]
    fn test_admin_permissions_short_circuit() {
        let mut registry = UserRegistry::new();
        let admin = registry
            .register(RegisterRequest {
                name: "Root".to_string(),
                email: "root@clinic.org".to_string(),
                password: "secret123".to_string(),
                role: UserRole::Admin,
                phone: None,
                attributes: RoleAttributePayload {
                    staff_no: Some("A-1".to_string()),
                    ..Default::default()
                },
            })
            .unwrap();

        registry.grant_permission(admin.id, "some_random_permission").unwrap();
        let admin = registry.get(admin.id).unwrap().clone();

        let permissions = registry.resolve_permissions(&admin);
        assert_eq!(permissions.len(), 1);
        assert!(permissions.contains(FULL_ACCESS));
    }

    #[test]
    fn test_resolve_permissions_union_for_non_admin() {
        let mut registry = UserRegistry::new();
        let student = registry
            .register(student_request("a@university.edu", "S1"))
            .unwrap();
        registry
            .grant_permission(student.id, "view_lab_results")
            .unwrap();

        let student = registry.get(student.id).unwrap().clone();
        let permissions = registry.resolve_permissions(&student);
        assert!(permissions.contains("view_own_records"));
        assert!(permissions.contains("view_lab_results"));
        assert!(!permissions.contains(FULL_ACCESS));
    }

    #[test]
    fn test_projection_excludes_foreign_and_absent_fields() {
        let mut registry = UserRegistry::new();
        let student = registry
            .register(student_request("a@university.edu", "S1"))
            .unwrap();

        let view = registry.project(&student).unwrap();
        assert_eq!(view["role"], "student");
        assert_eq!(view["student_id"], "S1");
        assert!(view.get("medical_license_number").is_none());
        assert!(view.get("staff_no").is_none());
        assert!(view.get("password_hash").is_none());
        assert!(view.get("phone").is_none());
        assert!(view.get("custom_permissions").is_none());
        assert!(view.get("doctor_id").is_none());
    }

    #[test]
    fn test_display_identifier_per_role() {
        let mut registry = UserRegistry::new();
        let student = registry
            .register(student_request("a@university.edu", "S1"))
            .unwrap();
        let doctor = registry
            .register(doctor_request("d@hospital.org", "MD-1"))
            .unwrap();

        assert_eq!(registry.display_identifier(&student), "S1");
        assert_eq!(registry.display_identifier(&doctor), "MD-1");
    }

    #[test]
    fn test_verify_email_transition() {
        let mut registry = UserRegistry::new();
        let user = registry
            .register_unverified(student_request("a@university.edu", "S1"))
            .unwrap();
        assert_eq!(user.status, UserStatus::PendingVerification);
        assert!(user.email_verified_at.is_none());

        registry.verify_email(user.id).unwrap();
        let user = registry.get(user.id).unwrap();
        assert_eq!(user.status, UserStatus::Active);
        assert!(user.email_verified_at.is_some());

        // 已激活用户再次验证是无效转换
        let err = registry.verify_email(user.id).unwrap_err();
        assert!(matches!(err, ClinicError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_admin_status_transitions() {
        let mut registry = UserRegistry::new();
        let user = registry
            .register(student_request("a@university.edu", "S1"))
            .unwrap();

        registry.set_status(user.id, UserStatus::Suspended).unwrap();
        registry.set_status(user.id, UserStatus::Inactive).unwrap();
        registry.set_status(user.id, UserStatus::Active).unwrap();

        let err = registry
            .set_status(user.id, UserStatus::PendingVerification)
            .unwrap_err();
        assert!(matches!(err, ClinicError::InvalidStateTransition { .. }));
    }
}
