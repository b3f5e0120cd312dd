//! 角色规则表
//!
//! 以数据驱动的方式描述每个角色的必填属性、可选属性、默认权限集
//! 和用于展示的标识字段，所有权限判定统一查询此表。

use clinic_core::{ClinicError, RoleAttributes, UserRole, Result, User};
use serde::{Deserialize, Serialize};

/// 管理员的完全访问权限
pub const FULL_ACCESS: &str = "full_access";

/// 允许注册的大学邮箱域名（学生与教职工患者角色）
pub const ALLOWED_EMAIL_DOMAINS: &[&str] = &[
    "university.edu",
    "student.university.edu",
    "staff.university.edu",
];

/// 单个角色的规则
#[derive(Debug)]
pub struct RoleRules {
    /// 必填属性
    pub required_fields: &'static [&'static str],
    /// 可选属性
    pub optional_fields: &'static [&'static str],
    /// 默认权限集
    pub default_permissions: &'static [&'static str],
    /// 展示标识字段
    pub display_identifier_field: &'static str,
}

static STUDENT_RULES: RoleRules = RoleRules {
    required_fields: &["student_id", "department"],
    optional_fields: &[],
    default_permissions: &[
        "view_own_records",
        "view_own_appointments",
        "book_appointment",
        "update_own_profile",
    ],
    display_identifier_field: "student_id",
};

static DOCTOR_RULES: RoleRules = RoleRules {
    required_fields: &["medical_license_number", "specialization"],
    optional_fields: &["staff_no"],
    default_permissions: &[
        "view_patient_records",
        "create_medical_record",
        "prescribe_medication",
        "manage_appointments",
        "manage_patients",
    ],
    display_identifier_field: "medical_license_number",
};

static CLINICAL_STAFF_RULES: RoleRules = RoleRules {
    required_fields: &["staff_no", "department"],
    optional_fields: &[],
    default_permissions: &[
        "view_patient_records",
        "record_vitals",
        "administer_medication",
        "manage_appointments",
    ],
    display_identifier_field: "staff_no",
};

static ACADEMIC_STAFF_RULES: RoleRules = RoleRules {
    required_fields: &["staff_no", "faculty"],
    optional_fields: &["department"],
    default_permissions: &[
        "view_own_records",
        "view_own_appointments",
        "book_appointment",
        "update_own_profile",
    ],
    display_identifier_field: "staff_no",
};

static ADMIN_RULES: RoleRules = RoleRules {
    required_fields: &["staff_no"],
    optional_fields: &[],
    default_permissions: &[FULL_ACCESS],
    display_identifier_field: "staff_no",
};

impl RoleRules {
    /// 查询角色对应的规则
    pub fn for_role(role: UserRole) -> &'static RoleRules {
        match role {
            UserRole::Student => &STUDENT_RULES,
            UserRole::Doctor => &DOCTOR_RULES,
            UserRole::ClinicalStaff => &CLINICAL_STAFF_RULES,
            UserRole::AcademicStaff => &ACADEMIC_STAFF_RULES,
            UserRole::Admin => &ADMIN_RULES,
        }
    }

    /// 该角色注册时是否要求大学邮箱域名
    pub fn requires_university_domain(role: UserRole) -> bool {
        role.is_patient_capable()
    }

    /// 邮箱域名是否在允许列表中
    pub fn email_domain_allowed(email: &str) -> bool {
        match clinic_core::utils::email_domain(email) {
            Some(domain) => ALLOWED_EMAIL_DOMAINS.contains(&domain.as_str()),
            None => false,
        }
    }

    /// 用户的展示标识
    ///
    /// 学生为学号，医生为执业医师编号，其余职员角色为工号，
    /// 无对应字段时回退到邮箱。
    pub fn display_identifier(user: &User) -> &str {
        match user.role() {
            UserRole::Student => user.attributes.student_id().unwrap_or(&user.email),
            UserRole::Doctor => user
                .attributes
                .medical_license_number()
                .unwrap_or(&user.email),
            _ => user.attributes.staff_no().unwrap_or(&user.email),
        }
    }
}

/// 注册请求中携带的角色属性（扁平字段，按角色取用）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleAttributePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staff_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faculty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical_license_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
}

impl RoleAttributePayload {
    fn field(&self, name: &str) -> Option<&str> {
        let value = match name {
            "student_id" => &self.student_id,
            "department" => &self.department,
            "staff_no" => &self.staff_no,
            "faculty" => &self.faculty,
            "medical_license_number" => &self.medical_license_number,
            "specialization" => &self.specialization,
            _ => &None,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }

    fn required(&self, name: &str) -> Result<String> {
        self.field(name)
            .map(|v| v.to_string())
            .ok_or_else(|| ClinicError::MissingRequiredField(name.to_string()))
    }
}

/// 按角色规则构造角色属性变体
///
/// 任一必填字段缺失即失败，保证用户对象只携带本角色的字段。
pub fn build_attributes(role: UserRole, payload: &RoleAttributePayload) -> Result<RoleAttributes> {
    let rules = RoleRules::for_role(role);
    for field in rules.required_fields {
        if payload.field(field).is_none() {
            return Err(ClinicError::MissingRequiredField(field.to_string()));
        }
    }

    let attributes = match role {
        UserRole::Student => RoleAttributes::Student {
            student_id: payload.required("student_id")?,
            department: payload.required("department")?,
        },
        UserRole::Doctor => RoleAttributes::Doctor {
            medical_license_number: payload.required("medical_license_number")?,
            specialization: payload.required("specialization")?,
            staff_no: payload.field("staff_no").map(|v| v.to_string()),
        },
        UserRole::ClinicalStaff => RoleAttributes::ClinicalStaff {
            staff_no: payload.required("staff_no")?,
            department: payload.required("department")?,
        },
        UserRole::AcademicStaff => RoleAttributes::AcademicStaff {
            staff_no: payload.required("staff_no")?,
            faculty: payload.required("faculty")?,
            department: payload.field("department").map(|v| v.to_string()),
        },
        UserRole::Admin => RoleAttributes::Admin {
            staff_no: payload.required("staff_no")?,
        },
    };

    Ok(attributes)
}
