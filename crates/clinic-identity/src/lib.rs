//! # 诊所身份模块
//!
//! 提供角色驱动的身份与权限管理功能，包括：
//! - 角色规则表：按角色描述必填属性、默认权限和展示标识
//! - 用户注册表：注册验证、权限解析、角色视图投影与状态管理
//! - 医患指派：医生与患者关系的不变量维护

pub mod assignment;
pub mod registry;
pub mod role_rules;

// 重新导出主要类型
pub use registry::{RegisterRequest, UserRegistry};
pub use role_rules::{build_attributes, RoleAttributePayload, RoleRules, FULL_ACCESS};
