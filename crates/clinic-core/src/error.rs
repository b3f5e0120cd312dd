//! 错误定义模块

use thiserror::Error;

/// 诊所系统统一错误类型
#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("验证错误 [{field}]: {message}")]
    Validation { field: String, message: String },

    #[error("缺少必填字段: {0}")]
    MissingRequiredField(String),

    #[error("邮箱域名不在允许列表中: {0}")]
    DomainNotAllowed(String),

    #[error("唯一键冲突 [{field}]: {value}")]
    DuplicateKey { field: String, value: String },

    #[error("角色不满足关系约束: {0}")]
    InvalidRole(String),

    #[error("禁止修改字段: {0}")]
    ForbiddenFieldChange(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效状态转换: 从 {from} 到 {event}")]
    InvalidStateTransition { from: String, event: String },

    #[error("删除前必须先解除指派: {0}")]
    PrecedingReassignmentRequired(String),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

impl ClinicError {
    /// 构造字段级验证错误
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ClinicError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 构造唯一键冲突错误
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        ClinicError::DuplicateKey {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// 诊所系统统一结果类型
pub type Result<T> = std::result::Result<T, ClinicError>;
