//! # 诊所Web模块
//!
//! 提供REST API服务，暴露身份、指派、预约、病历、处方与就诊卡操作。

pub mod handlers;
pub mod server;

pub use server::{AppState, WebServer};
