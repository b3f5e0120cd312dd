//! # 诊所数据库模块
//!
//! 提供PostgreSQL持久化层：连接池管理、表结构初始化以及
//! 用户、预约、病历、处方、就诊卡的查询操作。

pub mod connection;
pub mod models;
pub mod queries;

pub use connection::DatabasePool;
pub use queries::DatabaseQueries;
