// ==========================================
// 体适能检测纪录 - 数据仓储层
// ==========================================
// 职责: 纪录库数据访问（学校 / 学生 / 检测纪录）
// 红线: 不含业务规则
// ==========================================

pub mod error;
pub mod record_store;
pub mod record_store_impl;

pub use error::{RepositoryError, RepositoryResult};
pub use record_store::{RecordStore, RecordWriter};
pub use record_store_impl::SqliteRecordStore;
