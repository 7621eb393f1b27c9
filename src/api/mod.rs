// ==========================================
// 体适能检测纪录 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供外层传输调用
// ==========================================

pub mod error;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, PreviewResponse};
