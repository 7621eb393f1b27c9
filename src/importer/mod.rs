// ==========================================
// 体适能检测纪录 - 导入层
// ==========================================
// 职责: 试算表批次导入（预览 → 提交）
// 支持: Excel (.xlsx), CSV
// ==========================================

// 模块声明
pub mod batch_assembler;
pub mod clock;
pub mod commit_executor;
pub mod error;
pub mod field_parser;
pub mod file_parser;
pub mod import_service;
pub mod import_trait;
pub mod preview_store;
pub mod row_validator;
pub mod template;

// 重导出核心类型
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ImportError, ImportResult};
pub use file_parser::{open_row_source, CsvRowSource, ExcelRowSource, MemoryRowSource, UploadFormat};
pub use import_service::ImportService;
pub use preview_store::{PreviewStore, ReaperHandle};
pub use row_validator::{RecordRowValidator, StudentRowValidator};

// 重导出 Trait 接口
pub use import_trait::{RowSource, RowValidator};
