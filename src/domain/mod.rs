// ==========================================
// 体适能检测纪录 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod import;
pub mod student;
pub mod types;

// 重导出核心类型
pub use import::{
    CommitResult, ImportScope, Issue, Preview, RowFields, RowOutcome, SkippedRow,
};
pub use student::{
    natural_key, NewSportRecord, NewStudent, School, SportRecord, Student, StudentFilter,
};
pub use types::{
    BatchKind, FieldId, FieldValue, Gender, IssueCode, RowStatus, Severity, SportItem, ValueRange,
};
