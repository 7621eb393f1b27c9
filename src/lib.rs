// ==========================================
// 学生体适能检测纪录 - 核心库
// ==========================================
// 系统定位: 试算表批次导入（上传 → 预览 → 提交）
// 技术栈: Rust + SQLite + tokio
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 预览 / 提交
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    BatchKind, FieldId, FieldValue, Gender, IssueCode, RowStatus, Severity, SportItem, ValueRange,
};

// 领域实体
pub use domain::{
    CommitResult, ImportScope, Issue, Preview, RowOutcome, School, SkippedRow, SportRecord,
    Student,
};

// 导入
pub use importer::{ImportError, ImportService, PreviewStore};

// API
pub use api::{ApiError, ImportApi, PreviewResponse};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "學生體適能檢測紀錄";
