// ==========================================
// 体适能检测纪录 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 字段级校验问题是数据（Issue），不走错误通道
// ==========================================

use crate::domain::types::BatchKind;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件格式不支持: {0}（仅支持 .xlsx/.csv）")]
    UnsupportedFormat(String),

    #[error("文件过大: {size} bytes（上限 {max} bytes）")]
    FileTooLarge { size: u64, max: u64 },

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 结构错误（不产生预览）=====
    #[error("文件无工作表")]
    NoWorksheet,

    #[error("工作表不存在: {0}")]
    WorksheetNotFound(String),

    #[error("表头格式错误: {0}")]
    InvalidHeader(String),

    #[error("文件无数据行（至少需要表头 + 1 列数据）")]
    NoDataRows,

    // ===== 引用 / 预览状态错误 =====
    #[error("学校不存在: school_id={0}")]
    SchoolNotFound(i64),

    #[error("预览不存在或已过期: {0}")]
    PreviewNotFound(String),

    #[error("此预览已被执行: {0}")]
    PreviewAlreadyExecuted(String),

    #[error("此预览正在执行中: {0}")]
    CommitInProgress(String),

    #[error("预览类型不符: 期望 {expected}，实际 {actual}")]
    BatchKindMismatch {
        expected: BatchKind,
        actual: BatchKind,
    },

    // ===== 存储错误 =====
    #[error("纪录写入失败: {0}")]
    Storage(#[from] RepositoryError),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 是否为结构性错误（表头/空文件）
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ImportError::NoWorksheet
                | ImportError::WorksheetNotFound(_)
                | ImportError::InvalidHeader(_)
                | ImportError::NoDataRows
        )
    }

    /// 是否为重复执行冲突
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ImportError::PreviewAlreadyExecuted(_) | ImportError::CommitInProgress(_)
        )
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::XlsxError>
impl From<calamine::XlsxError> for ImportError {
    fn from(err: calamine::XlsxError) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
