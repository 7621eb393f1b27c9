// ==========================================
// 体适能检测纪录 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换导入 / 仓储错误为对外错误码
// ==========================================

use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 上传错误
    // ==========================================
    #[error("文件格式不支持: {0}")]
    InvalidFileFormat(String),

    #[error("文件过大: {size} bytes（上限 {max} bytes）")]
    FileTooLarge { size: u64, max: u64 },

    #[error("文件解析失败: {0}")]
    ParseError(String),

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("学校不存在: {0}")]
    SchoolNotFound(i64),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("预览不存在或已过期: {0}")]
    PreviewNotFound(String),

    /// 重复执行（已执行或执行中）
    #[error("此预览已被执行: {0}")]
    PreviewAlreadyExecuted(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 对外稳定的错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::InvalidFileFormat(_) => "INVALID_FILE_FORMAT",
            ApiError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            ApiError::ParseError(_) => "PARSE_ERROR",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::SchoolNotFound(_) => "SCHOOL_NOT_FOUND",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::PreviewNotFound(_) => "PREVIEW_NOT_FOUND",
            ApiError::PreviewAlreadyExecuted(_) => "PREVIEW_ALREADY_EXECUTED",
            ApiError::DatabaseError(_) | ApiError::DatabaseTransactionError(_) => "DATABASE_ERROR",
            ApiError::ImportError(_) => "IMPORT_ERROR",
            ApiError::InternalError(_) | ApiError::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// 对应的 HTTP 状态码（供外层传输使用）
    pub fn http_status(&self) -> u16 {
        match self {
            ApiError::InvalidFileFormat(_)
            | ApiError::FileTooLarge { .. }
            | ApiError::ParseError(_)
            | ApiError::InvalidInput(_) => 400,
            ApiError::SchoolNotFound(_) | ApiError::NotFound(_) | ApiError::PreviewNotFound(_) => {
                404
            }
            ApiError::PreviewAlreadyExecuted(_) => 409,
            _ => 500,
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseConnectionError(msg)
            | RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::ImportError(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::ImportError(format!("外键约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::DatabaseError(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::UnsupportedFormat(name) => ApiError::InvalidFileFormat(format!(
                "{}（僅支援 .xlsx / .csv 格式）",
                name
            )),
            ImportError::FileTooLarge { size, max } => ApiError::FileTooLarge { size, max },
            ImportError::FileReadError(msg)
            | ImportError::ExcelParseError(msg)
            | ImportError::CsvParseError(msg) => ApiError::ParseError(msg),
            e @ (ImportError::NoWorksheet
            | ImportError::WorksheetNotFound(_)
            | ImportError::InvalidHeader(_)
            | ImportError::NoDataRows) => ApiError::ParseError(e.to_string()),
            ImportError::SchoolNotFound(id) => ApiError::SchoolNotFound(id),
            ImportError::PreviewNotFound(handle) => ApiError::PreviewNotFound(handle),
            ImportError::PreviewAlreadyExecuted(handle) | ImportError::CommitInProgress(handle) => {
                ApiError::PreviewAlreadyExecuted(handle)
            }
            e @ ImportError::BatchKindMismatch { .. } => ApiError::InvalidInput(e.to_string()),
            ImportError::Storage(repo) => ApiError::from(repo),
            ImportError::InternalError(msg) => ApiError::InternalError(msg),
            ImportError::Other(err) => ApiError::Other(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_error_codes() {
        let cases: Vec<(ImportError, &str)> = vec![
            (ImportError::UnsupportedFormat("a.txt".into()), "INVALID_FILE_FORMAT"),
            (ImportError::FileTooLarge { size: 10, max: 5 }, "FILE_TOO_LARGE"),
            (ImportError::NoDataRows, "PARSE_ERROR"),
            (ImportError::InvalidHeader("x".into()), "PARSE_ERROR"),
            (ImportError::SchoolNotFound(9), "SCHOOL_NOT_FOUND"),
            (ImportError::PreviewNotFound("h".into()), "PREVIEW_NOT_FOUND"),
            (ImportError::PreviewAlreadyExecuted("h".into()), "PREVIEW_ALREADY_EXECUTED"),
            (ImportError::CommitInProgress("h".into()), "PREVIEW_ALREADY_EXECUTED"),
            (
                ImportError::Storage(RepositoryError::UniqueConstraintViolation("u".into())),
                "IMPORT_ERROR",
            ),
        ];

        for (err, code) in cases {
            let label = err.to_string();
            assert_eq!(ApiError::from(err).error_code(), code, "{}", label);
        }
    }

    #[test]
    fn test_conflict_maps_to_409() {
        let err = ApiError::from(ImportError::PreviewAlreadyExecuted("h".into()));
        assert_eq!(err.http_status(), 409);
    }
}
