// ==========================================
// 体适能检测纪录 - 导入预览领域模型
// ==========================================
// 职责: Preview / RowOutcome / Issue / CommitResult
// 红线: Preview 建立后除 executed 旗标外不可变
// ==========================================

use crate::domain::types::{BatchKind, FieldId, FieldValue, IssueCode, RowStatus, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// ImportScope - 导入范围
// ==========================================
// school_id 必须存在；grade/class 仅用于成绩批次的学生比对
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportScope {
    pub school_id: i64,
    pub grade: Option<i32>,
    pub class_name: Option<String>,
}

impl ImportScope {
    pub fn school(school_id: i64) -> Self {
        Self {
            school_id,
            grade: None,
            class_name: None,
        }
    }

    pub fn with_grade(mut self, grade: i32) -> Self {
        self.grade = Some(grade);
        self
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        let class_name = class_name.into();
        let trimmed = class_name.trim();
        self.class_name = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self
    }
}

// ==========================================
// Issue - 字段级问题
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub field: FieldId,
    pub code: IssueCode,
    pub message: String,
    pub severity: Severity,
}

impl Issue {
    pub fn error(field: FieldId, code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            field,
            code,
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(field: FieldId, code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            field,
            code,
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

// ==========================================
// RowFields - 行字段（原始文字 + 已解析值）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowFields {
    /// 原始储存格文字（已 trim，空白不收录）
    pub raw: BTreeMap<FieldId, String>,
    /// 解析后的值
    pub parsed: BTreeMap<FieldId, FieldValue>,
}

impl RowFields {
    pub fn raw(&self, field: FieldId) -> Option<&str> {
        self.raw.get(&field).map(String::as_str)
    }

    pub fn parsed(&self, field: FieldId) -> Option<&FieldValue> {
        self.parsed.get(&field)
    }
}

// ==========================================
// RowOutcome - 单行校验结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowOutcome {
    /// 与试算表列号一致（表头为第 1 列）
    pub row_number: usize,
    pub status: RowStatus,
    pub fields: RowFields,
    pub issues: Vec<Issue>,
}

impl RowOutcome {
    /// 依问题列表建立，状态由最严重问题决定
    pub fn new(row_number: usize, fields: RowFields, issues: Vec<Issue>) -> Self {
        let status = RowStatus::from_severities(issues.iter().map(|i| i.severity));
        Self {
            row_number,
            status,
            fields,
            issues,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.status == RowStatus::Error
    }

    /// 与行状态同严重度的第一个问题（用作跳过原因）
    pub fn primary_issue(&self) -> Option<&Issue> {
        let severity = self.status.severity()?;
        self.issues.iter().find(|i| i.severity == severity)
    }
}

// ==========================================
// Preview - 暂存的预览结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preview {
    pub handle: String,
    pub kind: BatchKind,
    pub scope: ImportScope,
    pub file_name: String,
    pub rows: Vec<RowOutcome>,
    pub total: usize,
    pub valid_count: usize,
    pub warning_count: usize,
    pub error_count: usize,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub executed: bool,
}

impl Preview {
    /// 在 `now` 时点是否已过期
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// ==========================================
// CommitResult - 提交结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub row_number: usize,
    pub field: FieldId,
    pub code: IssueCode,
    pub message: String,
    /// 警告行因 include_warnings=false 而被跳过
    pub skipped_by_policy: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResult {
    pub handle: String,
    pub kind: BatchKind,
    /// 写入的行数
    pub success_count: usize,
    pub skipped_count: usize,
    /// 实际建立的纪录数（成绩行会展开为多笔）
    pub records_created: usize,
    pub skipped: Vec<SkippedRow>,
    pub executed_at: DateTime<Utc>,
}
