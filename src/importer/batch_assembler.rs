// ==========================================
// 体适能检测纪录 - 批次组装器
// ==========================================
// 职责: 表头校验 → 逐列校验 → 汇总计数 → 不可变 Preview
// 红线: 字段级问题不中断批次；只有结构错误（空文件/表头不符）中止
// ==========================================

use crate::domain::import::{ImportScope, Preview, RowOutcome};
use crate::domain::types::{BatchKind, RowStatus};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::import_trait::RowValidator;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

/// 资料区第一列的列号（表头为第 1 列）
pub const FIRST_DATA_ROW_NUMBER: usize = 2;

/// 必填栏位标记
const REQUIRED_MARKER: char = '*';

/// 产生预览句柄（UUID v4，不可猜测）
pub fn new_handle() -> String {
    Uuid::new_v4().to_string()
}

/// 校验表头
///
/// 前 N 栏须以模板标签开头（去除 `*` 后比对），栏数不得少于模板
pub fn check_header(kind: BatchKind, header: &[String]) -> ImportResult<()> {
    let expected = kind.expected_headers();
    if header.len() < expected.len() {
        return Err(ImportError::InvalidHeader(format!(
            "欄位數量不足（需要 {} 欄，實際 {} 欄），請使用正確的模板",
            expected.len(),
            header.len()
        )));
    }

    for (index, label) in expected
        .iter()
        .take(kind.checked_header_columns())
        .enumerate()
    {
        let label = label.trim_end_matches(REQUIRED_MARKER);
        let actual = header[index].trim().trim_start_matches('\u{feff}');
        if !actual.starts_with(label) {
            return Err(ImportError::InvalidHeader(format!(
                "第 {} 欄應為「{}」，實際為「{}」",
                index + 1,
                label,
                actual
            )));
        }
    }

    Ok(())
}

/// 状态计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub total: usize,
    pub valid: usize,
    pub warning: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn fold(rows: &[RowOutcome]) -> Self {
        rows.iter().fold(Self::default(), |mut acc, row| {
            acc.total += 1;
            match row.status {
                RowStatus::Valid => acc.valid += 1,
                RowStatus::Warning => acc.warning += 1,
                RowStatus::Error => acc.error += 1,
            }
            acc
        })
    }
}

/// 组装预览
///
/// # 参数
/// - kind: 批次种类（决定表头模板）
/// - file_name: 原始档名
/// - scope: 导入范围
/// - rows: 含表头的原始列
/// - validator: 行校验器（持有批次范围状态）
/// - now: 建立时间（存入 PreviewStore 时重新标记）
///
/// # 返回
/// - Ok(Preview): 即使没有任何有效列也回传
/// - Err: NoDataRows / InvalidHeader
pub fn assemble(
    kind: BatchKind,
    file_name: &str,
    scope: ImportScope,
    rows: &[Vec<String>],
    validator: &mut dyn RowValidator,
    now: DateTime<Utc>,
) -> ImportResult<Preview> {
    if rows.len() < 2 {
        return Err(ImportError::NoDataRows);
    }
    check_header(kind, &rows[0])?;

    let outcomes: Vec<RowOutcome> = rows[1..]
        .iter()
        .enumerate()
        .map(|(i, cells)| validator.validate(i + FIRST_DATA_ROW_NUMBER, cells))
        .collect();

    let counts = StatusCounts::fold(&outcomes);
    debug!(
        kind = %kind,
        total = counts.total,
        valid = counts.valid,
        warning = counts.warning,
        error = counts.error,
        "批次校验完成"
    );

    Ok(Preview {
        handle: new_handle(),
        kind,
        scope,
        file_name: file_name.to_string(),
        rows: outcomes,
        total: counts.total,
        valid_count: counts.valid,
        warning_count: counts.warning,
        error_count: counts.error,
        created_at: now,
        expires_at: now,
        executed: false,
    })
}
