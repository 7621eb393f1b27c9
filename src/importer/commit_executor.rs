// ==========================================
// 体适能检测纪录 - 提交执行器
// ==========================================
// 职责: 依纳入策略重放预览列，单一事务写入纪录库
// 纳入策略:
// - error   → 一律跳过
// - warning → include_warnings=false 时跳过（标记为策略跳过）
// - valid   → 写入
// 红线: 事务中途失败整批回滚，不转为逐列跳过
// ==========================================

use crate::domain::import::{CommitResult, Preview, RowFields, RowOutcome, SkippedRow};
use crate::domain::student::{NewSportRecord, NewStudent};
use crate::domain::types::{BatchKind, FieldId, IssueCode, RowStatus, SportItem};
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::error::RepositoryResult;
use crate::repository::record_store::{RecordStore, RecordWriter};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

/// 因策略跳过警告列时附加的说明
pub const SKIPPED_BY_POLICY_SUFFIX: &str = " (警告被跳過)";

/// 单列的写入内容
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedWrite {
    Student(NewStudent),
    /// 一列成绩展开为多笔纪录，共用学生 id 与测验日期
    Records(Vec<NewSportRecord>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRow {
    pub row_number: usize,
    pub write: PlannedWrite,
}

/// 提交计划（写入列 + 跳过列，皆保持原始顺序）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitPlan {
    pub writes: Vec<PlannedRow>,
    pub skipped: Vec<SkippedRow>,
}

impl CommitPlan {
    pub fn record_count(&self) -> usize {
        self.writes
            .iter()
            .map(|r| match &r.write {
                PlannedWrite::Student(_) => 1,
                PlannedWrite::Records(records) => records.len(),
            })
            .sum()
    }
}

fn skipped_row(row: &RowOutcome, by_policy: bool) -> SkippedRow {
    match row.primary_issue() {
        Some(issue) => SkippedRow {
            row_number: row.row_number,
            field: issue.field,
            code: issue.code,
            message: if by_policy {
                format!("{}{}", issue.message, SKIPPED_BY_POLICY_SUFFIX)
            } else {
                issue.message.clone()
            },
            skipped_by_policy: by_policy,
        },
        // RowOutcome::new 保证非 valid 列至少有一个同严重度问题
        None => SkippedRow {
            row_number: row.row_number,
            field: FieldId::Student,
            code: IssueCode::InvalidValue,
            message: format!("第 {} 列狀態為 {}", row.row_number, row.status),
            skipped_by_policy: by_policy,
        },
    }
}

// ===== 已解析值读取 =====

fn missing(row_number: usize, field: FieldId) -> ImportError {
    ImportError::InternalError(format!("第 {} 列缺少已解析欄位 {}", row_number, field))
}

fn text(fields: &RowFields, row_number: usize, field: FieldId) -> ImportResult<String> {
    fields
        .parsed(field)
        .and_then(|v| v.as_text())
        .map(str::to_string)
        .ok_or_else(|| missing(row_number, field))
}

fn date(fields: &RowFields, row_number: usize, field: FieldId) -> ImportResult<NaiveDate> {
    fields
        .parsed(field)
        .and_then(|v| v.as_date())
        .ok_or_else(|| missing(row_number, field))
}

fn plan_student(preview: &Preview, row: &RowOutcome) -> ImportResult<PlannedWrite> {
    let f = &row.fields;
    let n = row.row_number;

    let grade = f
        .parsed(FieldId::Grade)
        .and_then(|v| v.as_int())
        .ok_or_else(|| missing(n, FieldId::Grade))?;
    let grade = i32::try_from(grade).map_err(|_| missing(n, FieldId::Grade))?;

    Ok(PlannedWrite::Student(NewStudent {
        school_id: preview.scope.school_id,
        student_number: text(f, n, FieldId::StudentNumber)?,
        name: text(f, n, FieldId::Name)?,
        gender: f
            .parsed(FieldId::Gender)
            .and_then(|v| v.as_gender())
            .ok_or_else(|| missing(n, FieldId::Gender))?,
        grade,
        class_name: f
            .parsed(FieldId::Class)
            .and_then(|v| v.as_text())
            .map(str::to_string),
        birth_date: f.parsed(FieldId::BirthDate).and_then(|v| v.as_date()),
    }))
}

fn plan_records(preview: &Preview, row: &RowOutcome) -> ImportResult<PlannedWrite> {
    let f = &row.fields;
    let n = row.row_number;

    let student_id = f
        .parsed(FieldId::Student)
        .and_then(|v| v.as_entity_id())
        .ok_or_else(|| missing(n, FieldId::Student))?;
    let test_date = date(f, n, FieldId::TestDate)?;
    let notes = format!("批次匯入 - {}", preview.file_name);

    let records = SportItem::ALL
        .iter()
        .filter_map(|item| {
            f.parsed(item.field())
                .and_then(|v| v.as_float())
                .map(|value| NewSportRecord {
                    student_id,
                    sport_type_id: item.sport_type_id(),
                    value,
                    test_date,
                    notes: Some(notes.clone()),
                })
        })
        .collect();

    Ok(PlannedWrite::Records(records))
}

/// 依纳入策略建立提交计划（不触及纪录库）
pub fn plan_commit(preview: &Preview, include_warnings: bool) -> ImportResult<CommitPlan> {
    let mut plan = CommitPlan::default();

    for row in &preview.rows {
        match row.status {
            RowStatus::Error => plan.skipped.push(skipped_row(row, false)),
            RowStatus::Warning if !include_warnings => plan.skipped.push(skipped_row(row, true)),
            RowStatus::Warning | RowStatus::Valid => {
                let write = match preview.kind {
                    BatchKind::Students => plan_student(preview, row)?,
                    BatchKind::Records => plan_records(preview, row)?,
                };
                plan.writes.push(PlannedRow {
                    row_number: row.row_number,
                    write,
                });
            }
        }
    }

    Ok(plan)
}

fn apply(writer: &mut dyn RecordWriter, plan: &CommitPlan) -> RepositoryResult<()> {
    for row in &plan.writes {
        match &row.write {
            PlannedWrite::Student(student) => {
                writer.create_student(student)?;
            }
            PlannedWrite::Records(records) => {
                for record in records {
                    writer.create_sport_record(record)?;
                }
            }
        }
    }
    Ok(())
}

/// 执行提交
///
/// # 参数
/// - store: 纪录库
/// - preview: 已取得执行权的预览
/// - include_warnings: 是否写入警告列
/// - executed_at: 执行时间
///
/// # 返回
/// - Ok(CommitResult): success + skipped == 预览列数
/// - Err(Storage): 事务失败，无任何写入
pub fn execute_commit(
    store: &dyn RecordStore,
    preview: &Preview,
    include_warnings: bool,
    executed_at: DateTime<Utc>,
) -> ImportResult<CommitResult> {
    let plan = plan_commit(preview, include_warnings)?;
    debug!(
        handle = %preview.handle,
        writes = plan.writes.len(),
        skipped = plan.skipped.len(),
        "提交计划"
    );

    if !plan.writes.is_empty() {
        store.transaction(&mut |writer: &mut dyn RecordWriter| apply(writer, &plan))?;
    }

    Ok(CommitResult {
        handle: preview.handle.clone(),
        kind: preview.kind,
        success_count: plan.writes.len(),
        skipped_count: plan.skipped.len(),
        records_created: plan.record_count(),
        skipped: plan.skipped,
        executed_at,
    })
}
