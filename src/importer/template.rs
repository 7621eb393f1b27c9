// ==========================================
// 体适能检测纪录 - 导入模板产生
// ==========================================
// 职责: 产生学生名册 / 检测成绩的 CSV 模板
// 说明: 开头写入 UTF-8 BOM，Excel 开启时中文不乱码
// ==========================================

use crate::domain::student::Student;
use crate::domain::types::BatchKind;
use crate::importer::error::{ImportError, ImportResult};
use csv::WriterBuilder;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// 学生名册范例列
const STUDENT_EXAMPLES: &[&[&str]] = &[
    &["1", "王小明", "男", "3", "甲", "2015/03/15"],
    &["2", "李小華", "女", "3", "甲", "2015/05/20"],
];

/// 检测成绩范例列
const RECORD_EXAMPLES: &[&[&str]] = &[
    &["1", "王小明", "130.5", "28.3", "25", "120", "30", "480", "2024/03/15"],
    &["2", "李小華", "128", "26.5", "30", "115", "28", "510", "2024/03/15"],
];

fn write_csv<I, R>(kind: BatchKind, rows: I) -> ImportResult<Vec<u8>>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut writer = WriterBuilder::new().from_writer(UTF8_BOM.to_vec());
    writer.write_record(kind.expected_headers())?;
    for row in rows {
        writer.write_record(row)?;
    }

    writer
        .into_inner()
        .map_err(|e| ImportError::InternalError(format!("模板写入失败: {}", e.error())))
}

/// 产生模板（含范例列）
pub fn template_csv(kind: BatchKind) -> ImportResult<Vec<u8>> {
    match kind {
        BatchKind::Students => write_csv(kind, STUDENT_EXAMPLES.iter().map(|r| r.iter())),
        BatchKind::Records => write_csv(kind, RECORD_EXAMPLES.iter().map(|r| r.iter())),
    }
}

/// 产生预填名册的成绩模板（量测栏位与日期留空）
pub fn records_template_for_roster(students: &[Student]) -> ImportResult<Vec<u8>> {
    let width = BatchKind::Records.expected_headers().len();
    let rows = students.iter().map(|s| {
        let mut row = vec![String::new(); width];
        row[0] = s.student_number.clone();
        row[1] = s.name.clone();
        row
    });
    write_csv(BatchKind::Records, rows)
}
