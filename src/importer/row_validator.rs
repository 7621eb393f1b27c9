// ==========================================
// 体适能检测纪录 - 行校验器
// ==========================================
// 职责: 逐栏套用规则，产生 RowOutcome（字段 + 状态 + 问题列表）
// 红线: 规则依固定栏位顺序评估；合理区间只产生警告，不产生错误
// ==========================================

use crate::domain::import::{Issue, RowFields, RowOutcome};
use crate::domain::student::{natural_key, Student};
use crate::domain::types::{FieldId, FieldValue, IssueCode, Severity, SportItem, ValueRange};
use crate::importer::field_parser::{
    cell_at, char_len, normalize_gender, parse_date, parse_float, parse_int,
};
use crate::importer::import_trait::RowValidator;
use std::collections::HashMap;

// ===== 长度上限 =====
pub const MAX_STUDENT_NUMBER_LEN: usize = 20;
pub const MAX_NAME_LEN: usize = 50;
pub const MAX_CLASS_LEN: usize = 20;

// ===== 年级区间 =====
pub const MIN_GRADE: i64 = 1;
pub const MAX_GRADE: i64 = 12;

// ==========================================
// RowBuilder - 单行累积器
// ==========================================
struct RowBuilder {
    fields: RowFields,
    issues: Vec<Issue>,
}

impl RowBuilder {
    fn new() -> Self {
        Self {
            fields: RowFields::default(),
            issues: Vec::new(),
        }
    }

    /// 记录原始值并回传 trim 后的文字（空白回传 None）
    fn take_raw<'a>(&mut self, field: FieldId, raw: &'a str) -> Option<&'a str> {
        let value = raw.trim();
        if value.is_empty() {
            return None;
        }
        self.fields.raw.insert(field, value.to_string());
        Some(value)
    }

    fn required<'a>(&mut self, field: FieldId, label: &str, raw: &'a str) -> Option<&'a str> {
        let value = self.take_raw(field, raw);
        if value.is_none() {
            self.error(field, IssueCode::Required, format!("{}為必填", label));
        }
        value
    }

    /// 长度检查，通过则写入文字值
    fn text_within(&mut self, field: FieldId, label: &str, value: &str, max: usize) -> bool {
        if char_len(value) > max {
            self.error(
                field,
                IssueCode::MaxLength,
                format!("{}長度不可超過 {} 字", label, max),
            );
            return false;
        }
        self.set(field, FieldValue::Text(value.to_string()));
        true
    }

    fn set(&mut self, field: FieldId, value: FieldValue) {
        self.fields.parsed.insert(field, value);
    }

    fn error(&mut self, field: FieldId, code: IssueCode, message: String) {
        self.issues.push(Issue::error(field, code, message));
    }

    fn warning(&mut self, field: FieldId, code: IssueCode, message: String) {
        self.issues.push(Issue::warning(field, code, message));
    }

    fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.severity == Severity::Error)
    }

    fn finish(self, row_number: usize) -> RowOutcome {
        RowOutcome::new(row_number, self.fields, self.issues)
    }
}

// ==========================================
// StudentRowValidator - 学生名册
// ==========================================
// 栏位: 座號* | 姓名* | 性別* | 年級* | 班級 | 生日
#[derive(Debug, Default)]
pub struct StudentRowValidator {
    /// 座号 → 首次出现的列号
    seen_numbers: HashMap<String, usize>,
}

impl StudentRowValidator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RowValidator for StudentRowValidator {
    fn validate(&mut self, row_number: usize, cells: &[String]) -> RowOutcome {
        let mut row = RowBuilder::new();

        // 1. 座号
        if let Some(number) = row.required(FieldId::StudentNumber, "座號", cell_at(cells, 0)) {
            if row.text_within(FieldId::StudentNumber, "座號", number, MAX_STUDENT_NUMBER_LEN) {
                match self.seen_numbers.get(number) {
                    Some(first_row) => row.error(
                        FieldId::StudentNumber,
                        IssueCode::Duplicate,
                        format!("座號 {} 重複（與第 {} 列）", number, first_row),
                    ),
                    None => {
                        self.seen_numbers.insert(number.to_string(), row_number);
                    }
                }
            }
        }

        // 2. 姓名
        if let Some(name) = row.required(FieldId::Name, "姓名", cell_at(cells, 1)) {
            row.text_within(FieldId::Name, "姓名", name, MAX_NAME_LEN);
        }

        // 3. 性别
        if let Some(raw) = row.required(FieldId::Gender, "性別", cell_at(cells, 2)) {
            match normalize_gender(raw) {
                Some(gender) => row.set(FieldId::Gender, FieldValue::Gender(gender)),
                None => row.error(
                    FieldId::Gender,
                    IssueCode::InvalidValue,
                    "性別格式錯誤，請填寫「男」或「女」".to_string(),
                ),
            }
        }

        // 4. 年级
        if let Some(raw) = row.required(FieldId::Grade, "年級", cell_at(cells, 3)) {
            match parse_int(raw) {
                None => row.error(
                    FieldId::Grade,
                    IssueCode::InvalidType,
                    "年級必須為數字".to_string(),
                ),
                Some(grade) if !(MIN_GRADE..=MAX_GRADE).contains(&grade) => row.error(
                    FieldId::Grade,
                    IssueCode::InvalidValue,
                    format!("年級必須在 {}-{} 之間", MIN_GRADE, MAX_GRADE),
                ),
                Some(grade) => row.set(FieldId::Grade, FieldValue::Int(grade)),
            }
        }

        // 5. 班级（选填）
        if let Some(class_name) = row.take_raw(FieldId::Class, cell_at(cells, 4)) {
            row.text_within(FieldId::Class, "班級", class_name, MAX_CLASS_LEN);
        }

        // 6. 生日（选填）
        if let Some(raw) = row.take_raw(FieldId::BirthDate, cell_at(cells, 5)) {
            match parse_date(raw) {
                Some(date) => row.set(FieldId::BirthDate, FieldValue::Date(date)),
                None => row.error(
                    FieldId::BirthDate,
                    IssueCode::InvalidFormat,
                    "生日格式錯誤，請使用 YYYY/MM/DD".to_string(),
                ),
            }
        }

        row.finish(row_number)
    }
}

// ==========================================
// RecordRowValidator - 检测成绩
// ==========================================
// 栏位: 座號* | 姓名* | 6 项量测 | 測驗日期*
// 学生比对使用批次开始时载入的名册快照
#[derive(Debug)]
pub struct RecordRowValidator {
    /// "座号|姓名" → 范围内所有符合的 student_id
    roster: HashMap<String, Vec<i64>>,
    /// 各量测项目的合理区间
    ranges: HashMap<SportItem, ValueRange>,
    /// (座号, 姓名, 日期) → 首次出现的列号
    seen_keys: HashMap<(String, String, chrono::NaiveDate), usize>,
}

impl RecordRowValidator {
    /// 建立校验器
    ///
    /// # 参数
    /// - roster: 范围内学生快照
    /// - ranges: 合理区间（未提供的项目使用默认值）
    pub fn new(roster: &[Student], ranges: HashMap<SportItem, ValueRange>) -> Self {
        let mut by_key: HashMap<String, Vec<i64>> = HashMap::new();
        for student in roster {
            by_key.entry(student.natural_key()).or_default().push(student.id);
        }

        Self {
            roster: by_key,
            ranges,
            seen_keys: HashMap::new(),
        }
    }

    fn range_for(&self, item: SportItem) -> ValueRange {
        self.ranges
            .get(&item)
            .copied()
            .unwrap_or_else(|| item.default_range())
    }
}

impl RowValidator for RecordRowValidator {
    fn validate(&mut self, row_number: usize, cells: &[String]) -> RowOutcome {
        let mut row = RowBuilder::new();

        // 1. 座号 / 姓名
        let number = row.required(FieldId::StudentNumber, "座號", cell_at(cells, 0));
        if let Some(number) = number {
            row.set(FieldId::StudentNumber, FieldValue::Text(number.to_string()));
        }
        let name = row.required(FieldId::Name, "姓名", cell_at(cells, 1));
        if let Some(name) = name {
            row.set(FieldId::Name, FieldValue::Text(name.to_string()));
        }

        // 2. 学生比对
        if let (Some(number), Some(name)) = (number, name) {
            match self.roster.get(&natural_key(number, name)).map(Vec::as_slice) {
                Some([id]) => row.set(FieldId::Student, FieldValue::EntityId(*id)),
                Some(ids) if ids.len() > 1 => row.error(
                    FieldId::Student,
                    IssueCode::Ambiguous,
                    format!(
                        "座號 {} {} 對應到 {} 位學生，請指定年級或班級縮小範圍",
                        number,
                        name,
                        ids.len()
                    ),
                ),
                _ => row.error(
                    FieldId::Student,
                    IssueCode::NotFound,
                    format!("找不到學生: 座號 {} {}", number, name),
                ),
            }
        }

        // 3. 量测值
        let mut value_count = 0usize;
        for (offset, item) in SportItem::ALL.iter().enumerate() {
            let field = item.field();
            let Some(raw) = row.take_raw(field, cell_at(cells, 2 + offset)) else {
                continue;
            };

            match parse_float(raw) {
                None => row.error(
                    field,
                    IssueCode::InvalidType,
                    format!("{}必須為數字", item.label()),
                ),
                Some(value) => {
                    let range = self.range_for(*item);
                    if !range.contains(value) {
                        row.warning(
                            field,
                            IssueCode::OutOfRange,
                            format!(
                                "{}數值 {} 超出合理範圍（{}-{} {}）",
                                item.label(),
                                value,
                                range.min,
                                range.max,
                                item.unit()
                            ),
                        );
                    }
                    row.set(field, FieldValue::Float(value));
                    value_count += 1;
                }
            }
        }

        // 4. 测验日期
        let test_date = match row.required(FieldId::TestDate, "測驗日期", cell_at(cells, 8)) {
            Some(raw) => match parse_date(raw) {
                Some(date) => {
                    row.set(FieldId::TestDate, FieldValue::Date(date));
                    Some(date)
                }
                None => {
                    row.error(
                        FieldId::TestDate,
                        IssueCode::InvalidFormat,
                        "測驗日期格式錯誤，請使用 YYYY/MM/DD".to_string(),
                    );
                    None
                }
            },
            None => None,
        };

        // 5. 批次内重复（同一学生同一天）
        if let (Some(number), Some(name), Some(date)) = (number, name, test_date) {
            let key = (number.to_string(), name.to_string(), date);
            match self.seen_keys.get(&key) {
                Some(first_row) => row.error(
                    FieldId::Student,
                    IssueCode::Duplicate,
                    format!(
                        "座號 {} {} 於 {} 的成績重複（與第 {} 列）",
                        number,
                        name,
                        date.format("%Y/%m/%d"),
                        first_row
                    ),
                ),
                None => {
                    self.seen_keys.insert(key, row_number);
                }
            }
        }

        // 6. 无任何量测值
        if value_count == 0 && !row.has_errors() {
            row.warning(
                FieldId::Sports,
                IssueCode::NoData,
                "此列沒有任何檢測數據".to_string(),
            );
        }

        row.finish(row_number)
    }
}
