// ==========================================
// 体适能检测纪录 - 领域类型定义
// ==========================================
// 职责: 批次种类、行状态、问题码、字段标识等封闭枚举
// 红线: 问题码与严重度是对外契约，消息文字不是
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 批次种类 (Batch Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    Students, // 学生名册（建立实体）
    Records,  // 检测成绩（建立量测纪录）
}

impl BatchKind {
    /// 模板表头（带 `*` 的为必填栏位）
    pub fn expected_headers(&self) -> &'static [&'static str] {
        match self {
            BatchKind::Students => &["座號*", "姓名*", "性別*", "年級*", "班級", "生日"],
            BatchKind::Records => &[
                "座號*",
                "姓名*",
                "身高(cm)",
                "體重(kg)",
                "坐姿體前彎(cm)",
                "立定跳遠(cm)",
                "仰臥起坐(次/分鐘)",
                "心肺耐力(秒)",
                "測驗日期*",
            ],
        }
    }

    /// 表头校验时必须逐一比对的前 N 栏
    pub fn checked_header_columns(&self) -> usize {
        match self {
            BatchKind::Students => 4,
            BatchKind::Records => 2,
        }
    }
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchKind::Students => write!(f, "students"),
            BatchKind::Records => write!(f, "records"),
        }
    }
}

impl std::str::FromStr for BatchKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "students" | "student" => Ok(BatchKind::Students),
            "records" | "record" | "sports" => Ok(BatchKind::Records),
            other => Err(format!("未知的批次种类: {}", other)),
        }
    }
}

// ==========================================
// 严重度 (Severity)
// ==========================================
// Ord: Warning < Error，取最大值即为行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

// ==========================================
// 行状态 (Row Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Valid,
    Warning,
    Error,
}

impl RowStatus {
    /// 由最严重的问题决定行状态，与发现顺序无关
    pub fn from_severities<I>(severities: I) -> Self
    where
        I: IntoIterator<Item = Severity>,
    {
        match severities.into_iter().max() {
            Some(Severity::Error) => RowStatus::Error,
            Some(Severity::Warning) => RowStatus::Warning,
            None => RowStatus::Valid,
        }
    }

    /// 与该状态对应的问题严重度（Valid 无对应）
    pub fn severity(&self) -> Option<Severity> {
        match self {
            RowStatus::Valid => None,
            RowStatus::Warning => Some(Severity::Warning),
            RowStatus::Error => Some(Severity::Error),
        }
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowStatus::Valid => write!(f, "valid"),
            RowStatus::Warning => write!(f, "warning"),
            RowStatus::Error => write!(f, "error"),
        }
    }
}

// ==========================================
// 问题码 (Issue Code)
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE（对外稳定）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    Required,      // 必填栏位缺失
    InvalidType,   // 类型错误（非数字）
    InvalidValue,  // 枚举值无法识别
    InvalidFormat, // 格式错误（日期）
    MaxLength,     // 超过长度上限
    OutOfRange,    // 超出合理区间（警告）
    Duplicate,     // 批次内重复
    NotFound,      // 引用实体不存在
    Ambiguous,     // 引用对应到多个实体
    NoData,        // 无任何量测值（警告）
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::Required => "REQUIRED",
            IssueCode::InvalidType => "INVALID_TYPE",
            IssueCode::InvalidValue => "INVALID_VALUE",
            IssueCode::InvalidFormat => "INVALID_FORMAT",
            IssueCode::MaxLength => "MAX_LENGTH",
            IssueCode::OutOfRange => "OUT_OF_RANGE",
            IssueCode::Duplicate => "DUPLICATE",
            IssueCode::NotFound => "NOT_FOUND",
            IssueCode::Ambiguous => "AMBIGUOUS",
            IssueCode::NoData => "NO_DATA",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 性别 (Gender)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// 数据库存储值
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            _ => None,
        }
    }
}

// ==========================================
// 字段标识 (Field Id)
// ==========================================
// 封闭集合：行内字段 + 两个逻辑字段（student: 实体比对, sports: 量测整体）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldId {
    StudentNumber,
    Name,
    Gender,
    Grade,
    Class,
    BirthDate,
    Height,
    Weight,
    SitReach,
    StandingJump,
    SitUps,
    Cardio,
    TestDate,
    Student,
    Sports,
}

impl FieldId {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldId::StudentNumber => "student_number",
            FieldId::Name => "name",
            FieldId::Gender => "gender",
            FieldId::Grade => "grade",
            FieldId::Class => "class",
            FieldId::BirthDate => "birth_date",
            FieldId::Height => "height",
            FieldId::Weight => "weight",
            FieldId::SitReach => "sit_reach",
            FieldId::StandingJump => "standing_jump",
            FieldId::SitUps => "sit_ups",
            FieldId::Cardio => "cardio",
            FieldId::TestDate => "test_date",
            FieldId::Student => "student",
            FieldId::Sports => "sports",
        }
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 解析值 (Field Value)
// ==========================================
// 行内已解析字段的标签联合，提交阶段不再重新解析
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Gender(Gender),
    EntityId(i64),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_gender(&self) -> Option<Gender> {
        match self {
            FieldValue::Gender(g) => Some(*g),
            _ => None,
        }
    }

    pub fn as_entity_id(&self) -> Option<i64> {
        match self {
            FieldValue::EntityId(id) => Some(*id),
            _ => None,
        }
    }
}

// ==========================================
// 合理区间 (Value Range)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// 闭区间判断
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// 解析配置值 "min,max"
    pub fn parse(raw: &str) -> Option<Self> {
        let (min, max) = raw.split_once(',')?;
        let min: f64 = min.trim().parse().ok()?;
        let max: f64 = max.trim().parse().ok()?;
        if min.is_finite() && max.is_finite() && min <= max {
            Some(Self { min, max })
        } else {
            None
        }
    }
}

// ==========================================
// 检测项目 (Sport Item)
// ==========================================
// sport_type_id 与 sport_types 表种子数据一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SportItem {
    Height,
    Weight,
    SitReach,
    StandingJump,
    SitUps,
    Cardio,
}

impl SportItem {
    /// 模板栏位顺序（第 3 到第 8 栏）
    pub const ALL: [SportItem; 6] = [
        SportItem::Height,
        SportItem::Weight,
        SportItem::SitReach,
        SportItem::StandingJump,
        SportItem::SitUps,
        SportItem::Cardio,
    ];

    pub fn field(&self) -> FieldId {
        match self {
            SportItem::Height => FieldId::Height,
            SportItem::Weight => FieldId::Weight,
            SportItem::SitReach => FieldId::SitReach,
            SportItem::StandingJump => FieldId::StandingJump,
            SportItem::SitUps => FieldId::SitUps,
            SportItem::Cardio => FieldId::Cardio,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SportItem::Height => "身高",
            SportItem::Weight => "體重",
            SportItem::SitReach => "坐姿體前彎",
            SportItem::StandingJump => "立定跳遠",
            SportItem::SitUps => "仰臥起坐",
            SportItem::Cardio => "心肺耐力",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            SportItem::Height | SportItem::SitReach | SportItem::StandingJump => "cm",
            SportItem::Weight => "kg",
            SportItem::SitUps => "次/分鐘",
            SportItem::Cardio => "秒",
        }
    }

    pub fn sport_type_id(&self) -> i64 {
        match self {
            SportItem::Height => 1,
            SportItem::Weight => 2,
            SportItem::SitReach => 3,
            SportItem::StandingJump => 4,
            SportItem::SitUps => 5,
            SportItem::Cardio => 6,
        }
    }

    /// 配置键后缀（sport_range/{key}）
    pub fn config_key(&self) -> &'static str {
        self.field().as_str()
    }

    /// 默认合理区间
    pub fn default_range(&self) -> ValueRange {
        match self {
            SportItem::Height => ValueRange::new(80.0, 250.0),
            SportItem::Weight => ValueRange::new(10.0, 200.0),
            SportItem::SitReach => ValueRange::new(-30.0, 60.0),
            SportItem::StandingJump => ValueRange::new(20.0, 350.0),
            SportItem::SitUps => ValueRange::new(0.0, 100.0),
            SportItem::Cardio => ValueRange::new(60.0, 1800.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_status_takes_most_severe() {
        assert_eq!(RowStatus::from_severities([]), RowStatus::Valid);
        assert_eq!(
            RowStatus::from_severities([Severity::Warning, Severity::Warning]),
            RowStatus::Warning
        );
        assert_eq!(
            RowStatus::from_severities([Severity::Warning, Severity::Error]),
            RowStatus::Error
        );
        assert_eq!(
            RowStatus::from_severities([Severity::Error, Severity::Warning]),
            RowStatus::Error
        );
    }

    #[test]
    fn test_issue_code_serialization() {
        let json = serde_json::to_string(&IssueCode::OutOfRange).unwrap();
        assert_eq!(json, "\"OUT_OF_RANGE\"");
        assert_eq!(IssueCode::NoData.to_string(), "NO_DATA");
    }

    #[test]
    fn test_value_range_parse() {
        assert_eq!(ValueRange::parse("80, 250"), Some(ValueRange::new(80.0, 250.0)));
        assert_eq!(ValueRange::parse("-30,60"), Some(ValueRange::new(-30.0, 60.0)));
        assert_eq!(ValueRange::parse("250,80"), None);
        assert_eq!(ValueRange::parse("abc"), None);
    }

    #[test]
    fn test_sport_item_ids_are_distinct() {
        let mut ids: Vec<i64> = SportItem::ALL.iter().map(|s| s.sport_type_id()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_batch_kind_from_str() {
        assert_eq!("Students".parse::<BatchKind>(), Ok(BatchKind::Students));
        assert_eq!("records".parse::<BatchKind>(), Ok(BatchKind::Records));
        assert!("plans".parse::<BatchKind>().is_err());
    }
}
