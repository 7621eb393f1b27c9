// ==========================================
// 体适能检测纪录 - 字段解析器
// ==========================================
// 职责: 原始文字 → 类型值（日期/浮点/整数/性别）
// 红线: 纯函数，不产生 Issue，不做业务判断
// ==========================================

use crate::domain::types::Gender;
use chrono::NaiveDate;

/// 支持的日期格式（依序尝试）
///
/// chrono 的数字栏位可接受不补零写法，`2015/3/5` 与 `2015/03/05` 共用一个格式。
const DATE_FORMATS: &[&str] = &["%Y/%m/%d", "%Y-%m-%d", "%m/%d/%Y", "%Y年%m月%d日"];

/// 空白判断（trim 后为空）
pub fn is_blank(raw: &str) -> bool {
    raw.trim().is_empty()
}

/// 依栏位索引取值，越界视为空字串
pub fn cell_at(row: &[String], index: usize) -> &str {
    row.get(index).map(|s| s.trim()).unwrap_or("")
}

/// 以字元数计算长度（中文一个字算 1）
pub fn char_len(raw: &str) -> usize {
    raw.chars().count()
}

/// 解析日期
///
/// # 返回
/// - Some(NaiveDate): 任一格式解析成功
/// - None: 全部格式失败
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

/// 解析浮点数（拒绝 NaN / inf）
pub fn parse_float(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

/// 解析整数
///
/// 试算表常把整数存成 "3.0"，先按浮点解析，再要求无小数部分
pub fn parse_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(v);
    }

    let value = parse_float(trimmed)?;
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

/// 性别同义词正规化（不分大小写）
pub fn normalize_gender(raw: &str) -> Option<Gender> {
    match raw.trim().to_lowercase().as_str() {
        "男" | "male" | "m" | "1" => Some(Gender::Male),
        "女" | "female" | "f" | "2" => Some(Gender::Female),
        _ => None,
    }
}
