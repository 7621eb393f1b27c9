// ==========================================
// 体适能检测纪录 - 学校 / 学生 / 检测纪录实体
// ==========================================
// 职责: 纪录库读写所用的实体与写入参数
// ==========================================

use crate::domain::types::Gender;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct School {
    pub id: i64,
    pub name: String,
    pub county: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub school_id: i64,
    pub student_number: String,
    pub name: String,
    pub gender: Gender,
    pub grade: i32,
    pub class_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

impl Student {
    /// 成绩比对使用的自然键: "座号|姓名"
    pub fn natural_key(&self) -> String {
        natural_key(&self.student_number, &self.name)
    }
}

pub fn natural_key(student_number: &str, name: &str) -> String {
    format!("{}|{}", student_number, name)
}

/// 学生查询条件（grade/class 为 None 表示不过滤）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentFilter {
    pub school_id: i64,
    pub grade: Option<i32>,
    pub class_name: Option<String>,
}

// ==========================================
// 写入参数
// ==========================================

#[derive(Debug, Clone, PartialEq)]
pub struct NewStudent {
    pub school_id: i64,
    pub student_number: String,
    pub name: String,
    pub gender: Gender,
    pub grade: i32,
    pub class_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSportRecord {
    pub student_id: i64,
    pub sport_type_id: i64,
    pub value: f64,
    pub test_date: NaiveDate,
    pub notes: Option<String>,
}

/// 已写入的检测纪录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SportRecord {
    pub id: i64,
    pub student_id: i64,
    pub sport_type_id: i64,
    pub value: f64,
    pub test_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
