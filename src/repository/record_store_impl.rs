// ==========================================
// 体适能检测纪录 - 纪录库 Repository 实现
// ==========================================
// 职责: 实现 RecordStore（使用 rusqlite）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::db::{configure_sqlite_connection, open_sqlite_connection};
use crate::domain::student::{
    NewSportRecord, NewStudent, School, SportRecord, Student, StudentFilter,
};
use crate::domain::types::Gender;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::record_store::{RecordStore, RecordWriter};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

// ==========================================
// SqliteRecordStore
// ==========================================
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建（会再次套用统一 PRAGMA，幂等）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            configure_sqlite_connection(&guard)?;
        }
        Ok(Self { conn })
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(format!("锁获取失败: {}", e)))
    }

    // ===== 维护用查询（非导入流程）=====

    /// 建立学校，回传新 id
    pub fn create_school(&self, name: &str, county: Option<&str>) -> RepositoryResult<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO schools (name, county) VALUES (?1, ?2)",
            params![name, county],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 查询学生的检测纪录（依日期、项目排序）
    pub fn list_sport_records(&self, student_id: i64) -> RepositoryResult<Vec<SportRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, student_id, sport_type_id, value, test_date, notes, created_at
            FROM sport_records
            WHERE student_id = ?1
            ORDER BY test_date, sport_type_id, id
            "#,
        )?;

        let rows = stmt.query_map(params![student_id], |row| {
            Ok(SportRecord {
                id: row.get(0)?,
                student_id: row.get(1)?,
                sport_type_id: row.get(2)?,
                value: row.get(3)?,
                test_date: row.get(4)?,
                notes: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?;

        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }

    pub fn count_students(&self, school_id: i64) -> RepositoryResult<i64> {
        let conn = self.lock()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM students WHERE school_id = ?1",
            params![school_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn count_sport_records(&self) -> RepositoryResult<i64> {
        let conn = self.lock()?;
        let count = conn.query_row("SELECT COUNT(*) FROM sport_records", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// 学生查询的原始列（gender 仍为文字）
type StudentRow = (
    i64,
    i64,
    String,
    String,
    String,
    i32,
    Option<String>,
    Option<NaiveDate>,
);

fn student_from_row(row: StudentRow) -> RepositoryResult<Student> {
    let (id, school_id, student_number, name, gender, grade, class_name, birth_date) = row;
    let gender = Gender::from_db_str(&gender).ok_or_else(|| RepositoryError::FieldValueError {
        field: "gender".to_string(),
        message: format!("student id={} 性别值无法识别: {}", id, gender),
    })?;

    Ok(Student {
        id,
        school_id,
        student_number,
        name,
        gender,
        grade,
        class_name,
        birth_date,
    })
}

impl RecordStore for SqliteRecordStore {
    fn find_school(&self, school_id: i64) -> RepositoryResult<Option<School>> {
        let conn = self.lock()?;
        let school = conn
            .query_row(
                "SELECT id, name, county FROM schools WHERE id = ?1",
                params![school_id],
                |row| {
                    Ok(School {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        county: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(school)
    }

    fn find_students(&self, filter: &StudentFilter) -> RepositoryResult<Vec<Student>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, school_id, student_number, name, gender, grade, class_name, birth_date
            FROM students
            WHERE school_id = ?1
              AND (?2 IS NULL OR grade = ?2)
              AND (?3 IS NULL OR class_name = ?3)
            ORDER BY grade, class_name, CAST(student_number AS INTEGER), student_number
            "#,
        )?;

        let rows = stmt.query_map(
            params![filter.school_id, filter.grade, filter.class_name],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                ))
            },
        )?;

        let mut students = Vec::new();
        for row in rows {
            students.push(student_from_row(row?)?);
        }

        debug!(
            school_id = filter.school_id,
            grade = ?filter.grade,
            class_name = ?filter.class_name,
            count = students.len(),
            "载入学生名册"
        );
        Ok(students)
    }

    fn transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn RecordWriter) -> RepositoryResult<()>,
    ) -> RepositoryResult<()> {
        let conn = self.lock()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        {
            let mut writer = SqliteRecordWriter {
                conn: &tx,
                created_at: Utc::now(),
            };
            if let Err(e) = work(&mut writer) {
                // tx 离开作用域时自动回滚
                warn!(error = %e, "写入失败，事务回滚");
                return Err(e);
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }
}

// ==========================================
// SqliteRecordWriter - 事务内写入
// ==========================================
struct SqliteRecordWriter<'a> {
    conn: &'a Connection,
    created_at: DateTime<Utc>,
}

impl RecordWriter for SqliteRecordWriter<'_> {
    fn create_student(&mut self, student: &NewStudent) -> RepositoryResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO students (
                school_id, student_number, name, gender, grade, class_name, birth_date, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                student.school_id,
                student.student_number,
                student.name,
                student.gender.as_db_str(),
                student.grade,
                student.class_name,
                student.birth_date,
                self.created_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn create_sport_record(&mut self, record: &NewSportRecord) -> RepositoryResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO sport_records (
                student_id, sport_type_id, value, test_date, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.student_id,
                record.sport_type_id,
                record.value,
                record.test_date,
                record.notes,
                self.created_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn memory_store() -> SqliteRecordStore {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        SqliteRecordStore::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    fn new_student(school_id: i64, number: &str, grade: i32) -> NewStudent {
        NewStudent {
            school_id,
            student_number: number.to_string(),
            name: format!("學生{}", number),
            gender: Gender::Female,
            grade,
            class_name: Some("甲".to_string()),
            birth_date: NaiveDate::from_ymd_opt(2015, 3, 15),
        }
    }

    #[test]
    fn test_find_school() {
        let store = memory_store();
        let id = store.create_school("測試國小", Some("臺北市")).unwrap();

        let school = store.find_school(id).unwrap().unwrap();
        assert_eq!(school.name, "測試國小");
        assert!(store.find_school(id + 100).unwrap().is_none());
    }

    #[test]
    fn test_transaction_commit_and_filter() {
        let store = memory_store();
        let school_id = store.create_school("測試國小", None).unwrap();

        store
            .transaction(&mut |w: &mut dyn RecordWriter| {
                w.create_student(&new_student(school_id, "1", 3))?;
                w.create_student(&new_student(school_id, "2", 3))?;
                w.create_student(&new_student(school_id, "1", 4))?;
                Ok(())
            })
            .unwrap();

        let all = store
            .find_students(&StudentFilter {
                school_id,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(all.len(), 3);

        let grade3 = store
            .find_students(&StudentFilter {
                school_id,
                grade: Some(3),
                class_name: Some("甲".to_string()),
            })
            .unwrap();
        assert_eq!(grade3.len(), 2);
        assert_eq!(grade3[0].birth_date, NaiveDate::from_ymd_opt(2015, 3, 15));
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let store = memory_store();
        let school_id = store.create_school("測試國小", None).unwrap();

        let result = store.transaction(&mut |w: &mut dyn RecordWriter| {
            w.create_student(&new_student(school_id, "1", 3))?;
            // 同校同班同座号违反唯一约束
            w.create_student(&new_student(school_id, "1", 3))?;
            Ok(())
        });

        assert!(matches!(
            result,
            Err(RepositoryError::UniqueConstraintViolation(_))
        ));
        assert_eq!(store.count_students(school_id).unwrap(), 0);
    }

    #[test]
    fn test_sport_record_round_trip() {
        let store = memory_store();
        let school_id = store.create_school("測試國小", None).unwrap();
        let mut student_id = 0;

        store
            .transaction(&mut |w: &mut dyn RecordWriter| {
                student_id = w.create_student(&new_student(school_id, "1", 3))?;
                w.create_sport_record(&NewSportRecord {
                    student_id,
                    sport_type_id: 1,
                    value: 130.5,
                    test_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
                    notes: Some("批次匯入 - a.csv".to_string()),
                })?;
                Ok(())
            })
            .unwrap();

        let records = store.list_sport_records(student_id).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, 130.5);
        assert_eq!(records[0].notes.as_deref(), Some("批次匯入 - a.csv"));
        assert_eq!(store.count_sport_records().unwrap(), 1);
    }
}
