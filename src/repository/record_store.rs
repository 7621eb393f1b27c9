// ==========================================
// 体适能检测纪录 - 纪录库 Trait
// ==========================================
// 职责: 定义导入所需的数据访问接口（不包含实现）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::student::{NewSportRecord, NewStudent, School, Student, StudentFilter};
use crate::repository::error::RepositoryResult;

// ==========================================
// RecordWriter Trait
// ==========================================
// 用途: 事务内的写入操作；随事务提交或回滚
pub trait RecordWriter {
    /// 建立学生，回传新 id
    fn create_student(&mut self, student: &NewStudent) -> RepositoryResult<i64>;

    /// 建立检测纪录，回传新 id
    fn create_sport_record(&mut self, record: &NewSportRecord) -> RepositoryResult<i64>;
}

// ==========================================
// RecordStore Trait
// ==========================================
// 实现者: SqliteRecordStore（使用 rusqlite）
pub trait RecordStore: Send + Sync {
    fn find_school(&self, school_id: i64) -> RepositoryResult<Option<School>>;

    /// 依范围查询学生（名册快照）
    fn find_students(&self, filter: &StudentFilter) -> RepositoryResult<Vec<Student>>;

    /// 在单一事务中执行写入
    ///
    /// # 返回
    /// - Ok(()): `work` 成功且事务已提交
    /// - Err: `work` 失败或提交失败（整个事务回滚）
    fn transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn RecordWriter) -> RepositoryResult<()>,
    ) -> RepositoryResult<()>;
}
