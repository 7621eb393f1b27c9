// ==========================================
// 体适能检测纪录 - 导入管道 Trait
// ==========================================
// 职责: 定义数据来源与行校验接口（不包含实现）
// ==========================================

use crate::domain::import::RowOutcome;
use crate::importer::error::ImportResult;

// ==========================================
// RowSource Trait
// ==========================================
// 用途: 上传文件 → 有序的原始文字列（第 0 列为表头）
// 实现者: ExcelRowSource / CsvRowSource / MemoryRowSource
pub trait RowSource: Send + Sync {
    /// 工作表名称（依文件顺序）
    fn sheet_names(&self) -> Vec<String>;

    /// 读取指定工作表的所有列
    ///
    /// # 返回
    /// - Ok(Vec<Vec<String>>): 含表头；尾端全空白列已移除
    /// - Err: 工作表不存在
    fn rows(&self, sheet_name: &str) -> ImportResult<Vec<Vec<String>>>;
}

// ==========================================
// RowValidator Trait
// ==========================================
// 用途: 单行规则评估；实现者可持有批次范围状态（重复检测、名册快照）
// 实现者: StudentRowValidator / RecordRowValidator
pub trait RowValidator {
    /// 校验一列
    ///
    /// # 参数
    /// - row_number: 试算表列号（从 2 开始）
    /// - cells: 原始储存格
    fn validate(&mut self, row_number: usize, cells: &[String]) -> RowOutcome;
}
