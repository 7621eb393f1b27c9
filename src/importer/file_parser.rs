// ==========================================
// 体适能检测纪录 - 文件解析器实现
// ==========================================
// 职责: 上传内容（bytes）→ RowSource
// 支持: Excel (.xlsx) / CSV (.csv)
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::import_trait::RowSource;
use calamine::{Data, Reader, Xlsx};
use csv::ReaderBuilder;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

// ==========================================
// 上传格式判断
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    Xlsx,
    Csv,
}

impl UploadFormat {
    /// 依副档名判断格式（不分大小写）
    pub fn from_file_name(file_name: &str) -> ImportResult<Self> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "xlsx" => Ok(UploadFormat::Xlsx),
            "csv" => Ok(UploadFormat::Csv),
            _ => Err(ImportError::UnsupportedFormat(file_name.to_string())),
        }
    }
}

/// 依副档名开启对应的 RowSource
pub fn open_row_source(file_name: &str, bytes: Vec<u8>) -> ImportResult<Box<dyn RowSource>> {
    match UploadFormat::from_file_name(file_name)? {
        UploadFormat::Xlsx => Ok(Box::new(ExcelRowSource::from_bytes(bytes)?)),
        UploadFormat::Csv => Ok(Box::new(CsvRowSource::from_bytes(&bytes)?)),
    }
}

/// 移除尾端全空白列
fn trim_trailing_blank_rows(rows: &mut Vec<Vec<String>>) {
    while rows
        .last()
        .map(|r| r.iter().all(|c| c.trim().is_empty()))
        .unwrap_or(false)
    {
        rows.pop();
    }
}

// ==========================================
// Excel RowSource 实现
// ==========================================
// 工作表在开启时一次读入（上传大小有上限）
pub struct ExcelRowSource {
    sheets: Vec<(String, Vec<Vec<String>>)>,
}

impl ExcelRowSource {
    pub fn from_bytes(bytes: Vec<u8>) -> ImportResult<Self> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;

        let mut sheets = Vec::new();
        for sheet_name in workbook.sheet_names() {
            let range = workbook.worksheet_range(&sheet_name)?;

            let mut rows: Vec<Vec<String>> = range
                .rows()
                .map(|row| row.iter().map(cell_to_string).collect())
                .collect();
            trim_trailing_blank_rows(&mut rows);

            debug!(sheet = %sheet_name, rows = rows.len(), "读取工作表");
            sheets.push((sheet_name, rows));
        }

        Ok(Self { sheets })
    }
}

impl RowSource for ExcelRowSource {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.clone()).collect()
    }

    fn rows(&self, sheet_name: &str) -> ImportResult<Vec<Vec<String>>> {
        self.sheets
            .iter()
            .find(|(name, _)| name == sheet_name)
            .map(|(_, rows)| rows.clone())
            .ok_or_else(|| ImportError::WorksheetNotFound(sheet_name.to_string()))
    }
}

/// 储存格 → 文字
///
/// - 整数值的浮点（3.0）输出为 "3"，避免年级等栏位带小数
/// - 日期储存格输出为 `YYYY/MM/DD`
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%Y/%m/%d").to_string())
            .unwrap_or_else(|| cell.to_string()),
        other => other.to_string(),
    }
}

// ==========================================
// CSV RowSource 实现
// ==========================================
// CSV 只有一张表，名称固定
pub const CSV_SHEET_NAME: &str = "Sheet1";

pub struct CsvRowSource {
    rows: Vec<Vec<String>>,
}

impl CsvRowSource {
    pub fn from_bytes(bytes: &[u8]) -> ImportResult<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .from_reader(bytes);

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            rows.push(
                record
                    .iter()
                    .map(|v| v.trim_start_matches('\u{feff}').trim().to_string())
                    .collect::<Vec<String>>(),
            );
        }
        trim_trailing_blank_rows(&mut rows);

        Ok(Self { rows })
    }
}

impl RowSource for CsvRowSource {
    fn sheet_names(&self) -> Vec<String> {
        vec![CSV_SHEET_NAME.to_string()]
    }

    fn rows(&self, sheet_name: &str) -> ImportResult<Vec<Vec<String>>> {
        if sheet_name != CSV_SHEET_NAME {
            return Err(ImportError::WorksheetNotFound(sheet_name.to_string()));
        }
        Ok(self.rows.clone())
    }
}

// ==========================================
// 内存 RowSource（程式化输入）
// ==========================================
pub struct MemoryRowSource {
    sheet_name: String,
    rows: Vec<Vec<String>>,
}

impl MemoryRowSource {
    pub fn new<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            sheet_name: CSV_SHEET_NAME.to_string(),
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(Into::into).collect())
                .collect(),
        }
    }
}

impl RowSource for MemoryRowSource {
    fn sheet_names(&self) -> Vec<String> {
        vec![self.sheet_name.clone()]
    }

    fn rows(&self, sheet_name: &str) -> ImportResult<Vec<Vec<String>>> {
        if sheet_name != self.sheet_name {
            return Err(ImportError::WorksheetNotFound(sheet_name.to_string()));
        }
        Ok(self.rows.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_format_by_extension() {
        assert_eq!(UploadFormat::from_file_name("a.xlsx").unwrap(), UploadFormat::Xlsx);
        assert_eq!(UploadFormat::from_file_name("A.XLSX").unwrap(), UploadFormat::Xlsx);
        assert_eq!(UploadFormat::from_file_name("b.csv").unwrap(), UploadFormat::Csv);
        assert!(matches!(
            UploadFormat::from_file_name("c.xls"),
            Err(ImportError::UnsupportedFormat(_))
        ));
        assert!(UploadFormat::from_file_name("noext").is_err());
    }

    #[test]
    fn test_csv_source_strips_bom_and_trailing_blank_rows() {
        let data = "\u{feff}座號*,姓名*\n1,王小明\n,\n\n".as_bytes();
        let source = CsvRowSource::from_bytes(data).unwrap();

        let rows = source.rows(CSV_SHEET_NAME).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "座號*");
        assert_eq!(rows[1], vec!["1".to_string(), "王小明".to_string()]);
    }

    #[test]
    fn test_csv_source_unknown_sheet() {
        let source = CsvRowSource::from_bytes(b"a,b\n1,2\n").unwrap();
        assert!(matches!(
            source.rows("Other"),
            Err(ImportError::WorksheetNotFound(_))
        ));
    }

    #[test]
    fn test_excel_source_rejects_non_zip_bytes() {
        let result = ExcelRowSource::from_bytes(b"not a workbook".to_vec());
        assert!(matches!(result, Err(ImportError::ExcelParseError(_))));
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&Data::Empty), "");
        assert_eq!(cell_to_string(&Data::Float(3.0)), "3");
        assert_eq!(cell_to_string(&Data::Float(130.5)), "130.5");
        assert_eq!(cell_to_string(&Data::Int(7)), "7");
        assert_eq!(cell_to_string(&Data::String(" 王小明 ".to_string())), "王小明");
    }
}
