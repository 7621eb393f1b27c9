// ==========================================
// 体适能检测纪录 - 批次导入API
// ==========================================
// 职责: 上传检查 → 预览 → 提交；模板下载
// 说明: 供外层传输（HTTP / CLI）呼叫，本身不处理路由与授权
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportSettings};
use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::import::{CommitResult, ImportScope, Preview, RowOutcome};
use crate::domain::types::BatchKind;
use crate::importer::clock::{Clock, SystemClock};
use crate::importer::error::ImportError;
use crate::importer::file_parser::{open_row_source, UploadFormat};
use crate::importer::import_service::ImportService;
use crate::importer::preview_store::ReaperHandle;
use crate::importer::template;
use crate::repository::record_store::RecordStore;
use crate::repository::SqliteRecordStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// 预览响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewResponse {
    /// 预览句柄（提交时带回）
    pub preview_id: String,
    pub kind: BatchKind,
    pub file_name: String,
    pub school_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    pub total_rows: usize,
    pub valid_rows: usize,
    pub warning_rows: usize,
    pub error_rows: usize,
    /// 逐列结果（与文件列序一致）
    pub rows: Vec<RowOutcome>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub executed: bool,
}

impl From<&Preview> for PreviewResponse {
    fn from(p: &Preview) -> Self {
        Self {
            preview_id: p.handle.clone(),
            kind: p.kind,
            file_name: p.file_name.clone(),
            school_id: p.scope.school_id,
            grade: p.scope.grade,
            class_name: p.scope.class_name.clone(),
            total_rows: p.total,
            valid_rows: p.valid_count,
            warning_rows: p.warning_count,
            error_rows: p.error_count,
            rows: p.rows.clone(),
            created_at: p.created_at,
            expires_at: p.expires_at,
            executed: p.executed,
        }
    }
}

/// 导入API
pub struct ImportApi {
    service: ImportService<SqliteRecordStore>,
    reaper: tokio::sync::Mutex<Option<ReaperHandle>>,
}

impl ImportApi {
    /// 开启数据库并建立导入API（含背景清理任务）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（不存在时建立并初始化 schema）
    pub async fn new(db_path: &str) -> ApiResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| ApiError::DatabaseError(format!("数据库开启失败: {}", e)))?;
        init_schema(&conn).map_err(|e| ApiError::DatabaseError(format!("schema 初始化失败: {}", e)))?;
        let conn = Arc::new(Mutex::new(conn));

        let config = ConfigManager::from_connection(Arc::clone(&conn))
            .map_err(|e| ApiError::InternalError(format!("配置管理器建立失败: {}", e)))?;
        let settings = ImportSettings::load(&config)
            .await
            .map_err(|e| ApiError::InternalError(format!("配置载入失败: {}", e)))?;
        let store = SqliteRecordStore::from_connection(conn)?;

        let api = Self::with_parts(Arc::new(store), settings, Arc::new(SystemClock));
        api.start_reaper().await;
        info!(db_path, "导入API已就绪");
        Ok(api)
    }

    /// 由已建立的组件组装（不启动清理任务）
    pub fn with_parts(
        store: Arc<SqliteRecordStore>,
        settings: ImportSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            service: ImportService::new(store, settings, clock),
            reaper: tokio::sync::Mutex::new(None),
        }
    }

    pub fn service(&self) -> &ImportService<SqliteRecordStore> {
        &self.service
    }

    // ==========================================
    // 背景清理任务生命周期
    // ==========================================

    /// 启动过期预览清理任务（已启动则忽略）
    pub async fn start_reaper(&self) {
        let mut reaper = self.reaper.lock().await;
        if reaper.is_none() {
            *reaper = Some(ReaperHandle::spawn(
                self.service.previews(),
                self.service.settings().reaper_interval,
            ));
        }
    }

    /// 停止清理任务
    pub async fn shutdown(&self) {
        if let Some(reaper) = self.reaper.lock().await.take() {
            reaper.shutdown().await;
        }
    }

    // ==========================================
    // 上传检查
    // ==========================================

    /// 检查副档名与大小
    pub fn validate_upload(&self, file_name: &str, size: u64) -> ApiResult<UploadFormat> {
        let format = UploadFormat::from_file_name(file_name)?;
        let max = self.service.settings().max_upload_bytes;
        if size > max {
            return Err(ImportError::FileTooLarge { size, max }.into());
        }
        Ok(format)
    }

    fn stage_upload(
        &self,
        kind: BatchKind,
        file_name: &str,
        bytes: Vec<u8>,
        scope: ImportScope,
    ) -> ApiResult<PreviewResponse> {
        self.validate_upload(file_name, bytes.len() as u64)?;
        let source = open_row_source(file_name, bytes)?;
        let preview = self
            .service
            .stage(kind, source.as_ref(), file_name, scope)?;
        Ok(PreviewResponse::from(preview.as_ref()))
    }

    // ==========================================
    // 预览
    // ==========================================

    /// 预览学生名册导入
    ///
    /// # 参数
    /// - file_name: 原始档名（.xlsx / .csv）
    /// - bytes: 文件内容
    /// - school_id: 学校
    pub async fn preview_students_import(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        school_id: i64,
    ) -> ApiResult<PreviewResponse> {
        self.stage_upload(
            BatchKind::Students,
            file_name,
            bytes,
            ImportScope::school(school_id),
        )
    }

    /// 预览检测成绩导入
    ///
    /// # 参数
    /// - scope: 学校 + 选填的年级 / 班级（决定学生比对范围）
    pub async fn preview_records_import(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        scope: ImportScope,
    ) -> ApiResult<PreviewResponse> {
        self.stage_upload(BatchKind::Records, file_name, bytes, scope)
    }

    pub async fn get_preview(&self, preview_id: &str) -> ApiResult<PreviewResponse> {
        self.service
            .get(preview_id)
            .map(|p| PreviewResponse::from(p.as_ref()))
            .ok_or_else(|| ApiError::PreviewNotFound(preview_id.to_string()))
    }

    /// 取消预览
    pub async fn cancel_preview(&self, preview_id: &str) -> ApiResult<()> {
        if self.service.cancel(preview_id) {
            Ok(())
        } else {
            Err(ApiError::PreviewNotFound(preview_id.to_string()))
        }
    }

    /// 未过期的预览数量
    pub async fn preview_count(&self) -> usize {
        self.service.live_previews()
    }

    // ==========================================
    // 提交
    // ==========================================

    /// 提交预览
    ///
    /// # 参数
    /// - kind: 呼叫端预期的批次种类
    /// - preview_id: 预览句柄
    /// - include_warnings: 是否写入警告列
    ///
    /// # 返回
    /// - Err(PreviewNotFound): 不存在或已过期
    /// - Err(PreviewAlreadyExecuted): 重复执行（需重新上传）
    pub async fn execute_import(
        &self,
        kind: BatchKind,
        preview_id: &str,
        include_warnings: bool,
    ) -> ApiResult<CommitResult> {
        match self.service.execute_kind(kind, preview_id, include_warnings) {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!(preview_id, error = %e, "导入提交失败");
                Err(e.into())
            }
        }
    }

    // ==========================================
    // 模板
    // ==========================================

    pub async fn students_template(&self) -> ApiResult<Vec<u8>> {
        Ok(template::template_csv(BatchKind::Students)?)
    }

    /// 成绩模板；提供范围时预填该范围的学生名册
    pub async fn records_template(&self, scope: Option<ImportScope>) -> ApiResult<Vec<u8>> {
        let Some(scope) = scope else {
            return Ok(template::template_csv(BatchKind::Records)?);
        };

        if self.service.record_store().find_school(scope.school_id)?.is_none() {
            return Err(ApiError::SchoolNotFound(scope.school_id));
        }
        let roster = self.service.roster(&scope)?;
        Ok(template::records_template_for_roster(&roster)?)
    }
}
