// ==========================================
// 体适能检测纪录 - 导入服务
// ==========================================
// 职责: 对外接口 stage / get / cancel / execute
// 流程:
//   stage:   RowSource → BatchAssembler(RowValidator) → PreviewStore.put
//   execute: PreviewStore.try_claim → CommitExecutor(事务) → PreviewStore.mark_executed
// ==========================================

use crate::config::import_settings::ImportSettings;
use crate::domain::import::{CommitResult, ImportScope, Preview};
use crate::domain::student::{Student, StudentFilter};
use crate::domain::types::BatchKind;
use crate::importer::batch_assembler;
use crate::importer::clock::Clock;
use crate::importer::commit_executor::execute_commit;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::import_trait::{RowSource, RowValidator};
use crate::importer::preview_store::PreviewStore;
use crate::importer::row_validator::{RecordRowValidator, StudentRowValidator};
use crate::repository::record_store::RecordStore;
use std::sync::Arc;
use tracing::{info, instrument, warn};

// ==========================================
// ImportService
// ==========================================
pub struct ImportService<R: RecordStore> {
    record_store: Arc<R>,
    previews: Arc<PreviewStore>,
    clock: Arc<dyn Clock>,
    settings: ImportSettings,
}

impl<R: RecordStore> ImportService<R> {
    /// 创建导入服务
    ///
    /// # 参数
    /// - record_store: 纪录库
    /// - settings: 配置快照（预览有效期 / 合理区间）
    /// - clock: 时间来源
    pub fn new(record_store: Arc<R>, settings: ImportSettings, clock: Arc<dyn Clock>) -> Self {
        let previews = Arc::new(PreviewStore::new(settings.preview_ttl, Arc::clone(&clock)));
        Self {
            record_store,
            previews,
            clock,
            settings,
        }
    }

    /// 预览暂存区（供背景清理任务使用）
    pub fn previews(&self) -> &Arc<PreviewStore> {
        &self.previews
    }

    pub fn record_store(&self) -> &Arc<R> {
        &self.record_store
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// 载入范围内的学生名册
    pub fn roster(&self, scope: &ImportScope) -> ImportResult<Vec<Student>> {
        Ok(self.record_store.find_students(&StudentFilter {
            school_id: scope.school_id,
            grade: scope.grade,
            class_name: scope.class_name.clone(),
        })?)
    }

    // ==========================================
    // stage - 解析 + 校验 + 暂存
    // ==========================================

    /// 暂存一份上传文件
    ///
    /// # 返回
    /// - Ok(Preview): 完整预览（可能全部为错误列）
    /// - Err(SchoolNotFound): 学校不存在
    /// - Err(结构错误): 无工作表 / 无数据列 / 表头不符
    #[instrument(skip(self, source), fields(school_id = scope.school_id))]
    pub fn stage(
        &self,
        kind: BatchKind,
        source: &dyn RowSource,
        file_name: &str,
        scope: ImportScope,
    ) -> ImportResult<Arc<Preview>> {
        if self.record_store.find_school(scope.school_id)?.is_none() {
            return Err(ImportError::SchoolNotFound(scope.school_id));
        }

        let sheet = source
            .sheet_names()
            .into_iter()
            .next()
            .ok_or(ImportError::NoWorksheet)?;
        let rows = source.rows(&sheet)?;

        let mut validator: Box<dyn RowValidator> = match kind {
            BatchKind::Students => Box::new(StudentRowValidator::new()),
            BatchKind::Records => {
                // 名册快照：整批只查询一次
                let roster = self.roster(&scope)?;
                Box::new(RecordRowValidator::new(
                    &roster,
                    self.settings.sport_ranges.clone(),
                ))
            }
        };

        let preview = batch_assembler::assemble(
            kind,
            file_name,
            scope,
            &rows,
            validator.as_mut(),
            self.clock.now(),
        )?;
        let preview = self.previews.put(preview);

        info!(
            handle = %preview.handle,
            kind = %kind,
            file_name,
            total = preview.total,
            valid = preview.valid_count,
            warning = preview.warning_count,
            error = preview.error_count,
            "预览已暂存"
        );
        Ok(preview)
    }

    // ==========================================
    // get / cancel
    // ==========================================

    pub fn get(&self, handle: &str) -> Option<Arc<Preview>> {
        self.previews.get(handle)
    }

    /// 取消预览
    pub fn cancel(&self, handle: &str) -> bool {
        let removed = self.previews.delete(handle);
        if removed {
            info!(handle, "预览已取消");
        }
        removed
    }

    /// 未过期的预览数量
    pub fn live_previews(&self) -> usize {
        self.previews.count()
    }

    // ==========================================
    // execute - 提交
    // ==========================================

    /// 提交预览（不检查批次种类）
    ///
    /// # 返回
    /// - Err(PreviewNotFound): 不存在或已过期
    /// - Err(PreviewAlreadyExecuted / CommitInProgress): 重复执行
    /// - Err(Storage): 事务失败，预览回到可执行状态
    pub fn execute(&self, handle: &str, include_warnings: bool) -> ImportResult<CommitResult> {
        self.execute_inner(None, handle, include_warnings)
    }

    /// 提交预览，并要求批次种类相符
    pub fn execute_kind(
        &self,
        kind: BatchKind,
        handle: &str,
        include_warnings: bool,
    ) -> ImportResult<CommitResult> {
        self.execute_inner(Some(kind), handle, include_warnings)
    }

    #[instrument(skip(self))]
    fn execute_inner(
        &self,
        expected_kind: Option<BatchKind>,
        handle: &str,
        include_warnings: bool,
    ) -> ImportResult<CommitResult> {
        let preview = self.previews.try_claim(handle)?;

        if let Some(expected) = expected_kind {
            if preview.kind != expected {
                self.previews.release(handle);
                return Err(ImportError::BatchKindMismatch {
                    expected,
                    actual: preview.kind,
                });
            }
        }

        let result = match execute_commit(
            self.record_store.as_ref(),
            &preview,
            include_warnings,
            self.clock.now(),
        ) {
            Ok(result) => result,
            Err(e) => {
                self.previews.release(handle);
                warn!(handle, error = %e, "提交失败，预览保留可重试");
                return Err(e);
            }
        };

        if !self.previews.mark_executed(handle) {
            // 事务已提交；暂存区项目已过期，后续查询回传不存在
            warn!(handle, "提交完成时预览已过期，无法标记执行");
        }

        info!(
            handle,
            kind = %preview.kind,
            success = result.success_count,
            skipped = result.skipped_count,
            records = result.records_created,
            "预览已提交"
        );
        Ok(result)
    }
}
