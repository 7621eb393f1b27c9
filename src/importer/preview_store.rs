// ==========================================
// 体适能检测纪录 - 预览暂存区
// ==========================================
// 职责: handle → Preview 的 TTL 快取 + 执行旗标 + 背景清理
// 并发: 单一 RwLock 保护整个 map，清理任务取同一把锁
// 状态: Pending → Committing → Executed（Committing 失败时回到 Pending）
// ==========================================

use crate::domain::import::Preview;
use crate::importer::clock::Clock;
use crate::importer::error::{ImportError, ImportResult};
use chrono::Duration;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 默认预览有效期（15 分钟）
pub const DEFAULT_PREVIEW_TTL_SECS: i64 = 15 * 60;

/// 默认清理间隔（5 分钟）
pub const DEFAULT_REAPER_INTERVAL_SECS: u64 = 5 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommitState {
    Pending,
    Committing,
    Executed,
}

#[derive(Debug)]
struct StoreEntry {
    preview: Arc<Preview>,
    state: CommitState,
}

// 执行旗标只记在 StoreEntry.state；读出时才反映到副本上，写锁内不复制预览
fn with_commit_state(preview: Arc<Preview>, state: CommitState) -> Arc<Preview> {
    if state == CommitState::Executed && !preview.executed {
        let mut copy = Preview::clone(&preview);
        copy.executed = true;
        Arc::new(copy)
    } else {
        preview
    }
}

// ==========================================
// PreviewStore
// ==========================================
pub struct PreviewStore {
    entries: RwLock<HashMap<String, StoreEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl PreviewStore {
    /// 建立暂存区
    ///
    /// # 参数
    /// - ttl: 预览有效期
    /// - clock: 时间来源
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // 锁中毒时沿用内部数据：map 上的每次修改都是单一步骤，不会留下半完成状态
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, StoreEntry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, StoreEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    /// 存入预览，标记建立与过期时间
    pub fn put(&self, mut preview: Preview) -> Arc<Preview> {
        let now = self.clock.now();
        preview.created_at = now;
        preview.expires_at = now + self.ttl;
        preview.executed = false;

        let preview = Arc::new(preview);
        let handle = preview.handle.clone();
        self.write().insert(
            handle,
            StoreEntry {
                preview: Arc::clone(&preview),
                state: CommitState::Pending,
            },
        );
        preview
    }

    /// 读取未过期的预览（过期但尚未清理的视为不存在）
    pub fn get(&self, handle: &str) -> Option<Arc<Preview>> {
        let now = self.clock.now();
        let found = self
            .read()
            .get(handle)
            .filter(|e| !e.preview.is_expired_at(now))
            .map(|e| (Arc::clone(&e.preview), e.state));

        found.map(|(preview, state)| with_commit_state(preview, state))
    }

    /// 删除预览（含已过期但尚未清理的项目）
    ///
    /// # 返回
    /// - true: 有项目被移除
    /// - false: 不存在
    pub fn delete(&self, handle: &str) -> bool {
        self.write().remove(handle).is_some()
    }

    /// 取得执行权
    ///
    /// 未过期、未执行且没有其他执行中的呼叫时，转为 Committing 并回传预览
    pub fn try_claim(&self, handle: &str) -> ImportResult<Arc<Preview>> {
        let now = self.clock.now();
        let mut entries = self.write();

        let entry = entries
            .get_mut(handle)
            .filter(|e| !e.preview.is_expired_at(now))
            .ok_or_else(|| ImportError::PreviewNotFound(handle.to_string()))?;

        match entry.state {
            CommitState::Executed => Err(ImportError::PreviewAlreadyExecuted(handle.to_string())),
            CommitState::Committing => Err(ImportError::CommitInProgress(handle.to_string())),
            CommitState::Pending => {
                entry.state = CommitState::Committing;
                Ok(Arc::clone(&entry.preview))
            }
        }
    }

    /// 释放执行权（提交失败时呼叫），Executed 不会被还原
    pub fn release(&self, handle: &str) {
        if let Some(entry) = self.write().get_mut(handle) {
            if entry.state == CommitState::Committing {
                entry.state = CommitState::Pending;
            }
        }
    }

    /// 标记已执行
    ///
    /// # 返回
    /// - true: 成功标记
    /// - false: 不存在或已过期
    pub fn mark_executed(&self, handle: &str) -> bool {
        let now = self.clock.now();
        let mut entries = self.write();

        match entries.get_mut(handle) {
            Some(entry) if !entry.preview.is_expired_at(now) => {
                entry.state = CommitState::Executed;
                true
            }
            _ => false,
        }
    }

    pub fn is_executed(&self, handle: &str) -> bool {
        self.read()
            .get(handle)
            .map(|e| e.state == CommitState::Executed)
            .unwrap_or(false)
    }

    /// 清除所有过期预览
    ///
    /// # 返回
    /// - 清除的笔数
    pub fn reap_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, e| !e.preview.is_expired_at(now));
        before - entries.len()
    }

    /// 未过期的预览数量
    pub fn count(&self) -> usize {
        let now = self.clock.now();
        self.read()
            .values()
            .filter(|e| !e.preview.is_expired_at(now))
            .count()
    }

    /// map 内的实际笔数（含过期未清理）
    pub fn stored_entries(&self) -> usize {
        self.read().len()
    }
}

// ==========================================
// ReaperHandle - 背景清理任务
// ==========================================
// 任务持有 Weak 引用；暂存区释放后自行结束
pub struct ReaperHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl ReaperHandle {
    /// 启动清理任务（需在 tokio runtime 内呼叫）
    pub fn spawn(store: &Arc<PreviewStore>, interval: std::time::Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let store: Weak<PreviewStore> = Arc::downgrade(store);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(store) = store.upgrade() else {
                            debug!("预览暂存区已释放，清理任务结束");
                            break;
                        };
                        let removed = store.reap_expired();
                        if removed > 0 {
                            info!(removed, remaining = store.stored_entries(), "清理过期预览");
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        info!(interval_secs = interval.as_secs(), "预览清理任务已启动");
        Self {
            shutdown_tx,
            task: Some(task),
        }
    }

    /// 停止清理任务并等待结束
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "预览清理任务异常结束");
            }
        }
        info!("预览清理任务已停止");
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map(|t| t.is_finished()).unwrap_or(true)
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::import::ImportScope;
    use crate::domain::types::BatchKind;
    use crate::importer::clock::ManualClock;
    use chrono::Utc;

    fn preview(handle: &str) -> Preview {
        let now = Utc::now();
        Preview {
            handle: handle.to_string(),
            kind: BatchKind::Students,
            scope: ImportScope::school(1),
            file_name: "a.csv".to_string(),
            rows: vec![],
            total: 0,
            valid_count: 0,
            warning_count: 0,
            error_count: 0,
            created_at: now,
            expires_at: now,
            executed: false,
        }
    }

    fn store() -> (Arc<ManualClock>, PreviewStore) {
        let clock = Arc::new(ManualClock::default());
        let store = PreviewStore::new(Duration::minutes(15), clock.clone());
        (clock, store)
    }

    #[test]
    fn test_put_stamps_expiry() {
        let (clock, store) = store();
        let stored = store.put(preview("h1"));

        assert_eq!(stored.created_at, clock.now());
        assert_eq!(stored.expires_at - stored.created_at, Duration::minutes(15));
        assert!(store.get("h1").is_some());
    }

    #[test]
    fn test_get_treats_expired_as_absent_before_reaping() {
        let (clock, store) = store();
        store.put(preview("h1"));

        clock.advance(Duration::minutes(15));
        assert!(store.get("h1").is_none());
        assert_eq!(store.count(), 0);
        assert_eq!(store.stored_entries(), 1);
    }

    #[test]
    fn test_delete_reports_removal() {
        let (_clock, store) = store();
        store.put(preview("h1"));

        assert!(store.delete("h1"));
        assert!(!store.delete("h1"));
        assert!(store.get("h1").is_none());
    }

    #[test]
    fn test_delete_expired_entry_reports_removal() {
        let (clock, store) = store();
        store.put(preview("h1"));

        clock.advance(Duration::minutes(16));
        assert!(store.delete("h1"));
        assert_eq!(store.stored_entries(), 0);
        assert!(!store.delete("h1"));
    }

    #[test]
    fn test_mark_executed_once_and_visible() {
        let (_clock, store) = store();
        let before = store.put(preview("h1"));

        assert!(!store.is_executed("h1"));
        assert!(store.mark_executed("h1"));
        assert!(store.is_executed("h1"));
        assert!(store.get("h1").map(|p| p.executed).unwrap_or(false));
        // 先前取得的快照不受影响
        assert!(!before.executed);
    }

    #[test]
    fn test_mark_executed_keeps_stored_preview_shared() {
        let (_clock, store) = store();
        let claimed = store.put(preview("h1"));

        assert!(store.mark_executed("h1"));
        // 暂存区内仍是同一份预览，未在写锁内复制
        {
            let entries = store.read();
            let entry = entries.get("h1").unwrap();
            assert!(Arc::ptr_eq(&entry.preview, &claimed));
            assert_eq!(entry.state, CommitState::Executed);
        }
        assert!(!claimed.executed);
        assert!(store.get("h1").unwrap().executed);
    }

    #[test]
    fn test_mark_executed_fails_when_missing_or_expired() {
        let (clock, store) = store();
        assert!(!store.mark_executed("missing"));

        store.put(preview("h1"));
        clock.advance(Duration::minutes(16));
        assert!(!store.mark_executed("h1"));
        assert!(!store.is_executed("h1"));
    }

    #[test]
    fn test_claim_is_exclusive_until_released() {
        let (_clock, store) = store();
        store.put(preview("h1"));

        assert!(store.try_claim("h1").is_ok());
        assert!(matches!(
            store.try_claim("h1"),
            Err(ImportError::CommitInProgress(_))
        ));

        store.release("h1");
        assert!(store.try_claim("h1").is_ok());
        assert!(store.mark_executed("h1"));

        // 已执行后 release 不会回到 Pending
        store.release("h1");
        assert!(matches!(
            store.try_claim("h1"),
            Err(ImportError::PreviewAlreadyExecuted(_))
        ));
    }

    #[test]
    fn test_claim_unknown_or_expired_is_not_found() {
        let (clock, store) = store();
        assert!(matches!(
            store.try_claim("nope"),
            Err(ImportError::PreviewNotFound(_))
        ));

        store.put(preview("h1"));
        clock.advance(Duration::minutes(20));
        assert!(matches!(
            store.try_claim("h1"),
            Err(ImportError::PreviewNotFound(_))
        ));
    }

    #[test]
    fn test_reap_removes_only_expired() {
        let (clock, store) = store();
        store.put(preview("old"));
        clock.advance(Duration::minutes(10));
        store.put(preview("new"));
        clock.advance(Duration::minutes(6));

        assert_eq!(store.reap_expired(), 1);
        assert_eq!(store.stored_entries(), 1);
        assert!(store.get("new").is_some());
    }

    #[tokio::test]
    async fn test_reaper_task_sweeps_and_shuts_down() {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(PreviewStore::new(Duration::minutes(15), clock.clone()));
        store.put(preview("h1"));
        clock.advance(Duration::minutes(30));

        let reaper = ReaperHandle::spawn(&store, std::time::Duration::from_millis(10));
        for _ in 0..50 {
            if store.stored_entries() == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(store.stored_entries(), 0);

        reaper.shutdown().await;
    }

    #[tokio::test]
    async fn test_reaper_stops_when_store_dropped() {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(PreviewStore::new(Duration::minutes(15), clock));
        let reaper = ReaperHandle::spawn(&store, std::time::Duration::from_millis(10));
        drop(store);

        for _ in 0..50 {
            if reaper.is_finished() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(reaper.is_finished());
    }
}
