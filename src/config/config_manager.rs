// ==========================================
// 体适能检测纪录 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、写入
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::open_sqlite_connection;
use crate::domain::types::{SportItem, ValueRange};
use crate::importer::preview_store::{DEFAULT_PREVIEW_TTL_SECS, DEFAULT_REAPER_INTERVAL_SECS};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::error::Error;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// 默认上传上限（5 MiB）
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "FITNESS_RECORDS_DB_PATH";

/// 默认数据库路径
///
/// 优先级: 环境变量 > 系统数据目录 > 当前目录
pub fn default_db_path() -> PathBuf {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    dirs::data_dir()
        .map(|dir| dir.join("fitness-records").join("fitness_records.db"))
        .unwrap_or_else(|| PathBuf::from("fitness_records.db"))
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取并解析配置值；不存在或格式错误时回退默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>>
    where
        T: std::str::FromStr + std::fmt::Display + Copy,
    {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    warn!(config_key = key, value = %raw, default = %default, "配置值格式错误，使用默认值");
                    Ok(default)
                }
            },
        }
    }
}

// ==========================================
// ImportConfigReader 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_preview_ttl_secs(&self) -> Result<i64, Box<dyn Error>> {
        let secs = self.get_parsed_or_default(config_keys::PREVIEW_TTL_SECS, DEFAULT_PREVIEW_TTL_SECS)?;
        if secs <= 0 {
            warn!(secs, "预览有效期必须为正数，使用默认值");
            return Ok(DEFAULT_PREVIEW_TTL_SECS);
        }
        Ok(secs)
    }

    async fn get_reaper_interval_secs(&self) -> Result<u64, Box<dyn Error>> {
        let secs = self.get_parsed_or_default(
            config_keys::REAPER_INTERVAL_SECS,
            DEFAULT_REAPER_INTERVAL_SECS,
        )?;
        Ok(secs.max(1))
    }

    async fn get_max_upload_bytes(&self) -> Result<u64, Box<dyn Error>> {
        self.get_parsed_or_default(config_keys::MAX_UPLOAD_BYTES, DEFAULT_MAX_UPLOAD_BYTES)
    }

    async fn get_sport_value_range(&self, item: SportItem) -> Result<ValueRange, Box<dyn Error>> {
        let key = config_keys::sport_range(item);
        match self.get_config_value(&key)? {
            None => Ok(item.default_range()),
            Some(raw) => Ok(ValueRange::parse(&raw).unwrap_or_else(|| {
                warn!(config_key = %key, value = %raw, "合理区间格式错误（应为 min,max），使用默认值");
                item.default_range()
            })),
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    use crate::domain::types::SportItem;

    // 预览暂存
    pub const PREVIEW_TTL_SECS: &str = "import_preview_ttl_secs";
    pub const REAPER_INTERVAL_SECS: &str = "import_reaper_interval_secs";

    // 上传限制
    pub const MAX_UPLOAD_BYTES: &str = "import_max_upload_bytes";

    // 合理区间前缀，值格式 "min,max"
    pub const SPORT_RANGE_PREFIX: &str = "sport_range/";

    pub fn sport_range(item: SportItem) -> String {
        format!("{}{}", SPORT_RANGE_PREFIX, item.config_key())
    }
}
