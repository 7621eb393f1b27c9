// ==========================================
// 体适能检测纪录 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::types::{SportItem, ValueRange};
use async_trait::async_trait;
use std::error::Error;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入模块所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    // ===== 预览暂存 =====

    /// 获取预览有效期（秒）
    ///
    /// # 默认值
    /// - 900（15 分钟）
    async fn get_preview_ttl_secs(&self) -> Result<i64, Box<dyn Error>>;

    /// 获取过期预览清理间隔（秒）
    ///
    /// # 默认值
    /// - 300（5 分钟）
    async fn get_reaper_interval_secs(&self) -> Result<u64, Box<dyn Error>>;

    // ===== 上传限制 =====

    /// 获取上传文件大小上限（bytes）
    ///
    /// # 默认值
    /// - 5 MiB
    async fn get_max_upload_bytes(&self) -> Result<u64, Box<dyn Error>>;

    // ===== 数据质量 =====

    /// 获取检测项目的合理区间
    ///
    /// # 参数
    /// - item: 检测项目
    ///
    /// # 返回
    /// - ValueRange: 超出区间的值产生 OUT_OF_RANGE 警告
    ///
    /// # 默认值
    /// - SportItem::default_range()
    async fn get_sport_value_range(&self, item: SportItem) -> Result<ValueRange, Box<dyn Error>>;
}
