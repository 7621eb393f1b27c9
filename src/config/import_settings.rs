// ==========================================
// 体适能检测纪录 - 导入配置快照
// ==========================================
// 职责: 服务建立时一次读取 ImportConfigReader，执行期间不再查库
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::config::config_manager::DEFAULT_MAX_UPLOAD_BYTES;
use crate::domain::types::{SportItem, ValueRange};
use crate::importer::preview_store::{DEFAULT_PREVIEW_TTL_SECS, DEFAULT_REAPER_INTERVAL_SECS};
use std::collections::HashMap;
use std::error::Error;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSettings {
    pub preview_ttl: chrono::Duration,
    pub reaper_interval: Duration,
    pub max_upload_bytes: u64,
    pub sport_ranges: HashMap<SportItem, ValueRange>,
}

impl ImportSettings {
    /// 从配置读取器载入
    pub async fn load(reader: &dyn ImportConfigReader) -> Result<Self, Box<dyn Error>> {
        let ttl_secs = reader.get_preview_ttl_secs().await?;
        let reaper_secs = reader.get_reaper_interval_secs().await?;
        let max_upload_bytes = reader.get_max_upload_bytes().await?;

        let mut sport_ranges = HashMap::new();
        for item in SportItem::ALL {
            sport_ranges.insert(item, reader.get_sport_value_range(item).await?);
        }

        Ok(Self {
            preview_ttl: chrono::Duration::seconds(ttl_secs),
            reaper_interval: Duration::from_secs(reaper_secs),
            max_upload_bytes,
            sport_ranges,
        })
    }

    pub fn with_preview_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.preview_ttl = ttl;
        self
    }
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            preview_ttl: chrono::Duration::seconds(DEFAULT_PREVIEW_TTL_SECS),
            reaper_interval: Duration::from_secs(DEFAULT_REAPER_INTERVAL_SECS),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            sport_ranges: SportItem::ALL
                .iter()
                .map(|item| (*item, item.default_range()))
                .collect(),
        }
    }
}
