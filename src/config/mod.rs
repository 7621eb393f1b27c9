// ==========================================
// 体适能检测纪录 - 配置层
// ==========================================
// 职责: 导入相关配置（预览有效期 / 上传上限 / 合理区间）
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config_trait;
pub mod import_settings;

// 重导出核心配置管理器
pub use config_manager::{config_keys, default_db_path, ConfigManager};
pub use import_config_trait::ImportConfigReader;
pub use import_settings::ImportSettings;
