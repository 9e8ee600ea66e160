// ==========================================
// 高校教务核心 - 配置层
// ==========================================
// 职责: 系统配置管理,默认值兜底
// 存储: config_kv 表
// ==========================================

pub mod academic_config_trait;
pub mod config_manager;

// 重导出核心配置管理器
pub use academic_config_trait::AcademicConfigReader;
pub use config_manager::{config_keys, ConfigManager};
