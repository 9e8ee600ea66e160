// ==========================================
// 高校教务核心 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、默认值兜底
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::academic_config_trait::AcademicConfigReader;
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    pub const DEFAULT_SECTIONS_PER_SEMESTER: &str = "default_sections_per_semester";
    pub const DEFAULT_SECTION_CAPACITY: &str = "default_section_capacity";
    pub const DEFAULT_LABS_PER_SEMESTER: &str = "default_labs_per_semester";
    pub const DEFAULT_LAB_CAPACITY: &str = "default_lab_capacity";
    pub const CURRENT_ACADEMIC_YEAR: &str = "current_academic_year";
    pub const ACADEMIC_YEAR_START_MONTH: &str = "academic_year_start_month";
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

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self
            .get_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 写入 global scope 配置（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;

        Ok(())
    }

    fn get_i32_or(&self, key: &str, default: i32) -> Result<i32, Box<dyn Error>> {
        let value = self.get_config_or_default(key, &default.to_string())?;
        Ok(value.parse::<i32>().unwrap_or(default))
    }
}

// ==========================================
// AcademicConfigReader Trait 实现
// ==========================================
#[async_trait]
impl AcademicConfigReader for ConfigManager {
    async fn get_default_sections_per_semester(&self) -> Result<i32, Box<dyn Error>> {
        self.get_i32_or(config_keys::DEFAULT_SECTIONS_PER_SEMESTER, 2)
    }

    async fn get_default_section_capacity(&self) -> Result<i32, Box<dyn Error>> {
        self.get_i32_or(config_keys::DEFAULT_SECTION_CAPACITY, 60)
    }

    async fn get_default_labs_per_semester(&self) -> Result<i32, Box<dyn Error>> {
        self.get_i32_or(config_keys::DEFAULT_LABS_PER_SEMESTER, 0)
    }

    async fn get_default_lab_capacity(&self) -> Result<i32, Box<dyn Error>> {
        self.get_i32_or(config_keys::DEFAULT_LAB_CAPACITY, 20)
    }

    async fn get_current_academic_year(
        &self,
        today: NaiveDate,
    ) -> Result<String, Box<dyn Error>> {
        if let Some(value) = self.get_config_value(config_keys::CURRENT_ACADEMIC_YEAR)? {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.to_string());
            }
        }

        // 未配置时按学年起始月推算
        let start_month = self.get_i32_or(config_keys::ACADEMIC_YEAR_START_MONTH, 7)?;
        let start_month = if (1..=12).contains(&start_month) {
            start_month as u32
        } else {
            7
        };

        let year = if today.month() >= start_month {
            today.year()
        } else {
            today.year() - 1
        };
        Ok(format!("AY{year}"))
    }
}
