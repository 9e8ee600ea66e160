// ==========================================
// 高校教务核心 - 教务配置读取 Trait
// ==========================================
// 职责: 定义容量分配与学年滚动所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

// ==========================================
// AcademicConfigReader Trait
// ==========================================
// 用途: 结构/分班模块所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait AcademicConfigReader: Send + Sync {
    // ===== 容量分配默认值 =====

    /// 获取每学期默认班级数
    ///
    /// # 默认值
    /// - 2
    async fn get_default_sections_per_semester(&self) -> Result<i32, Box<dyn Error>>;

    /// 获取班级默认容量上限
    ///
    /// # 默认值
    /// - 60
    async fn get_default_section_capacity(&self) -> Result<i32, Box<dyn Error>>;

    /// 获取每学期默认实验分组数
    ///
    /// # 默认值
    /// - 0（纯理论专业没有实验分组）
    async fn get_default_labs_per_semester(&self) -> Result<i32, Box<dyn Error>>;

    /// 获取实验分组默认容量上限
    ///
    /// # 默认值
    /// - 20
    async fn get_default_lab_capacity(&self) -> Result<i32, Box<dyn Error>>;

    // ===== 学年滚动 =====

    /// 获取当前学年标识（写入学分台账/学期历史的 academic_year_id）
    ///
    /// # 参数
    /// - today: 当前日期
    ///
    /// # 逻辑
    /// 1. 若配置了 current_academic_year 则直接返回
    /// 2. 否则按 academic_year_start_month（默认 7 月）推算:
    ///    7 月及以后属 "AY{今年}"，之前属 "AY{去年}"
    async fn get_current_academic_year(
        &self,
        today: chrono::NaiveDate,
    ) -> Result<String, Box<dyn Error>>;
}
