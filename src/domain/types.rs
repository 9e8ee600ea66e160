// ==========================================
// 高校教务核心 - 领域类型定义
// ==========================================
// 依据: 学籍晋级状态机 ENROLLED → ELIGIBLE|INELIGIBLE → PROMOTED|DETAINED|REPEATED
// 红线: 状态只能由显式决策产生,不得从部分数据自动推断
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 学籍进度状态 (Progression Status)
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressionStatus {
    Enrolled,   // 在读(学分未结算)
    Eligible,   // 学分达标,待晋级决策
    Ineligible, // 学分不达标
    Promoted,   // 已晋级
    Detained,   // 留级(年级不变)
    Repeated,   // 重读(人工决策)
}

impl fmt::Display for ProgressionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl ProgressionStatus {
    /// 从字符串解析状态
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ENROLLED" => Some(ProgressionStatus::Enrolled),
            "ELIGIBLE" => Some(ProgressionStatus::Eligible),
            "INELIGIBLE" => Some(ProgressionStatus::Ineligible),
            "PROMOTED" => Some(ProgressionStatus::Promoted),
            "DETAINED" => Some(ProgressionStatus::Detained),
            "REPEATED" => Some(ProgressionStatus::Repeated),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ProgressionStatus::Enrolled => "ENROLLED",
            ProgressionStatus::Eligible => "ELIGIBLE",
            ProgressionStatus::Ineligible => "INELIGIBLE",
            ProgressionStatus::Promoted => "PROMOTED",
            ProgressionStatus::Detained => "DETAINED",
            ProgressionStatus::Repeated => "REPEATED",
        }
    }
}

// ==========================================
// 晋级资格判定结果 (Eligibility Status)
// ==========================================
// 红线: 规则缺失时判定为 Ineligible(失败关闭),绝不静默晋级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EligibilityStatus {
    Eligible,   // 满足年度学分百分比阈值
    Ineligible, // 不满足阈值或规则未配置
}

impl fmt::Display for EligibilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EligibilityStatus::Eligible => write!(f, "ELIGIBLE"),
            EligibilityStatus::Ineligible => write!(f, "INELIGIBLE"),
        }
    }
}

// ==========================================
// 分配方式 (Assignment Type)
// ==========================================
// 用于区分自动轮转分配 / 人工指定 / 规则分配
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentType {
    Auto,      // 轮转自动分配
    Manual,    // 人工指定
    RuleBased, // 规则分配(如按成绩分层)
}

impl fmt::Display for AssignmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl AssignmentType {
    /// 从字符串解析分配方式
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "AUTO" => Some(AssignmentType::Auto),
            "MANUAL" => Some(AssignmentType::Manual),
            "RULE_BASED" => Some(AssignmentType::RuleBased),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            AssignmentType::Auto => "AUTO",
            AssignmentType::Manual => "MANUAL",
            AssignmentType::RuleBased => "RULE_BASED",
        }
    }
}

// ==========================================
// 课程考核类别 (Subject Category)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubjectCategory {
    Theory,    // 理论课
    Practical, // 实验/实践课
    Project,   // 课程设计/项目
}

impl fmt::Display for SubjectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl SubjectCategory {
    /// 从字符串解析考核类别
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "THEORY" => Some(SubjectCategory::Theory),
            "PRACTICAL" => Some(SubjectCategory::Practical),
            "PROJECT" => Some(SubjectCategory::Project),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            SubjectCategory::Theory => "THEORY",
            SubjectCategory::Practical => "PRACTICAL",
            SubjectCategory::Project => "PROJECT",
        }
    }
}
