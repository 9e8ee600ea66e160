// ==========================================
// 高校教务核心 - 培养方案领域模型
// ==========================================
// 职责: 培养方案(Regulation)及其学期/课程/晋级规则定义
// 红线: locked=true 后课程/学期不得增删改
// 红线: version 为乐观锁计数器,所有更新必须校验
// ==========================================

use crate::domain::types::SubjectCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Regulation - 培养方案(某专业的课程体系版本)
// ==========================================
// 用途: 结构生成的唯一来源;批次生成后为值拷贝,不反向引用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Regulation {
    // ===== 主键 =====
    pub regulation_id: String, // 培养方案唯一标识

    // ===== 基础信息 =====
    pub program_id: String,    // 所属专业
    pub code: String,          // 方案代码(全局唯一,如 R2024-CSE)
    pub title: String,         // 方案名称

    // ===== 晋级与及格阈值 =====
    pub min_pass_marks: i32,   // 单科及格线(分)

    // ===== 锁定与并发控制 =====
    pub locked: bool,          // 单向锁:绑定批次定稿后永久锁定
    pub version: i32,          // 乐观锁计数器

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// RegulationSemester - 方案学期定义
// ==========================================
// 约束: semester_no ∈ [1,10], program_year ∈ [1,5]
// 约束: (regulation_id, semester_no) 唯一
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegulationSemester {
    pub reg_semester_id: String,
    pub regulation_id: String,
    pub semester_no: i32,    // 学期序号(1-10)
    pub program_year: i32,   // 所属学年(1-5)
    pub total_credits: i32,  // 本学期开设总学分
}

// ==========================================
// RegulationSubject - 方案课程定义
// ==========================================
// 约束: (regulation_id, subject_code) 唯一
// 约束: 学分/满分 ≥ 0
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegulationSubject {
    pub reg_subject_id: String,
    pub regulation_id: String,
    pub semester_no: i32,        // 开课学期
    pub subject_code: String,    // 课程代码
    pub subject_name: String,    // 课程名称
    pub category: SubjectCategory, // 考核类别
    pub credits: i32,            // 学分
    pub max_marks: i32,          // 满分
    pub min_pass_marks: i32,     // 及格线
}

// ==========================================
// RegulationPromotionRule - 年级晋级规则
// ==========================================
// 约束: to_year > from_year
// 红线: 规则缺失 = 晋级未配置,判定失败关闭(INELIGIBLE)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegulationPromotionRule {
    pub rule_id: String,
    pub regulation_id: String,
    pub from_year: i32,                      // 起始学年
    pub to_year: i32,                        // 目标学年
    pub min_prev_year_percentage: f64,       // 前一学年学分百分比下限(0-100)
    pub min_current_year_percentage: f64,    // 本学年学分百分比下限(0-100)
}
