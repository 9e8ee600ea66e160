// ==========================================
// 高校教务核心 - 学生学籍领域模型
// ==========================================
// 职责: 学籍指针、学分台账与晋级审计记录
// 红线: StudentSemesterHistory 写入后不可变(仅 status 可修正)
// 红线: StudentPromotionLog 只追加,from_year < to_year 恒成立
// 红线: 学分台账由考试/考勤子系统写入,本核心只读
// ==========================================

use crate::domain::types::ProgressionStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Student - 学生学籍指针
// ==========================================
// 说明: 只建模晋级引擎读写的字段;人事/档案信息属外围 CRUD 层
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    // ===== 主键与关联 =====
    pub student_id: String,
    pub batch_id: String,
    pub roll_no: String, // 学号(批次内稳定排序键,轮转分配依据)

    // ===== 学籍指针(仅晋级引擎可推进) =====
    pub current_year: i32,                       // 当前学年
    pub current_semester_no: i32,                // 当前学期序号
    pub current_batch_semester_id: Option<String>, // 当前批次学期(滚动幂等判定依据)

    // ===== 状态 =====
    pub status: ProgressionStatus, // 学籍进度状态
    pub is_active: bool,           // 在册标志(休学/退学置 0)

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// CreditLedgerEntry - 学分台账(每生每学期)
// ==========================================
// 约束: (student_id, batch_id, semester_no) 唯一; 各学分字段 ≥ 0
// 用途: 晋级资格判定的唯一事实来源
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditLedgerEntry {
    pub ledger_id: String,
    pub student_id: String,
    pub batch_id: String,
    pub semester_no: i32,
    pub program_year: i32,
    pub academic_year_id: String,    // 学年度标识(如 AY2025-26,外部口径)
    pub total_credits_offered: i32,  // 本学期开设总学分
    pub earned_credits: i32,         // 已获学分
    pub failed_credits: i32,         // 挂科学分
    pub finalized: bool,             // 外部子系统结算完成标志
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// StudentSemesterHistory - 学期完成历史(不可变事实)
// ==========================================
// 约束: (student_id, academic_year_id, semester_no) 唯一
// 红线: 晋级提交协议第 1 步写入,先于其他一切写操作
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentSemesterHistory {
    pub history_id: String,
    pub student_id: String,
    pub academic_year_id: String,
    pub semester_no: i32,
    pub program_year: i32,
    pub total_credits: i32,
    pub earned_credits: i32,
    pub failed_credits: i32,
    pub status: ProgressionStatus, // 本学期终局状态(PROMOTED/DETAINED/REPEATED/...)
    pub created_at: DateTime<Utc>,
}

// ==========================================
// StudentPromotionLog - 晋级决策审计日志(只追加)
// ==========================================
// 约束: from_year < to_year
// 红线: 晋级提交协议第 2 步写入,先于学籍指针变更
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentPromotionLog {
    pub log_id: String,
    pub student_id: String,
    pub batch_id: String,
    pub from_year: i32,
    pub to_year: i32,
    pub from_semester_no: i32,
    pub to_semester_no: i32,
    pub status: ProgressionStatus,       // 决策结果
    pub reason: String,                  // 决策理由(可读文本)
    pub reason_detail: Option<serde_json::Value>, // 结构化依据(阈值/实际值,可解释性)
    pub year_percentage: Option<f64>,    // 判定时的年度学分百分比
    pub decided_by: String,              // 决策者标识(边界层传入)
    pub created_at: DateTime<Utc>,
}
