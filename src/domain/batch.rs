// ==========================================
// 高校教务核心 - 批次(年级队列)领域模型
// ==========================================
// 职责: 入学批次及其冻结结构 (学年/学期/课程快照)
// 红线: ProgramYear/BatchSemester/BatchSubject 是生成时的值拷贝,
//       方案后续(锁定前)的编辑不得回溯影响已生成的批次
// 红线: 批次与方案的绑定关系一经创建不得变更
// ==========================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// AcademicBatch - 入学批次(一届学生)
// ==========================================
// 约束: (program_id, joining_year) 唯一
// 约束: current_year ≥ 1,只能由晋级引擎推进
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcademicBatch {
    // ===== 主键 =====
    pub batch_id: String,

    // ===== 绑定关系(不可变) =====
    pub program_id: String,    // 所属专业
    pub regulation_id: String, // 绑定的培养方案

    // ===== 批次属性 =====
    pub joining_year: i32,   // 入学年份
    pub current_year: i32,   // 当前学年(≥1)
    pub total_students: i32, // 在册学生数(≥0)

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// ProgramYear - 批次学年(冻结拷贝)
// ==========================================
// 红线: 生成后只读,管理员也不可修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramYear {
    pub program_year_id: String,
    pub batch_id: String,
    pub year_no: i32, // 学年序号(1-5)
}

// ==========================================
// BatchSemester - 批次学期(冻结拷贝)
// ==========================================
// 约束: (batch_id, semester_no) 唯一
// 说明: start_date/end_date 由教务在生成后排定,驱动学期滚动晋级
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSemester {
    pub batch_semester_id: String,
    pub batch_id: String,
    pub program_year_id: String,
    pub semester_no: i32,
    pub program_year: i32,
    pub total_credits: i32,              // 生成时从方案拷贝
    pub start_date: Option<NaiveDate>,   // 学期开始日期
    pub end_date: Option<NaiveDate>,     // 学期结束日期
}

// ==========================================
// BatchSubject - 批次课程(冻结拷贝)
// ==========================================
// 红线: 所有学分/分值字段在生成时按值拷贝,之后只读
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSubject {
    pub batch_subject_id: String,
    pub batch_id: String,
    pub batch_semester_id: String,
    pub subject_code: String,
    pub subject_name: String,
    pub category: String,      // 考核类别(拷贝自方案,存 db 字符串)
    pub credits: i32,
    pub max_marks: i32,
    pub min_pass_marks: i32,
}

// ==========================================
// GeneratedStructure - 结构生成结果
// ==========================================
// 用途: StructureGenerator 的纯输出,由 API 层事务化落库
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedStructure {
    pub years: Vec<ProgramYear>,
    pub semesters: Vec<BatchSemester>,
    pub subjects: Vec<BatchSubject>,
}

impl GeneratedStructure {
    /// 生成结果的汇总(年/学期/课程数量)
    pub fn summary(&self) -> (usize, usize, usize) {
        (self.years.len(), self.semesters.len(), self.subjects.len())
    }
}
