// ==========================================
// 高校教务核心 - 班级/实验组领域模型
// ==========================================
// 职责: 容量受限的学期子单元 (教学班/实验分组) 及其分配行
// 红线: 0 ≤ current_strength ≤ max_strength 全程成立
// 红线: current_strength 只能通过守护式增减函数修改,不得直接赋值
// 说明: Section 与 LabGroup 为同级兄弟,LabGroup 不隶属于 Section,
//       两者独立划分同一学期学生群体
// ==========================================

use crate::domain::types::AssignmentType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Section - 教学班
// ==========================================
// 约束: (batch_semester_id, code) 唯一; max_strength > 0
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub section_id: String,
    pub batch_semester_id: String,
    pub code: String,            // 班级代码(字母序列: A, B, C, ...)
    pub max_strength: i32,       // 容量上限
    pub current_strength: i32,   // 当前人数(冗余计数,读性能用)
    pub faculty_id: Option<String>, // 班主任/辅导员(外部身份系统提供)
}

// ==========================================
// LabGroup - 实验组
// ==========================================
// 约束: (batch_semester_id, code) 唯一; max_strength > 0
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabGroup {
    pub lab_group_id: String,
    pub batch_semester_id: String,
    pub code: String,            // 组代码(短码序列: LG1, LG2, ...)
    pub max_strength: i32,
    pub current_strength: i32,
    pub faculty_id: Option<String>,
}

// ==========================================
// StudentSectionAssignment - 学生-班级分配
// ==========================================
// 约束: 同一 (student_id, batch_id, semester_no) 同时最多一条 is_active=1
// 说明: 改派时旧记录软删除(is_active=0),并在同一事务内增减两个班级计数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentSectionAssignment {
    pub assignment_id: String,
    pub student_id: String,
    pub batch_id: String,
    pub batch_semester_id: String,
    pub semester_no: i32,
    pub section_id: String,
    pub assignment_type: AssignmentType,
    pub is_active: bool,
    pub assigned_by: String, // 操作者标识(边界层传入,核心不解析角色)
    pub assigned_at: DateTime<Utc>,
}

// ==========================================
// StudentLabAssignment - 学生-实验组分配
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentLabAssignment {
    pub assignment_id: String,
    pub student_id: String,
    pub batch_id: String,
    pub batch_semester_id: String,
    pub semester_no: i32,
    pub lab_group_id: String,
    pub assignment_type: AssignmentType,
    pub is_active: bool,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
}

// ==========================================
// AllocationSummary - 容量分配汇总
// ==========================================
// 用途: CapacityAllocator 返回给调用方确认
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSummary {
    pub sections_created: i32,
    pub labs_created: i32,
    pub total_section_capacity: i32,
    pub total_lab_capacity: i32,
}

// ==========================================
// SectionUtilization - 班级/实验组利用率(只读报表)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionUtilization {
    pub unit_id: String,
    pub code: String,
    pub batch_semester_id: String,
    pub semester_no: i32,
    pub current_strength: i32,
    pub max_strength: i32,
    pub utilization_pct: f64, // current/max * 100
}
