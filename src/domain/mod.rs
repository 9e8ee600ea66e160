// ==========================================
// 高校教务核心 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod batch;
pub mod regulation;
pub mod section;
pub mod student;
pub mod types;

// 重导出核心类型
pub use batch::{AcademicBatch, BatchSemester, BatchSubject, GeneratedStructure, ProgramYear};
pub use regulation::{
    Regulation, RegulationPromotionRule, RegulationSemester, RegulationSubject,
};
pub use section::{
    AllocationSummary, LabGroup, Section, SectionUtilization, StudentLabAssignment,
    StudentSectionAssignment,
};
pub use student::{
    CreditLedgerEntry, Student, StudentPromotionLog, StudentSemesterHistory,
};
pub use types::{AssignmentType, EligibilityStatus, ProgressionStatus, SubjectCategory};
