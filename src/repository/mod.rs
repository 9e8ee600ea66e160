// ==========================================
// 高校教务核心 - 数据仓储层
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod assignment_repo;
pub mod batch_repo;
pub mod error;
pub mod promotion_repo;
pub mod regulation_repo;
pub mod section_repo;
pub mod structure_repo;
pub mod student_repo;

// 重导出核心仓储
pub use assignment_repo::{LabAssignmentRepository, SectionAssignmentRepository};
pub use batch_repo::AcademicBatchRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use promotion_repo::{PromotionCommit, PromotionCommitRepository};
pub use regulation_repo::RegulationRepository;
pub use section_repo::{
    decrement_lab_strength, decrement_section_strength, increment_lab_strength,
    increment_section_strength, LabGroupRepository, SectionRepository,
};
pub use structure_repo::BatchStructureRepository;
pub use student_repo::{CreditLedgerRepository, StudentRepository};
