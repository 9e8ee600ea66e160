// ==========================================
// 高校教务核心 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎,不拼 SQL
// 红线: Engine 不拼 SQL, 所有判定必须输出 reason
// ==========================================

pub mod assignment;
pub mod capacity_allocator;
pub mod error;
pub mod promotion;
pub mod promotion_core;
pub mod structure_generator;
pub mod validation;

// 重导出核心引擎
pub use assignment::{AssignmentEngine, AssignmentPlan, AssignmentTarget};
pub use capacity_allocator::{AllocationPlan, CapacityAllocator};
pub use error::{EngineError, EngineResult};
pub use promotion::{PromotionDecision, PromotionEngine};
pub use promotion_core::{EligibilityOutcome, EligibilityReason};
pub use structure_generator::StructureGenerator;
pub use validation::ValidationGuard;
