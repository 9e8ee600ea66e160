// ==========================================
// 高校教务核心 - API 层
// ==========================================
// 职责: 组合仓库与引擎,提供业务 API 接口,供边界层调用
// ==========================================

pub mod error;
pub mod regulation_api;
pub mod structure_api;
pub mod assignment_api;
pub mod promotion_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use regulation_api::RegulationApi;
pub use structure_api::{StructureApi, StructureSummary, UtilizationReport};
pub use assignment_api::{AssignmentApi, AutoAssignReport};
pub use promotion_api::{
    BatchPromotionReport, PromotionApi, PromotionOutcome, RolloverReport,
};
