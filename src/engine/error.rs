// ==========================================
// 高校教务核心 - 引擎层错误类型
// ==========================================
// 职责: 业务规则错误分类 (可解释性: 每个错误携带实体 id、
//       违反的规则、当前值与期望值)
// 红线: 引擎绝不静默兜底、绝不自动重试
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 实体缺失 =====
    #[error("实体未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    // ===== 冲突 =====
    #[error("批次结构已生成: batch_id={batch_id},重复生成被拒绝 (重新生成需显式确认)")]
    AlreadyGenerated { batch_id: String },

    #[error("代码重复: scope={scope}, code={code}")]
    DuplicateCode { scope: String, code: String },

    // ===== 前置条件 =====
    #[error("前置条件不满足: {0}")]
    PreconditionFailed(String),

    // ===== 状态约束 =====
    #[error("无效状态: {0}")]
    InvalidState(String),

    #[error("方案已锁定: regulation_id={regulation_id},课程/学期不可再增删改")]
    RegulationLocked { regulation_id: String },

    // ===== 晋级判定 =====
    #[error("晋级规则未配置: regulation_id={regulation_id}, from_year={from_year}, to_year={to_year} (失败关闭,判定为不可晋级)")]
    RuleMissing {
        regulation_id: String,
        from_year: i32,
        to_year: i32,
    },

    // ===== 校验 =====
    #[error("校验失败: {0}")]
    Validation(String),

    // ===== 仓储透传 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
