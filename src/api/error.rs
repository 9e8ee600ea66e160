// ==========================================
// 高校教务核心 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换 Repository/Engine 错误为用户可读消息
// 红线: 所有错误信息必须包含显式原因（可解释性）
// ==========================================

use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 批次结构已生成,重复生成被拒绝
    #[error("结构冲突: {0}")]
    Conflict(String),

    /// 前置条件不满足（如未生成结构就分配容量）
    #[error("前置条件不满足: {0}")]
    PreconditionFailed(String),

    /// 非法状态（如编辑已锁定方案、容量降到在班人数以下）
    #[error("非法状态: {0}")]
    InvalidState(String),

    /// 升级规则未配置（fail-closed）
    #[error("升级规则未配置: regulation_id={regulation_id}, {from_year}→{to_year}")]
    RuleMissing {
        regulation_id: String,
        from_year: i32,
        to_year: i32,
    },

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 并发控制错误
    // ==========================================
    /// 方案乐观锁冲突,调用方需重读后重试
    #[error("并发修改冲突: {0}")]
    ConcurrentModification(String),

    /// 容量守护计数器拒绝（并发占满）
    #[error("容量已满: {0}")]
    CapacityExceeded(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 校验错误
    // ==========================================
    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将Repository层的技术错误转换为用户可读的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::OptimisticLockFailure {
                regulation_id,
                expected,
                actual,
            } => ApiError::ConcurrentModification(format!(
                "方案 {regulation_id} 版本冲突: 期望 {expected}, 实际 {actual}"
            )),
            RepositoryError::VersionConflict { message } => {
                ApiError::ConcurrentModification(message)
            }
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{entity}: {id}"))
            }
            RepositoryError::CapacityExceeded {
                entity,
                id,
                current,
                max,
            } => ApiError::CapacityExceeded(format!("{entity} {id} 已满 ({current}/{max})")),
            RepositoryError::UniqueConstraintViolation(msg) => ApiError::Conflict(msg),
            RepositoryError::ForeignKeyViolation(msg) => ApiError::InvalidInput(msg),
            RepositoryError::CheckConstraintViolation(msg) => ApiError::ValidationError(msg),
            RepositoryError::BusinessRuleViolation(msg) => ApiError::BusinessRuleViolation(msg),
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::ValidationError(format!("{field}: {message}"))
            }
            RepositoryError::DatabaseConnectionError(msg) => {
                ApiError::DatabaseConnectionError(msg)
            }
            RepositoryError::LockError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(e) => ApiError::Other(e),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound { entity, id } => ApiError::NotFound(format!("{entity}: {id}")),
            EngineError::AlreadyGenerated { batch_id } => {
                ApiError::Conflict(format!("批次 {batch_id} 已生成结构,重复生成被拒绝"))
            }
            EngineError::DuplicateCode { scope, code } => {
                ApiError::Conflict(format!("{scope} 编号 {code} 已存在"))
            }
            EngineError::PreconditionFailed(msg) => ApiError::PreconditionFailed(msg),
            EngineError::InvalidState(msg) => ApiError::InvalidState(msg),
            EngineError::RegulationLocked { regulation_id } => {
                ApiError::InvalidState(format!("方案 {regulation_id} 已锁定,禁止修改"))
            }
            EngineError::RuleMissing {
                regulation_id,
                from_year,
                to_year,
            } => ApiError::RuleMissing {
                regulation_id,
                from_year,
                to_year,
            },
            EngineError::Validation(msg) => ApiError::ValidationError(msg),
            EngineError::Repository(e) => ApiError::from(e),
        }
    }
}

/// API层结果类型
pub type ApiResult<T> = Result<T, ApiError>;
