// ==========================================
// 高校教务核心 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 教学组织与学籍进度核心 (进程内库,外围系统经 API 层接入)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    AssignmentType, EligibilityStatus, ProgressionStatus, SubjectCategory,
};

// 领域实体
pub use domain::{
    AcademicBatch, BatchSemester, BatchSubject, CreditLedgerEntry, GeneratedStructure, LabGroup,
    ProgramYear, Regulation, RegulationPromotionRule, RegulationSemester, RegulationSubject,
    Section, Student, StudentLabAssignment, StudentPromotionLog, StudentSectionAssignment,
    StudentSemesterHistory,
};

// 引擎
pub use engine::{
    AssignmentEngine, CapacityAllocator, PromotionDecision, PromotionEngine, StructureGenerator,
    ValidationGuard,
};

// API
pub use api::{AssignmentApi, PromotionApi, RegulationApi, StructureApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "高校教务核心";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";

// ==========================================
// 预编译检查
// ==========================================
