// ==========================================
// 高校教务核心 - 升级资格核心算法
// ==========================================
// 红线: 纯函数,不访问数据库,不产生副作用
// 红线: 未配置升级规则一律判不合格 (fail-closed),绝不默认放行
// 职责: 学年得分率计算 + 规则阈值判定
// ==========================================

use crate::domain::regulation::RegulationPromotionRule;
use crate::domain::student::CreditLedgerEntry;
use crate::domain::types::EligibilityStatus;
use serde::{Deserialize, Serialize};

/// 学年得分率: earned / offered * 100
///
/// offered <= 0 时无法计算,返回 None (上游按不合格处理)
pub fn year_percentage(earned_credits: i32, total_credits_offered: i32) -> Option<f64> {
    if total_credits_offered <= 0 {
        return None;
    }
    Some(earned_credits as f64 / total_credits_offered as f64 * 100.0)
}

/// 汇总某学年的学分台账 (earned, offered)
pub fn sum_year_ledger(entries: &[CreditLedgerEntry]) -> (i32, i32) {
    entries.iter().fold((0, 0), |(earned, offered), e| {
        (earned + e.earned_credits, offered + e.total_credits_offered)
    })
}

/// 台账是否全部已定稿
pub fn ledger_finalized(entries: &[CreditLedgerEntry]) -> bool {
    !entries.is_empty() && entries.iter().all(|e| e.finalized)
}

// ==========================================
// EligibilityReason - 判定依据
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EligibilityReason {
    /// 未配置 from_year→to_year 的升级规则
    RuleMissing { from_year: i32, to_year: i32 },
    /// 学年学分台账缺失或 offered=0,无法计算得分率
    CreditsUnavailable,
    /// 得分率低于规则阈值
    BelowThreshold { year_percentage: f64, required: f64 },
    /// 得分率达到规则阈值
    MeetsThreshold { year_percentage: f64, required: f64 },
}

impl EligibilityReason {
    pub fn text(&self) -> String {
        match self {
            EligibilityReason::RuleMissing { from_year, to_year } => {
                format!("未配置 {from_year}→{to_year} 升级规则,按不合格处理")
            }
            EligibilityReason::CreditsUnavailable => {
                "学年学分台账缺失,无法计算得分率".to_string()
            }
            EligibilityReason::BelowThreshold {
                year_percentage,
                required,
            } => format!("学年得分率 {year_percentage:.1}% 低于要求 {required:.1}%"),
            EligibilityReason::MeetsThreshold {
                year_percentage,
                required,
            } => format!("学年得分率 {year_percentage:.1}% 达到要求 {required:.1}%"),
        }
    }
}

// ==========================================
// EligibilityOutcome - 判定结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityOutcome {
    pub status: EligibilityStatus,
    pub year_percentage: Option<f64>,
    pub reason: EligibilityReason,
}

/// 规则阈值判定
///
/// - rule=None → 不合格 (RuleMissing)
/// - 得分率不可计算 → 不合格 (CreditsUnavailable)
/// - 合格判据: year_percentage >= rule.min_current_year_percentage
pub fn evaluate(
    rule: Option<&RegulationPromotionRule>,
    earned_credits: i32,
    total_credits_offered: i32,
    from_year: i32,
    to_year: i32,
) -> EligibilityOutcome {
    let rule = match rule {
        Some(r) => r,
        None => {
            return EligibilityOutcome {
                status: EligibilityStatus::Ineligible,
                year_percentage: year_percentage(earned_credits, total_credits_offered),
                reason: EligibilityReason::RuleMissing { from_year, to_year },
            }
        }
    };

    let pct = match year_percentage(earned_credits, total_credits_offered) {
        Some(p) => p,
        None => {
            return EligibilityOutcome {
                status: EligibilityStatus::Ineligible,
                year_percentage: None,
                reason: EligibilityReason::CreditsUnavailable,
            }
        }
    };

    let required = rule.min_current_year_percentage;
    if pct >= required {
        EligibilityOutcome {
            status: EligibilityStatus::Eligible,
            year_percentage: Some(pct),
            reason: EligibilityReason::MeetsThreshold {
                year_percentage: pct,
                required,
            },
        }
    } else {
        EligibilityOutcome {
            status: EligibilityStatus::Ineligible,
            year_percentage: Some(pct),
            reason: EligibilityReason::BelowThreshold {
                year_percentage: pct,
                required,
            },
        }
    }
}
