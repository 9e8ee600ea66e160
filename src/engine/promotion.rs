// ==========================================
// 高校教务核心 - 升级决策引擎
// ==========================================
// 红线: 引擎只计算决定,不写库;三步提交协议由仓库层的
//       commit_decision 在单事务内执行
// 红线: 规则缺失返回 RuleMissing 错误,不产生任何可提交的决定
// 职责: 资格判定结果 → 升级/留级决定 (含理由文本与 JSON 明细)
// ==========================================

use crate::domain::regulation::RegulationPromotionRule;
use crate::domain::student::{CreditLedgerEntry, Student};
use crate::domain::types::{EligibilityStatus, ProgressionStatus};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::promotion_core::{
    evaluate, ledger_finalized, sum_year_ledger, EligibilityOutcome,
};
use serde_json::json;
use tracing::{debug, instrument};

// ==========================================
// PromotionDecision - 可提交的升级决定
// ==========================================
#[derive(Debug, Clone)]
pub struct PromotionDecision {
    /// PROMOTED 或 DETAINED
    pub status: ProgressionStatus,
    pub from_year: i32,
    pub to_year: i32,
    pub from_semester_no: i32,
    /// 升级生效后的学期指针;留级时保持原指针
    pub to_semester_no: i32,
    pub year_percentage: Option<f64>,
    pub reason: String,
    pub reason_detail: serde_json::Value,
}

impl PromotionDecision {
    pub fn is_promoted(&self) -> bool {
        self.status == ProgressionStatus::Promoted
    }
}

// ==========================================
// PromotionEngine - 升级决策引擎
// ==========================================
pub struct PromotionEngine;

impl PromotionEngine {
    /// 只读资格判定 (规则缺失表现为不合格,不报错)
    pub fn evaluate_eligibility(
        rule: Option<&RegulationPromotionRule>,
        year_ledger: &[CreditLedgerEntry],
        from_year: i32,
        to_year: i32,
    ) -> EligibilityOutcome {
        let (earned, offered) = sum_year_ledger(year_ledger);
        evaluate(rule, earned, offered, from_year, to_year)
    }

    /// 产出可提交的升级/留级决定
    ///
    /// # 前置
    /// - 学年学分台账全部已定稿,否则 PreconditionFailed
    /// - 存在 from_year→to_year 的规则,否则 RuleMissing
    ///
    /// # 结果
    /// - 合格 → PROMOTED,指针指向 to_year 的下一学期 (to_semester_no)
    /// - 不合格 → DETAINED,指针保持原学年学期
    #[instrument(skip(rule, year_ledger), fields(student_id = %student.student_id))]
    pub fn decide(
        student: &Student,
        regulation_id: &str,
        rule: Option<&RegulationPromotionRule>,
        year_ledger: &[CreditLedgerEntry],
        to_year: i32,
        to_semester_no: i32,
    ) -> EngineResult<PromotionDecision> {
        let from_year = student.current_year;
        if to_year <= from_year {
            return Err(EngineError::Validation(format!(
                "升级目标学年 {to_year} 必须大于当前学年 {from_year}"
            )));
        }

        let rule = match rule {
            Some(r) => r,
            None => {
                return Err(EngineError::RuleMissing {
                    regulation_id: regulation_id.to_string(),
                    from_year,
                    to_year,
                })
            }
        };

        if !ledger_finalized(year_ledger) {
            return Err(EngineError::PreconditionFailed(format!(
                "学生 {} 第 {from_year} 学年学分台账未定稿,不能做升级决定",
                student.student_id
            )));
        }

        let (earned, offered) = sum_year_ledger(year_ledger);
        let outcome = evaluate(Some(rule), earned, offered, from_year, to_year);

        let detail = json!({
            "rule_id": rule.rule_id,
            "earned_credits": earned,
            "total_credits_offered": offered,
            "year_percentage": outcome.year_percentage,
            "required_percentage": rule.min_current_year_percentage,
            "verdict": outcome.reason,
        });

        let decision = match outcome.status {
            EligibilityStatus::Eligible => PromotionDecision {
                status: ProgressionStatus::Promoted,
                from_year,
                to_year,
                from_semester_no: student.current_semester_no,
                to_semester_no,
                year_percentage: outcome.year_percentage,
                reason: outcome.reason.text(),
                reason_detail: detail,
            },
            EligibilityStatus::Ineligible => PromotionDecision {
                status: ProgressionStatus::Detained,
                from_year,
                to_year,
                from_semester_no: student.current_semester_no,
                // 留级: 指针不前进
                to_semester_no: student.current_semester_no,
                year_percentage: outcome.year_percentage,
                reason: outcome.reason.text(),
                reason_detail: detail,
            },
        };

        debug!(status = %decision.status, pct = ?decision.year_percentage, "升级决定完成");
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_student() -> Student {
        Student {
            student_id: "S001".to_string(),
            batch_id: "B001".to_string(),
            roll_no: "24CS001".to_string(),
            current_year: 1,
            current_semester_no: 2,
            current_batch_semester_id: Some("BS2".to_string()),
            status: ProgressionStatus::Enrolled,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn test_rule(min_current: f64) -> RegulationPromotionRule {
        RegulationPromotionRule {
            rule_id: "RULE1".to_string(),
            regulation_id: "R001".to_string(),
            from_year: 1,
            to_year: 2,
            min_prev_year_percentage: 0.0,
            min_current_year_percentage: min_current,
        }
    }

    fn ledger(earned: i32, offered: i32) -> Vec<CreditLedgerEntry> {
        vec![CreditLedgerEntry {
            ledger_id: "L1".to_string(),
            student_id: "S001".to_string(),
            batch_id: "B001".to_string(),
            semester_no: 2,
            program_year: 1,
            academic_year_id: "AY2024".to_string(),
            total_credits_offered: offered,
            earned_credits: earned,
            failed_credits: offered - earned,
            finalized: true,
            updated_at: Utc::now(),
        }]
    }

    #[test]
    fn test_decide_promoted_advances_pointer() {
        let student = test_student();
        let rule = test_rule(50.0);
        let decision =
            PromotionEngine::decide(&student, "R001", Some(&rule), &ledger(500, 1000), 2, 3).unwrap();

        assert_eq!(decision.status, ProgressionStatus::Promoted);
        assert_eq!(decision.from_year, 1);
        assert_eq!(decision.to_year, 2);
        assert_eq!(decision.to_semester_no, 3);
        assert_eq!(decision.year_percentage, Some(50.0));
        assert!(decision.is_promoted());
    }

    #[test]
    fn test_decide_detained_keeps_pointer() {
        let student = test_student();
        let rule = test_rule(50.0);
        let decision =
            PromotionEngine::decide(&student, "R001", Some(&rule), &ledger(499, 1000), 2, 3).unwrap();

        assert_eq!(decision.status, ProgressionStatus::Detained);
        // 留级的指针保持原学期
        assert_eq!(decision.to_semester_no, 2);
        assert!(!decision.is_promoted());
    }

    #[test]
    fn test_decide_rule_missing_is_error() {
        let student = test_student();
        let result = PromotionEngine::decide(&student, "R001", None, &ledger(48, 48), 2, 3);
        assert!(matches!(result, Err(EngineError::RuleMissing { .. })));
    }

    #[test]
    fn test_decide_rejects_unfinalized_ledger() {
        let student = test_student();
        let rule = test_rule(50.0);
        let mut entries = ledger(40, 48);
        entries[0].finalized = false;

        let result = PromotionEngine::decide(&student, "R001", Some(&rule), &entries, 2, 3);
        assert!(matches!(result, Err(EngineError::PreconditionFailed(_))));
    }

    #[test]
    fn test_decide_rejects_non_forward_year() {
        let student = test_student();
        let rule = test_rule(50.0);
        let result = PromotionEngine::decide(&student, "R001", Some(&rule), &ledger(40, 48), 1, 2);
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[test]
    fn test_evaluate_eligibility_rule_missing_is_ineligible() {
        let outcome = PromotionEngine::evaluate_eligibility(None, &ledger(48, 48), 1, 2);
        assert_eq!(outcome.status, EligibilityStatus::Ineligible);
    }

    #[test]
    fn test_decision_detail_carries_rule_and_credits() {
        let student = test_student();
        let rule = test_rule(50.0);
        let decision =
            PromotionEngine::decide(&student, "R001", Some(&rule), &ledger(30, 40), 2, 3).unwrap();

        assert_eq!(decision.reason_detail["rule_id"], "RULE1");
        assert_eq!(decision.reason_detail["earned_credits"], 30);
        assert_eq!(decision.reason_detail["required_percentage"], 50.0);
    }
}
