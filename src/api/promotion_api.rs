// ==========================================
// 高校教务核心 - 升级 API
// ==========================================
// 职责: 资格判定查询、单学生升级、批量升级、留级登记、学期滚动
// 红线: 三步提交协议 (历史→日志→学籍指针) 由仓库层单事务执行,
//       任一步失败整体回滚,绝不出现"已应用未留痕"的半状态
// 红线: 批量升级是独立单学生事务的循环,一个学生失败不回滚他人
// 红线: 规则缺失失败关闭,绝不静默升级
// ==========================================

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::config::academic_config_trait::AcademicConfigReader;
use crate::domain::batch::{AcademicBatch, BatchSemester};
use crate::domain::student::{Student, StudentPromotionLog, StudentSemesterHistory};
use crate::domain::types::ProgressionStatus;
use crate::engine::promotion::PromotionEngine;
use crate::engine::promotion_core::EligibilityOutcome;
use crate::repository::batch_repo::AcademicBatchRepository;
use crate::repository::promotion_repo::{PromotionCommit, PromotionCommitRepository};
use crate::repository::regulation_repo::RegulationRepository;
use crate::repository::structure_repo::BatchStructureRepository;
use crate::repository::student_repo::{CreditLedgerRepository, StudentRepository};

// ==========================================
// PromotionOutcome - 单学生升级结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionOutcome {
    pub student_id: String,
    pub status: ProgressionStatus,
    pub from_year: i32,
    pub to_year: i32,
    pub year_percentage: Option<f64>,
    pub reason: String,
}

/// 批量升级结果 (独立事务循环,逐学生记账)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPromotionReport {
    pub promoted: i32,
    pub detained: i32,
    /// (student_id, 失败原因)
    pub failed: Vec<(String, String)>,
}

/// 学期滚动结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloverReport {
    /// 学年内学期推进人数
    pub advanced: i32,
    pub promoted: i32,
    pub detained: i32,
    /// 幂等跳过 (指针已指向目标学期)
    pub skipped: i32,
    pub failed: Vec<(String, String)>,
}

// ==========================================
// PromotionApi - 升级 API
// ==========================================
pub struct PromotionApi {
    student_repo: Arc<StudentRepository>,
    ledger_repo: Arc<CreditLedgerRepository>,
    regulation_repo: Arc<RegulationRepository>,
    batch_repo: Arc<AcademicBatchRepository>,
    structure_repo: Arc<BatchStructureRepository>,
    commit_repo: Arc<PromotionCommitRepository>,
}

impl PromotionApi {
    pub fn new(
        student_repo: Arc<StudentRepository>,
        ledger_repo: Arc<CreditLedgerRepository>,
        regulation_repo: Arc<RegulationRepository>,
        batch_repo: Arc<AcademicBatchRepository>,
        structure_repo: Arc<BatchStructureRepository>,
        commit_repo: Arc<PromotionCommitRepository>,
    ) -> Self {
        Self {
            student_repo,
            ledger_repo,
            regulation_repo,
            batch_repo,
            structure_repo,
            commit_repo,
        }
    }

    fn load_student(&self, student_id: &str) -> ApiResult<Student> {
        let student = self
            .student_repo
            .find_by_id(student_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Student: {student_id}")))?;
        if !student.is_active {
            return Err(ApiError::InvalidState(format!(
                "学生 {student_id} 已不在册,禁止学籍操作"
            )));
        }
        Ok(student)
    }

    fn load_batch(&self, batch_id: &str) -> ApiResult<AcademicBatch> {
        self.batch_repo
            .find_by_id(batch_id)?
            .ok_or_else(|| ApiError::NotFound(format!("AcademicBatch: {batch_id}")))
    }

    // ==========================================
    // 资格判定 (只读)
    // ==========================================

    /// 只读资格判定: 规则缺失表现为不合格,不报错
    #[instrument(skip(self))]
    pub fn evaluate_eligibility(&self, student_id: &str) -> ApiResult<EligibilityOutcome> {
        let student = self.load_student(student_id)?;
        let batch = self.load_batch(&student.batch_id)?;

        let from_year = student.current_year;
        let to_year = from_year + 1;
        let rule = self
            .regulation_repo
            .find_promotion_rule(&batch.regulation_id, from_year, to_year)?;
        let ledger =
            self.ledger_repo
                .find_by_student_year(student_id, &student.batch_id, from_year)?;

        Ok(PromotionEngine::evaluate_eligibility(
            rule.as_ref(),
            &ledger,
            from_year,
            to_year,
        ))
    }

    // ==========================================
    // 单学生升级 (三步提交协议)
    // ==========================================

    /// 对学生做升级决定并按固定写入顺序提交
    ///
    /// 合格 → PROMOTED,学籍指针前进;不合格 → DETAINED,指针不动。
    /// 两种决定都留下历史与审计日志。
    #[instrument(skip(self))]
    pub fn promote_student(
        &self,
        student_id: &str,
        decided_by: &str,
    ) -> ApiResult<PromotionOutcome> {
        let student = self.load_student(student_id)?;
        let batch = self.load_batch(&student.batch_id)?;

        let from_year = student.current_year;
        let to_year = from_year + 1;
        let to_semester_no = student.current_semester_no + 1;

        let rule = self
            .regulation_repo
            .find_promotion_rule(&batch.regulation_id, from_year, to_year)?;
        let ledger =
            self.ledger_repo
                .find_by_student_year(student_id, &student.batch_id, from_year)?;

        let decision = PromotionEngine::decide(
            &student,
            &batch.regulation_id,
            rule.as_ref(),
            &ledger,
            to_year,
            to_semester_no,
        )?;

        // 刚完成学期的台账行进历史;decide 已保证学年台账非空且定稿
        let semester_entry = ledger
            .iter()
            .find(|e| e.semester_no == student.current_semester_no)
            .or_else(|| ledger.last())
            .ok_or_else(|| {
                ApiError::PreconditionFailed(format!(
                    "学生 {student_id} 第 {from_year} 学年无学分台账"
                ))
            })?;

        let history = StudentSemesterHistory {
            history_id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            academic_year_id: semester_entry.academic_year_id.clone(),
            semester_no: student.current_semester_no,
            program_year: from_year,
            total_credits: semester_entry.total_credits_offered,
            earned_credits: semester_entry.earned_credits,
            failed_credits: semester_entry.failed_credits,
            status: decision.status,
            created_at: Utc::now(),
        };

        let log = StudentPromotionLog {
            log_id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            batch_id: student.batch_id.clone(),
            from_year,
            to_year,
            from_semester_no: decision.from_semester_no,
            to_semester_no: decision.to_semester_no,
            status: decision.status,
            reason: decision.reason.clone(),
            reason_detail: Some(decision.reason_detail.clone()),
            year_percentage: decision.year_percentage,
            decided_by: decided_by.to_string(),
            created_at: Utc::now(),
        };

        let commit = if decision.is_promoted() {
            // 升级目标学期可能尚未生成 (末学年毕业出口),指针学期号仍前进
            let target = self
                .structure_repo
                .find_semester(&student.batch_id, to_semester_no)?;

            PromotionCommit {
                history,
                log: Some(log),
                student_id: student_id.to_string(),
                batch_id: student.batch_id.clone(),
                new_year: to_year,
                new_semester_no: to_semester_no,
                new_batch_semester_id: target.map(|s| s.batch_semester_id),
                new_status: ProgressionStatus::Promoted,
                advance_batch_year: Some(to_year),
            }
        } else {
            PromotionCommit {
                history,
                log: Some(log),
                student_id: student_id.to_string(),
                batch_id: student.batch_id.clone(),
                new_year: from_year,
                new_semester_no: student.current_semester_no,
                new_batch_semester_id: student.current_batch_semester_id.clone(),
                new_status: ProgressionStatus::Detained,
                advance_batch_year: None,
            }
        };

        self.commit_repo.commit_decision(&commit)?;

        info!(student_id, status = %decision.status, "升级决定已提交");
        Ok(PromotionOutcome {
            student_id: student_id.to_string(),
            status: decision.status,
            from_year,
            to_year,
            year_percentage: decision.year_percentage,
            reason: decision.reason,
        })
    }

    // ==========================================
    // 批量升级 (独立事务循环)
    // ==========================================

    /// 对批次某学期的全部在册学生逐个做升级决定
    ///
    /// 每个学生是独立事务,单个失败记入 failed,不影响他人。
    #[instrument(skip(self))]
    pub fn promote_batch(
        &self,
        batch_id: &str,
        semester_no: i32,
        decided_by: &str,
    ) -> ApiResult<BatchPromotionReport> {
        self.load_batch(batch_id)?;
        let students = self
            .student_repo
            .find_active_by_semester(batch_id, semester_no)?;

        let mut report = BatchPromotionReport {
            promoted: 0,
            detained: 0,
            failed: Vec::new(),
        };

        for student in &students {
            match self.promote_student(&student.student_id, decided_by) {
                Ok(outcome) if outcome.status == ProgressionStatus::Promoted => {
                    report.promoted += 1
                }
                Ok(_) => report.detained += 1,
                Err(e) => {
                    warn!(student_id = %student.student_id, error = %e, "学生升级失败");
                    report.failed.push((student.student_id.clone(), e.to_string()));
                }
            }
        }

        info!(
            batch_id,
            promoted = report.promoted,
            detained = report.detained,
            failed = report.failed.len(),
            "批量升级完成"
        );
        Ok(report)
    }

    // ==========================================
    // 留级登记 (人工)
    // ==========================================

    /// 人工登记留级: 学籍指针重置到当前学年第一学期,状态置 REPEATED
    ///
    /// 留级无年级跃迁,不写升级审计日志;历史行仍然落盘。
    #[instrument(skip(self))]
    pub fn record_repeat_year(
        &self,
        student_id: &str,
        academic_year_id: &str,
        decided_by: &str,
    ) -> ApiResult<()> {
        let student = self.load_student(student_id)?;
        let repeat_year = student.current_year;

        // 该学年的首个学期
        let first_semester = self
            .structure_repo
            .find_semesters(&student.batch_id)?
            .into_iter()
            .filter(|s| s.program_year == repeat_year)
            .min_by_key(|s| s.semester_no)
            .ok_or_else(|| {
                ApiError::PreconditionFailed(format!(
                    "批次 {} 第 {repeat_year} 学年无已生成学期",
                    student.batch_id
                ))
            })?;

        let ledger = self.ledger_repo.find_by_student_semester(
            student_id,
            &student.batch_id,
            student.current_semester_no,
        )?;

        let (total, earned, failed, ay) = match &ledger {
            Some(e) => (
                e.total_credits_offered,
                e.earned_credits,
                e.failed_credits,
                e.academic_year_id.clone(),
            ),
            None => (0, 0, 0, academic_year_id.to_string()),
        };

        let commit = PromotionCommit {
            history: StudentSemesterHistory {
                history_id: Uuid::new_v4().to_string(),
                student_id: student_id.to_string(),
                academic_year_id: ay,
                semester_no: student.current_semester_no,
                program_year: repeat_year,
                total_credits: total,
                earned_credits: earned,
                failed_credits: failed,
                status: ProgressionStatus::Repeated,
                created_at: Utc::now(),
            },
            log: None,
            student_id: student_id.to_string(),
            batch_id: student.batch_id.clone(),
            new_year: repeat_year,
            new_semester_no: first_semester.semester_no,
            new_batch_semester_id: Some(first_semester.batch_semester_id.clone()),
            new_status: ProgressionStatus::Repeated,
            advance_batch_year: None,
        };

        self.commit_repo.commit_decision(&commit)?;
        info!(student_id, repeat_year, decided_by, "留级已登记");
        Ok(())
    }

    // ==========================================
    // 学期滚动 (外部调度器入口)
    // ==========================================

    /// 对今天开学的所有学期执行学籍滚动
    ///
    /// 学年内推进: 历史 + 指针,单事务,不写升级日志。
    /// 跨学年推进: 走完整升级决定 (三步提交)。
    /// 幂等: 指针已指向目标学期的学生直接跳过,重复调度无副作用。
    #[instrument(skip(self))]
    pub fn run_semester_rollover(
        &self,
        today: NaiveDate,
        academic_year_id: &str,
        decided_by: &str,
    ) -> ApiResult<RolloverReport> {
        let starting = self.structure_repo.find_semesters_starting_on(today)?;

        let mut report = RolloverReport {
            advanced: 0,
            promoted: 0,
            detained: 0,
            skipped: 0,
            failed: Vec::new(),
        };

        for target in &starting {
            // 第一学期开学不是滚动,没有前置学期
            if target.semester_no <= 1 {
                continue;
            }
            self.rollover_into(target, academic_year_id, decided_by, &mut report)?;
        }

        info!(
            date = %today,
            advanced = report.advanced,
            promoted = report.promoted,
            detained = report.detained,
            skipped = report.skipped,
            failed = report.failed.len(),
            "学期滚动完成"
        );
        Ok(report)
    }

    /// 学年标识取自全局配置的滚动入口
    pub async fn run_semester_rollover_auto(
        &self,
        config: &dyn AcademicConfigReader,
        today: NaiveDate,
        decided_by: &str,
    ) -> ApiResult<RolloverReport> {
        let academic_year_id = config
            .get_current_academic_year(today)
            .await
            .map_err(|e| ApiError::InternalError(format!("配置读取失败: {e}")))?;
        self.run_semester_rollover(today, &academic_year_id, decided_by)
    }

    /// 把前置学期的在册学生滚动进目标学期
    fn rollover_into(
        &self,
        target: &BatchSemester,
        academic_year_id: &str,
        decided_by: &str,
        report: &mut RolloverReport,
    ) -> ApiResult<()> {
        let students = self
            .student_repo
            .find_active_by_semester(&target.batch_id, target.semester_no - 1)?;

        for student in &students {
            // 幂等: 指针已到位 (同日重复调度)
            if student.current_batch_semester_id.as_deref()
                == Some(target.batch_semester_id.as_str())
            {
                report.skipped += 1;
                continue;
            }

            if target.program_year > student.current_year {
                // 跨学年: 完整升级决定
                match self.promote_student(&student.student_id, decided_by) {
                    Ok(outcome) if outcome.status == ProgressionStatus::Promoted => {
                        report.promoted += 1
                    }
                    Ok(_) => report.detained += 1,
                    Err(e) => {
                        warn!(student_id = %student.student_id, error = %e, "滚动升级失败");
                        report
                            .failed
                            .push((student.student_id.clone(), e.to_string()));
                    }
                }
                continue;
            }

            // 学年内推进: 历史 + 指针,无升级日志
            match self.advance_within_year(student, target, academic_year_id) {
                Ok(()) => report.advanced += 1,
                Err(e) => {
                    warn!(student_id = %student.student_id, error = %e, "学期推进失败");
                    report
                        .failed
                        .push((student.student_id.clone(), e.to_string()));
                }
            }
        }
        Ok(())
    }

    fn advance_within_year(
        &self,
        student: &Student,
        target: &BatchSemester,
        academic_year_id: &str,
    ) -> ApiResult<()> {
        let ledger = self.ledger_repo.find_by_student_semester(
            &student.student_id,
            &student.batch_id,
            student.current_semester_no,
        )?;

        let (total, earned, failed, ay) = match &ledger {
            Some(e) => (
                e.total_credits_offered,
                e.earned_credits,
                e.failed_credits,
                e.academic_year_id.clone(),
            ),
            None => (0, 0, 0, academic_year_id.to_string()),
        };

        let commit = PromotionCommit {
            history: StudentSemesterHistory {
                history_id: Uuid::new_v4().to_string(),
                student_id: student.student_id.clone(),
                academic_year_id: ay,
                semester_no: student.current_semester_no,
                program_year: student.current_year,
                total_credits: total,
                earned_credits: earned,
                failed_credits: failed,
                status: ProgressionStatus::Enrolled,
                created_at: Utc::now(),
            },
            log: None,
            student_id: student.student_id.clone(),
            batch_id: student.batch_id.clone(),
            new_year: student.current_year,
            new_semester_no: target.semester_no,
            new_batch_semester_id: Some(target.batch_semester_id.clone()),
            new_status: ProgressionStatus::Enrolled,
            advance_batch_year: None,
        };

        self.commit_repo.commit_decision(&commit)?;
        Ok(())
    }
}
