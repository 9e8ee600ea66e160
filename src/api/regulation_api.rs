// ==========================================
// 高校教务核心 - 培养方案 API
// ==========================================
// 职责: 培养方案及其学期/课程/升级规则的维护
// 红线: 已锁定方案拒绝一切修改;锁定是单向的,绝不解锁
// 红线: 方案更新走乐观版本校验,冲突必须显式返回给调用方重试
// ==========================================

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::regulation::{
    Regulation, RegulationPromotionRule, RegulationSemester, RegulationSubject,
};
use crate::domain::types::SubjectCategory;
use crate::engine::error::EngineError;
use crate::engine::validation::ValidationGuard;
use crate::repository::regulation_repo::RegulationRepository;

// ==========================================
// RegulationApi - 培养方案 API
// ==========================================
pub struct RegulationApi {
    regulation_repo: Arc<RegulationRepository>,
}

impl RegulationApi {
    pub fn new(regulation_repo: Arc<RegulationRepository>) -> Self {
        Self { regulation_repo }
    }

    /// 加载方案并确认未锁定 (锁定方案的任何修改路径都从这里被拒)
    fn load_unlocked(&self, regulation_id: &str) -> ApiResult<Regulation> {
        let regulation = self
            .regulation_repo
            .find_by_id(regulation_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Regulation: {regulation_id}")))?;

        if regulation.locked {
            return Err(EngineError::RegulationLocked {
                regulation_id: regulation_id.to_string(),
            }
            .into());
        }
        Ok(regulation)
    }

    /// 新建培养方案 (初始未锁定,version=1)
    #[instrument(skip(self))]
    pub fn create_regulation(
        &self,
        program_id: &str,
        code: &str,
        title: &str,
        min_pass_marks: i32,
    ) -> ApiResult<Regulation> {
        if code.trim().is_empty() || title.trim().is_empty() {
            return Err(ApiError::InvalidInput(
                "方案代码与名称不能为空".to_string(),
            ));
        }
        if min_pass_marks < 0 {
            return Err(ApiError::InvalidInput(format!(
                "及格线不能为负,实得 {min_pass_marks}"
            )));
        }
        if self.regulation_repo.find_by_code(code)?.is_some() {
            return Err(ApiError::Conflict(format!("方案代码 {code} 已存在")));
        }

        let now = Utc::now();
        let regulation = Regulation {
            regulation_id: Uuid::new_v4().to_string(),
            program_id: program_id.to_string(),
            code: code.to_string(),
            title: title.to_string(),
            min_pass_marks,
            locked: false,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        self.regulation_repo.create(&regulation)?;
        info!(regulation_id = %regulation.regulation_id, code, "培养方案已创建");
        Ok(regulation)
    }

    /// 更新方案基本信息 (乐观版本校验,version 不匹配返回并发冲突)
    #[instrument(skip(self, regulation), fields(regulation_id = %regulation.regulation_id))]
    pub fn update_regulation(&self, regulation: &Regulation) -> ApiResult<()> {
        // 锁定检查以库内当前状态为准,不信任调用方传入的 locked 字段
        self.load_unlocked(&regulation.regulation_id)?;
        self.regulation_repo.update(regulation)?;
        debug!(version = regulation.version, "方案更新完成");
        Ok(())
    }

    /// 单向锁定方案 (绑定批次定稿后调用;重复锁定是幂等空操作)
    #[instrument(skip(self))]
    pub fn lock_regulation(&self, regulation_id: &str) -> ApiResult<()> {
        self.regulation_repo.lock(regulation_id)?;
        info!(regulation_id, "方案已锁定");
        Ok(())
    }

    /// 删除方案 (被批次引用或已锁定时拒绝)
    #[instrument(skip(self))]
    pub fn delete_regulation(&self, regulation_id: &str) -> ApiResult<()> {
        self.load_unlocked(regulation_id)?;

        let referencing = self.regulation_repo.count_referencing_batches(regulation_id)?;
        if referencing > 0 {
            return Err(ApiError::InvalidState(format!(
                "方案 {regulation_id} 已被 {referencing} 个批次引用,禁止删除"
            )));
        }

        self.regulation_repo.delete(regulation_id)?;
        info!(regulation_id, "方案已删除");
        Ok(())
    }

    pub fn get_regulation(&self, regulation_id: &str) -> ApiResult<Regulation> {
        self.regulation_repo
            .find_by_id(regulation_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Regulation: {regulation_id}")))
    }

    // ==========================================
    // 学期定义
    // ==========================================

    /// 新增方案学期
    #[instrument(skip(self))]
    pub fn add_semester(
        &self,
        regulation_id: &str,
        semester_no: i32,
        program_year: i32,
        total_credits: i32,
    ) -> ApiResult<RegulationSemester> {
        self.load_unlocked(regulation_id)?;

        if semester_no < 1 || program_year < 1 {
            return Err(ApiError::InvalidInput(format!(
                "学期序号与学年必须 >= 1,实得 semester_no={semester_no}, program_year={program_year}"
            )));
        }
        if total_credits < 0 {
            return Err(ApiError::InvalidInput(format!(
                "学期总学分不能为负,实得 {total_credits}"
            )));
        }

        let semester = RegulationSemester {
            reg_semester_id: Uuid::new_v4().to_string(),
            regulation_id: regulation_id.to_string(),
            semester_no,
            program_year,
            total_credits,
        };

        self.regulation_repo.insert_semester(&semester)?;
        Ok(semester)
    }

    pub fn list_semesters(&self, regulation_id: &str) -> ApiResult<Vec<RegulationSemester>> {
        Ok(self.regulation_repo.find_semesters(regulation_id)?)
    }

    /// 删除方案学期 (仅未锁定方案)
    #[instrument(skip(self))]
    pub fn remove_semester(&self, regulation_id: &str, reg_semester_id: &str) -> ApiResult<()> {
        self.load_unlocked(regulation_id)?;
        self.regulation_repo.delete_semester(reg_semester_id)?;
        Ok(())
    }

    // ==========================================
    // 课程定义
    // ==========================================

    /// 新增方案课程
    #[instrument(skip(self))]
    pub fn add_subject(
        &self,
        regulation_id: &str,
        semester_no: i32,
        subject_code: &str,
        subject_name: &str,
        category: SubjectCategory,
        credits: i32,
        max_marks: i32,
        min_pass_marks: i32,
    ) -> ApiResult<RegulationSubject> {
        self.load_unlocked(regulation_id)?;

        if subject_code.trim().is_empty() {
            return Err(ApiError::InvalidInput("课程代码不能为空".to_string()));
        }
        if credits < 0 || max_marks <= 0 || min_pass_marks < 0 || min_pass_marks > max_marks {
            return Err(ApiError::InvalidInput(format!(
                "课程分值非法: credits={credits}, max_marks={max_marks}, min_pass_marks={min_pass_marks}"
            )));
        }

        let subject = RegulationSubject {
            reg_subject_id: Uuid::new_v4().to_string(),
            regulation_id: regulation_id.to_string(),
            semester_no,
            subject_code: subject_code.to_string(),
            subject_name: subject_name.to_string(),
            category,
            credits,
            max_marks,
            min_pass_marks,
        };

        self.regulation_repo.insert_subject(&subject)?;
        Ok(subject)
    }

    /// 更新方案课程 (仅未锁定方案)
    #[instrument(skip(self, subject), fields(reg_subject_id = %subject.reg_subject_id))]
    pub fn update_subject(&self, subject: &RegulationSubject) -> ApiResult<()> {
        self.load_unlocked(&subject.regulation_id)?;
        self.regulation_repo.update_subject(subject)?;
        Ok(())
    }

    pub fn list_subjects(&self, regulation_id: &str) -> ApiResult<Vec<RegulationSubject>> {
        Ok(self.regulation_repo.find_subjects(regulation_id)?)
    }

    /// 删除方案课程 (仅未锁定方案)
    #[instrument(skip(self))]
    pub fn remove_subject(&self, regulation_id: &str, reg_subject_id: &str) -> ApiResult<()> {
        self.load_unlocked(regulation_id)?;
        self.regulation_repo.delete_subject(reg_subject_id)?;
        Ok(())
    }

    // ==========================================
    // 升级规则
    // ==========================================

    /// 新增升级规则 (要求 to_year > from_year,阈值落在 0~100)
    #[instrument(skip(self))]
    pub fn add_promotion_rule(
        &self,
        regulation_id: &str,
        from_year: i32,
        to_year: i32,
        min_prev_year_percentage: f64,
        min_current_year_percentage: f64,
    ) -> ApiResult<RegulationPromotionRule> {
        self.load_unlocked(regulation_id)?;

        ValidationGuard::check_rule_years(from_year, to_year)?;
        ValidationGuard::check_percentage("min_prev_year_percentage", min_prev_year_percentage)?;
        ValidationGuard::check_percentage(
            "min_current_year_percentage",
            min_current_year_percentage,
        )?;

        let rule = RegulationPromotionRule {
            rule_id: Uuid::new_v4().to_string(),
            regulation_id: regulation_id.to_string(),
            from_year,
            to_year,
            min_prev_year_percentage,
            min_current_year_percentage,
        };

        self.regulation_repo.insert_promotion_rule(&rule)?;
        info!(regulation_id, from_year, to_year, "升级规则已配置");
        Ok(rule)
    }

    pub fn get_promotion_rule(
        &self,
        regulation_id: &str,
        from_year: i32,
        to_year: i32,
    ) -> ApiResult<Option<RegulationPromotionRule>> {
        Ok(self
            .regulation_repo
            .find_promotion_rule(regulation_id, from_year, to_year)?)
    }
}
