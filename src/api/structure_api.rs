// ==========================================
// 高校教务核心 - 批次结构 API
// ==========================================
// 职责: 批次建档、冻结结构生成/重建、容量分配与利用率查询
// 红线: 结构重复生成必须被拒 (AlreadyGenerated);重新生成是破坏性
//       操作,要求显式确认
// 红线: 冻结快照是值拷贝,生成后不随方案的后续编辑变动
// ==========================================

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::config::academic_config_trait::AcademicConfigReader;
use crate::domain::batch::AcademicBatch;
use crate::domain::section::{AllocationSummary, SectionUtilization};
use crate::engine::capacity_allocator::CapacityAllocator;
use crate::engine::error::EngineError;
use crate::engine::structure_generator::StructureGenerator;
use crate::engine::validation::ValidationGuard;
use crate::repository::batch_repo::AcademicBatchRepository;
use crate::repository::regulation_repo::RegulationRepository;
use crate::repository::section_repo::{LabGroupRepository, SectionRepository};
use crate::repository::structure_repo::BatchStructureRepository;

// ==========================================
// StructureSummary - 生成结果汇总
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureSummary {
    pub batch_id: String,
    pub years_created: usize,
    pub semesters_created: usize,
    pub subjects_created: usize,
}

/// 批次容量利用率视图 (班级 + 实验分组)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilizationReport {
    pub sections: Vec<SectionUtilization>,
    pub lab_groups: Vec<SectionUtilization>,
}

// ==========================================
// StructureApi - 批次结构 API
// ==========================================
pub struct StructureApi {
    regulation_repo: Arc<RegulationRepository>,
    batch_repo: Arc<AcademicBatchRepository>,
    structure_repo: Arc<BatchStructureRepository>,
    section_repo: Arc<SectionRepository>,
    lab_repo: Arc<LabGroupRepository>,
}

impl StructureApi {
    pub fn new(
        regulation_repo: Arc<RegulationRepository>,
        batch_repo: Arc<AcademicBatchRepository>,
        structure_repo: Arc<BatchStructureRepository>,
        section_repo: Arc<SectionRepository>,
        lab_repo: Arc<LabGroupRepository>,
    ) -> Self {
        Self {
            regulation_repo,
            batch_repo,
            structure_repo,
            section_repo,
            lab_repo,
        }
    }

    fn load_batch(&self, batch_id: &str) -> ApiResult<AcademicBatch> {
        self.batch_repo
            .find_by_id(batch_id)?
            .ok_or_else(|| ApiError::NotFound(format!("AcademicBatch: {batch_id}")))
    }

    // ==========================================
    // 批次建档
    // ==========================================

    /// 新建批次并绑定培养方案
    #[instrument(skip(self))]
    pub fn create_batch(
        &self,
        program_id: &str,
        regulation_id: &str,
        joining_year: i32,
    ) -> ApiResult<AcademicBatch> {
        if self.regulation_repo.find_by_id(regulation_id)?.is_none() {
            return Err(ApiError::NotFound(format!("Regulation: {regulation_id}")));
        }
        if joining_year < 1900 {
            return Err(ApiError::InvalidInput(format!(
                "入学年份非法: {joining_year}"
            )));
        }

        let now = Utc::now();
        let batch = AcademicBatch {
            batch_id: Uuid::new_v4().to_string(),
            program_id: program_id.to_string(),
            regulation_id: regulation_id.to_string(),
            joining_year,
            current_year: 1,
            total_students: 0,
            created_at: now,
            updated_at: now,
        };

        // 同专业同入学年重复建档由 UNIQUE(program_id, joining_year) 拦截
        self.batch_repo.create(&batch)?;
        info!(batch_id = %batch.batch_id, joining_year, "批次已建档");
        Ok(batch)
    }

    pub fn get_batch(&self, batch_id: &str) -> ApiResult<AcademicBatch> {
        self.load_batch(batch_id)
    }

    // ==========================================
    // 冻结结构生成
    // ==========================================

    /// 从培养方案生成批次冻结结构 (一次性操作)
    ///
    /// 结构是生成时刻的值拷贝: 方案在生成后 (锁定前) 仍可继续维护,
    /// 这些修改不回溯影响已生成批次。锁定由方案定稿流程显式触发。
    #[instrument(skip(self))]
    pub fn generate_structure(&self, batch_id: &str) -> ApiResult<StructureSummary> {
        let batch = self.load_batch(batch_id)?;

        if self.regulation_repo.find_by_id(&batch.regulation_id)?.is_none() {
            return Err(ApiError::NotFound(format!(
                "Regulation: {}",
                batch.regulation_id
            )));
        }

        if self.structure_repo.has_structure(batch_id)? {
            return Err(EngineError::AlreadyGenerated {
                batch_id: batch_id.to_string(),
            }
            .into());
        }

        let semesters = self.regulation_repo.find_semesters(&batch.regulation_id)?;
        let subjects = self.regulation_repo.find_subjects(&batch.regulation_id)?;

        let structure = StructureGenerator::generate(&batch, &semesters, &subjects)?;
        let (years, sems, subs) = structure.summary();

        self.structure_repo.insert_generated(&structure)?;

        info!(batch_id, years, semesters = sems, subjects = subs, "冻结结构已生成");
        Ok(StructureSummary {
            batch_id: batch_id.to_string(),
            years_created: years,
            semesters_created: sems,
            subjects_created: subs,
        })
    }

    /// 重建结构 (破坏性: 删除现有结构后重新生成)
    ///
    /// # 参数
    /// - confirm: 必须显式传 true,否则拒绝
    #[instrument(skip(self))]
    pub fn regenerate_structure(&self, batch_id: &str, confirm: bool) -> ApiResult<StructureSummary> {
        if !confirm {
            return Err(ApiError::PreconditionFailed(
                "重新生成结构是破坏性操作,必须显式确认 (confirm=true)".to_string(),
            ));
        }

        let batch = self.load_batch(batch_id)?;

        if !self.structure_repo.has_structure(batch_id)? {
            return Err(ApiError::PreconditionFailed(format!(
                "批次 {batch_id} 尚未生成结构,应调用 generate_structure"
            )));
        }

        // 已分配容量单元的批次不允许重建,避免悬挂的班级/分配行
        if !self.section_repo.utilization_by_batch(batch_id)?.is_empty()
            || !self.lab_repo.utilization_by_batch(batch_id)?.is_empty()
        {
            return Err(ApiError::InvalidState(format!(
                "批次 {batch_id} 已分配容量单元,禁止重建结构"
            )));
        }

        warn!(batch_id, "删除现有结构并重新生成");
        self.structure_repo.delete_structure(batch_id)?;

        let semesters = self.regulation_repo.find_semesters(&batch.regulation_id)?;
        let subjects = self.regulation_repo.find_subjects(&batch.regulation_id)?;
        let structure = StructureGenerator::generate(&batch, &semesters, &subjects)?;
        let (years, sems, subs) = structure.summary();

        self.structure_repo.insert_generated(&structure)?;

        Ok(StructureSummary {
            batch_id: batch_id.to_string(),
            years_created: years,
            semesters_created: sems,
            subjects_created: subs,
        })
    }

    /// 排定学期起止日期
    #[instrument(skip(self))]
    pub fn set_semester_dates(
        &self,
        batch_semester_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> ApiResult<()> {
        ValidationGuard::check_date_range(start_date, end_date, None)?;
        self.structure_repo
            .set_semester_dates(batch_semester_id, start_date, end_date)?;
        Ok(())
    }

    // ==========================================
    // 容量分配
    // ==========================================

    /// 按学期批量创建班级与实验分组
    #[instrument(skip(self))]
    pub fn allocate_capacity(
        &self,
        batch_id: &str,
        sections_per_semester: i32,
        section_capacity: i32,
        labs_per_semester: i32,
        lab_capacity: i32,
    ) -> ApiResult<AllocationSummary> {
        self.load_batch(batch_id)?;

        // 先生成结构再分配容量
        if !self.structure_repo.has_structure(batch_id)? {
            return Err(ApiError::PreconditionFailed(format!(
                "批次 {batch_id} 尚未生成结构,不能分配容量"
            )));
        }

        let semesters = self.structure_repo.find_semesters(batch_id)?;
        let plan = CapacityAllocator::plan(
            &semesters,
            sections_per_semester,
            section_capacity,
            labs_per_semester,
            lab_capacity,
        )?;

        self.section_repo.batch_insert(&plan.sections)?;
        self.lab_repo.batch_insert(&plan.lab_groups)?;

        info!(
            batch_id,
            sections = plan.summary.sections_created,
            labs = plan.summary.labs_created,
            "容量分配完成"
        );
        Ok(plan.summary)
    }

    /// 按全局配置默认值分配容量
    pub async fn allocate_capacity_with_defaults(
        &self,
        batch_id: &str,
        config: &dyn AcademicConfigReader,
    ) -> ApiResult<AllocationSummary> {
        let sections_per = config
            .get_default_sections_per_semester()
            .await
            .map_err(|e| ApiError::InternalError(format!("配置读取失败: {e}")))?;
        let section_cap = config
            .get_default_section_capacity()
            .await
            .map_err(|e| ApiError::InternalError(format!("配置读取失败: {e}")))?;
        let labs_per = config
            .get_default_labs_per_semester()
            .await
            .map_err(|e| ApiError::InternalError(format!("配置读取失败: {e}")))?;
        let lab_cap = config
            .get_default_lab_capacity()
            .await
            .map_err(|e| ApiError::InternalError(format!("配置读取失败: {e}")))?;

        self.allocate_capacity(batch_id, sections_per, section_cap, labs_per, lab_cap)
    }

    /// 调整班级容量上限 (不得低于当前在班人数)
    #[instrument(skip(self))]
    pub fn set_section_capacity(&self, section_id: &str, new_max: i32) -> ApiResult<()> {
        let section = self
            .section_repo
            .find_by_id(section_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Section: {section_id}")))?;

        ValidationGuard::check_capacity_not_below_enrollment(
            &section.code,
            new_max,
            section.current_strength,
        )?;

        self.section_repo.set_max_strength(section_id, new_max)?;
        Ok(())
    }

    /// 为班级指派师资 (存在性由身份协作方确认后传入)
    #[instrument(skip(self))]
    pub fn assign_section_faculty(
        &self,
        section_id: &str,
        faculty_id: &str,
        faculty_exists: bool,
    ) -> ApiResult<()> {
        ValidationGuard::check_faculty_exists(faculty_id, faculty_exists)?;
        self.section_repo.set_faculty(section_id, faculty_id)?;
        Ok(())
    }

    /// 批次容量利用率 (只读报表)
    pub fn capacity_utilization(&self, batch_id: &str) -> ApiResult<UtilizationReport> {
        Ok(UtilizationReport {
            sections: self.section_repo.utilization_by_batch(batch_id)?,
            lab_groups: self.lab_repo.utilization_by_batch(batch_id)?,
        })
    }
}
