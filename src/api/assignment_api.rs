// ==========================================
// 高校教务核心 - 分班 API
// ==========================================
// 职责: 自动轮转分班/分组、人工分班与改派、名册查询
// 红线: 容量以仓库层守护计数器的写时校验为最终裁决,
//       引擎计划只是参考 (并发占满时单个学生落空,不是错误)
// 红线: 同一学生同一学期至多一条有效分配,改派必须整体换行
// ==========================================

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::section::{StudentLabAssignment, StudentSectionAssignment};
use crate::domain::student::Student;
use crate::domain::types::AssignmentType;
use crate::engine::assignment::{AssignmentEngine, AssignmentTarget};
use crate::repository::assignment_repo::{LabAssignmentRepository, SectionAssignmentRepository};
use crate::repository::error::RepositoryError;
use crate::repository::section_repo::{LabGroupRepository, SectionRepository};
use crate::repository::structure_repo::BatchStructureRepository;
use crate::repository::student_repo::StudentRepository;

// ==========================================
// AutoAssignReport - 自动分班结果
// ==========================================
// 单元占满导致的落空是可报告的部分结果,不是错误
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoAssignReport {
    pub assigned_count: i32,
    pub unassigned_count: i32,
}

// ==========================================
// AssignmentApi - 分班 API
// ==========================================
pub struct AssignmentApi {
    student_repo: Arc<StudentRepository>,
    structure_repo: Arc<BatchStructureRepository>,
    section_repo: Arc<SectionRepository>,
    lab_repo: Arc<LabGroupRepository>,
    section_assignment_repo: Arc<SectionAssignmentRepository>,
    lab_assignment_repo: Arc<LabAssignmentRepository>,
}

impl AssignmentApi {
    pub fn new(
        student_repo: Arc<StudentRepository>,
        structure_repo: Arc<BatchStructureRepository>,
        section_repo: Arc<SectionRepository>,
        lab_repo: Arc<LabGroupRepository>,
        section_assignment_repo: Arc<SectionAssignmentRepository>,
        lab_assignment_repo: Arc<LabAssignmentRepository>,
    ) -> Self {
        Self {
            student_repo,
            structure_repo,
            section_repo,
            lab_repo,
            section_assignment_repo,
            lab_assignment_repo,
        }
    }

    fn load_student(&self, student_id: &str) -> ApiResult<Student> {
        self.student_repo
            .find_by_id(student_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Student: {student_id}")))
    }

    // ==========================================
    // 自动轮转分班
    // ==========================================

    /// 对批次某学期的全部未分班学生执行轮转分班
    #[instrument(skip(self))]
    pub fn auto_assign(
        &self,
        batch_id: &str,
        semester_no: i32,
        assigned_by: &str,
    ) -> ApiResult<AutoAssignReport> {
        let semester = self
            .structure_repo
            .find_semester(batch_id, semester_no)?
            .ok_or_else(|| {
                ApiError::NotFound(format!("BatchSemester: {batch_id}/{semester_no}"))
            })?;

        let students = self.student_repo.find_without_section(batch_id, semester_no)?;
        let sections = self.section_repo.find_by_semester(&semester.batch_semester_id)?;

        let targets: Vec<AssignmentTarget> = sections
            .iter()
            .map(|s| {
                AssignmentTarget::new(
                    s.section_id.clone(),
                    s.code.clone(),
                    s.max_strength - s.current_strength,
                )
            })
            .collect();

        let plan = AssignmentEngine::plan_round_robin(&students, &targets);
        let mut assigned = 0;
        let mut unassigned = plan.unassigned_count;

        for (student_id, section_id) in &plan.placements {
            let assignment = StudentSectionAssignment {
                assignment_id: Uuid::new_v4().to_string(),
                student_id: student_id.clone(),
                batch_id: batch_id.to_string(),
                batch_semester_id: semester.batch_semester_id.clone(),
                semester_no,
                section_id: section_id.clone(),
                assignment_type: AssignmentType::Auto,
                is_active: true,
                assigned_by: assigned_by.to_string(),
                assigned_at: Utc::now(),
            };

            match self.section_assignment_repo.insert_active(&assignment) {
                Ok(_) => assigned += 1,
                // 并发竞争把单元占满: 计划失效,该生落空,继续其他学生
                Err(RepositoryError::CapacityExceeded { .. }) => {
                    warn!(student_id = %student_id, section_id = %section_id, "写入时容量已满,学生落空");
                    unassigned += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(batch_id, semester_no, assigned, unassigned, "自动分班完成");
        Ok(AutoAssignReport {
            assigned_count: assigned,
            unassigned_count: unassigned,
        })
    }

    /// 对批次某学期的全部未分组学生执行轮转实验分组
    #[instrument(skip(self))]
    pub fn auto_assign_labs(
        &self,
        batch_id: &str,
        semester_no: i32,
        assigned_by: &str,
    ) -> ApiResult<AutoAssignReport> {
        let semester = self
            .structure_repo
            .find_semester(batch_id, semester_no)?
            .ok_or_else(|| {
                ApiError::NotFound(format!("BatchSemester: {batch_id}/{semester_no}"))
            })?;

        let students = self.student_repo.find_without_lab(batch_id, semester_no)?;
        let labs = self.lab_repo.find_by_semester(&semester.batch_semester_id)?;

        let targets: Vec<AssignmentTarget> = labs
            .iter()
            .map(|g| {
                AssignmentTarget::new(
                    g.lab_group_id.clone(),
                    g.code.clone(),
                    g.max_strength - g.current_strength,
                )
            })
            .collect();

        let plan = AssignmentEngine::plan_round_robin(&students, &targets);
        let mut assigned = 0;
        let mut unassigned = plan.unassigned_count;

        for (student_id, lab_group_id) in &plan.placements {
            let assignment = StudentLabAssignment {
                assignment_id: Uuid::new_v4().to_string(),
                student_id: student_id.clone(),
                batch_id: batch_id.to_string(),
                batch_semester_id: semester.batch_semester_id.clone(),
                semester_no,
                lab_group_id: lab_group_id.clone(),
                assignment_type: AssignmentType::Auto,
                is_active: true,
                assigned_by: assigned_by.to_string(),
                assigned_at: Utc::now(),
            };

            match self.lab_assignment_repo.insert_active(&assignment) {
                Ok(_) => assigned += 1,
                Err(RepositoryError::CapacityExceeded { .. }) => {
                    warn!(student_id = %student_id, lab_group_id = %lab_group_id, "写入时分组已满,学生落空");
                    unassigned += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(batch_id, semester_no, assigned, unassigned, "自动实验分组完成");
        Ok(AutoAssignReport {
            assigned_count: assigned,
            unassigned_count: unassigned,
        })
    }

    // ==========================================
    // 人工分班与改派
    // ==========================================

    /// 人工分班 (容量在写入事务中重新校验,不复用陈旧读取)
    #[instrument(skip(self))]
    pub fn manual_assign(
        &self,
        student_id: &str,
        section_id: &str,
        assigned_by: &str,
    ) -> ApiResult<String> {
        let student = self.load_student(student_id)?;
        let section = self
            .section_repo
            .find_by_id(section_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Section: {section_id}")))?;
        let semester = self
            .structure_repo
            .find_semester_by_id(&section.batch_semester_id)?
            .ok_or_else(|| {
                ApiError::NotFound(format!("BatchSemester: {}", section.batch_semester_id))
            })?;

        if semester.batch_id != student.batch_id {
            return Err(ApiError::InvalidInput(format!(
                "班级 {section_id} 不属于学生所在批次 {}",
                student.batch_id
            )));
        }

        if self
            .section_assignment_repo
            .find_active(student_id, &student.batch_id, semester.semester_no)?
            .is_some()
        {
            return Err(ApiError::Conflict(format!(
                "学生 {student_id} 本学期已有有效分班,应使用改派"
            )));
        }

        let assignment = StudentSectionAssignment {
            assignment_id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            batch_id: student.batch_id.clone(),
            batch_semester_id: section.batch_semester_id.clone(),
            semester_no: semester.semester_no,
            section_id: section_id.to_string(),
            assignment_type: AssignmentType::Manual,
            is_active: true,
            assigned_by: assigned_by.to_string(),
            assigned_at: Utc::now(),
        };

        let id = self.section_assignment_repo.insert_active(&assignment)?;
        info!(student_id, section_id, "人工分班完成");
        Ok(id)
    }

    /// 改派: 旧分配软删除 + 旧班级递减 + 新分配写入 + 新班级递增,单事务
    #[instrument(skip(self))]
    pub fn reassign_section(
        &self,
        student_id: &str,
        new_section_id: &str,
        assigned_by: &str,
    ) -> ApiResult<String> {
        let student = self.load_student(student_id)?;
        let new_section = self
            .section_repo
            .find_by_id(new_section_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Section: {new_section_id}")))?;
        let semester = self
            .structure_repo
            .find_semester_by_id(&new_section.batch_semester_id)?
            .ok_or_else(|| {
                ApiError::NotFound(format!("BatchSemester: {}", new_section.batch_semester_id))
            })?;

        let current = self
            .section_assignment_repo
            .find_active(student_id, &student.batch_id, semester.semester_no)?
            .ok_or_else(|| {
                ApiError::PreconditionFailed(format!(
                    "学生 {student_id} 本学期没有有效分班,应先人工分班"
                ))
            })?;

        if current.section_id == new_section_id {
            return Err(ApiError::InvalidInput(format!(
                "学生 {student_id} 已在班级 {new_section_id},无需改派"
            )));
        }

        let new_assignment = StudentSectionAssignment {
            assignment_id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            batch_id: student.batch_id.clone(),
            batch_semester_id: new_section.batch_semester_id.clone(),
            semester_no: semester.semester_no,
            section_id: new_section_id.to_string(),
            assignment_type: AssignmentType::Manual,
            is_active: true,
            assigned_by: assigned_by.to_string(),
            assigned_at: Utc::now(),
        };

        let id = self.section_assignment_repo.reassign(
            &current.assignment_id,
            &current.section_id,
            &new_assignment,
        )?;
        info!(student_id, from = %current.section_id, to = new_section_id, "改派完成");
        Ok(id)
    }

    /// 实验分组改派
    #[instrument(skip(self))]
    pub fn reassign_lab(
        &self,
        student_id: &str,
        new_lab_group_id: &str,
        assigned_by: &str,
    ) -> ApiResult<String> {
        let student = self.load_student(student_id)?;
        let new_lab = self
            .lab_repo
            .find_by_id(new_lab_group_id)?
            .ok_or_else(|| ApiError::NotFound(format!("LabGroup: {new_lab_group_id}")))?;
        let semester = self
            .structure_repo
            .find_semester_by_id(&new_lab.batch_semester_id)?
            .ok_or_else(|| {
                ApiError::NotFound(format!("BatchSemester: {}", new_lab.batch_semester_id))
            })?;

        let current = self
            .lab_assignment_repo
            .find_active(student_id, &student.batch_id, semester.semester_no)?
            .ok_or_else(|| {
                ApiError::PreconditionFailed(format!(
                    "学生 {student_id} 本学期没有有效实验分组"
                ))
            })?;

        if current.lab_group_id == new_lab_group_id {
            return Err(ApiError::InvalidInput(format!(
                "学生 {student_id} 已在分组 {new_lab_group_id},无需改派"
            )));
        }

        let new_assignment = StudentLabAssignment {
            assignment_id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            batch_id: student.batch_id.clone(),
            batch_semester_id: new_lab.batch_semester_id.clone(),
            semester_no: semester.semester_no,
            lab_group_id: new_lab_group_id.to_string(),
            assignment_type: AssignmentType::Manual,
            is_active: true,
            assigned_by: assigned_by.to_string(),
            assigned_at: Utc::now(),
        };

        let id = self.lab_assignment_repo.reassign(
            &current.assignment_id,
            &current.lab_group_id,
            &new_assignment,
        )?;
        info!(student_id, to = new_lab_group_id, "实验分组改派完成");
        Ok(id)
    }

    // ==========================================
    // 名册查询
    // ==========================================

    pub fn section_roster(&self, section_id: &str) -> ApiResult<Vec<StudentSectionAssignment>> {
        Ok(self.section_assignment_repo.find_roster(section_id)?)
    }

    pub fn lab_roster(&self, lab_group_id: &str) -> ApiResult<Vec<StudentLabAssignment>> {
        Ok(self.lab_assignment_repo.find_roster(lab_group_id)?)
    }
}
