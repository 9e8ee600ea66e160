// ==========================================
// 高校教务核心 - 容量分配引擎
// ==========================================
// 红线: 只做纯计算,产出班级/实验分组的创建计划;落库由 API 层完成
// 红线: 每个容量单元初始 current_strength 恒为 0,容量上限必须为正
// 职责: 按学期批量规划班级(Section)与实验分组(LabGroup)及汇总统计
// ==========================================

use crate::domain::batch::BatchSemester;
use crate::domain::section::{AllocationSummary, LabGroup, Section};
use crate::engine::error::{EngineError, EngineResult};
use tracing::{debug, instrument};
use uuid::Uuid;

// ==========================================
// AllocationPlan - 分配计划
// ==========================================
#[derive(Debug, Clone)]
pub struct AllocationPlan {
    pub sections: Vec<Section>,
    pub lab_groups: Vec<LabGroup>,
    pub summary: AllocationSummary,
}

// ==========================================
// CapacityAllocator - 容量分配引擎
// ==========================================
pub struct CapacityAllocator;

impl CapacityAllocator {
    /// 为批次全部学期规划容量单元
    ///
    /// # 参数
    /// - semesters: 批次的已生成学期
    /// - sections_per_semester / labs_per_semester: 每学期单元数 (允许为 0)
    /// - section_capacity / lab_capacity: 单元容量上限 (数量 > 0 时必须为正)
    #[instrument(skip(semesters))]
    pub fn plan(
        semesters: &[BatchSemester],
        sections_per_semester: i32,
        section_capacity: i32,
        labs_per_semester: i32,
        lab_capacity: i32,
    ) -> EngineResult<AllocationPlan> {
        if semesters.is_empty() {
            return Err(EngineError::InvalidState(
                "批次尚未生成学期结构,无法分配容量".to_string(),
            ));
        }
        if sections_per_semester < 0 || labs_per_semester < 0 {
            return Err(EngineError::Validation(
                "每学期的班级/实验分组数量不能为负".to_string(),
            ));
        }
        if sections_per_semester > 0 && section_capacity <= 0 {
            return Err(EngineError::Validation(format!(
                "班级容量上限必须为正,实得 {section_capacity}"
            )));
        }
        if labs_per_semester > 0 && lab_capacity <= 0 {
            return Err(EngineError::Validation(format!(
                "实验分组容量上限必须为正,实得 {lab_capacity}"
            )));
        }

        let mut sections = Vec::new();
        let mut lab_groups = Vec::new();

        for semester in semesters {
            for i in 0..sections_per_semester {
                sections.push(Section {
                    section_id: Uuid::new_v4().to_string(),
                    batch_semester_id: semester.batch_semester_id.clone(),
                    code: section_code(i),
                    max_strength: section_capacity,
                    current_strength: 0,
                    faculty_id: None,
                });
            }
            for i in 0..labs_per_semester {
                lab_groups.push(LabGroup {
                    lab_group_id: Uuid::new_v4().to_string(),
                    batch_semester_id: semester.batch_semester_id.clone(),
                    code: format!("LG{}", i + 1),
                    max_strength: lab_capacity,
                    current_strength: 0,
                    faculty_id: None,
                });
            }
        }

        let summary = AllocationSummary {
            sections_created: sections.len() as i32,
            labs_created: lab_groups.len() as i32,
            total_section_capacity: sections.len() as i32 * section_capacity.max(0),
            total_lab_capacity: lab_groups.len() as i32 * lab_capacity.max(0),
        };

        debug!(
            sections = summary.sections_created,
            labs = summary.labs_created,
            "容量分配计划完成"
        );

        Ok(AllocationPlan {
            sections,
            lab_groups,
            summary,
        })
    }
}

/// 班级编号: 0→A, 1→B, ... 25→Z, 26→AA, 27→AB ...
fn section_code(index: i32) -> String {
    let mut n = index;
    let mut code = String::new();
    loop {
        let rem = (n % 26) as u8;
        code.insert(0, (b'A' + rem) as char);
        n = n / 26 - 1;
        if n < 0 {
            break;
        }
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_semesters(count: i32) -> Vec<BatchSemester> {
        (1..=count)
            .map(|no| BatchSemester {
                batch_semester_id: format!("BS{no}"),
                batch_id: "B001".to_string(),
                program_year_id: format!("PY{}", (no + 1) / 2),
                semester_no: no,
                program_year: (no + 1) / 2,
                total_credits: 24,
                start_date: None,
                end_date: None,
            })
            .collect()
    }

    #[test]
    fn test_section_code_sequence() {
        assert_eq!(section_code(0), "A");
        assert_eq!(section_code(1), "B");
        assert_eq!(section_code(25), "Z");
        assert_eq!(section_code(26), "AA");
        assert_eq!(section_code(27), "AB");
        assert_eq!(section_code(51), "AZ");
        assert_eq!(section_code(52), "BA");
    }

    #[test]
    fn test_plan_summary_arithmetic() {
        // 8 学期 × 2 班@60 + 6 分组@20
        let semesters = test_semesters(8);
        let plan = CapacityAllocator::plan(&semesters, 2, 60, 6, 20).unwrap();

        assert_eq!(plan.summary.sections_created, 16);
        assert_eq!(plan.summary.labs_created, 48);
        assert_eq!(plan.summary.total_section_capacity, 960);
        assert_eq!(plan.summary.total_lab_capacity, 960);
    }

    #[test]
    fn test_plan_initial_strength_zero() {
        let semesters = test_semesters(2);
        let plan = CapacityAllocator::plan(&semesters, 3, 50, 2, 25).unwrap();

        assert!(plan.sections.iter().all(|s| s.current_strength == 0));
        assert!(plan.lab_groups.iter().all(|g| g.current_strength == 0));
        // 学期内编号 A/B/C 与 LG1/LG2
        assert_eq!(plan.sections[0].code, "A");
        assert_eq!(plan.sections[2].code, "C");
        assert_eq!(plan.lab_groups[0].code, "LG1");
        assert_eq!(plan.lab_groups[1].code, "LG2");
    }

    #[test]
    fn test_plan_rejects_nonpositive_capacity() {
        let semesters = test_semesters(1);
        assert!(CapacityAllocator::plan(&semesters, 2, 0, 0, 0).is_err());
        assert!(CapacityAllocator::plan(&semesters, 0, 0, 1, -5).is_err());
        assert!(CapacityAllocator::plan(&semesters, -1, 60, 0, 0).is_err());
    }

    #[test]
    fn test_plan_allows_zero_units() {
        let semesters = test_semesters(2);
        let plan = CapacityAllocator::plan(&semesters, 0, 0, 0, 0).unwrap();
        assert_eq!(plan.summary.sections_created, 0);
        assert_eq!(plan.summary.total_lab_capacity, 0);
    }

    #[test]
    fn test_plan_rejects_empty_semesters() {
        let result = CapacityAllocator::plan(&[], 2, 60, 0, 0);
        assert!(matches!(result, Err(EngineError::InvalidState(_))));
    }
}
