// ==========================================
// 高校教务核心 - 结构生成引擎
// ==========================================
// 红线: 纯值拷贝,不做任何解释或默认填充——生成结果是方案在
//       生成时刻的逐字段快照
// 红线: 不直接写库,只计算并返回生成结构;落库由 API 层事务化完成
// 职责: 方案学期/课程 → 批次学年/学期/课程 的冻结拷贝
// 输入: batch + regulation_semester + regulation_subject
// 输出: GeneratedStructure { years, semesters, subjects }
// ==========================================

use crate::domain::batch::{
    AcademicBatch, BatchSemester, BatchSubject, GeneratedStructure, ProgramYear,
};
use crate::domain::regulation::{RegulationSemester, RegulationSubject};
use crate::engine::error::{EngineError, EngineResult};
use std::collections::BTreeMap;
use tracing::{debug, instrument};
use uuid::Uuid;

// ==========================================
// StructureGenerator - 结构生成引擎
// ==========================================
pub struct StructureGenerator;

impl StructureGenerator {
    /// 为批次生成冻结结构
    ///
    /// # 参数
    /// - batch: 已绑定方案的批次
    /// - semesters: 方案的全部学期定义
    /// - subjects: 方案的全部课程定义
    ///
    /// # 错误
    /// - `EngineError::InvalidState`: 方案不含任何学期
    #[instrument(skip(semesters, subjects), fields(batch_id = %batch.batch_id))]
    pub fn generate(
        batch: &AcademicBatch,
        semesters: &[RegulationSemester],
        subjects: &[RegulationSubject],
    ) -> EngineResult<GeneratedStructure> {
        if semesters.is_empty() {
            return Err(EngineError::InvalidState(format!(
                "方案 regulation_id={} 不含任何学期定义,无法生成结构",
                batch.regulation_id
            )));
        }

        // === 步骤 1: 按出现的 program_year 去重生成学年 (BTreeMap 保证升序稳定) ===
        let mut years: BTreeMap<i32, ProgramYear> = BTreeMap::new();
        for semester in semesters {
            years.entry(semester.program_year).or_insert_with(|| ProgramYear {
                program_year_id: Uuid::new_v4().to_string(),
                batch_id: batch.batch_id.clone(),
                year_no: semester.program_year,
            });
        }

        // === 步骤 2: 逐学期拷贝 ===
        let mut batch_semesters = Vec::with_capacity(semesters.len());
        let mut semester_ids: BTreeMap<i32, String> = BTreeMap::new();
        for semester in semesters {
            // 学年已在步骤 1 全量生成
            let program_year_id = years
                .get(&semester.program_year)
                .map(|y| y.program_year_id.clone())
                .unwrap_or_default();

            let batch_semester_id = Uuid::new_v4().to_string();
            semester_ids.insert(semester.semester_no, batch_semester_id.clone());

            batch_semesters.push(BatchSemester {
                batch_semester_id,
                batch_id: batch.batch_id.clone(),
                program_year_id,
                semester_no: semester.semester_no,
                program_year: semester.program_year,
                total_credits: semester.total_credits,
                start_date: None,
                end_date: None,
            });
        }

        // === 步骤 3: 逐课程拷贝 (全部分值/学分字段按值复制) ===
        let mut batch_subjects = Vec::with_capacity(subjects.len());
        for subject in subjects {
            let batch_semester_id = match semester_ids.get(&subject.semester_no) {
                Some(id) => id.clone(),
                None => {
                    // 课程挂在未定义的学期上属于方案数据错误
                    return Err(EngineError::InvalidState(format!(
                        "课程 subject_code={} 引用了方案中不存在的学期 semester_no={}",
                        subject.subject_code, subject.semester_no
                    )));
                }
            };

            batch_subjects.push(BatchSubject {
                batch_subject_id: Uuid::new_v4().to_string(),
                batch_id: batch.batch_id.clone(),
                batch_semester_id,
                subject_code: subject.subject_code.clone(),
                subject_name: subject.subject_name.clone(),
                category: subject.category.to_db_str().to_string(),
                credits: subject.credits,
                max_marks: subject.max_marks,
                min_pass_marks: subject.min_pass_marks,
            });
        }

        let structure = GeneratedStructure {
            years: years.into_values().collect(),
            semesters: batch_semesters,
            subjects: batch_subjects,
        };

        let (y, s, c) = structure.summary();
        debug!(years = y, semesters = s, subjects = c, "结构生成完成");

        Ok(structure)
    }
}
