// ==========================================
// 高校教务核心 - 分班引擎
// ==========================================
// 红线: 纯轮转计算,不写库;容量的最终裁决在仓库层的守护计数器上
// 红线: 学生按学号升序、单元按编号升序轮转,满员单元跳过并继续轮转
// 职责: 自动分班/分组的轮转计划 (round-robin, skip-full)
// ==========================================

use crate::domain::student::Student;
use tracing::{debug, instrument};

// ==========================================
// AssignmentTarget - 可分配单元的容量视图
// ==========================================
// 班级与实验分组共用同一轮转算法,引擎只关心 id/余量
#[derive(Debug, Clone)]
pub struct AssignmentTarget {
    pub unit_id: String,
    pub code: String,
    pub remaining: i32,
}

impl AssignmentTarget {
    pub fn new(unit_id: impl Into<String>, code: impl Into<String>, remaining: i32) -> Self {
        AssignmentTarget {
            unit_id: unit_id.into(),
            code: code.into(),
            remaining: remaining.max(0),
        }
    }
}

// ==========================================
// AssignmentPlan - 分班计划
// ==========================================
#[derive(Debug, Clone)]
pub struct AssignmentPlan {
    /// (student_id, unit_id) 按分配顺序
    pub placements: Vec<(String, String)>,
    /// 全部单元满员后仍未分配的学生数
    pub unassigned_count: i32,
}

// ==========================================
// AssignmentEngine - 轮转分班引擎
// ==========================================
pub struct AssignmentEngine;

impl AssignmentEngine {
    /// 轮转分配: 学生依次落入下一个有余量的单元
    ///
    /// 调用方保证 students 按学号升序、targets 按编号升序传入,
    /// 引擎不重新排序。
    #[instrument(skip(students, targets), fields(students = students.len(), targets = targets.len()))]
    pub fn plan_round_robin(students: &[Student], targets: &[AssignmentTarget]) -> AssignmentPlan {
        let mut remaining: Vec<i32> = targets.iter().map(|t| t.remaining).collect();
        let mut placements = Vec::with_capacity(students.len());
        let mut unassigned = 0;
        let mut cursor = 0usize;

        for student in students {
            match next_open_slot(&remaining, cursor) {
                Some(idx) => {
                    remaining[idx] -= 1;
                    placements.push((student.student_id.clone(), targets[idx].unit_id.clone()));
                    cursor = idx + 1;
                }
                None => unassigned += 1,
            }
        }

        debug!(
            placed = placements.len(),
            unassigned, "轮转分班计划完成"
        );

        AssignmentPlan {
            placements,
            unassigned_count: unassigned,
        }
    }
}

/// 从 cursor 起环形查找下一个有余量的单元
fn next_open_slot(remaining: &[i32], cursor: usize) -> Option<usize> {
    if remaining.is_empty() {
        return None;
    }
    let n = remaining.len();
    (0..n)
        .map(|step| (cursor + step) % n)
        .find(|&idx| remaining[idx] > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ProgressionStatus;
    use chrono::Utc;

    fn test_student(roll: i32) -> Student {
        Student {
            student_id: format!("S{roll:03}"),
            batch_id: "B001".to_string(),
            roll_no: format!("24CS{roll:03}"),
            current_year: 1,
            current_semester_no: 1,
            current_batch_semester_id: Some("BS1".to_string()),
            status: ProgressionStatus::Enrolled,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn students(n: i32) -> Vec<Student> {
        (1..=n).map(test_student).collect()
    }

    fn count_per_unit(plan: &AssignmentPlan, unit_id: &str) -> usize {
        plan.placements.iter().filter(|(_, u)| u == unit_id).count()
    }

    #[test]
    fn test_round_robin_even_spread() {
        // 10 学生轮转进 3 个班,人数差不超过 1
        let targets = vec![
            AssignmentTarget::new("SEC-A", "A", 60),
            AssignmentTarget::new("SEC-B", "B", 60),
            AssignmentTarget::new("SEC-C", "C", 60),
        ];
        let plan = AssignmentEngine::plan_round_robin(&students(10), &targets);

        assert_eq!(plan.placements.len(), 10);
        assert_eq!(plan.unassigned_count, 0);

        let counts = [
            count_per_unit(&plan, "SEC-A"),
            count_per_unit(&plan, "SEC-B"),
            count_per_unit(&plan, "SEC-C"),
        ];
        let max = counts.iter().max().copied().unwrap_or(0);
        let min = counts.iter().min().copied().unwrap_or(0);
        assert!(max - min <= 1, "人数分布 {counts:?} 差值超过 1");
    }

    #[test]
    fn test_round_robin_skips_full_unit() {
        // B 班满员,学生在 A/C 间轮转
        let targets = vec![
            AssignmentTarget::new("SEC-A", "A", 3),
            AssignmentTarget::new("SEC-B", "B", 0),
            AssignmentTarget::new("SEC-C", "C", 3),
        ];
        let plan = AssignmentEngine::plan_round_robin(&students(6), &targets);

        assert_eq!(plan.placements.len(), 6);
        assert_eq!(count_per_unit(&plan, "SEC-A"), 3);
        assert_eq!(count_per_unit(&plan, "SEC-B"), 0);
        assert_eq!(count_per_unit(&plan, "SEC-C"), 3);
    }

    #[test]
    fn test_round_robin_mid_stream_fill() {
        // A 只剩 1 个位置,填满后剩余学生继续在 B/C 轮转
        let targets = vec![
            AssignmentTarget::new("SEC-A", "A", 1),
            AssignmentTarget::new("SEC-B", "B", 10),
            AssignmentTarget::new("SEC-C", "C", 10),
        ];
        let plan = AssignmentEngine::plan_round_robin(&students(7), &targets);

        assert_eq!(plan.placements.len(), 7);
        assert_eq!(count_per_unit(&plan, "SEC-A"), 1);
        assert_eq!(count_per_unit(&plan, "SEC-B"), 3);
        assert_eq!(count_per_unit(&plan, "SEC-C"), 3);
    }

    #[test]
    fn test_round_robin_all_full_reports_unassigned() {
        let targets = vec![
            AssignmentTarget::new("SEC-A", "A", 2),
            AssignmentTarget::new("SEC-B", "B", 2),
        ];
        let plan = AssignmentEngine::plan_round_robin(&students(7), &targets);

        assert_eq!(plan.placements.len(), 4);
        assert_eq!(plan.unassigned_count, 3);
    }

    #[test]
    fn test_round_robin_no_targets() {
        let plan = AssignmentEngine::plan_round_robin(&students(3), &[]);
        assert!(plan.placements.is_empty());
        assert_eq!(plan.unassigned_count, 3);
    }

    #[test]
    fn test_round_robin_deterministic_order() {
        // 同输入两次计算得到相同排列
        let targets = vec![
            AssignmentTarget::new("SEC-A", "A", 5),
            AssignmentTarget::new("SEC-B", "B", 5),
        ];
        let s = students(4);
        let p1 = AssignmentEngine::plan_round_robin(&s, &targets);
        let p2 = AssignmentEngine::plan_round_robin(&s, &targets);
        assert_eq!(p1.placements, p2.placements);
        // 首位学生进首个班
        assert_eq!(p1.placements[0], ("S001".to_string(), "SEC-A".to_string()));
        assert_eq!(p1.placements[1], ("S002".to_string(), "SEC-B".to_string()));
    }
}
