// ==========================================
// 高校教务核心 - 校验守卫
// ==========================================
// 红线: 无状态纯规则,只判定不修正——绝不悄悄截断/钳制输入值
// 红线: 守卫自身不读写数据库;需要的事实 (现有编号、师资存在性)
//       由调用方查好后传入
// 职责: 写路径前置的同步校验规则
// ==========================================

use crate::engine::error::{EngineError, EngineResult};
use chrono::NaiveDate;

pub struct ValidationGuard;

impl ValidationGuard {
    /// 容量上限不得降到当前在班人数以下
    pub fn check_capacity_not_below_enrollment(
        unit_code: &str,
        new_max: i32,
        current_strength: i32,
    ) -> EngineResult<()> {
        if new_max <= 0 {
            return Err(EngineError::Validation(format!(
                "单元 {unit_code} 容量上限必须为正,实得 {new_max}"
            )));
        }
        if new_max < current_strength {
            return Err(EngineError::InvalidState(format!(
                "单元 {unit_code} 当前在班 {current_strength} 人,容量不能降到 {new_max}"
            )));
        }
        Ok(())
    }

    /// 学期日期区间: start <= end,且整体落在父区间内 (如提供)
    pub fn check_date_range(
        start: NaiveDate,
        end: NaiveDate,
        parent: Option<(NaiveDate, NaiveDate)>,
    ) -> EngineResult<()> {
        if start > end {
            return Err(EngineError::Validation(format!(
                "学期开始日期 {start} 晚于结束日期 {end}"
            )));
        }
        if let Some((p_start, p_end)) = parent {
            if start < p_start || end > p_end {
                return Err(EngineError::Validation(format!(
                    "学期区间 {start}~{end} 超出学年区间 {p_start}~{p_end}"
                )));
            }
        }
        Ok(())
    }

    /// 班级/实验分组编号在同一学期范围内唯一
    pub fn check_code_unique(
        scope: &str,
        code: &str,
        existing_codes: &[String],
    ) -> EngineResult<()> {
        if code.trim().is_empty() {
            return Err(EngineError::Validation(format!("{scope} 编号不能为空")));
        }
        if existing_codes.iter().any(|c| c == code) {
            return Err(EngineError::DuplicateCode {
                scope: scope.to_string(),
                code: code.to_string(),
            });
        }
        Ok(())
    }

    /// 师资指派前确认其存在 (存在性由调用方查询)
    pub fn check_faculty_exists(faculty_id: &str, exists: bool) -> EngineResult<()> {
        if !exists {
            return Err(EngineError::NotFound {
                entity: "faculty".to_string(),
                id: faculty_id.to_string(),
            });
        }
        Ok(())
    }

    /// 升级规则阈值必须落在 0..=100
    pub fn check_percentage(field: &str, value: f64) -> EngineResult<()> {
        if !(0.0..=100.0).contains(&value) || !value.is_finite() {
            return Err(EngineError::Validation(format!(
                "{field} 必须在 0~100 之间,实得 {value}"
            )));
        }
        Ok(())
    }

    /// 升级规则学年必须前向 (to_year > from_year)
    pub fn check_rule_years(from_year: i32, to_year: i32) -> EngineResult<()> {
        if from_year < 1 {
            return Err(EngineError::Validation(format!(
                "from_year 必须 >= 1,实得 {from_year}"
            )));
        }
        if to_year <= from_year {
            return Err(EngineError::Validation(format!(
                "升级规则要求 to_year > from_year,实得 {from_year}→{to_year}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_capacity_guard() {
        assert!(ValidationGuard::check_capacity_not_below_enrollment("A", 60, 45).is_ok());
        assert!(ValidationGuard::check_capacity_not_below_enrollment("A", 45, 45).is_ok());
        // 降到在班人数以下 → InvalidState
        assert!(matches!(
            ValidationGuard::check_capacity_not_below_enrollment("A", 40, 45),
            Err(EngineError::InvalidState(_))
        ));
        assert!(ValidationGuard::check_capacity_not_below_enrollment("A", 0, 0).is_err());
    }

    #[test]
    fn test_date_range_guard() {
        assert!(ValidationGuard::check_date_range(d("2024-08-01"), d("2024-12-20"), None).is_ok());
        assert!(ValidationGuard::check_date_range(d("2024-12-20"), d("2024-08-01"), None).is_err());

        let parent = Some((d("2024-07-01"), d("2025-06-30")));
        assert!(ValidationGuard::check_date_range(d("2024-08-01"), d("2024-12-20"), parent).is_ok());
        // 结束日期越过学年边界
        assert!(
            ValidationGuard::check_date_range(d("2025-05-01"), d("2025-07-10"), parent).is_err()
        );
    }

    #[test]
    fn test_code_unique_guard() {
        let existing = vec!["A".to_string(), "B".to_string()];
        assert!(ValidationGuard::check_code_unique("section", "C", &existing).is_ok());
        assert!(matches!(
            ValidationGuard::check_code_unique("section", "B", &existing),
            Err(EngineError::DuplicateCode { .. })
        ));
        assert!(ValidationGuard::check_code_unique("section", "  ", &existing).is_err());
    }

    #[test]
    fn test_faculty_guard() {
        assert!(ValidationGuard::check_faculty_exists("F001", true).is_ok());
        assert!(matches!(
            ValidationGuard::check_faculty_exists("F404", false),
            Err(EngineError::NotFound { .. })
        ));
    }

    #[test]
    fn test_percentage_guard() {
        assert!(ValidationGuard::check_percentage("min_current_year_percentage", 50.0).is_ok());
        assert!(ValidationGuard::check_percentage("min_current_year_percentage", 0.0).is_ok());
        assert!(ValidationGuard::check_percentage("min_current_year_percentage", 100.0).is_ok());
        assert!(ValidationGuard::check_percentage("p", -0.1).is_err());
        assert!(ValidationGuard::check_percentage("p", 100.1).is_err());
        assert!(ValidationGuard::check_percentage("p", f64::NAN).is_err());
    }

    #[test]
    fn test_rule_years_guard() {
        assert!(ValidationGuard::check_rule_years(1, 2).is_ok());
        assert!(ValidationGuard::check_rule_years(2, 2).is_err());
        assert!(ValidationGuard::check_rule_years(3, 2).is_err());
        assert!(ValidationGuard::check_rule_years(0, 1).is_err());
    }
}
