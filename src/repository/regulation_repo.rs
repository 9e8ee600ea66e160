// ==========================================
// 高校教务核心 - 培养方案数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: locked 的判定与拒绝属于 API 层,仓储只负责读写
// ==========================================

use crate::domain::regulation::{
    Regulation, RegulationPromotionRule, RegulationSemester, RegulationSubject,
};
use crate::domain::types::SubjectCategory;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// RegulationRepository - 培养方案仓储
// ==========================================
pub struct RegulationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RegulationRepository {
    /// 创建新的 RegulationRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建培养方案
    pub fn create(&self, regulation: &Regulation) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO regulation (
                regulation_id, program_id, code, title, min_pass_marks,
                locked, version, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &regulation.regulation_id,
                &regulation.program_id,
                &regulation.code,
                &regulation.title,
                &regulation.min_pass_marks,
                if regulation.locked { 1 } else { 0 },
                &regulation.version,
                &regulation.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                &regulation.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        Ok(regulation.regulation_id.clone())
    }

    /// 按 regulation_id 查询方案
    pub fn find_by_id(&self, regulation_id: &str) -> RepositoryResult<Option<Regulation>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT regulation_id, program_id, code, title, min_pass_marks,
                      locked, version, created_at, updated_at
               FROM regulation
               WHERE regulation_id = ?"#,
            params![regulation_id],
            |row| Self::map_row(row),
        ) {
            Ok(regulation) => Ok(Some(regulation)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按方案代码查询
    pub fn find_by_code(&self, code: &str) -> RepositoryResult<Option<Regulation>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT regulation_id, program_id, code, title, min_pass_marks,
                      locked, version, created_at, updated_at
               FROM regulation
               WHERE code = ?"#,
            params![code],
            |row| Self::map_row(row),
        ) {
            Ok(regulation) => Ok(Some(regulation)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 更新方案基础字段 (带乐观锁检查)
    ///
    /// # 并发控制
    /// 使用乐观锁 (version 字段) 防止并发更新冲突
    ///
    /// # 错误
    /// - `RepositoryError::OptimisticLockFailure`: version 不匹配 (其他用户已更新)
    /// - `RepositoryError::NotFound`: regulation_id 不存在
    pub fn update(&self, regulation: &Regulation) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        // 执行更新，带 version 检查
        let rows_affected = conn.execute(
            r#"UPDATE regulation
               SET title = ?, min_pass_marks = ?,
                   version = version + 1, updated_at = ?
               WHERE regulation_id = ? AND version = ?"#,
            params![
                &regulation.title,
                &regulation.min_pass_marks,
                &Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                &regulation.regulation_id,
                &regulation.version,
            ],
        )?;

        // 检查是否更新成功
        if rows_affected == 0 {
            // 判断是记录不存在还是 version 冲突
            let exists: Result<i32, _> = conn.query_row(
                "SELECT version FROM regulation WHERE regulation_id = ?",
                params![&regulation.regulation_id],
                |row| row.get(0),
            );

            match exists {
                Ok(actual_version) => {
                    return Err(RepositoryError::OptimisticLockFailure {
                        regulation_id: regulation.regulation_id.clone(),
                        expected: regulation.version,
                        actual: actual_version,
                    });
                }
                Err(_) => {
                    return Err(RepositoryError::NotFound {
                        entity: "Regulation".to_string(),
                        id: regulation.regulation_id.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// 锁定方案 (单向,幂等)
    ///
    /// 锁定后所有课程/学期编辑由 API 层拒绝
    pub fn lock(&self, regulation_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows_affected = conn.execute(
            r#"UPDATE regulation
               SET locked = 1, version = version + 1, updated_at = ?
               WHERE regulation_id = ? AND locked = 0"#,
            params![
                &Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                regulation_id,
            ],
        )?;

        if rows_affected == 0 {
            // 已锁定为幂等 no-op;不存在才是错误
            let exists: Result<i32, _> = conn.query_row(
                "SELECT 1 FROM regulation WHERE regulation_id = ?",
                params![regulation_id],
                |row| row.get(0),
            );
            if exists.is_err() {
                return Err(RepositoryError::NotFound {
                    entity: "Regulation".to_string(),
                    id: regulation_id.to_string(),
                });
            }
        }

        Ok(())
    }

    /// 统计引用该方案的批次数 (删除保护)
    pub fn count_referencing_batches(&self, regulation_id: &str) -> RepositoryResult<i32> {
        let conn = self.get_conn()?;

        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM academic_batch WHERE regulation_id = ?",
            params![regulation_id],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    /// 删除方案及其全部学期/课程/升级规则 (单事务,子表先删)
    ///
    /// # 红线
    /// - 业务层必须先确认无批次引用 (count_referencing_batches)
    pub fn delete(&self, regulation_id: &str) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM regulation_promotion_rule WHERE regulation_id = ?",
            params![regulation_id],
        )?;
        tx.execute(
            "DELETE FROM regulation_subject WHERE regulation_id = ?",
            params![regulation_id],
        )?;
        tx.execute(
            "DELETE FROM regulation_semester WHERE regulation_id = ?",
            params![regulation_id],
        )?;
        tx.execute(
            "DELETE FROM regulation WHERE regulation_id = ?",
            params![regulation_id],
        )?;

        tx.commit()?;
        Ok(())
    }

    // ==========================================
    // 学期定义
    // ==========================================

    /// 新增方案学期
    pub fn insert_semester(&self, semester: &RegulationSemester) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO regulation_semester (
                reg_semester_id, regulation_id, semester_no, program_year, total_credits
            ) VALUES (?, ?, ?, ?, ?)"#,
            params![
                &semester.reg_semester_id,
                &semester.regulation_id,
                &semester.semester_no,
                &semester.program_year,
                &semester.total_credits,
            ],
        )?;

        Ok(semester.reg_semester_id.clone())
    }

    /// 查询方案的所有学期 (按 semester_no 升序)
    pub fn find_semesters(&self, regulation_id: &str) -> RepositoryResult<Vec<RegulationSemester>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT reg_semester_id, regulation_id, semester_no, program_year, total_credits
               FROM regulation_semester
               WHERE regulation_id = ?
               ORDER BY semester_no"#,
        )?;

        let semesters = stmt
            .query_map(params![regulation_id], |row| {
                Ok(RegulationSemester {
                    reg_semester_id: row.get(0)?,
                    regulation_id: row.get(1)?,
                    semester_no: row.get(2)?,
                    program_year: row.get(3)?,
                    total_credits: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(semesters)
    }

    /// 统计方案学期数
    pub fn count_semesters(&self, regulation_id: &str) -> RepositoryResult<i32> {
        let conn = self.get_conn()?;

        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM regulation_semester WHERE regulation_id = ?",
            params![regulation_id],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    /// 删除方案学期
    pub fn delete_semester(&self, reg_semester_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "DELETE FROM regulation_semester WHERE reg_semester_id = ?",
            params![reg_semester_id],
        )?;

        Ok(())
    }

    // ==========================================
    // 课程定义
    // ==========================================

    /// 新增方案课程
    pub fn insert_subject(&self, subject: &RegulationSubject) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO regulation_subject (
                reg_subject_id, regulation_id, semester_no, subject_code, subject_name,
                category, credits, max_marks, min_pass_marks
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &subject.reg_subject_id,
                &subject.regulation_id,
                &subject.semester_no,
                &subject.subject_code,
                &subject.subject_name,
                subject.category.to_db_str(),
                &subject.credits,
                &subject.max_marks,
                &subject.min_pass_marks,
            ],
        )?;

        Ok(subject.reg_subject_id.clone())
    }

    /// 更新方案课程 (锁定前编辑)
    pub fn update_subject(&self, subject: &RegulationSubject) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows_affected = conn.execute(
            r#"UPDATE regulation_subject
               SET subject_name = ?, category = ?, credits = ?,
                   max_marks = ?, min_pass_marks = ?
               WHERE reg_subject_id = ?"#,
            params![
                &subject.subject_name,
                subject.category.to_db_str(),
                &subject.credits,
                &subject.max_marks,
                &subject.min_pass_marks,
                &subject.reg_subject_id,
            ],
        )?;

        if rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "RegulationSubject".to_string(),
                id: subject.reg_subject_id.clone(),
            });
        }

        Ok(())
    }

    /// 查询方案的所有课程 (按学期、课程代码升序)
    pub fn find_subjects(&self, regulation_id: &str) -> RepositoryResult<Vec<RegulationSubject>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT reg_subject_id, regulation_id, semester_no, subject_code, subject_name,
                      category, credits, max_marks, min_pass_marks
               FROM regulation_subject
               WHERE regulation_id = ?
               ORDER BY semester_no, subject_code"#,
        )?;

        let subjects = stmt
            .query_map(params![regulation_id], |row| Self::map_subject_row(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(subjects)
    }

    /// 查询指定学期的课程
    pub fn find_subjects_by_semester(
        &self,
        regulation_id: &str,
        semester_no: i32,
    ) -> RepositoryResult<Vec<RegulationSubject>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT reg_subject_id, regulation_id, semester_no, subject_code, subject_name,
                      category, credits, max_marks, min_pass_marks
               FROM regulation_subject
               WHERE regulation_id = ? AND semester_no = ?
               ORDER BY subject_code"#,
        )?;

        let subjects = stmt
            .query_map(params![regulation_id, semester_no], |row| {
                Self::map_subject_row(row)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(subjects)
    }

    /// 删除方案课程
    pub fn delete_subject(&self, reg_subject_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "DELETE FROM regulation_subject WHERE reg_subject_id = ?",
            params![reg_subject_id],
        )?;

        Ok(())
    }

    // ==========================================
    // 晋级规则
    // ==========================================

    /// 新增晋级规则
    pub fn insert_promotion_rule(
        &self,
        rule: &RegulationPromotionRule,
    ) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO regulation_promotion_rule (
                rule_id, regulation_id, from_year, to_year,
                min_prev_year_percentage, min_current_year_percentage
            ) VALUES (?, ?, ?, ?, ?, ?)"#,
            params![
                &rule.rule_id,
                &rule.regulation_id,
                &rule.from_year,
                &rule.to_year,
                &rule.min_prev_year_percentage,
                &rule.min_current_year_percentage,
            ],
        )?;

        Ok(rule.rule_id.clone())
    }

    /// 查询指定年级跃迁的晋级规则
    ///
    /// # 返回
    /// - Ok(None): 规则未配置 (调用方按失败关闭处理,绝不静默晋级)
    pub fn find_promotion_rule(
        &self,
        regulation_id: &str,
        from_year: i32,
        to_year: i32,
    ) -> RepositoryResult<Option<RegulationPromotionRule>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT rule_id, regulation_id, from_year, to_year,
                      min_prev_year_percentage, min_current_year_percentage
               FROM regulation_promotion_rule
               WHERE regulation_id = ? AND from_year = ? AND to_year = ?"#,
            params![regulation_id, from_year, to_year],
            |row| {
                Ok(RegulationPromotionRule {
                    rule_id: row.get(0)?,
                    regulation_id: row.get(1)?,
                    from_year: row.get(2)?,
                    to_year: row.get(3)?,
                    min_prev_year_percentage: row.get(4)?,
                    min_current_year_percentage: row.get(5)?,
                })
            },
        ) {
            Ok(rule) => Ok(Some(rule)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // ==========================================
    // 行映射
    // ==========================================

    /// 映射数据库行到 Regulation 对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Regulation> {
        Ok(Regulation {
            regulation_id: row.get(0)?,
            program_id: row.get(1)?,
            code: row.get(2)?,
            title: row.get(3)?,
            min_pass_marks: row.get(4)?,
            locked: row.get::<_, i32>(5)? == 1,
            version: row.get(6)?,
            created_at: Self::parse_ts(row, 7)?,
            updated_at: Self::parse_ts(row, 8)?,
        })
    }

    /// 映射数据库行到 RegulationSubject 对象
    fn map_subject_row(row: &rusqlite::Row) -> rusqlite::Result<RegulationSubject> {
        let category_str: String = row.get(5)?;
        Ok(RegulationSubject {
            reg_subject_id: row.get(0)?,
            regulation_id: row.get(1)?,
            semester_no: row.get(2)?,
            subject_code: row.get(3)?,
            subject_name: row.get(4)?,
            category: SubjectCategory::parse(&category_str).unwrap_or(SubjectCategory::Theory),
            credits: row.get(6)?,
            max_marks: row.get(7)?,
            min_pass_marks: row.get(8)?,
        })
    }

    /// 解析 TEXT 时间戳列
    fn parse_ts(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
        let raw: String = row.get(idx)?;
        chrono::NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S")
            .map(|dt| dt.and_utc())
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
    }
}
