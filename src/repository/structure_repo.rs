// ==========================================
// 高校教务核心 - 批次结构数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 结构生成必须在单事务内落库;重复生成的拒绝由 API 层判定
// 红线: 生成结果只是方案的值快照,不可反向污染 regulation_*
// ==========================================

use crate::domain::batch::{BatchSemester, BatchSubject, GeneratedStructure, ProgramYear};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// BatchStructureRepository - 批次结构仓储
// ==========================================
pub struct BatchStructureRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BatchStructureRepository {
    /// 创建新的 BatchStructureRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 判断批次是否已生成结构
    pub fn has_structure(&self, batch_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;

        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM batch_semester WHERE batch_id = ?",
            params![batch_id],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    /// 事务化写入生成结果 (学年 + 学期 + 课程)
    ///
    /// # 红线
    /// - 三类行必须同事务落库,任一失败全部回滚
    pub fn insert_generated(&self, structure: &GeneratedStructure) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        for year in &structure.years {
            tx.execute(
                r#"INSERT INTO program_year (program_year_id, batch_id, year_no)
                   VALUES (?, ?, ?)"#,
                params![&year.program_year_id, &year.batch_id, &year.year_no],
            )?;
        }

        for semester in &structure.semesters {
            tx.execute(
                r#"INSERT INTO batch_semester (
                    batch_semester_id, batch_id, program_year_id, semester_no,
                    program_year, total_credits, start_date, end_date
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
                params![
                    &semester.batch_semester_id,
                    &semester.batch_id,
                    &semester.program_year_id,
                    &semester.semester_no,
                    &semester.program_year,
                    &semester.total_credits,
                    &semester.start_date.map(|d| d.format("%Y-%m-%d").to_string()),
                    &semester.end_date.map(|d| d.format("%Y-%m-%d").to_string()),
                ],
            )?;
        }

        for subject in &structure.subjects {
            tx.execute(
                r#"INSERT INTO batch_subject (
                    batch_subject_id, batch_id, batch_semester_id, subject_code,
                    subject_name, category, credits, max_marks, min_pass_marks
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
                params![
                    &subject.batch_subject_id,
                    &subject.batch_id,
                    &subject.batch_semester_id,
                    &subject.subject_code,
                    &subject.subject_name,
                    &subject.category,
                    &subject.credits,
                    &subject.max_marks,
                    &subject.min_pass_marks,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// 删除批次结构 (课程 → 学期 → 学年,单事务)
    ///
    /// # 红线
    /// - 破坏性操作,API 层必须要求显式确认后才可调用
    pub fn delete_structure(&self, batch_id: &str) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM batch_subject WHERE batch_id = ?",
            params![batch_id],
        )?;
        tx.execute(
            "DELETE FROM batch_semester WHERE batch_id = ?",
            params![batch_id],
        )?;
        tx.execute(
            "DELETE FROM program_year WHERE batch_id = ?",
            params![batch_id],
        )?;

        tx.commit()?;
        Ok(())
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 查询批次的所有学年 (按 year_no 升序)
    pub fn find_years(&self, batch_id: &str) -> RepositoryResult<Vec<ProgramYear>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT program_year_id, batch_id, year_no
               FROM program_year
               WHERE batch_id = ?
               ORDER BY year_no"#,
        )?;

        let years = stmt
            .query_map(params![batch_id], |row| {
                Ok(ProgramYear {
                    program_year_id: row.get(0)?,
                    batch_id: row.get(1)?,
                    year_no: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(years)
    }

    /// 查询批次的所有学期 (按 semester_no 升序)
    pub fn find_semesters(&self, batch_id: &str) -> RepositoryResult<Vec<BatchSemester>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT batch_semester_id, batch_id, program_year_id, semester_no,
                      program_year, total_credits, start_date, end_date
               FROM batch_semester
               WHERE batch_id = ?
               ORDER BY semester_no"#,
        )?;

        let semesters = stmt
            .query_map(params![batch_id], |row| Self::map_semester_row(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(semesters)
    }

    /// 查询批次的指定学期
    pub fn find_semester(
        &self,
        batch_id: &str,
        semester_no: i32,
    ) -> RepositoryResult<Option<BatchSemester>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT batch_semester_id, batch_id, program_year_id, semester_no,
                      program_year, total_credits, start_date, end_date
               FROM batch_semester
               WHERE batch_id = ? AND semester_no = ?"#,
            params![batch_id, semester_no],
            |row| Self::map_semester_row(row),
        ) {
            Ok(semester) => Ok(Some(semester)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按主键查询学期
    pub fn find_semester_by_id(
        &self,
        batch_semester_id: &str,
    ) -> RepositoryResult<Option<BatchSemester>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT batch_semester_id, batch_id, program_year_id, semester_no,
                      program_year, total_credits, start_date, end_date
               FROM batch_semester
               WHERE batch_semester_id = ?"#,
            params![batch_semester_id],
            |row| Self::map_semester_row(row),
        ) {
            Ok(semester) => Ok(Some(semester)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询指定日期开学的所有学期 (跨批次,调度器滚动入口)
    pub fn find_semesters_starting_on(
        &self,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<BatchSemester>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT batch_semester_id, batch_id, program_year_id, semester_no,
                      program_year, total_credits, start_date, end_date
               FROM batch_semester
               WHERE start_date = ?
               ORDER BY batch_id, semester_no"#,
        )?;

        let semesters = stmt
            .query_map(params![date.format("%Y-%m-%d").to_string()], |row| {
                Self::map_semester_row(row)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(semesters)
    }

    /// 排定学期起止日期 (生成后教务录入)
    pub fn set_semester_dates(
        &self,
        batch_semester_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows_affected = conn.execute(
            r#"UPDATE batch_semester
               SET start_date = ?, end_date = ?
               WHERE batch_semester_id = ?"#,
            params![
                start_date.format("%Y-%m-%d").to_string(),
                end_date.format("%Y-%m-%d").to_string(),
                batch_semester_id,
            ],
        )?;

        if rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "BatchSemester".to_string(),
                id: batch_semester_id.to_string(),
            });
        }

        Ok(())
    }

    /// 查询批次的所有课程快照
    pub fn find_subjects(&self, batch_id: &str) -> RepositoryResult<Vec<BatchSubject>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT batch_subject_id, batch_id, batch_semester_id, subject_code,
                      subject_name, category, credits, max_marks, min_pass_marks
               FROM batch_subject
               WHERE batch_id = ?
               ORDER BY batch_semester_id, subject_code"#,
        )?;

        let subjects = stmt
            .query_map(params![batch_id], |row| Self::map_subject_row(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(subjects)
    }

    /// 按课程代码查询批次课程快照
    pub fn find_subject_by_code(
        &self,
        batch_id: &str,
        subject_code: &str,
    ) -> RepositoryResult<Option<BatchSubject>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT batch_subject_id, batch_id, batch_semester_id, subject_code,
                      subject_name, category, credits, max_marks, min_pass_marks
               FROM batch_subject
               WHERE batch_id = ? AND subject_code = ?"#,
            params![batch_id, subject_code],
            |row| Self::map_subject_row(row),
        ) {
            Ok(subject) => Ok(Some(subject)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // ==========================================
    // 行映射
    // ==========================================

    /// 映射数据库行到 BatchSemester 对象
    fn map_semester_row(row: &rusqlite::Row) -> rusqlite::Result<BatchSemester> {
        Ok(BatchSemester {
            batch_semester_id: row.get(0)?,
            batch_id: row.get(1)?,
            program_year_id: row.get(2)?,
            semester_no: row.get(3)?,
            program_year: row.get(4)?,
            total_credits: row.get(5)?,
            start_date: row
                .get::<_, Option<String>>(6)?
                .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
            end_date: row
                .get::<_, Option<String>>(7)?
                .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        })
    }

    /// 映射数据库行到 BatchSubject 对象
    fn map_subject_row(row: &rusqlite::Row) -> rusqlite::Result<BatchSubject> {
        Ok(BatchSubject {
            batch_subject_id: row.get(0)?,
            batch_id: row.get(1)?,
            batch_semester_id: row.get(2)?,
            subject_code: row.get(3)?,
            subject_name: row.get(4)?,
            category: row.get(5)?,
            credits: row.get(6)?,
            max_marks: row.get(7)?,
            min_pass_marks: row.get(8)?,
        })
    }
}
