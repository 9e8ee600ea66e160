// ==========================================
// 高校教务核心 - 学生/学分台账数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 学籍指针 (current_year/current_semester) 的晋级变更
//       只能经由 PromotionCommitRepository 的事务提交
// 说明: 学分台账由考试/考勤子系统写入;upsert 仅为外部写入口径与测试服务
// ==========================================

use crate::domain::student::{CreditLedgerEntry, Student};
use crate::domain::types::ProgressionStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// StudentRepository - 学生学籍仓储
// ==========================================
pub struct StudentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StudentRepository {
    /// 创建新的 StudentRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建学生学籍记录
    pub fn create(&self, student: &Student) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO student (
                student_id, batch_id, roll_no, current_year, current_semester_no,
                current_batch_semester_id, status, is_active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &student.student_id,
                &student.batch_id,
                &student.roll_no,
                &student.current_year,
                &student.current_semester_no,
                &student.current_batch_semester_id,
                student.status.to_db_str(),
                if student.is_active { 1 } else { 0 },
                &student.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                &student.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        Ok(student.student_id.clone())
    }

    /// 按 student_id 查询学生
    pub fn find_by_id(&self, student_id: &str) -> RepositoryResult<Option<Student>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT student_id, batch_id, roll_no, current_year, current_semester_no,
                      current_batch_semester_id, status, is_active, created_at, updated_at
               FROM student
               WHERE student_id = ?"#,
            params![student_id],
            |row| Self::map_row(row),
        ) {
            Ok(student) => Ok(Some(student)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询批次指定学期的在册学生 (按学号升序)
    pub fn find_active_by_semester(
        &self,
        batch_id: &str,
        semester_no: i32,
    ) -> RepositoryResult<Vec<Student>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT student_id, batch_id, roll_no, current_year, current_semester_no,
                      current_batch_semester_id, status, is_active, created_at, updated_at
               FROM student
               WHERE batch_id = ? AND current_semester_no = ? AND is_active = 1
               ORDER BY roll_no"#,
        )?;

        let students = stmt
            .query_map(params![batch_id, semester_no], |row| Self::map_row(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(students)
    }

    /// 查询指定学期尚无有效班级分配的在册学生 (按学号升序,轮转分配输入)
    pub fn find_without_section(
        &self,
        batch_id: &str,
        semester_no: i32,
    ) -> RepositoryResult<Vec<Student>> {
        self.find_without_assignment(batch_id, semester_no, "student_section_assignment")
    }

    /// 查询指定学期尚无有效实验组分配的在册学生 (按学号升序)
    pub fn find_without_lab(
        &self,
        batch_id: &str,
        semester_no: i32,
    ) -> RepositoryResult<Vec<Student>> {
        self.find_without_assignment(batch_id, semester_no, "student_lab_assignment")
    }

    fn find_without_assignment(
        &self,
        batch_id: &str,
        semester_no: i32,
        assignment_table: &str,
    ) -> RepositoryResult<Vec<Student>> {
        let conn = self.get_conn()?;

        let sql = format!(
            r#"SELECT s.student_id, s.batch_id, s.roll_no, s.current_year,
                      s.current_semester_no, s.current_batch_semester_id, s.status,
                      s.is_active, s.created_at, s.updated_at
               FROM student s
               WHERE s.batch_id = ?1 AND s.is_active = 1
                 AND NOT EXISTS (
                     SELECT 1 FROM {assignment_table} a
                     WHERE a.student_id = s.student_id
                       AND a.batch_id = ?1 AND a.semester_no = ?2
                       AND a.is_active = 1
                 )
               ORDER BY s.roll_no"#
        );

        let mut stmt = conn.prepare(&sql)?;
        let students = stmt
            .query_map(params![batch_id, semester_no], |row| Self::map_row(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(students)
    }

    /// 更新在册标志 (休学/退学由外围模块触发)
    pub fn set_active(&self, student_id: &str, is_active: bool) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows_affected = conn.execute(
            r#"UPDATE student SET is_active = ?, updated_at = ? WHERE student_id = ?"#,
            params![
                if is_active { 1 } else { 0 },
                &Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                student_id,
            ],
        )?;

        if rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Student".to_string(),
                id: student_id.to_string(),
            });
        }

        Ok(())
    }

    /// 映射数据库行到 Student 对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Student> {
        let status_str: String = row.get(6)?;
        Ok(Student {
            student_id: row.get(0)?,
            batch_id: row.get(1)?,
            roll_no: row.get(2)?,
            current_year: row.get(3)?,
            current_semester_no: row.get(4)?,
            current_batch_semester_id: row.get(5)?,
            status: ProgressionStatus::parse(&status_str).unwrap_or(ProgressionStatus::Enrolled),
            is_active: row.get::<_, i32>(7)? == 1,
            created_at: parse_ts(row, 8)?,
            updated_at: parse_ts(row, 9)?,
        })
    }
}

// ==========================================
// CreditLedgerRepository - 学分台账仓储
// ==========================================
// 红线: 本核心只读台账;写入口径供外部结算子系统与测试使用
pub struct CreditLedgerRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CreditLedgerRepository {
    /// 创建新的 CreditLedgerRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入/覆盖台账行 (外部结算子系统口径)
    pub fn upsert(&self, entry: &CreditLedgerEntry) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO credit_ledger (
                ledger_id, student_id, batch_id, semester_no, program_year,
                academic_year_id, total_credits_offered, earned_credits,
                failed_credits, finalized, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(student_id, batch_id, semester_no) DO UPDATE SET
                program_year = excluded.program_year,
                academic_year_id = excluded.academic_year_id,
                total_credits_offered = excluded.total_credits_offered,
                earned_credits = excluded.earned_credits,
                failed_credits = excluded.failed_credits,
                finalized = excluded.finalized,
                updated_at = excluded.updated_at"#,
            params![
                &entry.ledger_id,
                &entry.student_id,
                &entry.batch_id,
                &entry.semester_no,
                &entry.program_year,
                &entry.academic_year_id,
                &entry.total_credits_offered,
                &entry.earned_credits,
                &entry.failed_credits,
                if entry.finalized { 1 } else { 0 },
                &entry.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        Ok(entry.ledger_id.clone())
    }

    /// 查询学生某学年的全部台账行 (按学期升序)
    pub fn find_by_student_year(
        &self,
        student_id: &str,
        batch_id: &str,
        program_year: i32,
    ) -> RepositoryResult<Vec<CreditLedgerEntry>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT ledger_id, student_id, batch_id, semester_no, program_year,
                      academic_year_id, total_credits_offered, earned_credits,
                      failed_credits, finalized, updated_at
               FROM credit_ledger
               WHERE student_id = ? AND batch_id = ? AND program_year = ?
               ORDER BY semester_no"#,
        )?;

        let entries = stmt
            .query_map(params![student_id, batch_id, program_year], |row| {
                Self::map_row(row)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// 查询学生单学期台账
    pub fn find_by_student_semester(
        &self,
        student_id: &str,
        batch_id: &str,
        semester_no: i32,
    ) -> RepositoryResult<Option<CreditLedgerEntry>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT ledger_id, student_id, batch_id, semester_no, program_year,
                      academic_year_id, total_credits_offered, earned_credits,
                      failed_credits, finalized, updated_at
               FROM credit_ledger
               WHERE student_id = ? AND batch_id = ? AND semester_no = ?"#,
            params![student_id, batch_id, semester_no],
            |row| Self::map_row(row),
        ) {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 映射数据库行到 CreditLedgerEntry 对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<CreditLedgerEntry> {
        Ok(CreditLedgerEntry {
            ledger_id: row.get(0)?,
            student_id: row.get(1)?,
            batch_id: row.get(2)?,
            semester_no: row.get(3)?,
            program_year: row.get(4)?,
            academic_year_id: row.get(5)?,
            total_credits_offered: row.get(6)?,
            earned_credits: row.get(7)?,
            failed_credits: row.get(8)?,
            finalized: row.get::<_, i32>(9)? == 1,
            updated_at: parse_ts(row, 10)?,
        })
    }
}

/// 解析 TEXT 时间戳列
fn parse_ts(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    chrono::NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
