// ==========================================
// 高校教务核心 - 学生分配数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 分配行写入与班级计数增减必须同事务 (防丢失更新)
// 红线: 同一 (student, batch, semester) 最多一条 is_active=1,
//       由部分唯一索引兜底
// ==========================================

use crate::domain::section::{StudentLabAssignment, StudentSectionAssignment};
use crate::domain::types::AssignmentType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::section_repo::{
    decrement_lab_strength, decrement_section_strength, increment_lab_strength,
    increment_section_strength,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// SectionAssignmentRepository - 班级分配仓储
// ==========================================
pub struct SectionAssignmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SectionAssignmentRepository {
    /// 创建新的 SectionAssignmentRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入分配行并同事务递增目标班级人数
    ///
    /// 容量在写入时由守护式 UPDATE 再次校验 (不复用陈旧读取)
    pub fn insert_active(
        &self,
        assignment: &StudentSectionAssignment,
    ) -> RepositoryResult<String> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"INSERT INTO student_section_assignment (
                assignment_id, student_id, batch_id, batch_semester_id, semester_no,
                section_id, assignment_type, is_active, assigned_by, assigned_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &assignment.assignment_id,
                &assignment.student_id,
                &assignment.batch_id,
                &assignment.batch_semester_id,
                &assignment.semester_no,
                &assignment.section_id,
                assignment.assignment_type.to_db_str(),
                if assignment.is_active { 1 } else { 0 },
                &assignment.assigned_by,
                &assignment.assigned_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        increment_section_strength(&tx, &assignment.section_id)?;

        tx.commit()?;
        Ok(assignment.assignment_id.clone())
    }

    /// 改派: 软删除旧分配、递减旧班级、写入新分配、递增新班级,单事务
    pub fn reassign(
        &self,
        old_assignment_id: &str,
        old_section_id: &str,
        new_assignment: &StudentSectionAssignment,
    ) -> RepositoryResult<String> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let rows_affected = tx.execute(
            r#"UPDATE student_section_assignment
               SET is_active = 0
               WHERE assignment_id = ? AND is_active = 1"#,
            params![old_assignment_id],
        )?;
        if rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "StudentSectionAssignment".to_string(),
                id: old_assignment_id.to_string(),
            });
        }

        decrement_section_strength(&tx, old_section_id)?;

        tx.execute(
            r#"INSERT INTO student_section_assignment (
                assignment_id, student_id, batch_id, batch_semester_id, semester_no,
                section_id, assignment_type, is_active, assigned_by, assigned_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)"#,
            params![
                &new_assignment.assignment_id,
                &new_assignment.student_id,
                &new_assignment.batch_id,
                &new_assignment.batch_semester_id,
                &new_assignment.semester_no,
                &new_assignment.section_id,
                new_assignment.assignment_type.to_db_str(),
                &new_assignment.assigned_by,
                &new_assignment.assigned_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        increment_section_strength(&tx, &new_assignment.section_id)?;

        tx.commit()?;
        Ok(new_assignment.assignment_id.clone())
    }

    /// 撤销分配 (软删除 + 递减,单事务)
    pub fn deactivate(&self, assignment_id: &str, section_id: &str) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let rows_affected = tx.execute(
            r#"UPDATE student_section_assignment
               SET is_active = 0
               WHERE assignment_id = ? AND is_active = 1"#,
            params![assignment_id],
        )?;
        if rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "StudentSectionAssignment".to_string(),
                id: assignment_id.to_string(),
            });
        }

        decrement_section_strength(&tx, section_id)?;

        tx.commit()?;
        Ok(())
    }

    /// 查询学生在指定学期的有效分配
    pub fn find_active(
        &self,
        student_id: &str,
        batch_id: &str,
        semester_no: i32,
    ) -> RepositoryResult<Option<StudentSectionAssignment>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT assignment_id, student_id, batch_id, batch_semester_id, semester_no,
                      section_id, assignment_type, is_active, assigned_by, assigned_at
               FROM student_section_assignment
               WHERE student_id = ? AND batch_id = ? AND semester_no = ? AND is_active = 1"#,
            params![student_id, batch_id, semester_no],
            |row| Self::map_row(row),
        ) {
            Ok(assignment) => Ok(Some(assignment)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询班级名册 (有效分配,按学号升序)
    pub fn find_roster(&self, section_id: &str) -> RepositoryResult<Vec<StudentSectionAssignment>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT a.assignment_id, a.student_id, a.batch_id, a.batch_semester_id,
                      a.semester_no, a.section_id, a.assignment_type, a.is_active,
                      a.assigned_by, a.assigned_at
               FROM student_section_assignment a
               INNER JOIN student s ON a.student_id = s.student_id
               WHERE a.section_id = ? AND a.is_active = 1
               ORDER BY s.roll_no"#,
        )?;

        let assignments = stmt
            .query_map(params![section_id], |row| Self::map_row(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(assignments)
    }

    /// 统计班级有效分配数 (与 current_strength 对账用)
    pub fn count_active_by_section(&self, section_id: &str) -> RepositoryResult<i32> {
        let conn = self.get_conn()?;

        let count: i32 = conn.query_row(
            r#"SELECT COUNT(*) FROM student_section_assignment
               WHERE section_id = ? AND is_active = 1"#,
            params![section_id],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    /// 映射数据库行到 StudentSectionAssignment 对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<StudentSectionAssignment> {
        let type_str: String = row.get(6)?;
        Ok(StudentSectionAssignment {
            assignment_id: row.get(0)?,
            student_id: row.get(1)?,
            batch_id: row.get(2)?,
            batch_semester_id: row.get(3)?,
            semester_no: row.get(4)?,
            section_id: row.get(5)?,
            assignment_type: AssignmentType::parse(&type_str).unwrap_or(AssignmentType::Manual),
            is_active: row.get::<_, i32>(7)? == 1,
            assigned_by: row.get(8)?,
            assigned_at: parse_ts(row, 9)?,
        })
    }
}

// ==========================================
// LabAssignmentRepository - 实验组分配仓储
// ==========================================
pub struct LabAssignmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl LabAssignmentRepository {
    /// 创建新的 LabAssignmentRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入分配行并同事务递增目标实验组人数
    pub fn insert_active(&self, assignment: &StudentLabAssignment) -> RepositoryResult<String> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"INSERT INTO student_lab_assignment (
                assignment_id, student_id, batch_id, batch_semester_id, semester_no,
                lab_group_id, assignment_type, is_active, assigned_by, assigned_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &assignment.assignment_id,
                &assignment.student_id,
                &assignment.batch_id,
                &assignment.batch_semester_id,
                &assignment.semester_no,
                &assignment.lab_group_id,
                assignment.assignment_type.to_db_str(),
                if assignment.is_active { 1 } else { 0 },
                &assignment.assigned_by,
                &assignment.assigned_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        increment_lab_strength(&tx, &assignment.lab_group_id)?;

        tx.commit()?;
        Ok(assignment.assignment_id.clone())
    }

    /// 改派实验组 (软删除旧 + 递减旧 + 写入新 + 递增新,单事务)
    pub fn reassign(
        &self,
        old_assignment_id: &str,
        old_lab_group_id: &str,
        new_assignment: &StudentLabAssignment,
    ) -> RepositoryResult<String> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let rows_affected = tx.execute(
            r#"UPDATE student_lab_assignment
               SET is_active = 0
               WHERE assignment_id = ? AND is_active = 1"#,
            params![old_assignment_id],
        )?;
        if rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "StudentLabAssignment".to_string(),
                id: old_assignment_id.to_string(),
            });
        }

        decrement_lab_strength(&tx, old_lab_group_id)?;

        tx.execute(
            r#"INSERT INTO student_lab_assignment (
                assignment_id, student_id, batch_id, batch_semester_id, semester_no,
                lab_group_id, assignment_type, is_active, assigned_by, assigned_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)"#,
            params![
                &new_assignment.assignment_id,
                &new_assignment.student_id,
                &new_assignment.batch_id,
                &new_assignment.batch_semester_id,
                &new_assignment.semester_no,
                &new_assignment.lab_group_id,
                new_assignment.assignment_type.to_db_str(),
                &new_assignment.assigned_by,
                &new_assignment.assigned_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        increment_lab_strength(&tx, &new_assignment.lab_group_id)?;

        tx.commit()?;
        Ok(new_assignment.assignment_id.clone())
    }

    /// 查询学生在指定学期的有效实验组分配
    pub fn find_active(
        &self,
        student_id: &str,
        batch_id: &str,
        semester_no: i32,
    ) -> RepositoryResult<Option<StudentLabAssignment>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT assignment_id, student_id, batch_id, batch_semester_id, semester_no,
                      lab_group_id, assignment_type, is_active, assigned_by, assigned_at
               FROM student_lab_assignment
               WHERE student_id = ? AND batch_id = ? AND semester_no = ? AND is_active = 1"#,
            params![student_id, batch_id, semester_no],
            |row| Self::map_row(row),
        ) {
            Ok(assignment) => Ok(Some(assignment)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询实验组名册 (有效分配,按学号升序)
    pub fn find_roster(&self, lab_group_id: &str) -> RepositoryResult<Vec<StudentLabAssignment>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT a.assignment_id, a.student_id, a.batch_id, a.batch_semester_id,
                      a.semester_no, a.lab_group_id, a.assignment_type, a.is_active,
                      a.assigned_by, a.assigned_at
               FROM student_lab_assignment a
               INNER JOIN student s ON a.student_id = s.student_id
               WHERE a.lab_group_id = ? AND a.is_active = 1
               ORDER BY s.roll_no"#,
        )?;

        let assignments = stmt
            .query_map(params![lab_group_id], |row| Self::map_row(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(assignments)
    }

    /// 映射数据库行到 StudentLabAssignment 对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<StudentLabAssignment> {
        let type_str: String = row.get(6)?;
        Ok(StudentLabAssignment {
            assignment_id: row.get(0)?,
            student_id: row.get(1)?,
            batch_id: row.get(2)?,
            batch_semester_id: row.get(3)?,
            semester_no: row.get(4)?,
            lab_group_id: row.get(5)?,
            assignment_type: AssignmentType::parse(&type_str).unwrap_or(AssignmentType::Manual),
            is_active: row.get::<_, i32>(7)? == 1,
            assigned_by: row.get(8)?,
            assigned_at: parse_ts(row, 9)?,
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
