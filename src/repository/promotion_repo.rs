// ==========================================
// 高校教务核心 - 晋级提交数据仓储
// ==========================================
// 红线: 三步写入顺序为严格程序顺序,不得重排:
//       1. student_semester_history (不可变事实)
//       2. student_promotion_log    (决策审计)
//       3. student 学籍指针变更
//       单事务提交,任一步失败全部回滚
// 说明: 即使单个 ACID 事务使顺序对外不可观察,该顺序仍必须保留——
//       若日后拆成分步提交,最坏可观察状态只能是"已审计未生效",
//       绝不能是"已生效未审计"
// ==========================================

use crate::domain::student::{StudentPromotionLog, StudentSemesterHistory};
use crate::domain::types::ProgressionStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction};
use std::sync::{Arc, Mutex};

// ==========================================
// PromotionCommit - 一次晋级决策的完整写入单元
// ==========================================
#[derive(Debug, Clone)]
pub struct PromotionCommit {
    /// 第 1 步: 学期完成历史
    pub history: StudentSemesterHistory,
    /// 第 2 步: 晋级审计日志 (学年内学期滚动无年级跃迁时为 None)
    pub log: Option<StudentPromotionLog>,
    /// 第 3 步: 学籍指针目标值
    pub student_id: String,
    pub batch_id: String,
    pub new_year: i32,
    pub new_semester_no: i32,
    pub new_batch_semester_id: Option<String>,
    pub new_status: ProgressionStatus,
    /// 年级跃迁时同事务推进批次 current_year (幂等取 MAX)
    pub advance_batch_year: Option<i32>,
}

// ==========================================
// PromotionCommitRepository - 晋级提交仓储
// ==========================================
pub struct PromotionCommitRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PromotionCommitRepository {
    /// 创建新的 PromotionCommitRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按固定写入顺序提交一次晋级决策 (单事务)
    pub fn commit_decision(&self, commit: &PromotionCommit) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        // === 第 1 步: 写入学期完成历史 ===
        Self::insert_history(&tx, &commit.history)?;

        // === 第 2 步: 写入晋级审计日志 ===
        if let Some(log) = &commit.log {
            Self::insert_log(&tx, log)?;
        }

        // === 第 3 步: 变更学籍指针 ===
        let rows_affected = tx.execute(
            r#"UPDATE student
               SET current_year = ?, current_semester_no = ?,
                   current_batch_semester_id = ?, status = ?, updated_at = ?
               WHERE student_id = ?"#,
            params![
                &commit.new_year,
                &commit.new_semester_no,
                &commit.new_batch_semester_id,
                commit.new_status.to_db_str(),
                &Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                &commit.student_id,
            ],
        )?;
        if rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Student".to_string(),
                id: commit.student_id.clone(),
            });
        }

        // 年级跃迁时推进批次指针 (幂等: 只升不降)
        if let Some(to_year) = commit.advance_batch_year {
            tx.execute(
                r#"UPDATE academic_batch
                   SET current_year = MAX(current_year, ?), updated_at = ?
                   WHERE batch_id = ?"#,
                params![
                    to_year,
                    &Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                    &commit.batch_id,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn insert_history(tx: &Transaction, history: &StudentSemesterHistory) -> RepositoryResult<()> {
        tx.execute(
            r#"INSERT INTO student_semester_history (
                history_id, student_id, academic_year_id, semester_no, program_year,
                total_credits, earned_credits, failed_credits, status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &history.history_id,
                &history.student_id,
                &history.academic_year_id,
                &history.semester_no,
                &history.program_year,
                &history.total_credits,
                &history.earned_credits,
                &history.failed_credits,
                history.status.to_db_str(),
                &history.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;
        Ok(())
    }

    fn insert_log(tx: &Transaction, log: &StudentPromotionLog) -> RepositoryResult<()> {
        tx.execute(
            r#"INSERT INTO student_promotion_log (
                log_id, student_id, batch_id, from_year, to_year,
                from_semester_no, to_semester_no, status, reason, reason_detail,
                year_percentage, decided_by, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &log.log_id,
                &log.student_id,
                &log.batch_id,
                &log.from_year,
                &log.to_year,
                &log.from_semester_no,
                &log.to_semester_no,
                log.status.to_db_str(),
                &log.reason,
                &log
                    .reason_detail
                    .as_ref()
                    .map(|v| v.to_string()),
                &log.year_percentage,
                &log.decided_by,
                &log.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;
        Ok(())
    }

    // ==========================================
    // 查询接口 (审计回溯/测试验证)
    // ==========================================

    /// 查询学生的学期完成历史 (按学期升序)
    pub fn find_history(&self, student_id: &str) -> RepositoryResult<Vec<StudentSemesterHistory>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT history_id, student_id, academic_year_id, semester_no, program_year,
                      total_credits, earned_credits, failed_credits, status, created_at
               FROM student_semester_history
               WHERE student_id = ?
               ORDER BY semester_no"#,
        )?;

        let rows = stmt
            .query_map(params![student_id], |row| Self::map_history_row(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// 判断学生某学年度某学期是否已有历史记录 (幂等判定辅助)
    pub fn history_exists(
        &self,
        student_id: &str,
        academic_year_id: &str,
        semester_no: i32,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;

        let count: i32 = conn.query_row(
            r#"SELECT COUNT(*) FROM student_semester_history
               WHERE student_id = ? AND academic_year_id = ? AND semester_no = ?"#,
            params![student_id, academic_year_id, semester_no],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    /// 查询学生的晋级审计日志 (按时间降序)
    pub fn find_logs(&self, student_id: &str) -> RepositoryResult<Vec<StudentPromotionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT log_id, student_id, batch_id, from_year, to_year,
                      from_semester_no, to_semester_no, status, reason, reason_detail,
                      year_percentage, decided_by, created_at
               FROM student_promotion_log
               WHERE student_id = ?
               ORDER BY created_at DESC, log_id DESC"#,
        )?;

        let rows = stmt
            .query_map(params![student_id], |row| Self::map_log_row(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// 统计学生的晋级日志条数
    pub fn count_logs(&self, student_id: &str) -> RepositoryResult<i32> {
        let conn = self.get_conn()?;

        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM student_promotion_log WHERE student_id = ?",
            params![student_id],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    /// 统计学生的历史条数
    pub fn count_history(&self, student_id: &str) -> RepositoryResult<i32> {
        let conn = self.get_conn()?;

        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM student_semester_history WHERE student_id = ?",
            params![student_id],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    // ==========================================
    // 行映射
    // ==========================================

    fn map_history_row(row: &rusqlite::Row) -> rusqlite::Result<StudentSemesterHistory> {
        let status_str: String = row.get(8)?;
        Ok(StudentSemesterHistory {
            history_id: row.get(0)?,
            student_id: row.get(1)?,
            academic_year_id: row.get(2)?,
            semester_no: row.get(3)?,
            program_year: row.get(4)?,
            total_credits: row.get(5)?,
            earned_credits: row.get(6)?,
            failed_credits: row.get(7)?,
            status: ProgressionStatus::parse(&status_str).unwrap_or(ProgressionStatus::Enrolled),
            created_at: parse_ts(row, 9)?,
        })
    }

    fn map_log_row(row: &rusqlite::Row) -> rusqlite::Result<StudentPromotionLog> {
        let status_str: String = row.get(7)?;
        let detail_raw: Option<String> = row.get(9)?;
        Ok(StudentPromotionLog {
            log_id: row.get(0)?,
            student_id: row.get(1)?,
            batch_id: row.get(2)?,
            from_year: row.get(3)?,
            to_year: row.get(4)?,
            from_semester_no: row.get(5)?,
            to_semester_no: row.get(6)?,
            status: ProgressionStatus::parse(&status_str).unwrap_or(ProgressionStatus::Detained),
            reason: row.get(8)?,
            reason_detail: detail_raw.and_then(|s| serde_json::from_str(&s).ok()),
            year_percentage: row.get(10)?,
            decided_by: row.get(11)?,
            created_at: parse_ts(row, 12)?,
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
