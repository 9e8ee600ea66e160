// ==========================================
// 高校教务核心 - 入学批次数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 批次与方案的绑定字段 (regulation_id) 不提供更新入口
// ==========================================

use crate::domain::batch::AcademicBatch;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// AcademicBatchRepository - 入学批次仓储
// ==========================================
pub struct AcademicBatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AcademicBatchRepository {
    /// 创建新的 AcademicBatchRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建批次
    pub fn create(&self, batch: &AcademicBatch) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO academic_batch (
                batch_id, program_id, regulation_id, joining_year,
                current_year, total_students, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &batch.batch_id,
                &batch.program_id,
                &batch.regulation_id,
                &batch.joining_year,
                &batch.current_year,
                &batch.total_students,
                &batch.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                &batch.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        Ok(batch.batch_id.clone())
    }

    /// 按 batch_id 查询批次
    pub fn find_by_id(&self, batch_id: &str) -> RepositoryResult<Option<AcademicBatch>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT batch_id, program_id, regulation_id, joining_year,
                      current_year, total_students, created_at, updated_at
               FROM academic_batch
               WHERE batch_id = ?"#,
            params![batch_id],
            |row| Self::map_row(row),
        ) {
            Ok(batch) => Ok(Some(batch)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询某方案绑定的所有批次
    pub fn find_by_regulation(&self, regulation_id: &str) -> RepositoryResult<Vec<AcademicBatch>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT batch_id, program_id, regulation_id, joining_year,
                      current_year, total_students, created_at, updated_at
               FROM academic_batch
               WHERE regulation_id = ?
               ORDER BY joining_year"#,
        )?;

        let batches = stmt
            .query_map(params![regulation_id], |row| Self::map_row(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(batches)
    }

    /// 推进批次当前学年 (幂等: 只升不降)
    ///
    /// # 红线
    /// - 只允许晋级引擎调用;并发提交下取 max(current_year, to_year)
    pub fn advance_current_year(&self, batch_id: &str, to_year: i32) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"UPDATE academic_batch
               SET current_year = MAX(current_year, ?), updated_at = ?
               WHERE batch_id = ?"#,
            params![
                to_year,
                &Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                batch_id,
            ],
        )?;

        Ok(())
    }

    /// 更新在册学生数
    pub fn set_total_students(&self, batch_id: &str, total: i32) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows_affected = conn.execute(
            r#"UPDATE academic_batch
               SET total_students = ?, updated_at = ?
               WHERE batch_id = ?"#,
            params![
                total,
                &Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                batch_id,
            ],
        )?;

        if rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "AcademicBatch".to_string(),
                id: batch_id.to_string(),
            });
        }

        Ok(())
    }

    /// 映射数据库行到 AcademicBatch 对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<AcademicBatch> {
        Ok(AcademicBatch {
            batch_id: row.get(0)?,
            program_id: row.get(1)?,
            regulation_id: row.get(2)?,
            joining_year: row.get(3)?,
            current_year: row.get(4)?,
            total_students: row.get(5)?,
            created_at: Self::parse_ts(row, 6)?,
            updated_at: Self::parse_ts(row, 7)?,
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
