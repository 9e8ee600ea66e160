// ==========================================
// 高校教务核心 - 班级/实验组数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: current_strength 只能经由本模块的守护式增减函数修改,
//       且必须与分配行的写入处于同一事务 (防丢失更新)
// ==========================================

use crate::domain::section::{LabGroup, Section, SectionUtilization};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Transaction};
use std::sync::{Arc, Mutex};

// ==========================================
// 守护式计数增减 (事务内调用)
// ==========================================

/// 班级人数 +1 (容量守护: current_strength < max_strength)
///
/// # 错误
/// - `RepositoryError::CapacityExceeded`: 已满
/// - `RepositoryError::NotFound`: section_id 不存在
pub fn increment_section_strength(tx: &Transaction, section_id: &str) -> RepositoryResult<()> {
    guarded_increment(tx, "section", "section_id", section_id)
}

/// 班级人数 -1 (下限守护: current_strength > 0)
pub fn decrement_section_strength(tx: &Transaction, section_id: &str) -> RepositoryResult<()> {
    guarded_decrement(tx, "section", "section_id", section_id)
}

/// 实验组人数 +1
pub fn increment_lab_strength(tx: &Transaction, lab_group_id: &str) -> RepositoryResult<()> {
    guarded_increment(tx, "lab_group", "lab_group_id", lab_group_id)
}

/// 实验组人数 -1
pub fn decrement_lab_strength(tx: &Transaction, lab_group_id: &str) -> RepositoryResult<()> {
    guarded_decrement(tx, "lab_group", "lab_group_id", lab_group_id)
}

fn guarded_increment(
    tx: &Transaction,
    table: &str,
    pk: &str,
    id: &str,
) -> RepositoryResult<()> {
    let rows_affected = tx.execute(
        &format!(
            "UPDATE {table} SET current_strength = current_strength + 1 \
             WHERE {pk} = ? AND current_strength < max_strength"
        ),
        params![id],
    )?;

    if rows_affected == 0 {
        // 判断是记录不存在还是容量已满
        let counts: Result<(i32, i32), _> = tx.query_row(
            &format!("SELECT current_strength, max_strength FROM {table} WHERE {pk} = ?"),
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        );

        return match counts {
            Ok((current, max)) => Err(RepositoryError::CapacityExceeded {
                entity: table.to_string(),
                id: id.to_string(),
                current,
                max,
            }),
            Err(_) => Err(RepositoryError::NotFound {
                entity: table.to_string(),
                id: id.to_string(),
            }),
        };
    }

    Ok(())
}

fn guarded_decrement(
    tx: &Transaction,
    table: &str,
    pk: &str,
    id: &str,
) -> RepositoryResult<()> {
    let rows_affected = tx.execute(
        &format!(
            "UPDATE {table} SET current_strength = current_strength - 1 \
             WHERE {pk} = ? AND current_strength > 0"
        ),
        params![id],
    )?;

    if rows_affected == 0 {
        return Err(RepositoryError::BusinessRuleViolation(format!(
            "{table} id={id} 人数已为 0,不可再减"
        )));
    }

    Ok(())
}

// ==========================================
// SectionRepository - 教学班仓储
// ==========================================
pub struct SectionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SectionRepository {
    /// 创建新的 SectionRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 批量插入班级 (单事务,容量分配落库)
    pub fn batch_insert(&self, sections: &[Section]) -> RepositoryResult<usize> {
        if sections.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        for section in sections {
            tx.execute(
                r#"INSERT INTO section (
                    section_id, batch_semester_id, code, max_strength,
                    current_strength, faculty_id
                ) VALUES (?, ?, ?, ?, ?, ?)"#,
                params![
                    &section.section_id,
                    &section.batch_semester_id,
                    &section.code,
                    &section.max_strength,
                    &section.current_strength,
                    &section.faculty_id,
                ],
            )?;
        }

        tx.commit()?;
        Ok(sections.len())
    }

    /// 按主键查询班级
    pub fn find_by_id(&self, section_id: &str) -> RepositoryResult<Option<Section>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT section_id, batch_semester_id, code, max_strength,
                      current_strength, faculty_id
               FROM section
               WHERE section_id = ?"#,
            params![section_id],
            |row| Self::map_row(row),
        ) {
            Ok(section) => Ok(Some(section)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询学期的所有班级 (按 code 升序,轮转分配顺序依据)
    pub fn find_by_semester(&self, batch_semester_id: &str) -> RepositoryResult<Vec<Section>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT section_id, batch_semester_id, code, max_strength,
                      current_strength, faculty_id
               FROM section
               WHERE batch_semester_id = ?
               ORDER BY code"#,
        )?;

        let sections = stmt
            .query_map(params![batch_semester_id], |row| Self::map_row(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sections)
    }

    /// 调整班级容量上限
    ///
    /// # 红线
    /// - 业务层必须先经 ValidationGuard 确认不低于当前人数
    pub fn set_max_strength(&self, section_id: &str, max_strength: i32) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows_affected = conn.execute(
            "UPDATE section SET max_strength = ? WHERE section_id = ?",
            params![max_strength, section_id],
        )?;

        if rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Section".to_string(),
                id: section_id.to_string(),
            });
        }

        Ok(())
    }

    /// 指派班级负责教师
    ///
    /// # 红线
    /// - 教师存在性由业务层经 ValidationGuard 确认
    pub fn set_faculty(&self, section_id: &str, faculty_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows_affected = conn.execute(
            "UPDATE section SET faculty_id = ? WHERE section_id = ?",
            params![faculty_id, section_id],
        )?;

        if rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Section".to_string(),
                id: section_id.to_string(),
            });
        }

        Ok(())
    }

    /// 查询批次所有班级的利用率 (只读报表)
    pub fn utilization_by_batch(&self, batch_id: &str) -> RepositoryResult<Vec<SectionUtilization>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT s.section_id, s.code, s.batch_semester_id, bs.semester_no,
                      s.current_strength, s.max_strength
               FROM section s
               INNER JOIN batch_semester bs ON s.batch_semester_id = bs.batch_semester_id
               WHERE bs.batch_id = ?
               ORDER BY bs.semester_no, s.code"#,
        )?;

        let rows = stmt
            .query_map(params![batch_id], |row| {
                let current: i32 = row.get(4)?;
                let max: i32 = row.get(5)?;
                Ok(SectionUtilization {
                    unit_id: row.get(0)?,
                    code: row.get(1)?,
                    batch_semester_id: row.get(2)?,
                    semester_no: row.get(3)?,
                    current_strength: current,
                    max_strength: max,
                    utilization_pct: if max > 0 {
                        f64::from(current) / f64::from(max) * 100.0
                    } else {
                        0.0
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// 映射数据库行到 Section 对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Section> {
        Ok(Section {
            section_id: row.get(0)?,
            batch_semester_id: row.get(1)?,
            code: row.get(2)?,
            max_strength: row.get(3)?,
            current_strength: row.get(4)?,
            faculty_id: row.get(5)?,
        })
    }
}

// ==========================================
// LabGroupRepository - 实验组仓储
// ==========================================
pub struct LabGroupRepository {
    conn: Arc<Mutex<Connection>>,
}

impl LabGroupRepository {
    /// 创建新的 LabGroupRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 批量插入实验组 (单事务)
    pub fn batch_insert(&self, labs: &[LabGroup]) -> RepositoryResult<usize> {
        if labs.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        for lab in labs {
            tx.execute(
                r#"INSERT INTO lab_group (
                    lab_group_id, batch_semester_id, code, max_strength,
                    current_strength, faculty_id
                ) VALUES (?, ?, ?, ?, ?, ?)"#,
                params![
                    &lab.lab_group_id,
                    &lab.batch_semester_id,
                    &lab.code,
                    &lab.max_strength,
                    &lab.current_strength,
                    &lab.faculty_id,
                ],
            )?;
        }

        tx.commit()?;
        Ok(labs.len())
    }

    /// 按主键查询实验组
    pub fn find_by_id(&self, lab_group_id: &str) -> RepositoryResult<Option<LabGroup>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT lab_group_id, batch_semester_id, code, max_strength,
                      current_strength, faculty_id
               FROM lab_group
               WHERE lab_group_id = ?"#,
            params![lab_group_id],
            |row| Self::map_row(row),
        ) {
            Ok(lab) => Ok(Some(lab)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询学期的所有实验组 (按 code 升序)
    pub fn find_by_semester(&self, batch_semester_id: &str) -> RepositoryResult<Vec<LabGroup>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT lab_group_id, batch_semester_id, code, max_strength,
                      current_strength, faculty_id
               FROM lab_group
               WHERE batch_semester_id = ?
               ORDER BY code"#,
        )?;

        let labs = stmt
            .query_map(params![batch_semester_id], |row| Self::map_row(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(labs)
    }

    /// 查询批次所有实验组的利用率 (只读报表)
    pub fn utilization_by_batch(&self, batch_id: &str) -> RepositoryResult<Vec<SectionUtilization>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT g.lab_group_id, g.code, g.batch_semester_id, bs.semester_no,
                      g.current_strength, g.max_strength
               FROM lab_group g
               INNER JOIN batch_semester bs ON g.batch_semester_id = bs.batch_semester_id
               WHERE bs.batch_id = ?
               ORDER BY bs.semester_no, g.code"#,
        )?;

        let rows = stmt
            .query_map(params![batch_id], |row| {
                let current: i32 = row.get(4)?;
                let max: i32 = row.get(5)?;
                Ok(SectionUtilization {
                    unit_id: row.get(0)?,
                    code: row.get(1)?,
                    batch_semester_id: row.get(2)?,
                    semester_no: row.get(3)?,
                    current_strength: current,
                    max_strength: max,
                    utilization_pct: if max > 0 {
                        f64::from(current) / f64::from(max) * 100.0
                    } else {
                        0.0
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// 映射数据库行到 LabGroup 对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<LabGroup> {
        Ok(LabGroup {
            lab_group_id: row.get(0)?,
            batch_semester_id: row.get(1)?,
            code: row.get(2)?,
            max_strength: row.get(3)?,
            current_strength: row.get(4)?,
            faculty_id: row.get(5)?,
        })
    }
}
