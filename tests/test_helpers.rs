// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试数据生成等功能
// ==========================================
#![allow(dead_code)]

use academic_core::api::{AssignmentApi, PromotionApi, RegulationApi, StructureApi};
use academic_core::domain::regulation::{
    Regulation, RegulationPromotionRule, RegulationSemester, RegulationSubject,
};
use academic_core::domain::student::{CreditLedgerEntry, Student};
use academic_core::domain::types::{ProgressionStatus, SubjectCategory};
use academic_core::repository::{
    AcademicBatchRepository, BatchStructureRepository, CreditLedgerRepository,
    LabAssignmentRepository, LabGroupRepository, PromotionCommitRepository, RegulationRepository,
    SectionAssignmentRepository, SectionRepository, StudentRepository,
};
use chrono::Utc;
use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    academic_core::logging::init_test();

    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = Connection::open(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开共享连接 (统一 PRAGMA),仓储层的标准输入
pub fn open_shared(db_path: &str) -> Arc<Mutex<Connection>> {
    let conn = academic_core::db::open_sqlite_connection(db_path).expect("打开测试数据库失败");
    Arc::new(Mutex::new(conn))
}

/// 初始化数据库 schema
fn init_schema(conn: &Connection) -> Result<(), Box<dyn Error>> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        INSERT OR IGNORE INTO schema_version (version) VALUES (1);

        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        -- ===== 培养方案 =====
        CREATE TABLE IF NOT EXISTS regulation (
            regulation_id TEXT PRIMARY KEY,
            program_id TEXT NOT NULL,
            code TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            min_pass_marks INTEGER NOT NULL DEFAULT 0,
            locked INTEGER NOT NULL DEFAULT 0,
            version INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS regulation_semester (
            reg_semester_id TEXT PRIMARY KEY,
            regulation_id TEXT NOT NULL REFERENCES regulation(regulation_id),
            semester_no INTEGER NOT NULL CHECK(semester_no >= 1),
            program_year INTEGER NOT NULL CHECK(program_year >= 1),
            total_credits INTEGER NOT NULL DEFAULT 0,
            UNIQUE(regulation_id, semester_no)
        );

        CREATE TABLE IF NOT EXISTS regulation_subject (
            reg_subject_id TEXT PRIMARY KEY,
            regulation_id TEXT NOT NULL REFERENCES regulation(regulation_id),
            semester_no INTEGER NOT NULL,
            subject_code TEXT NOT NULL,
            subject_name TEXT NOT NULL,
            category TEXT NOT NULL,
            credits INTEGER NOT NULL DEFAULT 0,
            max_marks INTEGER NOT NULL,
            min_pass_marks INTEGER NOT NULL,
            UNIQUE(regulation_id, subject_code)
        );

        CREATE TABLE IF NOT EXISTS regulation_promotion_rule (
            rule_id TEXT PRIMARY KEY,
            regulation_id TEXT NOT NULL REFERENCES regulation(regulation_id),
            from_year INTEGER NOT NULL,
            to_year INTEGER NOT NULL,
            min_prev_year_percentage REAL NOT NULL DEFAULT 0,
            min_current_year_percentage REAL NOT NULL DEFAULT 0,
            CHECK(to_year > from_year),
            UNIQUE(regulation_id, from_year, to_year)
        );

        -- ===== 批次与冻结结构 =====
        CREATE TABLE IF NOT EXISTS academic_batch (
            batch_id TEXT PRIMARY KEY,
            program_id TEXT NOT NULL,
            regulation_id TEXT NOT NULL REFERENCES regulation(regulation_id),
            joining_year INTEGER NOT NULL,
            current_year INTEGER NOT NULL DEFAULT 1,
            total_students INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(program_id, joining_year)
        );

        CREATE TABLE IF NOT EXISTS program_year (
            program_year_id TEXT PRIMARY KEY,
            batch_id TEXT NOT NULL REFERENCES academic_batch(batch_id),
            year_no INTEGER NOT NULL,
            UNIQUE(batch_id, year_no)
        );

        CREATE TABLE IF NOT EXISTS batch_semester (
            batch_semester_id TEXT PRIMARY KEY,
            batch_id TEXT NOT NULL REFERENCES academic_batch(batch_id),
            program_year_id TEXT NOT NULL REFERENCES program_year(program_year_id),
            semester_no INTEGER NOT NULL,
            program_year INTEGER NOT NULL,
            total_credits INTEGER NOT NULL DEFAULT 0,
            start_date TEXT,
            end_date TEXT,
            UNIQUE(batch_id, semester_no)
        );

        CREATE TABLE IF NOT EXISTS batch_subject (
            batch_subject_id TEXT PRIMARY KEY,
            batch_id TEXT NOT NULL REFERENCES academic_batch(batch_id),
            batch_semester_id TEXT NOT NULL REFERENCES batch_semester(batch_semester_id),
            subject_code TEXT NOT NULL,
            subject_name TEXT NOT NULL,
            category TEXT NOT NULL,
            credits INTEGER NOT NULL DEFAULT 0,
            max_marks INTEGER NOT NULL,
            min_pass_marks INTEGER NOT NULL,
            UNIQUE(batch_id, subject_code)
        );

        -- ===== 容量单元 (守护计数器约束在表上) =====
        CREATE TABLE IF NOT EXISTS section (
            section_id TEXT PRIMARY KEY,
            batch_semester_id TEXT NOT NULL REFERENCES batch_semester(batch_semester_id),
            code TEXT NOT NULL,
            max_strength INTEGER NOT NULL CHECK(max_strength > 0),
            current_strength INTEGER NOT NULL DEFAULT 0,
            faculty_id TEXT,
            CHECK(current_strength >= 0 AND current_strength <= max_strength),
            UNIQUE(batch_semester_id, code)
        );

        CREATE TABLE IF NOT EXISTS lab_group (
            lab_group_id TEXT PRIMARY KEY,
            batch_semester_id TEXT NOT NULL REFERENCES batch_semester(batch_semester_id),
            code TEXT NOT NULL,
            max_strength INTEGER NOT NULL CHECK(max_strength > 0),
            current_strength INTEGER NOT NULL DEFAULT 0,
            faculty_id TEXT,
            CHECK(current_strength >= 0 AND current_strength <= max_strength),
            UNIQUE(batch_semester_id, code)
        );

        -- ===== 学籍 =====
        CREATE TABLE IF NOT EXISTS student (
            student_id TEXT PRIMARY KEY,
            batch_id TEXT NOT NULL REFERENCES academic_batch(batch_id),
            roll_no TEXT NOT NULL,
            current_year INTEGER NOT NULL DEFAULT 1,
            current_semester_no INTEGER NOT NULL DEFAULT 1,
            current_batch_semester_id TEXT,
            status TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(batch_id, roll_no)
        );

        CREATE TABLE IF NOT EXISTS student_section_assignment (
            assignment_id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL REFERENCES student(student_id),
            batch_id TEXT NOT NULL REFERENCES academic_batch(batch_id),
            batch_semester_id TEXT NOT NULL REFERENCES batch_semester(batch_semester_id),
            semester_no INTEGER NOT NULL,
            section_id TEXT NOT NULL REFERENCES section(section_id),
            assignment_type TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            assigned_by TEXT NOT NULL,
            assigned_at TEXT NOT NULL
        );

        -- 同学生同学期至多一条有效分配
        CREATE UNIQUE INDEX IF NOT EXISTS idx_section_assignment_active
            ON student_section_assignment(student_id, batch_id, semester_no)
            WHERE is_active = 1;

        CREATE TABLE IF NOT EXISTS student_lab_assignment (
            assignment_id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL REFERENCES student(student_id),
            batch_id TEXT NOT NULL REFERENCES academic_batch(batch_id),
            batch_semester_id TEXT NOT NULL REFERENCES batch_semester(batch_semester_id),
            semester_no INTEGER NOT NULL,
            lab_group_id TEXT NOT NULL REFERENCES lab_group(lab_group_id),
            assignment_type TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            assigned_by TEXT NOT NULL,
            assigned_at TEXT NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_lab_assignment_active
            ON student_lab_assignment(student_id, batch_id, semester_no)
            WHERE is_active = 1;

        -- ===== 学分与升级 =====
        CREATE TABLE IF NOT EXISTS credit_ledger (
            ledger_id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL REFERENCES student(student_id),
            batch_id TEXT NOT NULL REFERENCES academic_batch(batch_id),
            semester_no INTEGER NOT NULL,
            program_year INTEGER NOT NULL,
            academic_year_id TEXT NOT NULL,
            total_credits_offered INTEGER NOT NULL DEFAULT 0,
            earned_credits INTEGER NOT NULL DEFAULT 0,
            failed_credits INTEGER NOT NULL DEFAULT 0,
            finalized INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL,
            UNIQUE(student_id, batch_id, semester_no)
        );

        CREATE TABLE IF NOT EXISTS student_semester_history (
            history_id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL REFERENCES student(student_id),
            academic_year_id TEXT NOT NULL,
            semester_no INTEGER NOT NULL,
            program_year INTEGER NOT NULL,
            total_credits INTEGER NOT NULL DEFAULT 0,
            earned_credits INTEGER NOT NULL DEFAULT 0,
            failed_credits INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS student_promotion_log (
            log_id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL REFERENCES student(student_id),
            batch_id TEXT NOT NULL REFERENCES academic_batch(batch_id),
            from_year INTEGER NOT NULL,
            to_year INTEGER NOT NULL,
            from_semester_no INTEGER NOT NULL,
            to_semester_no INTEGER NOT NULL,
            status TEXT NOT NULL,
            reason TEXT NOT NULL,
            reason_detail TEXT,
            year_percentage REAL,
            decided_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            CHECK(to_year > from_year)
        );
        "#,
    )?;

    Ok(())
}

// ==========================================
// API 组装 (全部仓储共享同一连接)
// ==========================================

pub struct TestApis {
    pub regulation_api: RegulationApi,
    pub structure_api: StructureApi,
    pub assignment_api: AssignmentApi,
    pub promotion_api: PromotionApi,

    pub regulation_repo: Arc<RegulationRepository>,
    pub batch_repo: Arc<AcademicBatchRepository>,
    pub structure_repo: Arc<BatchStructureRepository>,
    pub section_repo: Arc<SectionRepository>,
    pub lab_repo: Arc<LabGroupRepository>,
    pub student_repo: Arc<StudentRepository>,
    pub ledger_repo: Arc<CreditLedgerRepository>,
    pub section_assignment_repo: Arc<SectionAssignmentRepository>,
    pub lab_assignment_repo: Arc<LabAssignmentRepository>,
    pub commit_repo: Arc<PromotionCommitRepository>,
}

pub fn build_apis(db_path: &str) -> TestApis {
    let conn = open_shared(db_path);

    let regulation_repo = Arc::new(RegulationRepository::new(Arc::clone(&conn)));
    let batch_repo = Arc::new(AcademicBatchRepository::new(Arc::clone(&conn)));
    let structure_repo = Arc::new(BatchStructureRepository::new(Arc::clone(&conn)));
    let section_repo = Arc::new(SectionRepository::new(Arc::clone(&conn)));
    let lab_repo = Arc::new(LabGroupRepository::new(Arc::clone(&conn)));
    let student_repo = Arc::new(StudentRepository::new(Arc::clone(&conn)));
    let ledger_repo = Arc::new(CreditLedgerRepository::new(Arc::clone(&conn)));
    let section_assignment_repo = Arc::new(SectionAssignmentRepository::new(Arc::clone(&conn)));
    let lab_assignment_repo = Arc::new(LabAssignmentRepository::new(Arc::clone(&conn)));
    let commit_repo = Arc::new(PromotionCommitRepository::new(Arc::clone(&conn)));

    TestApis {
        regulation_api: RegulationApi::new(Arc::clone(&regulation_repo)),
        structure_api: StructureApi::new(
            Arc::clone(&regulation_repo),
            Arc::clone(&batch_repo),
            Arc::clone(&structure_repo),
            Arc::clone(&section_repo),
            Arc::clone(&lab_repo),
        ),
        assignment_api: AssignmentApi::new(
            Arc::clone(&student_repo),
            Arc::clone(&structure_repo),
            Arc::clone(&section_repo),
            Arc::clone(&lab_repo),
            Arc::clone(&section_assignment_repo),
            Arc::clone(&lab_assignment_repo),
        ),
        promotion_api: PromotionApi::new(
            Arc::clone(&student_repo),
            Arc::clone(&ledger_repo),
            Arc::clone(&regulation_repo),
            Arc::clone(&batch_repo),
            Arc::clone(&structure_repo),
            Arc::clone(&commit_repo),
        ),
        regulation_repo,
        batch_repo,
        structure_repo,
        section_repo,
        lab_repo,
        student_repo,
        ledger_repo,
        section_assignment_repo,
        lab_assignment_repo,
        commit_repo,
    }
}

// ==========================================
// 常用场景搭建
// ==========================================

/// 建立标准方案: 2 学年 4 学期 (每学期 20 学分,每学期 2 门课),
/// 升级规则 1→2 年级要求本学年学分百分比 >= 50.0
pub fn seed_regulation(apis: &TestApis, code: &str) -> String {
    let regulation = apis
        .regulation_api
        .create_regulation("P-CSE", code, "计算机科学与技术", 40)
        .expect("建立方案失败");
    let rid = regulation.regulation_id.clone();

    for (semester_no, program_year) in [(1, 1), (2, 1), (3, 2), (4, 2)] {
        apis.regulation_api
            .add_semester(&rid, semester_no, program_year, 20)
            .expect("新增学期失败");
        for k in 1..=2 {
            apis.regulation_api
                .add_subject(
                    &rid,
                    semester_no,
                    &format!("CS{semester_no}0{k}"),
                    &format!("课程 CS{semester_no}0{k}"),
                    SubjectCategory::Theory,
                    10,
                    100,
                    40,
                )
                .expect("新增课程失败");
        }
    }

    apis.regulation_api
        .add_promotion_rule(&rid, 1, 2, 0.0, 50.0)
        .expect("配置升级规则失败");

    rid
}

/// 建批次并生成冻结结构,返回 batch_id
pub fn seed_batch_with_structure(apis: &TestApis, regulation_id: &str, joining_year: i32) -> String {
    let batch = apis
        .structure_api
        .create_batch("P-CSE", regulation_id, joining_year)
        .expect("批次建档失败");
    apis.structure_api
        .generate_structure(&batch.batch_id)
        .expect("结构生成失败");
    batch.batch_id
}

/// 批量注册学生,学籍指针指向第 1 学期
pub fn enroll_students(apis: &TestApis, batch_id: &str, count: usize) -> Vec<String> {
    let first_semester = apis
        .structure_repo
        .find_semester(batch_id, 1)
        .expect("查询学期失败")
        .expect("第 1 学期未生成");

    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let mut student = student_fixture(batch_id, &format!("24CS{:03}", i + 1));
        student.current_batch_semester_id = Some(first_semester.batch_semester_id.clone());
        apis.student_repo.create(&student).expect("注册学生失败");
        ids.push(student.student_id);
    }
    ids
}

/// 为学生写入第 1 学年两学期的定稿台账 (每学期开设 20 学分)
pub fn finalize_first_year_ledger(
    apis: &TestApis,
    student_id: &str,
    batch_id: &str,
    earned_sem1: i32,
    earned_sem2: i32,
) {
    for (semester_no, earned) in [(1, earned_sem1), (2, earned_sem2)] {
        let entry = ledger_fixture(student_id, batch_id, semester_no, 1, earned, 20);
        apis.ledger_repo.upsert(&entry).expect("写入台账失败");
    }
}

// ==========================================
// 测试数据生成
// ==========================================

pub fn regulation_fixture(code: &str) -> Regulation {
    let now = Utc::now();
    Regulation {
        regulation_id: Uuid::new_v4().to_string(),
        program_id: "P-CSE".to_string(),
        code: code.to_string(),
        title: format!("测试方案 {code}"),
        min_pass_marks: 40,
        locked: false,
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

pub fn semester_fixture(
    regulation_id: &str,
    semester_no: i32,
    program_year: i32,
    total_credits: i32,
) -> RegulationSemester {
    RegulationSemester {
        reg_semester_id: Uuid::new_v4().to_string(),
        regulation_id: regulation_id.to_string(),
        semester_no,
        program_year,
        total_credits,
    }
}

pub fn subject_fixture(
    regulation_id: &str,
    semester_no: i32,
    subject_code: &str,
    credits: i32,
) -> RegulationSubject {
    RegulationSubject {
        reg_subject_id: Uuid::new_v4().to_string(),
        regulation_id: regulation_id.to_string(),
        semester_no,
        subject_code: subject_code.to_string(),
        subject_name: format!("课程 {subject_code}"),
        category: SubjectCategory::Theory,
        credits,
        max_marks: 100,
        min_pass_marks: 40,
    }
}

pub fn rule_fixture(
    regulation_id: &str,
    from_year: i32,
    to_year: i32,
    min_current: f64,
) -> RegulationPromotionRule {
    RegulationPromotionRule {
        rule_id: Uuid::new_v4().to_string(),
        regulation_id: regulation_id.to_string(),
        from_year,
        to_year,
        min_prev_year_percentage: 0.0,
        min_current_year_percentage: min_current,
    }
}

pub fn student_fixture(batch_id: &str, roll_no: &str) -> Student {
    let now = Utc::now();
    Student {
        student_id: Uuid::new_v4().to_string(),
        batch_id: batch_id.to_string(),
        roll_no: roll_no.to_string(),
        current_year: 1,
        current_semester_no: 1,
        current_batch_semester_id: None,
        status: ProgressionStatus::Enrolled,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

pub fn ledger_fixture(
    student_id: &str,
    batch_id: &str,
    semester_no: i32,
    program_year: i32,
    earned: i32,
    offered: i32,
) -> CreditLedgerEntry {
    CreditLedgerEntry {
        ledger_id: Uuid::new_v4().to_string(),
        student_id: student_id.to_string(),
        batch_id: batch_id.to_string(),
        semester_no,
        program_year,
        academic_year_id: "AY2025".to_string(),
        total_credits_offered: offered,
        earned_credits: earned,
        failed_credits: (offered - earned).max(0),
        finalized: true,
        updated_at: Utc::now(),
    }
}
