// ==========================================
// 培养方案与批次结构集成测试
// ==========================================
// 覆盖: 方案维护、单向锁定、乐观锁、冻结结构生成/重建
// ==========================================

mod test_helpers;

use academic_core::api::ApiError;
use academic_core::domain::types::SubjectCategory;
use test_helpers::*;

#[test]
fn test_create_regulation_rejects_duplicate_code() {
    let (_temp, db_path) = create_test_db().unwrap();
    let apis = build_apis(&db_path);

    apis.regulation_api
        .create_regulation("P-CSE", "R2024-CSE", "计算机科学与技术", 40)
        .unwrap();

    let result = apis
        .regulation_api
        .create_regulation("P-ECE", "R2024-CSE", "电子工程", 40);
    assert!(matches!(result, Err(ApiError::Conflict(_))));
}

#[test]
fn test_generate_structure_copies_regulation_by_value() {
    let (_temp, db_path) = create_test_db().unwrap();
    let apis = build_apis(&db_path);

    let rid = seed_regulation(&apis, "R2024-CSE");
    let batch = apis
        .structure_api
        .create_batch("P-CSE", &rid, 2024)
        .unwrap();
    let summary = apis
        .structure_api
        .generate_structure(&batch.batch_id)
        .unwrap();

    assert_eq!(summary.years_created, 2);
    assert_eq!(summary.semesters_created, 4);
    assert_eq!(summary.subjects_created, 8);

    // 学期字段按值拷贝
    let semesters = apis.structure_repo.find_semesters(&batch.batch_id).unwrap();
    assert_eq!(semesters.len(), 4);
    for s in &semesters {
        assert_eq!(s.total_credits, 20);
        assert_eq!(s.batch_id, batch.batch_id);
    }
    assert_eq!(semesters[0].semester_no, 1);
    assert_eq!(semesters[0].program_year, 1);
    assert_eq!(semesters[3].semester_no, 4);
    assert_eq!(semesters[3].program_year, 2);

    // 课程分值按值拷贝
    let subjects = apis.structure_repo.find_subjects(&batch.batch_id).unwrap();
    assert_eq!(subjects.len(), 8);
    for subject in &subjects {
        assert_eq!(subject.credits, 10);
        assert_eq!(subject.max_marks, 100);
        assert_eq!(subject.min_pass_marks, 40);
    }
}

#[test]
fn test_explicit_lock_freezes_regulation() {
    let (_temp, db_path) = create_test_db().unwrap();
    let apis = build_apis(&db_path);

    let rid = seed_regulation(&apis, "R2024-CSE");
    apis.regulation_api.lock_regulation(&rid).unwrap();

    let regulation = apis.regulation_api.get_regulation(&rid).unwrap();
    assert!(regulation.locked);

    // 锁定后课程/学期不可再增删改
    let add = apis.regulation_api.add_semester(&rid, 5, 3, 20);
    assert!(matches!(add, Err(ApiError::InvalidState(_))));

    let remove = apis.regulation_api.remove_subject(&rid, "whatever");
    assert!(matches!(remove, Err(ApiError::InvalidState(_))));

    let rule = apis.regulation_api.add_promotion_rule(&rid, 2, 3, 0.0, 50.0);
    assert!(matches!(rule, Err(ApiError::InvalidState(_))));

    // 重复锁定是幂等空操作
    apis.regulation_api.lock_regulation(&rid).unwrap();
}

#[test]
fn test_edits_after_generation_do_not_touch_snapshot() {
    let (_temp, db_path) = create_test_db().unwrap();
    let apis = build_apis(&db_path);

    let rid = seed_regulation(&apis, "R2024-CSE");
    let batch_id = seed_batch_with_structure(&apis, &rid, 2024);

    // 生成不锁定方案,后续维护照常进行
    let regulation = apis.regulation_api.get_regulation(&rid).unwrap();
    assert!(!regulation.locked);

    let mut subject = apis
        .regulation_api
        .list_subjects(&rid)
        .unwrap()
        .into_iter()
        .find(|s| s.subject_code == "CS101")
        .unwrap();
    subject.subject_name = "程序设计 (修订)".to_string();
    subject.credits = 15;
    apis.regulation_api.update_subject(&subject).unwrap();

    apis.regulation_api
        .add_subject(
            &rid,
            1,
            "CS199",
            "新增选修",
            SubjectCategory::Project,
            5,
            100,
            40,
        )
        .unwrap();

    // 生成后补配升级规则也允许 (规则缺失并非永久状态)
    apis.regulation_api
        .add_promotion_rule(&rid, 2, 3, 0.0, 50.0)
        .unwrap();

    // 冻结快照是值拷贝,方案编辑不回溯影响已生成行
    let subjects = apis.structure_repo.find_subjects(&batch_id).unwrap();
    assert_eq!(subjects.len(), 8);
    let frozen = subjects
        .iter()
        .find(|s| s.subject_code == "CS101")
        .unwrap();
    assert_eq!(frozen.subject_name, "课程 CS101");
    assert_eq!(frozen.credits, 10);
    assert!(!subjects.iter().any(|s| s.subject_code == "CS199"));
}

#[test]
fn test_duplicate_generation_rejected() {
    let (_temp, db_path) = create_test_db().unwrap();
    let apis = build_apis(&db_path);

    let rid = seed_regulation(&apis, "R2024-CSE");
    let batch_id = seed_batch_with_structure(&apis, &rid, 2024);

    let second = apis.structure_api.generate_structure(&batch_id);
    assert!(matches!(second, Err(ApiError::Conflict(_))));

    // 首次生成的结构原样保留
    assert_eq!(apis.structure_repo.find_semesters(&batch_id).unwrap().len(), 4);
}

#[test]
fn test_regenerate_requires_confirmation() {
    let (_temp, db_path) = create_test_db().unwrap();
    let apis = build_apis(&db_path);

    let rid = seed_regulation(&apis, "R2024-CSE");
    let batch_id = seed_batch_with_structure(&apis, &rid, 2024);

    let unconfirmed = apis.structure_api.regenerate_structure(&batch_id, false);
    assert!(matches!(unconfirmed, Err(ApiError::PreconditionFailed(_))));

    let old_ids: Vec<String> = apis
        .structure_repo
        .find_semesters(&batch_id)
        .unwrap()
        .into_iter()
        .map(|s| s.batch_semester_id)
        .collect();

    let summary = apis
        .structure_api
        .regenerate_structure(&batch_id, true)
        .unwrap();
    assert_eq!(summary.semesters_created, 4);

    // 重建是破坏性操作,旧结构行被替换
    let new_ids: Vec<String> = apis
        .structure_repo
        .find_semesters(&batch_id)
        .unwrap()
        .into_iter()
        .map(|s| s.batch_semester_id)
        .collect();
    assert_eq!(new_ids.len(), 4);
    for id in &new_ids {
        assert!(!old_ids.contains(id));
    }
}

#[test]
fn test_regenerate_blocked_after_capacity_allocated() {
    let (_temp, db_path) = create_test_db().unwrap();
    let apis = build_apis(&db_path);

    let rid = seed_regulation(&apis, "R2024-CSE");
    let batch_id = seed_batch_with_structure(&apis, &rid, 2024);

    apis.structure_api
        .allocate_capacity(&batch_id, 2, 60, 1, 20)
        .unwrap();

    let result = apis.structure_api.regenerate_structure(&batch_id, true);
    assert!(matches!(result, Err(ApiError::InvalidState(_))));
}

#[test]
fn test_stale_version_update_rejected() {
    let (_temp, db_path) = create_test_db().unwrap();
    let apis = build_apis(&db_path);

    let created = apis
        .regulation_api
        .create_regulation("P-CSE", "R2024-CSE", "计算机科学与技术", 40)
        .unwrap();

    let mut fresh = created.clone();
    fresh.title = "计算机科学与技术 (修订)".to_string();
    apis.regulation_api.update_regulation(&fresh).unwrap();

    // 基于陈旧版本号的更新必须被拒
    let mut stale = created;
    stale.title = "并发写入".to_string();
    let result = apis.regulation_api.update_regulation(&stale);
    assert!(matches!(result, Err(ApiError::ConcurrentModification(_))));
}

#[test]
fn test_delete_regulation_referenced_by_batch_rejected() {
    let (_temp, db_path) = create_test_db().unwrap();
    let apis = build_apis(&db_path);

    let rid = seed_regulation(&apis, "R2024-CSE");
    apis.structure_api
        .create_batch("P-CSE", &rid, 2024)
        .unwrap();

    let result = apis.regulation_api.delete_regulation(&rid);
    assert!(matches!(result, Err(ApiError::InvalidState(_))));
    assert!(apis.regulation_api.get_regulation(&rid).is_ok());
}

#[test]
fn test_unreferenced_regulation_can_be_deleted() {
    let (_temp, db_path) = create_test_db().unwrap();
    let apis = build_apis(&db_path);

    // 带学期/课程/规则内容的方案整体删除
    let rid = seed_regulation(&apis, "R2024-CSE");
    apis.regulation_api.delete_regulation(&rid).unwrap();

    let result = apis.regulation_api.get_regulation(&rid);
    assert!(matches!(result, Err(ApiError::NotFound(_))));

    // 子表行随同删除,不留孤儿
    assert!(apis.regulation_repo.find_semesters(&rid).unwrap().is_empty());
    assert!(apis.regulation_repo.find_subjects(&rid).unwrap().is_empty());
    assert!(apis
        .regulation_repo
        .find_promotion_rule(&rid, 1, 2)
        .unwrap()
        .is_none());
}

#[test]
fn test_add_subject_validates_marks() {
    let (_temp, db_path) = create_test_db().unwrap();
    let apis = build_apis(&db_path);

    let regulation = apis
        .regulation_api
        .create_regulation("P-CSE", "R2024-CSE", "计算机科学与技术", 40)
        .unwrap();
    let rid = regulation.regulation_id;
    apis.regulation_api.add_semester(&rid, 1, 1, 20).unwrap();

    // 及格线高于满分
    let result = apis.regulation_api.add_subject(
        &rid,
        1,
        "CS101",
        "程序设计",
        SubjectCategory::Theory,
        10,
        100,
        120,
    );
    assert!(matches!(result, Err(ApiError::InvalidInput(_))));
}

#[test]
fn test_promotion_rule_thresholds_validated() {
    let (_temp, db_path) = create_test_db().unwrap();
    let apis = build_apis(&db_path);

    let regulation = apis
        .regulation_api
        .create_regulation("P-CSE", "R2024-CSE", "计算机科学与技术", 40)
        .unwrap();
    let rid = regulation.regulation_id;

    // to_year 必须大于 from_year
    let bad_years = apis.regulation_api.add_promotion_rule(&rid, 2, 2, 0.0, 50.0);
    assert!(matches!(bad_years, Err(ApiError::ValidationError(_))));

    // 阈值必须落在 0~100
    let bad_pct = apis.regulation_api.add_promotion_rule(&rid, 1, 2, 0.0, 150.0);
    assert!(matches!(bad_pct, Err(ApiError::ValidationError(_))));

    apis.regulation_api
        .add_promotion_rule(&rid, 1, 2, 0.0, 50.0)
        .unwrap();
    let rule = apis
        .regulation_api
        .get_promotion_rule(&rid, 1, 2)
        .unwrap()
        .unwrap();
    assert_eq!(rule.min_current_year_percentage, 50.0);
}
