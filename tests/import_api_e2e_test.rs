// ==========================================
// 导入 API 端到端测试
// ==========================================
// 模拟外层传输的完整流程: 上传 → 预览 → 提交

use chrono::Duration;
use fitness_records::api::ApiError;
use fitness_records::domain::{BatchKind, FieldId, ImportScope, IssueCode, RowStatus};
use fitness_records::importer::commit_executor::SKIPPED_BY_POLICY_SUFFIX;

use test_helpers::{api_with_manual_clock, create_test_db, csv_upload, seed_school, seed_students};

/// 学生名册: 一列正确、一列缺姓名、一列座号重复
#[tokio::test]
async fn test_students_preview_execute_and_conflict() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let (api, store, _clock) = api_with_manual_clock(&db_path);
    let school_id = seed_school(&store, "測試國小");

    let upload = csv_upload(
        BatchKind::Students,
        &[
            &["1", "王小明", "男", "3", "甲", "2015/03/15"],
            &["2", "", "女", "3", "甲", ""],
            &["1", "李小華", "女", "3", "甲", ""],
        ],
    );

    let preview = api
        .preview_students_import("roster.csv", upload, school_id)
        .await
        .expect("预览失败");
    assert_eq!(preview.total_rows, 3);
    assert_eq!(preview.valid_rows, 1);
    assert_eq!(preview.warning_rows, 0);
    assert_eq!(preview.error_rows, 2);
    assert_eq!(preview.rows[0].row_number, 2);
    assert_eq!(preview.rows[1].status, RowStatus::Error);
    assert_eq!(preview.rows[1].issues[0].field, FieldId::Name);
    assert_eq!(preview.rows[1].issues[0].code, IssueCode::Required);
    assert_eq!(preview.rows[2].issues[0].code, IssueCode::Duplicate);

    let result = api
        .execute_import(BatchKind::Students, &preview.preview_id, false)
        .await
        .expect("提交失败");
    assert_eq!(result.success_count, 1);
    assert_eq!(result.skipped_count, 2);
    assert_eq!(result.skipped[0].row_number, 3);
    assert_eq!(result.skipped[1].row_number, 4);
    assert!(result.skipped.iter().all(|s| !s.skipped_by_policy));
    assert_eq!(store.count_students(school_id).unwrap(), 1);

    // 第二次提交: 冲突且零写入
    let err = api
        .execute_import(BatchKind::Students, &preview.preview_id, true)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "PREVIEW_ALREADY_EXECUTED");
    assert_eq!(err.http_status(), 409);
    assert_eq!(store.count_students(school_id).unwrap(), 1);

    let after = api.get_preview(&preview.preview_id).await.unwrap();
    assert!(after.executed);
}

/// 成绩: 5 列正确、2 列警告、3 列错误
fn records_rows() -> Vec<Vec<&'static str>> {
    vec![
        vec!["1", "學生一", "130", "28", "25", "120", "30", "480", "2024/03/15"],
        vec!["2", "學生二", "131", "29", "20", "118", "28", "500", "2024/03/15"],
        vec!["3", "學生三", "128", "27", "22", "115", "31", "470", "2024/03/15"],
        vec!["4", "學生四", "135", "30", "18", "125", "25", "520", "2024/03/15"],
        vec!["5", "學生五", "129", "26", "21", "119", "27", "490", "2024/03/15"],
        vec!["6", "學生六", "300", "28", "25", "120", "30", "480", "2024/03/15"],
        vec!["7", "學生七", "132", "28", "25", "500", "30", "480", "2024/03/15"],
        vec!["99", "不存在", "130", "28", "25", "120", "30", "480", "2024/03/15"],
        vec!["1", "學生一", "130", "abc", "25", "120", "30", "480", "2024/03/16"],
        vec!["8", "學生八", "130", "28", "25", "120", "30", "480", "昨天"],
    ]
}

const ROSTER: [(&str, &str); 8] = [
    ("1", "學生一"),
    ("2", "學生二"),
    ("3", "學生三"),
    ("4", "學生四"),
    ("5", "學生五"),
    ("6", "學生六"),
    ("7", "學生七"),
    ("8", "學生八"),
];

#[tokio::test]
async fn test_records_inclusion_policy() {
    for (include_warnings, success, skipped, records) in [(false, 5, 5, 30), (true, 7, 3, 42)] {
        let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
        let (api, store, _clock) = api_with_manual_clock(&db_path);
        let school_id = seed_school(&store, "測試國小");
        seed_students(&store, school_id, 3, Some("甲"), &ROSTER);

        let rows = records_rows();
        let row_refs: Vec<&[&str]> = rows.iter().map(|r| r.as_slice()).collect();
        let upload = csv_upload(BatchKind::Records, &row_refs);

        let preview = api
            .preview_records_import(
                "scores.csv",
                upload,
                ImportScope::school(school_id).with_grade(3).with_class("甲"),
            )
            .await
            .expect("预览失败");
        assert_eq!(
            (preview.valid_rows, preview.warning_rows, preview.error_rows),
            (5, 2, 3)
        );
        assert_eq!(preview.rows[7].issues[0].code, IssueCode::NotFound);
        assert_eq!(preview.rows[8].issues[0].code, IssueCode::InvalidType);
        assert_eq!(preview.rows[9].issues[0].code, IssueCode::InvalidFormat);

        let result = api
            .execute_import(BatchKind::Records, &preview.preview_id, include_warnings)
            .await
            .expect("提交失败");
        assert_eq!(result.success_count, success, "include_warnings={}", include_warnings);
        assert_eq!(result.skipped_count, skipped);
        assert_eq!(result.records_created, records);
        assert_eq!(store.count_sport_records().unwrap(), records as i64);

        let policy_skips: Vec<_> = result.skipped.iter().filter(|s| s.skipped_by_policy).collect();
        if include_warnings {
            assert!(policy_skips.is_empty());
        } else {
            assert_eq!(policy_skips.len(), 2);
            assert_eq!(policy_skips[0].row_number, 7);
            assert_eq!(policy_skips[0].code, IssueCode::OutOfRange);
            assert!(policy_skips[0].message.ends_with(SKIPPED_BY_POLICY_SUFFIX));
        }
    }
}

#[tokio::test]
async fn test_records_template_prefills_roster() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let (api, store, _clock) = api_with_manual_clock(&db_path);
    let school_id = seed_school(&store, "測試國小");
    seed_students(&store, school_id, 3, Some("甲"), &ROSTER[..2]);
    seed_students(&store, school_id, 4, Some("乙"), &[("1", "別班生")]);

    let bytes = api
        .records_template(Some(ImportScope::school(school_id).with_grade(3)))
        .await
        .unwrap();
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("學生一"));
    assert!(text.contains("學生二"));
    assert!(!text.contains("別班生"));

    let err = api
        .records_template(Some(ImportScope::school(school_id + 100)))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "SCHOOL_NOT_FOUND");

    // 下载的模板可直接回传预览
    let blank = api.students_template().await.unwrap();
    let preview = api
        .preview_students_import("template.csv", blank, school_id)
        .await
        .unwrap();
    assert_eq!(preview.total_rows, 2);
}

#[tokio::test]
async fn test_preview_expires() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let (api, store, clock) = api_with_manual_clock(&db_path);
    let school_id = seed_school(&store, "測試國小");
    let upload = csv_upload(BatchKind::Students, &[&["1", "王小明", "男", "3"]]);

    let first = api
        .preview_students_import("a.csv", upload.clone(), school_id)
        .await
        .unwrap();
    assert_eq!(first.expires_at - first.created_at, Duration::minutes(15));

    clock.advance(Duration::minutes(14) + Duration::seconds(59));
    assert!(api.get_preview(&first.preview_id).await.is_ok());

    clock.advance(Duration::seconds(1));
    let err = api.get_preview(&first.preview_id).await.unwrap_err();
    assert_eq!(err.error_code(), "PREVIEW_NOT_FOUND");
    let err = api
        .execute_import(BatchKind::Students, &first.preview_id, false)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "PREVIEW_NOT_FOUND");
    assert_eq!(api.preview_count().await, 0);
    assert_eq!(store.count_students(school_id).unwrap(), 0);
}

#[tokio::test]
async fn test_cancel_preview() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let (api, store, _clock) = api_with_manual_clock(&db_path);
    let school_id = seed_school(&store, "測試國小");
    let upload = csv_upload(BatchKind::Students, &[&["1", "王小明", "男", "3"]]);

    let preview = api
        .preview_students_import("a.csv", upload, school_id)
        .await
        .unwrap();
    api.cancel_preview(&preview.preview_id).await.unwrap();

    let err = api.cancel_preview(&preview.preview_id).await.unwrap_err();
    assert!(matches!(err, ApiError::PreviewNotFound(_)));
    let err = api
        .execute_import(BatchKind::Students, &preview.preview_id, false)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "PREVIEW_NOT_FOUND");
}

/// 事务失败: 零写入，预览保留可再次执行
#[tokio::test]
async fn test_failed_commit_rolls_back() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let (api, store, _clock) = api_with_manual_clock(&db_path);
    let school_id = seed_school(&store, "測試國小");
    seed_students(&store, school_id, 3, Some("甲"), &[("2", "既有學生")]);

    let upload = csv_upload(
        BatchKind::Students,
        &[
            &["1", "王小明", "男", "3", "甲"],
            &["2", "李小華", "女", "3", "甲"],
        ],
    );
    let preview = api
        .preview_students_import("a.csv", upload, school_id)
        .await
        .unwrap();
    assert_eq!(preview.valid_rows, 2);

    let err = api
        .execute_import(BatchKind::Students, &preview.preview_id, false)
        .await
        .unwrap_err();
    assert!(
        matches!(err.error_code(), "IMPORT_ERROR" | "DATABASE_ERROR"),
        "unexpected error: {:?}",
        err
    );
    assert_eq!(store.count_students(school_id).unwrap(), 1);

    let after = api.get_preview(&preview.preview_id).await.unwrap();
    assert!(!after.executed);

    // 释放后仍可执行（仍然失败，但不是冲突）
    let err = api
        .execute_import(BatchKind::Students, &preview.preview_id, false)
        .await
        .unwrap_err();
    assert_ne!(err.error_code(), "PREVIEW_ALREADY_EXECUTED");
}

#[tokio::test]
async fn test_upload_rejections() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let (api, store, _clock) = api_with_manual_clock(&db_path);
    let school_id = seed_school(&store, "測試國小");

    // 副档名
    let err = api
        .preview_students_import("roster.txt", b"abc".to_vec(), school_id)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_FILE_FORMAT");

    // 大小
    let err = api
        .validate_upload("roster.xlsx", 6 * 1024 * 1024)
        .unwrap_err();
    assert_eq!(err.error_code(), "FILE_TOO_LARGE");

    // 模板错置: 成绩表头当作学生名册
    let upload = csv_upload(BatchKind::Records, &[&["1", "王小明", "130"]]);
    let err = api
        .preview_students_import("roster.csv", upload, school_id)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "PARSE_ERROR");

    // 只有表头
    let upload = csv_upload(BatchKind::Students, &[]);
    let err = api
        .preview_students_import("roster.csv", upload, school_id)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "PARSE_ERROR");

    // 学校不存在
    let upload = csv_upload(BatchKind::Students, &[&["1", "王小明", "男", "3"]]);
    let err = api
        .preview_students_import("roster.csv", upload, school_id + 1)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "SCHOOL_NOT_FOUND");

    // 结构性错误不留下预览
    assert_eq!(api.preview_count().await, 0);
}

/// 批次种类不符不消耗预览
#[tokio::test]
async fn test_execute_with_wrong_kind() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let (api, store, _clock) = api_with_manual_clock(&db_path);
    let school_id = seed_school(&store, "測試國小");
    let upload = csv_upload(BatchKind::Students, &[&["1", "王小明", "男", "3"]]);

    let preview = api
        .preview_students_import("a.csv", upload, school_id)
        .await
        .unwrap();
    let err = api
        .execute_import(BatchKind::Records, &preview.preview_id, false)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_INPUT");

    let result = api
        .execute_import(BatchKind::Students, &preview.preview_id, false)
        .await
        .unwrap();
    assert_eq!(result.success_count, 1);
}
