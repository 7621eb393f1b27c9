// ==========================================
// 并发导入测试
// ==========================================
// 验证: 并发预览互不干扰；同一预览并发提交只有一次成功
// ==========================================

use fitness_records::config::{config_keys, ConfigManager};
use fitness_records::domain::BatchKind;
use fitness_records::ImportApi;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;

use test_helpers::{api_with_manual_clock, create_test_db, csv_upload, seed_school};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_previews_are_independent() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let (api, store, _clock) = api_with_manual_clock(&db_path);
    let school_id = seed_school(&store, "測試國小");
    let api = Arc::new(api);

    let tasks = (0..10).map(|i| {
        let api = Arc::clone(&api);
        tokio::spawn(async move {
            let number = (i + 1).to_string();
            let name = format!("學生{}", i);
            let upload = csv_upload(
                BatchKind::Students,
                &[&[number.as_str(), name.as_str(), "男", "3"]],
            );
            api.preview_students_import(&format!("batch_{}.csv", i), upload, school_id)
                .await
        })
    });

    let previews: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("任务失败").expect("预览失败"))
        .collect();

    let handles: HashSet<_> = previews.iter().map(|p| p.preview_id.clone()).collect();
    assert_eq!(handles.len(), 10);
    assert_eq!(api.preview_count().await, 10);
    for preview in &previews {
        assert_eq!(preview.total_rows, 1);
        assert_eq!(preview.valid_rows, 1);
    }
    assert_eq!(store.count_students(school_id).unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_execute_commits_once() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let (api, store, _clock) = api_with_manual_clock(&db_path);
    let school_id = seed_school(&store, "測試國小");
    let api = Arc::new(api);

    let upload = csv_upload(
        BatchKind::Students,
        &[
            &["1", "王小明", "男", "3", "甲"],
            &["2", "李小華", "女", "3", "甲"],
            &["3", "陳小美", "女", "3", "甲"],
        ],
    );
    let preview = api
        .preview_students_import("roster.csv", upload, school_id)
        .await
        .unwrap();

    let tasks = (0..8).map(|_| {
        let api = Arc::clone(&api);
        let handle = preview.preview_id.clone();
        tokio::spawn(async move {
            api.execute_import(BatchKind::Students, &handle, false)
                .await
        })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("任务失败"))
        .collect();

    let successes: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(successes.len(), 1);
    assert_eq!(successes[0].success_count, 3);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.error_code(), "PREVIEW_ALREADY_EXECUTED");
    }
    assert_eq!(store.count_students(school_id).unwrap(), 3);
}

/// 配置的有效期 / 清理间隔生效，背景任务移除过期预览
#[tokio::test]
async fn test_reaper_removes_expired_previews() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    {
        let config = ConfigManager::new(&db_path).unwrap();
        config
            .set_global_config_value(config_keys::PREVIEW_TTL_SECS, "1")
            .unwrap();
        config
            .set_global_config_value(config_keys::REAPER_INTERVAL_SECS, "1")
            .unwrap();
    }

    let api = ImportApi::new(&db_path).await.expect("API 初始化失败");
    let school_id = api
        .service()
        .record_store()
        .create_school("測試國小", None)
        .unwrap();

    let upload = csv_upload(BatchKind::Students, &[&["1", "王小明", "男", "3"]]);
    api.preview_students_import("a.csv", upload, school_id)
        .await
        .unwrap();
    assert_eq!(api.service().previews().stored_entries(), 1);

    tokio::time::sleep(std::time::Duration::from_millis(2500)).await;
    assert_eq!(api.service().previews().stored_entries(), 0);

    api.shutdown().await;
}
