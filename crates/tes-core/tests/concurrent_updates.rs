//! Many clusters reporting on one task at once over the SQLite store.

use std::sync::Arc;

use chrono::Duration;
use futures::future::join_all;
use tes_core::task::ExecutorLog;
use tes_core::{
    ErrorKind, NormalizeOptions, ResourceNormalizer, RetryPolicy, SqliteTaskRepository, State,
    StatusUpdate, TaskLog, TaskService, TaskSubmission,
};

async fn service(max_update_attempts: usize) -> Arc<TaskService<SqliteTaskRepository, ResourceNormalizer>> {
    let repo = SqliteTaskRepository::connect("sqlite::memory:", 1)
        .await
        .expect("in-memory sqlite");
    Arc::new(TaskService::new(
        repo,
        ResourceNormalizer::new(NormalizeOptions::default()),
        RetryPolicy {
            max_id_attempts: 16,
            max_update_attempts,
        },
    ))
}

fn submission() -> TaskSubmission {
    serde_json::from_value(serde_json::json!({
        "name": "variant-calling",
        "executors": [{ "image": "ubuntu:22.04", "command": ["bash", "-c", "true"] }],
        "resources": { "cpu_cores": 2, "ram_gb": 4.0, "disk_gb": 50.0 }
    }))
    .expect("submission")
}

#[tokio::test]
async fn concurrent_log_reports_are_all_kept() {
    const WRITERS: usize = 8;

    let service = service(256).await;
    let id = service.create(submission()).await.unwrap();
    let created = service.status(&id).await.unwrap().creation_time;

    service
        .update(&id, StatusUpdate {
            cluster_id: Some("cluster-01".to_owned()),
            ..StatusUpdate::default()
        })
        .await
        .unwrap();

    // Every writer reports its own executor into slot 0 and its own line at
    // its own index; nothing may be lost to a concurrent write.
    let reports = (0..WRITERS).map(|i| {
        let service = Arc::clone(&service);
        let id = id.clone();
        let mut system_logs = vec![String::new(); WRITERS];
        system_logs[i] = format!("line {i}");
        let update = StatusUpdate {
            state: Some(State::Running),
            logs: vec![TaskLog {
                cluster_id: "cluster-01".to_owned(),
                start_time: Some(created),
                logs: vec![vec![ExecutorLog {
                    executor_id: format!("exec-{i}"),
                    start_time: Some(created + Duration::seconds(i as i64)),
                    end_time: None,
                }]],
                system_logs,
                ..TaskLog::default()
            }],
            ..StatusUpdate::default()
        };
        tokio::spawn(async move { service.update(&id, update).await })
    });

    for joined in join_all(reports).await {
        joined.expect("join").expect("update");
    }

    let status = service.status(&id).await.unwrap();
    assert_eq!(status.state, State::Running);
    assert_eq!(status.status_resource_version, 1 + WRITERS as i64);

    let log = &status.logs[0];
    assert_eq!(log.logs.len(), 1);
    let mut executors: Vec<_> = log.logs[0].iter().map(|e| e.executor_id.clone()).collect();
    executors.sort();
    let mut expected: Vec<_> = (0..WRITERS).map(|i| format!("exec-{i}")).collect();
    expected.sort();
    assert_eq!(executors, expected);
    for (i, line) in log.system_logs.iter().enumerate() {
        assert_eq!(line, &format!("line {i}"));
    }
}

#[tokio::test]
async fn racing_claims_settle_on_a_cluster_that_started_it() {
    let service = service(64).await;
    let id = service.create(submission()).await.unwrap();

    // A QUEUED task may change hands; once one claimant moves it to
    // INITIALIZING, later claims are refused.
    let claims = (0..4).map(|i| {
        let service = Arc::clone(&service);
        let id = id.clone();
        tokio::spawn(async move {
            let cluster_id = format!("cluster-{i:02}");
            service
                .update(&id, StatusUpdate {
                    cluster_id: Some(cluster_id.clone()),
                    ..StatusUpdate::default()
                })
                .await?;
            service
                .update(&id, StatusUpdate {
                    state: Some(State::Initializing),
                    ..StatusUpdate::default()
                })
                .await?;
            Ok::<_, tes_core::TaskError>(cluster_id)
        })
    });

    let mut started = Vec::new();
    for joined in join_all(claims).await {
        match joined.expect("join") {
            Ok(cluster_id) => started.push(cluster_id),
            Err(e) => assert_eq!(e.kind(), ErrorKind::CannotExecute, "{e}"),
        }
    }
    assert!(!started.is_empty());

    let status = service.status(&id).await.unwrap();
    assert_eq!(status.state, State::Initializing);
    assert!(started.contains(&status.cluster_id), "{started:?}");
}
