mod common;

use common::test_config;
use generation_task_service::app::AppState;

#[tokio::test]
async fn unreachable_mongodb_fails_startup() {
    let mut config = test_config();
    config.mongodb_url = Some(
        "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200&connectTimeoutMS=200".to_string(),
    );

    let err = AppState::bootstrap(config)
        .await
        .err()
        .expect("startup must fail without its configured store");
    assert!(err.contains("mongodb"), "{err}");
}

#[tokio::test]
async fn unset_mongodb_uses_memory_stores() {
    let state = AppState::bootstrap(test_config()).await.expect("bootstrap");
    assert_eq!(state.tasks.backend(), "memory");
}
