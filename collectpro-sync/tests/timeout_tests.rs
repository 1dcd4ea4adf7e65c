use collectpro_sync::timeout::DEFAULT_TIMEOUT_MESSAGE;
use collectpro_sync::{SyncError, TimeoutError, try_with_timeout, with_timeout};
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn pending_future_times_out_with_message() {
    let start = Instant::now();
    let result = with_timeout(
        std::future::pending::<()>(),
        Duration::from_millis(50),
        Some("harvest upload timed out"),
    )
    .await;

    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "harvest upload timed out");
    assert_eq!(err.limit, Duration::from_millis(50));
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(50) && elapsed < Duration::from_millis(52));
}

#[tokio::test(start_paused = true)]
async fn default_message() {
    let err = with_timeout(std::future::pending::<()>(), Duration::from_millis(10), None)
        .await
        .unwrap_err();
    assert_eq!(err.message, DEFAULT_TIMEOUT_MESSAGE);
}

#[tokio::test(start_paused = true)]
async fn ready_future_resolves_without_waiting() {
    let start = Instant::now();
    let value = with_timeout(async { 42 }, Duration::from_millis(1000), None)
        .await
        .unwrap();
    assert_eq!(value, 42);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn slower_operation_wins_if_before_limit() {
    let value = with_timeout(
        async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            "counted"
        },
        Duration::from_millis(50),
        None,
    )
    .await;
    assert_eq!(value, Ok("counted"));
}

#[tokio::test(start_paused = true)]
async fn operation_error_passes_through() {
    let result: Result<u32, SyncError> = try_with_timeout(
        async { Err(SyncError::AuthRequired) },
        Duration::from_millis(50),
        None,
    )
    .await;
    assert!(matches!(result, Err(SyncError::AuthRequired)));
}

#[tokio::test(start_paused = true)]
async fn timeout_folds_into_sync_error() {
    let result: Result<u32, SyncError> = try_with_timeout(
        std::future::pending(),
        Duration::from_millis(5),
        Some("rpc timed out"),
    )
    .await;
    match result {
        Err(SyncError::Timeout(TimeoutError { message, .. })) => assert_eq!(message, "rpc timed out"),
        other => panic!("expected timeout, got {other:?}"),
    }
}
