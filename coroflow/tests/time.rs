use coroflow::task::Task;
use coroflow::time::{instrumented, sleep, timeout};

use std::time::{Duration, Instant};

#[coroflow::test]
async fn test_sleep_basic() {
    let start = Instant::now();
    sleep(Duration::from_millis(50)).await;
    let elapsed = start.elapsed();

    assert!(
        elapsed >= Duration::from_millis(50),
        "Sleep should wait at least the specified duration"
    );
}

#[coroflow::test]
async fn test_sleep_zero_duration() {
    let start = Instant::now();
    sleep(Duration::from_millis(0)).await;
    let elapsed = start.elapsed();

    assert!(
        elapsed < Duration::from_millis(10),
        "Zero duration sleep should be fast"
    );
}

#[coroflow::test]
async fn test_time_wrapper_with_sleep() {
    let (_, elapsed) = instrumented(sleep(Duration::from_millis(50))).await;

    assert!(
        elapsed >= Duration::from_millis(50),
        "Time wrapper should measure at least the sleep duration"
    );
}

#[coroflow::test]
async fn test_timeout_completes_before_deadline() {
    let task = Task::spawn(async {
        sleep(Duration::from_millis(10)).await;
        123
    });

    let result = timeout(Duration::from_millis(50), task).await;

    assert!(
        matches!(result, Ok(Ok(v)) if v == 123),
        "Timeout should return Ok(Ok(123))"
    );
}

#[coroflow::test]
async fn test_timeout_expires() {
    let task = Task::spawn(async {
        sleep(Duration::from_millis(100)).await;
        456
    });
    let result = timeout(Duration::from_millis(20), task).await;

    assert!(
        result.is_err(),
        "Timeout should return an error when deadline is exceeded"
    );
}

#[coroflow::test]
async fn test_sleeps_complete_in_deadline_order() {
    let start = Instant::now();

    let slow = Task::spawn(async move {
        sleep(Duration::from_millis(40)).await;
        start.elapsed()
    });
    let fast = Task::spawn(async move {
        sleep(Duration::from_millis(10)).await;
        start.elapsed()
    });

    let slow = slow.await.unwrap();
    let fast = fast.await.unwrap();

    assert!(fast < slow, "The shorter sleep should finish first");
}
