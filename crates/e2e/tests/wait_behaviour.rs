//! Bounded poll semantics, on a paused clock

use std::cell::Cell;
use std::time::Duration;
use tokio::time::Instant;

use superlists_e2e::{E2eError, E2eResult, Wait, WaitConfig};

fn wait(max_wait_ms: u64, polling_rate_ms: u64) -> Wait {
    Wait::new(WaitConfig::new(
        Duration::from_millis(max_wait_ms),
        Duration::from_millis(polling_rate_ms),
    ))
}

#[tokio::test(start_paused = true)]
async fn test_retries_missing_element_until_it_appears() {
    let calls = Cell::new(0u32);
    let calls = &calls;
    let found = wait(15_000, 100)
        .until(move || async move {
            calls.set(calls.get() + 1);
            if calls.get() < 4 {
                Err(E2eError::NoSuchElement("id=id_list_table".into()))
            } else {
                Ok("table")
            }
        })
        .await
        .unwrap();
    assert_eq!(found, "table");
    assert_eq!(calls.get(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_retries_failed_assertions() {
    let calls = Cell::new(0u32);
    let calls = &calls;
    wait(15_000, 100)
        .until(move || async move {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(E2eError::AssertionFailed("row not there yet".into()))
            } else {
                Ok(())
            }
        })
        .await
        .unwrap();
    assert_eq!(calls.get(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_reraises_last_error_after_deadline() {
    let start = Instant::now();
    let calls = Cell::new(0u32);
    let calls = &calls;
    let result: E2eResult<()> = wait(1_000, 100)
        .until(move || async move {
            calls.set(calls.get() + 1);
            Err(E2eError::AssertionFailed(format!("attempt {}", calls.get())))
        })
        .await;

    let elapsed = start.elapsed();
    match result {
        Err(E2eError::AssertionFailed(msg)) => assert_eq!(msg, format!("attempt {}", calls.get())),
        other => panic!("expected the last assertion, got {:?}", other),
    }
    assert!(elapsed >= Duration::from_millis(1_000));
    assert!(elapsed < Duration::from_millis(1_200));
    assert!(calls.get() >= 10);
}

#[tokio::test(start_paused = true)]
async fn test_non_transient_error_is_immediate() {
    let start = Instant::now();
    let calls = Cell::new(0u32);
    let calls = &calls;
    let result: E2eResult<()> = wait(15_000, 100)
        .until(move || async move {
            calls.set(calls.get() + 1);
            Err(E2eError::NoPage)
        })
        .await;

    assert!(matches!(result, Err(E2eError::NoPage)));
    assert_eq!(calls.get(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_zero_max_wait_still_attempts_once() {
    let calls = Cell::new(0u32);
    let calls = &calls;
    let result: E2eResult<()> = wait(0, 100)
        .until(move || async move {
            calls.set(calls.get() + 1);
            Err(E2eError::StaleElement("tag=h1".into()))
        })
        .await;
    assert!(matches!(result, Err(E2eError::StaleElement(_))));
    assert_eq!(calls.get(), 1);

    let value = wait(0, 100).until(|| async { Ok(7) }).await.unwrap();
    assert_eq!(value, 7);
}

#[tokio::test(start_paused = true)]
async fn test_custom_predicate() {
    // Only missing elements are worth waiting for
    let strict = wait(1_000, 100).ignoring(|e: &E2eError| matches!(e, E2eError::NoSuchElement(_)));

    let calls = Cell::new(0u32);
    let calls = &calls;
    let result: E2eResult<()> = strict
        .until(move || async move {
            calls.set(calls.get() + 1);
            Err(E2eError::AssertionFailed("wrong text".into()))
        })
        .await;
    assert!(matches!(result, Err(E2eError::AssertionFailed(_))));
    assert_eq!(calls.get(), 1);

    let calls = Cell::new(0u32);
    let calls = &calls;
    let result: E2eResult<()> = strict
        .until(move || async move {
            calls.set(calls.get() + 1);
            Err(E2eError::NoSuchElement("id=id_new_item".into()))
        })
        .await;
    assert!(matches!(result, Err(E2eError::NoSuchElement(_))));
    assert!(calls.get() > 1);
}
