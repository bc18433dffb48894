//! Tests for retry and timeout helpers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use creolecentric::error::CreoleError;
use creolecentric::util::retry::RetryPolicy;
use creolecentric::util::timeout::with_timeout;

#[tokio::test(start_paused = true)]
async fn retry_policy_retries_retryable_errors_until_success() {
    let policy = RetryPolicy {
        max_attempts: 4,
        initial_backoff: Duration::from_millis(100),
        max_backoff: Duration::from_millis(100),
        multiplier: 2.0,
    };
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_for_task = attempts.clone();

    let task = tokio::spawn(async move {
        policy
            .execute(|| {
                let attempts = attempts_for_task.clone();
                async move {
                    let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                    if attempt < 2 {
                        Err(CreoleError::api(502, "bad gateway"))
                    } else {
                        Ok::<_, CreoleError>("ok")
                    }
                }
            })
            .await
    });

    tokio::task::yield_now().await;
    tokio::time::advance(Duration::from_secs(1)).await;
    let result = task.await.unwrap();

    assert_eq!(result.unwrap(), "ok");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retry_policy_stops_immediately_for_non_retryable_errors() {
    let policy = RetryPolicy {
        max_attempts: 5,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(2),
        multiplier: 2.0,
    };
    let attempts = Arc::new(AtomicUsize::new(0));

    let result = policy
        .execute(|| {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(CreoleError::Authentication("Invalid API key".into()))
            }
        })
        .await;

    assert!(matches!(result, Err(CreoleError::Authentication(_))));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn retry_policy_gives_up_after_max_attempts() {
    let policy = RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(1),
        multiplier: 1.0,
    };
    let attempts = Arc::new(AtomicUsize::new(0));

    let result = policy
        .execute(|| {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(CreoleError::RateLimited("slow down".into()))
            }
        })
        .await;

    assert!(matches!(result, Err(CreoleError::RateLimited(_))));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn with_timeout_maps_expiry_to_timeout_error() {
    let result = with_timeout(Duration::from_millis(250), async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok::<_, CreoleError>(())
    })
    .await;

    assert!(matches!(result, Err(CreoleError::Timeout(250))));
}

#[tokio::test]
async fn with_timeout_passes_through_inner_result() {
    let result = with_timeout(Duration::from_secs(1), async {
        Err::<(), _>(CreoleError::Validation("nope".into()))
    })
    .await;

    assert!(matches!(result, Err(CreoleError::Validation(_))));
}
