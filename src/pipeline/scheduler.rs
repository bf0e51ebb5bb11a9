// src/pipeline/scheduler.rs

//! Periodic harvest scheduling.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Run `pass` once per interval until the token is cancelled.
///
/// The startup pass is the caller's job; the first tick here fires one
/// full interval after entry. A failed pass is logged and the loop keeps
/// going — only cancellation stops future firings.
pub async fn run_scheduler<F, Fut>(interval: Duration, cancel: CancellationToken, mut pass: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                log::info!("Scheduler stopping, no further harvest passes");
                return;
            }
            _ = ticker.tick() => {
                if let Err(e) = pass().await {
                    log::error!("Harvest pass failed: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::AppError;

    fn counting_pass(counter: Arc<AtomicUsize>) -> impl FnMut() -> std::future::Ready<Result<()>> {
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn fires_once_per_interval() {
        tokio::time::pause();

        let counter = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_scheduler(
            Duration::from_secs(60),
            cancel.clone(),
            counting_pass(Arc::clone(&counter)),
        ));

        tokio::time::sleep(Duration::from_secs(185)).await;
        cancel.cancel();
        task.await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_fire_before_the_first_interval() {
        tokio::time::pause();

        let counter = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_scheduler(
            Duration::from_secs(60),
            cancel.clone(),
            counting_pass(Arc::clone(&counter)),
        ));

        tokio::time::sleep(Duration::from_secs(30)).await;
        cancel.cancel();
        task.await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn keeps_running_after_a_failed_pass() {
        tokio::time::pause();

        let counter = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let pass = {
            let counter = Arc::clone(&counter);
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                std::future::ready(if n == 0 {
                    Err(AppError::config("simulated failure"))
                } else {
                    Ok(())
                })
            }
        };
        let task = tokio::spawn(run_scheduler(Duration::from_secs(60), cancel.clone(), pass));

        tokio::time::sleep(Duration::from_secs(125)).await;
        cancel.cancel();
        task.await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancellation_stops_future_firings() {
        tokio::time::pause();

        let counter = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_scheduler(
            Duration::from_secs(60),
            cancel.clone(),
            counting_pass(Arc::clone(&counter)),
        ));

        tokio::time::sleep(Duration::from_secs(65)).await;
        cancel.cancel();
        task.await.unwrap();
        let after_cancel = counter.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(counter.load(Ordering::SeqCst), after_cancel);
    }
}
