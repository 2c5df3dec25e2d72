// ── Bounded task runner ──
//
// Runs the jobs of one phase with a fixed number in flight. A failing or
// panicking job is caught at this boundary and reported; its siblings
// keep running. The caller gets every outcome once the pool drains.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::{FutureExt, StreamExt, stream};
use tracing::warn;

use crate::error::CoreError;

/// Settled job: the item's display name and what happened.
#[derive(Debug)]
pub struct JobOutcome<T> {
    pub name: String,
    pub result: Result<T, CoreError>,
}

/// Worker pool over async jobs.
#[derive(Debug, Clone, Copy)]
pub struct TaskRunner {
    concurrency: usize,
    item_delay: Duration,
}

impl TaskRunner {
    pub fn new(concurrency: usize, item_delay: Duration) -> Self {
        Self {
            concurrency: concurrency.max(1),
            item_delay,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Drive all jobs to completion.
    ///
    /// `on_settled` sees every outcome as it lands, in completion order,
    /// which is not the submission order.
    pub async fn run<T, Fut, F>(
        &self,
        jobs: Vec<(String, Fut)>,
        mut on_settled: F,
    ) -> Vec<JobOutcome<T>>
    where
        Fut: Future<Output = Result<T, CoreError>>,
        F: FnMut(&JobOutcome<T>),
    {
        let delay = self.item_delay;
        let total = jobs.len();

        let mut pool = stream::iter(jobs)
            .map(|(name, job)| async move {
                let result = match AssertUnwindSafe(job).catch_unwind().await {
                    Ok(result) => result,
                    Err(panic) => Err(CoreError::Internal(format!(
                        "job panicked: {}",
                        panic_message(panic.as_ref())
                    ))),
                };

                // The slot stays occupied through the delay.
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }

                JobOutcome { name, result }
            })
            .buffer_unordered(self.concurrency);

        let mut outcomes = Vec::with_capacity(total);
        while let Some(outcome) = pool.next().await {
            if let Err(e) = &outcome.result {
                warn!(item = %outcome.name, error = %e, "item failed");
            }
            on_settled(&outcome);
            outcomes.push(outcome);
        }
        outcomes
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures_util::future::BoxFuture;

    use super::*;

    fn explode() -> Result<(), CoreError> {
        panic!("widget exploded")
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_siblings() {
        let runner = TaskRunner::new(3, Duration::ZERO);
        let jobs: Vec<(String, BoxFuture<'static, Result<usize, CoreError>>)> = (0..10)
            .map(|i| {
                let job = async move {
                    if i == 4 {
                        Err(CoreError::Internal("boom".into()))
                    } else {
                        Ok(i)
                    }
                }
                .boxed();
                (format!("item-{i}"), job)
            })
            .collect();

        let mut settled = 0;
        let outcomes = runner.run(jobs, |_| settled += 1).await;

        assert_eq!(settled, 10);
        assert_eq!(outcomes.iter().filter(|o| o.result.is_ok()).count(), 9);
        let failed: Vec<_> = outcomes.iter().filter(|o| o.result.is_err()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].name, "item-4");
    }

    #[tokio::test]
    async fn panic_is_reported_as_failure() {
        let runner = TaskRunner::new(2, Duration::ZERO);
        let jobs: Vec<(String, BoxFuture<'static, Result<(), CoreError>>)> = vec![
            ("fine".into(), async { Ok(()) }.boxed()),
            (
                "explodes".into(),
                async { explode() }.boxed(),
            ),
        ];

        let outcomes = runner.run(jobs, |_| {}).await;
        let failed = outcomes
            .iter()
            .find(|o| o.name == "explodes")
            .map(|o| o.result.as_ref().map_err(ToString::to_string));
        match failed {
            Some(Err(message)) => assert!(message.contains("widget exploded")),
            other => panic!("expected panic failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn in_flight_never_exceeds_limit() {
        let runner = TaskRunner::new(2, Duration::ZERO);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs: Vec<_> = (0..8)
            .map(|i| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                let job = async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, CoreError>(i)
                };
                (format!("job-{i}"), job.boxed())
            })
            .collect();

        let outcomes = runner.run(jobs, |_| {}).await;
        assert_eq!(outcomes.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_holds_the_slot() {
        let runner = TaskRunner::new(1, Duration::from_millis(100));
        let jobs: Vec<_> = (0..3)
            .map(|i| (format!("job-{i}"), async move { Ok::<_, CoreError>(i) }.boxed()))
            .collect();

        let start = tokio::time::Instant::now();
        let outcomes = runner.run(jobs, |_| {}).await;
        assert_eq!(outcomes.len(), 3);
        assert!(start.elapsed() >= Duration::from_millis(300));
    }
}
