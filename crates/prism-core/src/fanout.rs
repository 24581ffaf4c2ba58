//! Bounded fan-out task group
//!
//! Runs a set of independent keyed tasks with a concurrency limit and joins
//! them under one of two policies:
//!
//! - [`JoinPolicy::All`]: every task runs to completion regardless of sibling
//!   failures.
//! - [`JoinPolicy::FailFast`]: the first failure aborts every task that has not
//!   finished yet.
//!
//! Results come back in spawn order, paired with the key they were spawned
//! with, never in completion order. An optional cancellation token aborts the
//! whole group.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinPolicy {
    All,
    FailFast,
}

/// Why a task did not produce a value
#[derive(Debug, Error)]
pub enum TaskError<E> {
    #[error("{0}")]
    Failed(E),

    #[error("task aborted before completion")]
    Aborted,

    #[error("task panicked: {0}")]
    Panicked(String),
}

impl<E> TaskError<E> {
    pub fn is_aborted(&self) -> bool {
        matches!(self, TaskError::Aborted)
    }
}

pub type TaskResult<T, E> = Result<T, TaskError<E>>;

pub struct TaskGroup<K, T, E> {
    keys: Vec<K>,
    set: JoinSet<(usize, TaskResult<T, E>)>,
    semaphore: Arc<Semaphore>,
    cancel: Option<CancellationToken>,
}

impl<K, T, E> TaskGroup<K, T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Create a group that runs at most `limit` tasks at once (minimum 1).
    pub fn new(limit: usize) -> Self {
        Self {
            keys: Vec::new(),
            set: JoinSet::new(),
            semaphore: Arc::new(Semaphore::new(limit.max(1))),
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Spawn an async task.
    pub fn spawn<F>(&mut self, key: K, task: F)
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let index = self.keys.len();
        self.keys.push(key);
        let semaphore = self.semaphore.clone();

        self.set.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return (index, Err(TaskError::Aborted));
            };
            let result = match AssertUnwindSafe(task).catch_unwind().await {
                Ok(result) => result.map_err(TaskError::Failed),
                Err(panic) => Err(TaskError::Panicked(panic_message(panic))),
            };
            (index, result)
        });
    }

    /// Spawn CPU-bound work on the blocking pool.
    pub fn spawn_blocking<F>(&mut self, key: K, task: F)
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        let index = self.keys.len();
        self.keys.push(key);
        let semaphore = self.semaphore.clone();

        self.set.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return (index, Err(TaskError::Aborted));
            };
            let result = match tokio::task::spawn_blocking(task).await {
                Ok(result) => result.map_err(TaskError::Failed),
                Err(e) if e.is_panic() => Err(TaskError::Panicked(panic_message(e.into_panic()))),
                Err(_) => Err(TaskError::Aborted),
            };
            (index, result)
        });
    }

    /// Wait for the group under `policy`. Every key appears exactly once in
    /// the output, in spawn order.
    pub async fn join(mut self, policy: JoinPolicy) -> Vec<(K, TaskResult<T, E>)> {
        let mut slots: Vec<Option<TaskResult<T, E>>> = self.keys.iter().map(|_| None).collect();
        let mut aborting = false;

        loop {
            let next = match (&self.cancel, aborting) {
                (Some(token), false) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            self.set.abort_all();
                            aborting = true;
                            continue;
                        }
                        next = self.set.join_next() => next,
                    }
                }
                _ => self.set.join_next().await,
            };

            let Some(joined) = next else { break };

            // Join errors only come from aborted tasks, whose slots stay empty.
            if let Ok((index, result)) = joined {
                if result.is_err() && policy == JoinPolicy::FailFast && !aborting {
                    self.set.abort_all();
                    aborting = true;
                }
                slots[index] = Some(result);
            }
        }

        self.keys
            .into_iter()
            .zip(slots)
            .map(|(key, slot)| (key, slot.unwrap_or(Err(TaskError::Aborted))))
            .collect()
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_follow_spawn_order() {
        let mut group: TaskGroup<&str, u32, String> = TaskGroup::new(4);
        group.spawn("slow", async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok(1)
        });
        group.spawn("fast", async { Ok(2) });
        group.spawn_blocking("blocking", || Ok(3));

        let results = group.join(JoinPolicy::All).await;
        let keys: Vec<&str> = results.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["slow", "fast", "blocking"]);
        let values: Vec<u32> = results.into_iter().map(|(_, r)| r.unwrap()).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_join_all_runs_every_task_despite_failures() {
        let completed = Arc::new(AtomicUsize::new(0));
        let mut group: TaskGroup<usize, (), String> = TaskGroup::new(2);

        for i in 0..6 {
            let completed = completed.clone();
            group.spawn(i, async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                completed.fetch_add(1, Ordering::SeqCst);
                if i == 1 {
                    Err("boom".to_string())
                } else {
                    Ok(())
                }
            });
        }

        let results = group.join(JoinPolicy::All).await;
        assert_eq!(completed.load(Ordering::SeqCst), 6);
        assert_eq!(results.iter().filter(|(_, r)| r.is_err()).count(), 1);
        assert!(matches!(&results[1].1, Err(TaskError::Failed(msg)) if msg == "boom"));
    }

    #[tokio::test]
    async fn test_fail_fast_aborts_pending_tasks() {
        let started = Arc::new(AtomicUsize::new(0));
        let mut group: TaskGroup<usize, (), String> = TaskGroup::new(1);

        group.spawn(0, async { Err("first".to_string()) });
        for i in 1..5 {
            let started = started.clone();
            group.spawn(i, async move {
                started.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            });
        }

        let results = tokio::time::timeout(Duration::from_secs(5), group.join(JoinPolicy::FailFast))
            .await
            .expect("fail-fast join should not wait for pending tasks");

        assert!(matches!(results[0].1, Err(TaskError::Failed(_))));
        assert!(results[1..].iter().all(|(_, r)| matches!(r, Err(TaskError::Aborted))));
        assert!(started.load(Ordering::SeqCst) <= 1);
    }

    #[tokio::test]
    async fn test_concurrency_limit_is_respected() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut group: TaskGroup<usize, (), ()> = TaskGroup::new(2);

        for i in 0..8 {
            let active = active.clone();
            let peak = peak.clone();
            group.spawn(i, async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let results = group.join(JoinPolicy::All).await;
        assert!(results.iter().all(|(_, r)| r.is_ok()));
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_panics_are_reported_per_task() {
        let mut group: TaskGroup<&str, u8, ()> = TaskGroup::new(2);
        group.spawn_blocking("blocking", || panic!("codec exploded"));
        group.spawn("async", async { Ok(7) });

        let results = group.join(JoinPolicy::All).await;
        assert!(matches!(&results[0].1, Err(TaskError::Panicked(msg)) if msg.contains("codec exploded")));
        assert_eq!(results[1].1.as_ref().ok(), Some(&7));
    }

    #[tokio::test]
    async fn test_cancellation_aborts_group() {
        let token = CancellationToken::new();
        let mut group: TaskGroup<usize, (), ()> =
            TaskGroup::new(4).with_cancellation(token.clone());
        for i in 0..3 {
            group.spawn(i, async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            });
        }

        token.cancel();
        let results = tokio::time::timeout(Duration::from_secs(5), group.join(JoinPolicy::All))
            .await
            .expect("cancelled join should return promptly");
        assert!(results.iter().all(|(_, r)| matches!(r, Err(TaskError::Aborted))));
    }

    #[tokio::test]
    async fn test_empty_group() {
        let group: TaskGroup<usize, (), ()> = TaskGroup::new(4);
        assert!(group.is_empty());
        assert!(group.join(JoinPolicy::FailFast).await.is_empty());
    }
}
