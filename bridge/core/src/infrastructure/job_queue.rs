// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// In-Memory Job Queue - Launch descriptor hand-off
//
// Descriptors are pushed onto a tokio mpsc channel and drained by a single
// worker task that performs the launch against the engine. Retries give
// at-least-once execution while the process is alive; queued jobs are lost
// on restart.

use crate::domain::config::QueueConfig;
use crate::domain::launch::{JobId, LaunchDescriptor};
use crate::domain::repository::{JobQueue, QueueError};
use crate::infrastructure::ruote_client::RuoteClient;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Executes a launch descriptor. Implemented by the engine client.
#[async_trait]
pub trait LaunchExecutor: Send + Sync {
    async fn perform(&self, descriptor: &LaunchDescriptor) -> anyhow::Result<()>;
}

#[async_trait]
impl LaunchExecutor for RuoteClient {
    async fn perform(&self, descriptor: &LaunchDescriptor) -> anyhow::Result<()> {
        self.launch(descriptor).await?;
        Ok(())
    }
}

/// Producer side of the in-memory queue
#[derive(Clone)]
pub struct InMemoryJobQueue {
    sender: mpsc::UnboundedSender<LaunchDescriptor>,
}

/// Consumer side, handed to a [`LaunchWorker`]
pub struct LaunchReceiver {
    receiver: mpsc::UnboundedReceiver<LaunchDescriptor>,
}

impl InMemoryJobQueue {
    pub fn new() -> (Self, LaunchReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, LaunchReceiver { receiver })
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, descriptor: LaunchDescriptor) -> Result<JobId, QueueError> {
        let job_id = descriptor.job_id;
        self.sender.send(descriptor).map_err(|_| QueueError::Closed)?;
        debug!(job_id = %job_id, "Launch descriptor queued");
        Ok(job_id)
    }
}

/// Totals reported when a worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub performed: usize,
    pub dropped: usize,
}

/// Drains the queue and performs each launch, retrying failed attempts.
pub struct LaunchWorker {
    receiver: LaunchReceiver,
    executor: Arc<dyn LaunchExecutor>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl LaunchWorker {
    pub fn new(receiver: LaunchReceiver, executor: Arc<dyn LaunchExecutor>, config: &QueueConfig) -> Self {
        Self {
            receiver,
            executor,
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    /// Run until every [`InMemoryJobQueue`] handle has been dropped.
    pub async fn run(mut self) -> WorkerStats {
        info!("Launch worker started");
        let mut stats = WorkerStats::default();

        while let Some(descriptor) = self.receiver.receiver.recv().await {
            if self.execute(&descriptor).await {
                stats.performed += 1;
            } else {
                stats.dropped += 1;
            }
        }

        info!(performed = stats.performed, dropped = stats.dropped, "Launch worker stopped: queue closed");
        stats
    }

    /// Perform one descriptor. Returns whether it eventually succeeded.
    pub async fn execute(&self, descriptor: &LaunchDescriptor) -> bool {
        for attempt in 1..=self.max_attempts {
            match self.executor.perform(descriptor).await {
                Ok(()) => {
                    metrics::counter!("ruote_launch_jobs_total", "result" => "performed").increment(1);
                    return true;
                }
                Err(e) if attempt < self.max_attempts => {
                    warn!(
                        job_id = %descriptor.job_id,
                        attempt,
                        "Launch attempt failed, retrying: {:#}",
                        e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    error!(
                        job_id = %descriptor.job_id,
                        attempts = self.max_attempts,
                        "Launch failed permanently: {:#}",
                        e
                    );
                }
            }
        }

        metrics::counter!("ruote_launch_jobs_total", "result" => "dropped").increment(1);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct FlakyExecutor {
        failures_left: Mutex<u32>,
        performed: Mutex<Vec<JobId>>,
    }

    #[async_trait]
    impl LaunchExecutor for FlakyExecutor {
        async fn perform(&self, descriptor: &LaunchDescriptor) -> anyhow::Result<()> {
            let mut failures = self.failures_left.lock();
            if *failures > 0 {
                *failures -= 1;
                anyhow::bail!("engine hiccup");
            }
            self.performed.lock().push(descriptor.job_id);
            Ok(())
        }
    }

    fn descriptor() -> LaunchDescriptor {
        LaunchDescriptor::new("<process-definition/>", &serde_json::Map::new()).unwrap()
    }

    fn config(max_attempts: u32) -> QueueConfig {
        QueueConfig { max_attempts, retry_delay_ms: 0 }
    }

    #[tokio::test]
    async fn test_worker_drains_queue() {
        let (queue, receiver) = InMemoryJobQueue::new();
        let executor = Arc::new(FlakyExecutor { failures_left: Mutex::new(0), performed: Mutex::new(vec![]) });
        let worker = LaunchWorker::new(receiver, executor.clone(), &config(1));

        let first = queue.enqueue(descriptor()).await.unwrap();
        let second = queue.enqueue(descriptor()).await.unwrap();
        drop(queue);

        let stats = worker.run().await;
        assert_eq!(stats, WorkerStats { performed: 2, dropped: 0 });
        assert_eq!(*executor.performed.lock(), vec![first, second]);
    }

    #[tokio::test]
    async fn test_worker_retries_until_success() {
        let (_queue, receiver) = InMemoryJobQueue::new();
        let executor = Arc::new(FlakyExecutor { failures_left: Mutex::new(2), performed: Mutex::new(vec![]) });
        let worker = LaunchWorker::new(receiver, executor.clone(), &config(3));

        assert!(worker.execute(&descriptor()).await);
        assert_eq!(executor.performed.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_worker_gives_up() {
        let (_queue, receiver) = InMemoryJobQueue::new();
        let executor = Arc::new(FlakyExecutor { failures_left: Mutex::new(5), performed: Mutex::new(vec![]) });
        let worker = LaunchWorker::new(receiver, executor.clone(), &config(2));

        assert!(!worker.execute(&descriptor()).await);
        assert!(executor.performed.lock().is_empty());
    }

    #[test]
    fn test_enqueue_after_worker_dropped() {
        let (queue, receiver) = InMemoryJobQueue::new();
        drop(receiver);
        let result = tokio_test::block_on(queue.enqueue(descriptor()));
        assert!(matches!(result, Err(QueueError::Closed)));
    }
}
