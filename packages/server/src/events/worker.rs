//! Single-task queue worker used for ordered event delivery.
//!
//! A `BackgroundWorker<R>` owns one tokio task that pulls tasks from a bounded
//! mpsc channel and hands them to a [`BackgroundRunnable`] one at a time, so
//! tasks are processed strictly in submission order. Submission never waits:
//! a full queue rejects the task.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::ChannelError;

/// Queue capacity used when none is given.
pub const DEFAULT_CAPACITY: usize = 256;

/// Task handler executed by a [`BackgroundWorker`].
#[async_trait]
pub trait BackgroundRunnable: Send + 'static {
    type Task: Send + 'static;

    async fn run(&mut self, task: Self::Task);

    /// Called once after the queue has drained on stop. Default is a no-op.
    async fn shutdown(&mut self) {}
}

/// Handle to a worker task processing queued tasks in order.
pub struct BackgroundWorker<R: BackgroundRunnable> {
    tx: Option<mpsc::Sender<R::Task>>,
    stop_tx: Option<oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl<R: BackgroundRunnable> BackgroundWorker<R> {
    /// Spawns the worker with a queue of `capacity` tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(mut runnable: R, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<R::Task>(capacity.max(1));
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    task = rx.recv() => match task {
                        Some(task) => runnable.run(task).await,
                        None => break,
                    },
                    _ = &mut stop_rx => {
                        // Accepted tasks are still delivered before shutdown.
                        rx.close();
                        while let Some(task) = rx.recv().await {
                            runnable.run(task).await;
                        }
                        break;
                    }
                }
            }
            runnable.shutdown().await;
            debug!("background worker stopped");
        });

        Self {
            tx: Some(tx),
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Queues a task without waiting.
    ///
    /// # Errors
    ///
    /// [`ChannelError::Full`] when the queue is at capacity and
    /// [`ChannelError::Closed`] once the worker has been stopped.
    pub fn try_submit(&self, task: R::Task) -> Result<(), ChannelError> {
        let Some(tx) = &self.tx else {
            return Err(ChannelError::Closed);
        };
        tx.try_send(task).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => ChannelError::Full,
            mpsc::error::TrySendError::Closed(_) => ChannelError::Closed,
        })
    }

    /// Stops accepting tasks, drains the queue and waits for the worker task.
    pub async fn stop(&mut self) {
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio::sync::Notify;

    use super::*;

    struct Recording {
        seen: Arc<Mutex<Vec<u32>>>,
        shut_down: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl BackgroundRunnable for Recording {
        type Task = u32;

        async fn run(&mut self, task: u32) {
            tokio::task::yield_now().await;
            self.seen.lock().push(task);
        }

        async fn shutdown(&mut self) {
            *self.shut_down.lock() = true;
        }
    }

    fn recording() -> (Recording, Arc<Mutex<Vec<u32>>>, Arc<Mutex<bool>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let shut_down = Arc::new(Mutex::new(false));
        let runnable = Recording {
            seen: seen.clone(),
            shut_down: shut_down.clone(),
        };
        (runnable, seen, shut_down)
    }

    #[tokio::test]
    async fn tasks_run_in_submission_order_and_drain_on_stop() {
        let (runnable, seen, shut_down) = recording();
        let mut worker = BackgroundWorker::start(runnable, DEFAULT_CAPACITY);

        for task in 0..20 {
            worker.try_submit(task).unwrap();
        }
        worker.stop().await;

        assert_eq!(*seen.lock(), (0..20).collect::<Vec<_>>());
        assert!(*shut_down.lock());
    }

    #[tokio::test]
    async fn submit_after_stop_is_rejected() {
        let (runnable, _, _) = recording();
        let mut worker = BackgroundWorker::start(runnable, 4);
        worker.stop().await;
        assert_eq!(worker.try_submit(1), Err(ChannelError::Closed));
    }

    /// Blocks on its first task until released.
    struct Gated {
        started: Arc<AtomicBool>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl BackgroundRunnable for Gated {
        type Task = u32;

        async fn run(&mut self, _task: u32) {
            if !self.started.swap(true, Ordering::SeqCst) {
                self.release.notified().await;
            }
        }
    }

    #[tokio::test]
    async fn full_queue_rejects_instead_of_waiting() {
        let started = Arc::new(AtomicBool::new(false));
        let release = Arc::new(Notify::new());
        let mut worker = BackgroundWorker::start(
            Gated {
                started: started.clone(),
                release: release.clone(),
            },
            1,
        );

        worker.try_submit(0).unwrap();
        while !started.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        worker.try_submit(1).unwrap();
        assert_eq!(worker.try_submit(2), Err(ChannelError::Full));

        release.notify_one();
        worker.stop().await;
    }
}
