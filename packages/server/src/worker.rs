//! Background worker for asynchronous pipeline stages.
//!
//! A generic `BackgroundWorker<R>` processes tasks from a bounded mpsc
//! channel via a `BackgroundRunnable` implementation, with periodic tick
//! callbacks. Submission is non-blocking: a full queue hands the task back to
//! the caller instead of dropping it, so callers can run it inline as
//! backpressure.

use async_trait::async_trait;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// BackgroundRunnable trait
// ---------------------------------------------------------------------------

/// Trait for task handlers executed by `BackgroundWorker`.
#[async_trait]
pub trait BackgroundRunnable: Send + 'static {
    /// The type of task this runnable processes.
    type Task: Send + 'static;

    /// Process a single task.
    async fn run(&mut self, task: Self::Task);

    /// Called periodically (on each tick interval). Default is a no-op.
    async fn on_tick(&mut self) {}

    /// Called once when the worker is shutting down, after the queue has been
    /// drained. Default is a no-op.
    async fn shutdown(&mut self) {}
}

// ---------------------------------------------------------------------------
// BackgroundWorker
// ---------------------------------------------------------------------------

/// Generic background worker that processes tasks via a bounded mpsc channel.
///
/// The worker spawns a tokio task that:
/// 1. Listens for tasks on the mpsc channel
/// 2. Calls `BackgroundRunnable::run()` for each task
/// 3. Periodically calls `BackgroundRunnable::on_tick()` at the configured interval
/// 4. On stop, drains tasks still queued, then calls `shutdown()`
pub struct BackgroundWorker<R: BackgroundRunnable> {
    tx: Option<mpsc::Sender<R::Task>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl<R: BackgroundRunnable> BackgroundWorker<R> {
    /// Start the background worker with the given runnable, queue capacity,
    /// and tick interval.
    pub fn start(mut runnable: R, capacity: usize, tick_interval_ms: u64) -> Self {
        let (tx, mut rx) = mpsc::channel::<R::Task>(capacity);
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut tick_interval =
                tokio::time::interval(std::time::Duration::from_millis(tick_interval_ms));
            // Skip the first immediate tick so on_tick doesn't fire at startup.
            tick_interval.tick().await;

            loop {
                tokio::select! {
                    task = rx.recv() => {
                        match task {
                            Some(t) => runnable.run(t).await,
                            None => break, // Channel closed.
                        }
                    }
                    _ = tick_interval.tick() => {
                        runnable.on_tick().await;
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }

            // Queued tasks were accepted; finish them before shutting down.
            while let Ok(task) = rx.try_recv() {
                runnable.run(task).await;
            }

            runnable.shutdown().await;
        });

        Self {
            tx: Some(tx),
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Submit a task without blocking.
    ///
    /// # Errors
    ///
    /// Hands the task back when the queue is full or the worker has stopped;
    /// the caller decides whether to run it inline or discard it.
    pub fn try_submit(&self, task: R::Task) -> Result<(), R::Task> {
        match &self.tx {
            Some(tx) => tx.try_send(task).map_err(mpsc::error::TrySendError::into_inner),
            None => Err(task),
        }
    }

    /// Stop the worker gracefully, waiting for queued tasks to finish.
    pub async fn stop(&mut self) {
        // Close the task channel first so queued tasks drain.
        self.tx.take();
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
