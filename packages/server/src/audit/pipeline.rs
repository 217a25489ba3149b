//! Asynchronous audit pipeline.
//!
//! The split is strict: everything that depends on the request environment
//! (context, arguments, wall-clock start) is captured synchronously on the
//! request task; sanitization, message rendering, and persistence happen on
//! the audit worker. A job is pure data, so it can equally run inline on the
//! submitting task when the queue is saturated, as backpressure without loss.
//!
//! Persistence faults never surface to the audited operation. A record with
//! no tenant is dropped with a warning, never persisted cross-tenant.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;
use quill_core::{sanitize, AuditStatus};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::AuditConfig;
use crate::context::ContextSnapshot;
use crate::tenant::directory::epoch_ms_now;
use crate::worker::{BackgroundRunnable, BackgroundWorker};

use super::record::{AuditRecord, AuditSink};
use super::spec::{AuditSpec, CapturedArgs};

/// Everything the worker needs to produce one record. Owned values only; the
/// request may be long gone by the time this runs.
pub struct AuditJob {
    pub spec: &'static AuditSpec,
    pub snapshot: ContextSnapshot,
    pub args: CapturedArgs,
    pub status: AuditStatus,
    /// Serialized result of a successful invocation, when the spec wants it.
    pub result: Option<Value>,
    /// Error rendering of a failed invocation, appended to the message.
    pub error: Option<String>,
    pub execution_time_ms: u64,
}

impl AuditJob {
    /// Sanitize and assemble the final record. `None` means the job carries
    /// no tenant and must be dropped.
    fn into_record(self) -> Option<AuditRecord> {
        let Some(tenant) = self.snapshot.tenant else {
            warn!(
                action = self.spec.action.as_str(),
                "audit record without tenant context dropped"
            );
            metrics::counter!("quill_audit_dropped_total").increment(1);
            return None;
        };

        let mut message = self.args.render(self.spec.message);
        if let Some(error) = &self.error {
            message.push_str(" [error: ");
            message.push_str(error);
            message.push(']');
        }

        let params = if self.spec.capture_args && !self.args.is_empty() {
            Some(sanitize(self.args.into_value(), &self.spec.limits))
        } else {
            None
        };
        let result = if self.spec.capture_result {
            self.result
                .map(|value| sanitize(value, &self.spec.limits))
        } else {
            None
        };

        let (user_id, username) = match self.snapshot.principal {
            Some(principal) => (Some(principal.user_id), principal.username),
            None => (None, "anonymous".to_string()),
        };
        let meta = self.snapshot.meta.unwrap_or_default();

        Some(AuditRecord {
            tenant_id: tenant.id,
            user_id,
            username,
            action: self.spec.action.as_str(),
            status: self.status,
            ip: meta.ip,
            location: None,
            device: meta.device,
            browser: meta.browser,
            os: meta.os,
            message,
            params,
            result,
            execution_time_ms: self.execution_time_ms,
            create_time_ms: epoch_ms_now(),
        })
    }

    /// Run the post phase: build the record and persist it, containing any
    /// sink fault.
    async fn execute(self, sink: &dyn AuditSink) {
        let Some(record) = self.into_record() else {
            return;
        };
        if let Err(err) = sink.persist(record).await {
            error!(error = %err, "audit record persistence failed");
            metrics::counter!("quill_audit_persist_failures_total").increment(1);
        }
    }
}

struct PersistRunnable {
    sink: Arc<dyn AuditSink>,
}

#[async_trait]
impl BackgroundRunnable for PersistRunnable {
    type Task = AuditJob;

    async fn run(&mut self, job: AuditJob) {
        // Re-establish the submitting request's context around the post
        // phase, so the sink observes the same ambient state the request had.
        // The scope tears it down before the worker's next job.
        let snapshot = job.snapshot.clone();
        snapshot.restore(job.execute(self.sink.as_ref())).await;
    }
}

/// Entry point for audited operations.
pub struct AuditPipeline {
    sink: Arc<dyn AuditSink>,
    worker: Mutex<Option<BackgroundWorker<PersistRunnable>>>,
}

impl AuditPipeline {
    /// Start the pipeline over `sink` with a bounded queue.
    #[must_use]
    pub fn start(sink: Arc<dyn AuditSink>, config: &AuditConfig) -> Self {
        let worker = BackgroundWorker::start(
            PersistRunnable { sink: sink.clone() },
            config.queue_capacity,
            u64::try_from(config.tick_interval.as_millis()).unwrap_or(60_000),
        );
        Self {
            sink,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Observe one invocation of an audited operation.
    ///
    /// Context and arguments are snapshotted before `fut` runs; the result is
    /// returned untouched. The post phase happens off this task unless the
    /// queue is full, in which case it runs here before returning.
    pub async fn observe<F, T, E>(
        &self,
        spec: &'static AuditSpec,
        args: CapturedArgs,
        fut: F,
    ) -> Result<T, E>
    where
        F: std::future::Future<Output = Result<T, E>>,
        T: Serialize,
        E: std::fmt::Display,
    {
        let snapshot = ContextSnapshot::capture();
        let start = Instant::now();

        let outcome = fut.await;
        let execution_time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (status, result, error) = match &outcome {
            Ok(value) => {
                let result = if spec.capture_result {
                    serde_json::to_value(value).ok()
                } else {
                    None
                };
                (AuditStatus::Success, result, None)
            }
            Err(err) => (AuditStatus::Failure, None, Some(err.to_string())),
        };

        self.dispatch(AuditJob {
            spec,
            snapshot,
            args,
            status,
            result,
            error,
            execution_time_ms,
        })
        .await;

        outcome
    }

    /// Hand a job to the worker; run it inline when the queue is saturated or
    /// the worker has stopped.
    pub async fn dispatch(&self, job: AuditJob) {
        let rejected = {
            let guard = self.worker.lock();
            match guard.as_ref() {
                Some(worker) => worker.try_submit(job).err(),
                None => Some(job),
            }
        };
        if let Some(job) = rejected {
            debug!("audit queue saturated, running job on the submitting task");
            job.execute(self.sink.as_ref()).await;
        }
    }

    /// Stop the worker, draining jobs already accepted.
    pub async fn shutdown(&self) {
        let worker = self.worker.lock().take();
        if let Some(mut worker) = worker {
            worker.stop().await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
