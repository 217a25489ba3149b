//! Security audit capture and persistence.
//!
//! Split into three stages: declarative [`AuditSpec`]s describe what each
//! operation records, the synchronous capture path snapshots context and
//! arguments on the request task, and the asynchronous pipeline sanitizes and
//! persists records off the request path.

pub mod pipeline;
pub mod record;
pub mod spec;

pub use pipeline::{AuditJob, AuditPipeline};
pub use record::{AuditRecord, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use spec::{AuditSpec, CapturedArgs};
