//! # Cascade
//!
//! Cascade is the execution core of a multi-tenant data-pipeline service.
//!
//! It provides:
//!
//! - **Leveled plan execution**: steps grouped into dependency levels, each
//!   level running its steps concurrently
//! - **Run/step state machines**: monotonic status transitions with durable,
//!   idempotent audit logging
//! - **Cooperative cancellation**: a token polled at level boundaries that
//!   lets in-flight steps finish
//! - **Error classification**: pattern-based fault taxonomy driving retry
//!   decisions and backoff
//! - **Alert evaluation**: declarative threshold alerts over an analytical
//!   store, with per-tenant cooldown
//! - **Notification delivery**: per-tenant channel registry with parallel
//!   fan-out and retry
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cascade::prelude::*;
//!
//! // Describe a plan
//! let spec = PlanSpec::new("nightly-costs")?
//!     .step(StepSpec::new("extract", StepKind::Ingest))
//!     .step(StepSpec::new("normalize", StepKind::Transform).depends_on(["extract"]))
//!     .step(StepSpec::new("publish", StepKind::Export).depends_on(["normalize"]));
//!
//! // Build and run it
//! let plan = ExecutionPlan::build(&spec, &registry)?;
//! let outcome = executor.run(&plan, ctx).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod alerts;
pub mod cancellation;
pub mod classify;
pub mod context;
pub mod core;
pub mod errors;
pub mod executor;
pub mod notify;
pub mod plan;
pub mod processor;
pub mod service;
pub mod testing;
pub mod transitions;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::alerts::{
        AlertConfig, AlertEngine, AlertHistory, AlertOutcome, Condition,
        ConditionOperator, InMemoryAlertHistory, MetricSource, TenantRow,
    };
    pub use crate::cancellation::CancellationToken;
    pub use crate::classify::{classify, is_retryable, retry_delay, ErrorClass};
    pub use crate::context::{RunContext, RunIdentity, TriggerInfo};
    pub use crate::core::{ErrorContext, RawProcessorResult, RunStatus, StepOutcome, StepStatus};
    pub use crate::errors::CascadeError;
    pub use crate::executor::{PipelineExecutor, PipelineRun, RunHandle, RunOutcome, StepRun};
    pub use crate::notify::{
        ChannelConfig, ChannelKind, DeliveryReport, NotificationChannel,
        NotificationPayload, ProviderRegistry, Severity,
    };
    pub use crate::plan::{ExecutionPlan, PlanSpec, ProcessorRegistry, StepKind, StepSpec};
    pub use crate::processor::Processor;
    pub use crate::service::CascadeService;
    pub use crate::transitions::{
        EntityKind, InMemoryTransitionStore, StateTransition, TransitionLog, TransitionStore,
    };
    pub use crate::utils::{generate_run_id, now_utc, Timestamp};
}
