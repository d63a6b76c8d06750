//! The contract between tasks and the external systems doing their work.
//!
//! An operator splits a task's side-effecting work in two:
//!
//! * [`Operator::provide`] hands out a provider scoped to an evaluation
//!   context. The task definition uses it to describe the work as data, an
//!   operation spec.
//! * [`Operator::perform`] executes such a spec against the external system
//!   and turns the raw result into the task output.
//!
//! The engine only sees the trait, so any number of backends can be plugged
//! in without it knowing about them.

use crate::context::EvalContext;
use crate::error::OperatorError;

/// A pluggable executor for operation specs.
///
/// Implementations must be safe to share between threads: the scheduler may
/// call `perform` for independent tasks at the same time.
pub trait Operator: Send + Sync {
    /// Handle used on the definition side to build specs.
    type Provider;
    /// Description of one unit of delegated work.
    type Spec;
    /// The typed result produced by the spec's result transform.
    type Output;

    /// Prepares a provider for `context`. Must be cheap and must not reach
    /// out to the external system.
    fn provide(&self, context: &EvalContext) -> Self::Provider;

    /// Tells apart instances of the same operator type. Instances with equal
    /// keys share one provider per context; the default puts all instances
    /// of a type together.
    fn provider_key(&self) -> usize {
        0
    }

    /// Executes `spec`. Progress is reported to `listener`; apart from that
    /// and the returned value, calling this has no observable effect on the
    /// engine.
    fn perform(
        &self,
        spec: Self::Spec,
        listener: &dyn Listener,
    ) -> Result<Self::Output, OperatorError>;
}

/// Lifecycle of a single `perform` call.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The operator accepted a spec of the given request kind.
    Started { operation: &'static str },
    /// A call against the external system is about to be made.
    CallIssued { operation: &'static str },
    /// The external system returned a handle for the work, e.g. a job id.
    HandleObtained { handle: String },
    /// The spec was executed and its result transformed.
    Completed,
    /// The spec failed, nothing was produced.
    Failed { reason: String },
}

/// A write-only sink for operator progress.
pub trait Listener: Send + Sync {
    fn on_event(&self, event: &Event);
}

impl<F> Listener for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn on_event(&self, event: &Event) {
        self(event)
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl Listener for NoopListener {
    fn on_event(&self, _: &Event) {}
}

/// Reports events through `tracing`, failures at the `warn` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl Listener for TracingListener {
    fn on_event(&self, event: &Event) {
        match event {
            Event::Started { operation } => tracing::info!(operation, "operation started"),
            Event::CallIssued { operation } => tracing::debug!(operation, "external call issued"),
            Event::HandleObtained { handle } => tracing::info!(%handle, "external handle obtained"),
            Event::Completed => tracing::info!("operation completed"),
            Event::Failed { reason } => tracing::warn!(%reason, "operation failed"),
        }
    }
}
