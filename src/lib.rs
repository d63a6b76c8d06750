#![forbid(unsafe_code)]
//! Lazy task graphs with stable identities.
//!
//! A task instance is identified by its name and its parameter values, and
//! knows its inputs only as suppliers, so building a task never builds the
//! graph below it. The graph becomes concrete when it is walked:
//!
//! * [`materialize`] turns a task into a finite tree of [`GraphNode`]s,
//!   expanding every id once and referencing it afterwards.
//! * [`EvalContext::evaluate`] forces and runs the graph, handing
//!   operator-backed tasks to their [`Operator`].
//!
//! ```rust
//! use tsunagi::{materialize, named};
//!
//! let a = named("A", ()).constant(|| 1);
//! let b = {
//!     let a = a.clone();
//!     named("B", ()).input(move || a.clone()).process(|(a,)| Ok(a + 1))
//! };
//! let root = named("R", ())
//!     .input(move || a.clone())
//!     .input(move || b.clone())
//!     .process(|(a, b)| Ok(a + b));
//!
//! let tree = materialize(&root).unwrap();
//! assert!(tree.upstreams[1].upstreams[0].is_reference);
//! assert_eq!(tree.expanded_count(), 3);
//! ```

mod context;
mod core;
mod error;
mod graph;
mod operator;
mod task;

#[cfg(feature = "bigquery")]
pub mod bigquery;

pub use crate::context::{EvalContext, EvalContextBuilder};
pub use crate::core::{Params, TaskId};
pub use crate::error::*;
pub use crate::graph::{DependencyGraph, GraphNode, materialize};
pub use crate::operator::{Event, Listener, NoopListener, Operator, TracingListener};
pub use crate::task::{Inputs, Push, Task, TaskBuilder, TaskRef, named};

/// Installs a `tracing` subscriber printing to stderr, filtered by
/// `RUST_LOG` (defaults to `info`).
#[cfg(feature = "logging")]
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init()?;

    Ok(())
}
