//! Task instances and the definition API.
//!
//! A [`Task<T>`] is one node of the dependency graph: an identity, an ordered
//! list of *suspended* inputs and the code that produces a `T` from the input
//! values. Inputs are stored as suppliers which are only invoked when the
//! graph is traversed or evaluated, so building a task never builds the tasks
//! below it. This makes it possible to inspect a partial graph, and to
//! describe graphs that would be unbounded if they were expanded eagerly.
//!
//! ## Type erasure
//!
//! Tasks with different output types have to live in the same graph. The
//! typed [`Task<T>`] is backed by a node implementing the object-safe
//! `ErasedTask` trait, which stores outputs as `Arc<dyn Any + Send + Sync>`.
//! The [`Inputs`] trait is the bridge back: it is implemented for tuples of
//! output types and downcasts the erased outputs into the tuple the
//! `process` callback receives. The builder tracks the tuple type as inputs
//! are added, so a mismatch cannot be constructed through the public API.

use std::any::type_name;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::EvalContext;
use crate::core::{Dynamic, Params, TaskId};
use crate::error::EvalError;
use crate::operator::Operator;

/// A suspended reference to another task instance.
pub(crate) type Supplier = Arc<dyn Fn() -> anyhow::Result<TaskRef> + Send + Sync>;

/// The object-safe foundation that lets the graph hold tasks with different
/// output types.
pub(crate) trait ErasedTask: Send + Sync {
    fn id(&self) -> &TaskId;

    fn inputs(&self) -> &[Supplier];

    fn output_type_name(&self) -> &'static str;

    fn execute(&self, context: &EvalContext, inputs: &[Dynamic]) -> Result<Dynamic, EvalError>;
}

/// The code bound to a task, either a plain function or an operator.
trait Body<T>: Send + Sync {
    fn run(&self, id: &TaskId, context: &EvalContext, inputs: &[Dynamic]) -> Result<T, EvalError>;
}

struct TaskNode<T> {
    id: TaskId,
    inputs: Vec<Supplier>,
    body: Box<dyn Body<T>>,
}

// This is where the type erasure actually happens.
impl<T> ErasedTask for TaskNode<T>
where
    T: Send + Sync + 'static,
{
    fn id(&self) -> &TaskId {
        &self.id
    }

    fn inputs(&self) -> &[Supplier] {
        &self.inputs
    }

    fn output_type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn execute(&self, context: &EvalContext, inputs: &[Dynamic]) -> Result<Dynamic, EvalError> {
        let output = self.body.run(&self.id, context, inputs)?;
        Ok(Arc::new(output))
    }
}

/// A task instance producing a value of type `T`.
///
/// Cloning a task is cheap, clones share the same node.
pub struct Task<T> {
    node: Arc<TaskNode<T>>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}

impl<T> Task<T>
where
    T: Send + Sync + 'static,
{
    pub fn id(&self) -> &TaskId {
        &self.node.id
    }

    /// Forces the immediate inputs of this task, in declared order. Deeper
    /// levels of the graph stay suspended.
    pub fn inputs_in_order(&self) -> anyhow::Result<Vec<TaskRef>> {
        force_all(&self.node.inputs)
    }

    /// Returns an untyped reference to this task.
    pub fn erase(&self) -> TaskRef {
        TaskRef(self.node.clone())
    }
}

impl<T> std::fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.node.id)
            .field("inputs", &self.node.inputs.len())
            .finish()
    }
}

/// An untyped handle to a task instance, as produced by forcing an input.
#[derive(Clone)]
pub struct TaskRef(Arc<dyn ErasedTask>);

impl TaskRef {
    pub fn id(&self) -> &TaskId {
        self.0.id()
    }

    /// The name of the output type, for diagnostics.
    pub fn output_type(&self) -> &'static str {
        self.0.output_type_name()
    }

    /// Forces the immediate inputs of this task, in declared order.
    pub fn inputs_in_order(&self) -> anyhow::Result<Vec<TaskRef>> {
        force_all(self.0.inputs())
    }

    pub(crate) fn erased(&self) -> &dyn ErasedTask {
        self.0.as_ref()
    }
}

impl std::fmt::Debug for TaskRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TaskRef").field(self.id()).finish()
    }
}

impl<T> From<&Task<T>> for TaskRef
where
    T: Send + Sync + 'static,
{
    fn from(task: &Task<T>) -> Self {
        task.erase()
    }
}

impl<T> From<Task<T>> for TaskRef
where
    T: Send + Sync + 'static,
{
    fn from(task: Task<T>) -> Self {
        TaskRef(task.node)
    }
}

fn force_all(inputs: &[Supplier]) -> anyhow::Result<Vec<TaskRef>> {
    inputs.iter().map(|supplier| supplier()).collect()
}

/// Starts the definition of a task instance.
///
/// ```rust
/// use tsunagi::named;
///
/// let adder = named("Adder", (3, 5)).constant(|| 3 + 5);
/// let doubled = named("Double", ("adder",))
///     .input(move || adder.clone())
///     .process(|(sum,)| Ok(sum * 2));
///
/// assert!(doubled.id().to_string().starts_with("Double(adder)#"));
/// ```
pub fn named(name: impl AsRef<str>, params: impl Params) -> TaskBuilder<()> {
    TaskBuilder::new(name, params)
}

/// Builder for a task instance. `D` is the tuple of input output types
/// declared so far.
pub struct TaskBuilder<D> {
    id: TaskId,
    inputs: Vec<Supplier>,
    _phantom: PhantomData<fn() -> D>,
}

impl TaskBuilder<()> {
    pub fn new(name: impl AsRef<str>, params: impl Params) -> Self {
        Self {
            id: TaskId::new(name, params),
            inputs: vec![],
            _phantom: PhantomData,
        }
    }

    /// Binds a computation with no inputs.
    pub fn constant<R, F>(self, callback: F) -> Task<R>
    where
        R: Send + Sync + 'static,
        F: Fn() -> R + Send + Sync + 'static,
    {
        self.process(move |()| Ok(callback()))
    }
}

impl<D> TaskBuilder<D> {
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// Appends an input. The supplier is stored and only invoked when the
    /// graph is traversed.
    pub fn input<A, F>(self, supplier: F) -> TaskBuilder<<D as Push<A>>::Output>
    where
        D: Push<A>,
        A: Send + Sync + 'static,
        F: Fn() -> Task<A> + Send + Sync + 'static,
    {
        self.try_input(move || Ok(supplier()))
    }

    /// Appends an input whose construction may fail, for example when the
    /// upstream task validates its parameters. The failure surfaces when the
    /// input is forced.
    pub fn try_input<A, F>(mut self, supplier: F) -> TaskBuilder<<D as Push<A>>::Output>
    where
        D: Push<A>,
        A: Send + Sync + 'static,
        F: Fn() -> anyhow::Result<Task<A>> + Send + Sync + 'static,
    {
        self.inputs
            .push(Arc::new(move || supplier().map(TaskRef::from)));

        TaskBuilder {
            id: self.id,
            inputs: self.inputs,
            _phantom: PhantomData,
        }
    }

    /// Binds the computation producing this task's output from the values
    /// of its inputs, received as a tuple in declared order.
    pub fn process<R, F>(self, callback: F) -> Task<R>
    where
        D: Inputs + 'static,
        R: Send + Sync + 'static,
        F: Fn(D::Values) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        self.finish(Process {
            callback,
            _phantom: PhantomData::<fn() -> D>,
        })
    }

    /// Binds an operator. `build` turns the input values into an operation
    /// spec using the provider of the evaluation context; the operator then
    /// performs it against its external system.
    pub fn operator<O, F>(self, operator: O, build: F) -> Task<O::Output>
    where
        D: Inputs + 'static,
        O: Operator + 'static,
        O::Provider: Clone + Send + Sync + 'static,
        O::Output: Send + Sync + 'static,
        F: Fn(&O::Provider, D::Values) -> anyhow::Result<O::Spec> + Send + Sync + 'static,
    {
        self.finish(Operated {
            operator,
            build,
            _phantom: PhantomData::<fn() -> D>,
        })
    }

    fn finish<R>(self, body: impl Body<R> + 'static) -> Task<R> {
        Task {
            node: Arc::new(TaskNode {
                id: self.id,
                inputs: self.inputs,
                body: Box::new(body),
            }),
        }
    }
}

struct Process<D, F> {
    callback: F,
    _phantom: PhantomData<fn() -> D>,
}

impl<D, F, R> Body<R> for Process<D, F>
where
    D: Inputs,
    F: Fn(D::Values) -> anyhow::Result<R> + Send + Sync,
{
    fn run(&self, id: &TaskId, _: &EvalContext, inputs: &[Dynamic]) -> Result<R, EvalError> {
        let values = D::resolve(inputs)?;
        (self.callback)(values).map_err(|source| EvalError::Compute {
            id: id.clone(),
            source,
        })
    }
}

struct Operated<D, O, F> {
    operator: O,
    build: F,
    _phantom: PhantomData<fn() -> D>,
}

impl<D, O, F> Body<O::Output> for Operated<D, O, F>
where
    D: Inputs,
    O: Operator + 'static,
    O::Provider: Clone + Send + Sync + 'static,
    F: Fn(&O::Provider, D::Values) -> anyhow::Result<O::Spec> + Send + Sync,
{
    fn run(
        &self,
        id: &TaskId,
        context: &EvalContext,
        inputs: &[Dynamic],
    ) -> Result<O::Output, EvalError> {
        let values = D::resolve(inputs)?;
        let provider = context.provider(&self.operator);

        let spec = (self.build)(&provider, values).map_err(|source| EvalError::Compute {
            id: id.clone(),
            source,
        })?;

        tracing::debug!(task = %id, "performing operation");

        self.operator
            .perform(spec, context.listener())
            .map_err(|source| EvalError::Operator {
                id: id.clone(),
                source,
            })
    }
}

/// Appends a type to a tuple type. Used by the builder to track the types
/// of the declared inputs.
pub trait Push<Z> {
    type Output;
}

macro_rules! impl_push {
    ($($T:ident),*) => {
        impl<$($T,)* Z> Push<Z> for ($($T,)*) {
            type Output = ($($T,)* Z,);
        }
    };
}

impl_push!();
impl_push!(A);
impl_push!(A, B);
impl_push!(A, B, C);
impl_push!(A, B, C, D);
impl_push!(A, B, C, D, E);
impl_push!(A, B, C, D, E, F);
impl_push!(A, B, C, D, E, F, G);

/// A tuple of input output types which can be resolved from the erased
/// outputs of the inputs, in declared order.
pub trait Inputs {
    /// The values handed to the task callback.
    type Values;

    /// Downcasts the type-erased input outputs into [`Inputs::Values`].
    fn resolve(outputs: &[Dynamic]) -> Result<Self::Values, EvalError>;
}

impl Inputs for () {
    type Values = ();

    fn resolve(_: &[Dynamic]) -> Result<Self::Values, EvalError> {
        Ok(())
    }
}

fn downcast<T>(output: Option<&Dynamic>) -> Result<T, EvalError>
where
    T: Clone + 'static,
{
    output
        .and_then(|output| output.downcast_ref::<T>())
        .cloned()
        .ok_or(EvalError::TypeMismatch {
            expected: type_name::<T>(),
        })
}

macro_rules! impl_inputs {
    ($($T:ident),*) => {
        impl<$($T),*> Inputs for ($($T,)*)
        where
            $($T: Clone + Send + Sync + 'static),*
        {
            type Values = ($($T,)*);

            fn resolve(outputs: &[Dynamic]) -> Result<Self::Values, EvalError> {
                let mut iter = outputs.iter();
                Ok(($(downcast::<$T>(iter.next())?,)*))
            }
        }
    };
}

impl_inputs!(A);
impl_inputs!(A, B);
impl_inputs!(A, B, C);
impl_inputs!(A, B, C, D);
impl_inputs!(A, B, C, D, E);
impl_inputs!(A, B, C, D, E, F);
impl_inputs!(A, B, C, D, E, F, G);
impl_inputs!(A, B, C, D, E, F, G, H);
