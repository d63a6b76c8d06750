use std::any::{Any, TypeId, type_name};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::Span;

use crate::core::{Dynamic, TaskId};
use crate::error::EvalError;
use crate::operator::{Listener, Operator, TracingListener};
use crate::task::{ErasedTask, Task, TaskRef};

type ProviderKey = (TypeId, usize);

/// The capability bag handed to operators during one evaluation.
///
/// It carries the progress [`Listener`], user-supplied extensions looked up
/// by type, and the providers created for this context. Providers are made
/// once per operator, as told apart by its type and
/// [`Operator::provider_key`], and reused for every task evaluated here.
pub struct EvalContext {
    listener: Arc<dyn Listener>,
    extensions: HashMap<TypeId, Dynamic>,
    providers: Mutex<HashMap<ProviderKey, Arc<OnceCell<Dynamic>>>>,
}

impl EvalContext {
    /// A context reporting operator progress through `tracing`.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> EvalContextBuilder {
        EvalContextBuilder {
            listener: Arc::new(TracingListener),
            extensions: HashMap::new(),
        }
    }

    pub fn listener(&self) -> &dyn Listener {
        self.listener.as_ref()
    }

    /// Returns the extension of type `T`, if one was registered.
    pub fn get<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Returns the provider of `operator` for this context, creating it on
    /// first use. Concurrent first callers wait for a single `provide`.
    pub fn provider<O>(&self, operator: &O) -> O::Provider
    where
        O: Operator + 'static,
        O::Provider: Clone + Send + Sync + 'static,
    {
        let key = (TypeId::of::<O>(), operator.provider_key());

        // `provide` gets `&self`, so the map lock can't be held across it.
        let cell = {
            let mut providers = self.providers.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(providers.entry(key).or_default())
        };

        let stored = cell.get_or_init(|| {
            tracing::debug!(operator = type_name::<O>(), "creating provider");
            let provider: Dynamic = Arc::new(operator.provide(self));
            provider
        });

        match stored.downcast_ref::<O::Provider>() {
            Some(provider) => provider.clone(),
            None => operator.provide(self),
        }
    }

    /// Evaluates `task` and everything below it.
    ///
    /// The graph is forced first, in declared input order, and every id is
    /// planned once. Tasks then run level by level on the rayon pool, each
    /// after all of its inputs, so a task reachable through several paths
    /// runs once per call. Nothing is memoized across calls.
    pub fn evaluate<T>(&self, task: &Task<T>) -> Result<T, EvalError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let root = TaskRef::from(task);

        let mut plan = Plan::default();
        plan.insert(root.clone(), &mut HashSet::new())?;

        let mut outputs = self.run(&plan, &Span::current())?;

        outputs
            .remove(root.id())
            .and_then(|output| output.downcast_ref::<T>().cloned())
            .ok_or(EvalError::TypeMismatch {
                expected: type_name::<T>(),
            })
    }

    fn run(&self, plan: &Plan, parent: &Span) -> Result<HashMap<TaskId, Dynamic>, EvalError> {
        let mut outputs: HashMap<TaskId, Dynamic> = HashMap::with_capacity(plan.depths.len());

        for (depth, level) in plan.levels.iter().enumerate() {
            tracing::debug!(depth, tasks = level.len(), "running level");

            let done = level
                .par_iter()
                .map(|step| -> Result<(TaskId, Dynamic), EvalError> {
                    let id = step.task.id();
                    let span = tracing::info_span!(parent: parent, "task", id = %id);
                    let _enter = span.enter();

                    // Inputs always sit on lower levels.
                    let inputs: Vec<Dynamic> = step
                        .inputs
                        .iter()
                        .map(|input| Arc::clone(&outputs[input]))
                        .collect();

                    let output = step.task.erased().execute(self, &inputs)?;
                    Ok((id.clone(), output))
                })
                .collect::<Result<Vec<_>, EvalError>>()?;

            outputs.extend(done);
        }

        Ok(outputs)
    }
}

struct Step {
    task: TaskRef,
    inputs: Vec<TaskId>,
}

/// Distinct tasks of a graph grouped by depth, leaves first.
#[derive(Default)]
struct Plan {
    depths: HashMap<TaskId, usize>,
    levels: Vec<Vec<Step>>,
}

impl Plan {
    fn insert(&mut self, task: TaskRef, path: &mut HashSet<TaskId>) -> Result<usize, EvalError> {
        let id = task.id().clone();

        if let Some(&depth) = self.depths.get(&id) {
            return Ok(depth);
        }

        if !path.insert(id.clone()) {
            return Err(EvalError::Cycle(id));
        }

        let forced = task.inputs_in_order().map_err(|source| EvalError::Input {
            id: id.clone(),
            source,
        })?;

        let mut depth = 0;
        let mut inputs = Vec::with_capacity(forced.len());

        for input in forced {
            inputs.push(input.id().clone());
            depth = depth.max(self.insert(input, path)? + 1);
        }

        path.remove(&id);

        if self.levels.len() <= depth {
            self.levels.resize_with(depth + 1, Vec::new);
        }
        self.levels[depth].push(Step { task, inputs });
        self.depths.insert(id, depth);

        Ok(depth)
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EvalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvalContext")
            .field("extensions", &self.extensions.len())
            .finish_non_exhaustive()
    }
}

pub struct EvalContextBuilder {
    listener: Arc<dyn Listener>,
    extensions: HashMap<TypeId, Dynamic>,
}

impl EvalContextBuilder {
    pub fn listener(mut self, listener: impl Listener + 'static) -> Self {
        self.listener = Arc::new(listener);
        self
    }

    /// Registers a value retrievable with [`EvalContext::get`]. A second
    /// value of the same type replaces the first.
    pub fn extension<T>(mut self, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        self.extensions.insert(TypeId::of::<T>(), Arc::new(value));
        self
    }

    pub fn build(self) -> EvalContext {
        EvalContext {
            listener: self.listener,
            extensions: self.extensions,
            providers: Mutex::new(HashMap::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OperatorError;
    use crate::named;
    use crate::operator::{Event, NoopListener};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Doubler {
        provided: AtomicUsize,
    }

    #[derive(Clone)]
    struct Scale(i64);

    impl Operator for Doubler {
        type Provider = Scale;
        type Spec = i64;
        type Output = i64;

        fn provide(&self, context: &EvalContext) -> Scale {
            self.provided.fetch_add(1, Ordering::SeqCst);
            Scale(context.get::<i64>().copied().unwrap_or(2))
        }

        fn perform(&self, spec: i64, listener: &dyn Listener) -> Result<i64, OperatorError> {
            listener.on_event(&Event::Started { operation: "double" });
            listener.on_event(&Event::Completed);
            Ok(spec)
        }
    }

    fn adder(a: i64, b: i64) -> Task<i64> {
        named("Adder", (a, b)).constant(move || a + b)
    }

    #[test]
    fn test_evaluate_in_order() {
        let task = named("Concat", ())
            .input(|| named("A", ()).constant(|| String::from("a")))
            .input(|| named("B", ()).constant(|| String::from("b")))
            .input(|| adder(1, 2))
            .process(|(a, b, n)| Ok(format!("{a}{b}{n}")));

        let context = EvalContext::builder().listener(NoopListener).build();
        assert_eq!(context.evaluate(&task).unwrap(), "ab3");
    }

    #[test]
    fn test_evaluate_diamond() {
        let a = adder(1, 1);
        let a2 = a.clone();
        let b = named("B", ())
            .input(move || a2.clone())
            .process(|(a,)| Ok(a * 10));
        let root = named("R", ())
            .input(move || a.clone())
            .input(move || b.clone())
            .process(|(a, b)| Ok(a + b));

        assert_eq!(EvalContext::new().evaluate(&root).unwrap(), 22);
    }

    #[test]
    fn test_compute_failure() {
        let task = named("Fails", ())
            .input(|| adder(1, 1))
            .process(|(_,): (i64,)| -> anyhow::Result<i64> { anyhow::bail!("nope") });

        let err = EvalContext::new().evaluate(&task).unwrap_err();
        assert!(matches!(err, EvalError::Compute { ref id, .. } if id == task.id()));
    }

    #[test]
    fn test_input_failure() {
        let task = named("Root", ())
            .try_input(|| -> anyhow::Result<Task<i64>> { anyhow::bail!("bad parameter") })
            .process(|(x,)| Ok(x));

        let err = EvalContext::new().evaluate(&task).unwrap_err();
        match err {
            EvalError::Input { id, source } => {
                assert_eq!(&id, task.id());
                assert_eq!(source.to_string(), "bad parameter");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_provider_once_per_context() {
        let operator = Doubler {
            provided: AtomicUsize::new(0),
        };
        let context = EvalContext::builder().extension(3_i64).build();

        let first = context.provider(&operator);
        let second = context.provider(&operator);

        assert_eq!(first.0, 3);
        assert_eq!(second.0, 3);
        assert_eq!(operator.provided.load(Ordering::SeqCst), 1);

        let other = EvalContext::new();
        assert_eq!(other.provider(&operator).0, 2);
        assert_eq!(operator.provided.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_operator_task() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let task = named("Scaled", (21,))
            .input(|| adder(20, 1))
            .operator(
                Doubler {
                    provided: AtomicUsize::new(0),
                },
                |scale: &Scale, (n,)| Ok(n * scale.0),
            );

        let context = EvalContext::builder()
            .listener(move |event: &Event| sink.lock().unwrap().push(event.clone()))
            .build();

        assert_eq!(context.evaluate(&task).unwrap(), 42);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Event::Started { operation: "double" }, Event::Completed]
        );
    }

    #[test]
    fn test_missing_extension() {
        let context = EvalContext::new();
        assert!(context.get::<String>().is_none());
    }

    struct Slow {
        provided: Arc<AtomicUsize>,
        key: usize,
    }

    impl Operator for Slow {
        type Provider = Scale;
        type Spec = i64;
        type Output = i64;

        fn provide(&self, _: &EvalContext) -> Scale {
            self.provided.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(50));
            Scale(self.key as i64)
        }

        fn provider_key(&self) -> usize {
            self.key
        }

        fn perform(&self, spec: i64, _: &dyn Listener) -> Result<i64, OperatorError> {
            Ok(spec)
        }
    }

    fn scaled(name: &str, provided: &Arc<AtomicUsize>, key: usize) -> Task<i64> {
        let slow = Slow {
            provided: provided.clone(),
            key,
        };
        named(name, (key,)).operator(slow, |scale: &Scale, ()| Ok(scale.0))
    }

    #[test]
    fn test_parallel_first_use_provides_once() {
        let provided = Arc::new(AtomicUsize::new(0));
        let (p1, p2) = (provided.clone(), provided.clone());

        let root = named("Root", ())
            .input(move || scaled("Left", &p1, 7))
            .input(move || scaled("Right", &p2, 7))
            .process(|(a, b)| Ok(a + b));

        let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
        let context = EvalContext::builder().listener(NoopListener).build();

        assert_eq!(pool.install(|| context.evaluate(&root)).unwrap(), 14);
        assert_eq!(provided.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_keyed_operators_get_own_providers() {
        let provided = Arc::new(AtomicUsize::new(0));
        let (p1, p2) = (provided.clone(), provided.clone());

        let root = named("Root", ())
            .input(move || scaled("Left", &p1, 1))
            .input(move || scaled("Right", &p2, 100))
            .process(|(a, b)| Ok(a + b));

        assert_eq!(EvalContext::new().evaluate(&root).unwrap(), 101);
        assert_eq!(provided.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_shared_input_runs_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();

        let a = named("A", ()).constant(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            1_i64
        });
        let b = {
            let a = a.clone();
            named("B", ()).input(move || a.clone()).process(|(a,)| Ok(a * 10))
        };
        let root = named("R", ())
            .input(move || a.clone())
            .input(move || b.clone())
            .process(|(a, b)| Ok(a + b));

        let context = EvalContext::new();
        assert_eq!(context.evaluate(&root).unwrap(), 11);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        assert_eq!(context.evaluate(&root).unwrap(), 11);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cycle_is_reported() {
        fn looping(n: u32) -> Task<u32> {
            named("Loop", (n % 2,))
                .input(move || looping(n + 1))
                .process(|(x,)| Ok(x))
        }

        let err = EvalContext::new().evaluate(&looping(0)).unwrap_err();
        assert!(matches!(err, EvalError::Cycle(ref id) if id == looping(0).id()));
    }
}
