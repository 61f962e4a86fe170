//! Instrumentation layers wrapped around store-backed operations.
//!
//! A [Layer] gets a hook before the wrapped call (with the rendered arguments) and a hook
//! after it (with the rendered result). Layers keep no state of their own: everything they
//! record goes through the [Store] handle they are given, addressed by the [Operation]'s
//! name. Hooks are best-effort, a failing store call is reported and the wrapped call still
//! runs.
//!
//! Layers compose with [Stack]. `Stack::new(outer, inner)` runs `outer.before`,
//! `inner.before`, the call, `inner.after`, `outer.after`.

use std::fmt;
use std::future::Future;

use bytes::Bytes;
use tracing::trace;

use crate::report::run_and_report;
use crate::store::Store;

/// Stable identity of an instrumented operation. The name doubles as the counter key and
/// prefixes the two history lists.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Operation {
    name: &'static str,
    inputs_key: String,
    outputs_key: String,
}

impl Operation {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inputs_key: format!("{name}:inputs"),
            outputs_key: format!("{name}:outputs"),
        }
    }

    /// Fully-qualified name, e.g. `Cache.store`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn counter_key(&self) -> &str {
        self.name
    }

    pub fn inputs_key(&self) -> &str {
        &self.inputs_key
    }

    pub fn outputs_key(&self) -> &str {
        &self.outputs_key
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Around-call capability. Both hooks are infallible from the caller's point of view.
#[trait_variant::make(Send)]
pub trait Layer<S: Store>: Sync {
    async fn before(&self, store: &S, op: &Operation, args: &str);

    async fn after(&self, store: &S, op: &Operation, output: &str);
}

/// Counts invocations with INCR on the operation's name. May undercount when the store
/// fails, never blocks the call.
#[derive(Clone, Copy, Debug, Default)]
pub struct CountCalls;

impl<S: Store> Layer<S> for CountCalls {
    async fn before(&self, store: &S, op: &Operation, _args: &str) {
        if let Some(calls) =
            run_and_report("incrementing call count", store.incr(op.counter_key())).await
        {
            trace!(%op, calls, "Counted call");
        }
    }

    async fn after(&self, _store: &S, _op: &Operation, _output: &str) {}
}

/// Appends rendered arguments to `<name>:inputs` before the call and the rendered result
/// to `<name>:outputs` after it.
#[derive(Clone, Copy, Debug, Default)]
pub struct CallHistory;

impl<S: Store> Layer<S> for CallHistory {
    async fn before(&self, store: &S, op: &Operation, args: &str) {
        run_and_report(
            "pushing inputs",
            store.rpush(op.inputs_key(), Bytes::copy_from_slice(args.as_bytes())),
        )
        .await;
    }

    async fn after(&self, store: &S, op: &Operation, output: &str) {
        run_and_report(
            "pushing outputs",
            store.rpush(op.outputs_key(), Bytes::copy_from_slice(output.as_bytes())),
        )
        .await;
    }
}

/// Ordered composition of two layers.
#[derive(Clone, Copy, Debug, Default)]
pub struct Stack<O, I> {
    outer: O,
    inner: I,
}

impl<O, I> Stack<O, I> {
    pub fn new(outer: O, inner: I) -> Self {
        Self { outer, inner }
    }
}

impl<S, O, I> Layer<S> for Stack<O, I>
where
    S: Store,
    O: Layer<S>,
    I: Layer<S>,
{
    async fn before(&self, store: &S, op: &Operation, args: &str) {
        self.outer.before(store, op, args).await;
        self.inner.before(store, op, args).await;
    }

    async fn after(&self, store: &S, op: &Operation, output: &str) {
        self.inner.after(store, op, output).await;
        self.outer.after(store, op, output).await;
    }
}

/// Runs `call` inside `layer`. The result is rendered with [fmt::Display] for the `after`
/// hook and returned unchanged.
pub async fn invoke<S, L, F, Fut, T>(
    layer: &L,
    store: &S,
    op: &Operation,
    args: &str,
    call: F,
) -> T
where
    S: Store,
    L: Layer<S>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
    T: fmt::Display,
{
    layer.before(store, op, args).await;
    let output = call().await;
    layer.after(store, op, &output.to_string()).await;
    output
}
