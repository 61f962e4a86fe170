//! Renders the recorded call history of an instrumented operation.

use std::fmt;
use std::io::Write;

use bytes::Bytes;
use tracing::error;

use crate::cache::Cache;
use crate::instrument::{Layer, Operation};
use crate::report::run_and_report;
use crate::store::Store;
use crate::{Error, Result};

/// Call count and paired (input, output) history of one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub name: String,
    pub calls: i64,
    pub entries: Vec<(String, String)>,
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} was called {} times:", self.name, self.calls)?;
        for (input, output) in &self.entries {
            writeln!(f, "{}(*{}) -> {}", self.name, input, output)?;
        }
        Ok(())
    }
}

fn decode(raw: &Bytes) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// Reads the counter and both history lists of `op`. A missing counter reads as zero;
/// entries are paired up to the shorter list.
pub async fn trace<S: Store>(store: &S, op: &Operation) -> Result<Trace> {
    let calls = match store.get(op.counter_key()).await? {
        None => 0,
        Some(raw) => std::str::from_utf8(&raw)
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .ok_or_else(|| {
                Error::Decode(format!("call count of {op} is not an integer: {raw:?}"))
            })?,
    };

    let inputs = store.lrange(op.inputs_key(), 0, -1).await?;
    let outputs = store.lrange(op.outputs_key(), 0, -1).await?;

    let entries = inputs
        .iter()
        .zip(outputs.iter())
        .map(|(input, output)| (decode(input), decode(output)))
        .collect();

    Ok(Trace {
        name: op.name().to_string(),
        calls,
        entries,
    })
}

/// Writes the history of the operation named `name` to `out`. Unknown operations, an
/// unreachable store and read failures are reported and nothing is written.
pub async fn replay_to<S, L, W>(cache: &Cache<S, L>, name: &str, out: &mut W)
where
    S: Store,
    L: Layer<S>,
    W: Write,
{
    let Some(op) = cache.operation(name) else {
        let e = Error::InvalidOperation(name.to_string());
        error!(error = %e, "Invalid operation provided for replay");
        return;
    };

    let store = cache.adapter();
    if !store.ready().await {
        error!(%op, "No store instance found for replay");
        return;
    }

    let Some(trace) = run_and_report("reading history for replay", trace(store, op)).await
    else {
        return;
    };

    if let Err(e) = write!(out, "{trace}") {
        error!(error = %e, %op, "Writing replay output");
    }
}

/// Prints the history of the operation named `name` to stdout.
pub async fn replay<S, L>(cache: &Cache<S, L>, name: &str)
where
    S: Store,
    L: Layer<S>,
{
    let mut rendered = Vec::new();
    replay_to(cache, name, &mut rendered).await;
    if let Err(e) = std::io::stdout().write_all(&rendered) {
        error!(error = %e, name, "Writing replay output");
    }
}
