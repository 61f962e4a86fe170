//! In-memory implementation of the [Store] trait for tests and for running without an
//! external store. Clones share the same keyspace.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;

use crate::Error;
use crate::store::Store;

const WRONGTYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

#[derive(Clone, Debug)]
enum Entry {
    Scalar(Bytes),
    List(Vec<Bytes>),
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    keyspace: Arc<Mutex<HashMap<String, Entry>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.keyspace.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyspace.lock().is_empty()
    }
}

/// Resolves LRANGE bounds against a list of `len` elements. Returns `None` when the
/// range selects nothing.
fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}

impl Store for InMemoryStore {
    async fn get(&self, key: &str) -> crate::Result<Option<Bytes>> {
        match self.keyspace.lock().get(key) {
            None => Ok(None),
            Some(Entry::Scalar(value)) => Ok(Some(value.clone())),
            Some(Entry::List(_)) => Err(Error::Transport(WRONGTYPE.to_string())),
        }
    }

    async fn set(&self, key: &str, value: Bytes) -> crate::Result<()> {
        self.keyspace
            .lock()
            .insert(key.to_string(), Entry::Scalar(value));
        Ok(())
    }

    async fn incr(&self, key: &str) -> crate::Result<i64> {
        let mut keyspace = self.keyspace.lock();
        let current = match keyspace.get(key) {
            None => 0,
            Some(Entry::Scalar(value)) => std::str::from_utf8(value)
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .ok_or_else(|| {
                    Error::Transport("value is not an integer or out of range".to_string())
                })?,
            Some(Entry::List(_)) => return Err(Error::Transport(WRONGTYPE.to_string())),
        };
        let next = current
            .checked_add(1)
            .ok_or_else(|| Error::Transport("increment would overflow".to_string()))?;
        keyspace.insert(
            key.to_string(),
            Entry::Scalar(Bytes::from(next.to_string())),
        );
        Ok(next)
    }

    async fn rpush(&self, key: &str, value: Bytes) -> crate::Result<usize> {
        let mut keyspace = self.keyspace.lock();
        let entry = keyspace
            .entry(key.to_string())
            .or_insert_with(|| Entry::List(Vec::new()));
        match entry {
            Entry::List(list) => {
                list.push(value);
                Ok(list.len())
            }
            Entry::Scalar(_) => Err(Error::Transport(WRONGTYPE.to_string())),
        }
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> crate::Result<Vec<Bytes>> {
        match self.keyspace.lock().get(key) {
            None => Ok(Vec::new()),
            Some(Entry::List(list)) => Ok(resolve_range(list.len(), start, stop)
                .and_then(|(start, stop)| list.get(start..=stop))
                .map(<[Bytes]>::to_vec)
                .unwrap_or_default()),
            Some(Entry::Scalar(_)) => Err(Error::Transport(WRONGTYPE.to_string())),
        }
    }

    async fn flush_db(&self, asynchronous: bool) -> crate::Result<()> {
        let mut keyspace = self.keyspace.lock();
        debug!(keys = keyspace.len(), asynchronous, "Flushing in-memory store");
        keyspace.clear();
        Ok(())
    }

    async fn ready(&self) -> bool {
        true
    }
}
