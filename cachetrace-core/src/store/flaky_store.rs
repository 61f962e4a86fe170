//! Test double that wraps an [InMemoryStore] and fails the commands it is told to fail.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::Error;
use crate::store::Store;
use crate::store::in_memory_store::InMemoryStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Command {
    Get,
    Set,
    Incr,
    Rpush,
    Lrange,
    FlushDb,
}

#[derive(Clone, Default)]
pub(crate) struct FlakyStore {
    inner: InMemoryStore,
    failing: Arc<Mutex<HashSet<Command>>>,
    /// `asynchronous` flag of every successful FLUSHDB, in call order.
    flushes: Arc<Mutex<Vec<bool>>>,
    unready: bool,
}

impl FlakyStore {
    pub(crate) fn failing(commands: &[Command]) -> Self {
        let store = Self::default();
        store.failing.lock().extend(commands.iter().copied());
        store
    }

    pub(crate) fn unready() -> Self {
        Self {
            unready: true,
            ..Default::default()
        }
    }

    pub(crate) fn heal(&self) {
        self.failing.lock().clear();
    }

    pub(crate) fn flushes(&self) -> Vec<bool> {
        self.flushes.lock().clone()
    }

    fn check(&self, command: Command) -> crate::Result<()> {
        if self.failing.lock().contains(&command) {
            return Err(Error::Transport(format!("{command:?} failed: broken pipe")));
        }
        Ok(())
    }
}

impl Store for FlakyStore {
    async fn get(&self, key: &str) -> crate::Result<Option<Bytes>> {
        self.check(Command::Get)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Bytes) -> crate::Result<()> {
        self.check(Command::Set)?;
        self.inner.set(key, value).await
    }

    async fn incr(&self, key: &str) -> crate::Result<i64> {
        self.check(Command::Incr)?;
        self.inner.incr(key).await
    }

    async fn rpush(&self, key: &str, value: Bytes) -> crate::Result<usize> {
        self.check(Command::Rpush)?;
        self.inner.rpush(key, value).await
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> crate::Result<Vec<Bytes>> {
        self.check(Command::Lrange)?;
        self.inner.lrange(key, start, stop).await
    }

    async fn flush_db(&self, asynchronous: bool) -> crate::Result<()> {
        self.check(Command::FlushDb)?;
        self.flushes.lock().push(asynchronous);
        self.inner.flush_db(asynchronous).await
    }

    async fn ready(&self) -> bool {
        !self.unready
    }
}
