use bytes::Bytes;

pub mod in_memory_store;
pub mod redis_store;

#[cfg(test)]
pub(crate) mod flaky_store;

/// Store is the client-side view of the external key-value service. Every command maps to
/// a single round-trip which the service applies atomically; nothing here composes commands
/// into a transaction.
#[trait_variant::make(Send)]
pub trait Store: Clone + Send + Sync + 'static {
    /// GET. `None` when the key is absent.
    async fn get(&self, key: &str) -> crate::Result<Option<Bytes>>;

    /// SET, last write wins.
    async fn set(&self, key: &str, value: Bytes) -> crate::Result<()>;

    /// INCR. An absent key starts at 0; returns the value after the increment.
    async fn incr(&self, key: &str) -> crate::Result<i64>;

    /// RPUSH a single element, returns the list length after the push.
    async fn rpush(&self, key: &str, value: Bytes) -> crate::Result<usize>;

    /// LRANGE with inclusive bounds. Negative indices count from the tail, so `0, -1`
    /// returns the whole list. An absent key is an empty list.
    async fn lrange(&self, key: &str, start: isize, stop: isize) -> crate::Result<Vec<Bytes>>;

    /// FLUSHDB, optionally letting the service reclaim memory in the background.
    async fn flush_db(&self, asynchronous: bool) -> crate::Result<()>;

    /// Check if the store is reachable.
    async fn ready(&self) -> bool;
}
