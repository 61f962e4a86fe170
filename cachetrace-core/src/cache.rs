use bytes::Bytes;
use tracing::{debug, error};
use uuid::Uuid;

use crate::config::Settings;
use crate::instrument::{CallHistory, CountCalls, Layer, Operation, Stack, invoke};
use crate::report::run_and_report;
use crate::store::Store;
use crate::store::redis_store::RedisStore;
use crate::value::{Value, render_args};
use crate::{Error, Result};

/// Name under which [Cache::store] is counted and recorded.
pub const STORE_OPERATION: &str = "Cache.store";

/// Layers around [Cache::store]: history outside, counting inside.
pub type DefaultLayers = Stack<CallHistory, CountCalls>;

/// Stores scalars under generated keys and reads them back. Every store interaction is
/// best-effort: failures are logged, reads degrade to `None`, and nothing is propagated
/// to the caller.
pub struct Cache<S, L = DefaultLayers> {
    store: S,
    layers: L,
    store_op: Operation,
}

impl Cache<RedisStore> {
    /// Connects to Redis and flushes the selected database. A failed connection is reported
    /// and leaves the cache in a degraded state where every store call fails and is reported.
    pub async fn connect(settings: &Settings) -> Self {
        let store = match RedisStore::connect(&settings.redis).await {
            Ok(store) => store,
            Err(e) => {
                error!(error = %e, addr = %settings.redis.addr, "Redis connection error");
                RedisStore::disconnected(&settings.redis)
            }
        };
        Self::with_layers(store, DefaultLayers::default(), settings.redis.flush_async).await
    }
}

impl<S: Store> Cache<S> {
    /// Wraps `store` and flushes it so the cache starts from an empty state.
    pub async fn new(store: S) -> Self {
        Self::with_layers(store, DefaultLayers::default(), true).await
    }
}

impl<S, L> Cache<S, L>
where
    S: Store,
    L: Layer<S>,
{
    pub async fn with_layers(store: S, layers: L, flush_async: bool) -> Self {
        if run_and_report("flushing store", store.flush_db(flush_async))
            .await
            .is_some()
        {
            debug!("Store flushed");
        }
        Self {
            store,
            layers,
            store_op: Operation::new(STORE_OPERATION),
        }
    }

    /// Writes `value` under a fresh random key and returns the key. The key is returned even
    /// if the write failed.
    pub async fn store(&self, value: impl Into<Value>) -> String {
        let value = value.into();
        let args = render_args(std::slice::from_ref(&value));
        let store = &self.store;
        let data = value.to_bytes();
        invoke(&self.layers, store, &self.store_op, &args, || async move {
            let key = Uuid::new_v4().to_string();
            run_and_report("storing data", store.set(&key, data)).await;
            key
        })
        .await
    }

    /// Raw bytes stored under `key`. A failed read is reported and treated as absent.
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        run_and_report("getting data", self.store.get(key))
            .await
            .flatten()
    }

    /// Reads `key` and applies `transform` to the raw bytes. A transform that fails is
    /// reported and yields `None`.
    pub async fn get_with<T, F>(&self, key: &str, transform: F) -> Option<T>
    where
        F: FnOnce(Bytes) -> Result<T>,
    {
        let raw = self.get(key).await?;
        match transform(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                error!(error = %e, key, "Transforming stored value");
                None
            }
        }
    }

    pub async fn get_str(&self, key: &str) -> Option<String> {
        self.get_with(key, |raw| {
            String::from_utf8(raw.to_vec()).map_err(|e| Error::Decode(e.to_string()))
        })
        .await
    }

    pub async fn get_int(&self, key: &str) -> Option<i64> {
        self.get_with(key, |raw| {
            std::str::from_utf8(&raw)
                .map_err(|e| Error::Decode(e.to_string()))?
                .trim()
                .parse::<i64>()
                .map_err(|e| Error::Decode(format!("parsing integer: {e}")))
        })
        .await
    }

    /// Resolves `name` to one of this cache's instrumented operations.
    pub fn operation(&self, name: &str) -> Option<&Operation> {
        (self.store_op.name() == name).then_some(&self.store_op)
    }

    /// The underlying store handle.
    pub fn adapter(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::flaky_store::{Command, FlakyStore};
    use crate::store::in_memory_store::InMemoryStore;

    #[tokio::test]
    async fn test_store_and_get_roundtrip() {
        let cache = Cache::new(InMemoryStore::new()).await;

        let key = cache.store("hello").await;
        assert_eq!(cache.get_str(&key).await.as_deref(), Some("hello"));
        assert_eq!(cache.get(&key).await, Some(Bytes::from("hello")));
        assert_eq!(cache.get(&format!("{key}x")).await, None);

        let key = cache.store(123).await;
        assert_eq!(cache.get_int(&key).await, Some(123));

        let key = cache.store(b"bytes".as_slice()).await;
        assert_eq!(cache.get(&key).await, Some(Bytes::from("bytes")));

        let key = cache.store(2.5).await;
        assert_eq!(cache.get_str(&key).await.as_deref(), Some("2.5"));
    }

    #[tokio::test]
    async fn test_keys_are_unique_uuids() {
        let cache = Cache::new(InMemoryStore::new()).await;
        let a = cache.store("same").await;
        let b = cache.store("same").await;
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[tokio::test]
    async fn test_absent_keys() {
        let cache = Cache::new(InMemoryStore::new()).await;
        assert_eq!(cache.get("nope").await, None);
        assert_eq!(cache.get_str("nope").await, None);
        assert_eq!(cache.get_int("nope").await, None);
    }

    #[tokio::test]
    async fn test_get_with_transform() {
        let cache = Cache::new(InMemoryStore::new()).await;
        let key = cache.store("abc").await;
        let len = cache.get_with(&key, |raw| Ok(raw.len())).await;
        assert_eq!(len, Some(3));
    }

    #[tokio::test]
    async fn test_failed_transforms_yield_none() {
        let cache = Cache::new(InMemoryStore::new()).await;
        let key = cache.store("not a number").await;
        assert_eq!(cache.get_int(&key).await, None);

        let key = cache.store(vec![0xff_u8, 0xfe]).await;
        assert_eq!(cache.get_str(&key).await, None);
        assert!(cache.get(&key).await.is_some());
    }

    #[tokio::test]
    async fn test_store_is_counted_and_recorded() {
        let cache = Cache::new(InMemoryStore::new()).await;
        let values = ["first", "second", "third"];
        let mut keys = Vec::new();
        for v in values {
            keys.push(cache.store(v).await);
        }

        let store = cache.adapter();
        assert_eq!(
            store.get(STORE_OPERATION).await.unwrap(),
            Some(Bytes::from("3"))
        );

        let inputs = store
            .lrange("Cache.store:inputs", 0, -1)
            .await
            .unwrap();
        assert_eq!(
            inputs,
            vec![
                Bytes::from("('first',)"),
                Bytes::from("('second',)"),
                Bytes::from("('third',)")
            ]
        );

        let outputs = store
            .lrange("Cache.store:outputs", 0, -1)
            .await
            .unwrap();
        let expected: Vec<Bytes> = keys.into_iter().map(Bytes::from).collect();
        assert_eq!(outputs, expected);
    }

    #[tokio::test]
    async fn test_get_is_not_instrumented() {
        let cache = Cache::new(InMemoryStore::new()).await;
        let key = cache.store(1).await;
        cache.get(&key).await;
        cache.get_str(&key).await;
        cache.get_int(&key).await;
        assert_eq!(
            cache.adapter().get(STORE_OPERATION).await.unwrap(),
            Some(Bytes::from("1"))
        );
    }

    #[tokio::test]
    async fn test_construction_clears_prior_state() {
        let store = InMemoryStore::new();
        let first = Cache::new(store.clone()).await;
        first.store("old").await;
        assert!(!store.is_empty());

        let second = Cache::new(store.clone()).await;
        assert!(store.is_empty());
        assert_eq!(second.adapter().get(STORE_OPERATION).await.unwrap(), None);
        assert!(
            second
                .adapter()
                .lrange("Cache.store:inputs", 0, -1)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_failed_set_still_returns_key() {
        let cache = Cache::new(FlakyStore::failing(&[Command::Set])).await;
        let key = cache.store("lost").await;
        assert!(Uuid::parse_str(&key).is_ok());

        cache.adapter().heal();
        assert_eq!(cache.get(&key).await, None);
        // instrumentation still went through
        assert_eq!(
            cache.adapter().get(STORE_OPERATION).await.unwrap(),
            Some(Bytes::from("1"))
        );
    }

    #[tokio::test]
    async fn test_failed_read_is_absent() {
        let cache = Cache::new(FlakyStore::failing(&[Command::Get])).await;
        let key = cache.store("value").await;
        assert_eq!(cache.get(&key).await, None);
        assert_eq!(cache.get_str(&key).await, None);
        assert_eq!(cache.get_int(&key).await, None);

        cache.adapter().heal();
        assert_eq!(cache.get_str(&key).await.as_deref(), Some("value"));
    }

    #[tokio::test]
    async fn test_failed_flush_does_not_abort_construction() {
        let cache = Cache::new(FlakyStore::failing(&[Command::FlushDb])).await;
        let key = cache.store(5).await;
        assert_eq!(cache.get_int(&key).await, Some(5));
    }

    #[tokio::test]
    async fn test_unreachable_redis_degrades() {
        let settings = Settings {
            redis: crate::config::RedisConfig {
                addr: "no_such_redis://127.0.0.1:6379".to_owned(),
                ..Default::default()
            },
        };
        let cache = Cache::connect(&settings).await;
        assert!(!cache.adapter().is_connected());

        let key = cache.store("hello").await;
        assert!(Uuid::parse_str(&key).is_ok());
        assert_eq!(cache.get(&key).await, None);
        assert_eq!(cache.get_str(&key).await, None);
    }

    #[tokio::test]
    async fn test_closed_redis_port_degrades_quickly() {
        let settings = Settings {
            redis: crate::config::RedisConfig {
                addr: "redis://127.0.0.1:1".to_owned(),
                connect_retries: 1,
                connect_timeout_millis: 200,
                ..Default::default()
            },
        };
        let cache = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            Cache::connect(&settings),
        )
        .await
        .expect("construction should give up on a closed port");
        assert!(!cache.adapter().is_connected());

        let key = cache.store(1).await;
        assert_eq!(cache.get_int(&key).await, None);
    }

    #[tokio::test]
    async fn test_construction_flush_mode() {
        let store = FlakyStore::default();
        Cache::new(store.clone()).await;
        Cache::with_layers(store.clone(), DefaultLayers::default(), false).await;
        assert_eq!(store.flushes(), vec![true, false]);
    }

    #[tokio::test]
    async fn test_operation_lookup() {
        let cache = Cache::new(InMemoryStore::new()).await;
        assert_eq!(
            cache.operation("Cache.store").map(Operation::name),
            Some("Cache.store")
        );
        assert!(cache.operation("Cache.get").is_none());
    }
}
