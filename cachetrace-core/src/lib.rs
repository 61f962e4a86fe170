//! Cache facade over a key-value store that counts and records the calls made to its
//! instrumented operations, and replays the recorded history.
//!
//! ```no_run
//! # async fn demo() {
//! use cachetrace_core::{Cache, Settings, replay};
//!
//! let cache = Cache::connect(&Settings::default()).await;
//! let key = cache.store("hello").await;
//! assert_eq!(cache.get_str(&key).await.as_deref(), Some("hello"));
//! replay(&cache, "Cache.store").await;
//! # }
//! ```

pub use self::error::{Error, Result};

mod error;
mod report;

pub mod cache;
pub use cache::{Cache, DefaultLayers, STORE_OPERATION};

pub mod config;
pub use config::{RedisConfig, Settings};

/// Wrappers that count and record calls around store-backed operations.
pub mod instrument;
pub use instrument::{CallHistory, CountCalls, Layer, Operation, Stack};

pub mod replay;
pub use replay::{Trace, replay, replay_to};

/// Store adapters: the [store::Store] trait with Redis and in-memory implementations.
pub mod store;
pub use store::Store;
pub use store::in_memory_store::InMemoryStore;
pub use store::redis_store::RedisStore;

pub mod value;
pub use value::Value;
