use std::time::Duration;

use bytes::Bytes;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use tracing::{debug, info};

use crate::Error;
use crate::config::RedisConfig;
use crate::store::Store;

const GET: &str = "GET";
const SET: &str = "SET";
const INCR: &str = "INCR";
const RPUSH: &str = "RPUSH";
const LRANGE: &str = "LRANGE";
const FLUSHDB: &str = "FLUSHDB";
const PING: &str = "PING";

/// Cap on the backoff between connect attempts, in milliseconds.
const MAX_CONNECT_BACKOFF_MILLIS: u64 = 500;

/// Handle to a Redis server. Cloning is cheap, all clones multiplex over the same
/// [ConnectionManager], which reconnects on its own after a dropped connection.
#[derive(Clone)]
pub struct RedisStore {
    addr: String,
    /// `None` when the initial connection could not be established. Every command then
    /// fails with [Error::Connection].
    conn_manager: Option<ConnectionManager>,
}

impl RedisStore {
    pub async fn connect(config: &RedisConfig) -> crate::Result<Self> {
        let client = redis::Client::open(config.addr.as_str())
            .map_err(|e| Error::Connection(format!("Creating Redis client: {e:?}")))?;
        let manager_config = ConnectionManagerConfig::new()
            .set_number_of_retries(config.connect_retries)
            .set_connection_timeout(config.connect_timeout())
            .set_max_delay(MAX_CONNECT_BACKOFF_MILLIS);

        // hard deadline over all attempts, the manager's own schedule is only per attempt
        let attempts = u32::try_from(config.connect_retries.saturating_add(1)).unwrap_or(u32::MAX);
        let deadline = config
            .connect_timeout()
            .saturating_add(Duration::from_millis(MAX_CONNECT_BACKOFF_MILLIS))
            .saturating_mul(attempts);

        let conn_manager = tokio::time::timeout(
            deadline,
            client.get_connection_manager_with_config(manager_config),
        )
        .await
        .map_err(|_| {
            Error::Connection(format!(
                "Connecting to Redis server at {}: timed out after {deadline:?}",
                config.addr
            ))
        })?
        .map_err(|e| Error::Connection(format!("Connecting to Redis server: {e:?}")))?;
        info!(addr = %config.addr, "Connected to Redis");
        Ok(Self {
            addr: config.addr.clone(),
            conn_manager: Some(conn_manager),
        })
    }

    /// A store that was never connected.
    pub fn disconnected(config: &RedisConfig) -> Self {
        Self {
            addr: config.addr.clone(),
            conn_manager: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn_manager.is_some()
    }

    fn conn(&self) -> crate::Result<ConnectionManager> {
        self.conn_manager
            .clone()
            .ok_or_else(|| Error::Connection(format!("Not connected to Redis at {}", self.addr)))
    }
}

impl Store for RedisStore {
    async fn get(&self, key: &str) -> crate::Result<Option<Bytes>> {
        let mut conn = self.conn()?;
        let value: Option<Vec<u8>> = redis::cmd(GET).arg(key).query_async(&mut conn).await?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes) -> crate::Result<()> {
        let mut conn = self.conn()?;
        redis::cmd(SET)
            .arg(key)
            .arg(value.as_ref())
            .exec_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn incr(&self, key: &str) -> crate::Result<i64> {
        let mut conn = self.conn()?;
        let value: i64 = redis::cmd(INCR).arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn rpush(&self, key: &str, value: Bytes) -> crate::Result<usize> {
        let mut conn = self.conn()?;
        let len: usize = redis::cmd(RPUSH)
            .arg(key)
            .arg(value.as_ref())
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> crate::Result<Vec<Bytes>> {
        let mut conn = self.conn()?;
        let values: Vec<Vec<u8>> = redis::cmd(LRANGE)
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async(&mut conn)
            .await?;
        Ok(values.into_iter().map(Bytes::from).collect())
    }

    async fn flush_db(&self, asynchronous: bool) -> crate::Result<()> {
        let mut conn = self.conn()?;
        let mut cmd = redis::cmd(FLUSHDB);
        if asynchronous {
            cmd.arg("ASYNC");
        }
        cmd.exec_async(&mut conn).await?;
        debug!(addr = %self.addr, asynchronous, "Flushed Redis database");
        Ok(())
    }

    async fn ready(&self) -> bool {
        let Ok(mut conn) = self.conn() else {
            return false;
        };
        match redis::cmd(PING).query_async::<String>(&mut conn).await {
            Ok(response) => response == "PONG",
            Err(_) => false,
        }
    }
}
