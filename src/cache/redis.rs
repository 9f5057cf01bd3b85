//! Redis cache backend: plain `GET` / `SET` with no expiry.
//! Connects lazily so an unreachable Redis never blocks startup; the
//! connection manager reconnects on its own afterwards.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client};
use tokio::time::timeout;
use tracing::{info, warn};

use super::{CacheError, CacheStore};

/// Upper bound on a whole connect attempt and on each command.
const IO_TIMEOUT: Duration = Duration::from_secs(2);

pub struct RedisStore {
    client: Client,
    /// Never held across an await; callers connect concurrently and the
    /// first manager stored wins.
    conn: Mutex<Option<ConnectionManager>>,
}

impl RedisStore {
    /// Validates the URL; no connection is made until the first operation.
    pub fn new(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url)?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let cached = self.conn.lock().clone();
        if let Some(conn) = cached {
            return Ok(conn);
        }

        // No internal retries: a failed connect is a miss, the next lookup tries again.
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(0)
            .set_connection_timeout(IO_TIMEOUT)
            .set_response_timeout(IO_TIMEOUT);

        let connect = ConnectionManager::new_with_config(self.client.clone(), config);
        let conn = match timeout(IO_TIMEOUT, connect).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                warn!(error = %e, "redis connect failed");
                return Err(e.into());
            }
            Err(_) => {
                warn!("redis connect timed out");
                return Err(CacheError::Unavailable("redis connect timed out".into()));
            }
        };

        let mut slot = self.conn.lock();
        match slot.as_ref() {
            Some(existing) => Ok(existing.clone()),
            None => {
                info!("redis cache connected");
                *slot = Some(conn.clone());
                Ok(conn)
            }
        }
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = timeout(IO_TIMEOUT, conn.get(key))
            .await
            .map_err(|_| CacheError::Unavailable("redis GET timed out".into()))??;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: () = timeout(IO_TIMEOUT, conn.set(key, value))
            .await
            .map_err(|_| CacheError::Unavailable("redis SET timed out".into()))??;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
