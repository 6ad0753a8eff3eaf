use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use rdf_bedrock_common::{BedrockConfig, StorageError, StorageResult};
use std::str::FromStr;
use tokio_postgres::NoTls;

/// The two connection pools of the engine.
///
/// Write and bulk paths run on `write`; streaming pattern reads run on
/// `read`, so that a long cursor cannot starve CRUD traffic. Acquisitions are
/// scoped: dropping the pool object returns the connection on every exit
/// path, including panics and early returns.
pub(crate) struct DbPools {
    write: Pool,
    read: Pool,
}

impl DbPools {
    pub fn new(config: &BedrockConfig) -> StorageResult<Self> {
        let pg_config = tokio_postgres::Config::from_str(&config.connection_string)?;
        let build = |max_size: usize| {
            let manager = Manager::from_config(
                pg_config.clone(),
                NoTls,
                ManagerConfig {
                    recycling_method: RecyclingMethod::Fast,
                },
            );
            Pool::builder(manager)
                .max_size(max_size)
                .build()
                .map_err(StorageError::other)
        };
        Ok(Self {
            write: build(config.write_pool.max_size)?,
            read: build(config.read_pool.max_size)?,
        })
    }

    /// Acquires a connection for a write or bulk operation.
    pub async fn write(&self) -> StorageResult<Object> {
        Ok(self.write.get().await?)
    }

    /// Acquires a connection for a streaming read.
    pub async fn read(&self) -> StorageResult<Object> {
        Ok(self.read.get().await?)
    }

    /// Opens `write_n`/`read_n` connections and pings each, so the first real
    /// query does not pay connect latency.
    pub async fn warmup(&self, write_n: usize, read_n: usize) -> StorageResult<()> {
        for (pool, n) in [(&self.write, write_n), (&self.read, read_n)] {
            let mut held = Vec::with_capacity(n);
            for _ in 0..n.min(pool.status().max_size) {
                let conn = pool.get().await?;
                conn.simple_query("SELECT 1").await?;
                held.push(conn);
            }
            drop(held);
        }
        tracing::debug!(write = write_n, read = read_n, "connection pools warmed up");
        Ok(())
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            write: PoolUsage::from_status(self.write.status()),
            read: PoolUsage::from_status(self.read.status()),
        }
    }

    /// Closes both pools; outstanding objects are dropped on return.
    pub fn close(&self) {
        self.write.close();
        self.read.close();
    }
}

/// Usage snapshot of a single pool.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PoolUsage {
    pub max_size: usize,
    pub open: usize,
    pub available: usize,
    pub waiting: usize,
}

impl PoolUsage {
    fn from_status(status: deadpool_postgres::Status) -> Self {
        Self {
            max_size: status.max_size,
            open: status.size,
            available: status.available,
            waiting: status.waiting,
        }
    }

    pub fn in_use(&self) -> usize {
        self.open.saturating_sub(self.available)
    }
}

/// Usage snapshot of both engine pools.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PoolStats {
    pub write: PoolUsage,
    pub read: PoolUsage,
}
