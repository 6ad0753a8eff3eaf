use crate::datatypes::DatatypeCache;
use crate::graphs::GraphCache;
use crate::pool::{DbPools, PoolStats};
use crate::transaction::{SpaceTransaction, TransactionInner};
use dashmap::DashMap;
use deadpool_postgres::Object;
use rdf_bedrock_common::{
    BedrockConfig, NoopSignalSink, SignalSink, SpaceTables, StorageResult,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Handle to a running storage engine.
///
/// The engine owns everything the components share: the configuration, the
/// two connection pools, the per-space datatype and graph caches, the signal
/// sink and the registry of active transactions. Handles are cheap to clone.
#[derive(Clone)]
pub struct BedrockEngine {
    pub(crate) inner: Arc<EngineInner>,
}

pub(crate) struct EngineInner {
    pub config: BedrockConfig,
    pub pools: DbPools,
    pub datatype_caches: DashMap<String, Arc<Mutex<DatatypeCache>>>,
    pub graph_caches: DashMap<String, Arc<GraphCache>>,
    pub transactions: DashMap<Uuid, Arc<TransactionInner>>,
    pub signals: Arc<dyn SignalSink>,
}

impl BedrockEngine {
    /// Creates an engine for `config` with no signal transport wired.
    ///
    /// Pool connections are opened lazily; call [BedrockEngine::warmup] to
    /// pre-open them.
    pub fn connect(config: BedrockConfig) -> StorageResult<Self> {
        Self::connect_with_signals(config, Arc::new(NoopSignalSink))
    }

    /// Creates an engine publishing lifecycle signals into `signals`.
    pub fn connect_with_signals(
        config: BedrockConfig,
        signals: Arc<dyn SignalSink>,
    ) -> StorageResult<Self> {
        rdf_bedrock_common::validate_global_prefix(&config.global_prefix)?;
        let pools = DbPools::new(&config)?;
        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                pools,
                datatype_caches: DashMap::new(),
                graph_caches: DashMap::new(),
                transactions: DashMap::new(),
                signals,
            }),
        })
    }

    pub fn config(&self) -> &BedrockConfig {
        &self.inner.config
    }

    /// The validated table set for `space_id`.
    pub fn tables_for(&self, space_id: &str) -> StorageResult<SpaceTables> {
        SpaceTables::new(
            self.inner.config.global_prefix.clone(),
            space_id,
            self.inner.config.unlogged_tables,
        )
    }

    /// Pre-opens and pings the configured number of connections per pool.
    pub async fn warmup(&self) -> StorageResult<()> {
        self.inner
            .pools
            .warmup(
                self.inner.config.write_pool.warmup,
                self.inner.config.read_pool.warmup,
            )
            .await
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.inner.pools.stats()
    }

    /// Rolls back every still-active transaction and closes the pools.
    pub async fn shutdown(&self) {
        let active: Vec<Arc<TransactionInner>> = self
            .inner
            .transactions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for tx in active {
            if let Err(error) = tx.rollback().await {
                tracing::warn!(tx_id = %tx.id(), %error, "rollback on shutdown failed");
            }
            self.inner.transactions.remove(&tx.id());
        }
        self.inner.pools.close();
    }

    /// Opens a transaction on a write-pool connection and registers it.
    pub async fn begin_transaction(&self) -> StorageResult<SpaceTransaction> {
        let conn = self.write_conn().await?;
        let tx = SpaceTransaction::begin(self.clone(), conn).await?;
        self.inner
            .transactions
            .insert(tx.id(), Arc::clone(tx.inner()));
        Ok(tx)
    }

    pub(crate) fn deregister_transaction(&self, id: Uuid) {
        self.inner.transactions.remove(&id);
    }

    pub(crate) async fn write_conn(&self) -> StorageResult<Object> {
        self.inner.pools.write().await
    }

    pub(crate) async fn read_conn(&self) -> StorageResult<Object> {
        self.inner.pools.read().await
    }

    pub(crate) fn signals(&self) -> &dyn SignalSink {
        self.inner.signals.as_ref()
    }

    pub(crate) fn datatype_cache(&self, space_id: &str) -> Arc<Mutex<DatatypeCache>> {
        Arc::clone(
            &self
                .inner
                .datatype_caches
                .entry(space_id.to_owned())
                .or_insert_with(|| {
                    Arc::new(Mutex::new(DatatypeCache::new(
                        self.inner.config.datatype_cache_capacity,
                    )))
                }),
        )
    }

    pub(crate) fn graph_cache(&self, space_id: &str) -> Arc<GraphCache> {
        Arc::clone(
            &self
                .inner
                .graph_caches
                .entry(space_id.to_owned())
                .or_insert_with(|| Arc::new(GraphCache::new())),
        )
    }

    /// Drops the per-space caches, e.g. after the space's tables were deleted.
    pub(crate) fn evict_space_caches(&self, space_id: &str) {
        self.inner.datatype_caches.remove(space_id);
        self.inner.graph_caches.remove(space_id);
    }
}
