use crate::engine::BedrockEngine;
use deadpool_postgres::Object;
use rdf_bedrock_common::{StorageError, StorageResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Counter snapshot of one transaction.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct TransactionStats {
    pub quads_added: u64,
    pub quads_updated: u64,
    pub quads_removed: u64,
    pub terms_added: u64,
}

pub(crate) struct TransactionInner {
    id: Uuid,
    conn: Mutex<Option<Object>>,
    quads_added: AtomicU64,
    quads_updated: AtomicU64,
    quads_removed: AtomicU64,
    terms_added: AtomicU64,
}

impl TransactionInner {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Ends the transaction with `COMMIT` or `ROLLBACK` and releases the
    /// connection back to its pool.
    async fn finish(&self, statement: &str) -> StorageResult<()> {
        let mut guard = self.conn.lock().await;
        let conn = guard.take().ok_or_else(|| {
            StorageError::Transaction(format!(
                "transaction {} already committed or rolled back",
                self.id
            ))
        })?;
        let result = conn.batch_execute(statement).await;
        // The pool object drops here on both paths; a failed COMMIT leaves
        // the backend to abort the transaction when the connection recycles.
        result.map_err(StorageError::Backend)
    }

    pub async fn rollback(&self) -> StorageResult<()> {
        self.finish("ROLLBACK").await
    }
}

/// A write transaction owning one pooled connection end-to-end.
///
/// Batch operations accept a reference to a transaction and run on its
/// connection; counters accumulate across them. Committing or rolling back
/// returns the connection to the pool and deregisters the transaction from
/// the engine. A transaction dropped without either is rolled back in the
/// background, and engine shutdown rolls back all stragglers.
///
/// Concurrent use of one transaction from several tasks is not serialized by
/// the engine; the owning caller drives operations one at a time.
pub struct SpaceTransaction {
    engine: BedrockEngine,
    inner: Arc<TransactionInner>,
}

impl SpaceTransaction {
    pub(crate) async fn begin(engine: BedrockEngine, conn: Object) -> StorageResult<Self> {
        conn.batch_execute("BEGIN").await?;
        let inner = Arc::new(TransactionInner {
            id: Uuid::new_v4(),
            conn: Mutex::new(Some(conn)),
            quads_added: AtomicU64::new(0),
            quads_updated: AtomicU64::new(0),
            quads_removed: AtomicU64::new(0),
            terms_added: AtomicU64::new(0),
        });
        Ok(Self { engine, inner })
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn stats(&self) -> TransactionStats {
        TransactionStats {
            quads_added: self.inner.quads_added.load(Ordering::Relaxed),
            quads_updated: self.inner.quads_updated.load(Ordering::Relaxed),
            quads_removed: self.inner.quads_removed.load(Ordering::Relaxed),
            terms_added: self.inner.terms_added.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn inner(&self) -> &Arc<TransactionInner> {
        &self.inner
    }

    /// Locks the owned connection for a batch writer. The guard holds `None`
    /// once the transaction has ended.
    pub(crate) async fn connection(&self) -> MutexGuard<'_, Option<Object>> {
        self.inner.conn.lock().await
    }

    pub(crate) fn record_quads_added(&self, count: u64) {
        self.inner.quads_added.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_quads_removed(&self, count: u64) {
        self.inner.quads_removed.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_quads_updated(&self, count: u64) {
        self.inner.quads_updated.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_terms_added(&self, count: u64) {
        self.inner.terms_added.fetch_add(count, Ordering::Relaxed);
    }

    /// Commits and returns the connection to the pool.
    pub async fn commit(self) -> StorageResult<TransactionStats> {
        let stats = self.stats();
        let result = self.inner.finish("COMMIT").await;
        self.engine.deregister_transaction(self.inner.id);
        result?;
        tracing::debug!(tx_id = %self.inner.id, ?stats, "transaction committed");
        Ok(stats)
    }

    /// Rolls back and returns the connection to the pool.
    pub async fn rollback(self) -> StorageResult<()> {
        let result = self.inner.rollback().await;
        self.engine.deregister_transaction(self.inner.id);
        tracing::debug!(tx_id = %self.inner.id, "transaction rolled back");
        result
    }
}

impl Drop for SpaceTransaction {
    fn drop(&mut self) {
        // Commit/rollback consumed the connection already in the normal case.
        let finished = self
            .inner
            .conn
            .try_lock()
            .map(|guard| guard.is_none())
            .unwrap_or(false);
        if finished {
            return;
        }
        // An abandoned transaction is rolled back from a background task so
        // the pooled connection never returns with a transaction open.
        let inner = Arc::clone(&self.inner);
        let engine = self.engine.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let still_open = inner.conn.lock().await.is_some();
                if still_open {
                    tracing::warn!(tx_id = %inner.id(), "transaction dropped without commit; rolling back");
                    if let Err(error) = inner.rollback().await {
                        tracing::warn!(tx_id = %inner.id(), %error, "rollback of dropped transaction failed");
                    }
                }
                engine.deregister_transaction(inner.id());
            });
        }
    }
}
