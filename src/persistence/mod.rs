//! Persistence port (spec §6.2) and a reference in-memory implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use tracing::{debug, warn};

use crate::types::{OrderId, OrderNo, PersistenceError, SagaContext};

/// The durability boundary the engine drives through. A production
/// implementation backs this with a real database; this crate only
/// specifies the contract (spec §6.2) plus a reference in-memory backend
/// for running and testing the engine standalone.
#[async_trait]
pub trait PersistencePort: Send + Sync {
    /// Insert a brand-new saga row. Fails if `order_id` or `order_no`
    /// already exist.
    async fn create(&self, ctx: &SagaContext) -> Result<(), PersistenceError>;

    async fn get(&self, order_id: OrderId) -> Result<Option<SagaContext>, PersistenceError>;

    async fn get_by_order_no(&self, order_no: &OrderNo) -> Result<Option<SagaContext>, PersistenceError>;

    /// Optimistic-locked write: succeeds only if the stored `updated_at`
    /// still matches what `ctx` was loaded with. On success, stamps `ctx`
    /// with the newly committed `updated_at`. On a lost race, returns
    /// `Ok(false)` and leaves `ctx` untouched (spec §5).
    async fn update_status(&self, ctx: &mut SagaContext) -> Result<bool, PersistenceError>;

    /// Per-saga mutual exclusion, not distributed consensus (spec §5,
    /// Non-goals). Returns `false` if already held.
    async fn try_lock(&self, order_id: OrderId) -> Result<bool, PersistenceError>;

    async fn release_lock(&self, order_id: OrderId) -> Result<(), PersistenceError>;

    /// Sagas whose `updated_at` is older than `older_than` and which are
    /// still non-terminal — candidates for the recovery sweep.
    async fn find_stuck_sagas(
        &self,
        older_than: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SagaContext>, PersistenceError>;
}

/// DashMap-backed reference implementation, modeled on the teacher's
/// scheduler/resource-manager shared state. Not a production backend: no
/// write-ahead log, no cross-process visibility.
#[derive(Default)]
pub struct InMemoryPersistence {
    by_id: DashMap<OrderId, SagaContext>,
    order_no_index: DashMap<OrderNo, OrderId>,
    locks: DashSet<OrderId>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistencePort for InMemoryPersistence {
    async fn create(&self, ctx: &SagaContext) -> Result<(), PersistenceError> {
        if self.by_id.contains_key(&ctx.order_id) {
            return Err(PersistenceError::DuplicateOrderId(ctx.order_id));
        }
        if self.order_no_index.contains_key(&ctx.order_no) {
            return Err(PersistenceError::DuplicateOrderNo(ctx.order_no.clone()));
        }
        self.order_no_index.insert(ctx.order_no.clone(), ctx.order_id);
        self.by_id.insert(ctx.order_id, ctx.clone());
        debug!(order_id = %ctx.order_id, "saga created");
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<SagaContext>, PersistenceError> {
        Ok(self.by_id.get(&order_id).map(|e| e.value().clone()))
    }

    async fn get_by_order_no(&self, order_no: &OrderNo) -> Result<Option<SagaContext>, PersistenceError> {
        let Some(order_id) = self.order_no_index.get(order_no).map(|e| *e.value()) else {
            return Ok(None);
        };
        self.get(order_id).await
    }

    async fn update_status(&self, ctx: &mut SagaContext) -> Result<bool, PersistenceError> {
        let mut entry = self
            .by_id
            .get_mut(&ctx.order_id)
            .ok_or(PersistenceError::NotFound(ctx.order_id))?;

        if entry.updated_at != ctx.updated_at {
            warn!(order_id = %ctx.order_id, "optimistic lock conflict on update_status");
            return Ok(false);
        }

        ctx.updated_at = Utc::now();
        *entry.value_mut() = ctx.clone();
        Ok(true)
    }

    async fn try_lock(&self, order_id: OrderId) -> Result<bool, PersistenceError> {
        Ok(self.locks.insert(order_id))
    }

    async fn release_lock(&self, order_id: OrderId) -> Result<(), PersistenceError> {
        self.locks.remove(&order_id);
        Ok(())
    }

    async fn find_stuck_sagas(
        &self,
        older_than: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SagaContext>, PersistenceError> {
        let mut stuck: Vec<SagaContext> = self
            .by_id
            .iter()
            .map(|e| e.value().clone())
            .filter(|ctx| !ctx.is_terminal() && ctx.updated_at < older_than)
            .collect();
        stuck.sort_by_key(|ctx| ctx.updated_at);
        stuck.truncate(limit);
        Ok(stuck)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CustomerId, SagaStatus};
    use chrono::Duration;

    fn ctx(order_no: &str) -> SagaContext {
        SagaContext::new(
            OrderId::new(),
            OrderNo::from(order_no),
            CustomerId::from("cust-1"),
            vec![],
            Duration::minutes(30),
        )
    }

    #[tokio::test]
    async fn create_rejects_duplicate_order_no() {
        let store = InMemoryPersistence::new();
        let a = ctx("ORD-1");
        let mut b = ctx("ORD-1");
        b.order_id = OrderId::new();
        store.create(&a).await.unwrap();
        let err = store.create(&b).await.unwrap_err();
        assert!(matches!(err, PersistenceError::DuplicateOrderNo(_)));
    }

    #[tokio::test]
    async fn update_status_fails_on_stale_witness() {
        let store = InMemoryPersistence::new();
        let mut a = ctx("ORD-2");
        store.create(&a).await.unwrap();

        let mut stale = store.get(a.order_id).await.unwrap().unwrap();
        a.status = SagaStatus::Processing;
        assert!(store.update_status(&mut a).await.unwrap());

        stale.status = SagaStatus::Failed;
        assert!(!store.update_status(&mut stale).await.unwrap());
    }

    #[tokio::test]
    async fn try_lock_is_exclusive() {
        let store = InMemoryPersistence::new();
        let order_id = OrderId::new();
        assert!(store.try_lock(order_id).await.unwrap());
        assert!(!store.try_lock(order_id).await.unwrap());
        store.release_lock(order_id).await.unwrap();
        assert!(store.try_lock(order_id).await.unwrap());
    }

    #[tokio::test]
    async fn find_stuck_sagas_excludes_terminal_and_fresh() {
        let store = InMemoryPersistence::new();
        let mut stuck = ctx("ORD-3");
        stuck.status = SagaStatus::Processing;
        stuck.updated_at = Utc::now() - Duration::hours(1);
        store.create(&stuck).await.unwrap();

        let mut fresh = ctx("ORD-4");
        fresh.status = SagaStatus::Processing;
        store.create(&fresh).await.unwrap();

        let found = store.find_stuck_sagas(Utc::now() - Duration::minutes(5), 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].order_no.0, "ORD-3");
    }
}
