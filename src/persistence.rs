//! Persistence is an external collaborator out of scope for this crate:
//! the core only needs a transactional change-set boundary to hand dirty
//! objects to. This module models that boundary as a trait plus the
//! transaction-queue semantics the rest of the session runtime relies on,
//! with a minimal in-memory double standing in for the real object store.

use hashbrown::HashSet;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// A transactional bundle of persistence operations.
/// `transaction_uuid = None` marks the "general" transaction that
/// [`TransactionQueue::process_all`] always processes first.
#[derive(Debug, Default, Clone)]
pub struct ChangeSet {
    pub transaction_uuid: Option<Uuid>,
    pub inserts: Vec<Uuid>,
    pub updates: Vec<Uuid>,
    pub deletes: Vec<Uuid>,
}

impl ChangeSet {
    pub fn new(transaction_uuid: Option<Uuid>) -> Self {
        Self {
            transaction_uuid,
            ..Default::default()
        }
    }

    pub fn insert(&mut self, id: Uuid) {
        self.inserts.push(id);
    }

    pub fn update(&mut self, id: Uuid) {
        self.updates.push(id);
    }

    pub fn delete(&mut self, id: Uuid) {
        self.deletes.push(id);
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("commit failed for transaction {0:?}")]
    CommitFailed(Option<Uuid>),
}

/// All-or-nothing commit of a single change set.
pub trait Persistence: Send + Sync {
    fn commit(&self, change_set: ChangeSet) -> Result<(), PersistenceError>;
}

/// Queues change sets for batch processing. A single lock protects the
/// pending map; the general (null-keyed) transaction is always drained
/// first.
#[derive(Default)]
pub struct TransactionQueue {
    pending: Mutex<Vec<ChangeSet>>,
}

impl TransactionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, change_set: ChangeSet) {
        self.pending.lock().push(change_set);
    }

    /// Drains the queue, committing the general transaction first and
    /// the rest in arbitrary order. Returns the uuids of transactions
    /// whose commit failed, for the caller's retry policy.
    pub fn process_all(&self, persistence: &dyn Persistence) -> Vec<Option<Uuid>> {
        let mut drained: Vec<ChangeSet> = self.pending.lock().drain(..).collect();
        drained.sort_by_key(|change_set| change_set.transaction_uuid.is_some());

        let mut failed = Vec::new();
        for change_set in drained {
            let id = change_set.transaction_uuid;
            if persistence.commit(change_set).is_err() {
                failed.push(id);
            }
        }
        failed
    }
}

/// In-memory test double. Production wiring plugs in the real object
/// store behind the same trait.
#[derive(Default)]
pub struct InMemoryPersistence {
    committed: Mutex<Vec<ChangeSet>>,
    fail: Mutex<HashSet<Option<Uuid>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_transaction(&self, transaction_uuid: Option<Uuid>) {
        self.fail.lock().insert(transaction_uuid);
    }

    pub fn committed(&self) -> Vec<ChangeSet> {
        self.committed.lock().clone()
    }
}

impl Persistence for InMemoryPersistence {
    fn commit(&self, change_set: ChangeSet) -> Result<(), PersistenceError> {
        if self.fail.lock().contains(&change_set.transaction_uuid) {
            return Err(PersistenceError::CommitFailed(change_set.transaction_uuid));
        }
        self.committed.lock().push(change_set);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn general_transaction_commits_before_named_ones() {
        let persistence = InMemoryPersistence::new();
        let queue = TransactionQueue::new();

        let named = Uuid::new_v4();
        queue.enqueue(ChangeSet::new(Some(named)));
        queue.enqueue(ChangeSet::new(None));

        let failed = queue.process_all(persistence.as_ref());
        assert!(failed.is_empty());

        let committed = persistence.committed();
        assert_eq!(committed[0].transaction_uuid, None);
        assert_eq!(committed[1].transaction_uuid, Some(named));
    }

    #[test]
    fn failed_commit_is_returned_for_retry() {
        let persistence = InMemoryPersistence::new();
        let doomed = Uuid::new_v4();
        persistence.fail_transaction(Some(doomed));

        let queue = TransactionQueue::new();
        queue.enqueue(ChangeSet::new(Some(doomed)));

        let failed = queue.process_all(persistence.as_ref());
        assert_eq!(failed, vec![Some(doomed)]);
        assert!(persistence.committed().is_empty());
    }
}
