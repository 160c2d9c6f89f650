//! In-memory repository backend for tests and demos.
//!
//! # Responsibility
//! - Mirror the repository contract over shared in-memory collections.
//! - Emulate connection-level transactions with an injected context.
//!
//! # Invariants
//! - All repositories built from one `MemoryTransaction` share one
//!   transaction state; a test scope creates its own context.
//! - A collection is snapshotted at its first mutation inside a transaction;
//!   only the owner's rollback restores snapshots.
//! - Identities on create are `len + index + 1` from the collection size
//!   before the batch.
//! - Writes validate and check the whole batch before mutating anything.

use super::{validate_all, RepoError, RepoResult, Repository};
use crate::model::entity::{Entity, EntityId};
use crate::query::include::resolve_includes;
use crate::query::predicate::Predicate;
use crate::query::QueryParams;
use log::debug;
use std::cell::{Cell, RefCell};
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// Counters of transaction actions taken on one context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionStats {
    pub begun: u32,
    pub committed: u32,
    pub rolled_back: u32,
}

type Restore = Box<dyn FnOnce()>;

#[derive(Default)]
struct TransactionState {
    active: Cell<bool>,
    /// Undo actions keyed by collection address, in enlistment order.
    journal: RefCell<Vec<(usize, Restore)>>,
    stats: Cell<TransactionStats>,
}

/// Shared transaction context standing in for a database connection.
///
/// Cloning yields another handle to the same context.
#[derive(Clone, Default)]
pub struct MemoryTransaction {
    state: Rc<TransactionState>,
}

impl MemoryTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.state.active.get()
    }

    pub fn stats(&self) -> TransactionStats {
        self.state.stats.get()
    }

    fn begin(&self) {
        self.state.active.set(true);
        self.bump(|stats| stats.begun += 1);
    }

    fn commit(&self) {
        self.state.active.set(false);
        self.state.journal.borrow_mut().clear();
        self.bump(|stats| stats.committed += 1);
    }

    fn rollback(&self) {
        self.state.active.set(false);
        let journal = std::mem::take(&mut *self.state.journal.borrow_mut());
        for (_, restore) in journal.into_iter().rev() {
            restore();
        }
        self.bump(|stats| stats.rolled_back += 1);
    }

    /// Snapshots `data` once per transaction so rollback can restore it.
    fn enlist<T: Clone + 'static>(&self, data: &Rc<RefCell<Vec<T>>>) {
        if !self.is_active() {
            return;
        }
        let key = Rc::as_ptr(data) as *const () as usize;
        let mut journal = self.state.journal.borrow_mut();
        if journal.iter().any(|(enlisted, _)| *enlisted == key) {
            return;
        }
        let snapshot = data.borrow().clone();
        let target = Rc::clone(data);
        journal.push((key, Box::new(move || *target.borrow_mut() = snapshot)));
    }

    fn bump(&self, update: impl FnOnce(&mut TransactionStats)) {
        let mut stats = self.state.stats.get();
        update(&mut stats);
        self.state.stats.set(stats);
    }
}

impl Debug for MemoryTransaction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransaction")
            .field("active", &self.is_active())
            .field("enlisted", &self.state.journal.borrow().len())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Repository over a shared `Vec<T>`.
///
/// Includes are resolved for diagnostics only: stored values already carry
/// whatever navigations the caller put in them.
///
/// Identities come from the collection size, so creating after a delete can
/// reuse an identity still held by a surviving row. Tests that delete and then
/// create should not rely on identities being unique.
///
/// Dropping the repository that owns the context's transaction rolls it back.
pub struct MemoryRepository<T> {
    data: Rc<RefCell<Vec<T>>>,
    tx: MemoryTransaction,
    is_owner: bool,
}

impl<T: Entity> MemoryRepository<T> {
    pub fn new(tx: &MemoryTransaction) -> Self {
        Self::with_data(tx, Vec::new())
    }

    /// Seeds the collection as-is; identities are not reassigned.
    pub fn with_data(tx: &MemoryTransaction, items: Vec<T>) -> Self {
        Self::shared(tx, Rc::new(RefCell::new(items)))
    }

    /// Wraps a collection the caller keeps a handle to.
    pub fn shared(tx: &MemoryTransaction, data: Rc<RefCell<Vec<T>>>) -> Self {
        Self {
            data,
            tx: tx.clone(),
            is_owner: false,
        }
    }

    pub fn data(&self) -> Rc<RefCell<Vec<T>>> {
        Rc::clone(&self.data)
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.data.borrow().clone()
    }

    pub fn transaction(&self) -> &MemoryTransaction {
        &self.tx
    }

    fn ensure_known_ids(&self, models: &[T]) -> RepoResult<()> {
        let data = self.data.borrow();
        for model in models {
            let id: EntityId = model.id();
            if !data.iter().any(|item| item.id() == id) {
                return Err(RepoError::DataIntegrity {
                    entity: T::NAME,
                    id,
                });
            }
        }
        Ok(())
    }
}

impl<T: Entity> Repository<T> for MemoryRepository<T> {
    fn query(&self, params: &QueryParams<T>) -> RepoResult<Vec<T>> {
        let paths = resolve_includes(T::NAME, params.include_list());
        if !paths.is_empty() {
            debug!(
                "event=include_resolved module=repo status=ok backend=memory entity={} paths={}",
                T::NAME,
                paths.len()
            );
        }
        Ok(params.apply(self.snapshot()))
    }

    fn create_many_no_transaction(&mut self, models: Vec<T>) -> RepoResult<Vec<T>> {
        validate_all(&models)?;
        self.tx.enlist(&self.data);

        let mut data = self.data.borrow_mut();
        let base = data.len() as EntityId;
        let created: Vec<T> = models
            .into_iter()
            .enumerate()
            .map(|(index, mut model)| {
                model.set_id(base + index as EntityId + 1);
                model
            })
            .collect();
        data.extend(created.iter().cloned());
        Ok(created)
    }

    fn update_many_no_transaction(&mut self, models: Vec<T>) -> RepoResult<()> {
        validate_all(&models)?;
        self.ensure_known_ids(&models)?;
        self.tx.enlist(&self.data);

        let mut data = self.data.borrow_mut();
        for model in models {
            if let Some(slot) = data.iter_mut().find(|item| item.id() == model.id()) {
                *slot = model;
            }
        }
        Ok(())
    }

    fn delete_no_transaction(&mut self, predicate: &Predicate<T>) -> RepoResult<usize> {
        self.tx.enlist(&self.data);

        let mut data = self.data.borrow_mut();
        let matches: Vec<usize> = data
            .iter()
            .enumerate()
            .filter(|(_, item)| predicate.matches(item))
            .map(|(index, _)| index)
            .collect();
        for &index in matches.iter().rev() {
            data.remove(index);
        }
        Ok(matches.len())
    }

    fn create_bulk(&mut self, models: Vec<T>) -> RepoResult<()> {
        let count = models.len();
        self.create_many_no_transaction(models)?;
        debug!(
            "event=create_bulk module=repo status=ok backend=memory entity={} rows={}",
            T::NAME,
            count
        );
        Ok(())
    }

    fn update_bulk(&mut self, models: Vec<T>) -> RepoResult<()> {
        let count = models.len();
        self.update_many_no_transaction(models)?;
        debug!(
            "event=update_bulk module=repo status=ok backend=memory entity={} rows={}",
            T::NAME,
            count
        );
        Ok(())
    }

    fn is_in_transaction(&self) -> bool {
        self.tx.is_active()
    }

    fn is_transaction_owner(&self) -> bool {
        self.is_owner
    }

    fn begin_transaction(&mut self) -> RepoResult<()> {
        if self.tx.is_active() {
            return Ok(());
        }
        self.tx.begin();
        self.is_owner = true;
        debug!(
            "event=tx_begin module=repo status=ok backend=memory entity={}",
            T::NAME
        );
        Ok(())
    }

    fn commit_transaction(&mut self) -> RepoResult<()> {
        if !self.is_owner {
            return Ok(());
        }
        self.tx.commit();
        self.is_owner = false;
        debug!(
            "event=tx_commit module=repo status=ok backend=memory entity={}",
            T::NAME
        );
        Ok(())
    }

    fn rollback_transaction(&mut self) -> RepoResult<()> {
        if !self.is_owner {
            return Ok(());
        }
        self.tx.rollback();
        self.is_owner = false;
        debug!(
            "event=tx_rollback module=repo status=ok backend=memory entity={}",
            T::NAME
        );
        Ok(())
    }
}

impl<T> Drop for MemoryRepository<T> {
    fn drop(&mut self) {
        if self.is_owner {
            self.tx.rollback();
            debug!("event=tx_rollback module=repo status=dropped backend=memory");
        }
    }
}
