//! Generic repository contract and its storage backends.
//!
//! # Responsibility
//! - Define one data-access interface (`Repository<T>`) for every entity type.
//! - Own the transaction-ownership protocol around every mutating call.
//! - Keep storage details inside the SQLite and in-memory backends.
//!
//! # Invariants
//! - At most one transaction is active per connection (or per
//!   `MemoryTransaction` context); the repository that began it is its owner.
//! - Only the owner commits or rolls back; non-owners observe the transaction
//!   as active and leave it alone.
//! - A failed mutating call returns its original error after the owner rolls
//!   back.
//! - Read pipeline order is fixed: includes, predicate, ordering, skip, take.

mod error;
pub mod memory_repo;
pub mod sqlite_mapping;
pub mod sqlite_repo;

pub use error::{RepoError, RepoResult};

use crate::model::entity::Entity;
use crate::query::include::Include;
use crate::query::order_by::{apply_order_bys, OrderStrategy};
use crate::query::predicate::Predicate;
use crate::query::QueryParams;
use log::{debug, warn};
use std::collections::HashMap;
use std::hash::Hash;

/// Data-access contract for entity `T`.
///
/// Backends implement the storage-facing methods; everything else is provided
/// on top of them and behaves identically for every backend.
pub trait Repository<T: Entity> {
    /// Loads entities matching `params`, with resolved includes attached.
    fn query(&self, params: &QueryParams<T>) -> RepoResult<Vec<T>>;

    /// Inserts `models` and returns them with assigned identities.
    ///
    /// Runs inside whatever transaction is active; never begins one.
    fn create_many_no_transaction(&mut self, models: Vec<T>) -> RepoResult<Vec<T>>;

    /// Persists `models` by identity inside the active transaction, if any.
    fn update_many_no_transaction(&mut self, models: Vec<T>) -> RepoResult<()>;

    /// Removes every entity matching `predicate`; returns how many were removed.
    fn delete_no_transaction(&mut self, predicate: &Predicate<T>) -> RepoResult<usize>;

    /// Inserts a batch atomically, outside the ownership protocol.
    ///
    /// Either every row is written or none is.
    fn create_bulk(&mut self, models: Vec<T>) -> RepoResult<()>;

    /// Updates a batch atomically, outside the ownership protocol.
    fn update_bulk(&mut self, models: Vec<T>) -> RepoResult<()>;

    fn is_in_transaction(&self) -> bool;

    fn is_transaction_owner(&self) -> bool;

    /// Begins a transaction and takes ownership; no-op when one is active.
    fn begin_transaction(&mut self) -> RepoResult<()>;

    /// Commits and clears ownership; no-op unless this repository is owner.
    fn commit_transaction(&mut self) -> RepoResult<()>;

    /// Rolls back and clears ownership; no-op unless this repository is owner.
    fn rollback_transaction(&mut self) -> RepoResult<()>;

    fn create_includes(&self, includes: impl IntoIterator<Item = Include<T>>) -> Vec<Include<T>>
    where
        Self: Sized,
    {
        includes.into_iter().collect()
    }

    fn create_order_bys(
        &self,
        order_bys: impl IntoIterator<Item = Box<dyn OrderStrategy<T>>>,
    ) -> Vec<Box<dyn OrderStrategy<T>>>
    where
        Self: Sized,
    {
        order_bys.into_iter().collect()
    }

    /// First entity matching `predicate` under `order_bys`.
    ///
    /// An empty ordering list means backend identity order.
    fn get_one(
        &self,
        predicate: &Predicate<T>,
        includes: &[Include<T>],
        order_bys: &[Box<dyn OrderStrategy<T>>],
    ) -> RepoResult<Option<T>> {
        let mut params =
            QueryParams::filtered(predicate.clone()).includes(includes.iter().cloned());
        if order_bys.is_empty() {
            params = params.take(1);
        }
        let matches = apply_order_bys(self.query(&params)?, order_bys);
        Ok(matches.into_iter().next())
    }

    /// Same as [`Repository::get_one`]; every read already returns detached values.
    fn get_one_no_tracking(
        &self,
        predicate: &Predicate<T>,
        includes: &[Include<T>],
        order_bys: &[Box<dyn OrderStrategy<T>>],
    ) -> RepoResult<Option<T>> {
        self.get_one(predicate, includes, order_bys)
    }

    fn get_one_projected<R>(
        &self,
        predicate: &Predicate<T>,
        includes: &[Include<T>],
        order_bys: &[Box<dyn OrderStrategy<T>>],
        select: impl FnOnce(T) -> R,
    ) -> RepoResult<Option<R>>
    where
        Self: Sized,
    {
        Ok(self.get_one(predicate, includes, order_bys)?.map(select))
    }

    fn get_list(&self, params: &QueryParams<T>) -> RepoResult<Vec<T>> {
        self.query(params)
    }

    fn get_list_no_tracking(&self, params: &QueryParams<T>) -> RepoResult<Vec<T>> {
        self.query(params)
    }

    fn get_list_projected<R>(
        &self,
        params: &QueryParams<T>,
        select: impl FnMut(T) -> R,
    ) -> RepoResult<Vec<R>>
    where
        Self: Sized,
    {
        Ok(self.query(params)?.into_iter().map(select).collect())
    }

    /// Groups matching entities by `key` and projects each group.
    ///
    /// Groups appear in first-occurrence order of their key; members keep
    /// backend order.
    fn get_grouped_list<K, R>(
        &self,
        predicate: &Predicate<T>,
        includes: &[Include<T>],
        key: impl Fn(&T) -> K,
        mut select: impl FnMut(K, Vec<T>) -> R,
    ) -> RepoResult<Vec<R>>
    where
        Self: Sized,
        K: Eq + Hash + Clone,
    {
        let params = QueryParams::filtered(predicate.clone()).includes(includes.iter().cloned());
        let mut positions: HashMap<K, usize> = HashMap::new();
        let mut groups: Vec<(K, Vec<T>)> = Vec::new();
        for item in self.query(&params)? {
            let group_key = key(&item);
            match positions.get(&group_key) {
                Some(&index) => groups[index].1.push(item),
                None => {
                    positions.insert(group_key.clone(), groups.len());
                    groups.push((group_key, vec![item]));
                }
            }
        }
        Ok(groups
            .into_iter()
            .map(|(group_key, members)| select(group_key, members))
            .collect())
    }

    fn create(&mut self, model: T) -> RepoResult<T>
    where
        Self: Sized,
    {
        self.run_in_transaction(|repo| repo.create_no_transaction(model))
    }

    fn create_many(&mut self, models: Vec<T>) -> RepoResult<Vec<T>>
    where
        Self: Sized,
    {
        self.run_in_transaction(|repo| repo.create_many_no_transaction(models))
    }

    fn create_no_transaction(&mut self, model: T) -> RepoResult<T> {
        self.create_many_no_transaction(vec![model])?
            .into_iter()
            .next()
            .ok_or_else(|| RepoError::InvalidData(format!("{} create returned no row", T::NAME)))
    }

    /// Persists `model` and returns it as stored.
    fn update(&mut self, model: T) -> RepoResult<T>
    where
        Self: Sized,
    {
        self.run_in_transaction(|repo| repo.update_no_transaction(model))
    }

    fn update_many(&mut self, models: Vec<T>) -> RepoResult<Vec<T>>
    where
        Self: Sized,
    {
        self.run_in_transaction(|repo| {
            let saved = models.clone();
            repo.update_many_no_transaction(models)?;
            Ok(saved)
        })
    }

    fn update_no_transaction(&mut self, model: T) -> RepoResult<T> {
        self.update_many_no_transaction(vec![model.clone()])?;
        Ok(model)
    }

    /// Applies `action` to every match and persists the result.
    ///
    /// Returns the updated entities in query order.
    fn update_where(
        &mut self,
        predicate: &Predicate<T>,
        includes: &[Include<T>],
        action: impl FnMut(&mut T),
    ) -> RepoResult<Vec<T>>
    where
        Self: Sized,
    {
        self.run_in_transaction(|repo| repo.update_where_no_transaction(predicate, includes, action))
    }

    fn update_where_no_transaction(
        &mut self,
        predicate: &Predicate<T>,
        includes: &[Include<T>],
        action: impl FnMut(&mut T),
    ) -> RepoResult<Vec<T>>
    where
        Self: Sized,
    {
        let params = QueryParams::filtered(predicate.clone()).includes(includes.iter().cloned());
        let mut items = self.query(&params)?;
        items.iter_mut().for_each(action);
        self.update_many_no_transaction(items.clone())?;
        Ok(items)
    }

    /// Applies `action` page by page, `group_size` matches at a time.
    ///
    /// Page `n` is fetched with `skip = n * group_size`; the loop ends at the
    /// first empty page. Only the count is returned so peak memory stays at
    /// one page. `group_size == 0` is rejected before any transaction
    /// is opened.
    fn update_grouped(
        &mut self,
        predicate: &Predicate<T>,
        group_size: usize,
        includes: &[Include<T>],
        action: impl FnMut(&mut T),
    ) -> RepoResult<usize>
    where
        Self: Sized,
    {
        ensure_group_size(group_size)?;
        self.run_in_transaction(|repo| {
            repo.update_grouped_no_transaction(predicate, group_size, includes, action)
        })
    }

    fn update_grouped_no_transaction(
        &mut self,
        predicate: &Predicate<T>,
        group_size: usize,
        includes: &[Include<T>],
        mut action: impl FnMut(&mut T),
    ) -> RepoResult<usize>
    where
        Self: Sized,
    {
        ensure_group_size(group_size)?;
        let mut page = 0;
        let mut updated = 0;
        loop {
            let params = QueryParams::filtered(predicate.clone())
                .includes(includes.iter().cloned())
                .page(page, group_size);
            let mut items = self.query(&params)?;
            if items.is_empty() {
                break;
            }

            items.iter_mut().for_each(&mut action);
            let page_len = items.len();
            self.update_many_no_transaction(items)?;
            debug!(
                "event=update_grouped module=repo status=page entity={} page={} size={}",
                T::NAME,
                page,
                page_len
            );
            updated += page_len;
            page += 1;
        }
        Ok(updated)
    }

    fn delete(&mut self, predicate: &Predicate<T>) -> RepoResult<usize>
    where
        Self: Sized,
    {
        self.run_in_transaction(|repo| repo.delete_no_transaction(predicate))
    }

    fn count(&self, predicate: &Predicate<T>, includes: &[Include<T>]) -> RepoResult<usize> {
        let params = QueryParams::filtered(predicate.clone()).includes(includes.iter().cloned());
        Ok(self.query(&params)?.len())
    }

    /// Runs `work` under the ownership protocol.
    ///
    /// Begins a transaction when none is active. On success the owner commits;
    /// on failure the owner rolls back and the original error is returned.
    /// Nested calls on repositories sharing the transaction never commit or
    /// roll back themselves.
    fn run_in_transaction<R>(
        &mut self,
        work: impl FnOnce(&mut Self) -> RepoResult<R>,
    ) -> RepoResult<R>
    where
        Self: Sized,
    {
        if !self.is_in_transaction() {
            self.begin_transaction()?;
        }

        match work(self) {
            Ok(value) => {
                if self.is_transaction_owner() {
                    if let Err(err) = self.commit_transaction() {
                        rollback_if_owner::<T, Self>(self, &err);
                        return Err(err);
                    }
                }
                Ok(value)
            }
            Err(err) => {
                rollback_if_owner::<T, Self>(self, &err);
                Err(err)
            }
        }
    }
}

/// Validates a whole batch before any of it is written.
pub(crate) fn validate_all<T: Entity>(models: &[T]) -> RepoResult<()> {
    for model in models {
        model.validate()?;
    }
    Ok(())
}

fn ensure_group_size(group_size: usize) -> RepoResult<()> {
    if group_size == 0 {
        return Err(RepoError::InvalidArgument {
            operation: "update_grouped",
            message: "group_size must be greater than zero".to_string(),
        });
    }
    Ok(())
}

fn rollback_if_owner<T: Entity, R: Repository<T> + ?Sized>(repo: &mut R, cause: &RepoError) {
    if !repo.is_transaction_owner() {
        return;
    }
    debug!(
        "event=tx_rollback module=repo status=start entity={} cause={}",
        T::NAME,
        cause
    );
    if let Err(err) = repo.rollback_transaction() {
        warn!(
            "event=tx_rollback module=repo status=error entity={} error={}",
            T::NAME,
            err
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{RepoError, RepoResult, Repository};
    use crate::model::entity::{Entity, EntityId};
    use crate::query::predicate::Predicate;
    use crate::query::QueryParams;

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        id: EntityId,
        hits: u32,
    }

    impl Entity for Counter {
        const NAME: &'static str = "Counter";

        fn id(&self) -> EntityId {
            self.id
        }

        fn set_id(&mut self, id: EntityId) {
            self.id = id;
        }
    }

    /// Minimal backend recording write batches and transaction calls.
    #[derive(Default)]
    struct RecordingRepo {
        rows: Vec<Counter>,
        update_batches: Vec<usize>,
        in_tx: bool,
        owner: bool,
        commits: u32,
        rollbacks: u32,
        fail_commit: bool,
    }

    impl Repository<Counter> for RecordingRepo {
        fn query(&self, params: &QueryParams<Counter>) -> RepoResult<Vec<Counter>> {
            Ok(params.apply(self.rows.clone()))
        }

        fn create_many_no_transaction(&mut self, models: Vec<Counter>) -> RepoResult<Vec<Counter>> {
            let base = self.rows.len() as EntityId;
            let created: Vec<Counter> = models
                .into_iter()
                .enumerate()
                .map(|(index, mut model)| {
                    model.set_id(base + index as EntityId + 1);
                    model
                })
                .collect();
            self.rows.extend(created.iter().cloned());
            Ok(created)
        }

        fn update_many_no_transaction(&mut self, models: Vec<Counter>) -> RepoResult<()> {
            self.update_batches.push(models.len());
            for model in models {
                if let Some(row) = self.rows.iter_mut().find(|row| row.id == model.id) {
                    *row = model;
                }
            }
            Ok(())
        }

        fn delete_no_transaction(&mut self, predicate: &Predicate<Counter>) -> RepoResult<usize> {
            let before = self.rows.len();
            self.rows.retain(|row| !predicate.matches(row));
            Ok(before - self.rows.len())
        }

        fn create_bulk(&mut self, models: Vec<Counter>) -> RepoResult<()> {
            self.create_many_no_transaction(models).map(|_| ())
        }

        fn update_bulk(&mut self, models: Vec<Counter>) -> RepoResult<()> {
            self.update_many_no_transaction(models)
        }

        fn is_in_transaction(&self) -> bool {
            self.in_tx
        }

        fn is_transaction_owner(&self) -> bool {
            self.owner
        }

        fn begin_transaction(&mut self) -> RepoResult<()> {
            if !self.in_tx {
                self.in_tx = true;
                self.owner = true;
            }
            Ok(())
        }

        fn commit_transaction(&mut self) -> RepoResult<()> {
            if !self.owner {
                return Ok(());
            }
            if self.fail_commit {
                return Err(RepoError::InvalidData("commit refused".to_string()));
            }
            self.commits += 1;
            self.in_tx = false;
            self.owner = false;
            Ok(())
        }

        fn rollback_transaction(&mut self) -> RepoResult<()> {
            if !self.owner {
                return Ok(());
            }
            self.rollbacks += 1;
            self.in_tx = false;
            self.owner = false;
            Ok(())
        }
    }

    fn seeded(count: usize) -> RecordingRepo {
        let mut repo = RecordingRepo::default();
        repo.create_many_no_transaction(vec![Counter { id: 0, hits: 0 }; count])
            .unwrap();
        repo
    }

    #[test]
    fn grouped_update_visits_pages_until_empty() {
        let mut repo = seeded(5);
        let updated = repo
            .update_grouped(&Predicate::always(), 2, &[], |row| row.hits += 1)
            .unwrap();

        assert_eq!(updated, 5);
        assert_eq!(repo.update_batches, vec![2, 2, 1]);
        assert!(repo.rows.iter().all(|row| row.hits == 1));
        assert_eq!(repo.commits, 1);
    }

    #[test]
    fn zero_group_size_fails_before_transaction() {
        let mut repo = seeded(3);
        let err = repo
            .update_grouped(&Predicate::always(), 0, &[], |_| {})
            .unwrap_err();

        assert!(matches!(err, RepoError::InvalidArgument { .. }));
        assert_eq!(repo.commits + repo.rollbacks, 0);
        assert!(!repo.is_in_transaction());
    }

    #[test]
    fn failed_work_rolls_back_and_returns_original_error() {
        let mut repo = seeded(1);
        let err = repo
            .run_in_transaction(|_| -> RepoResult<()> {
                Err(RepoError::InvalidData("boom".to_string()))
            })
            .unwrap_err();

        assert_eq!(err.to_string(), "invalid persisted data: boom");
        assert_eq!(repo.rollbacks, 1);
        assert!(!repo.is_in_transaction());
    }

    #[test]
    fn failed_commit_rolls_back_and_returns_commit_error() {
        let mut repo = seeded(1);
        repo.fail_commit = true;
        let err = repo.update(Counter { id: 1, hits: 9 }).unwrap_err();

        assert!(err.to_string().contains("commit refused"));
        assert_eq!(repo.rollbacks, 1);
    }

    #[test]
    fn joined_transaction_is_left_to_its_owner() {
        let mut repo = seeded(2);
        repo.in_tx = true;
        repo.owner = false;

        repo.delete(&Predicate::new(|row: &Counter| row.id == 1))
            .unwrap();

        assert!(repo.is_in_transaction());
        assert_eq!(repo.commits + repo.rollbacks, 0);
        assert_eq!(repo.rows.len(), 1);
    }

    #[test]
    fn grouped_list_keeps_first_occurrence_order() {
        let mut repo = RecordingRepo::default();
        repo.create_many_no_transaction(
            [3, 1, 3, 2, 1]
                .into_iter()
                .map(|hits| Counter { id: 0, hits })
                .collect(),
        )
        .unwrap();

        let groups = repo
            .get_grouped_list(&Predicate::always(), &[], |row| row.hits, |key, rows| {
                (key, rows.len())
            })
            .unwrap();

        assert_eq!(groups, vec![(3, 2), (1, 2), (2, 1)]);
    }
}
