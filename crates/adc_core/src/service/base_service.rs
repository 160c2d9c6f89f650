//! Generic CRUD service over one repository.
//!
//! # Responsibility
//! - Give entities without business rules a service surface with no custom
//!   code.
//! - Forward every call to the repository so the ownership protocol applies
//!   unchanged.
//!
//! # Invariants
//! - The service never opens, commits or rolls back a transaction itself.

use crate::model::entity::Entity;
use crate::query::include::Include;
use crate::query::order_by::OrderStrategy;
use crate::query::predicate::Predicate;
use crate::query::QueryParams;
use crate::repo::{RepoResult, Repository};
use std::hash::Hash;
use std::marker::PhantomData;

pub struct BaseService<T, R> {
    repo: R,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity, R: Repository<T>> BaseService<T, R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            _entity: PhantomData,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn repository_mut(&mut self) -> &mut R {
        &mut self.repo
    }

    pub fn into_repository(self) -> R {
        self.repo
    }

    pub fn create_includes(&self, includes: impl IntoIterator<Item = Include<T>>) -> Vec<Include<T>> {
        self.repo.create_includes(includes)
    }

    pub fn create_order_bys(
        &self,
        order_bys: impl IntoIterator<Item = Box<dyn OrderStrategy<T>>>,
    ) -> Vec<Box<dyn OrderStrategy<T>>> {
        self.repo.create_order_bys(order_bys)
    }

    pub fn get_one(
        &self,
        predicate: &Predicate<T>,
        includes: &[Include<T>],
        order_bys: &[Box<dyn OrderStrategy<T>>],
    ) -> RepoResult<Option<T>> {
        self.repo.get_one(predicate, includes, order_bys)
    }

    pub fn get_one_projected<P>(
        &self,
        predicate: &Predicate<T>,
        includes: &[Include<T>],
        order_bys: &[Box<dyn OrderStrategy<T>>],
        select: impl FnOnce(T) -> P,
    ) -> RepoResult<Option<P>> {
        self.repo
            .get_one_projected(predicate, includes, order_bys, select)
    }

    pub fn get_list(&self, params: &QueryParams<T>) -> RepoResult<Vec<T>> {
        self.repo.get_list(params)
    }

    pub fn get_list_projected<P>(
        &self,
        params: &QueryParams<T>,
        select: impl FnMut(T) -> P,
    ) -> RepoResult<Vec<P>> {
        self.repo.get_list_projected(params, select)
    }

    pub fn get_grouped_list<K, P>(
        &self,
        predicate: &Predicate<T>,
        includes: &[Include<T>],
        key: impl Fn(&T) -> K,
        select: impl FnMut(K, Vec<T>) -> P,
    ) -> RepoResult<Vec<P>>
    where
        K: Eq + Hash + Clone,
    {
        self.repo.get_grouped_list(predicate, includes, key, select)
    }

    pub fn create(&mut self, model: T) -> RepoResult<T> {
        self.repo.create(model)
    }

    pub fn create_many(&mut self, models: Vec<T>) -> RepoResult<Vec<T>> {
        self.repo.create_many(models)
    }

    pub fn create_bulk(&mut self, models: Vec<T>) -> RepoResult<()> {
        self.repo.create_bulk(models)
    }

    pub fn update(&mut self, model: T) -> RepoResult<T> {
        self.repo.update(model)
    }

    pub fn update_many(&mut self, models: Vec<T>) -> RepoResult<Vec<T>> {
        self.repo.update_many(models)
    }

    pub fn update_where(
        &mut self,
        predicate: &Predicate<T>,
        includes: &[Include<T>],
        action: impl FnMut(&mut T),
    ) -> RepoResult<Vec<T>> {
        self.repo.update_where(predicate, includes, action)
    }

    pub fn update_grouped(
        &mut self,
        predicate: &Predicate<T>,
        group_size: usize,
        includes: &[Include<T>],
        action: impl FnMut(&mut T),
    ) -> RepoResult<usize> {
        self.repo
            .update_grouped(predicate, group_size, includes, action)
    }

    pub fn update_bulk(&mut self, models: Vec<T>) -> RepoResult<()> {
        self.repo.update_bulk(models)
    }

    pub fn delete(&mut self, predicate: &Predicate<T>) -> RepoResult<usize> {
        self.repo.delete(predicate)
    }

    pub fn count(&self, predicate: &Predicate<T>, includes: &[Include<T>]) -> RepoResult<usize> {
        self.repo.count(predicate, includes)
    }
}
