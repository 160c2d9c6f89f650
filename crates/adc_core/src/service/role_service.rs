//! Role bootstrap use cases.

use crate::model::security::{roles, Role};
use crate::query::predicate::Predicate;
use crate::query::QueryParams;
use crate::repo::{RepoResult, Repository};
use log::info;

pub struct RoleService<R: Repository<Role>> {
    repo: R,
}

impl<R: Repository<Role>> RoleService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Looks a role up by name, ignoring ASCII case.
    pub fn find_by_name(&self, name: &str) -> RepoResult<Option<Role>> {
        let name = name.to_string();
        self.repo.get_one(
            &Predicate::new(move |role: &Role| role.name.eq_ignore_ascii_case(&name)),
            &[],
            &[],
        )
    }

    /// Creates every built-in role that is missing, in one transaction.
    ///
    /// Returns all roles ordered by identity.
    pub fn ensure_default_roles(&mut self) -> RepoResult<Vec<Role>> {
        self.repo.run_in_transaction(|repo| {
            let existing = repo.query(&QueryParams::new())?;
            let missing: Vec<Role> = roles::ALL
                .iter()
                .filter(|name| {
                    !existing
                        .iter()
                        .any(|role| role.name.eq_ignore_ascii_case(name))
                })
                .map(|name| Role::new(*name))
                .collect();

            if !missing.is_empty() {
                info!(
                    "event=roles_seed module=service status=ok created={}",
                    missing.len()
                );
                repo.create_many_no_transaction(missing)?;
            }
            repo.query(&QueryParams::new())
        })
    }
}
