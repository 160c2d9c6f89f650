//! User administration use cases.
//!
//! # Responsibility
//! - Provide lookup, search and CRUD entry points over any `Repository<User>`.
//! - Enforce account rules that span several rows.
//!
//! # Invariants
//! - Deleting a user toggles `in_active`; rows are never removed here.
//! - The last active administrator can never be deactivated.
//! - Search `total` counts every match, ignoring the page window.

use crate::model::entity::EntityId;
use crate::model::security::{User, UserRole};
use crate::query::include::Include;
use crate::query::order_by::{OrderBy, OrderByDescending};
use crate::query::predicate::Predicate;
use crate::query::QueryParams;
use crate::repo::{RepoError, Repository};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type UserServiceResult<T> = Result<T, UserServiceError>;

#[derive(Debug)]
pub enum UserServiceError {
    Repo(RepoError),
    NotFound(EntityId),
    /// Refused to deactivate the only remaining active administrator.
    LastAdministrator(EntityId),
}

impl Display for UserServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "user not found: {id}"),
            Self::LastAdministrator(id) => {
                write!(f, "unable to deactivate last administrator: {id}")
            }
        }
    }
}

impl Error for UserServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::NotFound(_) | Self::LastAdministrator(_) => None,
        }
    }
}

impl From<RepoError> for UserServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Sortable user columns; unknown names fall back to `FirstName`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserSortField {
    #[default]
    FirstName,
    LastName,
    IsActive,
}

impl UserSortField {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "lastname" | "last_name" => Self::LastName,
            "isactive" | "is_active" => Self::IsActive,
            _ => Self::FirstName,
        }
    }
}

/// `asc` (any case) sorts ascending; anything else sorts descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl SortDirection {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("asc") {
            Self::Ascending
        } else {
            Self::Descending
        }
    }
}

/// Search request as posted by the admin UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSearch {
    pub query: Option<String>,
    pub sort: String,
    pub direction: String,
    pub skip: usize,
    /// `None` returns every remaining match.
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsersResult {
    pub items: Vec<User>,
    pub total: usize,
}

pub struct UserService<R: Repository<User>> {
    repo: R,
}

impl<R: Repository<User>> UserService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Loads one user with `user_roles.role` attached.
    pub fn get(&self, id: EntityId) -> UserServiceResult<Option<User>> {
        let includes = self.role_includes();
        Ok(self.repo.get_one(&by_id(id), &includes, &[])?)
    }

    pub fn search(&self, search: &UserSearch) -> UserServiceResult<UsersResult> {
        let predicate = search_predicate(search.query.as_deref());
        let mut params = ordered(
            QueryParams::filtered(predicate.clone()).includes(self.role_includes()),
            UserSortField::parse(&search.sort),
            SortDirection::parse(&search.direction),
        )
        .skip(search.skip);
        if let Some(limit) = search.limit {
            params = params.take(limit);
        }

        Ok(UsersResult {
            items: self.repo.get_list_no_tracking(&params)?,
            total: self.repo.count(&predicate, &[])?,
        })
    }

    pub fn create(&mut self, user: User) -> UserServiceResult<User> {
        let created = self.repo.create(user)?;
        info!(
            "event=user_create module=service status=ok user_id={}",
            created.id
        );
        Ok(created)
    }

    /// Persists profile changes and issues a new concurrency stamp.
    pub fn update(&mut self, mut user: User) -> UserServiceResult<User> {
        user.touch();
        Ok(self.repo.update(user)?)
    }

    /// Toggles the user's `in_active` flag and returns the new value.
    ///
    /// # Errors
    /// - `NotFound` when no user has `id`.
    /// - `LastAdministrator` when `id` is the only active administrator.
    pub fn delete(&mut self, id: EntityId) -> UserServiceResult<bool> {
        let includes = self.role_includes();
        let user = self
            .repo
            .get_one(&by_id(id), &includes, &[])?
            .ok_or(UserServiceError::NotFound(id))?;

        if user.is_admin() && !user.in_active {
            let other_admins = Predicate::new(move |candidate: &User| {
                candidate.id != id && !candidate.in_active && candidate.is_admin()
            });
            if self.repo.count(&other_admins, &includes)? == 0 {
                warn!(
                    "event=user_deactivate module=service status=rejected user_id={} reason=last_administrator",
                    id
                );
                return Err(UserServiceError::LastAdministrator(id));
            }
        }

        let in_active = self
            .repo
            .update_where(&by_id(id), &[], |target| target.in_active = !target.in_active)?
            .first()
            .map_or(!user.in_active, |target| target.in_active);
        info!(
            "event=user_deactivate module=service status=ok user_id={} in_active={}",
            id, in_active
        );
        Ok(in_active)
    }

    fn role_includes(&self) -> Vec<Include<User>> {
        self.repo.create_includes([Include::<User>::new(|user| {
            user.then(User::USER_ROLES)
                .select(|link| link.then(UserRole::ROLE))
        })])
    }
}

fn by_id(id: EntityId) -> Predicate<User> {
    Predicate::new(move |user: &User| user.id == id)
}

/// Case-insensitive free-text match on first name, last name or email.
fn search_predicate(query: Option<&str>) -> Predicate<User> {
    let predicate = Predicate::always();
    match query.map(str::trim).filter(|query| !query.is_empty()) {
        Some(query) => {
            let needle = query.to_lowercase();
            predicate.and(Predicate::new(move |user: &User| {
                [&user.first_name, &user.last_name, &user.email]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            }))
        }
        None => predicate,
    }
}

fn ordered(
    params: QueryParams<User>,
    sort: UserSortField,
    direction: SortDirection,
) -> QueryParams<User> {
    match sort {
        UserSortField::FirstName => by_key(params, direction, |user| user.first_name.clone()),
        UserSortField::LastName => by_key(params, direction, |user| user.last_name.clone()),
        UserSortField::IsActive => by_key(params, direction, |user| user.in_active),
    }
}

fn by_key<K: Ord + 'static>(
    params: QueryParams<User>,
    direction: SortDirection,
    key: impl Fn(&User) -> K + 'static,
) -> QueryParams<User> {
    match direction {
        SortDirection::Ascending => params.order_by(OrderBy::new(key)),
        SortDirection::Descending => params.order_by(OrderByDescending::new(key)),
    }
}
