//! Generic data-access layer for the administration backend.
//! Entities, query building blocks, repository backends and the services
//! built on them.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig, DatabaseConfig, RepositoryBackend};
pub use db::{open_db, open_db_in_memory, open_db_with, DbError, DbResult};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status, LoggingError};
pub use model::conversion::Conversion;
pub use model::entity::{Entity, EntityId, EntityValidationError};
pub use model::file_entry::{FileSystemEntry, FileSystemEntryType};
pub use model::security::{roles, Role, User, UserRole};
pub use query::include::{Include, IncludePath, NavExpr, Relation};
pub use query::order_by::{OrderBy, OrderByDescending, OrderStrategy};
pub use query::predicate::Predicate;
pub use query::QueryParams;
pub use repo::memory_repo::{MemoryRepository, MemoryTransaction, TransactionStats};
pub use repo::sqlite_mapping::SqlEntity;
pub use repo::sqlite_repo::SqliteRepository;
pub use repo::{RepoError, RepoResult, Repository};
pub use service::base_service::BaseService;
pub use service::conversion_service::ConversionService;
pub use service::role_service::RoleService;
pub use service::user_service::{UserSearch, UserService, UserServiceError, UsersResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
