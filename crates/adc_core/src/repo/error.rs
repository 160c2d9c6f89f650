//! Repository error taxonomy.

use crate::db::DbError;
use crate::model::entity::{EntityId, EntityValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Error raised by any repository backend.
///
/// Transactional failures are returned unchanged after the owning repository
/// rolls back; this type never wraps one repository error in another.
#[derive(Debug)]
pub enum RepoError {
    /// Caller input rejected before any transaction was opened.
    InvalidArgument {
        operation: &'static str,
        message: String,
    },
    /// Entity failed `Entity::validate()` on a write path.
    Validation(EntityValidationError),
    /// Update referenced an identity absent from the in-memory collection.
    DataIntegrity {
        entity: &'static str,
        id: EntityId,
    },
    /// A resolved include named a relation the entity does not declare.
    UnknownRelation {
        entity: &'static str,
        relation: String,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Connection schema lacks the table an entity maps to.
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted into a valid entity.
    InvalidData(String),
    Db(DbError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument { operation, message } => {
                write!(f, "invalid argument for {operation}: {message}")
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::DataIntegrity { entity, id } => {
                write!(f, "{entity} with id {id} does not exist in the collection")
            }
            Self::UnknownRelation { entity, relation } => {
                write!(f, "{entity} has no relation `{relation}`")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "repository requires column `{column}` in table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::InvalidArgument { .. }
            | Self::DataIntegrity { .. }
            | Self::UnknownRelation { .. }
            | Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_)
            | Self::MissingRequiredColumn { .. }
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<EntityValidationError> for RepoError {
    fn from(value: EntityValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
