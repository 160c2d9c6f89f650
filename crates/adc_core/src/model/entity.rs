//! Entity contract shared by every repository backend.
//!
//! # Responsibility
//! - Define the minimal identity surface the generic repository needs.
//! - Provide a validation hook that write paths run before persistence.
//!
//! # Invariants
//! - `id()` is stable for the lifetime of a persisted record.
//! - `id() == 0` means "not yet persisted"; backends assign identities on create.

use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

/// Identity type used by every entity.
pub type EntityId = i64;

/// Record type the generic repository can store.
///
/// Implementors are plain owned values; every repository read returns
/// detached clones.
pub trait Entity: Clone + Debug + 'static {
    /// Human-readable entity name used in errors and diagnostics.
    const NAME: &'static str;

    fn id(&self) -> EntityId;

    fn set_id(&mut self, id: EntityId);

    /// Checks field-level invariants before a write.
    ///
    /// The default accepts every value.
    fn validate(&self) -> Result<(), EntityValidationError> {
        Ok(())
    }
}

/// Field-level validation failure raised by [`Entity::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityValidationError {
    pub entity: &'static str,
    pub field: &'static str,
    pub reason: String,
}

impl EntityValidationError {
    pub fn new(entity: &'static str, field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            entity,
            field,
            reason: reason.into(),
        }
    }
}

impl Display for EntityValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {}.{}: {}", self.entity, self.field, self.reason)
    }
}

impl Error for EntityValidationError {}
