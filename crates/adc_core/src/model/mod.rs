//! Domain model for the data-access layer.
//!
//! # Responsibility
//! - Define the `Entity` contract every repository backend stores.
//! - Provide the application entities (users, roles, file entries,
//!   conversions).
//!
//! # Invariants
//! - Every entity carries a stable `EntityId`.
//! - Navigations are declared as typed `Relation` constants on the owning type.

pub mod conversion;
pub mod entity;
pub mod file_entry;
pub mod security;
