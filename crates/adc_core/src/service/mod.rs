//! Use-case services over the generic repository.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Stay storage-agnostic: every service is generic over `Repository<T>`.

pub mod base_service;
pub mod conversion_service;
pub mod role_service;
pub mod user_service;
