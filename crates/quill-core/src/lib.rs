//! # Quill Core
//!
//! The domain layer of the Quill blog service.
//! Entities, the visibility and ownership policies, pagination, and the
//! port traits infrastructure implements. No infrastructure dependencies.

pub mod domain;
pub mod error;
pub mod pagination;
pub mod policy;
pub mod ports;

pub use error::DomainError;
