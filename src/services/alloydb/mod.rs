//! AlloyDB for PostgreSQL resources
//!
//! Mutations on this service return long-running operations; the handlers
//! wait for completion before reading state back.

pub mod cluster;
pub mod instance;
