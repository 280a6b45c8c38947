//! Cloud KMS resources
//!
//! - [`key_ring`] - key rings (create/read only; rings are undeletable)
//! - [`crypto_key`] - crypto keys with rotation schedules and version templates
//! - [`ekm_connection`] - external key manager connections

pub mod crypto_key;
pub mod ekm_connection;
pub mod key_ring;
