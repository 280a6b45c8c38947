//! Service resource handlers
//!
//! One module per Google Cloud service, one file per resource. Each resource
//! exposes plain async CRUD functions over a [`crate::state::ResourceState`]:
//! expand the state into wire JSON, issue the request, and flatten the
//! response back. Read handlers return [`crate::resource::ReadOutcome`] so a
//! 404 clears the resource from state instead of failing.

pub mod alloydb;
pub mod kms;
pub mod secretmanager;
pub mod tpu;
