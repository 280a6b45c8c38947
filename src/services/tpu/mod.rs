//! Cloud TPU v2 resources
//!
//! Node mutations return long-running operations; placement data such as
//! accelerator types and runtime versions is exposed through paginated list
//! lookups.

pub mod types;
pub mod vm;
