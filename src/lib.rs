//! Declarative resource management for Google Cloud over REST.
//!
//! Each supported resource lives in a module under [`services`] and exposes
//! the same handler surface: `create`, `read`, `update`, `delete`, and
//! `import_state`, all operating on a flat [`state::ResourceState`]. The
//! handlers translate between the state shape (snake_case attributes) and
//! the wire shape (camelCase JSON), wait out long-running operations, and
//! treat a 404 on read as drift rather than an error.
//!
//! ```no_run
//! use gcpsync::config::ProviderConfig;
//! use gcpsync::gcp::client::GcpClient;
//! use gcpsync::services::kms::key_ring;
//! use gcpsync::state::ResourceState;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let client = GcpClient::new(ProviderConfig::with_project("my-project")).await?;
//!
//! let mut state = ResourceState::new();
//! state.set("name", "app-keys");
//! state.set("location", "us-central1");
//! key_ring::create(&client, &mut state).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod gcp;
pub mod name;
pub mod resource;
pub mod services;
pub mod state;
