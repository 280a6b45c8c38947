//! GCP API interaction module
//!
//! This module provides the core functionality for talking to Google Cloud
//! REST APIs, including authentication, the HTTP transport, and long-running
//! operation polling.
//!
//! # Module Structure
//!
//! - [`auth`] - GCP authentication using Application Default Credentials
//! - [`client`] - Main GCP client for making API requests
//! - [`http`] - HTTP utilities for REST API calls (typed errors, bounded retry)
//! - [`operation`] - Polling for `operations/*` resources
//!
//! # Example
//!
//! ```ignore
//! use gcpsync::config::ProviderConfig;
//! use gcpsync::gcp::client::GcpClient;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = GcpClient::new(ProviderConfig::with_project("my-project")).await?;
//!     let url = client.kms_url("projects/my-project/locations/global/keyRings");
//!     let rings = client.get(&url, client.timeouts().read).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
pub mod operation;
