//! Secret Manager regional resources
//!
//! Regional secrets live on per-location endpoints
//! (`secretmanager.{location}.rep.googleapis.com`); every URL here goes
//! through [`GcpClient::secret_manager_url`] so the location is baked into
//! the host, not just the path.
//!
//! [`GcpClient::secret_manager_url`]: crate::gcp::client::GcpClient::secret_manager_url

pub mod regional_secret;
pub mod regional_secret_version;
