//! Resource name codec
//!
//! Google Cloud addresses resources with hierarchical paths
//! (`projects/{p}/locations/{l}/keyRings/{k}/cryptoKeys/{c}`). Users supply
//! references in several shapes: the full canonical path, an
//! `https://...googleapis.com/v1/...` self link, a compact slash tuple
//! (`{project}/{location}/{name}`), or a without-project form
//! (`{location}/{name}`) that falls back on the configured default project.
//!
//! Each typed name here accepts all of those on parse and serializes to
//! exactly one canonical relative path, so parse -> serialize is stable.

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum NameError {
    #[error("invalid {kind} reference {input:?}; expected one of: {expected}")]
    Malformed {
        kind: &'static str,
        input: String,
        expected: &'static str,
    },

    /// The without-project short form was used with no project configured
    #[error("default project must be set")]
    MissingDefaultProject,
}

/// Drop the scheme/host/version prefix of a self link, keeping the relative
/// path starting at `projects/`.
fn strip_self_link(input: &str) -> &str {
    if input.starts_with("http://") || input.starts_with("https://") {
        if let Some(idx) = input.find("projects/") {
            return &input[idx..];
        }
    }
    input
}

/// Parse a `projects/{p}/locations/{l}/<collection>/{n}` style reference
fn parse_locational(
    kind: &'static str,
    collection: &str,
    expected: &'static str,
    input: &str,
    default_project: Option<&str>,
) -> Result<(String, String, String), NameError> {
    let relative = strip_self_link(input);

    let full = Regex::new(&format!(
        "^projects/([^/]+)/locations/([^/]+)/{}/([^/]+)$",
        collection
    ))
    .expect("static pattern");
    if let Some(parts) = full.captures(relative) {
        return Ok((parts[1].to_string(), parts[2].to_string(), parts[3].to_string()));
    }

    let segments: Vec<&str> = relative.split('/').collect();
    match segments.as_slice() {
        [project, location, name] if segments.iter().all(|s| !s.is_empty()) => {
            Ok((project.to_string(), location.to_string(), name.to_string()))
        }
        [location, name] if segments.iter().all(|s| !s.is_empty()) => {
            let project = default_project.ok_or(NameError::MissingDefaultProject)?;
            Ok((project.to_string(), location.to_string(), name.to_string()))
        }
        _ => Err(NameError::Malformed {
            kind,
            input: input.to_string(),
            expected,
        }),
    }
}

/// Parse a two-level reference
/// (`projects/{p}/locations/{l}/<parent>/{pn}/<collection>/{n}`)
fn parse_nested(
    kind: &'static str,
    parent_collection: &str,
    collection: &str,
    expected: &'static str,
    input: &str,
    default_project: Option<&str>,
) -> Result<(String, String, String, String), NameError> {
    let relative = strip_self_link(input);

    let full = Regex::new(&format!(
        "^projects/([^/]+)/locations/([^/]+)/{}/([^/]+)/{}/([^/]+)$",
        parent_collection, collection
    ))
    .expect("static pattern");
    if let Some(parts) = full.captures(relative) {
        return Ok((
            parts[1].to_string(),
            parts[2].to_string(),
            parts[3].to_string(),
            parts[4].to_string(),
        ));
    }

    let segments: Vec<&str> = relative.split('/').collect();
    match segments.as_slice() {
        [project, location, parent, name] if segments.iter().all(|s| !s.is_empty()) => Ok((
            project.to_string(),
            location.to_string(),
            parent.to_string(),
            name.to_string(),
        )),
        [location, parent, name] if segments.iter().all(|s| !s.is_empty()) => {
            let project = default_project.ok_or(NameError::MissingDefaultProject)?;
            Ok((
                project.to_string(),
                location.to_string(),
                parent.to_string(),
                name.to_string(),
            ))
        }
        _ => Err(NameError::Malformed {
            kind,
            input: input.to_string(),
            expected,
        }),
    }
}

macro_rules! locational_name {
    ($name:ident, $kind:literal, $collection:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub project: String,
            pub location: String,
            pub name: String,
        }

        impl $name {
            pub fn new(project: &str, location: &str, name: &str) -> Self {
                Self {
                    project: project.to_string(),
                    location: location.to_string(),
                    name: name.to_string(),
                }
            }

            pub fn parse(input: &str, default_project: Option<&str>) -> Result<Self, NameError> {
                let (project, location, name) = parse_locational(
                    $kind,
                    $collection,
                    concat!(
                        "projects/{project}/locations/{location}/",
                        $collection,
                        "/{name}, {project}/{location}/{name}, {location}/{name}"
                    ),
                    input,
                    default_project,
                )?;
                Ok(Self {
                    project,
                    location,
                    name,
                })
            }

            /// Canonical relative REST path
            pub fn resource_path(&self) -> String {
                format!(
                    concat!("projects/{}/locations/{}/", $collection, "/{}"),
                    self.project, self.location, self.name
                )
            }

            /// Path of the parent collection, for list/create URLs
            pub fn parent_path(&self) -> String {
                format!("projects/{}/locations/{}", self.project, self.location)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.resource_path())
            }
        }
    };
}

locational_name!(KeyRingName, "key ring", "keyRings");
locational_name!(EkmConnectionName, "EKM connection", "ekmConnections");
locational_name!(ClusterName, "AlloyDB cluster", "clusters");
locational_name!(SecretName, "secret", "secrets");
locational_name!(NodeName, "TPU node", "nodes");

/// Cloud KMS crypto key, nested under a key ring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoKeyName {
    pub key_ring: KeyRingName,
    pub name: String,
}

impl CryptoKeyName {
    pub fn parse(input: &str, default_project: Option<&str>) -> Result<Self, NameError> {
        let (project, location, ring, name) = parse_nested(
            "crypto key",
            "keyRings",
            "cryptoKeys",
            "projects/{project}/locations/{location}/keyRings/{ring}/cryptoKeys/{name}, \
             {project}/{location}/{ring}/{name}, {location}/{ring}/{name}",
            input,
            default_project,
        )?;
        Ok(Self {
            key_ring: KeyRingName::new(&project, &location, &ring),
            name,
        })
    }

    pub fn resource_path(&self) -> String {
        format!("{}/cryptoKeys/{}", self.key_ring.resource_path(), self.name)
    }
}

impl std::fmt::Display for CryptoKeyName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.resource_path())
    }
}

/// AlloyDB instance, nested under a cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceName {
    pub cluster: ClusterName,
    pub name: String,
}

impl InstanceName {
    pub fn parse(input: &str, default_project: Option<&str>) -> Result<Self, NameError> {
        let (project, location, cluster, name) = parse_nested(
            "AlloyDB instance",
            "clusters",
            "instances",
            "projects/{project}/locations/{location}/clusters/{cluster}/instances/{name}, \
             {project}/{location}/{cluster}/{name}, {location}/{cluster}/{name}",
            input,
            default_project,
        )?;
        Ok(Self {
            cluster: ClusterName::new(&project, &location, &cluster),
            name,
        })
    }

    pub fn resource_path(&self) -> String {
        format!("{}/instances/{}", self.cluster.resource_path(), self.name)
    }
}

impl std::fmt::Display for InstanceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.resource_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ring_round_trip() {
        let path = "projects/my-project/locations/us-central1/keyRings/my-ring";
        let name = KeyRingName::parse(path, None).unwrap();
        assert_eq!(name.resource_path(), path);
        assert_eq!(name.to_string(), path);
    }

    #[test]
    fn test_key_ring_tuple_forms() {
        let full = KeyRingName::parse("my-project/us-central1/my-ring", None).unwrap();
        let short = KeyRingName::parse("us-central1/my-ring", Some("my-project")).unwrap();
        assert_eq!(full, short);
        assert_eq!(
            short.resource_path(),
            "projects/my-project/locations/us-central1/keyRings/my-ring"
        );
    }

    #[test]
    fn test_short_form_without_default_project() {
        let err = KeyRingName::parse("us-central1/my-ring", None).unwrap_err();
        assert_eq!(err, NameError::MissingDefaultProject);
        assert_eq!(err.to_string(), "default project must be set");
    }

    #[test]
    fn test_self_link_accepted() {
        let name = KeyRingName::parse(
            "https://cloudkms.googleapis.com/v1/projects/p/locations/global/keyRings/ring",
            None,
        )
        .unwrap();
        assert_eq!(name.project, "p");
        assert_eq!(name.location, "global");
    }

    #[test]
    fn test_malformed_names_expected_formats() {
        let err = KeyRingName::parse("just-a-name", None).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("keyRings"));
        assert!(message.contains("{location}/{name}"));
    }

    #[test]
    fn test_crypto_key_round_trip() {
        let path = "projects/p/locations/global/keyRings/ring/cryptoKeys/key";
        let name = CryptoKeyName::parse(path, None).unwrap();
        assert_eq!(name.resource_path(), path);
        assert_eq!(name.key_ring.name, "ring");
        assert_eq!(name.name, "key");
    }

    #[test]
    fn test_crypto_key_short_forms() {
        let short = CryptoKeyName::parse("global/ring/key", Some("proj")).unwrap();
        let tuple = CryptoKeyName::parse("proj/global/ring/key", None).unwrap();
        assert_eq!(short, tuple);
        assert_eq!(
            CryptoKeyName::parse("global/ring/key", None).unwrap_err(),
            NameError::MissingDefaultProject
        );
    }

    #[test]
    fn test_instance_parse() {
        let name = InstanceName::parse(
            "projects/p/locations/us-east1/clusters/primary/instances/replica",
            None,
        )
        .unwrap();
        assert_eq!(name.cluster.name, "primary");
        assert_eq!(
            name.resource_path(),
            "projects/p/locations/us-east1/clusters/primary/instances/replica"
        );
    }

    #[test]
    fn test_empty_segments_rejected() {
        assert!(KeyRingName::parse("us-central1//ring", None).is_err());
        assert!(KeyRingName::parse("", None).is_err());
    }
}
