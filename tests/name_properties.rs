//! Property-based tests for the resource name codec
//!
//! These verify that every accepted reference shape converges on the same
//! canonical path, and that parse -> serialize is stable under randomized
//! project/location/name inputs.

use gcpsync::name::{CryptoKeyName, KeyRingName, NameError, NodeName, SecretName};
use proptest::prelude::*;

/// GCP-shaped identifier segments (never empty, no slashes)
fn arb_project() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,28}[a-z0-9]".prop_map(String::from)
}

fn arb_location() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{2,10}-[a-z]{2,10}[0-9]",          // region
        "[a-z]{2,10}-[a-z]{2,10}[0-9]-[a-z]",    // zone
        Just("global".to_string()),
    ]
}

fn arb_resource_id() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9][a-zA-Z0-9_-]{0,40}".prop_map(String::from)
}

proptest! {
    /// parse(resource_path()) reproduces the original name
    #[test]
    fn canonical_path_round_trips(
        project in arb_project(),
        location in arb_location(),
        name in arb_resource_id()
    ) {
        let original = SecretName::new(&project, &location, &name);
        let reparsed = SecretName::parse(&original.resource_path(), None).unwrap();
        prop_assert_eq!(reparsed, original);
    }

    /// The slash tuple and the canonical path parse identically
    #[test]
    fn tuple_form_matches_canonical(
        project in arb_project(),
        location in arb_location(),
        name in arb_resource_id()
    ) {
        let canonical = format!(
            "projects/{}/locations/{}/keyRings/{}",
            project, location, name
        );
        let tuple = format!("{}/{}/{}", project, location, name);

        let from_canonical = KeyRingName::parse(&canonical, None).unwrap();
        let from_tuple = KeyRingName::parse(&tuple, None).unwrap();
        prop_assert_eq!(from_canonical, from_tuple);
    }

    /// The without-project short form equals the tuple form with the default
    /// project filled in
    #[test]
    fn short_form_uses_default_project(
        project in arb_project(),
        location in arb_location(),
        name in arb_resource_id()
    ) {
        let short = format!("{}/{}", location, name);
        let tuple = format!("{}/{}/{}", project, location, name);

        let from_short = NodeName::parse(&short, Some(&project)).unwrap();
        let from_tuple = NodeName::parse(&tuple, None).unwrap();
        prop_assert_eq!(from_short, from_tuple);
    }

    /// The short form without a configured default project always fails with
    /// the configuration error, never a parse error
    #[test]
    fn short_form_without_default_project_fails(
        location in arb_location(),
        name in arb_resource_id()
    ) {
        let short = format!("{}/{}", location, name);
        let err = SecretName::parse(&short, None).unwrap_err();
        prop_assert_eq!(err, NameError::MissingDefaultProject);
    }

    /// Self links reduce to the same name as the relative path
    #[test]
    fn self_link_matches_relative_path(
        project in arb_project(),
        location in arb_location(),
        name in arb_resource_id()
    ) {
        let relative = format!(
            "projects/{}/locations/{}/secrets/{}",
            project, location, name
        );
        let link = format!(
            "https://secretmanager.{}.rep.googleapis.com/v1/{}",
            location, relative
        );

        let from_link = SecretName::parse(&link, None).unwrap();
        let from_relative = SecretName::parse(&relative, None).unwrap();
        prop_assert_eq!(from_link, from_relative);
    }

    /// Nested names (key ring + crypto key) round trip through every form
    #[test]
    fn crypto_key_forms_converge(
        project in arb_project(),
        location in arb_location(),
        ring in arb_resource_id(),
        key in arb_resource_id()
    ) {
        let canonical = format!(
            "projects/{}/locations/{}/keyRings/{}/cryptoKeys/{}",
            project, location, ring, key
        );
        let tuple = format!("{}/{}/{}/{}", project, location, ring, key);
        let short = format!("{}/{}/{}", location, ring, key);

        let from_canonical = CryptoKeyName::parse(&canonical, None).unwrap();
        let from_tuple = CryptoKeyName::parse(&tuple, None).unwrap();
        let from_short = CryptoKeyName::parse(&short, Some(&project)).unwrap();

        prop_assert_eq!(&from_canonical, &from_tuple);
        prop_assert_eq!(&from_canonical, &from_short);
        prop_assert_eq!(from_canonical.resource_path(), canonical);
    }

    /// Display output is always the canonical path
    #[test]
    fn display_is_canonical(
        project in arb_project(),
        location in arb_location(),
        name in arb_resource_id()
    ) {
        let parsed = SecretName::new(&project, &location, &name);
        prop_assert_eq!(parsed.to_string(), parsed.resource_path());
    }
}
