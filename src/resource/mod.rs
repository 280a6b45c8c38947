//! Resource handler support
//!
//! The service modules under [`crate::services`] expose plain async CRUD
//! functions over a [`crate::state::ResourceState`]. This module carries the
//! pieces they share:
//!
//! - [`pager`] - paginated list fetch following `nextPageToken`
//! - [`mapping`] - flatten/expand helpers between wire JSON and state
//! - [`ReadOutcome`] and the not-found drift translation

pub mod mapping;
pub mod pager;

use crate::gcp::http::HttpError;
use crate::state::ResourceState;
use anyhow::Result;

/// Result of a read handler.
///
/// `Removed` means the server answered 404: the resource is gone and has been
/// cleared from state so a subsequent apply recreates it instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Present,
    Removed,
}

/// Whether an error chain bottoms out in a 404 transport error
pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<HttpError>()
        .map(HttpError::is_not_found)
        .unwrap_or(false)
}

/// Build an `updateMask` from the state diff.
///
/// `fields` maps updatable state attributes to their wire field paths; the
/// result keeps the order of `fields` and contains the paths whose state
/// attribute changed against `prior` (in either direction).
pub fn update_mask(
    state: &ResourceState,
    prior: &ResourceState,
    fields: &[(&str, &'static str)],
) -> Vec<&'static str> {
    let changed = state.changed_keys(prior);
    fields
        .iter()
        .filter(|(state_key, _)| changed.iter().any(|c| c == state_key))
        .map(|&(_, wire_field)| wire_field)
        .collect()
}

/// Translate a read failure: a 404 clears the state and reports `Removed`,
/// anything else propagates wrapped with the resource description.
pub fn handle_not_found(
    err: anyhow::Error,
    state: &mut ResourceState,
    what: &str,
) -> Result<ReadOutcome> {
    if is_not_found(&err) {
        tracing::warn!("{} was not found, removing from state", what);
        state.clear();
        return Ok(ReadOutcome::Removed);
    }
    Err(err.context(format!("error reading {}", what)))
}
