//! HTTP surface over an [`appmetrics::Registry`].
//!
//! Mounts the registry's resources (list/create/observe/delete metrics, list
//! tags, tag/untag, expand a tag into snapshots) at a configurable root,
//! defaulting to `/_app-metrics`. This crate only talks to the registry's
//! public API; it never reaches into instrument internals.

mod dispatch;
mod error;
mod server;

pub use dispatch::{dispatch, DispatchResponse, Method};
pub use error::BuildError;
pub use server::{HttpExporter, DEFAULT_ROOT};
