//! A schema-driven editing engine for Kubernetes custom resources.
//!
//! Hosts point an [`sync::EditController`] at one resource and get the full
//! edit-and-submit lifecycle: the structural schema ([`schema`]) and the
//! presentation schema ([`ui`]) are interpreted into a renderable form
//! ([`render`]), wizard steps narrow the presentation schema to a set of
//! visible paths ([`visibility`]), edited trees are sanitized before they go
//! anywhere near the backend ([`prune`]), and the controller merges edits
//! into the live object with optimistic-concurrency staleness tracking
//! ([`sync`]). The network itself stays behind the [`client`] traits.

pub mod client;
pub mod path;
pub mod prune;
pub mod raw;
pub mod render;
pub mod schema;
pub mod sync;
pub mod ui;
pub mod visibility;

// External re-exports
pub use kube;
