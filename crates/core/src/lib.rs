//! Core identifier types for the quasar automation engine.
//!
//! Every entity id is a [`domain-key`](https://crates.io/crates/domain-key)
//! `Uuid<D>` wrapper parameterized by a unique domain marker, so that a
//! `RunId` can never be passed where an `AutomationId` is expected.

pub mod id;

pub use id::{ActionId, AutomationId, OrganizationId, ProjectId, RunId, StepId};
