//! Reference reachability over content projects.
//!
//! Given a set of needle objects, [`search::Engine`] walks every object
//! reachable from the host's root scopes and records, as a
//! [`graph::ReferenceGraph`], each path that ends at a needle.

pub mod cache;
pub mod config;
pub mod error;
pub mod graph;
pub mod host;
pub mod introspect;
pub mod model;
pub mod project;
pub mod query;
pub mod search;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ReadError, RefHuntError};
pub use host::{Host, RootScope};
pub use search::{Engine, SearchParameters, SearchResult};
