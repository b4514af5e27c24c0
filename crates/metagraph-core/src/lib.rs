//! Entity metadata graph builder and validator.
//!
//! Discovers the closed set of entity types reachable from a root set
//! ([`registry::EntityRegistry`]), computes known-type closures and inherited
//! composition parent lists, validates the result, and exposes it through
//! [`graph::EntityGraph`]. Types are described explicitly by a
//! [`schema::Schema`] rather than reflected.

pub mod closure;
pub mod composition;
pub mod config;
pub mod error;
pub mod graph;
pub mod introspect;
pub mod model;
pub mod providers;
pub mod registry;
pub mod schema;
pub mod validate;
pub mod view;
