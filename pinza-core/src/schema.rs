//! # Schema Definitions
//!
//! Static metadata describing messages and services, and the [`Bundle`] container that
//! carries them into a [`Registry`](crate::registry::Registry).
//!
//! Every definition is a plain, enumerable data structure identified by a fully qualified
//! dotted name (e.g. `dropbox.core.v1.Account`). Bundles can be read from a JSON document or
//! imported from a compiled protobuf `FileDescriptorSet`.
mod bundle;
mod types;

pub use bundle::*;
pub use types::*;
