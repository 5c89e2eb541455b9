//! Import the global RIB of a GoBGP route server into a looking glass
//! prefix database.
//!
//! Destinations are streamed over GoBGP's gRPC `ListPath` API, decoded
//! field by field, normalized into [`paths::CanonicalRoute`]s and stored
//! with the name of their source AS.

pub mod asn;
pub mod config;
pub mod db;
pub mod importer;
pub mod paths;
pub mod source;
pub mod utils;

#[cfg(feature = "cli")]
pub mod cli;
