//! `clerk-core`: a multi-tenant authentication and session-management core.
//!
//! The crate is organized around the data plane (`domain`, `store`), the
//! cookie/handshake wire protocol (`cookie`), the JWT claim engine
//! (`token`), the two flow state machines (`sign_in`, `sign_up`), and the
//! cross-cutting concerns layered on top (`multidomain`, `cascade`,
//! `domain_resolver`, `external_account`). `routes` is the thin HTTP
//! adapter a deployment wires these behind.

pub mod cascade;
pub mod config;
pub mod cookie;
pub mod domain;
pub mod domain_resolver;
pub mod error;
pub mod external_account;
pub mod routes;
pub mod sign_in;
pub mod sign_up;
pub mod store;
pub mod telemetry;
pub mod token;
pub mod multidomain;

pub use error::CoreError;
