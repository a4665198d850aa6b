//! **DomainResolver** (spec §4.3): environment lookup by host,
//! primary/satellite classification, and redirect-URL validation.

pub mod environment;
pub mod redirect;
pub mod resolver;

pub use environment::{Application, AuthConfig, Domain, DomainKind, Environment, Instance};
pub use redirect::validate_redirect_url;
pub use resolver::{DomainResolveError, DomainResolver, EnvironmentLookup};
