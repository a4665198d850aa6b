//! **MultiDomainSync** (spec §4.8): satellite/primary cookie synchronization
//! via SyncNonce + short-lived link-token JWTs, and the handshake variant.

pub mod handshake_sync;
pub mod link;
pub mod sync;

pub use handshake_sync::{build_handshake_redirect, build_handshake_sync_redirect, HANDSHAKE_SYNC_ALLOW_ORIGIN};
pub use link::{consume_link_token, LinkOutcome};
pub use sync::{append_synced_marker, build_link_redirect, build_satellite_redirect, create_sync_nonce_and_link_token, LinkTokenClaims};
