//! **CookieCodec & Handshake** (spec §4.1): the signed auth cookie, rotation,
//! and the cookie-payload handshake exchange.

pub mod codec;
pub mod handshake;
pub mod names;

pub use codec::{ClientResolver, CookieClaims, CookieCodec, Environment as CookieEnvironment};
pub use handshake::{HandshakeBuilder, HandshakeDelivery, HandshakePayload};
