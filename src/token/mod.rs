//! **TokenTemplater & SessionTokenService** (spec §4.4-§4.5): the `{{ }}`
//! shortcode engine and the session-token issuance path built on top of it.

pub mod session_token;
pub mod shortcodes;
pub mod templater;

pub use session_token::SessionTokenService;
pub use shortcodes::{OrgClaimsData, OrgMembershipClaimsData, SessionClaimsData, TemplateContext, UserClaimsData};
pub use templater::TokenTemplater;
