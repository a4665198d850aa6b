//! The CORE's persisted data model (spec §3): Client, Session, SignIn,
//! SignUp, Identification, Verification, SyncNonce, DevBrowser, JwtTemplate.

pub mod billing;
pub mod client;
pub mod dev_browser;
pub mod identification;
pub mod ids;
pub mod jwt_template;
pub mod session;
pub mod sign_in;
pub mod sign_up;
pub mod sync_nonce;
pub mod user;
pub mod verification;

pub use billing::BillingSubscription;
pub use client::Client;
pub use dev_browser::DevBrowser;
pub use identification::{Identification, IdentificationStatus, IdentificationType, Tristate};
pub use ids::TypedId;
pub use jwt_template::JwtTemplate;
pub use session::{Session, SessionStatus};
pub use sign_in::{SignIn, SignInStatus};
pub use sign_up::{SignUp, SignUpAttribute, SignUpStatus};
pub use sync_nonce::SyncNonce;
pub use user::User;
pub use verification::{Strategy, Verification, VerificationStatus};
