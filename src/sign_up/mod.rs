//! **SignUpMachine** (spec §4.7): progressive attribute intake, captcha
//! gating, and finalization into a User + active Session.

pub mod attributes;
pub mod captcha;
pub mod machine;
pub mod strategies;

pub use attributes::{add_to_sign_up, missing_required_attributes};
pub use captcha::{verify_captcha, CaptchaClient, CaptchaRequest, FakeCaptchaClient};
pub use machine::{CreateSignUpRequest, FinalizeOutcome, SignUpMachine};
