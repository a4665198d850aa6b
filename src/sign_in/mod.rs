//! **SignInMachine** (spec §4.6): identifier resolution, first/second-factor
//! dispatch, and conversion into an active [`crate::domain::Session`].

pub mod convert;
pub mod factors;
pub mod machine;
pub mod strategies;

pub use convert::{ConvertToSessionOutcome, ConvertToSessionRequest, SessionConverter};
pub use factors::{enumerate_first_factors, FirstFactorOption};
pub use machine::{derive_state, CreateSignInOutcome, CreateSignInRequest, SignInMachine, SignInState};
pub use strategies::{new_numeric_code, CodeDelivery, FakePasswordVerifier, IdentifierPolicy, NullCodeDelivery, NullIdentifierPolicy, PasswordVerifier};
