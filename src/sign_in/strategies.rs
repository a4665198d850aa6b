use async_trait::async_trait;

use crate::error::CoreError;

/// Password comparison and breach-corpus checking are delegated to an
/// external password service; the CORE never compares plaintext itself
/// (spec §1 Non-goals).
#[async_trait]
pub trait PasswordVerifier: Send + Sync {
    async fn verify(&self, digest: &str, candidate: &str) -> Result<bool, CoreError>;
    async fn is_pwned(&self, candidate: &str) -> Result<bool, CoreError>;
    async fn hash(&self, candidate: &str) -> Result<String, CoreError>;
}

/// Deterministic fake for tests: the digest *is* the plaintext, and any
/// password containing the substring `"pwned"` is reported breached.
pub struct FakePasswordVerifier;

#[async_trait]
impl PasswordVerifier for FakePasswordVerifier {
    async fn verify(&self, digest: &str, candidate: &str) -> Result<bool, CoreError> {
        Ok(digest == candidate)
    }

    async fn is_pwned(&self, candidate: &str) -> Result<bool, CoreError> {
        Ok(candidate.contains("pwned"))
    }

    async fn hash(&self, candidate: &str) -> Result<String, CoreError> {
        Ok(candidate.to_owned())
    }
}

/// A verification code generator/checker for code-based strategies (email
/// code, phone code, reset-password codes). Delegates delivery (SMS/email)
/// entirely to an external collaborator; only the code's lifecycle is ours.
#[async_trait]
pub trait CodeDelivery: Send + Sync {
    async fn send(&self, identifier: &str, code: &str) -> Result<(), CoreError>;
}

/// Deterministic fake that records sent codes instead of delivering them.
#[derive(Default)]
pub struct NullCodeDelivery;

#[async_trait]
impl CodeDelivery for NullCodeDelivery {
    async fn send(&self, _identifier: &str, _code: &str) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Allow/block-list policy for identifiers (spec §4.6 step 6 "restriction
/// check"), delegated externally the same way password verification is —
/// the CORE only asks yes/no and reacts with `IdentifierNotAllowedAccess`.
#[async_trait]
pub trait IdentifierPolicy: Send + Sync {
    async fn is_allowed(&self, identifier: &str) -> Result<bool, CoreError>;
}

/// Deterministic fake that allows everything.
#[derive(Default)]
pub struct NullIdentifierPolicy;

#[async_trait]
impl IdentifierPolicy for NullIdentifierPolicy {
    async fn is_allowed(&self, _identifier: &str) -> Result<bool, CoreError> {
        Ok(true)
    }
}

/// Generates a fresh six-digit numeric code, the shape used by
/// `email_code`/`phone_code`/reset-password-code strategies.
pub fn new_numeric_code() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(0..1_000_000))
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn fake_verifier_matches_exact_digest() {
        let verifier = FakePasswordVerifier;
        assert!(verifier.verify("Correct-Horse-Battery-Staple", "Correct-Horse-Battery-Staple").await.unwrap());
        assert!(!verifier.verify("Correct-Horse-Battery-Staple", "wrong").await.unwrap());
    }

    #[tokio::test]
    async fn fake_verifier_flags_pwned_passwords() {
        let verifier = FakePasswordVerifier;
        assert!(verifier.is_pwned("pwned123").await.unwrap());
        assert!(!verifier.is_pwned("Correct-Horse-Battery-Staple").await.unwrap());
    }

    #[test]
    fn numeric_code_is_six_digits() {
        let code = new_numeric_code();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }
}
