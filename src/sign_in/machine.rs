use chrono::{Duration, Utc};
use rand::RngCore;

use crate::cookie::codec::CookieCodec;
use crate::domain::identification::IdentificationType;
use crate::domain::verification::{Strategy, Verification, VerificationStatus};
use crate::domain::{Client, SignIn, TypedId};
use crate::error::CoreError;
use crate::store::{ClientStore, FlowStore, StoreContext};

use super::convert::{ConvertToSessionOutcome, ConvertToSessionRequest, SessionConverter};
use super::strategies::{CodeDelivery, IdentifierPolicy, PasswordVerifier};

fn new_id(prefix: &str) -> TypedId {
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut bytes);
    TypedId::new(format!("{prefix}_{}", hex::encode(bytes)))
}

fn guess_identifier_kind(identifier: &str) -> IdentificationType {
    if identifier.contains('@') {
        IdentificationType::EmailAddress
    } else if identifier.starts_with('+') || identifier.chars().all(|c| c.is_ascii_digit()) {
        IdentificationType::PhoneNumber
    } else {
        IdentificationType::Username
    }
}

/// The client-observable state of an in-progress SignIn (spec §4.6), derived
/// from the persisted `SignIn` row rather than stored directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignInState {
    NeedsIdentifier,
    NeedsFirstFactor,
    NeedsSecondFactor,
    NeedsNewPassword,
    Complete,
    Abandoned,
}

pub fn derive_state(sign_in: &SignIn, now: chrono::DateTime<Utc>, requires_second_factor: bool) -> SignInState {
    if sign_in.is_abandoned(now) {
        return SignInState::Abandoned;
    }
    if sign_in.created_session_id.is_some() {
        return SignInState::Complete;
    }
    if sign_in.new_password_digest.is_some() {
        return SignInState::NeedsNewPassword;
    }
    if sign_in.identification_id.is_none() {
        return SignInState::NeedsIdentifier;
    }
    if !sign_in.has_first_factor_success() {
        return SignInState::NeedsFirstFactor;
    }
    if requires_second_factor && sign_in.second_factor_success_verification_id.is_none() {
        return SignInState::NeedsSecondFactor;
    }
    SignInState::Complete
}

pub struct CreateSignInRequest {
    pub instance_id: TypedId,
    pub client: Option<Client>,
    pub identifier: Option<String>,
    pub strategy: Option<Strategy>,
    pub password: Option<String>,
    pub proof: Option<String>,
    pub transfer: bool,
    pub single_session_mode: bool,
    pub actor_token_id: Option<TypedId>,
    pub origin: Option<String>,
}

#[derive(Debug)]
pub enum CreateSignInOutcome {
    Pending { sign_in: SignIn, client: Client, state: SignInState },
    Converted { sign_in: SignIn, outcome: ConvertToSessionOutcome },
}

/// Orchestrates SignIn Create/Update/Prepare/Attempt (spec §4.6) on top of
/// `ClientStore` (Client/Session) and `FlowStore` (everything else).
pub struct SignInMachine<'a> {
    pub store: &'a ClientStore,
    pub flow_store: &'a dyn FlowStore,
    pub password_verifier: &'a dyn PasswordVerifier,
    pub code_delivery: &'a dyn CodeDelivery,
    pub identifier_policy: &'a dyn IdentifierPolicy,
    pub converter: SessionConverter<'a>,
    pub sign_in_ttl: Duration,
    pub verification_ttl: Duration,
    pub max_attempts: u32,
}

impl<'a> SignInMachine<'a> {
    pub async fn create(&self, ctx: &StoreContext, req: CreateSignInRequest) -> Result<CreateSignInOutcome, CoreError> {
        let CreateSignInRequest {
            instance_id,
            client,
            identifier,
            strategy,
            password,
            proof,
            transfer,
            single_session_mode,
            actor_token_id,
            origin,
        } = req;

        // Step 1: single-session-mode guard.
        let mut client = match client {
            Some(client) => {
                if single_session_mode {
                    let active = self.store.list_client_sessions(&instance_id, &client.id, true).await?;
                    if active.iter().any(|s| s.is_active()) {
                        return Err(CoreError::SingleModeSessionExists);
                    }
                }
                client
            }
            None => {
                // Step 3 (client leg): create a new Client if none exists.
                let client = Client::new(new_id("client"), instance_id.clone(), CookieCodec::new_rotating_token(), String::new());
                self.store.create_client(ctx, client).await?
            }
        };

        // Step 2: detach any prior SignIn from the Client.
        if let Some(prior_id) = client.sign_in_id.take() {
            if let Some(mut prior) = self.flow_store.find_sign_in(&instance_id, &prior_id).await? {
                prior.abandon_at = Utc::now();
                self.flow_store.update_sign_in(prior).await?;
            }
        }

        // Step 3: fresh SignIn, attached to the Client.
        let mut sign_in = SignIn::new(new_id("sin"), instance_id.clone(), client.id.clone(), self.sign_in_ttl);

        // Step 4: transfer.
        if transfer {
            let transfer_id = client.to_sign_in_account_transfer_id.take().ok_or(CoreError::AccountTransferInvalid)?;
            let transfer_sign_in = self
                .flow_store
                .find_sign_in(&instance_id, &transfer_id)
                .await?
                .ok_or(CoreError::AccountTransferInvalid)?;
            sign_in.identification_id = transfer_sign_in.identification_id;
            sign_in.identifier_strategy = transfer_sign_in.identifier_strategy;
            sign_in.first_factor_success_verification_id = transfer_sign_in.first_factor_success_verification_id;
        }

        // Step 5: identifier dispatch.
        if let Some(identifier) = &identifier {
            let kind = guess_identifier_kind(identifier);
            if let Some(identification) = self.flow_store.find_identification_by_value(&instance_id, kind, identifier).await? {
                sign_in.identification_id = Some(identification.id);
            }
        }

        client.sign_in_id = Some(sign_in.id.clone());
        let client = self.store.update_client(ctx, client).await?;
        let sign_in = self.flow_store.create_sign_in(sign_in).await?;

        // Step 6: lockout + restriction checks.
        let mut user = None;
        if let Some(identification_id) = &sign_in.identification_id {
            let identification = self
                .flow_store
                .find_identification(&instance_id, identification_id)
                .await?
                .ok_or(CoreError::IdentificationBelongsToDifferentUser)?;
            if let Some(user_id) = &identification.user_id {
                let found = self.flow_store.find_user(&instance_id, user_id).await?.ok_or(CoreError::ErrUserNotFound)?;
                if found.is_locked(Utc::now()) {
                    return Err(CoreError::AccountLocked);
                }
                if let Some(identifier) = &identification.identifier {
                    if !self.identifier_policy.is_allowed(identifier).await? {
                        return Err(CoreError::IdentifierNotAllowedAccess);
                    }
                }
                user = Some(found);
            }
        }

        // Step 7+8: strategy dispatch.
        let mut sign_in = sign_in;
        if let Some(strategy) = strategy {
            sign_in = self.dispatch_first_factor(&instance_id, sign_in, strategy, password.as_deref(), proof.as_deref(), user.as_ref()).await?;
        }

        // Step 9: ready-to-convert.
        let requires_second_factor = user.as_ref().is_some_and(|u| u.two_factor_enabled);
        let state = derive_state(&sign_in, Utc::now(), requires_second_factor);

        if state == SignInState::Complete {
            if let Some(user) = user {
                let outcome = self
                    .converter
                    .convert(
                        ctx,
                        ConvertToSessionRequest {
                            client: self.store.find_client(ctx, &instance_id, &sign_in.client_id).await?.ok_or(CoreError::ClientNotFoundInRequest)?,
                            user,
                            sign_in: Some(&sign_in),
                            actor: actor_token_id.map(|id| serde_json::json!({ "sub": id.to_string() })),
                            single_session_mode,
                            sign_out_of_other_sessions: sign_in.sign_out_of_other_sessions,
                            new_password_digest: sign_in.new_password_digest.clone(),
                        },
                    )
                    .await?;

                let mut sign_in = sign_in;
                sign_in.created_session_id = Some(outcome.session.id.clone());
                let sign_in = self.flow_store.update_sign_in(sign_in).await?;
                return Ok(CreateSignInOutcome::Converted { sign_in, outcome });
            }
        }

        Ok(CreateSignInOutcome::Pending { client, state, sign_in })
    }

    /// Prepare or Attempt a first factor against an already-attached SignIn
    /// (spec §4.6 "Update/Prepare/Attempt... operate on an existing SignIn").
    pub async fn attempt_first_factor(
        &self,
        instance_id: &TypedId,
        sign_in: SignIn,
        strategy: Strategy,
        password: Option<&str>,
        proof: Option<&str>,
    ) -> Result<SignIn, CoreError> {
        let user = match &sign_in.identification_id {
            Some(identification_id) => {
                let identification = self
                    .flow_store
                    .find_identification(instance_id, identification_id)
                    .await?
                    .ok_or(CoreError::IdentificationBelongsToDifferentUser)?;
                match &identification.user_id {
                    Some(user_id) => self.flow_store.find_user(instance_id, user_id).await?,
                    None => None,
                }
            }
            None => None,
        };
        self.dispatch_first_factor(instance_id, sign_in, strategy, password, proof, user.as_ref()).await
    }

    async fn dispatch_first_factor(
        &self,
        instance_id: &TypedId,
        mut sign_in: SignIn,
        strategy: Strategy,
        password: Option<&str>,
        proof: Option<&str>,
        user: Option<&crate::domain::User>,
    ) -> Result<SignIn, CoreError> {
        sign_in.identifier_strategy = Some(strategy);

        if strategy.is_preparable() {
            let nonce = if matches!(strategy, Strategy::EmailCode | Strategy::PhoneCode | Strategy::ResetPasswordEmailCode | Strategy::ResetPasswordPhoneCode) {
                Some(super::strategies::new_numeric_code())
            } else {
                None
            };
            if let (Some(code), Some(identification_id)) = (&nonce, &sign_in.identification_id) {
                if let Some(identification) = self.flow_store.find_identification(instance_id, identification_id).await? {
                    if let Some(identifier) = &identification.identifier {
                        self.code_delivery.send(identifier, code).await?;
                    }
                }
            }
            let verification = Verification {
                id: new_id("ver"),
                instance_id: instance_id.clone(),
                identification_id: sign_in.identification_id.clone(),
                strategy,
                status: VerificationStatus::Unverified,
                attempts: 0,
                max_attempts: self.max_attempts,
                expire_at: Utc::now() + self.verification_ttl,
                nonce,
                external_account_transfer_id: None,
                token: None,
                error: None,
                verified_at_client: Some(sign_in.client_id.clone()),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            let verification = self.flow_store.create_verification(verification).await?;
            sign_in.first_factor_current_verification_id = Some(verification.id);
            return Ok(self.flow_store.update_sign_in(sign_in).await?);
        }

        if strategy.is_attemptable() {
            let mut password_failure = None;
            let success = match strategy {
                Strategy::Password => match (user.and_then(|u| u.password_digest.as_deref()), password) {
                    (Some(digest), Some(candidate)) => {
                        if self.password_verifier.is_pwned(candidate).await? {
                            password_failure = Some(CoreError::PwnedPassword);
                            false
                        } else if self.password_verifier.verify(digest, candidate).await? {
                            true
                        } else {
                            password_failure = Some(CoreError::InvalidPassword);
                            false
                        }
                    }
                    _ => {
                        password_failure = Some(CoreError::InvalidPassword);
                        false
                    }
                },
                Strategy::EmailCode | Strategy::PhoneCode | Strategy::ResetPasswordEmailCode | Strategy::ResetPasswordPhoneCode => {
                    match sign_in.first_factor_current_verification_id.clone() {
                        Some(verification_id) => self.check_code(instance_id, &verification_id, proof).await?,
                        None => false,
                    }
                }
                _ => proof.is_some(),
            };

            // Step 8: invalid-password/pwned-password attempts are surfaced
            // but not rolled back — the failed Verification is persisted and
            // attached before the error reaches the caller.
            if let Some(err) = password_failure {
                let mut verification = Verification {
                    id: new_id("ver"),
                    instance_id: instance_id.clone(),
                    identification_id: sign_in.identification_id.clone(),
                    strategy,
                    status: VerificationStatus::Unverified,
                    attempts: 0,
                    max_attempts: self.max_attempts,
                    expire_at: Utc::now() + self.verification_ttl,
                    nonce: None,
                    external_account_transfer_id: None,
                    token: None,
                    error: None,
                    verified_at_client: Some(sign_in.client_id.clone()),
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                };
                verification.record_failure(err.to_string());
                let verification = self.flow_store.create_verification(verification).await?;
                sign_in.first_factor_current_verification_id = Some(verification.id);
                self.flow_store.update_sign_in(sign_in).await?;
                return Err(err);
            }

            if success {
                let verification = Verification {
                    id: new_id("ver"),
                    instance_id: instance_id.clone(),
                    identification_id: sign_in.identification_id.clone(),
                    strategy,
                    status: VerificationStatus::Verified,
                    attempts: 1,
                    max_attempts: self.max_attempts,
                    expire_at: Utc::now() + self.verification_ttl,
                    nonce: None,
                    external_account_transfer_id: None,
                    token: None,
                    error: None,
                    verified_at_client: Some(sign_in.client_id.clone()),
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                };
                let verification = self.flow_store.create_verification(verification).await?;
                sign_in.first_factor_success_verification_id = Some(verification.id);
            }
        }

        Ok(self.flow_store.update_sign_in(sign_in).await?)
    }

    async fn check_code(&self, instance_id: &TypedId, verification_id: &TypedId, proof: Option<&str>) -> Result<bool, CoreError> {
        let mut verification = match self.flow_store.find_verification(instance_id, verification_id).await? {
            Some(v) => v,
            None => return Ok(false),
        };
        if verification.is_expired(Utc::now()) {
            return Ok(false);
        }
        let matches = match (&verification.nonce, proof) {
            (Some(nonce), Some(candidate)) => nonce == candidate,
            _ => false,
        };
        if matches {
            verification.record_success();
        } else {
            verification.record_failure("code did not match");
        }
        self.flow_store.update_verification(verification).await?;
        Ok(matches)
    }

    /// Reset-password flow (spec §4.6 "Reset password"): only valid from
    /// `needs_new_password`; stores the new digest on the SignIn for
    /// `ConvertToSession` to migrate onto the User.
    pub async fn set_new_password(&self, mut sign_in: SignIn, new_digest: String, sign_out_of_other_sessions: bool) -> Result<SignIn, CoreError> {
        sign_in.new_password_digest = Some(new_digest);
        sign_in.sign_out_of_other_sessions = sign_out_of_other_sessions;
        Ok(self.flow_store.update_sign_in(sign_in).await?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_identification_means_needs_identifier() {
        let sign_in = SignIn::new(TypedId::new("sin_1"), TypedId::new("ins_1"), TypedId::new("client_1"), Duration::minutes(10));
        assert_eq!(derive_state(&sign_in, Utc::now(), false), SignInState::NeedsIdentifier);
    }

    #[test]
    fn abandoned_past_ttl_overrides_everything() {
        let mut sign_in = SignIn::new(TypedId::new("sin_1"), TypedId::new("ins_1"), TypedId::new("client_1"), Duration::minutes(-10));
        sign_in.identification_id = Some(TypedId::new("idn_1"));
        assert_eq!(derive_state(&sign_in, Utc::now(), false), SignInState::Abandoned);
    }

    #[test]
    fn second_factor_required_when_user_has_2fa() {
        let mut sign_in = SignIn::new(TypedId::new("sin_1"), TypedId::new("ins_1"), TypedId::new("client_1"), Duration::minutes(10));
        sign_in.identification_id = Some(TypedId::new("idn_1"));
        sign_in.first_factor_success_verification_id = Some(TypedId::new("ver_1"));
        assert_eq!(derive_state(&sign_in, Utc::now(), true), SignInState::NeedsSecondFactor);
        sign_in.second_factor_success_verification_id = Some(TypedId::new("ver_2"));
        assert_eq!(derive_state(&sign_in, Utc::now(), true), SignInState::Complete);
    }
}
