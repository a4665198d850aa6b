use chrono::{Duration, Utc};
use rand::RngCore;

use crate::cookie::codec::CookieCodec;
use crate::domain::identification::{IdentificationStatus, IdentificationType, Tristate};
use crate::domain::verification::Strategy;
use crate::domain::{Client, Identification, SignIn, SignUp, TypedId, User};
use crate::error::CoreError;
use crate::sign_in::{ConvertToSessionOutcome, ConvertToSessionRequest, SessionConverter};
use crate::store::{ClientStore, FlowStore, StoreContext};

fn new_id(prefix: &str) -> TypedId {
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut bytes);
    TypedId::new(format!("{prefix}_{}", hex::encode(bytes)))
}

pub struct CreateSignUpRequest {
    pub instance_id: TypedId,
    pub client: Option<Client>,
    pub transfer: bool,
}

pub enum FinalizeOutcome {
    /// Converted into a Session.
    Converted { sign_up: SignUp, outcome: ConvertToSessionOutcome },
    /// A reserved identification belonged to someone else: the SignUp is
    /// irrecoverable and the Client's `sign_up_id` has been cleared.
    IdentificationClaimed,
}

/// Orchestrates SignUp Create/transfer/Finalize (spec §4.7) on top of
/// `ClientStore`/`FlowStore`, reusing `SessionConverter` for the final
/// conversion step.
pub struct SignUpMachine<'a> {
    pub store: &'a ClientStore,
    pub flow_store: &'a dyn FlowStore,
    pub converter: SessionConverter<'a>,
    pub sign_up_ttl: Duration,
}

impl<'a> SignUpMachine<'a> {
    pub async fn create(&self, ctx: &StoreContext, req: CreateSignUpRequest) -> Result<(Client, SignUp), CoreError> {
        let CreateSignUpRequest { instance_id, client, transfer } = req;

        let mut client = match client {
            Some(client) => client,
            None => {
                let client = Client::new(new_id("client"), instance_id.clone(), CookieCodec::new_rotating_token(), String::new());
                self.store.create_client(ctx, client).await?
            }
        };

        if let Some(prior_id) = client.sign_up_id.take() {
            if let Some(mut prior) = self.flow_store.find_sign_up(&instance_id, &prior_id).await? {
                prior.abandon_at = Utc::now();
                self.flow_store.update_sign_up(prior).await?;
            }
        }

        let mut sign_up = SignUp::new(new_id("sup"), instance_id.clone(), client.id.clone(), self.sign_up_ttl);

        if transfer {
            let transfer_id = client.to_sign_up_account_transfer_id.take().ok_or(CoreError::AccountTransferInvalid)?;
            let mut linked_sign_in = self
                .flow_store
                .find_sign_in(&instance_id, &transfer_id)
                .await?
                .ok_or(CoreError::AccountTransferInvalid)?;

            sign_up.external_account_identification_id = linked_sign_in.external_account_identification_id.clone();
            sign_up.successful_saml_identification_id = linked_sign_in.successful_saml_identification_id.clone();

            // Clear the verification on the linked sign-in: it has been
            // consumed by the transfer (spec §4.7 "Transfer from sign-in").
            linked_sign_in.first_factor_current_verification_id = None;
            self.flow_store.update_sign_in(linked_sign_in).await?;
        }

        client.sign_up_id = Some(sign_up.id.clone());
        let client = self.store.update_client(ctx, client).await?;
        let sign_up = self.flow_store.create_sign_up(sign_up).await?;

        Ok((client, sign_up))
    }

    /// Creates (or reconciles) the User, promotes reserved identifications,
    /// and converts into a Session (spec §4.7 "Finalize").
    pub async fn finalize(&self, ctx: &StoreContext, mut client: Client, sign_up: SignUp, single_session_mode: bool) -> Result<FinalizeOutcome, CoreError> {
        // Ticket transfer, SAML/OAuth sign-up -> sign-in (spec §8 scenario 2):
        // a fresh SignUp whose external identification's email already
        // belongs to a different, verified user is not persisted as a new
        // account. Instead an AccountTransfer SignIn carrying that
        // identification is recorded and the Client is pointed at it, so the
        // UI's follow-up `POST /sign_ins {transfer:true}` lands on the
        // existing user.
        if sign_up.created_user_id.is_none() {
            if let Some((existing, strategy, err)) = self.detect_account_transfer(&sign_up).await? {
                let transfer = SignIn {
                    identification_id: Some(existing.id.clone()),
                    identifier_strategy: Some(strategy),
                    first_factor_success_verification_id: existing.verification_id.clone(),
                    ..SignIn::new(new_id("sin"), sign_up.instance_id.clone(), client.id.clone(), self.sign_up_ttl)
                };
                let transfer = self.flow_store.create_sign_in(transfer).await?;
                client.to_sign_in_account_transfer_id = Some(transfer.id);
                client.sign_up_id = None;
                self.store.update_client(ctx, client).await?;
                return Err(err);
            }
        }

        let user = match self.create_or_reconcile_user(&sign_up).await {
            Ok(user) => user,
            Err(CoreError::IdentificationClaimed) => {
                client.sign_up_id = None;
                self.store.update_client(ctx, client).await?;
                return Ok(FinalizeOutcome::IdentificationClaimed);
            }
            Err(e) => return Err(e),
        };

        let outcome = self
            .converter
            .convert(
                ctx,
                ConvertToSessionRequest {
                    client,
                    user,
                    sign_in: None,
                    actor: None,
                    single_session_mode,
                    sign_out_of_other_sessions: false,
                    new_password_digest: None,
                },
            )
            .await?;

        let mut sign_up = sign_up;
        sign_up.created_session_id = Some(outcome.session.id.clone());
        sign_up.created_user_id = Some(outcome.session.user_id.clone());
        let sign_up = self.flow_store.update_sign_up(sign_up).await?;

        Ok(FinalizeOutcome::Converted { sign_up, outcome })
    }

    /// Looks up the email an external-account (SAML/OAuth) SignUp resolved
    /// to and reports whether it already belongs to a different, verified
    /// user. Returns the colliding `Identification`, the strategy the
    /// transfer SignIn should carry, and the error finalize should surface.
    async fn detect_account_transfer(&self, sign_up: &SignUp) -> Result<Option<(Identification, Strategy, CoreError)>, CoreError> {
        let (external_id, strategy, err) = match (&sign_up.successful_saml_identification_id, &sign_up.external_account_identification_id) {
            (Some(id), _) => (id, Strategy::Saml, CoreError::IdentificationExists),
            (None, Some(id)) => (id, Strategy::OauthCallback, CoreError::ExternalAccountExists),
            (None, None) => return Ok(None),
        };
        if self.flow_store.find_identification(&sign_up.instance_id, external_id).await?.is_none() {
            return Ok(None);
        }
        let Some(email) = sign_up.email_address.as_deref() else {
            return Ok(None);
        };
        let Some(existing) = self.flow_store.find_identification_by_value(&sign_up.instance_id, IdentificationType::EmailAddress, email).await? else {
            return Ok(None);
        };
        if !existing.is_verified() || existing.user_id.is_none() {
            return Ok(None);
        }
        Ok(Some((existing, strategy, err)))
    }

    async fn create_or_reconcile_user(&self, sign_up: &SignUp) -> Result<User, CoreError> {
        if let Some(existing_id) = &sign_up.created_user_id {
            return self.flow_store.find_user(&sign_up.instance_id, existing_id).await?.ok_or(CoreError::ErrUserNotFound);
        }

        let now = Utc::now();
        let user = User {
            id: new_id("user"),
            instance_id: sign_up.instance_id.clone(),
            password_digest: sign_up.password_digest.clone(),
            password_enabled: sign_up.password_digest.is_some(),
            two_factor_enabled: false,
            totp_enabled: false,
            backup_code_enabled: false,
            primary_email_identification_id: None,
            primary_phone_identification_id: None,
            primary_web3_wallet_identification_id: None,
            first_name: sign_up.first_name.clone(),
            last_name: sign_up.last_name.clone(),
            username: sign_up.username.clone(),
            image_url: None,
            locked_until: None,
            failed_verification_attempts: 0,
            public_metadata: serde_json::Value::Null,
            private_metadata: serde_json::Value::Null,
            unsafe_metadata: serde_json::Value::Null,
            external_id: None,
            created_at: now,
            updated_at: now,
        };
        let user = self.flow_store.create_user(user).await?;

        if let Some(email) = &sign_up.email_address {
            self.promote_or_create(&sign_up.instance_id, &user.id, IdentificationType::EmailAddress, email).await?;
        }
        if let Some(phone) = &sign_up.phone_number {
            self.promote_or_create(&sign_up.instance_id, &user.id, IdentificationType::PhoneNumber, phone).await?;
        }
        if let Some(wallet) = &sign_up.web3_wallet {
            self.promote_or_create(&sign_up.instance_id, &user.id, IdentificationType::Web3Wallet, wallet).await?;
        }

        Ok(user)
    }

    async fn promote_or_create(
        &self,
        instance_id: &TypedId,
        user_id: &TypedId,
        kind: IdentificationType,
        identifier: &str,
    ) -> Result<Identification, CoreError> {
        if let Some(mut existing) = self.flow_store.find_identification_by_value(instance_id, kind, identifier).await? {
            if existing.is_reserved() {
                existing.status = IdentificationStatus::Verified;
                existing.user_id = Some(user_id.clone());
                existing.updated_at = Utc::now();
                return Ok(self.flow_store.update_identification(existing).await?);
            }
            if existing.user_id.as_ref() != Some(user_id) {
                return Err(CoreError::IdentificationClaimed);
            }
            return Ok(existing);
        }

        let now = Utc::now();
        let identification = Identification {
            id: new_id("idn"),
            instance_id: instance_id.clone(),
            user_id: Some(user_id.clone()),
            kind,
            identifier: Some(identifier.to_owned()),
            status: IdentificationStatus::Verified,
            verification_id: None,
            target_identification_id: None,
            requires_verification: Tristate::NotRequired,
            created_at: now,
            updated_at: now,
        };
        self.flow_store.create_identification(identification).await.map_err(|e| match e {
            crate::store::StoreError::Conflict => CoreError::IdentificationClaimed,
            other => CoreError::Store(other),
        })
    }
}
