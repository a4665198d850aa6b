use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::identification::{IdentificationStatus, IdentificationType, Tristate};
use crate::domain::verification::{Strategy, VerificationStatus};
use crate::domain::{Identification, JwtTemplate, SignIn, SignUp, SyncNonce, TypedId, User, Verification};

use super::error::StoreError;

/// Persistence for the ephemeral flow records and their supporting entities
/// (User, Identification, Verification, SignIn, SignUp, SyncNonce,
/// JwtTemplate) that `SignInMachine`/`SignUpMachine`/`MultiDomainSync`
/// operate on. These are not subject to `ClientStore`'s edge-id routing
/// (spec §4.2 only routes Client/Session), so a single relational backend
/// suffices.
#[async_trait]
pub trait FlowStore: Send + Sync {
    async fn create_user(&self, user: User) -> Result<User, StoreError>;
    async fn find_user(&self, instance_id: &TypedId, id: &TypedId) -> Result<Option<User>, StoreError>;
    async fn update_user(&self, user: User) -> Result<User, StoreError>;

    async fn create_identification(&self, identification: Identification) -> Result<Identification, StoreError>;
    async fn find_identification(&self, instance_id: &TypedId, id: &TypedId) -> Result<Option<Identification>, StoreError>;
    async fn find_identification_by_value(
        &self,
        instance_id: &TypedId,
        kind: IdentificationType,
        identifier: &str,
    ) -> Result<Option<Identification>, StoreError>;
    async fn update_identification(&self, identification: Identification) -> Result<Identification, StoreError>;

    async fn create_verification(&self, verification: Verification) -> Result<Verification, StoreError>;
    async fn find_verification(&self, instance_id: &TypedId, id: &TypedId) -> Result<Option<Verification>, StoreError>;
    async fn update_verification(&self, verification: Verification) -> Result<Verification, StoreError>;
    async fn clear_verified_at_client(&self, instance_id: &TypedId, client_id: &TypedId) -> Result<(), StoreError>;

    async fn create_sign_in(&self, sign_in: SignIn) -> Result<SignIn, StoreError>;
    async fn find_sign_in(&self, instance_id: &TypedId, id: &TypedId) -> Result<Option<SignIn>, StoreError>;
    async fn update_sign_in(&self, sign_in: SignIn) -> Result<SignIn, StoreError>;
    async fn delete_sign_ins_for_client(&self, instance_id: &TypedId, client_id: &TypedId) -> Result<(), StoreError>;
    async fn delete_sign_ins_by_created_session(&self, instance_id: &TypedId, session_id: &TypedId) -> Result<(), StoreError>;

    async fn create_sign_up(&self, sign_up: SignUp) -> Result<SignUp, StoreError>;
    async fn find_sign_up(&self, instance_id: &TypedId, id: &TypedId) -> Result<Option<SignUp>, StoreError>;
    async fn update_sign_up(&self, sign_up: SignUp) -> Result<SignUp, StoreError>;
    async fn delete_sign_ups_for_client(&self, instance_id: &TypedId, client_id: &TypedId) -> Result<(), StoreError>;

    async fn create_sync_nonce(&self, nonce: SyncNonce) -> Result<SyncNonce, StoreError>;
    async fn find_sync_nonce(&self, instance_id: &TypedId, nonce: &str) -> Result<Option<SyncNonce>, StoreError>;
    async fn update_sync_nonce(&self, nonce: SyncNonce) -> Result<SyncNonce, StoreError>;
    async fn delete_sync_nonces_for_client(&self, instance_id: &TypedId, client_id: &TypedId) -> Result<(), StoreError>;

    async fn find_jwt_template(&self, instance_id: &TypedId, name: &str) -> Result<Option<JwtTemplate>, StoreError>;

    /// Plan keys active for a user (and, when provided, an organization),
    /// looked up via the billing-subscriptions table (spec §4.5).
    async fn billing_plan_keys(&self, instance_id: &TypedId, user_id: &TypedId, org_id: Option<&TypedId>) -> Result<Vec<String>, StoreError>;
}

pub struct RelationalFlowStore {
    pool: PgPool,
}

impl RelationalFlowStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_err(e: sqlx::Error) -> StoreError {
    e.into()
}

fn row_to_user(row: &sqlx::postgres::PgRow) -> Result<User, StoreError> {
    Ok(User {
        id: TypedId::new(row.try_get::<String, _>("id").map_err(map_err)?),
        instance_id: TypedId::new(row.try_get::<String, _>("instance_id").map_err(map_err)?),
        password_digest: row.try_get("password_digest").map_err(map_err)?,
        password_enabled: row.try_get("password_enabled").map_err(map_err)?,
        two_factor_enabled: row.try_get("two_factor_enabled").map_err(map_err)?,
        totp_enabled: row.try_get("totp_enabled").map_err(map_err)?,
        backup_code_enabled: row.try_get("backup_code_enabled").map_err(map_err)?,
        primary_email_identification_id: row.try_get::<Option<String>, _>("primary_email_identification_id").map_err(map_err)?.map(TypedId::new),
        primary_phone_identification_id: row.try_get::<Option<String>, _>("primary_phone_identification_id").map_err(map_err)?.map(TypedId::new),
        primary_web3_wallet_identification_id: row
            .try_get::<Option<String>, _>("primary_web3_wallet_identification_id")
            .map_err(map_err)?
            .map(TypedId::new),
        first_name: row.try_get("first_name").map_err(map_err)?,
        last_name: row.try_get("last_name").map_err(map_err)?,
        username: row.try_get("username").map_err(map_err)?,
        image_url: row.try_get("image_url").map_err(map_err)?,
        locked_until: row.try_get("locked_until").map_err(map_err)?,
        failed_verification_attempts: row.try_get::<i32, _>("failed_verification_attempts").map_err(map_err)? as u32,
        public_metadata: row.try_get("public_metadata").map_err(map_err)?,
        private_metadata: row.try_get("private_metadata").map_err(map_err)?,
        unsafe_metadata: row.try_get("unsafe_metadata").map_err(map_err)?,
        external_id: row.try_get("external_id").map_err(map_err)?,
        created_at: row.try_get("created_at").map_err(map_err)?,
        updated_at: row.try_get("updated_at").map_err(map_err)?,
    })
}

fn identification_type_to_str(kind: IdentificationType) -> &'static str {
    match kind {
        IdentificationType::EmailAddress => "email_address",
        IdentificationType::PhoneNumber => "phone_number",
        IdentificationType::Web3Wallet => "web3_wallet",
        IdentificationType::OauthProvider => "oauth_provider",
        IdentificationType::Saml => "saml",
        IdentificationType::Passkey => "passkey",
        IdentificationType::Username => "username",
    }
}

fn identification_type_from_str(s: &str) -> Result<IdentificationType, StoreError> {
    Ok(match s {
        "email_address" => IdentificationType::EmailAddress,
        "phone_number" => IdentificationType::PhoneNumber,
        "web3_wallet" => IdentificationType::Web3Wallet,
        "oauth_provider" => IdentificationType::OauthProvider,
        "saml" => IdentificationType::Saml,
        "passkey" => IdentificationType::Passkey,
        "username" => IdentificationType::Username,
        other => return Err(StoreError::Unexpected(format!("unknown identification kind {other}"))),
    })
}

fn identification_status_to_str(status: IdentificationStatus) -> &'static str {
    match status {
        IdentificationStatus::NotSet => "not_set",
        IdentificationStatus::Reserved => "reserved",
        IdentificationStatus::Verified => "verified",
        IdentificationStatus::Transferable => "transferable",
    }
}

fn identification_status_from_str(s: &str) -> Result<IdentificationStatus, StoreError> {
    Ok(match s {
        "not_set" => IdentificationStatus::NotSet,
        "reserved" => IdentificationStatus::Reserved,
        "verified" => IdentificationStatus::Verified,
        "transferable" => IdentificationStatus::Transferable,
        other => return Err(StoreError::Unexpected(format!("unknown identification status {other}"))),
    })
}

fn tristate_to_str(t: Tristate) -> &'static str {
    match t {
        Tristate::Unknown => "unknown",
        Tristate::Required => "required",
        Tristate::NotRequired => "not_required",
    }
}

fn tristate_from_str(s: &str) -> Result<Tristate, StoreError> {
    Ok(match s {
        "unknown" => Tristate::Unknown,
        "required" => Tristate::Required,
        "not_required" => Tristate::NotRequired,
        other => return Err(StoreError::Unexpected(format!("unknown tristate {other}"))),
    })
}

fn row_to_identification(row: &sqlx::postgres::PgRow) -> Result<Identification, StoreError> {
    Ok(Identification {
        id: TypedId::new(row.try_get::<String, _>("id").map_err(map_err)?),
        instance_id: TypedId::new(row.try_get::<String, _>("instance_id").map_err(map_err)?),
        user_id: row.try_get::<Option<String>, _>("user_id").map_err(map_err)?.map(TypedId::new),
        kind: identification_type_from_str(&row.try_get::<String, _>("kind").map_err(map_err)?)?,
        identifier: row.try_get("identifier").map_err(map_err)?,
        status: identification_status_from_str(&row.try_get::<String, _>("status").map_err(map_err)?)?,
        verification_id: row.try_get::<Option<String>, _>("verification_id").map_err(map_err)?.map(TypedId::new),
        target_identification_id: row.try_get::<Option<String>, _>("target_identification_id").map_err(map_err)?.map(TypedId::new),
        requires_verification: tristate_from_str(&row.try_get::<String, _>("requires_verification").map_err(map_err)?)?,
        created_at: row.try_get("created_at").map_err(map_err)?,
        updated_at: row.try_get("updated_at").map_err(map_err)?,
    })
}

fn strategy_to_str(s: Strategy) -> &'static str {
    match s {
        Strategy::Password => "password",
        Strategy::EmailCode => "email_code",
        Strategy::EmailLink => "email_link",
        Strategy::PhoneCode => "phone_code",
        Strategy::ResetPasswordEmailCode => "reset_password_email_code",
        Strategy::ResetPasswordPhoneCode => "reset_password_phone_code",
        Strategy::Web3Signature => "web3_signature",
        Strategy::OauthCallback => "oauth_callback",
        Strategy::Passkey => "passkey",
        Strategy::Ticket => "ticket",
        Strategy::Totp => "totp",
        Strategy::BackupCode => "backup_code",
        Strategy::Saml => "saml",
    }
}

fn strategy_from_str(s: &str) -> Result<Strategy, StoreError> {
    Ok(match s {
        "password" => Strategy::Password,
        "email_code" => Strategy::EmailCode,
        "email_link" => Strategy::EmailLink,
        "phone_code" => Strategy::PhoneCode,
        "reset_password_email_code" => Strategy::ResetPasswordEmailCode,
        "reset_password_phone_code" => Strategy::ResetPasswordPhoneCode,
        "web3_signature" => Strategy::Web3Signature,
        "oauth_callback" => Strategy::OauthCallback,
        "passkey" => Strategy::Passkey,
        "ticket" => Strategy::Ticket,
        "totp" => Strategy::Totp,
        "backup_code" => Strategy::BackupCode,
        "saml" => Strategy::Saml,
        other => return Err(StoreError::Unexpected(format!("unknown strategy {other}"))),
    })
}

fn verification_status_to_str(s: VerificationStatus) -> &'static str {
    match s {
        VerificationStatus::Unverified => "unverified",
        VerificationStatus::Verified => "verified",
        VerificationStatus::Expired => "expired",
        VerificationStatus::Failed => "failed",
    }
}

fn verification_status_from_str(s: &str) -> Result<VerificationStatus, StoreError> {
    Ok(match s {
        "unverified" => VerificationStatus::Unverified,
        "verified" => VerificationStatus::Verified,
        "expired" => VerificationStatus::Expired,
        "failed" => VerificationStatus::Failed,
        other => return Err(StoreError::Unexpected(format!("unknown verification status {other}"))),
    })
}

fn row_to_verification(row: &sqlx::postgres::PgRow) -> Result<Verification, StoreError> {
    Ok(Verification {
        id: TypedId::new(row.try_get::<String, _>("id").map_err(map_err)?),
        instance_id: TypedId::new(row.try_get::<String, _>("instance_id").map_err(map_err)?),
        identification_id: row.try_get::<Option<String>, _>("identification_id").map_err(map_err)?.map(TypedId::new),
        strategy: strategy_from_str(&row.try_get::<String, _>("strategy").map_err(map_err)?)?,
        status: verification_status_from_str(&row.try_get::<String, _>("status").map_err(map_err)?)?,
        attempts: row.try_get::<i32, _>("attempts").map_err(map_err)? as u32,
        max_attempts: row.try_get::<i32, _>("max_attempts").map_err(map_err)? as u32,
        expire_at: row.try_get("expire_at").map_err(map_err)?,
        nonce: row.try_get("nonce").map_err(map_err)?,
        external_account_transfer_id: row.try_get::<Option<String>, _>("external_account_transfer_id").map_err(map_err)?.map(TypedId::new),
        token: row.try_get("token").map_err(map_err)?,
        error: row.try_get("error").map_err(map_err)?,
        verified_at_client: row.try_get::<Option<String>, _>("verified_at_client").map_err(map_err)?.map(TypedId::new),
        created_at: row.try_get("created_at").map_err(map_err)?,
        updated_at: row.try_get("updated_at").map_err(map_err)?,
    })
}

fn row_to_sign_in(row: &sqlx::postgres::PgRow) -> Result<SignIn, StoreError> {
    Ok(SignIn {
        id: TypedId::new(row.try_get::<String, _>("id").map_err(map_err)?),
        instance_id: TypedId::new(row.try_get::<String, _>("instance_id").map_err(map_err)?),
        client_id: TypedId::new(row.try_get::<String, _>("client_id").map_err(map_err)?),
        identification_id: row.try_get::<Option<String>, _>("identification_id").map_err(map_err)?.map(TypedId::new),
        identifier_strategy: row
            .try_get::<Option<String>, _>("identifier_strategy")
            .map_err(map_err)?
            .map(|s| strategy_from_str(&s))
            .transpose()?,
        saml_connection_id: row.try_get::<Option<String>, _>("saml_connection_id").map_err(map_err)?.map(TypedId::new),
        first_factor_current_verification_id: row
            .try_get::<Option<String>, _>("first_factor_current_verification_id")
            .map_err(map_err)?
            .map(TypedId::new),
        first_factor_success_verification_id: row
            .try_get::<Option<String>, _>("first_factor_success_verification_id")
            .map_err(map_err)?
            .map(TypedId::new),
        second_factor_current_verification_id: row
            .try_get::<Option<String>, _>("second_factor_current_verification_id")
            .map_err(map_err)?
            .map(TypedId::new),
        second_factor_success_verification_id: row
            .try_get::<Option<String>, _>("second_factor_success_verification_id")
            .map_err(map_err)?
            .map(TypedId::new),
        new_password_digest: row.try_get("new_password_digest").map_err(map_err)?,
        sign_out_of_other_sessions: row.try_get("sign_out_of_other_sessions").map_err(map_err)?,
        actor_token_id: row.try_get::<Option<String>, _>("actor_token_id").map_err(map_err)?.map(TypedId::new),
        organization_invitation_id: row.try_get::<Option<String>, _>("organization_invitation_id").map_err(map_err)?.map(TypedId::new),
        external_account_identification_id: row
            .try_get::<Option<String>, _>("external_account_identification_id")
            .map_err(map_err)?
            .map(TypedId::new),
        successful_saml_identification_id: row
            .try_get::<Option<String>, _>("successful_saml_identification_id")
            .map_err(map_err)?
            .map(TypedId::new),
        to_link_identification_id: row.try_get::<Option<String>, _>("to_link_identification_id").map_err(map_err)?.map(TypedId::new),
        created_session_id: row.try_get::<Option<String>, _>("created_session_id").map_err(map_err)?.map(TypedId::new),
        abandon_at: row.try_get("abandon_at").map_err(map_err)?,
        created_at: row.try_get("created_at").map_err(map_err)?,
        updated_at: row.try_get("updated_at").map_err(map_err)?,
    })
}

fn row_to_sign_up(row: &sqlx::postgres::PgRow) -> Result<SignUp, StoreError> {
    Ok(SignUp {
        id: TypedId::new(row.try_get::<String, _>("id").map_err(map_err)?),
        instance_id: TypedId::new(row.try_get::<String, _>("instance_id").map_err(map_err)?),
        client_id: TypedId::new(row.try_get::<String, _>("client_id").map_err(map_err)?),
        email_address: row.try_get("email_address").map_err(map_err)?,
        phone_number: row.try_get("phone_number").map_err(map_err)?,
        username: row.try_get("username").map_err(map_err)?,
        web3_wallet: row.try_get("web3_wallet").map_err(map_err)?,
        first_name: row.try_get("first_name").map_err(map_err)?,
        last_name: row.try_get("last_name").map_err(map_err)?,
        password_digest: row.try_get("password_digest").map_err(map_err)?,
        email_address_verification_id: row.try_get::<Option<String>, _>("email_address_verification_id").map_err(map_err)?.map(TypedId::new),
        phone_number_verification_id: row.try_get::<Option<String>, _>("phone_number_verification_id").map_err(map_err)?.map(TypedId::new),
        web3_wallet_verification_id: row.try_get::<Option<String>, _>("web3_wallet_verification_id").map_err(map_err)?.map(TypedId::new),
        external_account_verification_id: row
            .try_get::<Option<String>, _>("external_account_verification_id")
            .map_err(map_err)?
            .map(TypedId::new),
        captcha_token: row.try_get("captcha_token").map_err(map_err)?,
        captcha_widget_token: row.try_get("captcha_widget_token").map_err(map_err)?,
        captcha_error: row.try_get("captcha_error").map_err(map_err)?,
        external_account_identification_id: row
            .try_get::<Option<String>, _>("external_account_identification_id")
            .map_err(map_err)?
            .map(TypedId::new),
        successful_saml_identification_id: row
            .try_get::<Option<String>, _>("successful_saml_identification_id")
            .map_err(map_err)?
            .map(TypedId::new),
        created_user_id: row.try_get::<Option<String>, _>("created_user_id").map_err(map_err)?.map(TypedId::new),
        created_session_id: row.try_get::<Option<String>, _>("created_session_id").map_err(map_err)?.map(TypedId::new),
        abandon_at: row.try_get("abandon_at").map_err(map_err)?,
        created_at: row.try_get("created_at").map_err(map_err)?,
        updated_at: row.try_get("updated_at").map_err(map_err)?,
    })
}

fn row_to_sync_nonce(row: &sqlx::postgres::PgRow) -> Result<SyncNonce, StoreError> {
    Ok(SyncNonce {
        nonce: row.try_get("nonce").map_err(map_err)?,
        instance_id: TypedId::new(row.try_get::<String, _>("instance_id").map_err(map_err)?),
        client_id: TypedId::new(row.try_get::<String, _>("client_id").map_err(map_err)?),
        redirect_url: row.try_get("redirect_url").map_err(map_err)?,
        consumed: row.try_get("consumed").map_err(map_err)?,
        expire_at: row.try_get("expire_at").map_err(map_err)?,
        created_at: row.try_get("created_at").map_err(map_err)?,
    })
}

fn row_to_jwt_template(row: &sqlx::postgres::PgRow) -> Result<JwtTemplate, StoreError> {
    Ok(JwtTemplate {
        id: TypedId::new(row.try_get::<String, _>("id").map_err(map_err)?),
        instance_id: TypedId::new(row.try_get::<String, _>("instance_id").map_err(map_err)?),
        name: row.try_get("name").map_err(map_err)?,
        claims: row.try_get("claims").map_err(map_err)?,
        lifetime_seconds: row.try_get("lifetime_seconds").map_err(map_err)?,
        clock_skew_seconds: row.try_get("clock_skew_seconds").map_err(map_err)?,
        signing_key: row.try_get("signing_key").map_err(map_err)?,
        signing_algorithm: row.try_get("signing_algorithm").map_err(map_err)?,
    })
}

#[async_trait]
impl FlowStore for RelationalFlowStore {
    async fn create_user(&self, user: User) -> Result<User, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, instance_id, password_digest, password_enabled, two_factor_enabled, totp_enabled,
                backup_code_enabled, primary_email_identification_id, primary_phone_identification_id,
                primary_web3_wallet_identification_id, first_name, last_name, username, image_url,
                locked_until, failed_verification_attempts, public_metadata, private_metadata,
                unsafe_metadata, external_id, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
            "#,
        )
        .bind(user.id.as_str())
        .bind(user.instance_id.as_str())
        .bind(&user.password_digest)
        .bind(user.password_enabled)
        .bind(user.two_factor_enabled)
        .bind(user.totp_enabled)
        .bind(user.backup_code_enabled)
        .bind(user.primary_email_identification_id.as_ref().map(TypedId::as_str))
        .bind(user.primary_phone_identification_id.as_ref().map(TypedId::as_str))
        .bind(user.primary_web3_wallet_identification_id.as_ref().map(TypedId::as_str))
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.username)
        .bind(&user.image_url)
        .bind(user.locked_until)
        .bind(user.failed_verification_attempts as i32)
        .bind(&user.public_metadata)
        .bind(&user.private_metadata)
        .bind(&user.unsafe_metadata)
        .bind(&user.external_id)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(user)
    }

    async fn find_user(&self, instance_id: &TypedId, id: &TypedId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE instance_id = $1 AND id = $2")
            .bind(instance_id.as_str())
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn update_user(&self, user: User) -> Result<User, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET password_digest = $3, password_enabled = $4, two_factor_enabled = $5,
                locked_until = $6, failed_verification_attempts = $7, updated_at = $8
            WHERE instance_id = $1 AND id = $2
            "#,
        )
        .bind(user.instance_id.as_str())
        .bind(user.id.as_str())
        .bind(&user.password_digest)
        .bind(user.password_enabled)
        .bind(user.two_factor_enabled)
        .bind(user.locked_until)
        .bind(user.failed_verification_attempts as i32)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NoRecords);
        }
        Ok(user)
    }

    async fn create_identification(&self, identification: Identification) -> Result<Identification, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO identifications (id, instance_id, user_id, kind, identifier, status, verification_id, target_identification_id, requires_verification, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(identification.id.as_str())
        .bind(identification.instance_id.as_str())
        .bind(identification.user_id.as_ref().map(TypedId::as_str))
        .bind(identification_type_to_str(identification.kind))
        .bind(&identification.identifier)
        .bind(identification_status_to_str(identification.status))
        .bind(identification.verification_id.as_ref().map(TypedId::as_str))
        .bind(identification.target_identification_id.as_ref().map(TypedId::as_str))
        .bind(tristate_to_str(identification.requires_verification))
        .bind(identification.created_at)
        .bind(identification.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(identification),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(StoreError::Conflict),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_identification(&self, instance_id: &TypedId, id: &TypedId) -> Result<Option<Identification>, StoreError> {
        let row = sqlx::query("SELECT * FROM identifications WHERE instance_id = $1 AND id = $2")
            .bind(instance_id.as_str())
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(row_to_identification).transpose()
    }

    async fn find_identification_by_value(
        &self,
        instance_id: &TypedId,
        kind: IdentificationType,
        identifier: &str,
    ) -> Result<Option<Identification>, StoreError> {
        let row = sqlx::query("SELECT * FROM identifications WHERE instance_id = $1 AND kind = $2 AND identifier = $3")
            .bind(instance_id.as_str())
            .bind(identification_type_to_str(kind))
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(row_to_identification).transpose()
    }

    async fn update_identification(&self, identification: Identification) -> Result<Identification, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE identifications SET user_id = $3, status = $4, verification_id = $5,
                target_identification_id = $6, requires_verification = $7, updated_at = $8
            WHERE instance_id = $1 AND id = $2
            "#,
        )
        .bind(identification.instance_id.as_str())
        .bind(identification.id.as_str())
        .bind(identification.user_id.as_ref().map(TypedId::as_str))
        .bind(identification_status_to_str(identification.status))
        .bind(identification.verification_id.as_ref().map(TypedId::as_str))
        .bind(identification.target_identification_id.as_ref().map(TypedId::as_str))
        .bind(tristate_to_str(identification.requires_verification))
        .bind(identification.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NoRecords);
        }
        Ok(identification)
    }

    async fn create_verification(&self, verification: Verification) -> Result<Verification, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO verifications (id, instance_id, identification_id, strategy, status, attempts, max_attempts, expire_at, nonce, external_account_transfer_id, token, error, verified_at_client, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(verification.id.as_str())
        .bind(verification.instance_id.as_str())
        .bind(verification.identification_id.as_ref().map(TypedId::as_str))
        .bind(strategy_to_str(verification.strategy))
        .bind(verification_status_to_str(verification.status))
        .bind(verification.attempts as i32)
        .bind(verification.max_attempts as i32)
        .bind(verification.expire_at)
        .bind(&verification.nonce)
        .bind(verification.external_account_transfer_id.as_ref().map(TypedId::as_str))
        .bind(&verification.token)
        .bind(&verification.error)
        .bind(verification.verified_at_client.as_ref().map(TypedId::as_str))
        .bind(verification.created_at)
        .bind(verification.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(verification)
    }

    async fn find_verification(&self, instance_id: &TypedId, id: &TypedId) -> Result<Option<Verification>, StoreError> {
        let row = sqlx::query("SELECT * FROM verifications WHERE instance_id = $1 AND id = $2")
            .bind(instance_id.as_str())
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(row_to_verification).transpose()
    }

    async fn update_verification(&self, verification: Verification) -> Result<Verification, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE verifications SET status = $3, attempts = $4, nonce = $5, token = $6, error = $7, verified_at_client = $8, updated_at = $9
            WHERE instance_id = $1 AND id = $2
            "#,
        )
        .bind(verification.instance_id.as_str())
        .bind(verification.id.as_str())
        .bind(verification_status_to_str(verification.status))
        .bind(verification.attempts as i32)
        .bind(&verification.nonce)
        .bind(&verification.token)
        .bind(&verification.error)
        .bind(verification.verified_at_client.as_ref().map(TypedId::as_str))
        .bind(verification.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NoRecords);
        }
        Ok(verification)
    }

    async fn clear_verified_at_client(&self, instance_id: &TypedId, client_id: &TypedId) -> Result<(), StoreError> {
        sqlx::query("UPDATE verifications SET verified_at_client = NULL WHERE instance_id = $1 AND verified_at_client = $2")
            .bind(instance_id.as_str())
            .bind(client_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn create_sign_in(&self, sign_in: SignIn) -> Result<SignIn, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sign_ins (id, instance_id, client_id, identifier_strategy, sign_out_of_other_sessions, abandon_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(sign_in.id.as_str())
        .bind(sign_in.instance_id.as_str())
        .bind(sign_in.client_id.as_str())
        .bind(sign_in.identifier_strategy.map(strategy_to_str))
        .bind(sign_in.sign_out_of_other_sessions)
        .bind(sign_in.abandon_at)
        .bind(sign_in.created_at)
        .bind(sign_in.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(sign_in)
    }

    async fn find_sign_in(&self, instance_id: &TypedId, id: &TypedId) -> Result<Option<SignIn>, StoreError> {
        let row = sqlx::query("SELECT * FROM sign_ins WHERE instance_id = $1 AND id = $2")
            .bind(instance_id.as_str())
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(row_to_sign_in).transpose()
    }

    async fn update_sign_in(&self, sign_in: SignIn) -> Result<SignIn, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE sign_ins SET identification_id = $3, identifier_strategy = $4, saml_connection_id = $5,
                first_factor_current_verification_id = $6, first_factor_success_verification_id = $7,
                second_factor_current_verification_id = $8, second_factor_success_verification_id = $9,
                new_password_digest = $10, sign_out_of_other_sessions = $11, actor_token_id = $12,
                organization_invitation_id = $13, external_account_identification_id = $14,
                successful_saml_identification_id = $15, to_link_identification_id = $16,
                created_session_id = $17, updated_at = $18
            WHERE instance_id = $1 AND id = $2
            "#,
        )
        .bind(sign_in.instance_id.as_str())
        .bind(sign_in.id.as_str())
        .bind(sign_in.identification_id.as_ref().map(TypedId::as_str))
        .bind(sign_in.identifier_strategy.map(strategy_to_str))
        .bind(sign_in.saml_connection_id.as_ref().map(TypedId::as_str))
        .bind(sign_in.first_factor_current_verification_id.as_ref().map(TypedId::as_str))
        .bind(sign_in.first_factor_success_verification_id.as_ref().map(TypedId::as_str))
        .bind(sign_in.second_factor_current_verification_id.as_ref().map(TypedId::as_str))
        .bind(sign_in.second_factor_success_verification_id.as_ref().map(TypedId::as_str))
        .bind(&sign_in.new_password_digest)
        .bind(sign_in.sign_out_of_other_sessions)
        .bind(sign_in.actor_token_id.as_ref().map(TypedId::as_str))
        .bind(sign_in.organization_invitation_id.as_ref().map(TypedId::as_str))
        .bind(sign_in.external_account_identification_id.as_ref().map(TypedId::as_str))
        .bind(sign_in.successful_saml_identification_id.as_ref().map(TypedId::as_str))
        .bind(sign_in.to_link_identification_id.as_ref().map(TypedId::as_str))
        .bind(sign_in.created_session_id.as_ref().map(TypedId::as_str))
        .bind(sign_in.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NoRecords);
        }
        Ok(sign_in)
    }

    async fn delete_sign_ins_for_client(&self, instance_id: &TypedId, client_id: &TypedId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sign_ins WHERE instance_id = $1 AND client_id = $2")
            .bind(instance_id.as_str())
            .bind(client_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn delete_sign_ins_by_created_session(&self, instance_id: &TypedId, session_id: &TypedId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sign_ins WHERE instance_id = $1 AND created_session_id = $2")
            .bind(instance_id.as_str())
            .bind(session_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn create_sign_up(&self, sign_up: SignUp) -> Result<SignUp, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sign_ups (id, instance_id, client_id, abandon_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(sign_up.id.as_str())
        .bind(sign_up.instance_id.as_str())
        .bind(sign_up.client_id.as_str())
        .bind(sign_up.abandon_at)
        .bind(sign_up.created_at)
        .bind(sign_up.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(sign_up)
    }

    async fn find_sign_up(&self, instance_id: &TypedId, id: &TypedId) -> Result<Option<SignUp>, StoreError> {
        let row = sqlx::query("SELECT * FROM sign_ups WHERE instance_id = $1 AND id = $2")
            .bind(instance_id.as_str())
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(row_to_sign_up).transpose()
    }

    async fn update_sign_up(&self, sign_up: SignUp) -> Result<SignUp, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE sign_ups SET email_address = $3, phone_number = $4, username = $5, web3_wallet = $6,
                first_name = $7, last_name = $8, password_digest = $9,
                email_address_verification_id = $10, phone_number_verification_id = $11, web3_wallet_verification_id = $12,
                external_account_verification_id = $13, captcha_token = $14, captcha_widget_token = $15, captcha_error = $16,
                external_account_identification_id = $17, successful_saml_identification_id = $18,
                created_user_id = $19, created_session_id = $20, updated_at = $21
            WHERE instance_id = $1 AND id = $2
            "#,
        )
        .bind(sign_up.instance_id.as_str())
        .bind(sign_up.id.as_str())
        .bind(&sign_up.email_address)
        .bind(&sign_up.phone_number)
        .bind(&sign_up.username)
        .bind(&sign_up.web3_wallet)
        .bind(&sign_up.first_name)
        .bind(&sign_up.last_name)
        .bind(&sign_up.password_digest)
        .bind(sign_up.email_address_verification_id.as_ref().map(TypedId::as_str))
        .bind(sign_up.phone_number_verification_id.as_ref().map(TypedId::as_str))
        .bind(sign_up.web3_wallet_verification_id.as_ref().map(TypedId::as_str))
        .bind(sign_up.external_account_verification_id.as_ref().map(TypedId::as_str))
        .bind(&sign_up.captcha_token)
        .bind(&sign_up.captcha_widget_token)
        .bind(&sign_up.captcha_error)
        .bind(sign_up.external_account_identification_id.as_ref().map(TypedId::as_str))
        .bind(sign_up.successful_saml_identification_id.as_ref().map(TypedId::as_str))
        .bind(sign_up.created_user_id.as_ref().map(TypedId::as_str))
        .bind(sign_up.created_session_id.as_ref().map(TypedId::as_str))
        .bind(sign_up.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NoRecords);
        }
        Ok(sign_up)
    }

    async fn delete_sign_ups_for_client(&self, instance_id: &TypedId, client_id: &TypedId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sign_ups WHERE instance_id = $1 AND client_id = $2")
            .bind(instance_id.as_str())
            .bind(client_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn create_sync_nonce(&self, nonce: SyncNonce) -> Result<SyncNonce, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sync_nonces (nonce, instance_id, client_id, redirect_url, consumed, expire_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&nonce.nonce)
        .bind(nonce.instance_id.as_str())
        .bind(nonce.client_id.as_str())
        .bind(&nonce.redirect_url)
        .bind(nonce.consumed)
        .bind(nonce.expire_at)
        .bind(nonce.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(nonce)
    }

    async fn find_sync_nonce(&self, instance_id: &TypedId, nonce: &str) -> Result<Option<SyncNonce>, StoreError> {
        let row = sqlx::query("SELECT * FROM sync_nonces WHERE instance_id = $1 AND nonce = $2")
            .bind(instance_id.as_str())
            .bind(nonce)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(row_to_sync_nonce).transpose()
    }

    async fn update_sync_nonce(&self, nonce: SyncNonce) -> Result<SyncNonce, StoreError> {
        let result = sqlx::query("UPDATE sync_nonces SET consumed = $3 WHERE instance_id = $1 AND nonce = $2")
            .bind(nonce.instance_id.as_str())
            .bind(&nonce.nonce)
            .bind(nonce.consumed)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NoRecords);
        }
        Ok(nonce)
    }

    async fn delete_sync_nonces_for_client(&self, instance_id: &TypedId, client_id: &TypedId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sync_nonces WHERE instance_id = $1 AND client_id = $2")
            .bind(instance_id.as_str())
            .bind(client_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn find_jwt_template(&self, instance_id: &TypedId, name: &str) -> Result<Option<JwtTemplate>, StoreError> {
        let row = sqlx::query("SELECT * FROM jwt_templates WHERE instance_id = $1 AND name = $2")
            .bind(instance_id.as_str())
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(row_to_jwt_template).transpose()
    }

    async fn billing_plan_keys(&self, instance_id: &TypedId, user_id: &TypedId, org_id: Option<&TypedId>) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            "SELECT plan_key FROM billing_subscriptions WHERE instance_id = $1 AND subject_id = ANY($2) AND active = true",
        )
        .bind(instance_id.as_str())
        .bind(
            [Some(user_id.as_str()), org_id.map(TypedId::as_str)]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>(),
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;
        rows.iter().map(|row| row.try_get::<String, _>("plan_key").map_err(map_err)).collect()
    }
}
