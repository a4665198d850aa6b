use thiserror::Error as ThisError;

use crate::store::error::StoreError;

/// The CORE's error taxonomy (spec §7). Every component error converts into
/// this via `#[from]`, the way the teacher threads `DBError`/`IdentityError`
/// into its own `AuthBuildError`.
#[derive(Debug, ThisError)]
pub enum CoreError {
    // -- cookie / handshake --
    #[error("cookie signature is invalid")]
    InvalidCookie,
    #[error("cookie is missing required claims for this environment")]
    MissingClaims,
    #[error("rotating token does not match the stored value")]
    InvalidRotatingToken,
    #[error("client referenced by this request could not be found")]
    ClientNotFoundInRequest,
    #[error("handshake payload or token is invalid")]
    InvalidHandshake,
    #[error("host is not associated with this instance")]
    InvalidHost,

    // -- sign-in / sign-up flow --
    #[error("sign-in not found")]
    SignInNotFound,
    #[error("sign-up not found")]
    SignUpNotFound,
    #[error("session not found")]
    SessionNotFound,
    #[error("client state does not permit this action")]
    InvalidClientStateForAction,
    #[error("mutation attempted on a superseded sign-in")]
    MutationOnOlderSignInNotAllowed,
    #[error("single session mode: client already has an active session")]
    SingleModeSessionExists,
    #[error("account transfer is missing or invalid")]
    AccountTransferInvalid,
    #[error("account is locked")]
    AccountLocked,
    #[error("identifier is not allowed access")]
    IdentifierNotAllowedAccess,
    #[error("a session already carries an impersonation actor on this client")]
    CannotCreateSessionWhenImpersonationIsPresent,
    #[error("password was found in a breach corpus")]
    PwnedPassword,
    #[error("password is invalid")]
    InvalidPassword,

    // -- identification --
    #[error("identification is already claimed by another user")]
    IdentificationClaimed,
    #[error("identification belongs to a different user")]
    IdentificationBelongsToDifferentUser,
    #[error("external account not found")]
    ExternalAccountNotFound,
    #[error("external account already exists")]
    ExternalAccountExists,
    #[error("identification already exists for this account")]
    IdentificationExists,

    // -- form validation, surfaced verbatim, never retried --
    #[error("invalid parameter value: {0}")]
    FormInvalidParameterValue(String),
    #[error("missing required parameter: {0}")]
    FormMissingParameter(String),
    #[error("parameter must not be nil: {0}")]
    FormNilParameter(String),
    #[error("invalid email address: {0}")]
    FormInvalidEmailAddress(String),

    // -- captcha --
    #[error("captcha token is invalid")]
    CaptchaInvalid,
    #[error("captcha is not enabled for this instance")]
    CaptchaNotEnabled,
    #[error("this client cannot be challenged with a captcha")]
    CaptchaUnsupportedByClient,

    // -- multi-domain sync / SAML --
    #[error("sync nonce was already consumed")]
    SyncNonceAlreadyConsumed,
    #[error("SAML response is invalid")]
    SamlResponseInvalid,

    // -- token templating --
    #[error("claims may not set a reserved audience")]
    ErrReservedAud,

    // -- session token service --
    #[error("session references a user that no longer exists")]
    ErrUserNotFound,
    #[error("session is not active")]
    ErrInactiveSession,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl CoreError {
    /// Whether the enclosing DB transaction should still commit (persisting
    /// e.g. the verification's failed-attempt bump) rather than roll back
    /// entirely, per spec §7 "Propagation".
    pub fn should_commit_on_error(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidPassword
                | CoreError::PwnedPassword
                | CoreError::IdentificationClaimed
                | CoreError::IdentificationExists
                | CoreError::ExternalAccountExists
        )
    }
}
