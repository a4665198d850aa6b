use chrono::{Duration, Utc};
use rand::RngCore;

use crate::cookie::codec::CookieCodec;
use crate::domain::{Client, Session, SessionStatus, SignIn, TypedId, User};
use crate::error::CoreError;
use crate::store::{ClientStore, FlowStore, StoreContext};

/// What the caller is asking to convert into an authenticated session
/// (spec §4.6.1). `sign_in` carries the flow-specific linking fields
/// (`to_link_identification_id`); pass `None` when converting outside a
/// SignIn (e.g. from SignUp finalize).
pub struct ConvertToSessionRequest<'a> {
    pub client: Client,
    pub user: User,
    pub sign_in: Option<&'a SignIn>,
    pub actor: Option<serde_json::Value>,
    pub single_session_mode: bool,
    pub sign_out_of_other_sessions: bool,
    pub new_password_digest: Option<String>,
}

#[derive(Debug)]
pub struct ConvertToSessionOutcome {
    pub session: Session,
    pub client: Client,
    /// `Some` unless the Client has `postpone_cookie_update` set, in which
    /// case the caller must not rotate the browser's cookie this round trip.
    pub cookie: Option<String>,
}

fn new_id(prefix: &str) -> TypedId {
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut bytes);
    TypedId::new(format!("{prefix}_{}", hex::encode(bytes)))
}

/// Turns a successful SignIn/SignUp into an active [`Session`] (spec
/// §4.6.1): ends superseded sessions, links the replacement chain, migrates
/// a pending password digest, promotes a linked identification, and rotates
/// the Client's cookie.
pub struct SessionConverter<'a> {
    pub store: &'a ClientStore,
    pub flow_store: &'a dyn FlowStore,
    pub cookie_codec: &'a CookieCodec,
    pub session_lifetime: Duration,
    pub session_abandon: Duration,
}

impl<'a> SessionConverter<'a> {
    pub async fn convert(
        &self,
        ctx: &StoreContext,
        req: ConvertToSessionRequest<'_>,
    ) -> Result<ConvertToSessionOutcome, CoreError> {
        let ConvertToSessionRequest {
            mut client,
            user,
            sign_in,
            actor,
            single_session_mode,
            sign_out_of_other_sessions,
            new_password_digest,
        } = req;

        let existing = self.store.list_client_sessions(&user.instance_id, &client.id, true).await?;

        // Step 3: an impersonation session already on the Client excludes any
        // other session; refuse outright rather than displacing it.
        if existing.iter().any(Session::is_impersonation) {
            return Err(CoreError::CannotCreateSessionWhenImpersonationIsPresent);
        }

        let new_session_id = new_id("sess");

        // Step 3 (continued): a fresh impersonation actor with no existing
        // session on this Client clears room for it by replacing every other
        // session here, regardless of user. Step 2: `single_session_mode`
        // does the same unconditionally. Otherwise only step 1 applies:
        // the same user's own active session on this Client is replaced.
        let actor_already_present = actor.as_ref().is_some_and(|a| existing.iter().any(|s| s.actor.as_ref() == Some(a)));
        let replace_all = single_session_mode || (actor.is_some() && !actor_already_present);

        // The superseded session acquires `replacement_session_id` pointing
        // at the new one, not the other way around (spec §4.6.1 steps 1+8).
        for mut session in existing.into_iter().filter(|s| replace_all || s.user_id == user.id) {
            if session.status.is_terminal() {
                continue;
            }
            session.status = SessionStatus::Replaced;
            session.replacement_session_id = Some(new_session_id.clone());
            session.updated_at = Utc::now();
            self.store.update_session(ctx, session).await?;
        }

        // Reserved-identification promotion: a SignIn that collected a
        // passkey/OAuth link for an existing signed-in user claims it now.
        if let Some(sign_in) = sign_in {
            if let Some(to_link) = &sign_in.to_link_identification_id {
                if let Some(mut identification) = self.flow_store.find_identification(&user.instance_id, to_link).await? {
                    identification.user_id = Some(user.id.clone());
                    identification.status = crate::domain::IdentificationStatus::Verified;
                    identification.updated_at = Utc::now();
                    self.flow_store.update_identification(identification).await?;
                }
            }
        }

        let mut user = user;
        let sign_out_others = new_password_digest.is_some() || sign_out_of_other_sessions;
        if let Some(digest) = new_password_digest {
            user.password_digest = Some(digest);
            user.password_enabled = true;
            user.updated_at = Utc::now();
            user = self.flow_store.update_user(user).await?;
        }
        if sign_out_others && !single_session_mode {
            for mut session in self.store.list_client_sessions(&user.instance_id, &client.id, true).await? {
                if session.status.is_terminal() {
                    continue;
                }
                session.status = SessionStatus::Ended;
                session.updated_at = Utc::now();
                self.store.update_session(ctx, session).await?;
            }
        }

        let now = Utc::now();
        let is_impersonation = actor.is_some();
        let session = Session {
            id: new_session_id,
            instance_id: user.instance_id.clone(),
            client_id: client.id.clone(),
            user_id: user.id.clone(),
            replacement_session_id: None,
            status: SessionStatus::PendingActivation,
            expire_at: now + self.session_lifetime,
            abandon_at: now + self.session_abandon,
            touched_at: now,
            session_inactivity_timeout: None,
            active_organization_id: None,
            actor,
            last_touched_signaled_at: None,
            last_token_issued_at: None,
            created_at: now,
            updated_at: now,
        };
        let session = self.store.create_session(ctx, session).await?;

        if !is_impersonation {
            user.failed_verification_attempts = 0;
            user.locked_until = None;
            user.updated_at = Utc::now();
            self.flow_store.update_user(user).await?;
        }

        client.sign_in_id = None;
        client.sign_up_id = None;

        let cookie = if client.postpone_cookie_update {
            client.postpone_cookie_update = false;
            client.touch();
            None
        } else {
            client.rotating_token = CookieCodec::new_rotating_token();
            client.touch();
            Some(self.cookie_codec.encode(&client.id, &client.rotating_token, None)?)
        };
        if let Some(cookie) = &cookie {
            client.cookie_value = cookie.clone();
        }

        let client = self.store.update_client(ctx, client).await?;

        Ok(ConvertToSessionOutcome { session, client, cookie })
    }
}
