use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::session::SessionStatus;
use crate::domain::{Client, Session, TypedId};

use super::backend::ClientBackend;
use super::error::StoreError;

/// Relational (Postgres) `ClientStore` backend.
///
/// Grounded in the teacher's `IdentityManager` (prepared statements, an
/// explicit transaction per multi-statement mutation, constraint-name
/// matching to classify conflicts) but expressed with `sqlx` rather than
/// the teacher's internal `shine_service` wrapper over `tokio-postgres`
/// (see DESIGN.md for the dependency-substitution note).
pub struct RelationalStore {
    pool: PgPool,
}

impl RelationalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_client(row: &sqlx::postgres::PgRow) -> Result<Client, StoreError> {
    Ok(Client {
        id: TypedId::new(row.try_get::<String, _>("id").map_err(|e| StoreError::Unexpected(e.to_string()))?),
        instance_id: TypedId::new(
            row.try_get::<String, _>("instance_id")
                .map_err(|e| StoreError::Unexpected(e.to_string()))?,
        ),
        rotating_token: row
            .try_get("rotating_token")
            .map_err(|e| StoreError::Unexpected(e.to_string()))?,
        cookie_value: row
            .try_get("cookie_value")
            .map_err(|e| StoreError::Unexpected(e.to_string()))?,
        rotating_token_nonce: row
            .try_get("rotating_token_nonce")
            .map_err(|e| StoreError::Unexpected(e.to_string()))?,
        sign_in_id: row
            .try_get::<Option<String>, _>("sign_in_id")
            .map_err(|e| StoreError::Unexpected(e.to_string()))?
            .map(TypedId::new),
        sign_up_id: row
            .try_get::<Option<String>, _>("sign_up_id")
            .map_err(|e| StoreError::Unexpected(e.to_string()))?
            .map(TypedId::new),
        to_sign_in_account_transfer_id: row
            .try_get::<Option<String>, _>("to_sign_in_account_transfer_id")
            .map_err(|e| StoreError::Unexpected(e.to_string()))?
            .map(TypedId::new),
        to_sign_up_account_transfer_id: row
            .try_get::<Option<String>, _>("to_sign_up_account_transfer_id")
            .map_err(|e| StoreError::Unexpected(e.to_string()))?
            .map(TypedId::new),
        postpone_cookie_update: row
            .try_get("postpone_cookie_update")
            .map_err(|e| StoreError::Unexpected(e.to_string()))?,
        ended: row.try_get("ended").map_err(|e| StoreError::Unexpected(e.to_string()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| StoreError::Unexpected(e.to_string()))?,
        updated_at: row
            .try_get("updated_at")
            .map_err(|e| StoreError::Unexpected(e.to_string()))?,
    })
}

#[async_trait]
impl ClientBackend for RelationalStore {
    async fn create_client(&self, client: Client) -> Result<Client, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO clients (id, instance_id, rotating_token, cookie_value, postpone_cookie_update, ended, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(client.id.as_str())
        .bind(client.instance_id.as_str())
        .bind(&client.rotating_token)
        .bind(&client.cookie_value)
        .bind(client.postpone_cookie_update)
        .bind(client.ended)
        .bind(client.created_at)
        .bind(client.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(client),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(StoreError::Conflict),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_client(&self, instance_id: &TypedId, id: &TypedId) -> Result<Option<Client>, StoreError> {
        let row = sqlx::query("SELECT * FROM clients WHERE instance_id = $1 AND id = $2")
            .bind(instance_id.as_str())
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_client).transpose()
    }

    async fn update_client(&self, client: Client) -> Result<Client, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE clients SET
                rotating_token = $3, cookie_value = $4, rotating_token_nonce = $5,
                sign_in_id = $6, sign_up_id = $7,
                to_sign_in_account_transfer_id = $8, to_sign_up_account_transfer_id = $9,
                postpone_cookie_update = $10, ended = $11, updated_at = $12
            WHERE instance_id = $1 AND id = $2
            "#,
        )
        .bind(client.instance_id.as_str())
        .bind(client.id.as_str())
        .bind(&client.rotating_token)
        .bind(&client.cookie_value)
        .bind(&client.rotating_token_nonce)
        .bind(client.sign_in_id.as_ref().map(TypedId::as_str))
        .bind(client.sign_up_id.as_ref().map(TypedId::as_str))
        .bind(client.to_sign_in_account_transfer_id.as_ref().map(TypedId::as_str))
        .bind(client.to_sign_up_account_transfer_id.as_ref().map(TypedId::as_str))
        .bind(client.postpone_cookie_update)
        .bind(client.ended)
        .bind(client.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NoRecords);
        }
        Ok(client)
    }

    async fn delete_client(&self, instance_id: &TypedId, id: &TypedId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM clients WHERE instance_id = $1 AND id = $2")
            .bind(instance_id.as_str())
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_session(&self, session: Session) -> Result<Session, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, instance_id, client_id, user_id, status, expire_at, abandon_at, touched_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(session.id.as_str())
        .bind(session.instance_id.as_str())
        .bind(session.client_id.as_str())
        .bind(session.user_id.as_str())
        .bind(status_to_str(session.status))
        .bind(session.expire_at)
        .bind(session.abandon_at)
        .bind(session.touched_at)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(session)
    }

    async fn find_session(&self, instance_id: &TypedId, id: &TypedId) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE instance_id = $1 AND id = $2")
            .bind(instance_id.as_str())
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_session).transpose()
    }

    async fn update_session(&self, session: Session) -> Result<Session, StoreError> {
        let result = sqlx::query(
            "UPDATE sessions SET status = $3, replacement_session_id = $4, touched_at = $5, active_organization_id = $6, updated_at = $7 WHERE instance_id = $1 AND id = $2",
        )
        .bind(session.instance_id.as_str())
        .bind(session.id.as_str())
        .bind(status_to_str(session.status))
        .bind(session.replacement_session_id.as_ref().map(TypedId::as_str))
        .bind(session.touched_at)
        .bind(session.active_organization_id.as_ref().map(TypedId::as_str))
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NoRecords);
        }
        Ok(session)
    }

    async fn delete_session(&self, instance_id: &TypedId, id: &TypedId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE instance_id = $1 AND id = $2")
            .bind(instance_id.as_str())
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_client_sessions(
        &self,
        instance_id: &TypedId,
        client_id: &TypedId,
        active_only: bool,
    ) -> Result<Vec<Session>, StoreError> {
        let rows = if active_only {
            sqlx::query("SELECT * FROM sessions WHERE instance_id = $1 AND client_id = $2 AND status = 'active'")
                .bind(instance_id.as_str())
                .bind(client_id.as_str())
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query("SELECT * FROM sessions WHERE instance_id = $1 AND client_id = $2")
                .bind(instance_id.as_str())
                .bind(client_id.as_str())
                .fetch_all(&self.pool)
                .await?
        };
        rows.iter().map(row_to_session).collect()
    }

    async fn list_user_sessions(
        &self,
        instance_id: &TypedId,
        user_id: &TypedId,
        active_only: bool,
    ) -> Result<Vec<Session>, StoreError> {
        let rows = if active_only {
            sqlx::query("SELECT * FROM sessions WHERE instance_id = $1 AND user_id = $2 AND status = 'active'")
                .bind(instance_id.as_str())
                .bind(user_id.as_str())
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query("SELECT * FROM sessions WHERE instance_id = $1 AND user_id = $2")
                .bind(instance_id.as_str())
                .bind(user_id.as_str())
                .fetch_all(&self.pool)
                .await?
        };
        rows.iter().map(row_to_session).collect()
    }
}

fn row_to_session(row: &sqlx::postgres::PgRow) -> Result<Session, StoreError> {
    let status_str: String = row.try_get("status").map_err(|e| StoreError::Unexpected(e.to_string()))?;
    Ok(Session {
        id: TypedId::new(row.try_get::<String, _>("id").map_err(|e| StoreError::Unexpected(e.to_string()))?),
        instance_id: TypedId::new(
            row.try_get::<String, _>("instance_id")
                .map_err(|e| StoreError::Unexpected(e.to_string()))?,
        ),
        client_id: TypedId::new(
            row.try_get::<String, _>("client_id")
                .map_err(|e| StoreError::Unexpected(e.to_string()))?,
        ),
        user_id: TypedId::new(
            row.try_get::<String, _>("user_id")
                .map_err(|e| StoreError::Unexpected(e.to_string()))?,
        ),
        replacement_session_id: row
            .try_get::<Option<String>, _>("replacement_session_id")
            .map_err(|e| StoreError::Unexpected(e.to_string()))?
            .map(TypedId::new),
        status: status_from_str(&status_str)?,
        expire_at: row.try_get("expire_at").map_err(|e| StoreError::Unexpected(e.to_string()))?,
        abandon_at: row.try_get("abandon_at").map_err(|e| StoreError::Unexpected(e.to_string()))?,
        touched_at: row.try_get("touched_at").map_err(|e| StoreError::Unexpected(e.to_string()))?,
        session_inactivity_timeout: row
            .try_get("session_inactivity_timeout")
            .map_err(|e| StoreError::Unexpected(e.to_string()))?,
        active_organization_id: row
            .try_get::<Option<String>, _>("active_organization_id")
            .map_err(|e| StoreError::Unexpected(e.to_string()))?
            .map(TypedId::new),
        actor: row.try_get("actor").map_err(|e| StoreError::Unexpected(e.to_string()))?,
        last_touched_signaled_at: row
            .try_get("last_touched_signaled_at")
            .map_err(|e| StoreError::Unexpected(e.to_string()))?,
        last_token_issued_at: row
            .try_get("last_token_issued_at")
            .map_err(|e| StoreError::Unexpected(e.to_string()))?,
        created_at: row.try_get("created_at").map_err(|e| StoreError::Unexpected(e.to_string()))?,
        updated_at: row.try_get("updated_at").map_err(|e| StoreError::Unexpected(e.to_string()))?,
    })
}

fn status_from_str(s: &str) -> Result<SessionStatus, StoreError> {
    Ok(match s {
        "pending_activation" => SessionStatus::PendingActivation,
        "active" => SessionStatus::Active,
        "ended" => SessionStatus::Ended,
        "removed" => SessionStatus::Removed,
        "replaced" => SessionStatus::Replaced,
        "abandoned" => SessionStatus::Abandoned,
        "expired" => SessionStatus::Expired,
        other => return Err(StoreError::Unexpected(format!("unknown session status {other}"))),
    })
}

fn status_to_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::PendingActivation => "pending_activation",
        SessionStatus::Active => "active",
        SessionStatus::Ended => "ended",
        SessionStatus::Removed => "removed",
        SessionStatus::Replaced => "replaced",
        SessionStatus::Abandoned => "abandoned",
        SessionStatus::Expired => "expired",
    }
}
