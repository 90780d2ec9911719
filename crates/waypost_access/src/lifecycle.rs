//! User status state machine and the `ensure_active` gate.
//!
//! Grounded on the original bot's `activate_user`/`extend_user`/
//! `set_user_status` functions (`db.py`) — the "max(now, current_expiry)
//! + add" extension rule is copied verbatim from `extend_user`.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use waypost_store::types::{User, UserStatus};
use waypost_store::users;

use crate::error::{AccessError, Result};

/// Gate in front of catalog reads/writes. A per-process `enabled` flag
/// lets deployments turn enforcement off entirely (e.g. a private single
/// admin instance); admins always bypass regardless of status.
#[derive(Clone)]
pub struct AccessControl {
    pool: SqlitePool,
    admin_external_ids: Vec<i64>,
    enabled: bool,
}

impl AccessControl {
    pub fn new(pool: SqlitePool, admin_external_ids: Vec<i64>, enabled: bool) -> Self {
        Self {
            pool,
            admin_external_ids,
            enabled,
        }
    }

    pub fn is_admin(&self, external_user_id: i64) -> bool {
        self.admin_external_ids.contains(&external_user_id)
    }

    /// Opportunistically expires overdue grants, then denies non-admin
    /// non-active users with a status-specific error. Admins and active
    /// users pass through regardless of `enabled`'s value for admins —
    /// the flag only gates ordinary users.
    pub async fn ensure_active(&self, external_user_id: i64) -> Result<User> {
        expire_users(&self.pool, Utc::now()).await?;
        let user = users::get_or_create(&self.pool, external_user_id).await?;

        if self.is_admin(external_user_id) {
            return Ok(user);
        }
        if !self.enabled {
            return Ok(user);
        }
        if user.status() == UserStatus::Active {
            return Ok(user);
        }
        Err(AccessError::Denied(user.status()))
    }

    /// guest -> pending, a self-service access request.
    pub async fn request_access(&self, external_user_id: i64) -> Result<()> {
        let user = users::get_or_create(&self.pool, external_user_id).await?;
        if user.status() == UserStatus::Guest {
            users::set_status(&self.pool, user.id, UserStatus::Pending).await?;
        }
        Ok(())
    }

    /// Admin activation: any status -> active, expiry = now + ttl_days.
    pub async fn activate(&self, user_id: i64, ttl_days: i64) -> Result<()> {
        users::activate(&self.pool, user_id, ttl_days, Utc::now()).await?;
        info!(user_id, ttl_days, "user activated");
        Ok(())
    }

    /// Admin extension: expiry = max(now, current expiry) + add_days.
    pub async fn extend(&self, user_id: i64, add_days: i64) -> Result<()> {
        users::extend(&self.pool, user_id, add_days, Utc::now()).await?;
        info!(user_id, add_days, "user access extended");
        Ok(())
    }

    /// Admin block: any status -> blocked, expiry cleared.
    pub async fn block(&self, user_id: i64) -> Result<()> {
        users::set_status(&self.pool, user_id, UserStatus::Blocked).await?;
        users::set_expiry(&self.pool, user_id, None).await?;
        info!(user_id, "user blocked");
        Ok(())
    }
}

/// Transition every active user whose expiry has passed to `expired`.
/// Returns the number of users transitioned.
pub async fn expire_users(pool: &SqlitePool, now: chrono::DateTime<Utc>) -> Result<u64> {
    let newly_expired = users::find_newly_expired(pool, now).await?;
    for user in &newly_expired {
        users::set_status(pool, user.id, UserStatus::Expired).await?;
    }
    if !newly_expired.is_empty() {
        info!(count = newly_expired.len(), "users expired");
    }
    Ok(newly_expired.len() as u64)
}

/// A human recovery message tailored to the user's current status,
/// shown by the chat surface when `ensure_active` denies a request.
pub fn denial_message(status: UserStatus) -> &'static str {
    match status {
        UserStatus::Guest => "You don't have access yet. Send /request to ask for access.",
        UserStatus::Pending => "Your access request is pending admin approval.",
        UserStatus::Expired => "Your access has expired. Send /request to ask for renewal.",
        UserStatus::Blocked => "Your access has been blocked.",
        UserStatus::Active => "",
    }
}
