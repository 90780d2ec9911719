//! Pre-expiry warning sweep: a periodic task that expires overdue grants,
//! then warns users whose access will lapse soon.
//!
//! Grounded on the original's `fetch_users_expiring_within` +
//! `mark_user_warned_24h` pair, run on a `tokio::time::interval` the way
//! the teacher's sentinel runs its periodic stale-worker cleanup inside
//! its main loop — given its own task here since spec §4.5 calls it a
//! "long-running task", not an inline loop step.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration as ChronoDuration, Utc};
use sqlx::SqlitePool;
use tracing::{error, info, warn};
use waypost_messenger::MessengerDriver;
use waypost_store::users;

use crate::error::Result;
use crate::lifecycle::expire_users;

/// One pass: expire overdue grants, then warn every active user whose
/// expiry falls within `warn_before` and who has not already been warned
/// for this grant. A messenger failure for one user is logged and does
/// not stop the sweep from processing the rest, nor does it stamp
/// `warned_at` for that user — the next pass will retry them.
pub async fn sweep_once(
    pool: &SqlitePool,
    messenger: &Arc<dyn MessengerDriver>,
    admin_chat_ids: &[i64],
    warn_before: ChronoDuration,
) -> Result<()> {
    let now = Utc::now();
    expire_users(pool, now).await?;

    let due = users::find_due_for_warning(pool, now, warn_before).await?;
    for user in due {
        let text = format!(
            "Your access expires soon, on {}. Contact an admin to extend it.",
            user.expires_at.map(|e| e.to_rfc3339()).unwrap_or_default()
        );

        if let Err(e) = messenger.send_text(user.external_user_id, &text).await {
            warn!(user_id = user.id, error = %e, "warning message failed, will retry next sweep");
            continue;
        }

        let admin_text = format!(
            "User {} (id {}) expires on {}.",
            user.external_user_id,
            user.id,
            user.expires_at.map(|e| e.to_rfc3339()).unwrap_or_default()
        );
        for admin_chat in admin_chat_ids {
            if let Err(e) = messenger.send_text(*admin_chat, &admin_text).await {
                error!(chat_id = admin_chat, error = %e, "admin warning fan-out failed");
            }
        }

        users::mark_warned(pool, user.id, now).await?;
        info!(user_id = user.id, "pre-expiry warning sent");
    }

    Ok(())
}

/// Run `sweep_once` forever, waking every `check_interval`. Intended to
/// be spawned as its own task by the worker binary.
pub async fn run(
    pool: SqlitePool,
    messenger: Arc<dyn MessengerDriver>,
    admin_chat_ids: Vec<i64>,
    check_interval: StdDuration,
    warn_before: ChronoDuration,
) {
    let mut ticker = tokio::time::interval(check_interval);
    loop {
        ticker.tick().await;
        if let Err(e) = sweep_once(&pool, &messenger, &admin_chat_ids, warn_before).await {
            error!(error = %e, "warn sweep pass failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use waypost_messenger::{ContentHandle, MessengerError};
    use waypost_store::pool::{connect, DbConfig};
    use waypost_store::types::UserStatus;

    struct RecordingMessenger {
        sent: Mutex<Vec<(i64, String)>>,
        fail_chat: Option<i64>,
    }

    #[async_trait]
    impl MessengerDriver for RecordingMessenger {
        async fn send_text(&self, chat_id: i64, text: &str) -> waypost_messenger::Result<()> {
            if self.fail_chat == Some(chat_id) {
                return Err(MessengerError::Transient("boom".into()));
            }
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }

        async fn send_file(&self, _chat_id: i64, _local_path: &Path, _caption: &str) -> waypost_messenger::Result<ContentHandle> {
            unimplemented!("not exercised by warn sweep tests")
        }

        async fn send_by_handle(&self, _chat_id: i64, _handle: &ContentHandle, _caption: &str) -> waypost_messenger::Result<ContentHandle> {
            unimplemented!("not exercised by warn sweep tests")
        }
    }

    #[tokio::test]
    async fn warns_once_per_grant() {
        let pool = connect(&DbConfig::new(":memory:")).await.unwrap();
        let user = users::get_or_create(&pool, 42).await.unwrap();
        users::set_status(&pool, user.id, UserStatus::Active).await.unwrap();
        users::set_expiry(&pool, user.id, Some(Utc::now() + ChronoDuration::minutes(30)))
            .await
            .unwrap();

        let recorder = Arc::new(RecordingMessenger {
            sent: Mutex::new(Vec::new()),
            fail_chat: None,
        });
        let messenger: Arc<dyn MessengerDriver> = recorder.clone();

        sweep_once(&pool, &messenger, &[999], ChronoDuration::hours(24)).await.unwrap();
        let reloaded = users::find_by_id(&pool, user.id).await.unwrap();
        assert!(reloaded.warned_at.is_some());
        let warned_at_first = reloaded.warned_at;

        // A second pass within the same grant must not warn again.
        sweep_once(&pool, &messenger, &[999], ChronoDuration::hours(24)).await.unwrap();
        let reloaded = users::find_by_id(&pool, user.id).await.unwrap();
        assert_eq!(reloaded.warned_at, warned_at_first);

        let user_messages = recorder
            .sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(chat_id, _)| *chat_id == user.external_user_id)
            .count();
        assert_eq!(user_messages, 1);
    }

    #[tokio::test]
    async fn messenger_failure_does_not_stamp_warned_at() {
        let pool = connect(&DbConfig::new(":memory:")).await.unwrap();
        let user = users::get_or_create(&pool, 7).await.unwrap();
        users::set_status(&pool, user.id, UserStatus::Active).await.unwrap();
        users::set_expiry(&pool, user.id, Some(Utc::now() + ChronoDuration::minutes(10)))
            .await
            .unwrap();

        let messenger: Arc<dyn MessengerDriver> = Arc::new(RecordingMessenger {
            sent: Mutex::new(Vec::new()),
            fail_chat: Some(7),
        });

        sweep_once(&pool, &messenger, &[], ChronoDuration::hours(24)).await.unwrap();
        let reloaded = users::find_by_id(&pool, user.id).await.unwrap();
        assert!(reloaded.warned_at.is_none());
    }
}
