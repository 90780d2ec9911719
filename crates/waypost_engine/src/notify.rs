//! Terminal-failure notifications (spec §7 "user-visible failure
//! behavior"). No direct teacher/original equivalent — the original bot
//! never notified on terminal failure — implemented as thin wrapper
//! calls over `MessengerDriver::send_text`. A notification failure is
//! logged and otherwise ignored: it must never flip the job back to a
//! non-terminal state, since by the time these run the job is already
//! terminal.

use waypost_messenger::MessengerDriver;
use waypost_store::types::Job;
use tracing::warn;

/// Download terminal-fail: message to the requester, CC admins with user
/// and item context.
pub async fn download_failed(messenger: &dyn MessengerDriver, job: &Job, error: &str, admin_chat_ids: &[i64]) {
    let requester_text = format!("delivery failed, job #{}: {error}", job.id);
    if let Err(e) = messenger.send_text(job.chat_id, &requester_text).await {
        warn!(job_id = job.id, error = %e, "failed to notify requester of terminal download failure");
    }

    let admin_text = format!(
        "download job #{} failed (chat {}, user {}, item {}): {error}",
        job.id, job.chat_id, job.user_id, job.item_id
    );
    for admin_chat in admin_chat_ids {
        if let Err(e) = messenger.send_text(*admin_chat, &admin_text).await {
            warn!(job_id = job.id, chat_id = admin_chat, error = %e, "admin fan-out failed for terminal download failure");
        }
    }
}

/// Sync-catalog terminal-fail: admin fan-out only.
pub async fn sync_failed(messenger: &dyn MessengerDriver, job: &Job, error: &str, admin_chat_ids: &[i64]) {
    let text = format!("catalog sync job #{} failed: {error}", job.id);
    for admin_chat in admin_chat_ids {
        if let Err(e) = messenger.send_text(*admin_chat, &text).await {
            warn!(job_id = job.id, chat_id = admin_chat, error = %e, "admin fan-out failed for terminal sync failure");
        }
    }
}
