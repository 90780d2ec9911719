//! Shared row types and enums for the relational store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum UserStatus {
    Guest,
    Pending,
    Active,
    Expired,
    Blocked,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Guest => "guest",
            UserStatus::Pending => "pending",
            UserStatus::Active => "active",
            UserStatus::Expired => "expired",
            UserStatus::Blocked => "blocked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "guest" => Some(UserStatus::Guest),
            "pending" => Some(UserStatus::Pending),
            "active" => Some(UserStatus::Active),
            "expired" => Some(UserStatus::Expired),
            "blocked" => Some(UserStatus::Blocked),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum CatalogKind {
    Folder,
    File,
}

impl CatalogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::Folder => "folder",
            CatalogKind::File => "file",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum JobKind {
    Download,
    SyncCatalog,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Download => "download",
            JobKind::SyncCatalog => "sync_catalog",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed | JobState::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum AuditResult {
    Succeeded,
    Failed,
}

impl AuditResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditResult::Succeeded => "succeeded",
            AuditResult::Failed => "failed",
        }
    }
}

/// Delivery mode recorded on an audit row. `None` is represented as the
/// absence of a row value (nullable column) rather than a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum AuditMode {
    CachedHandle,
    Upload,
}

impl AuditMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditMode::CachedHandle => "cached_handle",
            AuditMode::Upload => "upload",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub external_user_id: i64,
    pub created_at: DateTime<Utc>,
    pub status: String,
    pub note: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub warned_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn status(&self) -> UserStatus {
        UserStatus::parse(&self.status).unwrap_or(UserStatus::Guest)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CatalogItem {
    pub id: i64,
    pub path: String,
    pub kind: String,
    pub title: String,
    pub storage_id: Option<String>,
    pub size_bytes: Option<i64>,
    pub parent_path: Option<String>,
    pub cached_handle_id: Option<String>,
    pub cached_handle_unique_id: Option<String>,
    pub content_fingerprint: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
    pub is_deleted: i64,
    pub updated_at: DateTime<Utc>,
}

impl CatalogItem {
    pub fn kind(&self) -> CatalogKind {
        if self.kind == "folder" {
            CatalogKind::Folder
        } else {
            CatalogKind::File
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted != 0
    }

    pub fn cached_handle(&self) -> Option<(String, String)> {
        match (&self.cached_handle_id, &self.cached_handle_unique_id) {
            (Some(id), Some(uid)) => Some((id.clone(), uid.clone())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CatalogChild {
    pub id: i64,
    pub kind: String,
    pub title: String,
    pub size_bytes: Option<i64>,
    pub path: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Job {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub chat_id: i64,
    pub user_id: i64,
    pub item_id: i64,
    pub kind: String,
    pub state: String,
    pub attempt: i64,
    pub last_error: Option<String>,
    pub correlation: String,
}

impl Job {
    pub fn kind(&self) -> JobKind {
        if self.kind == "sync_catalog" {
            JobKind::SyncCatalog
        } else {
            JobKind::Download
        }
    }

    pub fn state(&self) -> JobState {
        match self.state.as_str() {
            "queued" => JobState::Queued,
            "running" => JobState::Running,
            "succeeded" => JobState::Succeeded,
            "failed" => JobState::Failed,
            _ => JobState::Cancelled,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DownloadAudit {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub job_id: i64,
    pub chat_id: i64,
    pub user_id: i64,
    pub item_id: i64,
    pub result: String,
    pub mode: Option<String>,
    pub bytes: Option<i64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct SearchSession {
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub user_id: i64,
    pub scope_path: String,
    pub query: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct AdminSession {
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub user_id: i64,
    pub query: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AuditRollup {
    pub succeeded: i64,
    pub failed: i64,
}

#[derive(Debug, Clone)]
pub struct TopDownload {
    pub item_id: i64,
    pub count: i64,
    pub path: String,
    pub title: String,
}
