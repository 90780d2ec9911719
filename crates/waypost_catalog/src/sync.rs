//! Bounded BFS tree walk, upsert-with-watermark, and soft-deletion.
//!
//! Grounded on the original bot's `mark_deleted_not_seen`/
//! `upsert_catalog_item` contract (`db.py`) for the per-node bookkeeping,
//! and on the teacher's tree-walk shape (`casparian_scout`'s scanner: an
//! explicit work queue, a running-stats struct, `tracing` progress
//! events) — adapted from a parallel filesystem walker to a sequential
//! BFS over `StorageDriver`, since a remote listing is paginated and
//! network-bound rather than a local `WalkParallel` candidate.

use std::collections::{HashSet, VecDeque};

use chrono::Utc;
use tracing::{info, warn};
use waypost_storage::{EntryKind, StorageDriver};
use waypost_store::types::CatalogKind;
use waypost_store::{catalog, meta};

use crate::error::Result;

/// Node budget a sync pass will observe before truncating. Spec §4.6
/// default.
pub const DEFAULT_NODE_BUDGET: usize = 5_000;

/// Outcome of one synchronization pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOutcome {
    pub observed: u64,
    pub deleted: u64,
    /// True when `observed` reached the budget before the walk finished —
    /// the delete pass is skipped in this case (see SPEC_FULL.md §9.1).
    pub truncated: bool,
}

/// Run one synchronization pass rooted at `root` against `storage`,
/// reconciling observations into the catalog store.
pub async fn sync_catalog(
    pool: &sqlx::SqlitePool,
    storage: &dyn StorageDriver,
    root: &str,
    budget: usize,
) -> Result<SyncOutcome> {
    let watermark = Utc::now();
    let root = canonical_root(root);

    catalog::upsert_seen(
        pool,
        &root,
        CatalogKind::Folder,
        title_for(&root),
        None,
        None,
        None,
        watermark,
    )
    .await?;

    let mut queue = VecDeque::new();
    let mut visited = HashSet::new();
    queue.push_back(root.clone());
    visited.insert(root.clone());

    let mut observed: u64 = 0;
    let mut truncated = false;

    'walk: while let Some(current) = queue.pop_front() {
        let entries = storage.list(&current).await?;

        for entry in entries {
            if !under_root(&entry.path, &root) {
                warn!(path = %entry.path, root = %root, "sync: skipping entry outside root subtree");
                continue;
            }

            let kind = match entry.kind {
                EntryKind::Folder => CatalogKind::Folder,
                EntryKind::File => CatalogKind::File,
            };

            catalog::upsert_seen_with_fingerprint(
                pool,
                &entry.path,
                kind,
                &entry.name,
                Some(&entry.path),
                entry.size_bytes,
                Some(&current),
                entry.content_fingerprint.as_deref(),
                watermark,
            )
            .await?;

            observed += 1;

            if kind == CatalogKind::Folder && visited.insert(entry.path.clone()) {
                queue.push_back(entry.path);
            }

            if observed >= budget as u64 {
                truncated = true;
                break 'walk;
            }
        }
    }

    let deleted = if truncated {
        info!(root = %root, observed, budget, "sync truncated at node budget, skipping delete pass");
        0
    } else {
        catalog::mark_unseen_since_deleted(pool, &root, watermark).await?
    };

    meta::record_catalog_sync(pool, watermark, deleted).await?;
    info!(root = %root, observed, deleted, truncated, "catalog sync finished");

    Ok(SyncOutcome {
        observed,
        deleted,
        truncated,
    })
}

fn canonical_root(root: &str) -> String {
    if root.is_empty() {
        return "/".to_string();
    }
    if root.len() > 1 {
        root.trim_end_matches('/').to_string()
    } else {
        root.to_string()
    }
}

fn under_root(path: &str, root: &str) -> bool {
    if root == "/" {
        return path.starts_with('/');
    }
    path == root || path.starts_with(&format!("{root}/"))
}

fn title_for(path: &str) -> &str {
    if path == "/" {
        return "root";
    }
    path.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use waypost_storage::{ByteStream, StorageEntry};
    use waypost_store::pool::{connect, DbConfig};

    struct FakeStorage {
        listings: Mutex<HashMap<String, Vec<StorageEntry>>>,
    }

    impl FakeStorage {
        fn new(listings: HashMap<String, Vec<StorageEntry>>) -> Self {
            Self {
                listings: Mutex::new(listings),
            }
        }
    }

    #[async_trait]
    impl StorageDriver for FakeStorage {
        async fn list(&self, path: &str) -> waypost_storage::Result<Vec<StorageEntry>> {
            Ok(self.listings.lock().unwrap().get(path).cloned().unwrap_or_default())
        }

        async fn stream(&self, _path: &str) -> waypost_storage::Result<ByteStream> {
            unimplemented!("not exercised by sync tests")
        }

        async fn close(&self) -> waypost_storage::Result<()> {
            Ok(())
        }
    }

    fn entry(name: &str, path: &str, kind: EntryKind, fingerprint: Option<&str>) -> StorageEntry {
        StorageEntry {
            name: name.to_string(),
            path: path.to_string(),
            kind,
            size_bytes: if kind == EntryKind::File { Some(10) } else { None },
            content_fingerprint: fingerprint.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn walks_tree_and_upserts_all_nodes() {
        let pool = connect(&DbConfig::new(":memory:")).await.unwrap();
        let mut listings = HashMap::new();
        listings.insert(
            "/".to_string(),
            vec![entry("X", "/X", EntryKind::Folder, None), entry("Y", "/Y", EntryKind::Folder, None)],
        );
        listings.insert("/X".to_string(), vec![entry("a", "/X/a", EntryKind::File, Some("h1"))]);
        listings.insert("/Y".to_string(), vec![]);
        let storage = FakeStorage::new(listings);

        let outcome = sync_catalog(&pool, &storage, "/", DEFAULT_NODE_BUDGET).await.unwrap();
        assert_eq!(outcome.observed, 3);
        assert!(!outcome.truncated);

        assert!(catalog::find_by_path(&pool, "/X/a").await.is_ok());
        assert!(catalog::find_by_path(&pool, "/Y").await.is_ok());
    }

    #[tokio::test]
    async fn s5_sync_with_deletion_matches_spec_scenario() {
        let pool = connect(&DbConfig::new(":memory:")).await.unwrap();
        let mut first = HashMap::new();
        first.insert(
            "/".to_string(),
            vec![entry("X", "/X", EntryKind::Folder, None), entry("Y", "/Y", EntryKind::Folder, None)],
        );
        first.insert(
            "/X".to_string(),
            vec![entry("a", "/X/a", EntryKind::File, Some("h-a")), entry("b", "/X/b", EntryKind::File, Some("h-b"))],
        );
        first.insert("/Y".to_string(), vec![]);
        let storage = FakeStorage::new(first);
        sync_catalog(&pool, &storage, "/", 1000).await.unwrap();

        // Second pass: /X/b has vanished from the backend.
        let mut second = HashMap::new();
        second.insert("/".to_string(), vec![entry("X", "/X", EntryKind::Folder, None), entry("Y", "/Y", EntryKind::Folder, None)]);
        second.insert("/X".to_string(), vec![entry("a", "/X/a", EntryKind::File, Some("h-a"))]);
        second.insert("/Y".to_string(), vec![]);
        let storage2 = FakeStorage::new(second);
        let outcome = sync_catalog(&pool, &storage2, "/", 1000).await.unwrap();

        assert_eq!(outcome.deleted, 1);
        let a = catalog::find_by_path(&pool, "/X/a").await.unwrap();
        assert!(!a.is_deleted());
        assert!(catalog::find_by_path(&pool, "/X/b").await.is_err());
        let x = catalog::find_by_path(&pool, "/X").await.unwrap();
        assert!(!x.is_deleted());
        let y = catalog::find_by_path(&pool, "/Y").await.unwrap();
        assert!(!y.is_deleted());
        let root = catalog::find_by_path(&pool, "/").await.unwrap();
        assert!(!root.is_deleted());
    }

    #[tokio::test]
    async fn truncated_sync_skips_delete_pass() {
        let pool = connect(&DbConfig::new(":memory:")).await.unwrap();
        let mut listings = HashMap::new();
        listings.insert(
            "/".to_string(),
            vec![
                entry("a", "/a", EntryKind::File, None),
                entry("b", "/b", EntryKind::File, None),
                entry("c", "/c", EntryKind::File, None),
            ],
        );
        let storage = FakeStorage::new(listings);

        // Seed a stale item that would otherwise be soft-deleted.
        catalog::upsert_seen(&pool, "/stale", CatalogKind::File, "stale", None, Some(1), None, Utc::now() - chrono::Duration::days(1))
            .await
            .unwrap();

        let outcome = sync_catalog(&pool, &storage, "/", 2).await.unwrap();
        assert!(outcome.truncated);
        assert_eq!(outcome.deleted, 0);
        let stale = catalog::find_by_path(&pool, "/stale").await.unwrap();
        assert!(!stale.is_deleted());
    }

    #[tokio::test]
    async fn reconciliation_is_idempotent() {
        let pool = connect(&DbConfig::new(":memory:")).await.unwrap();
        let mut listings = HashMap::new();
        listings.insert("/".to_string(), vec![entry("a", "/a", EntryKind::File, Some("h1"))]);
        let storage = FakeStorage::new(listings);

        let first = sync_catalog(&pool, &storage, "/", 1000).await.unwrap();
        let second = sync_catalog(&pool, &storage, "/", 1000).await.unwrap();
        assert_eq!(first.observed, second.observed);
        assert_eq!(second.deleted, 0);
    }
}
