use std::sync::Arc;

use tracing::debug;

use cachefarm_wire::{ContentPayload, TreeChangeTypes, ids};

use super::decode_payloads;
use crate::cache::error::CacheError;
use crate::cache::keys::{self, EntityKind, runtime};
use crate::cache::refresher::{CacheRefresher, RefresherDescriptor, RefresherKind};
use crate::cache::snapshot::PublishedSnapshotService;
use crate::cache::store::AppCaches;

pub static DESCRIPTOR: RefresherDescriptor =
    RefresherDescriptor::new(ids::CONTENT, "content", RefresherKind::JsonPayload);

/// Content changes travel as tree change payloads only.
pub struct ContentCacheRefresher {
    caches: Arc<AppCaches>,
    snapshot: Arc<dyn PublishedSnapshotService>,
}

impl ContentCacheRefresher {
    pub fn new(caches: Arc<AppCaches>, snapshot: Arc<dyn PublishedSnapshotService>) -> Self {
        Self { caches, snapshot }
    }

    /// Clears repository caches for every payload, then tells the snapshot.
    pub fn refresh_payloads(&self, payloads: &[ContentPayload]) {
        if payloads.is_empty() {
            return;
        }

        let mut refresh_all = false;
        for payload in payloads {
            if payload.change_types.contains(TreeChangeTypes::REFRESH_ALL) {
                refresh_all = true;
                self.caches.isolated.clear(EntityKind::Content);
                self.caches.id_keys.clear_all();
                continue;
            }
            self.evict_node(payload);
        }

        let outcome = self.snapshot.notify_content(payloads);
        debug!(
            payloads = payloads.len(),
            refresh_all,
            draft_changed = outcome.draft_changed,
            published_changed = outcome.published_changed,
            "Content snapshot notified"
        );

        if refresh_all || outcome.published_changed {
            self.caches.runtime.clear_prefix(runtime::PARTIAL_VIEW);
            self.caches.runtime.clear_prefix(runtime::MACRO_CONTENT);
        }
    }

    fn evict_node(&self, payload: &ContentPayload) {
        let isolated = &self.caches.isolated;
        let id = payload.id;

        isolated.evict_entity(EntityKind::Content, id);
        if let Some(key) = payload.key {
            isolated.clear_key(EntityKind::Content, &keys::by_key(key));
            self.caches.id_keys.clear_key(key);
        }
        self.caches.id_keys.clear_id(id);

        if payload
            .change_types
            .intersects(TreeChangeTypes::REFRESH_BRANCH | TreeChangeTypes::REMOVE)
        {
            isolated.clear_branch(EntityKind::Content, id);
        }

        if payload.change_types.contains(TreeChangeTypes::REMOVE) {
            // Domains and access rules hang off the removed subtree.
            isolated.clear_branch(EntityKind::Domain, id);
            isolated.clear_branch(EntityKind::PublicAccess, id);
            self.caches.runtime.clear_prefix(runtime::PUBLISHED_URL);
        }
    }
}

impl CacheRefresher for ContentCacheRefresher {
    fn descriptor(&self) -> &RefresherDescriptor {
        &DESCRIPTOR
    }

    fn refresh_json(&self, json: &str) -> Result<(), CacheError> {
        let payloads: Vec<ContentPayload> = decode_payloads(&DESCRIPTOR, json)?;
        self.refresh_payloads(&payloads);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::cache::refresher::Operation;
    use crate::cache::refreshers::test_support::{cached, caches, seed, seed_node};
    use crate::cache::snapshot::{ContentNotifyOutcome, RecordingSnapshotService, SnapshotNotification};
    use crate::cache::store::CachedEntry;

    fn refresher(
        snapshot: RecordingSnapshotService,
    ) -> (ContentCacheRefresher, Arc<AppCaches>, Arc<RecordingSnapshotService>) {
        let caches = caches();
        let snapshot = Arc::new(snapshot);
        (
            ContentCacheRefresher::new(Arc::clone(&caches), snapshot.clone()),
            caches,
            snapshot,
        )
    }

    #[test]
    fn branch_refresh_clears_descendants_and_partial_views() {
        let (refresher, caches, snapshot) = refresher(RecordingSnapshotService::new());
        seed_node(&caches, EntityKind::Content, 42, "-1,42");
        seed_node(&caches, EntityKind::Content, 43, "-1,42,43");
        seed_node(&caches, EntityKind::Content, 44, "-1,44");
        caches.runtime.insert("partial-view:nav", json!("<nav/>"));

        refresher
            .refresh_json(r#"[{"Id":42,"ChangeTypes":4}]"#)
            .unwrap();

        assert!(!cached(&caches, EntityKind::Content, 42));
        assert!(!cached(&caches, EntityKind::Content, 43));
        assert!(cached(&caches, EntityKind::Content, 44));
        assert!(!caches.runtime.contains("partial-view:nav"));
        assert_eq!(
            snapshot.notifications(),
            vec![SnapshotNotification::Content(vec![ContentPayload::new(
                42,
                None,
                TreeChangeTypes::REFRESH_BRANCH
            )])]
        );
    }

    #[test]
    fn node_refresh_keeps_descendants() {
        let (refresher, caches, _) = refresher(RecordingSnapshotService::new());
        seed_node(&caches, EntityKind::Content, 42, "-1,42");
        seed_node(&caches, EntityKind::Content, 43, "-1,42,43");

        refresher
            .refresh_payloads(&[ContentPayload::new(42, None, TreeChangeTypes::REFRESH_NODE)]);

        assert!(!cached(&caches, EntityKind::Content, 42));
        assert!(cached(&caches, EntityKind::Content, 43));
    }

    #[test]
    fn unchanged_published_snapshot_keeps_partial_views() {
        let (refresher, caches, _) = refresher(
            RecordingSnapshotService::new().with_content_outcome(ContentNotifyOutcome {
                draft_changed: true,
                published_changed: false,
            }),
        );
        caches.runtime.insert("partial-view:nav", json!("<nav/>"));

        refresher
            .refresh_payloads(&[ContentPayload::new(7, None, TreeChangeTypes::REFRESH_NODE)]);

        assert!(caches.runtime.contains("partial-view:nav"));
    }

    #[test]
    fn remove_clears_key_lookups_and_dependent_domains() {
        let (refresher, caches, _) = refresher(RecordingSnapshotService::new());
        let key = Uuid::new_v4();
        caches.isolated.insert(
            EntityKind::Content,
            keys::by_key(key),
            CachedEntry::new(json!({})),
        );
        caches.id_keys.set(42, key);
        caches.isolated.insert(
            EntityKind::Domain,
            keys::by_id(3),
            CachedEntry::new(json!("example.org")).with_path("-1,42"),
        );

        refresher
            .refresh_payloads(&[ContentPayload::new(42, Some(key), TreeChangeTypes::REMOVE)]);

        assert!(!caches.isolated.contains(EntityKind::Content, &keys::by_key(key)));
        assert_eq!(caches.id_keys.key_for(42), None);
        assert!(!cached(&caches, EntityKind::Domain, 3));
    }

    #[test]
    fn refresh_all_flushes_partition() {
        let (refresher, caches, _) = refresher(
            RecordingSnapshotService::new().with_content_outcome(ContentNotifyOutcome::default()),
        );
        seed(&caches, EntityKind::Content, 1);
        seed(&caches, EntityKind::Content, 2);
        caches.runtime.insert("macro-content:nav:1", json!("x"));

        refresher.refresh_payloads(&[ContentPayload::refresh_all()]);

        assert!(caches.isolated.is_empty(EntityKind::Content));
        assert!(caches.runtime.is_empty());
    }

    #[test]
    fn empty_batch_does_not_notify() {
        let (refresher, _, snapshot) = refresher(RecordingSnapshotService::new());
        refresher.refresh_json("").unwrap();
        refresher.refresh_json("[]").unwrap();
        assert!(snapshot.notifications().is_empty());
    }

    #[test]
    fn id_operations_are_unsupported() {
        let (refresher, _, _) = refresher(RecordingSnapshotService::new());
        assert!(matches!(
            refresher.refresh(1),
            Err(CacheError::Unsupported { operation: Operation::RefreshById, .. })
        ));
        assert!(matches!(
            refresher.refresh_all(),
            Err(CacheError::Unsupported { operation: Operation::RefreshAll, .. })
        ));
    }

    #[test]
    fn malformed_document_is_reported() {
        let (refresher, _, _) = refresher(RecordingSnapshotService::new());
        let err = refresher.refresh_json("{not json").unwrap_err();
        assert!(matches!(err, CacheError::MalformedPayload { refresher: "content", .. }));
    }
}
