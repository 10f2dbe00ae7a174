use std::sync::Arc;

use tracing::debug;

use cachefarm_wire::{MediaPayload, TreeChangeTypes, ids};

use super::decode_payloads;
use crate::cache::error::CacheError;
use crate::cache::keys::{self, EntityKind, runtime};
use crate::cache::refresher::{CacheRefresher, RefresherDescriptor, RefresherKind};
use crate::cache::snapshot::PublishedSnapshotService;
use crate::cache::store::AppCaches;

pub static DESCRIPTOR: RefresherDescriptor =
    RefresherDescriptor::new(ids::MEDIA, "media", RefresherKind::JsonPayload);

pub struct MediaCacheRefresher {
    caches: Arc<AppCaches>,
    snapshot: Arc<dyn PublishedSnapshotService>,
}

impl MediaCacheRefresher {
    pub fn new(caches: Arc<AppCaches>, snapshot: Arc<dyn PublishedSnapshotService>) -> Self {
        Self { caches, snapshot }
    }

    pub fn refresh_payloads(&self, payloads: &[MediaPayload]) {
        if payloads.is_empty() {
            return;
        }

        let isolated = &self.caches.isolated;
        for payload in payloads {
            if payload.change_types.contains(TreeChangeTypes::REFRESH_ALL) {
                isolated.clear(EntityKind::Media);
                continue;
            }

            isolated.evict_entity(EntityKind::Media, payload.id);
            if let Some(key) = payload.key {
                isolated.clear_key(EntityKind::Media, &keys::by_key(key));
                self.caches.id_keys.clear_key(key);
            }
            self.caches.id_keys.clear_id(payload.id);

            if payload
                .change_types
                .intersects(TreeChangeTypes::REFRESH_BRANCH | TreeChangeTypes::REMOVE)
            {
                isolated.clear_branch(EntityKind::Media, payload.id);
            }
        }

        let changed = self.snapshot.notify_media(payloads);
        debug!(payloads = payloads.len(), changed, "Media snapshot notified");
        if changed {
            self.caches.runtime.clear_prefix(runtime::PARTIAL_VIEW);
        }
    }
}

impl CacheRefresher for MediaCacheRefresher {
    fn descriptor(&self) -> &RefresherDescriptor {
        &DESCRIPTOR
    }

    fn refresh_json(&self, json: &str) -> Result<(), CacheError> {
        let payloads: Vec<MediaPayload> = decode_payloads(&DESCRIPTOR, json)?;
        self.refresh_payloads(&payloads);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::cache::refreshers::test_support::{cached, caches, seed_node};
    use crate::cache::snapshot::RecordingSnapshotService;

    #[test]
    fn removal_clears_subtree_and_partial_views() {
        let caches = caches();
        let refresher =
            MediaCacheRefresher::new(Arc::clone(&caches), Arc::new(RecordingSnapshotService::new()));
        seed_node(&caches, EntityKind::Media, 10, "-1,10");
        seed_node(&caches, EntityKind::Media, 11, "-1,10,11");
        caches.runtime.insert("partial-view:gallery", json!("<ul/>"));

        refresher.refresh_json(r#"[{"Id":10,"ChangeTypes":8}]"#).unwrap();

        assert!(!cached(&caches, EntityKind::Media, 10));
        assert!(!cached(&caches, EntityKind::Media, 11));
        assert!(!caches.runtime.contains("partial-view:gallery"));
    }

    #[test]
    fn unchanged_snapshot_keeps_partial_views() {
        let caches = caches();
        let refresher = MediaCacheRefresher::new(
            Arc::clone(&caches),
            Arc::new(RecordingSnapshotService::new().with_media_changed(false)),
        );
        caches.runtime.insert("partial-view:gallery", json!("<ul/>"));

        refresher.refresh_payloads(&[MediaPayload::new(10, None, TreeChangeTypes::REFRESH_NODE)]);

        assert!(caches.runtime.contains("partial-view:gallery"));
    }

    #[test]
    fn skips_malformed_entries_and_applies_the_rest() {
        let caches = caches();
        let refresher =
            MediaCacheRefresher::new(Arc::clone(&caches), Arc::new(RecordingSnapshotService::new()));
        seed_node(&caches, EntityKind::Media, 12, "-1,12");

        refresher
            .refresh_json(r#"[{"Id":"twelve"},{"Id":12,"ChangeTypes":2}]"#)
            .unwrap();

        assert!(!cached(&caches, EntityKind::Media, 12));
    }
}
