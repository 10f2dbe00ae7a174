use std::sync::Arc;

use tracing::info;

use cachefarm_wire::{ContentPayload, DomainChangeType, DomainPayload, LanguageChangeType, LanguagePayload, ids};

use super::content::ContentCacheRefresher;
use super::decode_payloads;
use crate::cache::error::CacheError;
use crate::cache::keys::{EntityKind, runtime};
use crate::cache::refresher::{CacheRefresher, RefresherDescriptor, RefresherKind};
use crate::cache::snapshot::PublishedSnapshotService;
use crate::cache::store::AppCaches;

pub static DESCRIPTOR: RefresherDescriptor =
    RefresherDescriptor::new(ids::LANGUAGE, "language", RefresherKind::JsonPayload);

/// Languages feed dictionary lookups, domain cultures and every variant
/// content item, so removals and culture changes reach all of them.
pub struct LanguageCacheRefresher {
    caches: Arc<AppCaches>,
    content: Arc<ContentCacheRefresher>,
    snapshot: Arc<dyn PublishedSnapshotService>,
}

impl LanguageCacheRefresher {
    pub fn new(
        caches: Arc<AppCaches>,
        content: Arc<ContentCacheRefresher>,
        snapshot: Arc<dyn PublishedSnapshotService>,
    ) -> Self {
        Self {
            caches,
            content,
            snapshot,
        }
    }

    pub fn refresh_payloads(&self, payloads: &[LanguagePayload]) {
        if payloads.is_empty() {
            return;
        }

        let isolated = &self.caches.isolated;
        isolated.clear(EntityKind::Language);
        isolated.clear(EntityKind::DictionaryItem);

        let culture_changed = payloads.iter().any(|payload| {
            matches!(
                payload.change_type,
                LanguageChangeType::Remove | LanguageChangeType::ChangeCulture
            )
        });
        if !culture_changed {
            return;
        }

        info!(
            languages = payloads.len(),
            "Language culture changed, rebuilding domains and content"
        );
        isolated.clear(EntityKind::Domain);
        self.caches.runtime.clear_prefix(runtime::PUBLISHED_URL);
        self.snapshot.notify_domains(&[DomainPayload {
            id: 0,
            change_type: DomainChangeType::RefreshAll,
        }]);
        self.content.refresh_payloads(&[ContentPayload::refresh_all()]);
    }
}

impl CacheRefresher for LanguageCacheRefresher {
    fn descriptor(&self) -> &RefresherDescriptor {
        &DESCRIPTOR
    }

    fn refresh_json(&self, json: &str) -> Result<(), CacheError> {
        let payloads: Vec<LanguagePayload> = decode_payloads(&DESCRIPTOR, json)?;
        self.refresh_payloads(&payloads);
        Ok(())
    }
}
