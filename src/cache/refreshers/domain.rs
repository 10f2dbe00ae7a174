use std::sync::Arc;

use cachefarm_wire::{DomainChangeType, DomainPayload, ids};

use super::decode_payloads;
use crate::cache::error::CacheError;
use crate::cache::keys::{EntityKind, runtime};
use crate::cache::refresher::{CacheRefresher, RefresherDescriptor, RefresherKind};
use crate::cache::snapshot::PublishedSnapshotService;
use crate::cache::store::AppCaches;

pub static DESCRIPTOR: RefresherDescriptor =
    RefresherDescriptor::new(ids::DOMAIN, "domain", RefresherKind::JsonPayload);

pub struct DomainCacheRefresher {
    caches: Arc<AppCaches>,
    snapshot: Arc<dyn PublishedSnapshotService>,
}

impl DomainCacheRefresher {
    pub fn new(caches: Arc<AppCaches>, snapshot: Arc<dyn PublishedSnapshotService>) -> Self {
        Self { caches, snapshot }
    }

    pub fn refresh_payloads(&self, payloads: &[DomainPayload]) {
        if payloads.is_empty() {
            return;
        }

        // Domains are few and resolved as a set, so any change reloads them all.
        if payloads
            .iter()
            .any(|payload| payload.change_type != DomainChangeType::None)
        {
            self.caches.isolated.clear(EntityKind::Domain);
        }

        // Published urls resolve through domains.
        self.caches.runtime.clear_prefix(runtime::PUBLISHED_URL);
        self.snapshot.notify_domains(payloads);
    }
}

impl CacheRefresher for DomainCacheRefresher {
    fn descriptor(&self) -> &RefresherDescriptor {
        &DESCRIPTOR
    }

    fn refresh_json(&self, json: &str) -> Result<(), CacheError> {
        let payloads: Vec<DomainPayload> = decode_payloads(&DESCRIPTOR, json)?;
        self.refresh_payloads(&payloads);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::cache::refreshers::test_support::{cached, caches, seed};
    use crate::cache::snapshot::{RecordingSnapshotService, SnapshotNotification};

    #[test]
    fn refresh_reloads_domains_and_published_urls() {
        let caches = caches();
        let snapshot = Arc::new(RecordingSnapshotService::new());
        let refresher = DomainCacheRefresher::new(Arc::clone(&caches), snapshot.clone());
        seed(&caches, EntityKind::Domain, 1);
        seed(&caches, EntityKind::Domain, 2);
        seed(&caches, EntityKind::Language, 3);
        caches.runtime.insert("published-url:1234", json!("/home"));

        refresher
            .refresh_json(r#"[{"Id":1,"ChangeType":2}]"#)
            .unwrap();

        assert!(caches.isolated.is_empty(EntityKind::Domain));
        assert!(cached(&caches, EntityKind::Language, 3));
        assert!(caches.runtime.is_empty());
        assert!(matches!(
            snapshot.notifications().as_slice(),
            [SnapshotNotification::Domains(payloads)] if payloads.len() == 1
        ));
    }

    #[test]
    fn none_change_keeps_domains() {
        let caches = caches();
        let refresher =
            DomainCacheRefresher::new(Arc::clone(&caches), Arc::new(RecordingSnapshotService::new()));
        seed(&caches, EntityKind::Domain, 1);

        refresher.refresh_payloads(&[DomainPayload {
            id: 1,
            change_type: DomainChangeType::None,
        }]);

        assert!(cached(&caches, EntityKind::Domain, 1));
    }

    #[test]
    fn refresh_all_clears_every_domain() {
        let caches = caches();
        let refresher =
            DomainCacheRefresher::new(Arc::clone(&caches), Arc::new(RecordingSnapshotService::new()));
        seed(&caches, EntityKind::Domain, 1);
        seed(&caches, EntityKind::Domain, 2);

        refresher.refresh_payloads(&[DomainPayload {
            id: 0,
            change_type: DomainChangeType::RefreshAll,
        }]);

        assert!(caches.isolated.is_empty(EntityKind::Domain));
    }
}
