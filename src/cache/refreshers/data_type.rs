use std::sync::Arc;

use cachefarm_wire::{DataTypePayload, ids};

use super::decode_payloads;
use crate::cache::error::CacheError;
use crate::cache::keys::{self, EntityKind};
use crate::cache::refresher::{CacheRefresher, RefresherDescriptor, RefresherKind};
use crate::cache::snapshot::SnapshotNotifier;
use crate::cache::store::AppCaches;

pub static DESCRIPTOR: RefresherDescriptor =
    RefresherDescriptor::new(ids::DATA_TYPE, "data_type", RefresherKind::JsonPayload);

/// Every type and instance embeds data type configuration, so any data type
/// change drops all of them.
const DEPENDENT_PARTITIONS: [EntityKind; 7] = [
    EntityKind::ContentType,
    EntityKind::MediaType,
    EntityKind::MemberType,
    EntityKind::PropertyType,
    EntityKind::Content,
    EntityKind::Media,
    EntityKind::Member,
];

pub struct DataTypeCacheRefresher {
    caches: Arc<AppCaches>,
    notifier: SnapshotNotifier,
}

impl DataTypeCacheRefresher {
    pub fn new(caches: Arc<AppCaches>, notifier: SnapshotNotifier) -> Self {
        Self { caches, notifier }
    }

    pub fn refresh_payloads(&self, payloads: &[DataTypePayload]) -> Result<(), CacheError> {
        if payloads.is_empty() {
            return Ok(());
        }

        let isolated = &self.caches.isolated;
        for payload in payloads {
            isolated.evict_entity(EntityKind::DataType, payload.id);
            isolated.clear_key(EntityKind::DataType, &keys::by_key(payload.key));
            self.caches.id_keys.clear_id(payload.id);
        }
        for partition in DEPENDENT_PARTITIONS {
            isolated.clear(partition);
        }

        self.notifier.data_types(payloads)
    }
}

impl CacheRefresher for DataTypeCacheRefresher {
    fn descriptor(&self) -> &RefresherDescriptor {
        &DESCRIPTOR
    }

    fn refresh_json(&self, json: &str) -> Result<(), CacheError> {
        let payloads: Vec<DataTypePayload> = decode_payloads(&DESCRIPTOR, json)?;
        self.refresh_payloads(&payloads)
    }
}
