//! Content, media and member type refresher.
//!
//! A structural type change (deletion, alias change, removed property on a
//! type that existed before) invalidates every cached instance of that kind.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use cachefarm_wire::{ContentTypeKind, ContentTypePayload, ids};

use super::{decode_payloads, record_skipped};
use crate::cache::error::CacheError;
use crate::cache::keys::{self, EntityKind, runtime};
use crate::cache::refresher::{CacheRefresher, RefresherDescriptor, RefresherKind};
use crate::cache::snapshot::SnapshotNotifier;
use crate::cache::store::AppCaches;

pub static DESCRIPTOR: RefresherDescriptor =
    RefresherDescriptor::new(ids::CONTENT_TYPE, "content_type", RefresherKind::JsonPayload);

const TYPE_PARTITIONS: [EntityKind; 3] = [
    EntityKind::ContentType,
    EntityKind::MediaType,
    EntityKind::MemberType,
];

const INSTANCE_PARTITIONS: [EntityKind; 3] =
    [EntityKind::Content, EntityKind::Media, EntityKind::Member];

pub struct ContentTypeCacheRefresher {
    caches: Arc<AppCaches>,
    notifier: SnapshotNotifier,
}

impl ContentTypeCacheRefresher {
    pub fn new(caches: Arc<AppCaches>, notifier: SnapshotNotifier) -> Self {
        Self { caches, notifier }
    }

    pub fn refresh_payloads(&self, payloads: &[ContentTypePayload]) -> Result<(), CacheError> {
        let mut accepted = Vec::with_capacity(payloads.len());
        let mut cascade = HashSet::new();
        let mut rejected = 0;

        for payload in payloads {
            let nodes = payload.flatten();
            if let Some(conflict) = nodes.iter().find(|node| node.has_conflicting_flags()) {
                warn!(
                    id = conflict.id,
                    alias = %conflict.alias,
                    "Skipping content type payload flagged both new and deleted"
                );
                rejected += 1;
                continue;
            }

            for node in nodes {
                self.evict_type(node);
                if node.is_structural_change() {
                    cascade.insert(node.kind);
                }
            }
            accepted.push(payload.clone());
        }
        record_skipped(&DESCRIPTOR, rejected);

        for kind in [
            ContentTypeKind::Content,
            ContentTypeKind::Media,
            ContentTypeKind::Member,
        ] {
            if cascade.contains(&kind) {
                self.flush_instances(kind);
            }
        }

        if accepted.is_empty() {
            return Ok(());
        }
        self.notifier.content_types(&accepted)
    }

    fn evict_type(&self, payload: &ContentTypePayload) {
        let isolated = &self.caches.isolated;
        let partition = EntityKind::type_partition(payload.kind);

        isolated.evict_entity(partition, payload.id);
        isolated.clear_key(partition, &keys::by_alias(&payload.alias));
        for &property_type_id in &payload.property_type_ids {
            isolated.evict_entity(EntityKind::PropertyType, property_type_id);
        }
        self.caches.id_keys.clear_id(payload.id);

        let runtime_cache = &self.caches.runtime;
        runtime_cache.clear_key(&runtime::content_type_alias(payload.kind, &payload.alias));
        if payload.was_deleted || payload.alias_changed {
            runtime_cache.clear_lookups_to(runtime::CONTENT_TYPE_ALIAS, payload.id);
        }
    }

    fn flush_instances(&self, kind: ContentTypeKind) {
        let partition = EntityKind::instance_partition(kind);
        let cleared = self.caches.isolated.clear(partition);
        if kind == ContentTypeKind::Content {
            self.caches.runtime.clear_prefix(runtime::PARTIAL_VIEW);
            self.caches.runtime.clear_prefix(runtime::MACRO_CONTENT);
        }
        info!(kind = kind.as_str(), cleared, "Structural type change flushed instance cache");
    }

    fn evict_id(&self, id: i32) -> Vec<String> {
        let mut aliases = Vec::new();
        for partition in TYPE_PARTITIONS {
            for entry in self.caches.isolated.evict_entity(partition, id) {
                if let Some(alias) = entry.alias {
                    self.caches.isolated.clear_key(partition, &keys::by_alias(&alias));
                    aliases.push(alias);
                }
            }
        }
        self.caches.id_keys.clear_id(id);
        aliases
    }
}

impl CacheRefresher for ContentTypeCacheRefresher {
    fn descriptor(&self) -> &RefresherDescriptor {
        &DESCRIPTOR
    }

    fn refresh_all(&self) -> Result<(), CacheError> {
        let isolated = &self.caches.isolated;
        for partition in TYPE_PARTITIONS.into_iter().chain(INSTANCE_PARTITIONS) {
            isolated.clear(partition);
        }
        isolated.clear(EntityKind::PropertyType);

        let runtime_cache = &self.caches.runtime;
        runtime_cache.clear_prefix(runtime::CONTENT_TYPE_ALIAS);
        runtime_cache.clear_prefix(runtime::PARTIAL_VIEW);
        runtime_cache.clear_prefix(runtime::MACRO_CONTENT);
        Ok(())
    }

    fn refresh(&self, id: i32) -> Result<(), CacheError> {
        self.evict_id(id);
        Ok(())
    }

    fn refresh_guid(&self, key: Uuid) -> Result<(), CacheError> {
        for partition in TYPE_PARTITIONS {
            self.caches.isolated.clear_key(partition, &keys::by_key(key));
        }
        if let Some(id) = self.caches.id_keys.id_for(key) {
            self.evict_id(id);
        }
        Ok(())
    }

    fn remove(&self, id: i32) -> Result<(), CacheError> {
        self.evict_id(id);
        self.caches
            .runtime
            .clear_lookups_to(runtime::CONTENT_TYPE_ALIAS, id);
        Ok(())
    }

    fn refresh_json(&self, json: &str) -> Result<(), CacheError> {
        let payloads: Vec<ContentTypePayload> = decode_payloads(&DESCRIPTOR, json)?;
        self.refresh_payloads(&payloads)
    }
}
