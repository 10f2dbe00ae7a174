use std::sync::Arc;

use uuid::Uuid;

use cachefarm_wire::{MemberPayload, ids};

use super::decode_payloads;
use crate::cache::error::CacheError;
use crate::cache::keys::{self, EntityKind, runtime};
use crate::cache::refresher::{CacheRefresher, RefresherDescriptor, RefresherKind};
use crate::cache::store::AppCaches;

pub static DESCRIPTOR: RefresherDescriptor =
    RefresherDescriptor::new(ids::MEMBER, "member", RefresherKind::JsonPayload);

/// Members are cached by id, by key and behind username lookups.
pub struct MemberCacheRefresher {
    caches: Arc<AppCaches>,
}

impl MemberCacheRefresher {
    pub fn new(caches: Arc<AppCaches>) -> Self {
        Self { caches }
    }

    fn evict(&self, id: i32, usernames: &[&str], removed: bool) {
        let isolated = &self.caches.isolated;
        let runtime_cache = &self.caches.runtime;

        for entry in isolated.evict_entity(EntityKind::Member, id) {
            if let Some(username) = entry.alias {
                runtime_cache.clear_key(&runtime::member_username(&username));
            }
        }
        if let Some(key) = self.caches.id_keys.key_for(id) {
            isolated.clear_key(EntityKind::Member, &keys::by_key(key));
        }
        for username in usernames {
            runtime_cache.clear_key(&runtime::member_username(username));
        }

        if removed {
            runtime_cache.clear_lookups_to(runtime::MEMBER_USERNAME, id);
            self.caches.id_keys.clear_id(id);
        }
    }

    pub fn refresh_payloads(&self, payloads: &[MemberPayload]) {
        for payload in payloads {
            let mut usernames = vec![payload.username.as_str()];
            if let Some(previous) = payload.previous_username.as_deref() {
                usernames.push(previous);
            }
            self.evict(payload.id, &usernames, payload.removed);
        }
    }
}

impl CacheRefresher for MemberCacheRefresher {
    fn descriptor(&self) -> &RefresherDescriptor {
        &DESCRIPTOR
    }

    fn refresh_all(&self) -> Result<(), CacheError> {
        self.caches.isolated.clear(EntityKind::Member);
        self.caches.runtime.clear_prefix(runtime::MEMBER_USERNAME);
        Ok(())
    }

    fn refresh(&self, id: i32) -> Result<(), CacheError> {
        self.evict(id, &[], false);
        Ok(())
    }

    fn refresh_guid(&self, key: Uuid) -> Result<(), CacheError> {
        match self.caches.id_keys.id_for(key) {
            Some(id) => self.evict(id, &[], false),
            None => {
                self.caches
                    .isolated
                    .clear_key(EntityKind::Member, &keys::by_key(key));
            }
        }
        Ok(())
    }

    fn remove(&self, id: i32) -> Result<(), CacheError> {
        self.evict(id, &[], true);
        Ok(())
    }

    fn refresh_json(&self, json: &str) -> Result<(), CacheError> {
        let payloads: Vec<MemberPayload> = decode_payloads(&DESCRIPTOR, json)?;
        self.refresh_payloads(&payloads);
        Ok(())
    }
}
