use std::sync::Arc;

use uuid::Uuid;

use cachefarm_wire::{UserPayload, ids};

use super::decode_payloads;
use crate::cache::error::CacheError;
use crate::cache::keys::{self, EntityKind, runtime};
use crate::cache::refresher::{CacheRefresher, RefresherDescriptor, RefresherKind};
use crate::cache::store::AppCaches;

pub static DESCRIPTOR: RefresherDescriptor =
    RefresherDescriptor::new(ids::USER, "user", RefresherKind::JsonPayload);

pub struct UserCacheRefresher {
    caches: Arc<AppCaches>,
}

impl UserCacheRefresher {
    pub fn new(caches: Arc<AppCaches>) -> Self {
        Self { caches }
    }

    fn evict(&self, id: i32, removed: bool) {
        let isolated = &self.caches.isolated;
        isolated.evict_entity(EntityKind::User, id);
        if let Some(key) = self.caches.id_keys.key_for(id) {
            isolated.clear_key(EntityKind::User, &keys::by_key(key));
        }
        self.caches
            .runtime
            .clear_prefix(&runtime::user_permissions(id));
        if removed {
            self.caches.id_keys.clear_id(id);
        }
    }
}

impl CacheRefresher for UserCacheRefresher {
    fn descriptor(&self) -> &RefresherDescriptor {
        &DESCRIPTOR
    }

    fn refresh_all(&self) -> Result<(), CacheError> {
        self.caches.isolated.clear(EntityKind::User);
        self.caches.runtime.clear_prefix(runtime::USER_PERMISSIONS);
        Ok(())
    }

    fn refresh(&self, id: i32) -> Result<(), CacheError> {
        self.evict(id, false);
        Ok(())
    }

    fn refresh_guid(&self, key: Uuid) -> Result<(), CacheError> {
        self.caches
            .isolated
            .clear_key(EntityKind::User, &keys::by_key(key));
        if let Some(id) = self.caches.id_keys.id_for(key) {
            self.evict(id, false);
        }
        Ok(())
    }

    fn remove(&self, id: i32) -> Result<(), CacheError> {
        self.evict(id, true);
        Ok(())
    }

    fn refresh_json(&self, json: &str) -> Result<(), CacheError> {
        let payloads: Vec<UserPayload> = decode_payloads(&DESCRIPTOR, json)?;
        for payload in &payloads {
            self.caches
                .isolated
                .clear_key(EntityKind::User, &keys::by_key(payload.key));
            self.evict(payload.id, false);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::cache::refreshers::test_support::{cached, caches, seed};

    #[test]
    fn refresh_drops_user_and_their_permissions_only() {
        let caches = caches();
        let refresher = UserCacheRefresher::new(Arc::clone(&caches));
        seed(&caches, EntityKind::User, 1);
        seed(&caches, EntityKind::User, 2);
        caches.runtime.insert(format!("{}1050", runtime::user_permissions(1)), json!(["F"]));
        caches.runtime.insert(format!("{}1050", runtime::user_permissions(2)), json!(["F"]));

        refresher.refresh(1).unwrap();

        assert!(!cached(&caches, EntityKind::User, 1));
        assert!(cached(&caches, EntityKind::User, 2));
        assert_eq!(caches.runtime.len(), 1);
    }

    #[test]
    fn refresh_by_key_resolves_the_user_id() {
        let caches = caches();
        let refresher = UserCacheRefresher::new(Arc::clone(&caches));
        let key = Uuid::new_v4();
        caches.id_keys.set(1, key);
        seed(&caches, EntityKind::User, 1);
        seed(&caches, EntityKind::User, 2);
        caches.runtime.insert(format!("{}1050", runtime::user_permissions(1)), json!(["F"]));

        refresher.refresh_guid(key).unwrap();

        assert!(!cached(&caches, EntityKind::User, 1));
        assert!(cached(&caches, EntityKind::User, 2));
        assert!(caches.runtime.is_empty());
        assert_eq!(caches.id_keys.id_for(key), Some(1));
    }

    #[test]
    fn refresh_all_clears_every_permission_set() {
        let caches = caches();
        let refresher = UserCacheRefresher::new(Arc::clone(&caches));
        seed(&caches, EntityKind::User, 1);
        caches.runtime.insert(format!("{}1050", runtime::user_permissions(1)), json!(["F"]));
        caches.runtime.insert("partial-view:nav", json!("<nav/>"));

        refresher.refresh_all().unwrap();

        assert!(caches.isolated.is_empty(EntityKind::User));
        assert_eq!(caches.runtime.len(), 1);
    }
}
