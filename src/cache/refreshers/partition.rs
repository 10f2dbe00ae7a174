//! Refreshers whose whole behavior is "evict from one partition".
//!
//! Each is described by a static [`PartitionRule`] instead of its own type.

use std::sync::Arc;

use uuid::Uuid;

use cachefarm_wire::ids;

use crate::cache::error::CacheError;
use crate::cache::keys::{self, EntityKind, runtime};
use crate::cache::refresher::{CacheRefresher, RefresherDescriptor, RefresherKind};
use crate::cache::store::AppCaches;

pub struct PartitionRule {
    pub descriptor: RefresherDescriptor,
    /// Isolated partition owned by the refresher, if any.
    pub partition: Option<EntityKind>,
    /// Entries cross-reference each other; any change flushes the partition.
    pub flush_partition: bool,
    /// Runtime keys derived from an evicted entry's alias.
    pub alias_runtime: Option<fn(&str) -> String>,
    /// Runtime prefix derived from the changed id.
    pub id_runtime: Option<fn(i32) -> String>,
    /// Runtime prefixes cleared on every change.
    pub change_prefixes: &'static [&'static str],
    /// Runtime prefixes cleared on refresh all.
    pub owned_prefixes: &'static [&'static str],
    /// Partitions embedding this entity, flushed on every change.
    pub cascade: &'static [EntityKind],
    /// Partitions flushed only when an entity is removed.
    pub remove_cascade: &'static [EntityKind],
}

impl PartitionRule {
    const fn new(descriptor: RefresherDescriptor, partition: Option<EntityKind>) -> Self {
        Self {
            descriptor,
            partition,
            flush_partition: false,
            alias_runtime: None,
            id_runtime: None,
            change_prefixes: &[],
            owned_prefixes: &[],
            cascade: &[],
            remove_cascade: &[],
        }
    }

    const fn flushing(mut self) -> Self {
        self.flush_partition = true;
        self
    }
}

pub static DICTIONARY: PartitionRule = PartitionRule::new(
    RefresherDescriptor::new(ids::DICTIONARY, "dictionary", RefresherKind::IdBased),
    Some(EntityKind::DictionaryItem),
)
.flushing();

pub static MEMBER_GROUP: PartitionRule = PartitionRule::new(
    RefresherDescriptor::new(ids::MEMBER_GROUP, "member_group", RefresherKind::TypedInstance),
    Some(EntityKind::MemberGroup),
)
.flushing();

pub static PUBLIC_ACCESS: PartitionRule = PartitionRule::new(
    RefresherDescriptor::new(ids::PUBLIC_ACCESS, "public_access", RefresherKind::IdBased),
    Some(EntityKind::PublicAccess),
)
.flushing();

pub static RELATION_TYPE: PartitionRule = PartitionRule::new(
    RefresherDescriptor::new(ids::RELATION_TYPE, "relation_type", RefresherKind::TypedInstance),
    Some(EntityKind::RelationType),
);

pub static TEMPLATE: PartitionRule = PartitionRule {
    alias_runtime: Some(runtime::template_content),
    owned_prefixes: &[runtime::TEMPLATE_CONTENT],
    remove_cascade: &[EntityKind::ContentType],
    ..PartitionRule::new(
        RefresherDescriptor::new(ids::TEMPLATE, "template", RefresherKind::TypedInstance),
        Some(EntityKind::Template),
    )
};

pub static USER_GROUP: PartitionRule = PartitionRule {
    change_prefixes: &[runtime::USER_PERMISSIONS],
    owned_prefixes: &[runtime::USER_PERMISSIONS],
    cascade: &[EntityKind::User],
    ..PartitionRule::new(
        RefresherDescriptor::new(ids::USER_GROUP, "user_group", RefresherKind::TypedInstance),
        Some(EntityKind::UserGroup),
    )
    .flushing()
};

pub static USER_PERMISSIONS: PartitionRule = PartitionRule {
    id_runtime: Some(runtime::user_permissions),
    owned_prefixes: &[runtime::USER_PERMISSIONS],
    ..PartitionRule::new(
        RefresherDescriptor::new(ids::USER_PERMISSIONS, "user_permissions", RefresherKind::IdBased),
        None,
    )
};

pub static STYLESHEET: PartitionRule = PartitionRule::new(
    RefresherDescriptor::new(ids::STYLESHEET, "stylesheet", RefresherKind::IdBased),
    Some(EntityKind::Stylesheet),
);

pub static SECTION: PartitionRule = PartitionRule::new(
    RefresherDescriptor::new(ids::SECTION, "section", RefresherKind::IdBased),
    Some(EntityKind::Section),
)
.flushing();

pub static APPLICATION_TREE: PartitionRule = PartitionRule::new(
    RefresherDescriptor::new(ids::APPLICATION_TREE, "application_tree", RefresherKind::IdBased),
    Some(EntityKind::ApplicationTree),
)
.flushing();

pub struct PartitionRefresher {
    rule: &'static PartitionRule,
    caches: Arc<AppCaches>,
}

impl PartitionRefresher {
    pub fn new(rule: &'static PartitionRule, caches: Arc<AppCaches>) -> Self {
        Self { rule, caches }
    }

    fn evict(&self, id: i32, removed: bool) {
        let rule = self.rule;
        let isolated = &self.caches.isolated;
        let runtime_cache = &self.caches.runtime;

        if let Some(partition) = rule.partition {
            if rule.flush_partition {
                isolated.clear(partition);
            } else {
                for entry in isolated.evict_entity(partition, id) {
                    if let Some(alias) = entry.alias {
                        isolated.clear_key(partition, &keys::by_alias(&alias));
                        if let Some(derive) = rule.alias_runtime {
                            runtime_cache.clear_prefix(&derive(&alias));
                        }
                    }
                }
            }
        }

        if let Some(derive) = rule.id_runtime {
            runtime_cache.clear_prefix(&derive(id));
        }
        for prefix in rule.change_prefixes {
            runtime_cache.clear_prefix(prefix);
        }
        for &partition in rule.cascade {
            isolated.clear(partition);
        }
        if removed {
            for &partition in rule.remove_cascade {
                isolated.clear(partition);
            }
        }
    }
}

impl CacheRefresher for PartitionRefresher {
    fn descriptor(&self) -> &RefresherDescriptor {
        &self.rule.descriptor
    }

    fn refresh_all(&self) -> Result<(), CacheError> {
        let rule = self.rule;
        if let Some(partition) = rule.partition {
            self.caches.isolated.clear(partition);
        }
        for prefix in rule.owned_prefixes.iter().chain(rule.change_prefixes) {
            self.caches.runtime.clear_prefix(prefix);
        }
        for &partition in rule.cascade {
            self.caches.isolated.clear(partition);
        }
        Ok(())
    }

    fn refresh(&self, id: i32) -> Result<(), CacheError> {
        self.evict(id, false);
        Ok(())
    }

    /// Keys unknown to the id map only drop the by-key lookup.
    fn refresh_guid(&self, key: Uuid) -> Result<(), CacheError> {
        if let Some(partition) = self.rule.partition {
            self.caches.isolated.clear_key(partition, &keys::by_key(key));
        }
        if let Some(id) = self.caches.id_keys.id_for(key) {
            self.evict(id, false);
        }
        Ok(())
    }

    fn remove(&self, id: i32) -> Result<(), CacheError> {
        self.evict(id, true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::cache::refreshers::test_support::{cached, caches, seed};
    use crate::cache::store::CachedEntry;

    #[test]
    fn template_refresh_evicts_alias_derived_output() {
        let caches = caches();
        let refresher = PartitionRefresher::new(&TEMPLATE, Arc::clone(&caches));
        caches.isolated.insert(
            EntityKind::Template,
            keys::by_id(4),
            CachedEntry::new(json!({})).with_id(4).with_alias("Home"),
        );
        seed(&caches, EntityKind::Template, 5);
        seed(&caches, EntityKind::ContentType, 6);
        caches.runtime.insert(runtime::template_content("home"), json!("<html/>"));

        refresher.refresh(4).unwrap();

        assert!(!cached(&caches, EntityKind::Template, 4));
        assert!(cached(&caches, EntityKind::Template, 5));
        assert!(cached(&caches, EntityKind::ContentType, 6));
        assert!(caches.runtime.is_empty());
    }

    #[test]
    fn template_removal_cascades_to_content_types() {
        let caches = caches();
        let refresher = PartitionRefresher::new(&TEMPLATE, Arc::clone(&caches));
        seed(&caches, EntityKind::ContentType, 6);

        refresher.remove(4).unwrap();

        assert!(caches.isolated.is_empty(EntityKind::ContentType));
    }

    #[test]
    fn dictionary_change_flushes_whole_partition() {
        let caches = caches();
        let refresher = PartitionRefresher::new(&DICTIONARY, Arc::clone(&caches));
        seed(&caches, EntityKind::DictionaryItem, 1);
        seed(&caches, EntityKind::DictionaryItem, 2);

        refresher.refresh(1).unwrap();

        assert!(caches.isolated.is_empty(EntityKind::DictionaryItem));
    }

    #[test]
    fn user_group_change_drops_users_and_permissions() {
        let caches = caches();
        let refresher = PartitionRefresher::new(&USER_GROUP, Arc::clone(&caches));
        seed(&caches, EntityKind::UserGroup, 1);
        seed(&caches, EntityKind::User, 2);
        caches.runtime.insert(format!("{}1050", runtime::user_permissions(2)), json!(["F"]));

        refresher.refresh(1).unwrap();

        assert!(caches.isolated.is_empty(EntityKind::UserGroup));
        assert!(caches.isolated.is_empty(EntityKind::User));
        assert!(caches.runtime.is_empty());
    }

    #[test]
    fn user_permissions_target_one_user() {
        let caches = caches();
        let refresher = PartitionRefresher::new(&USER_PERMISSIONS, Arc::clone(&caches));
        caches.runtime.insert(format!("{}1050", runtime::user_permissions(1)), json!(["F"]));
        caches.runtime.insert(format!("{}1050", runtime::user_permissions(12)), json!(["F"]));

        refresher.refresh(1).unwrap();
        assert_eq!(caches.runtime.len(), 1);

        refresher.refresh_all().unwrap();
        assert!(caches.runtime.is_empty());
    }

    #[test]
    fn refresh_by_key_follows_the_id_map() {
        let caches = caches();
        let refresher = PartitionRefresher::new(&TEMPLATE, Arc::clone(&caches));
        let key = Uuid::new_v4();
        caches.id_keys.set(4, key);
        seed(&caches, EntityKind::Template, 4);
        seed(&caches, EntityKind::Template, 5);

        refresher.refresh_guid(key).unwrap();
        refresher.refresh_guid(Uuid::new_v4()).unwrap();

        assert!(!cached(&caches, EntityKind::Template, 4));
        assert!(cached(&caches, EntityKind::Template, 5));
    }

    #[test]
    fn payload_refresh_is_unsupported() {
        let refresher = PartitionRefresher::new(&STYLESHEET, caches());
        assert!(refresher.refresh_json("[]").is_err());
    }
}
