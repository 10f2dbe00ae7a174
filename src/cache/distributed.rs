//! Distributed cache facade.
//!
//! The single entry point other subsystems use to announce a change. It
//! validates the call, resolves the refresher and hands the operation to the
//! messenger; it never evicts anything itself.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace};
use uuid::Uuid;

use super::error::CacheError;
use super::messenger::{ServerAddress, ServerMessenger, ServerRegistrar};
use super::refresher::RefresherDescriptor;
use super::registry::RefresherRegistry;

pub struct DistributedCache {
    registry: Arc<RefresherRegistry>,
    messenger: Arc<dyn ServerMessenger>,
    registrar: Arc<dyn ServerRegistrar>,
    local: ServerAddress,
}

impl DistributedCache {
    pub fn new(
        registry: Arc<RefresherRegistry>,
        messenger: Arc<dyn ServerMessenger>,
        registrar: Arc<dyn ServerRegistrar>,
        local: ServerAddress,
    ) -> Self {
        Self {
            registry,
            messenger,
            registrar,
            local,
        }
    }

    pub fn registry(&self) -> &Arc<RefresherRegistry> {
        &self.registry
    }

    pub fn local(&self) -> &ServerAddress {
        &self.local
    }

    /// Registered servers, or just this one when the farm has no registrations.
    fn servers(&self) -> Vec<ServerAddress> {
        let servers = self.registrar.registrations();
        if servers.is_empty() {
            vec![self.local.clone()]
        } else {
            servers
        }
    }

    fn descriptor(&self, refresher_id: Uuid) -> Result<&RefresherDescriptor, CacheError> {
        self.registry.descriptor(refresher_id)
    }

    pub fn refresh(&self, refresher_id: Uuid, id: i32) -> Result<(), CacheError> {
        if refresher_id.is_nil() || id == 0 {
            trace!(%refresher_id, id, "Ignoring empty refresh");
            return Ok(());
        }
        let descriptor = self.descriptor(refresher_id)?;
        debug!(refresher = descriptor.name, id, "Announcing refresh");
        self.messenger.perform_refresh(&self.servers(), descriptor, id)
    }

    pub fn refresh_by_guid(&self, refresher_id: Uuid, id: Uuid) -> Result<(), CacheError> {
        if refresher_id.is_nil() || id.is_nil() {
            trace!(%refresher_id, %id, "Ignoring empty refresh");
            return Ok(());
        }
        let descriptor = self.descriptor(refresher_id)?;
        debug!(refresher = descriptor.name, %id, "Announcing refresh by guid");
        self.messenger
            .perform_refresh_by_guid(&self.servers(), descriptor, id)
    }

    /// Refreshes every instance, using `get_id` rather than re-reading entities.
    pub fn refresh_many<T>(
        &self,
        refresher_id: Uuid,
        get_id: impl Fn(&T) -> i32,
        instances: &[T],
    ) -> Result<(), CacheError> {
        let ids = distinct_ids(instances, get_id);
        if refresher_id.is_nil() || ids.is_empty() {
            return Ok(());
        }
        let descriptor = self.descriptor(refresher_id)?;
        debug!(refresher = descriptor.name, ids = ids.len(), "Announcing bulk refresh");
        self.messenger
            .perform_refresh_many(&self.servers(), descriptor, &ids)
    }

    /// Propagates `json` verbatim.
    pub fn refresh_by_json(&self, refresher_id: Uuid, json: &str) -> Result<(), CacheError> {
        if refresher_id.is_nil() || json.trim().is_empty() {
            trace!(%refresher_id, "Ignoring empty payload");
            return Ok(());
        }
        let descriptor = self.descriptor(refresher_id)?;
        debug!(refresher = descriptor.name, bytes = json.len(), "Announcing payload refresh");
        self.messenger
            .perform_refresh_by_payload(&self.servers(), descriptor, json)
    }

    /// Encodes `payloads` as a JSON array and propagates it.
    pub fn refresh_by_payload<T: Serialize>(
        &self,
        refresher_id: Uuid,
        payloads: &[T],
    ) -> Result<(), CacheError> {
        if refresher_id.is_nil() || payloads.is_empty() {
            return Ok(());
        }
        let json = cachefarm_wire::encode(payloads)?;
        self.refresh_by_json(refresher_id, &json)
    }

    /// With `all_servers` false only this server refreshes; for caches that
    /// are derived locally and need no farm-wide sync.
    pub fn refresh_all(&self, refresher_id: Uuid, all_servers: bool) -> Result<(), CacheError> {
        if refresher_id.is_nil() {
            return Ok(());
        }
        let descriptor = self.descriptor(refresher_id)?;
        let servers = if all_servers {
            self.servers()
        } else {
            vec![self.local.clone()]
        };
        debug!(refresher = descriptor.name, all_servers, "Announcing refresh all");
        self.messenger.perform_refresh_all(&servers, descriptor)
    }

    pub fn remove(&self, refresher_id: Uuid, id: i32) -> Result<(), CacheError> {
        if refresher_id.is_nil() || id == 0 {
            trace!(%refresher_id, id, "Ignoring empty remove");
            return Ok(());
        }
        let descriptor = self.descriptor(refresher_id)?;
        debug!(refresher = descriptor.name, id, "Announcing remove");
        self.messenger.perform_remove(&self.servers(), descriptor, id)
    }

    pub fn remove_many<T>(
        &self,
        refresher_id: Uuid,
        get_id: impl Fn(&T) -> i32,
        instances: &[T],
    ) -> Result<(), CacheError> {
        let ids = distinct_ids(instances, get_id);
        if refresher_id.is_nil() || ids.is_empty() {
            return Ok(());
        }
        let descriptor = self.descriptor(refresher_id)?;
        debug!(refresher = descriptor.name, ids = ids.len(), "Announcing bulk remove");
        self.messenger
            .perform_remove_many(&self.servers(), descriptor, &ids)
    }
}

/// Non-zero ids in first-seen order.
pub(crate) fn distinct_ids<T>(instances: &[T], get_id: impl Fn(&T) -> i32) -> Vec<i32> {
    let mut seen = HashSet::with_capacity(instances.len());
    instances
        .iter()
        .map(get_id)
        .filter(|&id| id != 0 && seen.insert(id))
        .collect()
}


#[cfg(test)]
mod tests {
    use cachefarm_wire::ids;

    use super::test_support::RecordingMessenger;
    use super::*;
    use crate::cache::messenger::StaticRegistrar;
    use crate::cache::refreshers::standard_registry;
    use crate::cache::refreshers::test_support::caches;
    use crate::cache::snapshot::{NoopSnapshotService, SnapshotNotifier};

    fn facade(servers: &[&str]) -> (DistributedCache, Arc<RecordingMessenger>) {
        let registry = standard_registry(
            caches(),
            SnapshotNotifier::inline(Arc::new(NoopSnapshotService)),
        )
        .unwrap();
        let messenger = Arc::new(RecordingMessenger::default());
        let registrar = StaticRegistrar::new(servers.iter().map(|s| ServerAddress::new(*s)));
        let cache = DistributedCache::new(
            Arc::new(registry),
            messenger.clone(),
            Arc::new(registrar),
            ServerAddress::new("web-1"),
        );
        (cache, messenger)
    }

    #[test]
    fn empty_ids_and_payloads_are_ignored() {
        let (cache, messenger) = facade(&[]);

        cache.refresh(Uuid::nil(), 5).unwrap();
        cache.refresh(ids::TEMPLATE, 0).unwrap();
        cache.refresh_by_guid(ids::MEMBER, Uuid::nil()).unwrap();
        cache.refresh_by_json(ids::CONTENT, "  ").unwrap();
        cache.remove(ids::TEMPLATE, 0).unwrap();
        cache
            .refresh_many(ids::TEMPLATE, |id: &i32| *id, &[0, 0])
            .unwrap();
        cache
            .refresh_by_payload::<cachefarm_wire::ContentPayload>(ids::CONTENT, &[])
            .unwrap();

        assert!(messenger.calls().is_empty());
    }

    #[test]
    fn unknown_refresher_is_a_configuration_error() {
        let (cache, _) = facade(&[]);
        let err = cache.refresh(Uuid::new_v4(), 5).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn bulk_refresh_dedupes_ids() {
        let (cache, messenger) = facade(&["web-1", "web-2"]);
        cache
            .refresh_many(ids::TEMPLATE, |id: &i32| *id, &[3, 4, 3, 0])
            .unwrap();
        assert_eq!(messenger.operations(), ["template:refresh_many([3, 4])"]);
    }

    #[test]
    fn refresh_all_can_stay_local() {
        let (cache, messenger) = facade(&["web-1", "web-2"]);
        cache.refresh_all(ids::MACRO, true).unwrap();
        cache.refresh_all(ids::MACRO, false).unwrap();

        let calls = messenger.calls();
        assert_eq!(calls[0].0, ["web-1", "web-2"]);
        assert_eq!(calls[1].0, ["web-1"]);
    }

    #[test]
    fn no_registrations_target_local_server() {
        let (cache, messenger) = facade(&[]);
        cache.remove(ids::USER, 9).unwrap();
        assert_eq!(messenger.calls()[0].0, ["web-1"]);
    }
}
