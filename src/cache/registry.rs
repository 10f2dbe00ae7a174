//! Refresher registry.
//!
//! Built once at startup and never mutated afterwards, so lookups need no
//! locking. Every refresher call on this server goes through [`RefresherRegistry::execute`].

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use tokio::sync::broadcast;
use tracing::{debug, error};
use uuid::Uuid;

use super::error::CacheError;
use super::refresher::{CacheRefresher, Operation, RefreshCall, RefresherDescriptor};

const METRIC_REFRESH_TOTAL: &str = "cachefarm_refresh_total";
const METRIC_REFRESH_FAILURES: &str = "cachefarm_refresh_failures_total";
const NOTICE_CAPACITY: usize = 256;

/// Published after a refresher call succeeded on this server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheUpdated {
    pub refresher: Uuid,
    pub name: &'static str,
    pub operation: Operation,
}

#[derive(Default)]
pub struct RegistryBuilder {
    refreshers: HashMap<Uuid, Arc<dyn CacheRefresher>>,
    order: Vec<Uuid>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, refresher: Arc<dyn CacheRefresher>) -> Result<&mut Self, CacheError> {
        let descriptor = refresher.descriptor();
        if let Some(existing) = self.refreshers.get(&descriptor.id) {
            return Err(CacheError::DuplicateRefresher {
                id: descriptor.id,
                existing: existing.descriptor().name,
            });
        }
        self.order.push(descriptor.id);
        self.refreshers.insert(descriptor.id, refresher);
        Ok(self)
    }

    pub fn build(self) -> RefresherRegistry {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        RefresherRegistry {
            refreshers: self.refreshers,
            order: self.order,
            notices,
        }
    }
}

pub struct RefresherRegistry {
    refreshers: HashMap<Uuid, Arc<dyn CacheRefresher>>,
    order: Vec<Uuid>,
    notices: broadcast::Sender<CacheUpdated>,
}

impl RefresherRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Unknown ids are a configuration error: servers in the farm disagree on refreshers.
    pub fn resolve(&self, id: Uuid) -> Result<&Arc<dyn CacheRefresher>, CacheError> {
        self.refreshers
            .get(&id)
            .ok_or(CacheError::UnknownRefresher(id))
    }

    pub fn descriptor(&self, id: Uuid) -> Result<&RefresherDescriptor, CacheError> {
        self.resolve(id).map(|refresher| refresher.descriptor())
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &RefresherDescriptor> {
        self.order
            .iter()
            .filter_map(|id| self.refreshers.get(id))
            .map(|refresher| refresher.descriptor())
    }

    /// Finds a refresher by descriptor name (case-insensitive) or by id.
    pub fn find(&self, name_or_id: &str) -> Option<&Arc<dyn CacheRefresher>> {
        if let Ok(id) = Uuid::parse_str(name_or_id) {
            return self.refreshers.get(&id);
        }
        self.order
            .iter()
            .filter_map(|id| self.refreshers.get(id))
            .find(|refresher| refresher.descriptor().name.eq_ignore_ascii_case(name_or_id))
    }

    pub fn len(&self) -> usize {
        self.refreshers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refreshers.is_empty()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheUpdated> {
        self.notices.subscribe()
    }

    /// Runs one call against the local refresher for `id`.
    pub fn execute(&self, id: Uuid, call: RefreshCall<'_>) -> Result<(), CacheError> {
        let refresher = self.resolve(id)?;
        let descriptor = refresher.descriptor();
        let operation = call.operation();

        counter!(
            METRIC_REFRESH_TOTAL,
            "refresher" => descriptor.name,
            "operation" => operation.as_str()
        )
        .increment(1);

        match refresher.execute(call) {
            Ok(()) => {
                debug!(refresher = descriptor.name, %operation, "Cache refresher applied");
                // No subscribers is fine.
                let _ = self.notices.send(CacheUpdated {
                    refresher: descriptor.id,
                    name: descriptor.name,
                    operation,
                });
                Ok(())
            }
            Err(err) => {
                counter!(METRIC_REFRESH_FAILURES, "refresher" => descriptor.name).increment(1);
                error!(
                    refresher = descriptor.name,
                    %operation,
                    error = %err,
                    "Cache refresher failed"
                );
                Err(err)
            }
        }
    }
}
