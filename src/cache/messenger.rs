//! Fan-out of refresh operations across a server farm.
//!
//! The transport itself is out of process; this module converts facade calls
//! into [`RefreshInstruction`]s, applies them locally when this server is a
//! target, and buffers them for an [`InstructionSink`] otherwise.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};
use uuid::Uuid;

use cachefarm_wire::{RefreshInstruction, RefreshMethodType, WireError, decode_ids, flatten_instructions};

use super::error::CacheError;
use super::lock::mutex_lock;
use super::refresher::{RefreshCall, RefresherDescriptor};
use super::registry::RefresherRegistry;

const SOURCE: &str = "cache::messenger";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddress {
    pub identity: String,
}

impl ServerAddress {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
        }
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identity)
    }
}

/// Source of the servers currently registered in the farm.
pub trait ServerRegistrar: Send + Sync {
    fn registrations(&self) -> Vec<ServerAddress>;
}

/// Server list fixed at startup from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistrar {
    servers: Vec<ServerAddress>,
}

impl StaticRegistrar {
    pub fn new(servers: impl IntoIterator<Item = ServerAddress>) -> Self {
        let mut seen = HashSet::new();
        let servers = servers
            .into_iter()
            .filter(|server| seen.insert(server.clone()))
            .collect();
        Self { servers }
    }
}

impl ServerRegistrar for StaticRegistrar {
    fn registrations(&self) -> Vec<ServerAddress> {
        self.servers.clone()
    }
}

/// Delivers refresh operations to every listed server.
pub trait ServerMessenger: Send + Sync {
    fn perform_refresh(
        &self,
        servers: &[ServerAddress],
        refresher: &RefresherDescriptor,
        id: i32,
    ) -> Result<(), CacheError>;

    fn perform_refresh_by_guid(
        &self,
        servers: &[ServerAddress],
        refresher: &RefresherDescriptor,
        id: Uuid,
    ) -> Result<(), CacheError>;

    fn perform_refresh_many(
        &self,
        servers: &[ServerAddress],
        refresher: &RefresherDescriptor,
        ids: &[i32],
    ) -> Result<(), CacheError>;

    fn perform_refresh_by_payload(
        &self,
        servers: &[ServerAddress],
        refresher: &RefresherDescriptor,
        json: &str,
    ) -> Result<(), CacheError>;

    fn perform_refresh_all(
        &self,
        servers: &[ServerAddress],
        refresher: &RefresherDescriptor,
    ) -> Result<(), CacheError>;

    fn perform_remove(
        &self,
        servers: &[ServerAddress],
        refresher: &RefresherDescriptor,
        id: i32,
    ) -> Result<(), CacheError>;

    fn perform_remove_many(
        &self,
        servers: &[ServerAddress],
        refresher: &RefresherDescriptor,
        ids: &[i32],
    ) -> Result<(), CacheError> {
        for &id in ids {
            self.perform_remove(servers, refresher, id)?;
        }
        Ok(())
    }
}

// ============================================================================
// Receiving side
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessReport {
    pub applied: usize,
    pub duplicates: usize,
    pub failed: usize,
}

impl fmt::Display for ProcessReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "applied {}, duplicates {}, failed {}",
            self.applied, self.duplicates, self.failed
        )
    }
}

/// Applies instruction batches against the local registry.
#[derive(Clone)]
pub struct InstructionProcessor {
    registry: Arc<RefresherRegistry>,
}

impl InstructionProcessor {
    pub fn new(registry: Arc<RefresherRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<RefresherRegistry> {
        &self.registry
    }

    /// Applies `instructions` in order, skipping exact duplicates.
    ///
    /// Refresher failures are counted and skipped. An unknown refresher id
    /// aborts the batch: this server cannot honour the farm's contract.
    pub fn process(&self, instructions: &[RefreshInstruction]) -> Result<ProcessReport, CacheError> {
        let mut report = ProcessReport::default();
        let mut processed = HashSet::with_capacity(instructions.len());

        for instruction in instructions {
            if !processed.insert(instruction) {
                report.duplicates += 1;
                continue;
            }

            match self.apply(instruction) {
                Ok(()) => report.applied += 1,
                Err(err) if err.is_configuration() => return Err(err),
                Err(err) => {
                    warn!(
                        refresher = %instruction.refresher_id,
                        refresh_type = instruction.refresh_type.as_str(),
                        error = %err,
                        "Skipping failed refresh instruction"
                    );
                    report.failed += 1;
                }
            }
        }

        debug!(
            applied = report.applied,
            duplicates = report.duplicates,
            failed = report.failed,
            "Instruction batch processed"
        );
        Ok(report)
    }

    /// Parses a batch as written by [`BatchedMessenger::flush`] and applies it.
    pub fn process_json(&self, json: &str) -> Result<ProcessReport, CacheError> {
        let instructions = flatten_instructions(json)
            .map_err(|err| CacheError::malformed("instruction batch", err))?;
        self.process(&instructions)
    }

    fn apply(&self, instruction: &RefreshInstruction) -> Result<(), CacheError> {
        let id = instruction.refresher_id;
        let call = match instruction.refresh_type {
            RefreshMethodType::RefreshAll => RefreshCall::All,
            RefreshMethodType::RefreshByGuid => RefreshCall::Guid(instruction.guid_id),
            RefreshMethodType::RefreshById => RefreshCall::Id(instruction.int_id),
            RefreshMethodType::RemoveById => RefreshCall::Remove(instruction.int_id),
            RefreshMethodType::RefreshByJson => {
                RefreshCall::Payload(instruction.json_payload.as_deref().unwrap_or_default())
            }
            RefreshMethodType::RefreshByIds => {
                let descriptor = self.registry.descriptor(id)?;
                let ids = decode_ids(instruction.json_ids.as_deref().unwrap_or_default())
                    .map_err(|err| CacheError::malformed(descriptor.name, err))?;
                return self.registry.execute(id, RefreshCall::Ids(&ids));
            }
        };
        self.registry.execute(id, call)
    }
}

// ============================================================================
// Sending side
// ============================================================================

/// Out-of-process transport for instruction batches.
pub trait InstructionSink: Send + Sync {
    fn send(&self, batch: &str) -> Result<(), CacheError>;
}

/// Applies instructions locally and batches them for the rest of the farm.
pub struct BatchedMessenger {
    local: ServerAddress,
    processor: InstructionProcessor,
    distributed: bool,
    pending: Mutex<Vec<RefreshInstruction>>,
}

impl BatchedMessenger {
    pub fn new(local: ServerAddress, processor: InstructionProcessor, distributed: bool) -> Self {
        Self {
            local,
            processor,
            distributed,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn local(&self) -> &ServerAddress {
        &self.local
    }

    pub fn processor(&self) -> &InstructionProcessor {
        &self.processor
    }

    pub fn pending(&self) -> usize {
        mutex_lock(&self.pending, SOURCE, "pending").len()
    }

    fn deliver(
        &self,
        servers: &[ServerAddress],
        instructions: Vec<RefreshInstruction>,
    ) -> Result<(), CacheError> {
        if instructions.is_empty() {
            return Ok(());
        }

        // Buffer for remote servers before touching the local cache so a local
        // failure never holds back the rest of the farm.
        let remote = servers.iter().filter(|server| **server != self.local).count();
        if self.distributed && remote > 0 {
            mutex_lock(&self.pending, SOURCE, "deliver").extend(instructions.iter().cloned());
            debug!(
                instructions = instructions.len(),
                servers = remote,
                "Refresh instructions buffered"
            );
        }

        if servers.contains(&self.local) {
            self.processor.process(&instructions)?;
        }
        Ok(())
    }

    /// Hands every buffered instruction to `sink` as one JSON batch.
    ///
    /// On failure the batch is put back ahead of anything buffered since.
    pub fn flush(&self, sink: &dyn InstructionSink) -> Result<usize, CacheError> {
        let batch = std::mem::take(&mut *mutex_lock(&self.pending, SOURCE, "flush"));
        if batch.is_empty() {
            return Ok(0);
        }

        let count = batch.len();
        let json = serde_json::to_string(&batch).map_err(WireError::from)?;
        if let Err(err) = sink.send(&json) {
            let mut pending = mutex_lock(&self.pending, SOURCE, "flush.requeue");
            let newer = std::mem::replace(&mut *pending, batch);
            pending.extend(newer);
            warn!(instructions = count, error = %err, "Instruction flush failed, batch requeued");
            return Err(err);
        }

        info!(instructions = count, "Refresh instructions flushed");
        Ok(count)
    }
}

impl ServerMessenger for BatchedMessenger {
    fn perform_refresh(
        &self,
        servers: &[ServerAddress],
        refresher: &RefresherDescriptor,
        id: i32,
    ) -> Result<(), CacheError> {
        self.deliver(servers, vec![RefreshInstruction::refresh_by_id(refresher.id, id)])
    }

    fn perform_refresh_by_guid(
        &self,
        servers: &[ServerAddress],
        refresher: &RefresherDescriptor,
        id: Uuid,
    ) -> Result<(), CacheError> {
        self.deliver(servers, vec![RefreshInstruction::refresh_by_guid(refresher.id, id)])
    }

    fn perform_refresh_many(
        &self,
        servers: &[ServerAddress],
        refresher: &RefresherDescriptor,
        ids: &[i32],
    ) -> Result<(), CacheError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.deliver(servers, vec![RefreshInstruction::refresh_by_ids(refresher.id, ids)?])
    }

    fn perform_refresh_by_payload(
        &self,
        servers: &[ServerAddress],
        refresher: &RefresherDescriptor,
        json: &str,
    ) -> Result<(), CacheError> {
        self.deliver(servers, vec![RefreshInstruction::refresh_by_json(refresher.id, json)])
    }

    fn perform_refresh_all(
        &self,
        servers: &[ServerAddress],
        refresher: &RefresherDescriptor,
    ) -> Result<(), CacheError> {
        self.deliver(servers, vec![RefreshInstruction::refresh_all(refresher.id)])
    }

    fn perform_remove(
        &self,
        servers: &[ServerAddress],
        refresher: &RefresherDescriptor,
        id: i32,
    ) -> Result<(), CacheError> {
        self.deliver(servers, vec![RefreshInstruction::remove_by_id(refresher.id, id)])
    }

    fn perform_remove_many(
        &self,
        servers: &[ServerAddress],
        refresher: &RefresherDescriptor,
        ids: &[i32],
    ) -> Result<(), CacheError> {
        let instructions = ids
            .iter()
            .map(|&id| RefreshInstruction::remove_by_id(refresher.id, id))
            .collect();
        self.deliver(servers, instructions)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::cache::refresher::{CacheRefresher, RefresherKind};

    struct LoggingRefresher {
        descriptor: RefresherDescriptor,
        calls: Mutex<Vec<String>>,
    }

    impl LoggingRefresher {
        fn new(id: Uuid) -> Arc<Self> {
            Arc::new(Self {
                descriptor: RefresherDescriptor::new(id, "logging", RefresherKind::IdBased),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn log(&self, call: String) -> Result<(), CacheError> {
            self.calls.lock().unwrap().push(call);
            Ok(())
        }
    }

    impl CacheRefresher for LoggingRefresher {
        fn descriptor(&self) -> &RefresherDescriptor {
            &self.descriptor
        }

        fn refresh_all(&self) -> Result<(), CacheError> {
            self.log("all".to_string())
        }

        fn refresh(&self, id: i32) -> Result<(), CacheError> {
            if id < 0 {
                return Err(CacheError::transport("negative id"));
            }
            self.log(format!("refresh:{id}"))
        }

        fn remove(&self, id: i32) -> Result<(), CacheError> {
            self.log(format!("remove:{id}"))
        }
    }

    struct MemorySink {
        fail: AtomicBool,
        batches: Mutex<Vec<String>>,
    }

    impl MemorySink {
        fn new(fail: bool) -> Self {
            Self {
                fail: AtomicBool::new(fail),
                batches: Mutex::new(Vec::new()),
            }
        }
    }

    impl InstructionSink for MemorySink {
        fn send(&self, batch: &str) -> Result<(), CacheError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(CacheError::transport("unreachable"));
            }
            self.batches.lock().unwrap().push(batch.to_string());
            Ok(())
        }
    }

    fn processor(refresher: Arc<LoggingRefresher>) -> InstructionProcessor {
        let mut builder = RefresherRegistry::builder();
        builder.register(refresher).unwrap();
        InstructionProcessor::new(Arc::new(builder.build()))
    }

    #[test]
    fn processor_skips_duplicates_and_failures() {
        let id = Uuid::new_v4();
        let refresher = LoggingRefresher::new(id);
        let processor = processor(refresher.clone());

        let report = processor
            .process(&[
                RefreshInstruction::refresh_by_id(id, 1),
                RefreshInstruction::refresh_by_id(id, 1),
                RefreshInstruction::refresh_by_id(id, -1),
                RefreshInstruction::refresh_by_ids(id, &[2, 3]).unwrap(),
                RefreshInstruction::remove_by_id(id, 4),
            ])
            .unwrap();

        assert_eq!(
            report,
            ProcessReport {
                applied: 3,
                duplicates: 1,
                failed: 1,
            }
        );
        assert_eq!(refresher.calls(), ["refresh:1", "refresh:2", "refresh:3", "remove:4"]);
    }

    #[test]
    fn processor_surfaces_unknown_refreshers() {
        let processor = processor(LoggingRefresher::new(Uuid::new_v4()));
        let err = processor
            .process(&[RefreshInstruction::refresh_all(Uuid::new_v4())])
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn processor_accepts_nested_json_batches() {
        let id = Uuid::new_v4();
        let refresher = LoggingRefresher::new(id);
        let processor = processor(refresher.clone());
        let batch = serde_json::to_string(&vec![vec![RefreshInstruction::refresh_all(id)]]).unwrap();

        let report = processor.process_json(&batch).unwrap();

        assert_eq!(report.applied, 1);
        assert_eq!(refresher.calls(), ["all"]);
    }

    #[test]
    fn local_only_targets_skip_the_buffer() {
        let id = Uuid::new_v4();
        let refresher = LoggingRefresher::new(id);
        let local = ServerAddress::new("web-1");
        let messenger = BatchedMessenger::new(local.clone(), processor(refresher.clone()), true);

        messenger
            .perform_refresh(&[local], refresher.descriptor(), 5)
            .unwrap();

        assert_eq!(messenger.pending(), 0);
        assert_eq!(refresher.calls(), ["refresh:5"]);
    }

    #[test]
    fn remote_targets_are_buffered_and_flushed() {
        let id = Uuid::new_v4();
        let refresher = LoggingRefresher::new(id);
        let local = ServerAddress::new("web-1");
        let servers = [local.clone(), ServerAddress::new("web-2")];
        let messenger = BatchedMessenger::new(local, processor(refresher.clone()), true);

        messenger
            .perform_remove_many(&servers, refresher.descriptor(), &[7, 8])
            .unwrap();
        assert_eq!(messenger.pending(), 2);
        assert_eq!(refresher.calls(), ["remove:7", "remove:8"]);

        let failing = MemorySink::new(true);
        assert!(messenger.flush(&failing).is_err());
        assert_eq!(messenger.pending(), 2);

        let sink = MemorySink::new(false);
        assert_eq!(messenger.flush(&sink).unwrap(), 2);
        assert_eq!(messenger.pending(), 0);

        let batches = sink.batches.lock().unwrap();
        let replayed = flatten_instructions(&batches[0]).unwrap();
        assert_eq!(replayed[0], RefreshInstruction::remove_by_id(id, 7));
    }

    #[test]
    fn non_distributed_messenger_never_buffers() {
        let id = Uuid::new_v4();
        let refresher = LoggingRefresher::new(id);
        let local = ServerAddress::new("web-1");
        let messenger = BatchedMessenger::new(local.clone(), processor(refresher.clone()), false);

        messenger
            .perform_refresh_all(&[local, ServerAddress::new("web-2")], refresher.descriptor())
            .unwrap();

        assert_eq!(messenger.pending(), 0);
        assert_eq!(refresher.calls(), ["all"]);
    }

    #[test]
    fn static_registrar_dedupes_servers() {
        let registrar = StaticRegistrar::new([
            ServerAddress::new("a"),
            ServerAddress::new("b"),
            ServerAddress::new("a"),
        ]);
        assert_eq!(registrar.registrations().len(), 2);
    }
}
