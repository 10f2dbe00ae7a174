//! Distributed cache refreshers.
//!
//! A change on one server is announced through [`DistributedCache`], carried
//! to every server by a [`ServerMessenger`] and applied locally by the
//! [`CacheRefresher`] registered under the announced id:
//!
//! - **Refreshers**: one per entity kind, evicting local partitions and
//!   notifying the published snapshot service
//! - **Binder**: maps domain events to announcements through an explicit
//!   `(sender, event)` handler table
//!
//! ## Configuration
//!
//! Partition sizes and dispatch behaviour come from the `[cache]` table of
//! `cachefarm.toml`:
//!
//! ```toml
//! [cache]
//! partition_limit = 1000
//! coalesce_type_changes = true
//! background_model_rebuild = false
//! ```

mod binder;
mod coalesce;
mod config;
mod distributed;
mod error;
mod events;
mod extensions;
mod handlers;
pub mod keys;
mod lock;
mod messenger;
mod refresher;
pub mod refreshers;
mod registry;
mod snapshot;
mod store;

pub use binder::{
    DispatchContext, DispatchOrigin, DispatchReport, DistributedCacheBinder, Handler, HandlerTable,
};
pub use coalesce::DispatchPlan;
pub use config::CacheConfig;
pub use distributed::DistributedCache;
pub use error::CacheError;
pub use events::{Epoch, EventArgs, EventBus, EventDefinition, EventTag, SenderTag};
pub use extensions::{content_payload, content_type_payload};
pub use keys::EntityKind;
pub use messenger::{
    BatchedMessenger, InstructionProcessor, InstructionSink, ProcessReport, ServerAddress,
    ServerMessenger, ServerRegistrar, StaticRegistrar,
};
pub use refresher::{CacheRefresher, Operation, RefreshCall, RefresherDescriptor, RefresherKind};
pub use refreshers::standard_registry;
pub use registry::{CacheUpdated, RefresherRegistry, RegistryBuilder};
pub use snapshot::{
    ContentNotifyOutcome, ModelRebuildQueue, NoopSnapshotService, PublishedSnapshotService,
    RecordingSnapshotService, SnapshotNotification, SnapshotNotifier,
};
pub use store::{AppCaches, CachedEntry, IdKeyMap, IsolatedCaches, RuntimeCache};
