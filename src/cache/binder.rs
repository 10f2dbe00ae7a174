//! Binds domain events to distributed cache announcements.
//!
//! Handlers are looked up in an explicit `(sender, event)` table built once at
//! startup. The binder moves between Unbound and Bound; binding subscribes
//! every table entry on an [`EventBus`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use metrics::{counter, histogram};
use time::OffsetDateTime;
use tracing::{Span, debug, error, info, info_span, warn};
use uuid::Uuid;

use super::coalesce::DispatchPlan;
use super::config::CacheConfig;
use super::distributed::DistributedCache;
use super::error::CacheError;
use super::events::{EventArgs, EventBus, EventDefinition, EventTag, SenderTag};
use super::lock::mutex_lock;

const SOURCE: &str = "cache::binder";
const METRIC_DISPATCH_MISS: &str = "cachefarm_dispatch_miss_total";
const METRIC_DISPATCH_BATCH_MS: &str = "cachefarm_dispatch_batch_ms";

pub type Handler = fn(&DistributedCache, &DispatchContext, &EventArgs) -> Result<(), CacheError>;

/// One handler per `(sender, event)`; immutable once handed to a binder.
#[derive(Default)]
pub struct HandlerTable {
    handlers: HashMap<(SenderTag, EventTag), Handler>,
    order: Vec<(SenderTag, EventTag)>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        sender: SenderTag,
        event: EventTag,
        handler: Handler,
    ) -> Result<&mut Self, CacheError> {
        if self.handlers.contains_key(&(sender, event)) {
            return Err(CacheError::DuplicateHandler { sender, event });
        }
        self.handlers.insert((sender, event), handler);
        self.order.push((sender, event));
        Ok(self)
    }

    pub fn get(&self, sender: SenderTag, event: EventTag) -> Option<Handler> {
        self.handlers.get(&(sender, event)).copied()
    }

    /// Registered pairs in registration order.
    pub fn keys(&self) -> impl Iterator<Item = (SenderTag, EventTag)> + '_ {
        self.order.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOrigin {
    Request,
    Background,
}

impl DispatchOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            DispatchOrigin::Request => "request",
            DispatchOrigin::Background => "background",
        }
    }
}

/// Execution context established by the caller for one dispatch batch.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub id: Uuid,
    pub origin: DispatchOrigin,
    pub started_at: OffsetDateTime,
}

impl DispatchContext {
    pub fn new(origin: DispatchOrigin) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin,
            started_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn request() -> Self {
        Self::new(DispatchOrigin::Request)
    }

    pub fn background() -> Self {
        Self::new(DispatchOrigin::Background)
    }

    pub fn span(&self) -> Span {
        info_span!(
            "cache_dispatch",
            context_id = %self.id,
            origin = self.origin.as_str()
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub handled: usize,
    pub missed: usize,
    pub coalesced: usize,
    pub duplicates: usize,
    pub failed: usize,
}

impl fmt::Display for DispatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "handled {}, missed {}, coalesced {}, duplicates {}, failed {}",
            self.handled, self.missed, self.coalesced, self.duplicates, self.failed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindingState {
    Unbound,
    Bound,
}

pub struct DistributedCacheBinder {
    cache: Arc<DistributedCache>,
    table: HandlerTable,
    state: Mutex<BindingState>,
    coalesce: bool,
}

impl DistributedCacheBinder {
    pub fn new(cache: Arc<DistributedCache>, table: HandlerTable, coalesce: bool) -> Self {
        Self {
            cache,
            table,
            state: Mutex::new(BindingState::Unbound),
            coalesce,
        }
    }

    /// Binder over the standard handler table.
    pub fn standard(cache: Arc<DistributedCache>, config: &CacheConfig) -> Result<Self, CacheError> {
        Ok(Self::new(
            cache,
            HandlerTable::standard()?,
            config.coalesce_type_changes,
        ))
    }

    pub fn cache(&self) -> &Arc<DistributedCache> {
        &self.cache
    }

    pub fn table(&self) -> &HandlerTable {
        &self.table
    }

    pub fn is_bound(&self) -> bool {
        *mutex_lock(&self.state, SOURCE, "is_bound") == BindingState::Bound
    }

    pub fn bind_events(&self, bus: &EventBus) -> Result<(), CacheError> {
        let mut state = mutex_lock(&self.state, SOURCE, "bind_events");
        if *state == BindingState::Bound {
            return Err(CacheError::AlreadyBound);
        }
        for (sender, event) in self.table.keys() {
            bus.subscribe(sender, event);
        }
        *state = BindingState::Bound;
        info!(subscriptions = self.table.len(), "Distributed cache events bound");
        Ok(())
    }

    pub fn unbind_events(&self, bus: &EventBus) -> Result<(), CacheError> {
        let mut state = mutex_lock(&self.state, SOURCE, "unbind_events");
        if *state == BindingState::Unbound {
            return Err(CacheError::NotBound);
        }
        for (sender, event) in self.table.keys() {
            bus.unsubscribe(sender, event);
        }
        *state = BindingState::Unbound;
        info!(subscriptions = self.table.len(), "Distributed cache events unbound");
        Ok(())
    }

    /// Dispatches one batch in the order received.
    ///
    /// Events without a handler are logged and dropped. Every event is
    /// attempted; the first handler failure is returned afterwards.
    pub fn handle_events(
        &self,
        context: &DispatchContext,
        events: Vec<EventDefinition>,
    ) -> Result<DispatchReport, CacheError> {
        let span = context.span();
        let _entered = span.enter();
        let started_at = Instant::now();

        let received = events.len();
        let plan = DispatchPlan::from_events(events, self.coalesce);
        debug!(received, plan = %plan, "Dispatching domain events");

        let mut report = DispatchReport {
            coalesced: plan.coalesced,
            duplicates: plan.duplicates,
            ..DispatchReport::default()
        };
        let mut first_failure = None;

        for event in &plan.events {
            let Some(handler) = self.table.get(event.sender, event.event) else {
                report.missed += 1;
                counter!(
                    METRIC_DISPATCH_MISS,
                    "sender" => event.sender.as_str(),
                    "event" => event.event.as_str()
                )
                .increment(1);
                let miss = CacheError::DispatchMiss {
                    sender: event.sender,
                    event: event.event,
                };
                warn!(event_id = %event.id, error = %miss, "Dropping domain event");
                continue;
            };

            match handler(&self.cache, context, &event.args) {
                Ok(()) => report.handled += 1,
                Err(err) => {
                    report.failed += 1;
                    error!(
                        sender = %event.sender,
                        event = %event.event,
                        event_id = %event.id,
                        error = %err,
                        "Cache handler failed"
                    );
                    if first_failure.is_none() {
                        first_failure = Some(CacheError::handler_failed(event.sender, event.event, err));
                    }
                }
            }
        }

        histogram!(METRIC_DISPATCH_BATCH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        info!(received, report = %report, "Domain event batch dispatched");

        match first_failure {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    /// Drains up to `limit` queued events from `bus` and dispatches them.
    pub fn dispatch_pending(
        &self,
        context: &DispatchContext,
        bus: &EventBus,
        limit: usize,
    ) -> Result<DispatchReport, CacheError> {
        let events = bus.drain(limit);
        if events.is_empty() {
            return Ok(DispatchReport::default());
        }
        self.handle_events(context, events)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::cache::distributed::test_support::RecordingMessenger;
    use crate::cache::messenger::{ServerAddress, StaticRegistrar};
    use crate::cache::refreshers::standard_registry;
    use crate::cache::refreshers::test_support::caches;
    use crate::cache::snapshot::{NoopSnapshotService, SnapshotNotifier};
    use crate::domain::entities::TemplateRecord;

    static CALLS: AtomicUsize = AtomicUsize::new(0);

    fn facade() -> Arc<DistributedCache> {
        let registry = standard_registry(
            caches(),
            SnapshotNotifier::inline(Arc::new(NoopSnapshotService)),
        )
        .unwrap();
        Arc::new(DistributedCache::new(
            Arc::new(registry),
            Arc::new(RecordingMessenger::default()),
            Arc::new(StaticRegistrar::default()),
            ServerAddress::new("web-1"),
        ))
    }

    fn counting(_: &DistributedCache, _: &DispatchContext, _: &EventArgs) -> Result<(), CacheError> {
        CALLS.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn failing(_: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> Result<(), CacheError> {
        args.templates().map(|_| ())
    }

    fn templates() -> EventArgs {
        EventArgs::Templates(vec![TemplateRecord {
            id: 1,
            alias: "home".to_string(),
        }])
    }

    #[test]
    fn duplicate_handlers_are_rejected() {
        let mut table = HandlerTable::new();
        table
            .register(SenderTag::FileService, EventTag::SavedTemplate, counting)
            .unwrap();
        let err = table
            .register(SenderTag::FileService, EventTag::SavedTemplate, counting)
            .err()
            .expect("duplicate must fail");
        assert!(err.is_configuration());
    }

    #[test]
    fn bind_and_unbind_follow_the_state_machine() {
        let mut table = HandlerTable::new();
        table
            .register(SenderTag::FileService, EventTag::SavedTemplate, counting)
            .unwrap();
        let binder = DistributedCacheBinder::new(facade(), table, true);
        let bus = EventBus::new();

        assert!(matches!(binder.unbind_events(&bus), Err(CacheError::NotBound)));
        binder.bind_events(&bus).unwrap();
        assert!(binder.is_bound());
        assert!(bus.is_subscribed(SenderTag::FileService, EventTag::SavedTemplate));
        assert!(matches!(binder.bind_events(&bus), Err(CacheError::AlreadyBound)));

        binder.unbind_events(&bus).unwrap();
        assert!(!binder.is_bound());
        assert_eq!(bus.subscription_count(), 0);
        assert!(matches!(binder.unbind_events(&bus), Err(CacheError::NotBound)));
    }

    #[test]
    fn failures_and_misses_do_not_stop_the_batch() {
        let before = CALLS.load(Ordering::SeqCst);
        let mut table = HandlerTable::new();
        table
            .register(SenderTag::FileService, EventTag::SavedTemplate, counting)
            .unwrap()
            .register(SenderTag::FileService, EventTag::DeletedTemplate, failing)
            .unwrap();
        let binder = DistributedCacheBinder::new(facade(), table, true);

        let events = vec![
            EventDefinition::new(SenderTag::FileService, EventTag::DeletedTemplate, EventArgs::Empty),
            EventDefinition::new(SenderTag::MacroService, EventTag::Saved, EventArgs::Empty),
            EventDefinition::new(SenderTag::FileService, EventTag::SavedTemplate, templates()),
        ];
        let err = binder
            .handle_events(&DispatchContext::background(), events)
            .unwrap_err();

        assert!(matches!(
            err,
            CacheError::HandlerFailed { event: EventTag::DeletedTemplate, .. }
        ));
        assert!(CALLS.load(Ordering::SeqCst) > before);
    }

    #[test]
    fn miss_is_reported_not_raised() {
        let binder = DistributedCacheBinder::new(facade(), HandlerTable::new(), true);
        let report = binder
            .handle_events(
                &DispatchContext::request(),
                vec![EventDefinition::new(SenderTag::MacroService, EventTag::Saved, EventArgs::Empty)],
            )
            .unwrap();
        assert_eq!(report.missed, 1);
        assert_eq!(report.handled, 0);
    }

    #[test]
    fn dispatch_pending_drains_the_bus() {
        let mut table = HandlerTable::new();
        table
            .register(SenderTag::FileService, EventTag::SavedTemplate, counting)
            .unwrap();
        let binder = DistributedCacheBinder::new(facade(), table, true);
        let bus = EventBus::new();
        binder.bind_events(&bus).unwrap();

        bus.raise(SenderTag::FileService, EventTag::SavedTemplate, templates());
        bus.raise(SenderTag::FileService, EventTag::DeletedTemplate, templates());
        assert_eq!(bus.len(), 1);

        let report = binder
            .dispatch_pending(&DispatchContext::background(), &bus, 10)
            .unwrap();
        assert_eq!(report.handled, 1);
        assert!(bus.is_empty());
    }
}
