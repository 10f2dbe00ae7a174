//! Domain events consumed by the distributed cache binder.
//!
//! Domain services raise `(sender, event, args)` triples on an [`EventBus`];
//! only events with an active subscription are queued.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use metrics::gauge;
use time::OffsetDateTime;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::domain::changes::{ContentTypeChange, TreeChange};
use crate::domain::entities::{
    ApplicationTreeRecord, ContentRecord, DataTypeRecord, DictionaryItemRecord, DomainRecord,
    EntityPermissionRecord, LanguageRecord, MacroRecord, MediaRecord, MemberGroupRecord,
    MemberRecord, PublicAccessRecord, RelationTypeRecord, SectionRecord, StylesheetRecord,
    TemplateRecord, UserGroupRecord, UserRecord,
};

use super::error::CacheError;
use super::lock::{mutex_lock, rw_read, rw_write};

const SOURCE: &str = "cache::events";
const METRIC_EVENT_QUEUE_LEN: &str = "cachefarm_event_queue_len";

/// Monotonic epoch for ordering events within this process.
pub type Epoch = u64;

/// The domain service (or repository) that raised an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SenderTag {
    ContentService,
    MediaService,
    ContentTypeService,
    MediaTypeService,
    MemberTypeService,
    DataTypeService,
    LocalizationService,
    DomainService,
    MemberService,
    MemberGroupService,
    UserService,
    FileService,
    MacroService,
    RelationService,
    PublicAccessService,
    SectionService,
    ApplicationTreeService,
    PermissionRepository,
}

impl SenderTag {
    pub fn as_str(self) -> &'static str {
        match self {
            SenderTag::ContentService => "ContentService",
            SenderTag::MediaService => "MediaService",
            SenderTag::ContentTypeService => "ContentTypeService",
            SenderTag::MediaTypeService => "MediaTypeService",
            SenderTag::MemberTypeService => "MemberTypeService",
            SenderTag::DataTypeService => "DataTypeService",
            SenderTag::LocalizationService => "LocalizationService",
            SenderTag::DomainService => "DomainService",
            SenderTag::MemberService => "MemberService",
            SenderTag::MemberGroupService => "MemberGroupService",
            SenderTag::UserService => "UserService",
            SenderTag::FileService => "FileService",
            SenderTag::MacroService => "MacroService",
            SenderTag::RelationService => "RelationService",
            SenderTag::PublicAccessService => "PublicAccessService",
            SenderTag::SectionService => "SectionService",
            SenderTag::ApplicationTreeService => "ApplicationTreeService",
            SenderTag::PermissionRepository => "PermissionRepository",
        }
    }
}

impl fmt::Display for SenderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventTag {
    Saved,
    Deleted,
    Copied,
    Moved,
    Trashed,
    EmptiedRecycleBin,
    Published,
    Unpublished,
    TreeChanged,
    Changed,
    New,
    Updated,
    SavedUser,
    DeletedUser,
    SavedUserGroup,
    DeletedUserGroup,
    SavedDictionaryItem,
    DeletedDictionaryItem,
    SavedLanguage,
    DeletedLanguage,
    SavedTemplate,
    DeletedTemplate,
    SavedStylesheet,
    DeletedStylesheet,
    SavedRelationType,
    DeletedRelationType,
    AssignedPermissions,
}

impl EventTag {
    pub fn as_str(self) -> &'static str {
        match self {
            EventTag::Saved => "Saved",
            EventTag::Deleted => "Deleted",
            EventTag::Copied => "Copied",
            EventTag::Moved => "Moved",
            EventTag::Trashed => "Trashed",
            EventTag::EmptiedRecycleBin => "EmptiedRecycleBin",
            EventTag::Published => "Published",
            EventTag::Unpublished => "Unpublished",
            EventTag::TreeChanged => "TreeChanged",
            EventTag::Changed => "Changed",
            EventTag::New => "New",
            EventTag::Updated => "Updated",
            EventTag::SavedUser => "SavedUser",
            EventTag::DeletedUser => "DeletedUser",
            EventTag::SavedUserGroup => "SavedUserGroup",
            EventTag::DeletedUserGroup => "DeletedUserGroup",
            EventTag::SavedDictionaryItem => "SavedDictionaryItem",
            EventTag::DeletedDictionaryItem => "DeletedDictionaryItem",
            EventTag::SavedLanguage => "SavedLanguage",
            EventTag::DeletedLanguage => "DeletedLanguage",
            EventTag::SavedTemplate => "SavedTemplate",
            EventTag::DeletedTemplate => "DeletedTemplate",
            EventTag::SavedStylesheet => "SavedStylesheet",
            EventTag::DeletedStylesheet => "DeletedStylesheet",
            EventTag::SavedRelationType => "SavedRelationType",
            EventTag::DeletedRelationType => "DeletedRelationType",
            EventTag::AssignedPermissions => "AssignedPermissions",
        }
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed payload of a domain event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventArgs {
    Empty,
    ContentTree(Vec<TreeChange<ContentRecord>>),
    MediaTree(Vec<TreeChange<MediaRecord>>),
    Contents(Vec<ContentRecord>),
    ContentCopied(ContentRecord),
    Media(Vec<MediaRecord>),
    ContentTypes(Vec<ContentTypeChange>),
    DataTypes(Vec<DataTypeRecord>),
    Languages(Vec<LanguageRecord>),
    Domains(Vec<DomainRecord>),
    Members(Vec<MemberRecord>),
    MemberGroups(Vec<MemberGroupRecord>),
    Users(Vec<UserRecord>),
    UserGroups(Vec<UserGroupRecord>),
    Templates(Vec<TemplateRecord>),
    DictionaryItems(Vec<DictionaryItemRecord>),
    Macros(Vec<MacroRecord>),
    RelationTypes(Vec<RelationTypeRecord>),
    Stylesheets(Vec<StylesheetRecord>),
    PublicAccess(Vec<PublicAccessRecord>),
    Sections(Vec<SectionRecord>),
    ApplicationTrees(Vec<ApplicationTreeRecord>),
    Permissions(Vec<EntityPermissionRecord>),
}

impl EventArgs {
    pub fn kind(&self) -> &'static str {
        match self {
            EventArgs::Empty => "Empty",
            EventArgs::ContentTree(_) => "ContentTree",
            EventArgs::MediaTree(_) => "MediaTree",
            EventArgs::Contents(_) => "Contents",
            EventArgs::ContentCopied(_) => "ContentCopied",
            EventArgs::Media(_) => "Media",
            EventArgs::ContentTypes(_) => "ContentTypes",
            EventArgs::DataTypes(_) => "DataTypes",
            EventArgs::Languages(_) => "Languages",
            EventArgs::Domains(_) => "Domains",
            EventArgs::Members(_) => "Members",
            EventArgs::MemberGroups(_) => "MemberGroups",
            EventArgs::Users(_) => "Users",
            EventArgs::UserGroups(_) => "UserGroups",
            EventArgs::Templates(_) => "Templates",
            EventArgs::DictionaryItems(_) => "DictionaryItems",
            EventArgs::Macros(_) => "Macros",
            EventArgs::RelationTypes(_) => "RelationTypes",
            EventArgs::Stylesheets(_) => "Stylesheets",
            EventArgs::PublicAccess(_) => "PublicAccess",
            EventArgs::Sections(_) => "Sections",
            EventArgs::ApplicationTrees(_) => "ApplicationTrees",
            EventArgs::Permissions(_) => "Permissions",
        }
    }

    pub fn content_copied(&self) -> Result<&ContentRecord, CacheError> {
        match self {
            EventArgs::ContentCopied(copy) => Ok(copy),
            other => Err(CacheError::unexpected_args("ContentCopied", other.kind())),
        }
    }
}

macro_rules! args_accessors {
    ($($method:ident => $variant:ident($item:ty)),* $(,)?) => {
        impl EventArgs {
            $(
                pub fn $method(&self) -> Result<&[$item], CacheError> {
                    match self {
                        EventArgs::$variant(items) => Ok(items),
                        other => Err(CacheError::unexpected_args(stringify!($variant), other.kind())),
                    }
                }
            )*
        }
    };
}

args_accessors! {
    content_tree => ContentTree(TreeChange<ContentRecord>),
    media_tree => MediaTree(TreeChange<MediaRecord>),
    contents => Contents(ContentRecord),
    content_types => ContentTypes(ContentTypeChange),
    data_types => DataTypes(DataTypeRecord),
    languages => Languages(LanguageRecord),
    domains => Domains(DomainRecord),
    members => Members(MemberRecord),
    member_groups => MemberGroups(MemberGroupRecord),
    users => Users(UserRecord),
    user_groups => UserGroups(UserGroupRecord),
    templates => Templates(TemplateRecord),
    dictionary_items => DictionaryItems(DictionaryItemRecord),
    macros => Macros(MacroRecord),
    relation_types => RelationTypes(RelationTypeRecord),
    stylesheets => Stylesheets(StylesheetRecord),
    permissions => Permissions(EntityPermissionRecord),
}

/// A fired domain event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDefinition {
    /// Unique identifier for idempotency (UUIDv4).
    pub id: Uuid,
    pub epoch: Epoch,
    pub sender: SenderTag,
    pub event: EventTag,
    pub args: EventArgs,
    pub raised_at: OffsetDateTime,
}

impl EventDefinition {
    pub fn new(sender: SenderTag, event: EventTag, args: EventArgs) -> Self {
        Self::with_epoch(sender, event, args, 0)
    }

    pub fn with_epoch(sender: SenderTag, event: EventTag, args: EventArgs, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            sender,
            event,
            args,
            raised_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn key(&self) -> (SenderTag, EventTag) {
        (self.sender, self.event)
    }
}

/// In-memory domain event source.
///
/// Subscriptions are per `(sender, event)`; raising an event nobody subscribed
/// to is a no-op. The queue is drained in FIFO batches by the dispatcher.
pub struct EventBus {
    subscriptions: RwLock<HashSet<(SenderTag, EventTag)>>,
    queue: Mutex<VecDeque<EventDefinition>>,
    epoch_counter: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashSet::new()),
            queue: Mutex::new(VecDeque::new()),
            epoch_counter: AtomicU64::new(0),
        }
    }

    /// Returns false when the pair was already subscribed.
    pub fn subscribe(&self, sender: SenderTag, event: EventTag) -> bool {
        rw_write(&self.subscriptions, SOURCE, "subscribe").insert((sender, event))
    }

    /// Returns false when the pair was not subscribed.
    pub fn unsubscribe(&self, sender: SenderTag, event: EventTag) -> bool {
        rw_write(&self.subscriptions, SOURCE, "unsubscribe").remove(&(sender, event))
    }

    pub fn is_subscribed(&self, sender: SenderTag, event: EventTag) -> bool {
        rw_read(&self.subscriptions, SOURCE, "is_subscribed").contains(&(sender, event))
    }

    pub fn subscription_count(&self) -> usize {
        rw_read(&self.subscriptions, SOURCE, "subscription_count").len()
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Raise an event. Returns its epoch when it was queued.
    pub fn raise(&self, sender: SenderTag, event: EventTag, args: EventArgs) -> Option<Epoch> {
        if !self.is_subscribed(sender, event) {
            trace!(%sender, %event, "Domain event raised without subscribers");
            return None;
        }

        let epoch = self.next_epoch();
        let definition = EventDefinition::with_epoch(sender, event, args, epoch);

        debug!(
            event_id = %definition.id,
            event_epoch = epoch,
            %sender,
            %event,
            "Domain event enqueued"
        );

        let mut queue = mutex_lock(&self.queue, SOURCE, "raise");
        queue.push_back(definition);
        gauge!(METRIC_EVENT_QUEUE_LEN).set(queue.len() as f64);
        Some(epoch)
    }

    /// Drain up to `limit` events in FIFO order.
    pub fn drain(&self, limit: usize) -> Vec<EventDefinition> {
        let mut queue = mutex_lock(&self.queue, SOURCE, "drain");
        let count = limit.min(queue.len());
        let drained = queue.drain(..count).collect();
        gauge!(METRIC_EVENT_QUEUE_LEN).set(queue.len() as f64);
        drained
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        mutex_lock(&self.queue, SOURCE, "clear").clear();
        gauge!(METRIC_EVENT_QUEUE_LEN).set(0.0);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    fn user(id: i32) -> UserRecord {
        UserRecord {
            id,
            key: Uuid::new_v4(),
        }
    }

    #[test]
    fn unsubscribed_events_are_not_queued() {
        let bus = EventBus::new();
        assert!(
            bus.raise(SenderTag::UserService, EventTag::SavedUser, EventArgs::Users(vec![user(1)]))
                .is_none()
        );
        assert!(bus.is_empty());
    }

    #[test]
    fn raise_and_drain_in_fifo_order() {
        let bus = EventBus::new();
        bus.subscribe(SenderTag::UserService, EventTag::SavedUser);
        bus.subscribe(SenderTag::UserService, EventTag::DeletedUser);

        let first = bus.raise(SenderTag::UserService, EventTag::SavedUser, EventArgs::Users(vec![user(1)]));
        let second =
            bus.raise(SenderTag::UserService, EventTag::DeletedUser, EventArgs::Users(vec![user(2)]));
        bus.raise(SenderTag::UserService, EventTag::SavedUser, EventArgs::Users(vec![user(3)]));

        assert!(first < second);
        let events = bus.drain(2);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, EventTag::SavedUser);
        assert_eq!(events[1].event, EventTag::DeletedUser);
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn subscribe_reports_duplicates() {
        let bus = EventBus::new();
        assert!(bus.subscribe(SenderTag::MacroService, EventTag::Saved));
        assert!(!bus.subscribe(SenderTag::MacroService, EventTag::Saved));
        assert!(bus.unsubscribe(SenderTag::MacroService, EventTag::Saved));
        assert!(!bus.unsubscribe(SenderTag::MacroService, EventTag::Saved));
    }

    #[test]
    fn accessor_rejects_other_shapes() {
        let args = EventArgs::Users(vec![user(1)]);
        assert_eq!(args.users().unwrap().len(), 1);
        assert!(matches!(
            args.templates(),
            Err(CacheError::UnexpectedArgs { expected: "Templates", found: "Users" })
        ));
    }

    #[test]
    fn bus_recovers_from_poisoned_queue() {
        let bus = EventBus::new();
        bus.subscribe(SenderTag::UserService, EventTag::SavedUser);

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = bus.queue.lock().expect("queue lock should be acquired");
            panic!("poison queue lock");
        }));

        bus.raise(SenderTag::UserService, EventTag::SavedUser, EventArgs::Users(vec![user(1)]));
        assert_eq!(bus.len(), 1);
    }
}
