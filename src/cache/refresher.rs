//! The cache refresher capability set.
//!
//! One trait exposes every operation a refresher can receive. Variants
//! implement the subset meaningful for their entity kind; the defaults
//! report the operation as unsupported.

use std::fmt;

use uuid::Uuid;

use cachefarm_wire::RefreshMethodType;

use super::error::CacheError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    RefreshAll,
    RefreshById,
    RefreshByIds,
    RefreshByGuid,
    RemoveById,
    RefreshByPayload,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::RefreshAll => "refresh_all",
            Operation::RefreshById => "refresh_by_id",
            Operation::RefreshByIds => "refresh_by_ids",
            Operation::RefreshByGuid => "refresh_by_guid",
            Operation::RemoveById => "remove_by_id",
            Operation::RefreshByPayload => "refresh_by_payload",
        }
    }
}

impl From<RefreshMethodType> for Operation {
    fn from(value: RefreshMethodType) -> Self {
        match value {
            RefreshMethodType::RefreshAll => Operation::RefreshAll,
            RefreshMethodType::RefreshByGuid => Operation::RefreshByGuid,
            RefreshMethodType::RefreshById => Operation::RefreshById,
            RefreshMethodType::RefreshByIds => Operation::RefreshByIds,
            RefreshMethodType::RefreshByJson => Operation::RefreshByPayload,
            RefreshMethodType::RemoveById => Operation::RemoveById,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How changes for a refresher travel between servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefresherKind {
    /// Plain integer (or guid) ids.
    IdBased,
    /// Ids extracted from typed entity instances by the caller.
    TypedInstance,
    /// Structured JSON payloads.
    JsonPayload,
}

impl RefresherKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RefresherKind::IdBased => "id",
            RefresherKind::TypedInstance => "typed",
            RefresherKind::JsonPayload => "json",
        }
    }
}

/// Identity of a refresher. One descriptor per refresher kind per process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefresherDescriptor {
    pub id: Uuid,
    pub name: &'static str,
    pub kind: RefresherKind,
}

impl RefresherDescriptor {
    pub const fn new(id: Uuid, name: &'static str, kind: RefresherKind) -> Self {
        Self { id, name, kind }
    }
}

/// A single call on a refresher, as received from a messenger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshCall<'a> {
    All,
    Id(i32),
    Ids(&'a [i32]),
    Guid(Uuid),
    Remove(i32),
    Payload(&'a str),
}

impl RefreshCall<'_> {
    pub fn operation(&self) -> Operation {
        match self {
            RefreshCall::All => Operation::RefreshAll,
            RefreshCall::Id(_) => Operation::RefreshById,
            RefreshCall::Ids(_) => Operation::RefreshByIds,
            RefreshCall::Guid(_) => Operation::RefreshByGuid,
            RefreshCall::Remove(_) => Operation::RemoveById,
            RefreshCall::Payload(_) => Operation::RefreshByPayload,
        }
    }
}

pub trait CacheRefresher: Send + Sync {
    fn descriptor(&self) -> &RefresherDescriptor;

    /// Evict every partition this refresher owns.
    fn refresh_all(&self) -> Result<(), CacheError> {
        Err(self.unsupported(Operation::RefreshAll))
    }

    fn refresh(&self, _id: i32) -> Result<(), CacheError> {
        Err(self.unsupported(Operation::RefreshById))
    }

    fn refresh_many(&self, ids: &[i32]) -> Result<(), CacheError> {
        for &id in ids {
            self.refresh(id)?;
        }
        Ok(())
    }

    fn refresh_guid(&self, _id: Uuid) -> Result<(), CacheError> {
        Err(self.unsupported(Operation::RefreshByGuid))
    }

    /// Like `refresh`, but also drops lookups built from the removed entity's metadata.
    fn remove(&self, _id: i32) -> Result<(), CacheError> {
        Err(self.unsupported(Operation::RemoveById))
    }

    fn refresh_json(&self, _json: &str) -> Result<(), CacheError> {
        Err(self.unsupported(Operation::RefreshByPayload))
    }

    fn unsupported(&self, operation: Operation) -> CacheError {
        CacheError::unsupported(self.descriptor().name, operation)
    }

    fn execute(&self, call: RefreshCall<'_>) -> Result<(), CacheError> {
        match call {
            RefreshCall::All => self.refresh_all(),
            RefreshCall::Id(id) => self.refresh(id),
            RefreshCall::Ids(ids) => self.refresh_many(ids),
            RefreshCall::Guid(id) => self.refresh_guid(id),
            RefreshCall::Remove(id) => self.remove(id),
            RefreshCall::Payload(json) => self.refresh_json(json),
        }
    }
}
