//! Change records attached to tree and type events.

use cachefarm_wire::TreeChangeTypes;

use super::entities::ContentTypeRecord;

/// One node changed inside a content or media tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeChange<T> {
    pub item: T,
    pub change_types: TreeChangeTypes,
}

impl<T> TreeChange<T> {
    pub fn new(item: T, change_types: TreeChangeTypes) -> Self {
        Self { item, change_types }
    }
}

/// A content, media or member type changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentTypeChange {
    pub item: ContentTypeRecord,
    pub deleted: bool,
}

impl ContentTypeChange {
    pub fn saved(item: ContentTypeRecord) -> Self {
        Self {
            item,
            deleted: false,
        }
    }

    pub fn deleted(item: ContentTypeRecord) -> Self {
        Self {
            item,
            deleted: true,
        }
    }
}
