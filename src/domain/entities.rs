//! Entities raised by domain services when something changes.
//!
//! Only the fields cache invalidation needs are carried.

use uuid::Uuid;

use cachefarm_wire::ContentTypeKind;

#[derive(Debug, Clone, PartialEq)]
pub struct ContentRecord {
    pub id: i32,
    pub key: Uuid,
    /// Comma separated ancestor ids ending with this node, e.g. `-1,12,42`.
    pub path: String,
    pub blueprint: bool,
    /// True when the entity was created by the save that raised the event.
    pub is_new: bool,
    pub permissions_changed: bool,
    pub published_cultures: Vec<String>,
    pub unpublished_cultures: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaRecord {
    pub id: i32,
    pub key: Uuid,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentTypeRecord {
    pub id: i32,
    pub alias: String,
    pub kind: ContentTypeKind,
    pub property_type_ids: Vec<i32>,
    pub is_new: bool,
    pub alias_changed: bool,
    pub property_removed: bool,
    /// Types composed from this one.
    pub descendants: Vec<ContentTypeRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataTypeRecord {
    pub id: i32,
    pub key: Uuid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LanguageRecord {
    pub id: i32,
    pub iso_code: String,
    pub iso_code_changed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DomainRecord {
    pub id: i32,
    pub name: String,
    pub root_content_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberRecord {
    pub id: i32,
    pub key: Uuid,
    pub username: String,
    pub previous_username: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberGroupRecord {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: i32,
    pub key: Uuid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserGroupRecord {
    pub id: i32,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateRecord {
    pub id: i32,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DictionaryItemRecord {
    pub id: i32,
    pub key: Uuid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroRecord {
    pub id: i32,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationTypeRecord {
    pub id: i32,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StylesheetRecord {
    pub id: i32,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublicAccessRecord {
    pub key: Uuid,
    pub protected_node_id: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionRecord {
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationTreeRecord {
    pub alias: String,
    pub section_alias: String,
}

/// A permission assignment for one user on one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityPermissionRecord {
    pub user_id: i32,
    pub entity_id: i32,
}
