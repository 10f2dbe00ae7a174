//! Cache partition identities and key conventions.

use std::fmt;

use uuid::Uuid;

use cachefarm_wire::ContentTypeKind;

/// Isolated repository partitions, one per cached entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Content,
    Media,
    ContentType,
    MediaType,
    MemberType,
    PropertyType,
    DataType,
    DictionaryItem,
    Domain,
    Language,
    Macro,
    Member,
    MemberGroup,
    RelationType,
    Template,
    User,
    UserGroup,
    PublicAccess,
    Stylesheet,
    Section,
    ApplicationTree,
}

impl EntityKind {
    pub const ALL: [EntityKind; 21] = [
        EntityKind::Content,
        EntityKind::Media,
        EntityKind::ContentType,
        EntityKind::MediaType,
        EntityKind::MemberType,
        EntityKind::PropertyType,
        EntityKind::DataType,
        EntityKind::DictionaryItem,
        EntityKind::Domain,
        EntityKind::Language,
        EntityKind::Macro,
        EntityKind::Member,
        EntityKind::MemberGroup,
        EntityKind::RelationType,
        EntityKind::Template,
        EntityKind::User,
        EntityKind::UserGroup,
        EntityKind::PublicAccess,
        EntityKind::Stylesheet,
        EntityKind::Section,
        EntityKind::ApplicationTree,
    ];

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Content => "content",
            EntityKind::Media => "media",
            EntityKind::ContentType => "content_type",
            EntityKind::MediaType => "media_type",
            EntityKind::MemberType => "member_type",
            EntityKind::PropertyType => "property_type",
            EntityKind::DataType => "data_type",
            EntityKind::DictionaryItem => "dictionary_item",
            EntityKind::Domain => "domain",
            EntityKind::Language => "language",
            EntityKind::Macro => "macro",
            EntityKind::Member => "member",
            EntityKind::MemberGroup => "member_group",
            EntityKind::RelationType => "relation_type",
            EntityKind::Template => "template",
            EntityKind::User => "user",
            EntityKind::UserGroup => "user_group",
            EntityKind::PublicAccess => "public_access",
            EntityKind::Stylesheet => "stylesheet",
            EntityKind::Section => "section",
            EntityKind::ApplicationTree => "application_tree",
        }
    }

    /// Type partition for a content type family.
    pub fn type_partition(kind: ContentTypeKind) -> Self {
        match kind {
            ContentTypeKind::Content => EntityKind::ContentType,
            ContentTypeKind::Media => EntityKind::MediaType,
            ContentTypeKind::Member => EntityKind::MemberType,
        }
    }

    /// Instance partition whose entries embed types of the given family.
    pub fn instance_partition(kind: ContentTypeKind) -> Self {
        match kind {
            ContentTypeKind::Content => EntityKind::Content,
            ContentTypeKind::Media => EntityKind::Media,
            ContentTypeKind::Member => EntityKind::Member,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key of an isolated entry cached by integer id.
pub fn by_id(id: i32) -> String {
    format!("id:{id}")
}

/// Key of an isolated entry cached by unique key.
pub fn by_key(key: Uuid) -> String {
    format!("key:{key}")
}

/// Key of an isolated entry cached by alias.
pub fn by_alias(alias: &str) -> String {
    format!("alias:{}", alias.to_ascii_lowercase())
}

/// Normalizes a tree path to `,a,b,c,` so that `,id,` matches whole segments.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_matches(',');
    format!(",{trimmed},")
}

/// Path fragment identifying every node at or below `id`.
pub fn branch_marker(id: i32) -> String {
    format!(",{id},")
}

/// Runtime cache key prefixes for derived caches.
pub mod runtime {
    use cachefarm_wire::ContentTypeKind;

    pub const PARTIAL_VIEW: &str = "partial-view:";
    pub const MACRO_CONTENT: &str = "macro-content:";
    pub const USER_PERMISSIONS: &str = "user-permissions:";
    pub const CONTENT_TYPE_ALIAS: &str = "content-type-alias:";
    pub const MEMBER_USERNAME: &str = "member-username:";
    pub const TEMPLATE_CONTENT: &str = "template-content:";
    pub const PUBLISHED_URL: &str = "published-url:";

    pub fn macro_content(alias: &str) -> String {
        format!("{MACRO_CONTENT}{}:", alias.to_ascii_lowercase())
    }

    pub fn user_permissions(user_id: i32) -> String {
        format!("{USER_PERMISSIONS}{user_id}:")
    }

    pub fn content_type_alias(kind: ContentTypeKind, alias: &str) -> String {
        format!("{CONTENT_TYPE_ALIAS}{}:{}", kind.as_str(), alias.to_ascii_lowercase())
    }

    pub fn member_username(username: &str) -> String {
        format!("{MEMBER_USERNAME}{}", username.to_ascii_lowercase())
    }

    pub fn template_content(alias: &str) -> String {
        format!("{TEMPLATE_CONTENT}{}", alias.to_ascii_lowercase())
    }
}
