//! Change kinds carried by payloads.
//!
//! Flag sets and enums serialize as their integer values; the content type
//! discriminator serializes as the interface name servers agree on.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Nature of a change inside a content or media tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct TreeChangeTypes(u8);

impl TreeChangeTypes {
    pub const NONE: Self = Self(0);
    /// Everything changed; the id on the payload is meaningless.
    pub const REFRESH_ALL: Self = Self(1);
    /// Only the node itself changed.
    pub const REFRESH_NODE: Self = Self(2);
    /// The node and all of its descendants changed.
    pub const REFRESH_BRANCH: Self = Self(4);
    /// The node (and its descendants) is gone.
    pub const REMOVE: Self = Self(8);

    const MASK: u8 = 0b1111;

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::MASK)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl From<u8> for TreeChangeTypes {
    fn from(bits: u8) -> Self {
        Self::from_bits_truncate(bits)
    }
}

impl From<TreeChangeTypes> for u8 {
    fn from(value: TreeChangeTypes) -> Self {
        value.0
    }
}

impl BitOr for TreeChangeTypes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for TreeChangeTypes {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for TreeChangeTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return f.write_str("None");
        }
        let names = [
            (Self::REFRESH_ALL, "RefreshAll"),
            (Self::REFRESH_NODE, "RefreshNode"),
            (Self::REFRESH_BRANCH, "RefreshBranch"),
            (Self::REMOVE, "Remove"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum LanguageChangeType {
    Update,
    Remove,
    /// The iso code of an existing language changed.
    ChangeCulture,
}

impl TryFrom<u8> for LanguageChangeType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Update),
            1 => Ok(Self::Remove),
            2 => Ok(Self::ChangeCulture),
            other => Err(format!("unknown language change type {other}")),
        }
    }
}

impl From<LanguageChangeType> for u8 {
    fn from(value: LanguageChangeType) -> Self {
        match value {
            LanguageChangeType::Update => 0,
            LanguageChangeType::Remove => 1,
            LanguageChangeType::ChangeCulture => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DomainChangeType {
    None,
    RefreshAll,
    Refresh,
    Remove,
}

impl TryFrom<u8> for DomainChangeType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::RefreshAll),
            2 => Ok(Self::Refresh),
            3 => Ok(Self::Remove),
            other => Err(format!("unknown domain change type {other}")),
        }
    }
}

impl From<DomainChangeType> for u8 {
    fn from(value: DomainChangeType) -> Self {
        match value {
            DomainChangeType::None => 0,
            DomainChangeType::RefreshAll => 1,
            DomainChangeType::Refresh => 2,
            DomainChangeType::Remove => 3,
        }
    }
}

/// Which content type family a content type payload belongs to.
///
/// Refreshing one family never evicts caches of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentTypeKind {
    #[serde(rename = "IContentType")]
    Content,
    #[serde(rename = "IMediaType")]
    Media,
    #[serde(rename = "IMemberType")]
    Member,
}

impl ContentTypeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Content => "IContentType",
            Self::Media => "IMediaType",
            Self::Member => "IMemberType",
        }
    }
}

impl fmt::Display for ContentTypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_change_flags_combine() {
        let flags = TreeChangeTypes::REFRESH_BRANCH | TreeChangeTypes::REMOVE;
        assert!(flags.contains(TreeChangeTypes::REMOVE));
        assert!(flags.contains(TreeChangeTypes::REFRESH_BRANCH));
        assert!(!flags.contains(TreeChangeTypes::REFRESH_ALL));
        assert!(flags.intersects(TreeChangeTypes::REMOVE | TreeChangeTypes::REFRESH_ALL));
        assert_eq!(flags.bits(), 12);
        assert_eq!(flags.to_string(), "RefreshBranch|Remove");
    }

    #[test]
    fn tree_change_flags_serialize_as_integers() {
        let flags = TreeChangeTypes::REFRESH_NODE | TreeChangeTypes::REMOVE;
        assert_eq!(serde_json::to_string(&flags).unwrap(), "10");
        let parsed: TreeChangeTypes = serde_json::from_str("4").unwrap();
        assert_eq!(parsed, TreeChangeTypes::REFRESH_BRANCH);
    }

    #[test]
    fn unknown_tree_bits_are_dropped() {
        let parsed: TreeChangeTypes = serde_json::from_str("255").unwrap();
        assert_eq!(parsed.bits(), 15);
    }

    #[test]
    fn language_change_type_rejects_unknown_values() {
        assert!(serde_json::from_str::<LanguageChangeType>("7").is_err());
        let parsed: LanguageChangeType = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, LanguageChangeType::ChangeCulture);
    }

    #[test]
    fn content_type_kind_uses_interface_names() {
        assert_eq!(
            serde_json::to_string(&ContentTypeKind::Media).unwrap(),
            "\"IMediaType\""
        );
    }
}
