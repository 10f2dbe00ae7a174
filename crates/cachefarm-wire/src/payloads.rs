//! Structured refresh payloads.
//!
//! Field names are PascalCase on the wire. Every payload travels inside a
//! JSON array, one object per changed entity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::changes::{ContentTypeKind, DomainChangeType, LanguageChangeType, TreeChangeTypes};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContentPayload {
    pub id: i32,
    #[serde(default)]
    pub key: Option<Uuid>,
    pub change_types: TreeChangeTypes,
    #[serde(default)]
    pub blueprint: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_cultures: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unpublished_cultures: Option<Vec<String>>,
}

impl ContentPayload {
    pub fn new(id: i32, key: Option<Uuid>, change_types: TreeChangeTypes) -> Self {
        Self {
            id,
            key,
            change_types,
            blueprint: false,
            published_cultures: None,
            unpublished_cultures: None,
        }
    }

    pub fn refresh_all() -> Self {
        Self::new(0, None, TreeChangeTypes::REFRESH_ALL)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaPayload {
    pub id: i32,
    #[serde(default)]
    pub key: Option<Uuid>,
    pub change_types: TreeChangeTypes,
}

impl MediaPayload {
    pub fn new(id: i32, key: Option<Uuid>, change_types: TreeChangeTypes) -> Self {
        Self {
            id,
            key,
            change_types,
        }
    }

    pub fn refresh_all() -> Self {
        Self::new(0, None, TreeChangeTypes::REFRESH_ALL)
    }
}

/// Change descriptor for a content, media or member type.
///
/// A payload carries its descendant types so that a change high up a type
/// hierarchy reaches every type composed from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContentTypePayload {
    pub id: i32,
    pub alias: String,
    #[serde(default)]
    pub property_type_ids: Vec<i32>,
    #[serde(rename = "Type")]
    pub kind: ContentTypeKind,
    #[serde(default)]
    pub was_deleted: bool,
    #[serde(default)]
    pub alias_changed: bool,
    #[serde(default)]
    pub property_removed: bool,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub descendant_payloads: Vec<ContentTypePayload>,
}

impl ContentTypePayload {
    /// Deleted, renamed or lost a property, and existed before this change.
    pub fn is_structural_change(&self) -> bool {
        (self.was_deleted || self.alias_changed || self.property_removed) && !self.is_new
    }

    /// A type cannot be created and deleted by the same change.
    pub fn has_conflicting_flags(&self) -> bool {
        self.was_deleted && self.is_new
    }

    /// This payload followed by every descendant, depth first.
    pub fn flatten(&self) -> Vec<&ContentTypePayload> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(current.descendant_payloads.iter().rev());
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataTypePayload {
    pub id: i32,
    pub key: Uuid,
    #[serde(default)]
    pub removed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LanguagePayload {
    pub id: i32,
    pub iso_code: String,
    pub change_type: LanguageChangeType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DomainPayload {
    pub id: i32,
    pub change_type: DomainChangeType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MemberPayload {
    pub id: i32,
    pub username: String,
    #[serde(default)]
    pub removed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserPayload {
    pub id: i32,
    pub key: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MacroPayload {
    pub id: i32,
    pub alias: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_payload(id: i32, alias: &str) -> ContentTypePayload {
        ContentTypePayload {
            id,
            alias: alias.to_string(),
            property_type_ids: vec![],
            kind: ContentTypeKind::Content,
            was_deleted: false,
            alias_changed: false,
            property_removed: false,
            is_new: false,
            descendant_payloads: vec![],
        }
    }

    #[test]
    fn structural_change_requires_existing_type() {
        let mut payload = type_payload(1, "page");
        assert!(!payload.is_structural_change());

        payload.alias_changed = true;
        assert!(payload.is_structural_change());

        payload.is_new = true;
        assert!(!payload.is_structural_change());
    }

    #[test]
    fn conflicting_flags_are_detected() {
        let mut payload = type_payload(1, "page");
        payload.was_deleted = true;
        payload.is_new = true;
        assert!(payload.has_conflicting_flags());
    }

    #[test]
    fn flatten_walks_descendants_depth_first() {
        let mut grandchild_parent = type_payload(2, "article");
        grandchild_parent.descendant_payloads = vec![type_payload(3, "news")];
        let mut root = type_payload(1, "base");
        root.descendant_payloads = vec![grandchild_parent, type_payload(4, "event")];

        let ids: Vec<i32> = root.flatten().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn content_payload_wire_shape() {
        let payload = ContentPayload::new(
            42,
            Some(Uuid::nil()),
            TreeChangeTypes::REFRESH_BRANCH | TreeChangeTypes::REMOVE,
        );
        insta::assert_json_snapshot!(payload, @r#"
        {
          "Id": 42,
          "Key": "00000000-0000-0000-0000-000000000000",
          "ChangeTypes": 12,
          "Blueprint": false
        }
        "#);
    }

    #[test]
    fn content_type_payload_wire_shape() {
        let mut payload = type_payload(7, "article");
        payload.alias_changed = true;
        payload.property_type_ids = vec![11, 12];
        payload.descendant_payloads = vec![type_payload(8, "news")];
        insta::assert_json_snapshot!(payload, @r#"
        {
          "Id": 7,
          "Alias": "article",
          "PropertyTypeIds": [
            11,
            12
          ],
          "Type": "IContentType",
          "WasDeleted": false,
          "AliasChanged": true,
          "PropertyRemoved": false,
          "IsNew": false,
          "DescendantPayloads": [
            {
              "Id": 8,
              "Alias": "news",
              "PropertyTypeIds": [],
              "Type": "IContentType",
              "WasDeleted": false,
              "AliasChanged": false,
              "PropertyRemoved": false,
              "IsNew": false,
              "DescendantPayloads": []
            }
          ]
        }
        "#);
    }
}
