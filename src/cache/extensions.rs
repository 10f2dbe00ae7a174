//! Typed announcement helpers on [`DistributedCache`].
//!
//! Each helper turns domain records into the refresher's wire shape so call
//! sites never build payloads by hand.

use cachefarm_wire::{
    ContentPayload, ContentTypePayload, DataTypePayload, DomainChangeType, DomainPayload,
    LanguageChangeType, LanguagePayload, MacroPayload, MediaPayload, MemberPayload, UserPayload,
    ids,
};

use crate::domain::changes::{ContentTypeChange, TreeChange};
use crate::domain::entities::{
    ContentRecord, ContentTypeRecord, DataTypeRecord, DictionaryItemRecord, DomainRecord,
    LanguageRecord, MacroRecord, MediaRecord, MemberGroupRecord, MemberRecord,
    RelationTypeRecord, StylesheetRecord, TemplateRecord, UserGroupRecord, UserRecord,
};

use super::distributed::DistributedCache;
use super::error::CacheError;

/// Builds the wire payload for a type change. Descendants of a deleted type
/// are re-parented, not deleted.
pub fn content_type_payload(record: &ContentTypeRecord, deleted: bool) -> ContentTypePayload {
    ContentTypePayload {
        id: record.id,
        alias: record.alias.clone(),
        property_type_ids: record.property_type_ids.clone(),
        kind: record.kind,
        was_deleted: deleted,
        alias_changed: record.alias_changed,
        property_removed: record.property_removed,
        is_new: record.is_new,
        descendant_payloads: record
            .descendants
            .iter()
            .map(|descendant| content_type_payload(descendant, false))
            .collect(),
    }
}

fn cultures(values: &[String]) -> Option<Vec<String>> {
    (!values.is_empty()).then(|| values.to_vec())
}

pub fn content_payload(change: &TreeChange<ContentRecord>) -> ContentPayload {
    ContentPayload {
        blueprint: change.item.blueprint,
        published_cultures: cultures(&change.item.published_cultures),
        unpublished_cultures: cultures(&change.item.unpublished_cultures),
        ..ContentPayload::new(change.item.id, Some(change.item.key), change.change_types)
    }
}

impl DistributedCache {
    // ------------------------------------------------------------------
    // Content, media and the published snapshot
    // ------------------------------------------------------------------

    pub fn refresh_content_cache(
        &self,
        changes: &[TreeChange<ContentRecord>],
    ) -> Result<(), CacheError> {
        let payloads: Vec<_> = changes.iter().map(content_payload).collect();
        self.refresh_by_payload(ids::CONTENT, &payloads)
    }

    pub fn refresh_all_content_cache(&self) -> Result<(), CacheError> {
        self.refresh_by_payload(ids::CONTENT, &[ContentPayload::refresh_all()])
    }

    pub fn refresh_media_cache(&self, changes: &[TreeChange<MediaRecord>]) -> Result<(), CacheError> {
        let payloads: Vec<_> = changes
            .iter()
            .map(|change| MediaPayload::new(change.item.id, Some(change.item.key), change.change_types))
            .collect();
        self.refresh_by_payload(ids::MEDIA, &payloads)
    }

    pub fn refresh_all_media_cache(&self) -> Result<(), CacheError> {
        self.refresh_by_payload(ids::MEDIA, &[MediaPayload::refresh_all()])
    }

    /// Rebuilds everything the published snapshot is derived from.
    pub fn refresh_all_published_snapshot(&self) -> Result<(), CacheError> {
        self.refresh_all_content_cache()?;
        self.refresh_all_media_cache()?;
        self.refresh_all_domain_cache()
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    pub fn refresh_content_type_cache(&self, changes: &[ContentTypeChange]) -> Result<(), CacheError> {
        let payloads: Vec<_> = changes
            .iter()
            .map(|change| content_type_payload(&change.item, change.deleted))
            .collect();
        self.refresh_by_payload(ids::CONTENT_TYPE, &payloads)
    }

    pub fn refresh_data_type_cache(&self, data_types: &[DataTypeRecord]) -> Result<(), CacheError> {
        self.refresh_by_payload(ids::DATA_TYPE, &data_type_payloads(data_types, false))
    }

    pub fn remove_data_type_cache(&self, data_types: &[DataTypeRecord]) -> Result<(), CacheError> {
        self.refresh_by_payload(ids::DATA_TYPE, &data_type_payloads(data_types, true))
    }

    // ------------------------------------------------------------------
    // Languages and domains
    // ------------------------------------------------------------------

    pub fn refresh_language_cache(&self, languages: &[LanguageRecord]) -> Result<(), CacheError> {
        let payloads: Vec<_> = languages
            .iter()
            .map(|language| LanguagePayload {
                id: language.id,
                iso_code: language.iso_code.clone(),
                change_type: if language.iso_code_changed {
                    LanguageChangeType::ChangeCulture
                } else {
                    LanguageChangeType::Update
                },
            })
            .collect();
        self.refresh_by_payload(ids::LANGUAGE, &payloads)
    }

    pub fn remove_language_cache(&self, languages: &[LanguageRecord]) -> Result<(), CacheError> {
        let payloads: Vec<_> = languages
            .iter()
            .map(|language| LanguagePayload {
                id: language.id,
                iso_code: language.iso_code.clone(),
                change_type: LanguageChangeType::Remove,
            })
            .collect();
        self.refresh_by_payload(ids::LANGUAGE, &payloads)
    }

    pub fn refresh_domain_cache(&self, domains: &[DomainRecord]) -> Result<(), CacheError> {
        self.refresh_by_payload(ids::DOMAIN, &domain_payloads(domains, DomainChangeType::Refresh))
    }

    pub fn remove_domain_cache(&self, domains: &[DomainRecord]) -> Result<(), CacheError> {
        self.refresh_by_payload(ids::DOMAIN, &domain_payloads(domains, DomainChangeType::Remove))
    }

    pub fn refresh_all_domain_cache(&self) -> Result<(), CacheError> {
        self.refresh_by_payload(
            ids::DOMAIN,
            &[DomainPayload {
                id: 0,
                change_type: DomainChangeType::RefreshAll,
            }],
        )
    }

    // ------------------------------------------------------------------
    // Members and users
    // ------------------------------------------------------------------

    pub fn refresh_member_cache(&self, members: &[MemberRecord]) -> Result<(), CacheError> {
        self.refresh_by_payload(ids::MEMBER, &member_payloads(members, false))
    }

    pub fn remove_member_cache(&self, members: &[MemberRecord]) -> Result<(), CacheError> {
        self.refresh_by_payload(ids::MEMBER, &member_payloads(members, true))
    }

    pub fn refresh_member_group_cache(&self, groups: &[MemberGroupRecord]) -> Result<(), CacheError> {
        self.refresh_many(ids::MEMBER_GROUP, |group: &MemberGroupRecord| group.id, groups)
    }

    pub fn remove_member_group_cache(&self, groups: &[MemberGroupRecord]) -> Result<(), CacheError> {
        self.remove_many(ids::MEMBER_GROUP, |group: &MemberGroupRecord| group.id, groups)
    }

    pub fn refresh_user_cache(&self, users: &[UserRecord]) -> Result<(), CacheError> {
        let payloads: Vec<_> = users
            .iter()
            .map(|user| UserPayload {
                id: user.id,
                key: user.key,
            })
            .collect();
        self.refresh_by_payload(ids::USER, &payloads)
    }

    pub fn remove_user_cache(&self, users: &[UserRecord]) -> Result<(), CacheError> {
        self.remove_many(ids::USER, |user: &UserRecord| user.id, users)
    }

    pub fn refresh_all_user_cache(&self) -> Result<(), CacheError> {
        self.refresh_all(ids::USER, true)
    }

    pub fn refresh_user_group_cache(&self, groups: &[UserGroupRecord]) -> Result<(), CacheError> {
        self.refresh_many(ids::USER_GROUP, |group: &UserGroupRecord| group.id, groups)
    }

    pub fn remove_user_group_cache(&self, groups: &[UserGroupRecord]) -> Result<(), CacheError> {
        self.remove_many(ids::USER_GROUP, |group: &UserGroupRecord| group.id, groups)
    }

    pub fn refresh_user_permissions_cache(&self, user_ids: &[i32]) -> Result<(), CacheError> {
        self.refresh_many(ids::USER_PERMISSIONS, |id: &i32| *id, user_ids)
    }

    pub fn refresh_all_user_permissions_cache(&self) -> Result<(), CacheError> {
        self.refresh_all(ids::USER_PERMISSIONS, true)
    }

    // ------------------------------------------------------------------
    // Files, macros and everything else keyed by plain ids
    // ------------------------------------------------------------------

    pub fn refresh_template_cache(&self, templates: &[TemplateRecord]) -> Result<(), CacheError> {
        self.refresh_many(ids::TEMPLATE, |template: &TemplateRecord| template.id, templates)
    }

    pub fn remove_template_cache(&self, templates: &[TemplateRecord]) -> Result<(), CacheError> {
        self.remove_many(ids::TEMPLATE, |template: &TemplateRecord| template.id, templates)
    }

    pub fn refresh_dictionary_cache(&self, items: &[DictionaryItemRecord]) -> Result<(), CacheError> {
        self.refresh_many(ids::DICTIONARY, |item: &DictionaryItemRecord| item.id, items)
    }

    pub fn remove_dictionary_cache(&self, items: &[DictionaryItemRecord]) -> Result<(), CacheError> {
        self.remove_many(ids::DICTIONARY, |item: &DictionaryItemRecord| item.id, items)
    }

    /// Macros travel as payloads both ways; the alias is needed to find
    /// rendered output after the macro is gone.
    pub fn refresh_macro_cache(&self, macros: &[MacroRecord]) -> Result<(), CacheError> {
        let payloads: Vec<_> = macros
            .iter()
            .map(|item| MacroPayload {
                id: item.id,
                alias: item.alias.clone(),
            })
            .collect();
        self.refresh_by_payload(ids::MACRO, &payloads)
    }

    pub fn remove_macro_cache(&self, macros: &[MacroRecord]) -> Result<(), CacheError> {
        self.refresh_macro_cache(macros)
    }

    pub fn refresh_relation_type_cache(&self, types: &[RelationTypeRecord]) -> Result<(), CacheError> {
        self.refresh_many(ids::RELATION_TYPE, |item: &RelationTypeRecord| item.id, types)
    }

    pub fn remove_relation_type_cache(&self, types: &[RelationTypeRecord]) -> Result<(), CacheError> {
        self.remove_many(ids::RELATION_TYPE, |item: &RelationTypeRecord| item.id, types)
    }

    pub fn refresh_stylesheet_cache(&self, stylesheets: &[StylesheetRecord]) -> Result<(), CacheError> {
        self.refresh_many(ids::STYLESHEET, |item: &StylesheetRecord| item.id, stylesheets)
    }

    pub fn remove_stylesheet_cache(&self, stylesheets: &[StylesheetRecord]) -> Result<(), CacheError> {
        self.remove_many(ids::STYLESHEET, |item: &StylesheetRecord| item.id, stylesheets)
    }

    pub fn refresh_public_access(&self) -> Result<(), CacheError> {
        self.refresh_all(ids::PUBLIC_ACCESS, true)
    }

    pub fn refresh_section_cache(&self) -> Result<(), CacheError> {
        self.refresh_all(ids::SECTION, true)
    }

    pub fn refresh_application_tree_cache(&self) -> Result<(), CacheError> {
        self.refresh_all(ids::APPLICATION_TREE, true)
    }
}

fn data_type_payloads(data_types: &[DataTypeRecord], removed: bool) -> Vec<DataTypePayload> {
    data_types
        .iter()
        .map(|data_type| DataTypePayload {
            id: data_type.id,
            key: data_type.key,
            removed,
        })
        .collect()
}

fn domain_payloads(domains: &[DomainRecord], change_type: DomainChangeType) -> Vec<DomainPayload> {
    domains
        .iter()
        .map(|domain| DomainPayload {
            id: domain.id,
            change_type,
        })
        .collect()
}

fn member_payloads(members: &[MemberRecord], removed: bool) -> Vec<MemberPayload> {
    members
        .iter()
        .map(|member| MemberPayload {
            id: member.id,
            username: member.username.clone(),
            removed,
            previous_username: member.previous_username.clone(),
        })
        .collect()
}
