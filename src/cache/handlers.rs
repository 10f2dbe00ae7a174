//! The standard `(sender, event)` handler table.
//!
//! Some services raise several events for one change (a content save raises
//! Saved and TreeChanged). Only one of them announces the change; the others
//! are registered as no-ops so they are neither missed nor refreshed twice.

use std::collections::BTreeSet;

use tracing::debug;

use super::binder::{DispatchContext, HandlerTable};
use super::distributed::DistributedCache;
use super::error::CacheError;
use super::events::{EventArgs, EventTag, SenderTag};

type HandlerResult = Result<(), CacheError>;

impl HandlerTable {
    pub fn standard() -> Result<Self, CacheError> {
        use EventTag::*;
        use SenderTag::*;

        let mut table = Self::new();

        table
            .register(ContentService, TreeChanged, content_tree_changed)?
            .register(ContentService, Saved, content_saved)?
            .register(ContentService, Copied, content_copied)?;
        for event in [Deleted, Moved, Trashed, EmptiedRecycleBin, Published, Unpublished] {
            table.register(ContentService, event, ignore)?;
        }

        table.register(MediaService, TreeChanged, media_tree_changed)?;
        for event in [Saved, Deleted, Moved, Trashed, EmptiedRecycleBin] {
            table.register(MediaService, event, ignore)?;
        }

        for sender in [ContentTypeService, MediaTypeService, MemberTypeService] {
            table
                .register(sender, Changed, content_type_changed)?
                .register(sender, Saved, ignore)?
                .register(sender, Deleted, ignore)?;
        }

        table
            .register(DataTypeService, Saved, data_type_saved)?
            .register(DataTypeService, Deleted, data_type_deleted)?
            .register(LocalizationService, SavedLanguage, language_saved)?
            .register(LocalizationService, DeletedLanguage, language_deleted)?
            .register(LocalizationService, SavedDictionaryItem, dictionary_item_saved)?
            .register(LocalizationService, DeletedDictionaryItem, dictionary_item_deleted)?
            .register(DomainService, Saved, domain_saved)?
            .register(DomainService, Deleted, domain_deleted)?
            .register(MemberService, Saved, member_saved)?
            .register(MemberService, Deleted, member_deleted)?
            .register(MemberGroupService, Saved, member_group_saved)?
            .register(MemberGroupService, Deleted, member_group_deleted)?
            .register(UserService, SavedUser, user_saved)?
            .register(UserService, DeletedUser, user_deleted)?
            .register(UserService, SavedUserGroup, user_group_saved)?
            .register(UserService, DeletedUserGroup, user_group_deleted)?
            .register(PermissionRepository, AssignedPermissions, permissions_assigned)?
            .register(FileService, SavedTemplate, template_saved)?
            .register(FileService, DeletedTemplate, template_deleted)?
            .register(FileService, SavedStylesheet, stylesheet_saved)?
            .register(FileService, DeletedStylesheet, stylesheet_deleted)?
            .register(MacroService, Saved, macro_saved)?
            .register(MacroService, Deleted, macro_deleted)?
            .register(RelationService, SavedRelationType, relation_type_saved)?
            .register(RelationService, DeletedRelationType, relation_type_deleted)?
            .register(PublicAccessService, Saved, public_access_changed)?
            .register(PublicAccessService, Deleted, public_access_changed)?
            .register(SectionService, New, section_changed)?
            .register(SectionService, Deleted, section_changed)?
            .register(ApplicationTreeService, New, application_tree_changed)?
            .register(ApplicationTreeService, Updated, application_tree_changed)?
            .register(ApplicationTreeService, Deleted, application_tree_changed)?;

        Ok(table)
    }
}

fn ignore(_: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    debug!(args = args.kind(), "Event handled by a companion event");
    Ok(())
}

// ============================================================================
// Content and media
// ============================================================================

fn content_tree_changed(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.refresh_content_cache(args.content_tree()?)
}

/// New items saved with explicit permissions change what users may do.
fn content_saved(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    let permissions_changed = args
        .contents()?
        .iter()
        .any(|content| content.is_new && content.permissions_changed);
    if permissions_changed {
        cache.refresh_all_user_permissions_cache()?;
    }
    Ok(())
}

fn content_copied(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    if args.content_copied()?.permissions_changed {
        cache.refresh_all_user_permissions_cache()?;
    }
    Ok(())
}

fn media_tree_changed(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.refresh_media_cache(args.media_tree()?)
}

// ============================================================================
// Types
// ============================================================================

fn content_type_changed(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.refresh_content_type_cache(args.content_types()?)
}

fn data_type_saved(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.refresh_data_type_cache(args.data_types()?)
}

fn data_type_deleted(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.remove_data_type_cache(args.data_types()?)
}

// ============================================================================
// Localization and domains
// ============================================================================

fn language_saved(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.refresh_language_cache(args.languages()?)
}

fn language_deleted(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.remove_language_cache(args.languages()?)
}

fn dictionary_item_saved(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.refresh_dictionary_cache(args.dictionary_items()?)
}

fn dictionary_item_deleted(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.remove_dictionary_cache(args.dictionary_items()?)
}

fn domain_saved(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.refresh_domain_cache(args.domains()?)
}

fn domain_deleted(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.remove_domain_cache(args.domains()?)
}

// ============================================================================
// Members and users
// ============================================================================

fn member_saved(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.refresh_member_cache(args.members()?)
}

fn member_deleted(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.remove_member_cache(args.members()?)
}

fn member_group_saved(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.refresh_member_group_cache(args.member_groups()?)
}

fn member_group_deleted(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.remove_member_group_cache(args.member_groups()?)
}

fn user_saved(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.refresh_user_cache(args.users()?)
}

fn user_deleted(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.remove_user_cache(args.users()?)
}

fn user_group_saved(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.refresh_user_group_cache(args.user_groups()?)
}

fn user_group_deleted(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.remove_user_group_cache(args.user_groups()?)
}

fn permissions_assigned(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    let user_ids: Vec<i32> = args
        .permissions()?
        .iter()
        .map(|permission| permission.user_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    cache.refresh_user_permissions_cache(&user_ids)
}

// ============================================================================
// Files, macros, relations and the backoffice tree
// ============================================================================

fn template_saved(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.refresh_template_cache(args.templates()?)
}

fn template_deleted(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.remove_template_cache(args.templates()?)
}

fn stylesheet_saved(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.refresh_stylesheet_cache(args.stylesheets()?)
}

fn stylesheet_deleted(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.remove_stylesheet_cache(args.stylesheets()?)
}

fn macro_saved(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.refresh_macro_cache(args.macros()?)
}

fn macro_deleted(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.remove_macro_cache(args.macros()?)
}

fn relation_type_saved(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.refresh_relation_type_cache(args.relation_types()?)
}

fn relation_type_deleted(cache: &DistributedCache, _: &DispatchContext, args: &EventArgs) -> HandlerResult {
    cache.remove_relation_type_cache(args.relation_types()?)
}

fn public_access_changed(cache: &DistributedCache, _: &DispatchContext, _: &EventArgs) -> HandlerResult {
    cache.refresh_public_access()
}

fn section_changed(cache: &DistributedCache, _: &DispatchContext, _: &EventArgs) -> HandlerResult {
    cache.refresh_section_cache()
}

fn application_tree_changed(cache: &DistributedCache, _: &DispatchContext, _: &EventArgs) -> HandlerResult {
    cache.refresh_application_tree_cache()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::cache::distributed::test_support::RecordingMessenger;
    use crate::cache::messenger::{ServerAddress, StaticRegistrar};
    use crate::cache::refreshers::standard_registry;
    use crate::cache::refreshers::test_support::caches;
    use crate::cache::snapshot::{NoopSnapshotService, SnapshotNotifier};
    use crate::domain::entities::{ContentRecord, EntityPermissionRecord};

    fn facade() -> (DistributedCache, Arc<RecordingMessenger>) {
        let registry = standard_registry(
            caches(),
            SnapshotNotifier::inline(Arc::new(NoopSnapshotService)),
        )
        .unwrap();
        let messenger = Arc::new(RecordingMessenger::default());
        let cache = DistributedCache::new(
            Arc::new(registry),
            messenger.clone(),
            Arc::new(StaticRegistrar::default()),
            ServerAddress::new("web-1"),
        );
        (cache, messenger)
    }

    fn content(is_new: bool, permissions_changed: bool) -> ContentRecord {
        ContentRecord {
            id: 7,
            key: Uuid::new_v4(),
            path: "-1,7".to_string(),
            blueprint: false,
            is_new,
            permissions_changed,
            published_cultures: Vec::new(),
            unpublished_cultures: Vec::new(),
        }
    }

    #[test]
    fn standard_table_builds_without_duplicates() {
        let table = HandlerTable::standard().unwrap();
        assert!(table.get(SenderTag::ContentService, EventTag::TreeChanged).is_some());
        assert!(table.get(SenderTag::MemberTypeService, EventTag::Changed).is_some());
        assert!(table.get(SenderTag::ContentService, EventTag::SavedUser).is_none());
    }

    #[test]
    fn every_handler_survives_empty_args_by_reporting_them() {
        let (cache, _) = facade();
        let table = HandlerTable::standard().unwrap();
        let context = DispatchContext::background();

        for (sender, event) in table.keys() {
            let handler = table.get(sender, event).unwrap();
            match handler(&cache, &context, &EventArgs::Empty) {
                Ok(()) | Err(CacheError::UnexpectedArgs { found: "Empty", .. }) => {}
                Err(other) => panic!("{sender}.{event}: unexpected {other}"),
            }
        }
    }

    #[test]
    fn saving_existing_content_leaves_permissions_alone() {
        let (cache, messenger) = facade();
        let context = DispatchContext::request();

        content_saved(&cache, &context, &EventArgs::Contents(vec![content(false, true)])).unwrap();
        assert!(messenger.calls().is_empty());

        content_saved(&cache, &context, &EventArgs::Contents(vec![content(true, true)])).unwrap();
        assert_eq!(messenger.operations(), ["user_permissions:refresh_all"]);
    }

    #[test]
    fn copied_content_with_permissions_refreshes_them() {
        let (cache, messenger) = facade();
        content_copied(
            &cache,
            &DispatchContext::request(),
            &EventArgs::ContentCopied(content(true, true)),
        )
        .unwrap();
        assert_eq!(messenger.operations(), ["user_permissions:refresh_all"]);
    }

    #[test]
    fn assigned_permissions_refresh_each_user_once() {
        let (cache, messenger) = facade();
        let permissions = [(3, 100), (1, 100), (3, 101)]
            .into_iter()
            .map(|(user_id, entity_id)| EntityPermissionRecord { user_id, entity_id })
            .collect();

        permissions_assigned(
            &cache,
            &DispatchContext::background(),
            &EventArgs::Permissions(permissions),
        )
        .unwrap();

        assert_eq!(messenger.operations(), ["user_permissions:refresh_many([1, 3])"]);
    }
}
