use std::sync::Arc;

use cachefarm_wire::{MacroPayload, ids};

use super::decode_payloads;
use crate::cache::error::CacheError;
use crate::cache::keys::{self, EntityKind, runtime};
use crate::cache::refresher::{CacheRefresher, RefresherDescriptor, RefresherKind};
use crate::cache::store::AppCaches;

pub static DESCRIPTOR: RefresherDescriptor =
    RefresherDescriptor::new(ids::MACRO, "macro", RefresherKind::JsonPayload);

/// Rendered macro output is cached per alias in the runtime cache.
pub struct MacroCacheRefresher {
    caches: Arc<AppCaches>,
}

impl MacroCacheRefresher {
    pub fn new(caches: Arc<AppCaches>) -> Self {
        Self { caches }
    }

    pub fn refresh_payloads(&self, payloads: &[MacroPayload]) {
        let isolated = &self.caches.isolated;
        for payload in payloads {
            isolated.evict_entity(EntityKind::Macro, payload.id);
            isolated.clear_key(EntityKind::Macro, &keys::by_alias(&payload.alias));
            self.caches
                .runtime
                .clear_prefix(&runtime::macro_content(&payload.alias));
        }
    }
}

impl CacheRefresher for MacroCacheRefresher {
    fn descriptor(&self) -> &RefresherDescriptor {
        &DESCRIPTOR
    }

    fn refresh_all(&self) -> Result<(), CacheError> {
        self.caches.isolated.clear(EntityKind::Macro);
        self.caches.runtime.clear_prefix(runtime::MACRO_CONTENT);
        Ok(())
    }

    fn refresh_json(&self, json: &str) -> Result<(), CacheError> {
        let payloads: Vec<MacroPayload> = decode_payloads(&DESCRIPTOR, json)?;
        self.refresh_payloads(&payloads);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::cache::refresher::Operation;
    use crate::cache::refreshers::test_support::{cached, caches, seed};

    #[test]
    fn payload_clears_macro_and_rendered_output() {
        let caches = caches();
        let refresher = MacroCacheRefresher::new(Arc::clone(&caches));
        seed(&caches, EntityKind::Macro, 3);
        seed(&caches, EntityKind::Macro, 4);
        caches.runtime.insert("macro-content:latestnews:1050", json!("<ul/>"));
        caches.runtime.insert("macro-content:sitemap:1050", json!("<ul/>"));

        refresher
            .refresh_json(r#"[{"Id":3,"Alias":"LatestNews"}]"#)
            .unwrap();

        assert!(!cached(&caches, EntityKind::Macro, 3));
        assert!(cached(&caches, EntityKind::Macro, 4));
        assert!(!caches.runtime.contains("macro-content:latestnews:1050"));
        assert!(caches.runtime.contains("macro-content:sitemap:1050"));
    }

    #[test]
    fn id_operations_are_unsupported() {
        let refresher = MacroCacheRefresher::new(caches());
        assert!(matches!(
            refresher.remove(3),
            Err(CacheError::Unsupported { operation: Operation::RemoveById, .. })
        ));
    }
}
