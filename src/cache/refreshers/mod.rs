//! Concrete cache refreshers, one per cached entity kind.

mod content;
mod content_type;
mod data_type;
mod domain;
mod language;
mod macros;
mod media;
mod member;
mod partition;
mod user;

use std::sync::Arc;

use metrics::counter;
use serde::de::DeserializeOwned;
use tracing::warn;

pub use content::ContentCacheRefresher;
pub use content_type::ContentTypeCacheRefresher;
pub use data_type::DataTypeCacheRefresher;
pub use domain::DomainCacheRefresher;
pub use language::LanguageCacheRefresher;
pub use macros::MacroCacheRefresher;
pub use media::MediaCacheRefresher;
pub use member::MemberCacheRefresher;
pub use partition::{PartitionRefresher, PartitionRule};
pub use user::UserCacheRefresher;

use super::error::CacheError;
use super::refresher::RefresherDescriptor;
use super::registry::RefresherRegistry;
use super::snapshot::SnapshotNotifier;
use super::store::AppCaches;

const METRIC_PAYLOAD_SKIPPED: &str = "cachefarm_payload_skipped_total";

/// Decodes a payload batch, logging and skipping malformed entries.
pub(crate) fn decode_payloads<T: DeserializeOwned>(
    descriptor: &RefresherDescriptor,
    json: &str,
) -> Result<Vec<T>, CacheError> {
    let decoded = cachefarm_wire::decode_lenient::<T>(json)
        .map_err(|err| CacheError::malformed(descriptor.name, err))?;

    for skipped in &decoded.skipped {
        warn!(
            refresher = descriptor.name,
            error = %skipped,
            "Skipping malformed refresh payload"
        );
    }
    record_skipped(descriptor, decoded.skipped.len());

    Ok(decoded.payloads)
}

pub(crate) fn record_skipped(descriptor: &RefresherDescriptor, count: usize) {
    if count > 0 {
        counter!(METRIC_PAYLOAD_SKIPPED, "refresher" => descriptor.name).increment(count as u64);
    }
}

/// Registers every refresher kind this server knows about.
pub fn standard_registry(
    caches: Arc<AppCaches>,
    notifier: SnapshotNotifier,
) -> Result<RefresherRegistry, CacheError> {
    let snapshot = Arc::clone(notifier.service());
    let content = Arc::new(ContentCacheRefresher::new(
        Arc::clone(&caches),
        Arc::clone(&snapshot),
    ));

    let mut builder = RefresherRegistry::builder();
    builder
        .register(content.clone())?
        .register(Arc::new(MediaCacheRefresher::new(
            Arc::clone(&caches),
            Arc::clone(&snapshot),
        )))?
        .register(Arc::new(ContentTypeCacheRefresher::new(
            Arc::clone(&caches),
            notifier.clone(),
        )))?
        .register(Arc::new(DataTypeCacheRefresher::new(
            Arc::clone(&caches),
            notifier,
        )))?
        .register(Arc::new(PartitionRefresher::new(
            &partition::DICTIONARY,
            Arc::clone(&caches),
        )))?
        .register(Arc::new(DomainCacheRefresher::new(
            Arc::clone(&caches),
            Arc::clone(&snapshot),
        )))?
        .register(Arc::new(LanguageCacheRefresher::new(
            Arc::clone(&caches),
            content,
            snapshot,
        )))?
        .register(Arc::new(MacroCacheRefresher::new(Arc::clone(&caches))))?
        .register(Arc::new(MemberCacheRefresher::new(Arc::clone(&caches))))?;

    for rule in [
        &partition::MEMBER_GROUP,
        &partition::PUBLIC_ACCESS,
        &partition::RELATION_TYPE,
        &partition::TEMPLATE,
    ] {
        builder.register(Arc::new(PartitionRefresher::new(rule, Arc::clone(&caches))))?;
    }

    builder.register(Arc::new(UserCacheRefresher::new(Arc::clone(&caches))))?;

    for rule in [
        &partition::USER_GROUP,
        &partition::USER_PERMISSIONS,
        &partition::STYLESHEET,
        &partition::SECTION,
        &partition::APPLICATION_TREE,
    ] {
        builder.register(Arc::new(PartitionRefresher::new(rule, Arc::clone(&caches))))?;
    }

    Ok(builder.build())
}
