use std::{fmt::Debug, path::Path, process, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

use cachefarm::{
    cache::{
        AppCaches, CacheConfig, InstructionProcessor, RecordingSnapshotService, RefresherDescriptor,
        RefresherRegistry, SnapshotNotifier, standard_registry,
    },
    config,
    infra::{error::InfraError, telemetry},
};
use cachefarm_wire::{
    ContentPayload, ContentTypePayload, DataTypePayload, DomainPayload, LanguagePayload,
    MacroPayload, MediaPayload, MemberPayload, UserPayload, decode_lenient, ids,
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &InfraError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), InfraError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| InfraError::configuration(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging)?;

    let command = cli_args.command.unwrap_or(config::Command::Refreshers);
    let local = LocalFarm::build(&settings)?;

    match command {
        config::Command::Refreshers => run_refreshers(&local),
        config::Command::Apply(args) => run_apply(&local, args).await,
        config::Command::Decode(args) => run_decode(&local, args).await,
    }
}

/// The in-process half of a farm server: caches, snapshot and refreshers.
struct LocalFarm {
    registry: Arc<RefresherRegistry>,
    snapshot: Arc<RecordingSnapshotService>,
    notifier: SnapshotNotifier,
}

impl LocalFarm {
    fn build(settings: &config::Settings) -> Result<Self, InfraError> {
        let cache_config = CacheConfig::from(&settings.cache);
        let caches = Arc::new(AppCaches::new(&cache_config));
        let snapshot = Arc::new(RecordingSnapshotService::new());

        let notifier = if cache_config.background_model_rebuild {
            SnapshotNotifier::queued(snapshot.clone())?
        } else {
            SnapshotNotifier::inline(snapshot.clone())
        };
        let registry = standard_registry(caches, notifier.clone())?;

        info!(
            server = %settings.farm.server_identity,
            refreshers = registry.len(),
            background_model_rebuild = cache_config.background_model_rebuild,
            "Local cache farm node ready"
        );

        Ok(Self {
            registry: Arc::new(registry),
            snapshot,
            notifier,
        })
    }

    async fn drained(&self) {
        if let Some(queue) = self.notifier.queue() {
            queue.wait_drained().await;
        }
    }
}

fn run_refreshers(local: &LocalFarm) -> Result<(), InfraError> {
    for descriptor in local.registry.descriptors() {
        println!(
            "{:<18} {} {}",
            descriptor.name,
            descriptor.id,
            descriptor.kind.as_str()
        );
    }
    Ok(())
}

async fn run_apply(local: &LocalFarm, args: config::ApplyArgs) -> Result<(), InfraError> {
    let json = read_input(&args.instructions).await?;
    let processor = InstructionProcessor::new(local.registry.clone());

    let report = processor.process_json(&json)?;
    local.drained().await;

    println!("{report}");
    for notification in local.snapshot.take() {
        println!("{notification:?}");
    }
    Ok(())
}

async fn run_decode(local: &LocalFarm, args: config::DecodeArgs) -> Result<(), InfraError> {
    let refresher = local.registry.find(&args.refresher).ok_or_else(|| {
        InfraError::configuration(format!("no cache refresher named `{}`", args.refresher))
    })?;
    let descriptor = refresher.descriptor();
    let json = read_input(&args.payload).await?;

    match descriptor.id {
        ids::CONTENT => print_decoded::<ContentPayload>(descriptor, &json),
        ids::MEDIA => print_decoded::<MediaPayload>(descriptor, &json),
        ids::CONTENT_TYPE => print_decoded::<ContentTypePayload>(descriptor, &json),
        ids::DATA_TYPE => print_decoded::<DataTypePayload>(descriptor, &json),
        ids::LANGUAGE => print_decoded::<LanguagePayload>(descriptor, &json),
        ids::DOMAIN => print_decoded::<DomainPayload>(descriptor, &json),
        ids::MEMBER => print_decoded::<MemberPayload>(descriptor, &json),
        ids::USER => print_decoded::<UserPayload>(descriptor, &json),
        ids::MACRO => print_decoded::<MacroPayload>(descriptor, &json),
        _ => Err(InfraError::configuration(format!(
            "cache refresher `{}` takes no JSON payload",
            descriptor.name
        ))),
    }
}

fn print_decoded<T>(descriptor: &RefresherDescriptor, json: &str) -> Result<(), InfraError>
where
    T: DeserializeOwned + Serialize + Debug,
{
    let decoded = decode_lenient::<T>(json)?;

    println!(
        "{}: {} payload(s), {} skipped",
        descriptor.name,
        decoded.payloads.len(),
        decoded.skipped.len()
    );
    for payload in &decoded.payloads {
        println!("{}", serde_json::to_string(payload).map_err(cachefarm_wire::WireError::from)?);
    }
    for skipped in &decoded.skipped {
        println!("skipped: {skipped}");
    }
    Ok(())
}

async fn read_input(path: &Path) -> Result<String, InfraError> {
    tokio::fs::read_to_string(path).await.map_err(InfraError::from)
}
