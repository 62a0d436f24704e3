//! Curator - operator CLI for image cleanup and SEO metadata maintenance

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use curator::{
    config::{Args, Command, SeoCommand},
    db::{parse_object_id, MongoClient},
    images::{resolve_paths, ImageLifecycle, ImageRegistry},
    seo::{MetadataDeletion, MongoContentStore, MongoSeoStore, SeoSync, SyncError},
    storage::{AssetGateway, CloudinaryGateway, MemoryAssetStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    init_tracing(&args);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let registry = Arc::new(ImageRegistry::load(args.image_paths_file.as_deref())?);

    match &args.command {
        Command::Paths { record_type } => print_paths(&registry, record_type.as_deref()),
        Command::Purge {
            record_type,
            id,
            remove,
        } => purge(&args, registry, record_type, id, *remove).await,
        Command::Seo(cmd) => seo(&args, cmd).await,
    }
}

fn init_tracing(args: &Args) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("curator={},info", args.log_level).into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn print_paths(registry: &ImageRegistry, record_type: Option<&str>) -> anyhow::Result<()> {
    let record_types = match record_type {
        Some(rt) if registry.contains(rt) => vec![rt],
        Some(rt) => anyhow::bail!("unknown record type '{}'", rt),
        None => registry.record_types(),
    };

    for rt in record_types {
        println!("{} ({})", rt, registry.collection(rt).unwrap_or("-"));
        for path in registry.paths(rt) {
            println!("  {}", path);
        }
    }
    Ok(())
}

async fn purge(
    args: &Args,
    registry: Arc<ImageRegistry>,
    record_type: &str,
    id: &str,
    remove: bool,
) -> anyhow::Result<()> {
    let Some(collection) = registry.collection(record_type) else {
        anyhow::bail!("unknown record type '{}'", record_type);
    };
    let record_id = parse_object_id(id)?;

    let mongo = MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await?;
    let records = mongo.records(collection);
    let Some(record) = records.find_by_id(&record_id).await? else {
        anyhow::bail!("{} {} not found in '{}'", record_type, record_id, records.name());
    };

    let gateway: Arc<dyn AssetGateway> = if args.dry_run {
        let store = MemoryAssetStore::new();
        for reference in resolve_paths(&record, registry.paths(record_type)) {
            info!(reference = %reference, "Would delete image");
            store.insert(reference);
        }
        Arc::new(store)
    } else {
        let config = args
            .cloudinary_config()
            .ok_or_else(|| anyhow::anyhow!("Cloudinary credentials are not configured"))?;
        Arc::new(CloudinaryGateway::new(config)?)
    };

    let lifecycle = ImageLifecycle::new(registry, gateway).with_max_concurrent(args.max_concurrent_deletes);
    let report = lifecycle.cleanup_all(&record, record_type).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.failed > 0 {
        warn!(failed = report.failed, "Some images could not be deleted");
    }

    if remove {
        if args.dry_run {
            info!(id = %record_id, "Dry run, record kept");
        } else if records.delete_by_id(&record_id).await? {
            info!(record_type = %record_type, id = %record_id, "Record deleted");
        }
    }

    Ok(())
}

async fn seo(args: &Args, cmd: &SeoCommand) -> anyhow::Result<()> {
    let mongo = MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await?;
    let sync = SeoSync::new(
        Arc::new(MongoSeoStore::new(&mongo).await?),
        Arc::new(MongoContentStore::new(mongo.clone())),
        args.seo_defaults(),
    );

    match cmd {
        SeoCommand::Claim { kind, id } => {
            let record_id = parse_object_id(id)?;
            match sync.resync_content(*kind, record_id).await {
                Ok(outcome) => println!("{}", serde_json::to_string(&outcome)?),
                Err(SyncError::SlugConflict { slug, owner }) => {
                    anyhow::bail!("slug '{}' is already owned by a {} record", slug, owner)
                }
                Err(SyncError::Store(e)) => return Err(e.into()),
            }
        }
        SeoCommand::Delete { slug, force } => {
            if *force {
                let deleted = sync.on_content_delete(slug).await?;
                println!("{}", if deleted { "deleted" } else { "not found" });
            } else {
                let deletion = sync.on_metadata_delete_request(slug).await?;
                if let Some(message) = deletion.blocked_message() {
                    anyhow::bail!(message);
                }
                println!(
                    "{}",
                    match deletion {
                        MetadataDeletion::Deleted => "deleted",
                        _ => "not found",
                    }
                );
            }
        }
        SeoCommand::Rename {
            old_slug,
            new_slug,
            title,
        } => {
            let outcome = sync.on_metadata_rename(old_slug, new_slug, title).await?;
            println!("{}", serde_json::to_string(&outcome)?);
        }
    }

    Ok(())
}
