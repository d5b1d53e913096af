mod api;
mod auth;
mod cache;
mod database;
mod export;
mod outbound;
mod pagination;
mod preferences;
mod saved_query;
mod search;
mod settings;
mod web;

use std::process::exit;

use anyhow::{Context, Result};
use clap::Parser;
use jiff::Timestamp;
use tracing::{error, info, warn};

use crate::{
    cache::{TrialCache, TrialService},
    database::Database,
    outbound::ApiClient,
    settings::{Args, Settings},
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(e) = run().await {
        error!("{e:#}");
        exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::from_file(&args.config)
        .with_context(|| format!("cannot load {}", args.config.display()))?;
    info!("Trial dashboard server starting");

    let database = Database::connect(&settings.database.path)
        .with_context(|| format!("cannot open {}", settings.database.path.display()))?;
    let client = ApiClient::new(&settings.api)?;
    let ttl = settings.cache.ttl();
    cache::log_updates(&database);

    // Warm the cache so the first page load is served locally.
    let trials = TrialService::new(TrialCache::new(database.clone(), ttl), client.clone());
    match trials.trials(Timestamp::now()).await {
        Ok(list) => info!("{} trials available", list.len()),
        Err(e) => warn!("Trial list unavailable at startup: {e:#}"),
    }

    let schema = api::schema(
        database,
        client,
        ttl,
        settings.auth,
        settings.export.dir,
    );
    web::serve(schema, settings.web.address).await;
    Ok(())
}
