//! flickr-orphans: finds Flickr photos that were uploaded but never put in
//! an album, and optionally saves them locally and deletes them remotely.
//!
//! Every remote call goes through a single rate-limited caller with a shared
//! failure budget, and everything observed is recorded in a local SQLite
//! database so repeated runs stay cheap and idempotent.

#![warn(clippy::all)]

mod classify;
mod cli;
mod config;
mod delete;
mod download;
mod fetch;
mod flickr;
mod progress;
mod reconcile;
pub mod retry;
mod state;
#[cfg(test)]
mod testing;
mod types;

use std::io::{IsTerminal, Write};
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use classify::Classifier;
use config::Config;
use delete::{delete_photos, DeleteSummary};
use download::{save_photos, SaveConfig, SaveSummary};
use fetch::PagedFetcher;
use flickr::{Account, Album, Container, FlickrClient, Photo, PhotoService, Photostream};
use reconcile::Reconciler;
use retry::RateLimitedCaller;
use state::{PhotoDb, SqlitePhotoDb, StoreSummary};
use types::DeleteScope;

/// What one run did, for the closing summary.
#[derive(Debug, Default)]
struct RunReport {
    fetched: usize,
    orphans: usize,
    errors: usize,
    rest: usize,
    saved: Option<SaveSummary>,
    deleted: Option<DeleteSummary>,
    store: StoreSummary,
}

/// Resolve `--album` to a container. No name means the whole photostream.
async fn select_container(
    service: &dyn PhotoService,
    caller: &mut RateLimitedCaller,
    account: &Account,
    albums: &[Album],
    name: Option<&str>,
) -> anyhow::Result<Container> {
    let Some(name) = name else {
        return Ok(Container::Photostream(Photostream {
            owner: account.id.clone(),
        }));
    };
    if let Some(album) = albums.iter().find(|a| a.title == name) {
        return Ok(Container::Album(album.clone()));
    }

    let collections = match caller
        .call("list_collections", || service.list_collections(account))
        .await
    {
        Ok(collections) => collections,
        Err(e) => {
            tracing::warn!("Could not list collections: {}", e);
            Vec::new()
        }
    };
    if let Some(collection) = collections.into_iter().find(|c| c.title == name) {
        return Ok(Container::Collection(collection));
    }

    let available: Vec<&str> = albums.iter().map(|a| a.title.as_str()).collect();
    anyhow::bail!(
        "No album named '{}' (available: {})",
        name,
        available.join(", ")
    )
}

fn is_yes(answer: &str) -> bool {
    answer
        .trim_start()
        .chars()
        .next()
        .is_some_and(|c| c.eq_ignore_ascii_case(&'y'))
}

/// Ask on the terminal before deleting. Without a terminal the answer is no.
fn prompt_delete(count: usize) -> bool {
    if !std::io::stdin().is_terminal() {
        tracing::warn!("No terminal to confirm deletion on; pass --yes to delete");
        return false;
    }
    print!("Delete {count} photos (y/n)? ");
    let _ = std::io::stdout().flush();
    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    is_yes(&answer)
}

fn log_bucket(label: &str, photos: &[Photo]) {
    for photo in photos {
        tracing::info!(
            "{}: {} https://www.flickr.com/photos/{}/{}/",
            label,
            photo,
            photo.owner,
            photo.id
        );
    }
}

async fn run(
    config: &Config,
    service: &dyn PhotoService,
    db: &dyn PhotoDb,
    caller: &mut RateLimitedCaller,
    confirm: &dyn Fn(usize) -> bool,
) -> anyhow::Result<RunReport> {
    let account = caller
        .call("authenticate", || service.authenticate(&config.username))
        .await
        .with_context(|| format!("Could not look up Flickr user '{}'", config.username))?;
    tracing::info!("Signed in as {} ({})", account.username, account.id);

    let reconciler = Reconciler::new(service, db);

    let albums = match caller
        .call("list_containers", || service.list_containers(&account))
        .await
    {
        Ok(albums) => albums,
        // Only resolving `--album` needs the list.
        Err(e) if config.album.is_none() => {
            tracing::warn!("Could not list albums, continuing without them: {}", e);
            Vec::new()
        }
        Err(e) => return Err(anyhow::Error::new(e).context("Could not list albums")),
    };
    match reconciler.upsert_albums(&albums).await {
        Ok(stats) => tracing::info!(
            "{} albums ({} new)",
            albums.len(),
            stats.inserted
        ),
        Err(e) => tracing::warn!("Failed to record albums: {}", e),
    }

    let container =
        select_container(service, caller, &account, &albums, config.album.as_deref()).await?;

    let fetcher = PagedFetcher::new(service, &reconciler);
    let photos = fetcher
        .fetch_all(caller, &container, config.max_photos)
        .await?;
    tracing::info!("Fetched {} photos from {}", photos.len(), container);

    let classifier = Classifier::new(service, &config.sentinel_album);
    let buckets = classifier.classify(caller, &photos).await;
    log_bucket("Orphan", &buckets.orphans);
    log_bucket("Lookup failed", &buckets.errors);

    let mut report = RunReport {
        fetched: photos.len(),
        orphans: buckets.orphans.len(),
        errors: buckets.errors.len(),
        rest: buckets.rest.len(),
        ..RunReport::default()
    };

    if let Some(directory) = &config.save_dir {
        let targets: Vec<Photo> = if config.save_all {
            photos.clone()
        } else {
            buckets
                .orphans
                .iter()
                .chain(&buckets.errors)
                .cloned()
                .collect()
        };
        let save_config = SaveConfig {
            directory: directory.clone(),
            no_progress_bar: config.no_progress_bar,
        };
        let summary = save_photos(service, &reconciler, caller, &targets, &account, &save_config)
            .await
            .with_context(|| format!("Could not save into {}", directory.display()))?;
        report.saved = Some(summary);
    }

    if let Some(scope) = config.delete {
        let targets = match scope {
            DeleteScope::Orphans => &buckets.orphans,
            DeleteScope::All => &photos,
        };
        if targets.is_empty() {
            tracing::info!("Nothing to delete");
        } else {
            let confirmed = config.assume_yes || confirm(targets.len());
            let summary = delete_photos(
                service,
                &reconciler,
                caller,
                targets,
                confirmed,
                config.no_progress_bar,
            )
            .await;
            report.deleted = Some(summary);
        }
    }

    report.store = db.get_summary().await?;
    Ok(report)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    let config = Config::from_cli(cli)?;
    tracing::debug!(?config, "Starting flickr-orphans");
    let started = Instant::now();

    let client = FlickrClient::new(&config.credentials, config.timeout)
        .context("Failed to build HTTP client")?;
    let db = SqlitePhotoDb::open(&config.database)
        .await
        .with_context(|| format!("Failed to open database {}", config.database.display()))?;
    tracing::debug!("Using database {}", db.path().display());

    let mut caller = RateLimitedCaller::default();
    let report = run(&config, &client, &db, &mut caller, &|count: usize| {
        tokio::task::block_in_place(|| prompt_delete(count))
    })
    .await?;

    tracing::info!("── Summary ──");
    tracing::info!(
        "  {} photos: {} orphans, {} lookup failures, {} in albums",
        report.fetched,
        report.orphans,
        report.errors,
        report.rest
    );
    if let Some(saved) = report.saved {
        tracing::info!(
            "  saved {}, already present {}, failed {}",
            saved.saved,
            saved.skipped,
            saved.failed
        );
    }
    if let Some(deleted) = report.deleted {
        tracing::info!("  deleted {}, failed {}", deleted.deleted, deleted.failed);
    }
    tracing::info!(
        "  database: {} photos, {} albums, {} saved, {} deleted",
        report.store.photos,
        report.store.albums,
        report.store.saved,
        report.store.deleted
    );
    let budget = caller.budget();
    tracing::info!(
        "  {} remote calls, {} pacing pauses",
        budget.calls,
        budget.pauses
    );
    tracing::info!("  elapsed: {}", progress::format_duration(started.elapsed()));

    Ok(())
}
