//! One-off maintenance binary: the ID-migration procedure (component
//! 4.E) and its `--cleanup-duplicates` subcommand.
//!
//! Usage:
//!   migrate                                   ID migration, dry-run (default)
//!   migrate --execute                          ID migration, actually writes
//!   migrate --cleanup-duplicates <collection>  Archive same-name duplicates, dry-run
//!   migrate --cleanup-duplicates <collection> --execute
//!   migrate --help

use std::collections::HashMap;
use std::env;

use reconciler::IdMigration;
use sink_client::{query_all, Page, PageUpdate, PropertyBag, SinkClient};
use tracing_subscriber::EnvFilter;
use utils::config::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let execute = args.iter().any(|a| a == "--execute");
    let dry_run = !execute;
    let collection = args
        .iter()
        .position(|a| a == "--cleanup-duplicates")
        .and_then(|i| args.get(i + 1))
        .cloned();

    let settings = Settings::from_env()?;
    let database_url = backend::default_database_url();
    let (source, sink, store) = backend::build_clients(&settings, &database_url).await?;

    match collection {
        Some(collection) => {
            cleanup_duplicates(sink.as_ref(), &settings, &collection, dry_run).await?;
        }
        None => {
            let migration =
                IdMigration { source: source.as_ref(), sink: sink.as_ref(), store: store.as_ref(), settings: &settings };
            let report = migration.run(dry_run).await?;
            println!("=== ID migration ({}) ===", if dry_run { "dry-run" } else { "executed" });
            println!("Relinked: {}", report.relinked.len());
            println!("Duplicates archived: {}", report.duplicates_archived.len());
            println!("Unmatched tasks: {}", report.unmatched_tasks.len());
            println!("Records rebuilt: {}", report.records_rebuilt);
            if dry_run {
                println!("\nDry-run complete. Run with --execute to apply.");
            }
        }
    }

    Ok(())
}

fn print_help() {
    println!("capsync migrate");
    println!();
    println!("Usage:");
    println!("  migrate                                   ID migration, dry-run (default)");
    println!("  migrate --execute                          ID migration, actually writes");
    println!("  migrate --cleanup-duplicates <collection>  Archive same-name duplicates, dry-run");
    println!("  migrate --cleanup-duplicates <collection> --execute");
    println!();
    println!("<collection> is one of: tasks, projects, areas, people");
}

fn collection_id(settings: &Settings, collection: &str) -> anyhow::Result<String> {
    match collection {
        "tasks" => Ok(settings.tasks_collection_id.clone()),
        "projects" => Ok(settings.projects_collection_id.clone()),
        "areas" => settings
            .areas_collection_id
            .clone()
            .ok_or_else(|| anyhow::anyhow!("AREAS_COLLECTION_ID is not configured")),
        "people" => settings
            .people_collection_id
            .clone()
            .ok_or_else(|| anyhow::anyhow!("PEOPLE_COLLECTION_ID is not configured")),
        other => Err(anyhow::anyhow!("unknown collection: {other} (expected tasks, projects, areas, or people)")),
    }
}

/// Finds pages in `collection` sharing the same (trimmed) title and
/// archives all but the oldest by `last_edited_at`. Used after a
/// migration that can double-create area/person pages (one per task
/// that independently resolved the same name before the canonical page
/// existed yet).
async fn cleanup_duplicates(
    sink: &dyn SinkClient,
    settings: &Settings,
    collection: &str,
    dry_run: bool,
) -> anyhow::Result<()> {
    let collection_id = collection_id(settings, collection)?;
    let pages = query_all(sink, &collection_id, &[]).await?;

    let mut by_title: HashMap<String, Vec<&Page>> = HashMap::new();
    for page in &pages {
        let title = page.properties.get("Title").and_then(|v| v.as_title()).unwrap_or_default();
        by_title.entry(title.trim().to_string()).or_default().push(page);
    }

    println!(
        "=== Cleanup duplicates: {collection} ({}) ===",
        if dry_run { "dry-run" } else { "executed" }
    );

    let mut archived = 0usize;
    for (title, mut group) in by_title {
        if group.len() <= 1 {
            continue;
        }
        group.sort_by_key(|page| page.last_edited_at);
        let (canonical, duplicates) = group.split_first().expect("checked len > 1 above");
        println!("{title}: keeping {} ({} duplicate(s))", canonical.id, duplicates.len());
        for duplicate in duplicates {
            if dry_run {
                println!("  would archive {}", duplicate.id);
            } else {
                sink.update_page(
                    &duplicate.id,
                    PageUpdate { properties: PropertyBag::new(), archived: Some(true) },
                )
                .await?;
                println!("  archived {}", duplicate.id);
            }
            archived += 1;
        }
    }

    println!("\nTotal duplicates {}: {archived}", if dry_run { "found" } else { "archived" });
    Ok(())
}
