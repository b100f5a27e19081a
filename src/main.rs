use std::collections::HashSet;
use std::sync::Arc;

use catfeed::cli::Args;
use catfeed::config::Config;
use catfeed::feed::{Feed, FeedEvent};
use catfeed::memory::{FixedBudget, MemoryBudget, SystemBudget};
use catfeed::{HttpCatalog, logging};
use clap::Parser;

/// Stand-in for the scrolling UI: walks a cursor over the loaded items,
/// requests each item's asset as it scrolls past, and asks for the next page
/// once the cursor comes within the loading threshold of the loaded end.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    // Handle --generate-config option
    if let Some(path) = &args.generate_config {
        let config_path = if path.is_dir() || path.to_str() == Some(".") {
            path.join("config.toml")
        } else {
            path.clone()
        };
        Config::generate_default(config_path)?;
        return Ok(());
    }

    let mut config = Config::load(args.config.clone())?;

    if let Some(ref url) = args.base_url {
        config.api.base_url = url.clone();
    }

    if config.logging.enabled {
        logging::ensure_log_directory()?;
        logging::init_logger(&config.logging)?;
        logging::log_startup_info();
    }

    let budget: Arc<dyn MemoryBudget> = match config.cache.fixed_budget_bytes {
        Some(bytes) => Arc::new(FixedBudget(bytes)),
        None => Arc::new(SystemBudget::new()),
    };

    let catalog = Arc::new(HttpCatalog::new(&config.api, Arc::clone(&budget)));
    let mut feed = Feed::new(catalog, budget.as_ref(), config.cache.page_size);
    let mut events = feed.subscribe();

    let threshold = config.cache.loading_threshold;
    let mut pages_seen = 0usize;
    let mut cursor = 0usize;
    // Keys whose fetch was dispatched and whose notification is still due.
    // Only first requests count: a repeated key while its fetch is in
    // flight deduplicates and produces no extra notification.
    let mut requested: HashSet<String> = HashSet::new();
    let mut pending = 0usize;

    if args.pages > 0 {
        feed.request_next_page();
    }

    loop {
        // Scroll over everything loaded so far.
        while cursor < feed.loaded_count() {
            let id = feed.items()[cursor].id.clone();
            if requested.insert(id.clone()) {
                match feed.request_asset(&id, Some(cursor)) {
                    Some(asset) => println!(
                        "  {id}: {} ({} bytes decoded)",
                        asset.content_type, asset.byte_cost
                    ),
                    None => pending += 1,
                }
            }
            cursor += 1;

            // Within the threshold of the loaded end: trigger the next page,
            // like a scroll listener approaching the last row.
            if feed.loaded_count() - cursor <= threshold && pages_seen < args.pages {
                feed.request_next_page();
            }
        }

        if pending == 0 && !feed.is_loading() {
            break;
        }

        if !feed.process_next().await {
            break;
        }

        while let Ok(event) = events.try_recv() {
            match event {
                FeedEvent::ItemsInserted { offset, count } => {
                    pages_seen += 1;
                    println!(
                        "page {pages_seen}: {count} items at offset {offset} ({} loaded)",
                        feed.loaded_count()
                    );
                }
                FeedEvent::PageFailed { error } => {
                    pages_seen += 1;
                    eprintln!("page load failed: {error}");
                }
                ref asset_event => {
                    if report_asset_event(asset_event) {
                        pending -= 1;
                    }
                }
            }
        }
    }

    if feed.all_loaded() {
        println!("catalog exhausted after {} items", feed.loaded_count());
    }

    feed.log_cache_stats();

    if config.logging.enabled {
        logging::log_shutdown_info();
    }

    Ok(())
}

/// Print one asset notification. Returns whether the event was one, so the
/// caller can settle its pending count in a single place.
fn report_asset_event(event: &FeedEvent) -> bool {
    match event {
        FeedEvent::AssetReady { key, position } => {
            match position {
                Some(p) => println!("  {key}: ready (item {p})"),
                None => println!("  {key}: ready"),
            }
            true
        }
        FeedEvent::AssetFailed { key } => {
            eprintln!("  {key}: fetch failed");
            true
        }
        _ => false,
    }
}
