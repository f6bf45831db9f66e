use clap::{Parser, Subcommand};
use rust_anime_scraper::config::Config;
use rust_anime_scraper::filters::FilterList;
use rust_anime_scraper::models::{EpisodeRef, ListingItem};
use rust_anime_scraper::preferences::{InMemoryPreferences, PreferenceStore, SourcePreferences};
use rust_anime_scraper::{AnimeSource, SourceContext, SourceError, SourceRegistry};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "rust-anime-scraper", version, about = "Browse anime sources and resolve episode streams")]
struct Cli {
    /// Configuration file; defaults to ./config.toml when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Preference override as `source.key=value`, repeatable
    #[arg(long = "pref", global = true)]
    prefs: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every registered source
    Sources,
    /// Popular listing of a source
    Popular {
        source: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Latest updates of a source
    Latest {
        source: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Search a source; filters are `key=value` pairs
    Search {
        source: String,
        #[arg(default_value = "")]
        query: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long = "filter")]
        filters: Vec<String>,
    },
    /// Details of a listing URL
    Details { source: String, url: String },
    /// Episodes of a listing URL
    Episodes { source: String, url: String },
    /// Resolved streams of an episode URL
    Videos { source: String, url: String },
    /// Filters and preference options of a source
    Options { source: String },
    /// Per-hoster resolution metrics gathered while running `videos`
    Metrics { source: String, url: String },
}

#[derive(Serialize)]
struct SourceInfo {
    id: &'static str,
    name: &'static str,
    lang: &'static str,
    base_url: String,
    supports_latest: bool,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), SourceError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn apply_pref_overrides(store: &dyn PreferenceStore, overrides: &[String]) {
    for entry in overrides {
        let parsed = entry
            .split_once('=')
            .and_then(|(path, value)| path.split_once('.').map(|(source, key)| (source, key, value)));
        match parsed {
            Some((source, key, value)) => {
                store.set(&SourcePreferences::namespaced_key(source, key), value)
            }
            None => log::warn!("Ignoring malformed preference override '{}'", entry),
        }
    }
}

fn build_filters(source: &dyn AnimeSource, pairs: &[String]) -> FilterList {
    let mut filters = source.filter_list();
    for pair in pairs {
        match pair.split_once('=') {
            Some((key, value)) if filters.set_value(key, value) => {}
            _ => log::warn!("Ignoring unknown filter '{}' for {}", pair, source.id()),
        }
    }
    filters
}

fn listing(url: &str) -> ListingItem {
    ListingItem {
        title: String::new(),
        url: url.to_string(),
        thumbnail_url: None,
    }
}

fn episode(url: &str) -> EpisodeRef {
    EpisodeRef {
        number: 0.0,
        name: String::new(),
        url: url.to_string(),
        date_upload: None,
    }
}

async fn run(cli: Cli) -> Result<(), SourceError> {
    let cfg = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };

    let client = cfg.http.create_http_client()?;
    log::info!(
        "HTTP client ready (timeout {}s, {} retries)",
        cfg.http.timeout_secs,
        cfg.http.max_retries
    );

    let store = Arc::new(InMemoryPreferences::new());
    cfg.seed_preferences(store.as_ref());
    apply_pref_overrides(store.as_ref(), &cli.prefs);

    let ctx = SourceContext::new(client, store);
    let registry = SourceRegistry::new(&ctx);

    match cli.command {
        Command::Sources => {
            let infos: Vec<SourceInfo> = registry
                .all()
                .iter()
                .map(|s| SourceInfo {
                    id: s.id(),
                    name: s.name(),
                    lang: s.lang(),
                    base_url: s.base_url(),
                    supports_latest: s.supports_latest(),
                })
                .collect();
            print_json(&infos)
        }
        Command::Popular { source, page } => {
            print_json(&registry.get(&source)?.list_popular(page).await?)
        }
        Command::Latest { source, page } => {
            print_json(&registry.get(&source)?.list_latest(page).await?)
        }
        Command::Search {
            source,
            query,
            page,
            filters,
        } => {
            let source = registry.get(&source)?;
            let filters = build_filters(source.as_ref(), &filters);
            print_json(&source.search(page, &query, &filters).await?)
        }
        Command::Details { source, url } => {
            print_json(&registry.get(&source)?.fetch_details(&listing(&url)).await?)
        }
        Command::Episodes { source, url } => {
            print_json(&registry.get(&source)?.fetch_episodes(&listing(&url)).await?)
        }
        Command::Videos { source, url } => {
            print_json(&registry.get(&source)?.fetch_videos(&episode(&url)).await?)
        }
        Command::Options { source } => {
            let source = registry.get(&source)?;
            print_json(&serde_json::json!({
                "filters": source.filter_list(),
                "preferences": source.configurable_options().await,
            }))
        }
        Command::Metrics { source, url } => {
            let videos = registry.get(&source)?.fetch_videos(&episode(&url)).await?;
            log::info!("Resolved {} stream(s)", videos.len());
            print_json(&ctx.metrics.get_all_metrics())
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Cli::parse()).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
