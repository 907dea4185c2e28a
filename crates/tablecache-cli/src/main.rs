//! tablecache - command-line frontend for the offline-first restaurant directory.
//!
//! Every command prints pretty JSON on stdout; logs go to stderr (and to a
//! daily log file when `log_dir` is configured).

use std::io;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tablecache_core::cache::Partition;
use tablecache_core::models::{MapMarker, NewReview, Restaurant, Review};
use tablecache_core::{ApiClient, AssetWorker, CacheMode, Config, DbHelper, NetworkStatus};

const USAGE: &str = "\
Usage: tablecache [--offline] <command> [args]

Commands:
  restaurants [cuisine] [neighborhood]   List restaurants (\"all\" disables a filter)
  restaurant <id>                        Show one restaurant
  neighborhoods                          List distinct neighborhoods
  cuisines                               List distinct cuisines
  reviews <restaurant-id>                List reviews for a restaurant
  review-add <restaurant-id> <name> <rating> <comments>
  review-edit <review-id> <restaurant-id> <name> <rating> <comments>
  review-delete <review-id>
  favorite <restaurant-id> <true|false>
  install-assets                         Pre-cache the static asset manifest
  asset <path-or-url>                    Fetch an asset through the asset cache
  cache-info                             Show local cache location and age
  cache-clear                            Empty the local caches";

/// Log file name inside `log_dir`; rotated daily.
const LOG_FILE: &str = "tablecache.log";

/// Initialize the tracing subscriber for logging.
///
/// Use RUST_LOG to control the level (e.g., RUST_LOG=tablecache_core=debug).
/// The returned guard flushes the file writer and must be held until exit.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();

    guard
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// A restaurant with the derived values a page needs.
#[derive(Serialize)]
struct RestaurantView<'a> {
    #[serde(flatten)]
    restaurant: &'a Restaurant,
    url: String,
    image_url: String,
    marker: Option<MapMarker>,
    hours: Vec<(&'a str, &'a str)>,
}

impl<'a> RestaurantView<'a> {
    fn new(restaurant: &'a Restaurant) -> Self {
        Self {
            restaurant,
            url: restaurant.url(),
            image_url: restaurant.image_url(),
            marker: restaurant.map_marker(),
            hours: restaurant.hours_in_week_order(),
        }
    }
}

#[derive(Serialize)]
struct CacheInfo {
    cache_dir: String,
    mode: &'static str,
    partitions: Vec<PartitionInfo>,
    assets: Vec<AssetInfo>,
}

#[derive(Serialize)]
struct PartitionInfo {
    name: &'static str,
    age: String,
}

#[derive(Serialize)]
struct AssetInfo {
    url: String,
    age: String,
}

#[derive(Serialize)]
struct AssetOutput {
    status: u16,
    content_type: Option<String>,
    bytes: usize,
    text: Option<String>,
}

fn parse_id(value: &str, what: &str) -> Result<i64> {
    value
        .parse()
        .with_context(|| format!("Invalid {}: {}", what, value))
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("Missing argument <{}>\n\n{}", name, USAGE))
}

/// Parse `review-edit` arguments. Timestamps are left for the coordinator to set.
fn edited_review(args: &[String]) -> Result<Review> {
    Ok(Review {
        id: parse_id(arg(args, 1, "review-id")?, "review id")?,
        restaurant_id: parse_id(arg(args, 2, "restaurant-id")?, "restaurant id")?,
        name: arg(args, 3, "name")?.to_string(),
        rating: parse_id(arg(args, 4, "rating")?, "rating")?,
        comments: args.get(5..).map(|rest| rest.join(" ")).unwrap_or_default(),
        created_at: None,
        updated_at: None,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut config = Config::load()?;
    config.apply_env();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if let Some(pos) = args.iter().position(|a| a == "--offline") {
        args.remove(pos);
        config.start_offline = true;
    }

    let _guard = init_tracing(&config);

    let Some(command) = args.first().cloned() else {
        eprintln!("{}", USAGE);
        return Ok(());
    };
    if command == "--help" || command == "-h" {
        println!("{}", USAGE);
        return Ok(());
    }

    let network = NetworkStatus::new(!config.start_offline);
    let client = ApiClient::from_config(&config)?;
    let helper = DbHelper::new(client.clone(), CacheMode::detect(&config), network.clone());
    info!(api = client.base_url(), online = network.is_online(), "tablecache starting");

    let result = run(&command, &args, &config, &helper, client, network).await;

    // Let fire-and-forget writes finish before the runtime shuts down
    helper.settle().await;
    result
}

async fn run(
    command: &str,
    args: &[String],
    config: &Config,
    helper: &DbHelper,
    client: ApiClient,
    network: NetworkStatus,
) -> Result<()> {
    match command {
        "restaurants" => {
            let cuisine = args.get(1).map(String::as_str).unwrap_or("all");
            let neighborhood = args.get(2).map(String::as_str).unwrap_or("all");
            let restaurants = helper
                .fetch_restaurant_by_cuisine_and_neighborhood(cuisine, neighborhood)
                .await?;
            let views: Vec<RestaurantView> = restaurants.iter().map(RestaurantView::new).collect();
            print_json(&views)
        }
        "restaurant" => {
            let restaurant = helper.fetch_restaurant_by_id(arg(args, 1, "id")?).await?;
            print_json(&RestaurantView::new(&restaurant))
        }
        "neighborhoods" => print_json(&helper.fetch_neighborhoods().await?),
        "cuisines" => print_json(&helper.fetch_cuisines().await?),
        "reviews" => {
            let restaurant_id = parse_id(arg(args, 1, "restaurant-id")?, "restaurant id")?;
            print_json(&helper.fetch_reviews(restaurant_id).await?)
        }
        "review-add" => {
            let draft = NewReview {
                restaurant_id: parse_id(arg(args, 1, "restaurant-id")?, "restaurant id")?,
                name: arg(args, 2, "name")?.to_string(),
                rating: parse_id(arg(args, 3, "rating")?, "rating")?,
                comments: args.get(4..).map(|rest| rest.join(" ")).unwrap_or_default(),
            };
            print_json(&helper.post_review(draft).await?)
        }
        "review-edit" => {
            let review = edited_review(args)?;
            print_json(&helper.edit_review(review).await?)
        }
        "review-delete" => {
            let id = parse_id(arg(args, 1, "review-id")?, "review id")?;
            helper.delete_review(id).await?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
        "favorite" => {
            let id = parse_id(arg(args, 1, "restaurant-id")?, "restaurant id")?;
            let value: bool = arg(args, 2, "true|false")?
                .parse()
                .context("Favorite flag must be true or false")?;
            helper.toggle_restaurant_favorite(id, value).await;
            print_json(&serde_json::json!({ "restaurant_id": id, "is_favorite": value }))
        }
        "install-assets" => {
            let worker = AssetWorker::from_config(config, client, network)?;
            let count = worker.install().await?;
            print_json(&serde_json::json!({ "installed": count, "urls": worker.manifest().entries() }))
        }
        "asset" => {
            let worker = AssetWorker::from_config(config, client, network)?;
            let response = worker.handle_path(arg(args, 1, "path-or-url")?).await?;
            print_json(&AssetOutput {
                status: response.status,
                content_type: response.content_type.clone(),
                bytes: response.body.len(),
                text: String::from_utf8(response.body).ok(),
            })
        }
        "cache-info" => {
            let cache_dir = config.cache_dir()?;
            let partitions = match helper.cache().store() {
                Some(store) => Partition::ALL
                    .iter()
                    .map(|&p| PartitionInfo {
                        name: p.name(),
                        age: store.cache_age(p).unwrap_or_else(|e| format!("unreadable: {}", e)),
                    })
                    .collect(),
                None => Vec::new(),
            };
            let worker = AssetWorker::from_config(config, client, network)?;
            let assets = worker
                .cache()
                .entries()
                .await
                .into_iter()
                .map(|(url, age)| AssetInfo { url, age })
                .collect();

            print_json(&CacheInfo {
                cache_dir: cache_dir.display().to_string(),
                mode: match helper.cache() {
                    CacheMode::WithCache(_) => "with-cache",
                    CacheMode::CacheLess => "cache-less",
                },
                partitions,
                assets,
            })
        }
        "cache-clear" => {
            if let Some(store) = helper.cache().store() {
                store.clear().await?;
            }
            let worker = AssetWorker::from_config(config, client, network)?;
            worker.cache().clear().await?;
            print_json(&serde_json::json!({ "cleared": true }))
        }
        other => bail!("Unknown command: {}\n\n{}", other, USAGE),
    }
}
