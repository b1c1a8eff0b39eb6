use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::api::client::HttpApi;
use crate::api::filters::{Selector, ALL};
use crate::api::gateway::{Fetched, Gateway};
use crate::api::types::{NewReview, Restaurant, Review};
use crate::api::urls;
use crate::assets::{AssetController, HttpFetcher, ServedFrom};
use crate::config::Config;
use crate::store::LocalStore;
use crate::sync::{
  toggle_favorite, DrainReport, FavoriteOutcome, LedgerSync, ReviewQueue, Submission,
  SyncCoordinator,
};

#[derive(Parser, Debug)]
#[command(name = "rr")]
#[command(about = "Browse restaurants and reviews, online or off")]
#[command(version)]
pub struct Args {
  /// Path to config file (default: ./rr.yaml or $XDG_CONFIG_HOME/rr/config.yaml)
  #[arg(short, long, global = true)]
  pub config: Option<PathBuf>,

  /// Also print logs to stderr
  #[arg(short, long, global = true)]
  pub verbose: bool,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  #[command(flatten)]
  Data(DataCommand),
  /// Manage the static asset cache
  Assets {
    #[command(subcommand)]
    command: AssetsCommand,
  },
}

/// Commands served by the gateway and the review queue
#[derive(Subcommand, Debug)]
pub enum DataCommand {
  /// List restaurants, optionally filtered
  Restaurants {
    #[arg(long, default_value = ALL)]
    cuisine: String,
    #[arg(long, default_value = ALL)]
    neighborhood: String,
  },
  /// List distinct neighborhoods
  Neighborhoods,
  /// List distinct cuisines
  Cuisines,
  /// Show one restaurant
  Restaurant { id: i64 },
  /// Show reviews of a restaurant, including ones not yet synced
  Reviews { restaurant_id: i64 },
  /// Write a review
  Review {
    restaurant_id: i64,
    #[arg(long)]
    name: String,
    #[arg(long)]
    rating: u8,
    #[arg(long, default_value = "")]
    comments: String,
  },
  /// Toggle the favorite flag of a restaurant
  Favorite { id: i64 },
  /// List queued reviews
  Pending,
  /// Deliver registered sync requests
  Sync {
    /// Keep delivering every N seconds until interrupted
    #[arg(long, value_name = "SECS")]
    watch: Option<u64>,
  },
}

#[derive(Subcommand, Debug)]
pub enum AssetsCommand {
  /// Precache the app shell
  Install,
  /// Delete outdated cache buckets
  Activate,
  /// Request a url through the cache
  Get {
    url: String,
    /// Write the body to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
}

type AppGateway = Gateway<HttpApi, LocalStore>;

pub async fn run(command: Command, config: Config) -> Result<()> {
  match command {
    Command::Data(command) => run_gateway(command, &config).await,
    Command::Assets { command } => run_assets(command, &config).await,
  }
}

async fn run_gateway(command: DataCommand, config: &Config) -> Result<()> {
  let store = Arc::new(LocalStore::open(&config.store_path()?));
  let gateway: AppGateway = Gateway::new(HttpApi::new(config)?, Arc::clone(&store));

  let result = run_data(command, config, &gateway, store).await;
  // Let mirrored responses land before exit
  gateway.flush().await;
  result
}

async fn run_data(
  command: DataCommand,
  config: &Config,
  gateway: &AppGateway,
  store: Arc<LocalStore>,
) -> Result<()> {
  let queue = ReviewQueue::new(gateway.clone(), LedgerSync::new(store, config.deferred_sync));

  match command {
    DataCommand::Restaurants {
      cuisine,
      neighborhood,
    } => {
      let cuisine = Selector::from(cuisine.as_str());
      let neighborhood = Selector::from(neighborhood.as_str());
      let fetched = match (&cuisine, &neighborhood) {
        (Selector::All, Selector::All) => gateway.fetch_restaurants().await,
        (_, Selector::All) => gateway.fetch_restaurants_by_cuisine(&cuisine).await,
        (Selector::All, _) => gateway.fetch_restaurants_by_neighborhood(&neighborhood).await,
        _ => {
          gateway
            .fetch_restaurants_by_cuisine_and_neighborhood(&cuisine, &neighborhood)
            .await
        }
      };
      note_offline(&fetched);
      for restaurant in &fetched.data {
        print_restaurant_line(restaurant);
      }
    }
    DataCommand::Neighborhoods => {
      let fetched = gateway.fetch_neighborhoods().await;
      note_offline(&fetched);
      fetched.data.iter().for_each(|n| println!("{}", n));
    }
    DataCommand::Cuisines => {
      let fetched = gateway.fetch_cuisines().await;
      note_offline(&fetched);
      fetched.data.iter().for_each(|c| println!("{}", c));
    }
    DataCommand::Restaurant { id } => {
      let fetched = gateway.fetch_restaurant_by_id(id).await;
      note_offline(&fetched);
      match &fetched.data {
        Some(restaurant) => print_restaurant(restaurant),
        None => println!("No data for restaurant {}", id),
      }
    }
    DataCommand::Reviews { restaurant_id } => {
      let fetched = gateway.fetch_reviews_by_restaurant_id(restaurant_id).await;
      note_offline(&fetched);
      for review in &fetched.data {
        print_review(review, false);
      }
      for pending in queue.pending_for(restaurant_id)? {
        if let Some(review) = pending.as_review() {
          print_review(&review, true);
        }
      }
      if fetched.data.is_empty() {
        println!("No reviews yet!");
      }
    }
    DataCommand::Review {
      restaurant_id,
      name,
      rating,
      comments,
    } => {
      let review = NewReview::new(restaurant_id, name, rating, comments)?;
      let submission = queue.submit(review).await?;
      let queued = matches!(submission, Submission::Queued { .. });
      print_review(submission.review(), queued);
      if let Submission::Queued { tag, .. } = submission {
        println!("Queued; will sync as {}", tag);
      }
    }
    DataCommand::Favorite { id } => {
      let Some(mut restaurant) = gateway.fetch_restaurant_by_id(id).await.data else {
        return Err(eyre!("No data for restaurant {}", id));
      };
      match toggle_favorite(gateway, &mut restaurant).await {
        FavoriteOutcome::Confirmed(r) => println!("{}: favorite = {}", r.name, r.is_favorite),
        FavoriteOutcome::Unconfirmed { requested } => println!(
          "{}: favorite = {} (not confirmed by server)",
          restaurant.name, requested
        ),
      }
    }
    DataCommand::Pending => {
      for pending in queue.pending()? {
        println!(
          "#{} restaurant {} by {} ({:?})",
          pending.id.unwrap_or_default(),
          pending.review.restaurant_id,
          pending.review.name,
          pending.state
        );
      }
    }
    DataCommand::Sync { watch } => {
      let coordinator = SyncCoordinator::new(gateway.clone());
      match watch {
        Some(secs) => coordinator.watch(Duration::from_secs(secs.max(1))).await?,
        None => {
          print_report(&coordinator.drain().await?);
        }
      }
    }
  }

  Ok(())
}

async fn run_assets(command: AssetsCommand, config: &Config) -> Result<()> {
  let controller = AssetController::from_config(config, HttpFetcher::new()?)?;

  match command {
    AssetsCommand::Install => {
      let count = controller.install().await?;
      println!("Installed {} assets into {}", count, config.assets.static_cache);
    }
    AssetsCommand::Activate => {
      let deleted = controller.activate()?;
      if deleted.is_empty() {
        println!("No outdated buckets");
      }
      for name in deleted {
        println!("Deleted {}", name);
      }
    }
    AssetsCommand::Get { url, output } => {
      let origin = Url::parse(&config.origin)?;
      let url = origin.join(&url)?;
      let served = controller.handle_fetch(&url).await?;
      let from = match served.served_from {
        ServedFrom::Cache => "cache",
        ServedFrom::Network => "network",
      };
      println!(
        "{} {} from {} ({} bytes, {})",
        served.response.status,
        url,
        from,
        served.response.body.len(),
        served.response.content_type.as_deref().unwrap_or("unknown type")
      );
      if let Some(path) = output {
        std::fs::write(&path, &served.response.body)?;
      }
    }
  }

  Ok(())
}

fn print_report(report: &DrainReport) {
  if report.recovered > 0 {
    println!("re-registered {} queued reviews", report.recovered);
  }
  println!(
    "confirmed {}, already confirmed {}, ignored {}, invalid {}, failed {}",
    report.confirmed, report.already_confirmed, report.ignored, report.invalid, report.failed
  );
}

fn note_offline<T>(fetched: &Fetched<T>) {
  if fetched.is_offline() {
    eprintln!("(offline: showing stored data)");
  }
}

fn print_restaurant_line(restaurant: &Restaurant) {
  println!(
    "{:>4}  {}{}  [{} / {}]  {}",
    restaurant.id,
    restaurant.name,
    if restaurant.is_favorite { " *" } else { "" },
    restaurant.cuisine_type,
    restaurant.neighborhood,
    urls::url_for_restaurant(restaurant)
  );
}

fn print_restaurant(restaurant: &Restaurant) {
  println!(
    "{}{}",
    restaurant.name,
    if restaurant.is_favorite { " (favorite)" } else { "" }
  );
  println!("  {}", restaurant.address);
  println!(
    "  {} in {}",
    restaurant.cuisine_type, restaurant.neighborhood
  );
  println!("  image: {}", urls::image_url_for_restaurant(restaurant));
  println!("  srcset: {}", urls::image_srcset(restaurant, &[1, 2]));
  for (day, hours) in &restaurant.operating_hours {
    println!("  {:<10} {}", day, hours);
  }
}

fn print_review(review: &Review, pending: bool) {
  let date = chrono::DateTime::from_timestamp_millis(review.created_at)
    .map(|dt| dt.format("%B %-d, %Y").to_string())
    .unwrap_or_default();
  println!(
    "{} ({}) rating {}{}",
    review.name,
    date,
    review.rating,
    if pending { " [pending]" } else { "" }
  );
  if !review.comments.is_empty() {
    println!("  {}", review.comments);
  }
}
