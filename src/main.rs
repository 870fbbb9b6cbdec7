use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use photo_catalog::export::{export_photos, ExportFormat, ExportOptions};
use photo_catalog::projection::{self, DateRange, FilterCriteria, SortCriteria, SortKey, SortOrder};
use photo_catalog::state::metadata::MetadataUpdate;
use photo_catalog::{
    BackendGateway, CatalogConfig, CollectionId, EntityStore, ImportPipeline, LocalGateway,
    MutationCoordinator, Photo, PhotoId,
};

/// Command-line arguments for photo-catalog
#[derive(Parser, Debug)]
#[command(name = "photo-catalog")]
#[command(about = "Import, tag, rate and organise photos in a local catalog")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "PHOTO_CATALOG_CONFIG")]
    config: Option<PathBuf>,

    /// Catalog database (overrides the config file)
    #[arg(long, env = "PHOTO_CATALOG_DB")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import every image below a folder
    Import { folder: PathBuf },

    /// List photos, optionally filtered and sorted
    List {
        /// Only photos carrying all of these tags
        #[arg(short, long)]
        tag: Vec<String>,
        #[arg(long)]
        min_rating: Option<u8>,
        /// Earliest capture date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        from: Option<NaiveDate>,
        /// Latest capture date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        to: Option<NaiveDate>,
        /// Match filename or description
        #[arg(short, long)]
        keyword: Option<String>,
        #[arg(long)]
        favorites: bool,
        #[arg(long, value_enum, default_value_t = SortArg::Added)]
        sort: SortArg,
        #[arg(long)]
        ascending: bool,
    },

    /// Set a photo's rating (0-5)
    Rate { photo: i64, rating: u8 },

    /// Replace a photo's tags
    Tag { photo: i64, tags: Vec<String> },

    /// Toggle a photo's favorite flag
    Favorite { photo: i64 },

    /// Set a photo's description
    Describe { photo: i64, text: String },

    #[command(subcommand)]
    Collection(CollectionCommand),

    #[command(subcommand)]
    Cache(CacheCommand),

    /// Export photos to a folder
    Export {
        destination: PathBuf,
        #[arg(required = true)]
        photos: Vec<i64>,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        #[arg(long, value_enum, default_value_t = FormatArg::Original)]
        format: FormatArg,
        #[arg(long)]
        preserve_exif: bool,
    },

    /// Dump the catalog as JSON
    Backup {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum CollectionCommand {
    Create { name: String },
    List,
    Add { collection: i64, photo: i64 },
    Remove { collection: i64, photo: i64 },
    Delete { collection: i64 },
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// Show the size of the thumbnail cache
    Size,
    /// Delete cached thumbnails
    Clear,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SortArg {
    Captured,
    Filename,
    Rating,
    Added,
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Captured => SortKey::CaptureDate,
            SortArg::Filename => SortKey::Filename,
            SortArg::Rating => SortKey::Rating,
            SortArg::Added => SortKey::AddedDate,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Original,
    Jpeg,
    Png,
    Webp,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Original => ExportFormat::Original,
            FormatArg::Jpeg => ExportFormat::Jpeg,
            FormatArg::Png => ExportFormat::Png,
            FormatArg::Webp => ExportFormat::WebP,
        }
    }
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

fn date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Option<DateRange> {
    if from.is_none() && to.is_none() {
        return None;
    }
    Some(DateRange {
        start: from.map_or(NaiveDateTime::MIN, |d| d.and_time(NaiveTime::MIN)),
        end: to.map_or(NaiveDateTime::MAX, |d| {
            d.and_hms_opt(23, 59, 59).unwrap_or(NaiveDateTime::MAX)
        }),
    })
}

fn print_photo(photo: &Photo) {
    let rating = photo
        .metadata
        .rating
        .map_or_else(|| "-".to_string(), |r| "★".repeat(r as usize));
    let favorite = if photo.metadata.favorite { "♥" } else { " " };
    let tags: Vec<&str> = photo.metadata.tags.iter().collect();

    println!(
        "{:>6} {} {:<5} {:<32} {}x{} [{}]",
        photo.id,
        favorite,
        rating,
        photo.filename,
        photo.width,
        photo.height,
        tags.join(", ")
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = CatalogConfig::load_or_default(args.config.as_deref())?;
    if let Some(database) = args.database {
        config.database_path = database;
    }
    tracing::debug!("Using catalog {}", config.database_path.display());

    let store = Arc::new(EntityStore::new(config.event_capacity));
    let gateway = Arc::new(LocalGateway::new(config));
    gateway
        .initialize()
        .await
        .context("Failed to open the catalog")?;

    let pipeline = ImportPipeline::new(gateway.clone(), store.clone());
    let coordinator = MutationCoordinator::new(store.clone(), gateway.clone());

    pipeline.reload_photos().await?;
    coordinator.load_collections().await?;

    match args.command {
        Command::Import { folder } => {
            let report = pipeline
                .import_path(&folder, |progress| {
                    tracing::info!(
                        "[{}/{}] {}",
                        progress.current,
                        progress.total,
                        progress.current_file
                    );
                })
                .await?;

            println!("✅ Imported {} of {} images", report.count(), report.total);
            for failed in &report.failed {
                println!("   ⚠️  {} ({}): {}", failed.filename, failed.stage, failed.reason);
            }
        }

        Command::List {
            tag,
            min_rating,
            from,
            to,
            keyword,
            favorites,
            sort,
            ascending,
        } => {
            let criteria = FilterCriteria {
                tags: tag,
                min_rating,
                date_range: date_range(from, to),
                keyword,
            };
            let order = if ascending {
                SortOrder::Ascending
            } else {
                SortOrder::Descending
            };

            let mut photos = store.photos().snapshot();
            if favorites {
                photos = projection::favorites(&photos);
            }
            let photos = projection::project(&photos, &criteria, SortCriteria::new(sort.into(), order));

            for photo in &photos {
                print_photo(photo);
            }
            println!("{} of {} photos", photos.len(), store.photos().len());
        }

        Command::Rate { photo, rating } => {
            coordinator
                .update_metadata(PhotoId(photo), MetadataUpdate::rating(rating))
                .await?;
            println!("⭐ Rated photo {} {}/5", photo, rating);
        }

        Command::Tag { photo, tags } => {
            coordinator
                .update_metadata(PhotoId(photo), MetadataUpdate::tags(tags))
                .await?;
            if let Some(updated) = store.photo(PhotoId(photo)) {
                print_photo(&updated);
            }
        }

        Command::Favorite { photo } => {
            let favorite = coordinator.toggle_favorite(PhotoId(photo)).await?;
            println!(
                "{} photo {}",
                if favorite { "♥ Favorited" } else { "Unfavorited" },
                photo
            );
        }

        Command::Describe { photo, text } => {
            coordinator
                .update_metadata(PhotoId(photo), MetadataUpdate::description(text))
                .await?;
            println!("📝 Updated description of photo {}", photo);
        }

        Command::Collection(command) => match command {
            CollectionCommand::Create { name } => {
                let collection = coordinator.create_collection(&name).await?;
                println!("📁 Created collection {} '{}'", collection.id, collection.name);
            }
            CollectionCommand::List => {
                for collection in store.collections().snapshot() {
                    println!(
                        "{:>6} {:<32} {} photos",
                        collection.id,
                        collection.name,
                        collection.photo_ids.len()
                    );
                }
            }
            CollectionCommand::Add { collection, photo } => {
                coordinator
                    .add_to_collection(CollectionId(collection), PhotoId(photo))
                    .await?;
                println!("Added photo {} to collection {}", photo, collection);
            }
            CollectionCommand::Remove { collection, photo } => {
                coordinator
                    .remove_from_collection(CollectionId(collection), PhotoId(photo))
                    .await?;
                println!("Removed photo {} from collection {}", photo, collection);
            }
            CollectionCommand::Delete { collection } => {
                coordinator
                    .delete_collection(CollectionId(collection))
                    .await?;
                println!("🗑️  Deleted collection {}", collection);
            }
        },

        Command::Cache(command) => match command {
            CacheCommand::Size => {
                let bytes = gateway.cache_size().await?;
                println!("{:.1} MB in {}", bytes as f64 / 1_048_576.0, gateway.config().thumbnail_dir.display());
            }
            CacheCommand::Clear => {
                let count = gateway.clear_cache().await?;
                println!("🗑️  Removed {} cached thumbnails", count);
            }
        },

        Command::Export {
            destination,
            photos,
            width,
            height,
            format,
            preserve_exif,
        } => {
            let ids: Vec<PhotoId> = photos.into_iter().map(PhotoId).collect();
            let options = ExportOptions {
                width,
                height,
                preserve_exif,
                format: format.into(),
            };

            let report = export_photos(gateway.as_ref(), &store, &ids, &destination, &options).await?;
            println!("💾 Exported {} of {} photos", report.exported_count, ids.len());
            for path in &report.failed_paths {
                println!("   ⚠️  {}", path);
            }
        }

        Command::Backup { output } => {
            let json = gateway.export_backup().await?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, json)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("💾 Backup written to {}", path.display());
                }
                None => println!("{}", json),
            }
        }
    }

    Ok(())
}
