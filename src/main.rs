use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use map_my_world::config::{init_tracing, Config};
use map_my_world::{
    create_category, db, get_recommendations, import_locations, load_locations_csv, record_review,
    NewCategory, NewReview, Store,
};

/// Operator CLI for the Map My World database
#[derive(Debug, Parser)]
#[command(name = "map-my-world", version, about)]
struct Cli {
    /// SQLite database file (overrides DATABASE_URL)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the schema
    Init,
    /// Bulk-create locations from a `longitude,latitude` CSV
    Import { csv: PathBuf },
    /// Get or create a category
    Category { name: String },
    /// Record that a location was explored for a category
    Review { location_id: i64, category_id: i64 },
    /// Print the current recommendations
    Recommend,
    /// Print row counts
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(path) = cli.db {
        config.database_path = path;
    }
    init_tracing(&config.log_filter);

    let store = Store::open(&config.database_path)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;
    let mut conn = store.lock()?;

    match cli.command {
        Command::Init => {
            println!("✓ Database ready: {}", config.database_path.display());
        }
        Command::Import { csv } => {
            let rows = load_locations_csv(&csv)?;
            println!("📂 Loaded {} rows from {}", rows.len(), csv.display());

            let report = import_locations(&mut conn, &rows)?;
            println!("✓ Created: {} locations", report.created.len());
            for (row, reason) in &report.skipped {
                println!("✗ Skipped row {row}: {reason}");
            }
        }
        Command::Category { name } => {
            let category = create_category(&mut conn, &NewCategory::new(name))?;
            println!("{}", serde_json::to_string_pretty(&category)?);
        }
        Command::Review {
            location_id,
            category_id,
        } => {
            let entry = record_review(
                &mut conn,
                &NewReview {
                    location_id,
                    category_id,
                },
            )?;
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
        Command::Recommend => {
            let recommendations = get_recommendations(&conn)?;
            if recommendations.is_empty() {
                println!("Nothing overdue.");
            }
            for rec in &recommendations {
                let when = rec
                    .last_reviewed
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "#{:<5} ({:>11.6}, {:>10.6})  {:<24} last reviewed: {}",
                    rec.location.id,
                    rec.location.longitude,
                    rec.location.latitude,
                    rec.category.name,
                    when
                );
            }
        }
        Command::Stats => {
            let counts = db::count_rows(&conn)?;
            println!("Locations:  {}", counts.locations);
            println!("Categories: {}", counts.categories);
            println!("Links:      {}", counts.links);
            println!("Reviews:    {}", counts.reviews);
        }
    }

    Ok(())
}
