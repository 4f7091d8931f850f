use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod coordinator;
mod db;
mod efficiency;
mod error;
mod fixed;
mod forecast;
mod hotspot;
mod models;
mod report;

use config::Config;
use coordinator::{Actor, AssignRequest, Coordinator, StatusUpdateRequest, WasteReport};
use models::{Evidence, Priority, Role, Severity, WasteCategory};

#[derive(Parser)]
#[command(name = "ecocampus")]
#[command(about = "Campus waste reporting, cleanup tasks and analytics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import waste reports from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// File a new waste report
    ReportWaste {
        #[arg(long)]
        reporter_email: String,
        #[arg(long)]
        location: String,
        #[arg(long)]
        category: WasteCategory,
        #[arg(long)]
        quantity_kg: f64,
        #[arg(long, default_value = "Normal")]
        severity: Severity,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Forecast tomorrow's reported quantity
    Forecast {
        #[arg(long, default_value_t = 30)]
        since_days: i64,
        #[arg(long)]
        json: bool,
    },
    /// Rank locations by heat index
    Hotspots {
        #[arg(long, default_value_t = 7)]
        since_days: i64,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Staff completion rate and response time
    Efficiency {
        #[arg(long)]
        json: bool,
    },
    /// Assign a waste log to a staff member
    Assign {
        #[arg(long)]
        actor_email: String,
        #[arg(long)]
        waste_log: uuid::Uuid,
        #[arg(long)]
        staff_email: String,
        #[arg(long, default_value = "Normal")]
        priority: Priority,
    },
    /// Move a task to a new status
    UpdateStatus {
        #[arg(long)]
        actor_email: String,
        #[arg(long)]
        task: uuid::Uuid,
        #[arg(long)]
        status: String,
        #[arg(long)]
        image_url: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Generate a markdown analytics report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

async fn actor_for(pool: &PgPool, email: &str) -> anyhow::Result<Actor> {
    let user = db::find_user_by_email(pool, email).await?;
    Ok(Actor {
        id: user.id,
        role: user.role,
    })
}

async fn staff_names(pool: &PgPool) -> anyhow::Result<HashMap<uuid::Uuid, String>> {
    Ok(db::fetch_users(pool)
        .await?
        .into_iter()
        .filter(|user| user.role == Role::Staff)
        .map(|user| (user.id, user.full_name))
        .collect())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let result = run(cli).await;
    if let Err(err) = &result {
        if err
            .downcast_ref::<error::CoreError>()
            .is_some_and(error::CoreError::is_retryable)
        {
            eprintln!("Storage was unavailable; the command is safe to retry.");
        }
    }
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.storage_timeout)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;
    let coordinator = Coordinator::new(db::PgStore::new(pool.clone(), config.storage_timeout));

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} waste reports from {}.", csv.display());
        }
        Commands::ReportWaste {
            reporter_email,
            location,
            category,
            quantity_kg,
            severity,
            description,
        } => {
            let actor = actor_for(&pool, &reporter_email).await?;
            let log = coordinator
                .report_waste(
                    &actor,
                    WasteReport {
                        location,
                        category,
                        quantity_kg,
                        severity,
                        description,
                    },
                )
                .await?;
            println!(
                "Waste log {} recorded at {} ({} kg {}).",
                log.id, log.location, log.quantity_kg, log.category
            );
        }
        Commands::Forecast { since_days, json } => {
            let since_date = db::window_start(since_days);
            let totals = db::fetch_daily_totals(&pool, since_date).await?;
            let series = forecast::series_from_daily_totals(&totals);
            let result = forecast::predict_next_day(&series);

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if let Some(reason) = &result.reason {
                println!("No forecast: {reason} ({} days with reports).", series.len());
            } else {
                println!(
                    "Tomorrow: {:.2} kg, {:?} confidence, growth {} kg/day.",
                    result.prediction,
                    result.confidence,
                    result.growth_rate.as_deref().unwrap_or("0.00")
                );
            }
        }
        Commands::Hotspots {
            since_days,
            limit,
            json,
        } => {
            let since_date = db::window_start(since_days);
            let events = db::fetch_hotspot_events(&pool, since_date).await?;
            let stats = hotspot::detect_hotspots(&events);
            let top: Vec<_> = stats.into_iter().take(limit).collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&top)?);
            } else if top.is_empty() {
                println!("No waste reported for this window.");
            } else {
                println!("Hotspots since {since_date}:");
                for stat in &top {
                    println!(
                        "- {} heat {} across {} reports ({} kg)",
                        stat.location_id, stat.heat_index, stat.event_frequency, stat.total_mass
                    );
                }
            }
        }
        Commands::Efficiency { json } => {
            let timings = db::fetch_task_timings(&pool).await?;
            let metrics = efficiency::calculate_efficiency(&timings);

            if json {
                println!("{}", serde_json::to_string_pretty(&metrics)?);
            } else if metrics.is_empty() {
                println!("No tasks have been assigned yet.");
            } else {
                let names = staff_names(&pool).await?;
                for metric in &metrics {
                    let name = names
                        .get(&metric.staff_id)
                        .map(String::as_str)
                        .unwrap_or("unknown staff");
                    println!(
                        "- {name}: {}% completed, avg response {} h",
                        metric.completion_rate, metric.avg_response_time
                    );
                }
            }
        }
        Commands::Assign {
            actor_email,
            waste_log,
            staff_email,
            priority,
        } => {
            let actor = actor_for(&pool, &actor_email).await?;
            let staff = db::find_user_by_email(&pool, &staff_email).await?;
            let task = coordinator
                .assign(
                    &actor,
                    AssignRequest {
                        waste_log_id: Some(waste_log),
                        staff_id: Some(staff.id),
                        priority: Some(priority),
                    },
                )
                .await?;
            println!("Task {} assigned to {}.", task.id, staff.full_name);
        }
        Commands::UpdateStatus {
            actor_email,
            task,
            status,
            image_url,
            notes,
        } => {
            let actor = actor_for(&pool, &actor_email).await?;
            let change = coordinator
                .update_status(
                    &actor,
                    StatusUpdateRequest {
                        task_id: task,
                        status,
                        evidence: Evidence { image_url, notes },
                    },
                )
                .await?;
            println!(
                "Task {} moved from {} to {}.",
                change.task.id, change.previous, change.task.status
            );
        }
        Commands::Report { out } => {
            let forecast_since = db::window_start(30);
            let hotspot_since = db::window_start(7);
            let totals = db::fetch_daily_totals(&pool, forecast_since).await?;
            let events = db::fetch_hotspot_events(&pool, hotspot_since).await?;
            let timings = db::fetch_task_timings(&pool).await?;
            let names = staff_names(&pool).await?;

            let series = forecast::series_from_daily_totals(&totals);
            let prediction = forecast::predict_next_day(&series);
            let hotspots = hotspot::detect_hotspots(&events);
            let staff = efficiency::calculate_efficiency(&timings);

            let report = report::build_report(&report::ReportInput {
                forecast_since,
                hotspot_since,
                forecast: &prediction,
                hotspots: &hotspots,
                staff: &staff,
                staff_names: &names,
            });
            std::fs::write(&out, report)?;
            info!(path = %out.display(), "report written");
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
