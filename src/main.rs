use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod beachhead;
mod classify;
mod config;
mod db;
mod error;
mod insights;
mod matrix;
mod models;
mod report;
mod rules;

use crate::config::AppConfig;
use crate::models::SegmentationCriteria;

#[derive(Parser)]
#[command(name = "survey-segmentation")]
#[command(
    about = "Market segmentation and beachhead analysis for survey responses",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed responses
    Seed,
    /// Import survey answers from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Classify every stored response and persist its primary segment
    Classify,
    /// List stored responses with their persisted segment
    Respondents,
    /// Show one response's answers and classification
    Respondent {
        /// Response uuid or import key
        #[arg(long)]
        id: String,
    },
    /// Print the segment distribution and matrix key patterns
    Matrix,
    /// Print the beachhead recommendation
    Beachhead,
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "segmentation-report.md")]
        out: PathBuf,
    },
    /// Export the segmentation matrix as CSV
    Export {
        #[arg(long, default_value = "segmentation-matrix.csv")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("survey_segmentation=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let classifier = config.classifier()?;
    tracing::debug!(
        segments = classifier.rules().segments.len(),
        fallback = %config.fallback_segment,
        "classifier ready"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let inserted = db::seed(&pool).await?;
            println!("Inserted {inserted} seed responses.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} responses from {}.", csv.display());
        }
        Commands::Classify => {
            let responses = db::fetch_responses(&pool).await?;
            let profiles = classifier.profile_all(responses);
            let updated = db::store_profiles(&pool, &profiles).await?;
            println!("Classified {updated} responses.");
        }
        Commands::Respondents => {
            let respondents = db::fetch_stored_respondents(&pool).await?;
            print!("{}", report::format_respondent_list(&respondents));
        }
        Commands::Respondent { id } => match db::find_respondent(&pool, &id).await? {
            Some((respondent, answers)) => {
                print!("{}", report::format_respondent_detail(&respondent, &answers));
            }
            None => println!("No response found for {id}."),
        },
        Commands::Matrix => {
            let profiles = classifier.profile_all(db::fetch_responses(&pool).await?);
            let matrix = matrix::build_matrix(&profiles, Utc::now());

            if matrix.total_respondents == 0 {
                println!("No survey responses found.");
                return Ok(());
            }

            println!("Segment distribution ({} respondents):", matrix.total_respondents);
            for (segment, count) in &matrix.segment_distribution {
                println!("- {segment}: {count}");
            }
            for (segment, count) in &matrix.segment_distribution {
                if *count == 0 {
                    continue;
                }
                println!();
                println!("{segment}:");
                for criteria in SegmentationCriteria::ALL {
                    if let Some(cell) = matrix.cell(*segment, criteria) {
                        println!("  {criteria}: {}", cell.key_patterns.join("; "));
                    }
                }
            }
        }
        Commands::Beachhead => {
            let profiles = classifier.profile_all(db::fetch_responses(&pool).await?);
            match beachhead::recommend(&profiles) {
                Some(analysis) => {
                    println!(
                        "Recommended beachhead: {} (score {:.2})",
                        analysis.recommended_segment, analysis.score
                    );
                    for reason in &analysis.reasoning {
                        println!("- {reason}");
                    }
                }
                None => println!("Not enough data for a recommendation."),
            }
        }
        Commands::Report { out } => {
            let profiles = classifier.profile_all(db::fetch_responses(&pool).await?);
            let matrix = matrix::build_matrix(&profiles, Utc::now());
            let analysis = beachhead::recommend(&profiles);
            let scores = beachhead::score_segments(&profiles);
            let report = report::build_report(&profiles, &matrix, analysis.as_ref(), &scores);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { out } => {
            let profiles = classifier.profile_all(db::fetch_responses(&pool).await?);
            let matrix = matrix::build_matrix(&profiles, Utc::now());
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            report::write_matrix_csv(&matrix, file)?;
            println!("Matrix written to {}.", out.display());
        }
    }

    Ok(())
}
