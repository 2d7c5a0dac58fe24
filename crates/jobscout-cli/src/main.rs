use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use jobscout_match::{MatchService, ProfileLoader, ScoringConfig, ScoringEngine};
use jobscout_storage::PgStore;
use jobscout_sync::{build_pipeline, Scheduler, SearchOverrides, SyncConfig, SyncPipeline};
use jobscout_web::AppState;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "jobscout")]
#[command(about = "Discover job postings and rank them against your profile")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one discovery cycle and persist the results.
    Sync(SyncArgs),
    /// Print the best matches for the candidate profile.
    Match {
        #[arg(long, default_value_t = 25)]
        limit: usize,
    },
    /// Score one stored posting and record it on its application.
    Score { posting_id: i64 },
    /// Serve the JSON API, with the scheduler when enabled.
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run discovery on the configured interval until interrupted.
    Schedule {
        #[arg(long)]
        run_now: bool,
    },
    /// Apply database migrations.
    Migrate,
}

#[derive(Debug, Default, Args)]
struct SyncArgs {
    #[arg(long = "term")]
    terms: Vec<String>,
    #[arg(long = "location")]
    locations: Vec<String>,
    #[arg(long = "job-type")]
    job_types: Vec<String>,
    #[arg(long)]
    remote_only: bool,
    #[arg(long)]
    salary_min: Option<u32>,
    #[arg(long)]
    limit: Option<usize>,
}

impl SyncArgs {
    fn overrides(self) -> SearchOverrides {
        let some_if_any = |values: Vec<String>| (!values.is_empty()).then_some(values);
        SearchOverrides {
            terms: some_if_any(self.terms),
            locations: some_if_any(self.locations),
            job_types: some_if_any(self.job_types),
            remote_only: self.remote_only.then_some(true),
            salary_min: self.salary_min,
            limit: self.limit,
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn match_service(config: &SyncConfig, pipeline: &SyncPipeline) -> MatchService {
    let engine = ScoringEngine::new(ScoringConfig {
        min_score: config.min_match_score,
        ..ScoringConfig::default()
    });
    let profiles = ProfileLoader::files(&config.resume_text_path, &config.profile_json_path);
    MatchService::new(pipeline.store(), engine, profiles)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = SyncConfig::from_env();

    match cli.command.unwrap_or(Commands::Sync(SyncArgs::default())) {
        Commands::Sync(args) => {
            let pipeline = build_pipeline(&config).await?;
            let summary = pipeline.run_with(&args.overrides()).await?;
            println!(
                "sync complete: run_id={} sources={} fetched={} created={} updated={} failed={}",
                summary.run_id,
                summary.sources,
                summary.fetched,
                summary.created,
                summary.updated,
                summary.failed_sources.len()
            );
            for failure in &summary.failed_sources {
                println!("  {}: {}", failure.source_slug, failure.reason);
            }
        }
        Commands::Match { limit } => {
            let pipeline = build_pipeline(&config).await?;
            let ranked = match_service(&config, &pipeline).matches(limit).await?;
            if ranked.is_empty() {
                println!("no postings scored at or above {:.2}", config.min_match_score);
            }
            for result in ranked {
                let posting = &result.posting;
                println!(
                    "{:.3}  {} @ {} [{}] {}",
                    result.score,
                    posting.title,
                    posting.company,
                    posting.identity_key(),
                    posting.url
                );
            }
        }
        Commands::Score { posting_id } => {
            let pipeline = build_pipeline(&config).await?;
            let scored = match_service(&config, &pipeline).score_posting(posting_id).await?;
            println!("{}", serde_json::to_string_pretty(&scored)?);
        }
        Commands::Serve { port } => {
            let pipeline = Arc::new(build_pipeline(&config).await?);
            let matches = Arc::new(match_service(&config, &pipeline));
            let mut scheduler = Scheduler::new(Arc::clone(&pipeline), config.scheduler_interval);
            if config.scheduler_enabled {
                scheduler.start().await?;
            }
            let served = jobscout_web::serve(AppState::new(pipeline, matches), port.unwrap_or(config.web_port)).await;
            scheduler.shutdown().await?;
            served?;
        }
        Commands::Schedule { run_now } => {
            if !config.scheduler_enabled {
                warn!("SCHEDULER_ENABLED is off; nothing to schedule");
                return Ok(());
            }
            let pipeline = Arc::new(build_pipeline(&config).await?);
            let mut scheduler = Scheduler::new(pipeline, config.scheduler_interval);
            if run_now {
                scheduler.run_cycle().await;
            }
            scheduler.start().await?;
            tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
            info!("shutting down scheduler");
            scheduler.shutdown().await?;
        }
        Commands::Migrate => {
            let Some(url) = config.database_url.as_deref() else {
                bail!("DATABASE_URL must be set to run migrations");
            };
            let store = PgStore::connect(url).await.context("connecting to postgres")?;
            store.migrate().await.context("running migrations")?;
            println!("migrations applied");
        }
    }

    Ok(())
}
