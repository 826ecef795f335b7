mod cli;
mod config;
mod core;
mod error;

use crate::cli::{Cli, Commands};
use crate::config::{AppConfig, Secrets};
use crate::core::scheduler;
use crate::core::storage::ScriptStatus;
use crate::core::transcript::TranscriptSource;
use crate::core::{
    Collaborators, MarketDataClient, OpenAiModel, Pipeline, RunSummary, SqliteStore,
    TelegramNotifier, TranscriptService, ViralityClassifier, YouTubeClient, extract_video_id,
};
use crate::error::{Error, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vidwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Run => {
            let pipeline = build_pipeline(&config).await?;
            let summary = pipeline.run_once().await;
            print_summary(&summary);
        }
        Commands::Watch { now } => {
            let time = config.schedule.daily_time()?;
            let pipeline = build_pipeline(&config).await?;
            println!("Watching {} channels, daily at {time} UTC", config.channels.len());
            scheduler::watch(&pipeline, time, now).await;
        }
        Commands::Check { views, subscribers } => {
            run_cli_check(&config, views, subscribers)?;
        }
        Commands::Processed { limit } => {
            run_cli_processed(&config, limit).await?;
        }
        Commands::Script { video, status } => {
            run_cli_script(&config, &video, status.as_deref()).await?;
        }
        Commands::Transcript { video } => {
            run_cli_transcript(&config, &video).await?;
        }
    }

    Ok(())
}

async fn build_pipeline(config: &AppConfig) -> Result<Pipeline> {
    if config.channels.is_empty() {
        tracing::warn!("no channels configured");
    }

    let secrets = Secrets::from_env()?;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http.timeout_secs))
        .build()?;
    let store = SqliteStore::connect(&config.storage.database_url).await?;

    let collaborators = Collaborators {
        videos: Arc::new(
            YouTubeClient::new(
                http.clone(),
                &config.http.youtube_base_url,
                &secrets.youtube_api_key,
            )
            .with_max_results(config.monitoring.max_videos_per_channel),
        ),
        transcripts: Arc::new(TranscriptService::new(
            config.monitoring.transcript_languages.clone(),
        )?),
        model: Arc::new(OpenAiModel::new(
            &config.llm,
            secrets.openai_api_key.as_deref(),
        )),
        market: Arc::new(MarketDataClient::new(
            http.clone(),
            &config.http.defillama_base_url,
            &config.http.defillama_yields_url,
            &config.http.coingecko_base_url,
        )),
        notifier: Arc::new(TelegramNotifier::new(
            http,
            &config.http.telegram_base_url,
            &secrets.telegram_bot_token,
            &secrets.telegram_chat_id,
        )),
        store: Arc::new(store),
    };

    Ok(Pipeline::new(config, collaborators))
}

fn print_summary(summary: &RunSummary) {
    println!("Channels checked:  {}", summary.channels_checked);
    if summary.channels_failed > 0 {
        println!("Channels failed:   {}", summary.channels_failed);
    }
    println!("Recent videos:     {}", summary.candidates);
    println!("Viral:             {}", summary.viral);
    println!("Already processed: {}", summary.already_processed);
    println!("Completed:         {}", summary.completed);
    println!("Skipped:           {}", summary.skipped);
    println!("Failed:            {}", summary.failed);
}

fn run_cli_check(config: &AppConfig, views: i64, subscribers: i64) -> Result<()> {
    let classifier = ViralityClassifier::new(config.thresholds.clone());
    let verdict = classifier.classify(views, subscribers)?;
    println!("{}", verdict.summary());
    Ok(())
}

async fn run_cli_processed(config: &AppConfig, limit: i64) -> Result<()> {
    let store = SqliteStore::connect(&config.storage.database_url).await?;
    let records = store.list_records(limit).await?;

    if records.is_empty() {
        println!("No processed videos yet.");
        return Ok(());
    }

    for record in records {
        println!(
            "{}  {:<9}  {:>10} views  {}  {}",
            record.processed_at.format("%Y-%m-%d %H:%M"),
            record.outcome.to_string(),
            record.view_count,
            record.video_id,
            record.title
        );
        if let Some(detail) = record.detail {
            println!("    {detail}");
        }
    }

    Ok(())
}

async fn run_cli_script(config: &AppConfig, video: &str, status: Option<&str>) -> Result<()> {
    let video_id =
        extract_video_id(video).ok_or_else(|| Error::invalid("Invalid video URL or ID"))?;
    let store = SqliteStore::connect(&config.storage.database_url).await?;

    if let Some(status) = status {
        let status: ScriptStatus = status.parse()?;
        if store.set_script_status(&video_id, status).await? {
            println!("Script for {video_id} marked {status}.");
        } else {
            println!("No script stored for {video_id}.");
        }
        return Ok(());
    }

    let Some(script) = store.load_script(&video_id).await? else {
        println!("No script stored for {video_id}.");
        return Ok(());
    };

    println!("{} [{}]", script.topic, script.status);
    println!(
        "Video {}, written {}",
        script.video_id,
        script.created_at.format("%Y-%m-%d %H:%M")
    );

    let facts = store.load_facts(&video_id).await?;
    if !facts.is_empty() {
        println!();
        println!("Fact check:");
        for fact in facts {
            let current = fact.verified_value.as_deref().unwrap_or("-");
            let claimed = fact.claimed_value.as_deref().unwrap_or("-");
            println!("  {:<10} {}", fact.status.to_string(), fact.claim);
            println!(
                "             {} claimed {claimed}, now {current}, source {}{}",
                fact.category,
                fact.source.as_deref().unwrap_or("-"),
                fact.note.map(|n| format!(" ({n})")).unwrap_or_default()
            );
        }
    }

    println!();
    println!("{}", script.body);
    Ok(())
}

async fn run_cli_transcript(config: &AppConfig, video: &str) -> Result<()> {
    let video_id =
        extract_video_id(video).ok_or_else(|| Error::invalid("Invalid video URL or ID"))?;

    let service = TranscriptService::new(config.monitoring.transcript_languages.clone())?;
    let Some(transcript) = service.fetch(&video_id).await? else {
        println!("No transcript available for {video_id}.");
        return Ok(());
    };

    for line in transcript.timed_lines() {
        println!("{line}");
    }
    Ok(())
}
