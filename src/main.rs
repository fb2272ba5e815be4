//! Casino gambling-event enrichment pipeline
//!
//! One subcommand per deployable service; each wires exactly one stage
//! between a topic consumer and a topic publisher.

use casino_pipeline::{
    config::{
        self, BrokerConfig, CurrencyServiceConfig, DescriptionServiceConfig,
        GeneratorServiceConfig, MaterializeServiceConfig, PlayerServiceConfig,
    },
    generator, http,
    messaging::{TopicConsumer, TopicPublisher},
    pipeline::{self, Stage},
    rates::{HttpRateSource, MemoryRateCache, RateCache, RateSource},
    shutdown::{self, ShutdownSignal, DRAIN_GRACE},
    stages::{
        logger, CurrencyConverter, DescriptionStage, MetricsAggregator, MetricsStage, PlayerStage,
    },
    storage::PlayerStore,
};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "casino-pipeline")]
#[command(about = "Casino gambling-event enrichment pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file stem (environment variables override it)
    #[arg(short, long, default_value = "config")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish randomly generated events for a fixed duration
    Generate {
        /// Override the configured run duration
        #[arg(long)]
        duration_secs: Option<u64>,
    },
    /// Enrich events with EUR-converted amounts
    Currency,
    /// Enrich events with human-readable descriptions
    Description,
    /// Enrich events with player profile data
    Player,
    /// Aggregate events into live metrics and serve snapshots
    Materialize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { duration_secs } => {
            let cfg: GeneratorServiceConfig = config::load_service(&cli.config)?;
            run_generator(cfg, duration_secs).await
        }
        Commands::Currency => {
            let cfg: CurrencyServiceConfig = config::load_service(&cli.config)?;
            run_currency(cfg).await
        }
        Commands::Description => {
            let cfg: DescriptionServiceConfig = config::load_service(&cli.config)?;
            run_description(cfg).await
        }
        Commands::Player => {
            let cfg: PlayerServiceConfig = config::load_service(&cli.config)?;
            run_player(cfg).await
        }
        Commands::Materialize => {
            let cfg: MaterializeServiceConfig = config::load_service(&cli.config)?;
            run_materialize(cfg).await
        }
    }
}

async fn run_generator(
    cfg: GeneratorServiceConfig,
    duration_override: Option<u64>,
) -> anyhow::Result<()> {
    let run_secs = duration_override.unwrap_or(cfg.run_secs);
    info!(run_secs, "generator starting");

    let publisher = TopicPublisher::connect(&cfg.broker.url, &cfg.output_topic).await?;
    let (publish_tx, publish_rx) = pipeline::channel(cfg.broker.channel_capacity);
    let publisher_task = tokio::spawn(publisher.run(publish_rx));

    let mut events =
        generator::generate_events(Duration::from_secs(run_secs), cfg.broker.channel_capacity);
    while let Some(event) = events.recv().await {
        match serde_json::to_string(&event) {
            Ok(json) => info!(target: "casino_pipeline::events", "{json}"),
            Err(err) => warn!(event_id = event.id, %err, "failed to serialize event"),
        }
        if publish_tx.send(event).await.is_err() {
            break;
        }
    }

    // Closing the channel lets the publisher flush whatever is buffered.
    drop(publish_tx);
    let _ = publisher_task.await;

    info!("generator finished");
    Ok(())
}

async fn run_currency(cfg: CurrencyServiceConfig) -> anyhow::Result<()> {
    info!("currency service starting");

    let cache: Arc<dyn RateCache> = Arc::new(MemoryRateCache::new());
    let source: Arc<dyn RateSource> = Arc::new(HttpRateSource::new(
        &cfg.exchange.api_url,
        &cfg.exchange.api_key,
    )?);
    let stage = CurrencyConverter::new(cache, source, cfg.exchange.cache_ttl_secs);

    run_enrichment(&cfg.broker, &cfg.input_topic, &cfg.output_topic, stage).await
}

async fn run_description(cfg: DescriptionServiceConfig) -> anyhow::Result<()> {
    info!("description service starting");
    run_enrichment(
        &cfg.broker,
        &cfg.input_topic,
        &cfg.output_topic,
        DescriptionStage::new(),
    )
    .await
}

async fn run_player(cfg: PlayerServiceConfig) -> anyhow::Result<()> {
    info!("player service starting");

    let store = PlayerStore::connect(&cfg.database.url).await?;
    let stage = PlayerStage::new(store);

    run_enrichment(&cfg.broker, &cfg.input_topic, &cfg.output_topic, stage).await
}

async fn run_materialize(cfg: MaterializeServiceConfig) -> anyhow::Result<()> {
    info!("materialization service starting");

    let (signal, shutdown) = ShutdownSignal::new();
    shutdown::trigger_on_ctrl_c(signal);

    let consumer = TopicConsumer::connect(&cfg.broker.url, &cfg.input_topic).await?;
    let aggregator = Arc::new(MetricsAggregator::new());

    let (input_tx, input_rx) = pipeline::channel(cfg.broker.channel_capacity);
    let (log_tx, log_rx) = pipeline::channel(cfg.broker.channel_capacity);

    tokio::spawn(consumer.run(input_tx, shutdown.clone()));
    tokio::spawn(pipeline::run_stage(
        MetricsStage::new(Arc::clone(&aggregator)),
        input_rx,
        log_tx,
        shutdown.clone(),
    ));
    tokio::spawn(logger::log_events(log_rx));

    // Serves until the shutdown signal fires, then the pipeline gets its
    // grace period to drain.
    http::serve(&cfg.http.listen_addr, aggregator, shutdown.clone()).await?;
    tokio::time::sleep(DRAIN_GRACE).await;

    info!("materialization service stopped");
    Ok(())
}

/// Shared consume -> stage -> publish wiring for the enrichment services.
async fn run_enrichment<S: Stage + 'static>(
    broker: &BrokerConfig,
    input_topic: &str,
    output_topic: &str,
    stage: S,
) -> anyhow::Result<()> {
    let (signal, shutdown) = ShutdownSignal::new();
    shutdown::trigger_on_ctrl_c(signal);

    let consumer = TopicConsumer::connect(&broker.url, input_topic).await?;
    let publisher = TopicPublisher::connect(&broker.url, output_topic).await?;

    let (input_tx, input_rx) = pipeline::channel(broker.channel_capacity);
    let (output_tx, output_rx) = pipeline::channel(broker.channel_capacity);

    let consumer_task = tokio::spawn(consumer.run(input_tx, shutdown.clone()));
    let stage_task = tokio::spawn(pipeline::run_stage(
        stage,
        input_rx,
        output_tx,
        shutdown.clone(),
    ));
    let publisher_task = tokio::spawn(publisher.run(output_rx));

    // The consumer stops first on shutdown; dropped senders then cascade the
    // close through the stage and the publisher, flushing buffered events.
    let drain = async {
        let _ = consumer_task.await;
        let _ = stage_task.await;
        let _ = publisher_task.await;
    };
    tokio::pin!(drain);

    let mut wait = shutdown.clone();
    tokio::select! {
        _ = &mut drain => {
            info!("pipeline ended");
        }
        _ = wait.triggered() => {
            info!("shutdown signal received, draining pipeline");
            if tokio::time::timeout(DRAIN_GRACE, drain).await.is_err() {
                warn!("pipeline did not drain within the grace period");
            }
        }
    }

    Ok(())
}
