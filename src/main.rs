//! Darkroom worker - drives the three consumer loops.
//!
//! One loop per queue: pull a batch, evaluate it through the consumer's
//! dispatcher under the per-invocation wall-clock budget, acknowledge what
//! succeeded, leave the rest for redelivery.
//!
//! ## Configuration
//!
//! - `DARKROOM_CONFIG`: config file path (default: `config/darkroom.toml`)
//! - `RUST_LOG`: logging level (default: `info`)
//!
//! Startup fails fast on missing required settings (store table, mailer
//! identity/region, queue URLs).

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use darkroom::config::{AppConfig, WorkerConfig};
use darkroom::consumers::{ImageProcessor, MetadataLogger, Notifier};
use darkroom::dispatcher::Dispatcher;
use darkroom::mailer::SesMailer;
use darkroom::shutdown::ShutdownSignal;
use darkroom::sqs::SqsSource;
use darkroom::store::DynamoRecordStore;
use darkroom::worker::{run_invocation, InvocationOutcome};

/// Pause after a queue receive error before polling again.
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    dotenvy::dotenv().ok();

    // Refuses to start on missing required settings
    let config = AppConfig::load()?;

    // Stateless clients, constructed once and shared across invocations
    let aws = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.mailer.region.clone()))
        .load()
        .await;

    let store = Arc::new(DynamoRecordStore::new(
        aws_sdk_dynamodb::Client::new(&aws),
        config.store.table_name.clone(),
    ));
    let mailer = Arc::new(SesMailer::new(
        aws_sdk_sesv2::Client::new(&aws),
        config.mailer.from.clone(),
        config.mailer.sender_name.clone(),
    ));
    let sqs = aws_sdk_sqs::Client::new(&aws);

    let notifier = Notifier::new(
        mailer,
        config.mailer.to.clone(),
        config.mailer.locator_scheme.clone(),
    );

    // Strict for the writers, lenient for the notifier: a dropped mail is
    // low-cost, a dropped metadata write is not.
    let bindings = vec![
        (
            config.queues.metadata.clone(),
            Dispatcher::strict(Arc::new(MetadataLogger::new(store))),
        ),
        (
            config.queues.processor.clone(),
            Dispatcher::strict(Arc::new(ImageProcessor::new())),
        ),
        (
            config.queues.notifier.clone(),
            Dispatcher::lenient(Arc::new(notifier)),
        ),
    ];

    let shutdown = ShutdownSignal::new();
    let mut handles = Vec::new();

    for (queue_url, dispatcher) in bindings {
        let source = SqsSource::new(sqs.clone(), queue_url);
        handles.push(tokio::spawn(consumer_loop(
            source,
            dispatcher,
            config.worker.clone(),
            shutdown.clone(),
        )));
    }

    info!(
        batch_size = config.worker.batch_size,
        linger_seconds = config.worker.linger_seconds,
        timeout_seconds = config.worker.timeout_seconds,
        "darkroom worker started"
    );

    shutdown.wait().await;

    for handle in handles {
        let _ = handle.await;
    }

    info!("worker shutdown complete");
    Ok(())
}

/// One consumer's pull-evaluate-acknowledge loop.
async fn consumer_loop(
    source: SqsSource,
    dispatcher: Dispatcher,
    worker: WorkerConfig,
    shutdown: ShutdownSignal,
) {
    let mut shutdown_rx = shutdown.subscribe();
    let invocation_budget = Duration::from_secs(worker.timeout_seconds);

    info!(queue = %source.queue_url(), "consumer loop listening");

    loop {
        let received = tokio::select! {
            _ = shutdown_rx.recv() => {
                info!(queue = %source.queue_url(), "finishing up, shutdown requested");
                break;
            }
            received = source.receive(
                worker.batch_size as i32,
                worker.linger_seconds as i32,
            ) => received,
        };

        let batch = match received {
            Ok(batch) => batch,
            Err(e) => {
                warn!(queue = %source.queue_url(), error = %e, "receive failed");
                tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
                continue;
            }
        };

        if batch.is_empty() {
            continue;
        }

        let outcome = run_invocation(&dispatcher, &source, &batch, invocation_budget).await;
        if let InvocationOutcome::Abandoned = outcome {
            warn!(queue = %source.queue_url(), "batch abandoned, redelivers whole");
        }
    }
}
