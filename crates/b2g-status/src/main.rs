use std::sync::Arc;
use std::time::{Duration, Instant};

use core_crate::{init_default_logging, StatusError};
use feed::{ImportStatistics, StatusService, StatusServiceBuilder};
use rand::Rng;
use structopt::StructOpt;
use tokio::signal;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info};
use view::{
    BlockStatusProjector, JsonViewSink, LoggingViewSink, ProgressPolicy, ProgressionCarryOver,
    ProjectorConfig, ProjectorConfigBuilder, ViewSink,
};

/// Progress updates published for each counted step of a block
const UPDATES_PER_STEP: u64 = 10;

#[derive(Debug, StructOpt)]
#[structopt(name = "b2g-status", about = "Block import status viewer")]
struct Opt {
    /// Height of the first block to import
    #[structopt(long, default_value = "481824", env = "START_HEIGHT")]
    start_height: u64,

    /// Number of blocks to import before going idle
    #[structopt(long, default_value = "3", env = "BLOCKS")]
    blocks: u64,

    /// Delay between two status updates, in milliseconds
    #[structopt(long, default_value = "100", env = "TICK_MS")]
    tick_ms: u64,

    /// Display progressions above 100 as computed
    #[structopt(long, env = "RAW_PROGRESS")]
    raw_progress: bool,

    /// Reset the progression on steps that do not compute one
    #[structopt(long, env = "RESET_PROGRESSION")]
    reset_progression: bool,

    /// Print views as JSON lines instead of log lines
    #[structopt(long, env = "JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Initialize logging
    let _ = init_default_logging();

    // Parse command line arguments
    let opt = Opt::from_args();
    info!("Starting block import status viewer with options: {:?}", opt);

    let service = StatusServiceBuilder::new().build_shared();
    let statistics = Arc::new(ImportStatistics::new());

    let mut projector = BlockStatusProjector::new(create_projector_config(&opt));
    projector.attach(service.as_ref()).await?;

    let sink: Arc<dyn ViewSink> = if opt.json {
        Arc::new(JsonViewSink)
    } else {
        Arc::new(LoggingViewSink)
    };

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let view_task = tokio::spawn(async move {
        projector
            .run(sink.as_ref(), async move {
                let _ = shutdown_rx.changed().await;
            })
            .await
    });

    let mut batch_task = tokio::spawn(run_import_batch(
        service.clone(),
        statistics.clone(),
        opt.start_height,
        opt.blocks,
        Duration::from_millis(opt.tick_ms),
    ));

    tokio::select! {
        _ = wait_for_shutdown() => {
            batch_task.abort();
        }
        result = &mut batch_task => {
            if let Err(e) = result {
                error!(error = %e, "Import batch task failed");
            }
        }
    }

    info!("Shutting down status viewer...");
    service.close();
    let _ = shutdown_tx.send(true);

    match view_task.await? {
        Ok(last_view) => info!(status = %last_view.status_label, "Status view stopped"),
        Err(e) => error!(error = %e, "Status view failed"),
    }

    info!(
        imported_blocks = service.imported_block_count(),
        average_secs = statistics.average_block_import_duration(),
        "Shutdown complete. Goodbye!"
    );
    Ok(())
}

/// Create projector configuration from command line options
fn create_projector_config(opt: &Opt) -> ProjectorConfig {
    let progress_policy = if opt.raw_progress {
        ProgressPolicy::Raw
    } else {
        ProgressPolicy::Clamped
    };
    let carry_over = if opt.reset_progression {
        ProgressionCarryOver::Reset
    } else {
        ProgressionCarryOver::Keep
    };

    ProjectorConfigBuilder::new()
        .with_progress_policy(progress_policy)
        .with_progression_carry_over(carry_over)
        .build()
}

/// Import `blocks` blocks starting at `start_height`, reporting every step
async fn run_import_batch(
    service: Arc<StatusService>,
    statistics: Arc<ImportStatistics>,
    start_height: u64,
    blocks: u64,
    tick: Duration,
) {
    for height in start_height..start_height.saturating_add(blocks) {
        let started = Instant::now();
        service.add_log(format!("Starting to process block {:09}", height));

        if let Err(e) = import_block(&service, height, tick).await {
            service.add_error(
                format!("An error occurred while processing block {:09}", height),
                Some(&e),
            );
            continue;
        }

        let elapsed = started.elapsed().as_secs_f32();
        let average = statistics.add_block_import_duration(elapsed);
        service.set_imported_block_count(height);
        service.add_log(format!(
            "Block {:09} processed in {:.3} secs (average {:.3} secs)",
            height, elapsed, average
        ));
    }

    service.add_log("No block to process");
    service.no_block_to_process();
    sleep(tick).await;
}

/// Walk one block through every import step
async fn import_block(service: &StatusService, height: u64, tick: Duration) -> Result<(), StatusError> {
    let (transaction_count, address_count) = {
        let mut rng = rand::thread_rng();
        let transactions: u64 = rng.gen_range(1..=2500);
        let addresses: u64 = rng.gen_range(transactions..=transactions * 3);
        (transactions, addresses)
    };

    service.new_block_to_process(height);
    sleep(tick).await;

    for loaded in progress_points(transaction_count) {
        service.loading_transactions(loaded, transaction_count);
        sleep(tick).await;
    }

    for processed in progress_points(address_count) {
        service.processing_addresses(processed, address_count);
        sleep(tick).await;
    }

    for processed in progress_points(transaction_count) {
        service.processing_transactions(processed, transaction_count);
        sleep(tick).await;
    }

    if service.is_closed() {
        return Err(StatusError::SourceClosed);
    }

    service.saving_block();
    sleep(tick).await;
    service.block_saved();
    sleep(tick).await;
    Ok(())
}

/// Evenly spaced counter values ending at `total`
fn progress_points(total: u64) -> impl Iterator<Item = u64> {
    let steps = UPDATES_PER_STEP.min(total).max(1);
    (1..=steps).map(move |step| total * step / steps)
}

/// Wait for Ctrl+C signal
async fn wait_for_shutdown() {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        Err(err) => {
            error!("Error waiting for Ctrl+C: {}", err);
        }
    }
}
