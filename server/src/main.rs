use std::error::Error;

use tokio::signal;
use tracing::{debug, error, info};

use server::bootstrap::state::AppState;
use server::config_loader;
use server::observability;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    let config = config_loader::load_config()?;

    observability::tracing::setup_logging(&config)?;
    observability::startup_info::log_startup_info(&config);

    let state = AppState::new(config).await?;

    run_polling_loop(state).await
}

async fn run_polling_loop(state: AppState) -> Result<(), Box<dyn Error>> {
    let mut monitor = state.monitor;
    let period = state.config.polling_cycle();
    info!(
        "Starting polling loop ({:.1}s cycle, 60 times the golden ratio)...",
        period.as_secs_f64()
    );

    let mut consecutive_errors = 0u32;
    loop {
        match monitor.poll_once().await {
            Ok(()) => consecutive_errors = 0,
            Err(e) => {
                consecutive_errors += 1;
                error!("Error during polling cycle: {e} (consecutive errors: {consecutive_errors})");
                if consecutive_errors >= 3 {
                    error!("Three consecutive errors encountered. Exiting.");
                    return Err(e.into());
                }
            }
        }

        debug!(
            "Cycle complete, sleeping for {:.1} seconds...",
            period.as_secs_f64()
        );
        tokio::select! {
            () = tokio::time::sleep(period) => {}
            () = shutdown_signal() => {
                info!("Shutdown requested, exiting after current cycle.");
                return Ok(());
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
            }
        }
    };

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, starting graceful shutdown...");
        },
        () = terminate => {
            info!("Received terminate signal, starting graceful shutdown...");
        },
    }
}
