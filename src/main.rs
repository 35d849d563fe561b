use anyhow::Result;
use std::sync::Arc;
use tokio::{
    signal,
    sync::{mpsc, oneshot},
};
use tracing::info;

use membership_notifier::aggregator::UnifiedView;
use membership_notifier::membership::HttpMembershipService;
use membership_notifier::persist::FileStorage;
use membership_notifier::reservations::HttpReservationService;
use membership_notifier::scheduler::ReminderScheduler;
use membership_notifier::store::{MembershipStore, ReminderStore};
use membership_notifier::{config, display, logging, metrics};

fn main() -> Result<()> {
    // Build custom runtime with explicit thread configuration
    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or_else(num_cpus::get);

    println!("Starting with {} Tokio worker threads", worker_threads);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        // Initialize logging first thing
        logging::setup_logging();

        // Load environment variables from .env file if present
        dotenv::dotenv().ok();

        info!("Starting Membership Notification Service");

        // Load configuration
        let config = config::Config::from_env()?;

        // Single storage instance shared by everything that persists
        let storage = Arc::new(FileStorage::open(&config.storage_path));

        let membership_service = Arc::new(HttpMembershipService::new(
            config.membership_api_url.clone(),
        ));
        let reservation_service = Arc::new(HttpReservationService::new(
            config.reservation_api_url.clone(),
        ));

        let membership_store = Arc::new(MembershipStore::new(
            membership_service,
            config.user_id.clone(),
        ));
        let reminder_store = Arc::new(ReminderStore::new(storage));

        // Mirror the remote membership notifications before anything renders
        membership_store.load().await;

        let unified = UnifiedView::new(membership_store.clone(), reminder_store.clone());
        info!(
            total = unified.snapshot().len(),
            unread = unified.unread_count(),
            "Unified notification view ready"
        );

        // Log every store change while the service runs
        let mut membership_events = membership_store.subscribe();
        let mut reminder_events = reminder_store.subscribe();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    Some(event) = membership_events.recv() => event,
                    Some(event) = reminder_events.recv() => event,
                    else => break,
                };
                tracing::debug!(?event, "Notification store changed");
            }
        });

        // Create channel for the reminder display pipeline
        let (display_sender, display_receiver) = mpsc::channel(100);

        // Create shutdown signal
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        // Spawn reminder scheduler task
        let scheduler = ReminderScheduler::new(
            reservation_service,
            reminder_store.clone(),
            display_sender,
            config.user_id.clone(),
            config.poll_interval,
        );
        let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

        // Spawn display sink task
        let display_handle = tokio::spawn(display::run_display_sink(display_receiver));

        // Handle graceful shutdown
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received shutdown signal, shutting down gracefully");
            }
        }

        // Send shutdown signal to tasks
        let _ = shutdown_tx.send(());

        // Wait for ALL tasks to complete
        let _ = tokio::join!(scheduler_handle, display_handle);

        info!("Final metrics:\n{}", metrics::metrics_snapshot());
        info!("Shutdown complete");
        Ok(())
    })
}
