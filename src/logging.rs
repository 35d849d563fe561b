use std::env;
use tracing_subscriber::{fmt, EnvFilter};

pub fn setup_logging() {
    // Check for a LOG_LEVEL environment variable, defaulting to INFO
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    // Create a custom filter that limits verbose components
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Default filter configuration to reduce noise
        EnvFilter::new(format!("membership_notifier={}", log_level))
            // Keep the scheduler and display sink at INFO level
            .add_directive("membership_notifier::scheduler=info".parse().unwrap())
            .add_directive("membership_notifier::display=info".parse().unwrap())
            // Reduce noise from third-party libraries
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap())
    });

    // Initialize the subscriber with the filter
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        // Disable unnecessary details to keep logs clean
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    tracing::info!("Logging initialized at custom levels");
}
