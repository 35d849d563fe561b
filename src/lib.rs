// Shared types for both notification streams
pub mod models;

// Error taxonomy
pub mod error;

// Durable key/value storage
pub mod persist;

// Notification stores (membership mirror + persisted reminders)
pub mod store;

// Remote service clients
pub mod membership;
pub mod reservations;

// Reminder scheduling
pub mod scheduler;

// Merged, sorted, filterable projection
pub mod aggregator;

// Display sink for fired reminders
pub mod display;

// Infrastructure
pub mod config;
pub mod logging;
pub mod metrics;

pub use aggregator::{SourceFilter, UnifiedView};
pub use config::Config;
pub use scheduler::ReminderScheduler;
pub use store::{MembershipStore, ReminderStore, StoreEvent};
