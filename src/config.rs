use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

use crate::scheduler::DEFAULT_POLL_INTERVAL;

#[derive(Debug, Clone)]
pub struct Config {
    pub membership_api_url: String,
    pub reservation_api_url: String,
    pub user_id: String,
    pub storage_path: String,
    pub poll_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            membership_api_url: env::var("MEMBERSHIP_API_URL")
                .context("MEMBERSHIP_API_URL must be set")?,
            reservation_api_url: env::var("RESERVATION_API_URL")
                .context("RESERVATION_API_URL must be set")?,
            user_id: env::var("USER_ID").context("USER_ID must be set")?,
            storage_path: env::var("STORAGE_PATH").unwrap_or_else(|_| "reminders.json".to_string()),
            poll_interval: env::var("REMINDER_POLL_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
        })
    }
}
