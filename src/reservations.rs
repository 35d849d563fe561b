use async_trait::async_trait;
use reqwest::Client as HttpClient;
use std::time::Duration;
use tracing::debug;

use crate::error::NotifyError;
use crate::models::UpcomingReservation;

/// Read-only reservation query source polled by the reminder scheduler.
/// Safe to call repeatedly.
#[async_trait]
pub trait ReservationService: Send + Sync {
    async fn get_upcoming(&self, user_id: &str) -> Result<Vec<UpcomingReservation>, NotifyError>;
}

pub struct HttpReservationService {
    http_client: HttpClient,
    base_url: String,
}

impl HttpReservationService {
    pub fn new(base_url: String) -> Self {
        Self {
            http_client: HttpClient::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ReservationService for HttpReservationService {
    async fn get_upcoming(&self, user_id: &str) -> Result<Vec<UpcomingReservation>, NotifyError> {
        let url = format!("{}/users/{}/reservations/upcoming", self.base_url, user_id);
        debug!(url = %url, "Fetching upcoming reservations");

        let reservations = self
            .http_client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<UpcomingReservation>>()
            .await?;

        Ok(reservations)
    }
}
