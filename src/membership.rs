use async_trait::async_trait;
use reqwest::Client as HttpClient;
use std::time::Duration;
use tracing::debug;

use crate::error::NotifyError;
use crate::models::MembershipNotification;

/// Remote membership-notification service. The server owns these records;
/// the client mirrors them and pushes mutations back optimistically.
/// Mutations are idempotent and no read-your-writes guarantee is assumed.
#[async_trait]
pub trait MembershipService: Send + Sync {
    async fn fetch(&self, user_id: &str) -> Result<Vec<MembershipNotification>, NotifyError>;
    async fn mark_read(&self, id: &str) -> Result<(), NotifyError>;
    async fn mark_all_read(&self, user_id: &str) -> Result<(), NotifyError>;
    async fn delete(&self, id: &str) -> Result<(), NotifyError>;
    async fn clear(&self, user_id: &str) -> Result<(), NotifyError>;
}

pub struct HttpMembershipService {
    http_client: HttpClient,
    base_url: String,
}

impl HttpMembershipService {
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
impl MembershipService for HttpMembershipService {
    async fn fetch(&self, user_id: &str) -> Result<Vec<MembershipNotification>, NotifyError> {
        let url = format!("{}/users/{}/notifications", self.base_url, user_id);
        debug!(url = %url, "Fetching membership notifications");

        let notifications = self
            .http_client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<MembershipNotification>>()
            .await?;

        Ok(notifications)
    }

    async fn mark_read(&self, id: &str) -> Result<(), NotifyError> {
        let url = format!("{}/notifications/{}/read", self.base_url, id);
        self.http_client
            .post(&url)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<(), NotifyError> {
        let url = format!("{}/users/{}/notifications/read-all", self.base_url, user_id);
        self.http_client
            .post(&url)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), NotifyError> {
        let url = format!("{}/notifications/{}", self.base_url, id);
        self.http_client
            .delete(&url)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn clear(&self, user_id: &str) -> Result<(), NotifyError> {
        let url = format!("{}/users/{}/notifications", self.base_url, user_id);
        self.http_client
            .delete(&url)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
