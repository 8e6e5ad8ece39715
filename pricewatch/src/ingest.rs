//! Posting captures to the collection service.

use crate::configuration::{Configuration, RetryConfig};
use crate::error::IngestError;
use crate::job::Job;
use crate::protocol::CaptureResult;
use crate::store::StoreId;
use crate::utils::send_with_retry;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The body of a capture POST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturePayload {
    /// Run the job belongs to.
    pub capture_run_id: i64,
    /// Store of the job.
    pub store: StoreId,
    /// Tracked item.
    pub item_id: i64,
    /// The product page.
    pub url: String,
    /// Shelf price.
    pub price: Option<Decimal>,
    /// Unit price.
    pub unit_price: Option<Decimal>,
    /// Price before a promotion.
    pub was_price: Option<Decimal>,
    /// Promotion label.
    pub promo_text: Option<String>,
}

impl CapturePayload {
    /// Build the payload for a job and its capture. Identifiers and the url come from the job.
    pub fn new(job: &Job, result: &CaptureResult) -> Self {
        Self {
            capture_run_id: job.run_id,
            store: job.store_id,
            item_id: job.item_id,
            url: job.url.clone(),
            price: result.price,
            unit_price: result.unit_price,
            was_price: result.was_price,
            promo_text: result.promo_text.clone(),
        }
    }
}

/// Accepts successful captures.
#[async_trait]
pub trait IngestClient: Send + Sync {
    /// Post one capture.
    async fn post(&self, payload: &CapturePayload) -> Result<(), IngestError>;
}

/// Ingestion over the collection service HTTP API.
#[derive(Debug, Clone)]
pub struct HttpIngestClient {
    client: Client,
    capture_url: String,
    retry: RetryConfig,
}

impl HttpIngestClient {
    /// Create an ingest client sharing `client`.
    pub fn new(client: Client, config: &Configuration) -> Self {
        Self {
            client,
            capture_url: config.api_url("capture"),
            retry: config.retry.clone(),
        }
    }
}

#[async_trait]
impl IngestClient for HttpIngestClient {
    async fn post(&self, payload: &CapturePayload) -> Result<(), IngestError> {
        let response = send_with_retry(&self.retry, || {
            self.client.post(&self.capture_url).json(payload)
        })
        .await?;

        let status = response.status();

        if status.is_success() {
            Ok(())
        } else {
            Err(IngestError::Status(status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CaptureOutcome;

    #[test]
    fn test_payload_uses_job_fields() {
        let job = Job {
            run_id: 12,
            store_id: StoreId::Coles,
            item_id: 40,
            item_name: Some("Bread".into()),
            url: "https://www.coles.com.au/product/bread-1".into(),
        };
        let result = CaptureResult {
            store_id: StoreId::Coles,
            price: Some(Decimal::new(350, 2)),
            unit_price: Some(Decimal::new(175, 2)),
            was_price: None,
            promo_text: None,
            outcome: CaptureOutcome::Success,
        };

        let value = serde_json::to_value(CapturePayload::new(&job, &result)).unwrap();

        assert_eq!(value["capture_run_id"], 12);
        assert_eq!(value["store"], "COLES");
        assert_eq!(value["item_id"], 40);
        assert_eq!(value["url"], "https://www.coles.com.au/product/bread-1");
        assert_eq!(value["price"], serde_json::json!(3.5));
        assert_eq!(value["unit_price"], serde_json::json!(1.75));
        assert!(value["was_price"].is_null());
    }

    #[test]
    fn test_payload_store_ignores_reported_store() {
        let job = Job {
            run_id: 3,
            store_id: StoreId::Woolworths,
            item_id: 8,
            item_name: None,
            url: "https://www.woolworths.com.au/shop/productdetails/8/eggs".into(),
        };
        let result = CaptureResult {
            store_id: StoreId::Coles,
            price: Some(Decimal::new(600, 2)),
            unit_price: None,
            was_price: None,
            promo_text: None,
            outcome: CaptureOutcome::Success,
        };

        let payload = CapturePayload::new(&job, &result);

        assert_eq!(payload.store, StoreId::Woolworths);
        assert_eq!(payload.item_id, 8);
        assert_eq!(payload.capture_run_id, 3);
    }
}
