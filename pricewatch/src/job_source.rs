//! Where the next job comes from.
//!
//! The collection service offers a batched endpoint that picks the next job
//! across a store set, and a per-store endpoint. The batched endpoint is tried
//! first. When it fails the stores are asked one by one, in order, and the
//! first job wins. A store that errors is skipped.

use crate::configuration::{Configuration, RetryConfig};
use crate::error::JobSourceError;
use crate::job::{parse_next_job, NextJob};
use crate::store::{join_stores, StoreId};
use crate::utils::send_with_retry;
use async_trait::async_trait;
use reqwest::Client;

/// Provides the next job for a store set.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// The next job across `stores`. Failures are logged and reported as exhausted.
    async fn next(&self, stores: &[StoreId]) -> NextJob;
}

/// The two endpoints a tiered job source is built from.
#[async_trait]
pub trait JobEndpoints: Send + Sync {
    /// Ask across the whole store set.
    async fn batched(&self, stores: &[StoreId]) -> Result<NextJob, JobSourceError>;
    /// Ask a single store.
    async fn single(&self, store: StoreId) -> Result<NextJob, JobSourceError>;
}

/// Resolve the next job: batched first, then each store in order.
pub async fn next_with_fallback<E>(endpoints: &E, stores: &[StoreId]) -> NextJob
where
    E: JobEndpoints + ?Sized,
{
    if stores.is_empty() {
        return NextJob::Exhausted;
    }

    match endpoints.batched(stores).await {
        Ok(next) => return next,
        Err(e) => log::warn!(
            "next job for {} failed, asking stores in order: {e}",
            join_stores(stores)
        ),
    }

    let mut failures = 0;

    for store in stores {
        match endpoints.single(*store).await {
            Ok(NextJob::Job(job)) => return NextJob::Job(job),
            Ok(NextJob::Exhausted) => log::debug!("{store} has no more items"),
            Err(e) => {
                failures += 1;
                log::warn!("next job for {store} failed: {e}");
            }
        }
    }

    if failures == stores.len() {
        log::warn!("job source unreachable, treating the run as done");
    }

    NextJob::Exhausted
}

/// Job source backed by the collection service HTTP API.
#[derive(Debug, Clone)]
pub struct HttpJobSource {
    client: Client,
    batched_url: String,
    single_url: String,
    retry: RetryConfig,
}

impl HttpJobSource {
    /// Create a job source sharing `client`.
    pub fn new(client: Client, config: &Configuration) -> Self {
        Self {
            client,
            batched_url: config.api_url("next_multi"),
            single_url: config.api_url("next"),
            retry: config.retry.clone(),
        }
    }

    async fn fetch(&self, url: &str, query: (&str, String)) -> Result<NextJob, JobSourceError> {
        let response = send_with_retry(&self.retry, || {
            self.client.get(url).query(&[(query.0, query.1.as_str())])
        })
        .await?;

        let status = response.status();

        if !status.is_success() {
            return Err(JobSourceError::Status(status));
        }

        let body = response.text().await?;

        parse_next_job(&body).map_err(JobSourceError::Malformed)
    }
}

#[async_trait]
impl JobEndpoints for HttpJobSource {
    async fn batched(&self, stores: &[StoreId]) -> Result<NextJob, JobSourceError> {
        self.fetch(&self.batched_url, ("stores", join_stores(stores)))
            .await
    }

    async fn single(&self, store: StoreId) -> Result<NextJob, JobSourceError> {
        self.fetch(&self.single_url, ("store", store.to_string()))
            .await
    }
}

#[async_trait]
impl JobSource for HttpJobSource {
    async fn next(&self, stores: &[StoreId]) -> NextJob {
        next_with_fallback(self, stores).await
    }
}
