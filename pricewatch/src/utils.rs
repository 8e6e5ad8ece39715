use crate::configuration::{Configuration, RetryConfig};
use reqwest::{Client, RequestBuilder, Response};

/// Build the shared HTTP client for the collection service.
pub fn build_client(config: &Configuration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(config.request_timeout)
        .user_agent(concat!("pricewatch/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Send a request, retrying transport failures and server errors within the budget.
/// The final response or error is returned as is.
pub(crate) async fn send_with_retry<F>(
    retry: &RetryConfig,
    request: F,
) -> Result<Response, reqwest::Error>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0;

    loop {
        let result = request().send().await;

        let retryable = match &result {
            Ok(response) => response.status().is_server_error(),
            Err(e) => !e.is_builder(),
        };

        if !retryable || attempt >= retry.retries {
            return result;
        }

        attempt += 1;
        log::debug!("retrying request, attempt {} of {}", attempt, retry.retries);
        tokio::time::sleep(retry.backoff).await;
    }
}
