use reqwest::Client;
use std::time::Duration;

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// Creates the HTTP client used by market-data providers. Requests are
    /// sent once; failures surface to the caller.
    pub fn create_client() -> Client {
        Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            // Yahoo rejects requests without a browser-like agent
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) pricecast")
            .build()
            .unwrap_or_else(|_| Client::new())
    }
}
