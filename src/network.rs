use crate::config::Config;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::timeout;

/// Largest sitemap document accepted (the sitemap protocol's own limit).
pub const MAX_SITEMAP_BYTES: usize = 50 * 1024 * 1024;

/// Caching directives attached to every warming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheDirectives {
    pub success_ttl_secs: u64,
    pub not_found_ttl_secs: u64,
}

impl CacheDirectives {
    pub fn new(success_ttl_secs: u64, not_found_ttl_secs: u64) -> Self {
        Self {
            success_ttl_secs,
            not_found_ttl_secs,
        }
    }

    /// Per-status-class TTLs: cache successes, briefly cache 404s, never cache 5xx.
    pub fn ttl_by_status(&self) -> String {
        format!(
            "200-299={}, 404={}, 500-599=0",
            self.success_ttl_secs, self.not_found_ttl_secs
        )
    }

    pub fn cache_control(&self) -> String {
        format!("public, max-age={}", self.success_ttl_secs)
    }
}

/// What a warming request observed: status plus the edge's cache and trace headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmResponse {
    pub status_code: u16,
    pub cache_status: Option<String>,
    pub trace: Option<String>,
}

impl WarmResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// HTTP operations the warmer depends on.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a document body (sitemaps). A single attempt, no retry.
    async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError>;

    /// Issue one warming request and report what the edge returned.
    async fn warm(&self, url: &str, directives: &CacheDirectives) -> Result<WarmResponse, FetchError>;
}

/// reqwest-backed client shared by discovery and warming.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout_duration: Duration,
    user_agent: String,
    max_content_size: usize,
}

impl HttpClient {
    pub fn new(user_agent: String, timeout_secs: u64) -> Result<Self, FetchError> {
        Self::with_content_limit(user_agent, timeout_secs, MAX_SITEMAP_BYTES)
    }

    pub fn with_content_limit(
        user_agent: String,
        timeout_secs: u64,
        max_content_size: usize,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(&user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(Config::CONNECT_TIMEOUT_SECS))
            // Sequential warming needs only a handful of idle connections.
            .pool_max_idle_per_host(Config::POOL_IDLE_PER_HOST)
            .pool_idle_timeout(Duration::from_secs(Config::POOL_IDLE_TIMEOUT_SECS))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .redirect(reqwest::redirect::Policy::limited(Config::MAX_REDIRECTS))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            timeout_duration: Duration::from_secs(timeout_secs),
            user_agent,
            max_content_size,
        })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Classify reqwest errors into our FetchError types
    fn classify_error(error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            return FetchError::Timeout;
        }

        let error_msg = error.to_string().to_lowercase();

        if error_msg.contains("connection refused") {
            return FetchError::ConnectionRefused;
        }

        if error_msg.contains("dns") || error_msg.contains("name resolution") {
            return FetchError::DnsError;
        }

        if error_msg.contains("ssl") || error_msg.contains("tls") || error_msg.contains("certificate") {
            return FetchError::SslError;
        }

        if error.is_builder() {
            return FetchError::InvalidUrl(error.to_string());
        }

        FetchError::NetworkError(error.to_string())
    }

    fn header_value(response: &reqwest::Response, name: &str) -> Option<String> {
        response
            .headers()
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string())
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        let response = timeout(
            self.timeout_duration,
            self.client
                .get(url)
                .header("Accept", "application/xml,text/xml;q=0.9,*/*;q=0.8")
                .send(),
        )
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(Self::classify_error)?;

        let status_code = response.status().as_u16();
        let content_type = Self::header_value(&response, "content-type");

        if let Some(length) = response.content_length() {
            if length as usize > self.max_content_size {
                return Err(FetchError::ContentTooLarge(length as usize, self.max_content_size));
            }
        }

        let content = timeout(self.timeout_duration, response.text())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(|e| FetchError::BodyError(e.to_string()))?;

        if content.len() > self.max_content_size {
            return Err(FetchError::ContentTooLarge(content.len(), self.max_content_size));
        }

        Ok(FetchResult {
            content,
            status_code,
            content_type,
        })
    }

    async fn warm(&self, url: &str, directives: &CacheDirectives) -> Result<WarmResponse, FetchError> {
        let mut response = timeout(
            self.timeout_duration,
            self.client
                .get(url)
                .header(Config::WARMER_HEADER, "1")
                .header(Config::TTL_DIRECTIVE_HEADER, directives.ttl_by_status())
                .header("Cache-Control", directives.cache_control())
                .send(),
        )
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(Self::classify_error)?;

        let status_code = response.status().as_u16();
        let cache_status = Self::header_value(&response, Config::CACHE_STATUS_HEADER);
        let trace = Self::header_value(&response, Config::TRACE_HEADER);

        // Drain the body so the edge sees a complete response and can store it.
        // Chunks are dropped as they arrive; nothing is buffered.
        timeout(self.timeout_duration, async {
            while response.chunk().await?.is_some() {}
            Ok::<_, reqwest::Error>(())
        })
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(|e| FetchError::BodyError(e.to_string()))?;

        Ok(WarmResponse {
            status_code,
            cache_status,
            trace,
        })
    }
}

/// Result of a successful HTTP fetch
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub content: String,
    pub status_code: u16,
    pub content_type: Option<String>,
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Errors that can occur during HTTP fetching
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Connection refused - server not accepting connections")]
    ConnectionRefused,

    #[error("DNS resolution failed")]
    DnsError,

    #[error("SSL/TLS error - certificate or encryption issue")]
    SslError,

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to read response body: {0}")]
    BodyError(String),

    #[error("Content too large: {0} bytes (max: {1} bytes)")]
    ContentTooLarge(usize, usize),

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}
