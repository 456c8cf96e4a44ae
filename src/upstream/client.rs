use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, StreamExt, TryStreamExt};
use http::header::ACCEPT;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use super::{ByteStream, PassthroughHeaders, Relay, Upstream};
use crate::error::UpstreamError;

/// User-Agent sent with every upstream request.
pub const DEFAULT_USER_AGENT: &str = concat!("gis-gateway/", env!("CARGO_PKG_VERSION"));

/// Basic-auth credentials for the upstream server.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// True when both parts are empty and no Authorization header should be sent.
    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Pooled, authenticated HTTP client for a GeoServer instance.
///
/// One instance is built at startup and shared by every request. Idle
/// connections are kept alive and reused; a semaphore caps how many
/// requests (including open tile streams) are in flight at once.
#[derive(Clone)]
pub struct GeoServerClient {
    http: reqwest::Client,
    credentials: Option<Credentials>,
    request_timeout: Duration,
    permits: Arc<Semaphore>,
}

impl GeoServerClient {
    /// Create a client.
    ///
    /// # Arguments
    ///
    /// * `credentials` - Basic-auth credentials; empty credentials send no header
    /// * `request_timeout` - How long to wait for the upstream to start answering
    /// * `pool_size` - Maximum concurrent upstream requests and idle connections kept
    pub fn new(
        credentials: Credentials,
        request_timeout: Duration,
        pool_size: usize,
    ) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .connect_timeout(request_timeout)
            .pool_max_idle_per_host(pool_size)
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| UpstreamError::Build(e.to_string()))?;

        Ok(Self {
            http,
            credentials: (!credentials.is_empty()).then_some(credentials),
            request_timeout,
            permits: Arc::new(Semaphore::new(pool_size.max(1))),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Number of requests that could start right now without waiting.
    pub fn available_connections(&self) -> usize {
        self.permits.available_permits()
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.http.get(url);
        match &self.credentials {
            Some(c) => request.basic_auth(&c.username, Some(&c.password)),
            None => request,
        }
    }

    async fn acquire(&self) -> Result<OwnedSemaphorePermit, UpstreamError> {
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| UpstreamError::PoolClosed)
    }

    /// Run `fut` under the request timeout.
    async fn within_timeout<T, F>(&self, fut: F) -> Result<T, UpstreamError>
    where
        F: std::future::Future<Output = Result<T, UpstreamError>>,
    {
        tokio::time::timeout(self.request_timeout, fut)
            .await
            .map_err(|_| UpstreamError::Timeout(self.request_timeout))?
    }
}

#[async_trait]
impl Upstream for GeoServerClient {
    async fn get_json(&self, url: &str) -> Result<Relay<Bytes>, UpstreamError> {
        let timeout = self.request_timeout;
        self.within_timeout(async {
            let _permit = self.acquire().await?;
            let response = self
                .request(url)
                .send()
                .await
                .map_err(|e| UpstreamError::from_reqwest(e, timeout))?;

            let status = response.status();
            let headers = PassthroughHeaders::from_headers(response.headers());
            let body = response
                .bytes()
                .await
                .map_err(|e| UpstreamError::Body(e.to_string()))?;

            debug!(status = status.as_u16(), bytes = body.len(), "Upstream response");
            Ok(Relay::new(status, headers, body))
        })
        .await
    }

    async fn get_stream(&self, url: &str, accept: &str) -> Result<Relay<ByteStream>, UpstreamError> {
        let timeout = self.request_timeout;
        let (permit, response) = self
            .within_timeout(async {
                let permit = self.acquire().await?;
                let response = self
                    .request(url)
                    .header(ACCEPT, accept)
                    .send()
                    .await
                    .map_err(|e| UpstreamError::from_reqwest(e, timeout))?;
                Ok((permit, response))
            })
            .await?;

        let status = response.status();
        let headers = PassthroughHeaders::from_headers(response.headers());
        debug!(status = status.as_u16(), "Upstream stream opened");

        let chunks = response
            .bytes_stream()
            .map_err(|e| UpstreamError::Body(e.to_string()))
            .boxed();

        // The permit travels with the body and is released when the stream is dropped
        let body = stream::unfold((chunks, permit), |(mut chunks, permit)| async move {
            let item = chunks.next().await?;
            Some((item, (chunks, permit)))
        })
        .boxed();

        Ok(Relay::new(status, headers, body))
    }
}
