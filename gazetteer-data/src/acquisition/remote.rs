use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, HeaderMap};
use reqwest::{Client, Method, Response};
use std::io::{self, Write};
use std::time::Duration;
use thiserror::Error;

/// User agent sent with every request unless overridden.
pub const DEFAULT_USER_AGENT: &str = "gazetteer-installer/0.1";

/// Default bound on connecting and on each read from the socket, in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Failures talking to a remote source.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client")]
    Client {
        #[source]
        source: reqwest::Error,
    },
    /// The server answered with a non-success status.
    #[error("{url} answered HTTP {status}")]
    Http { url: String, status: u16 },
    /// The server stopped sending for longer than the configured timeout.
    #[error("request to {url} stalled for more than {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },
    /// The request never produced a response, or the body stream broke.
    #[error("request to {url} failed")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The downloaded bytes could not be written locally.
    #[error("failed to store the body of {url}")]
    Sink {
        url: String,
        #[source]
        source: io::Error,
    },
}

/// Remote files reachable by URL.
#[async_trait(?Send)]
pub trait RemoteSource {
    /// Size advertised by the server for `url`, if any.
    async fn content_length(&self, url: &str) -> Result<Option<u64>, TransportError>;
    /// Stream the body of `url` into `sink`, returning the bytes written.
    async fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64, TransportError>;
}

/// Configuration for [`HttpRemoteSource`].
#[derive(Debug, Clone)]
pub struct HttpRemoteSourceConfig {
    /// User agent string for requests.
    pub user_agent: String,
    /// Bound on connecting and on every individual read. A body that keeps
    /// flowing is never cut off, however long the whole transfer takes.
    pub timeout: Duration,
}

impl Default for HttpRemoteSourceConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl HttpRemoteSourceConfig {
    /// Set the connect and read timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// [`RemoteSource`] backed by a `reqwest` client.
#[derive(Debug)]
pub struct HttpRemoteSource {
    client: Client,
    timeout: Duration,
}

impl HttpRemoteSource {
    /// Build a client with the default configuration.
    ///
    /// # Errors
    /// Returns [`TransportError::Client`] when the TLS backend cannot be
    /// initialised.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_config(&HttpRemoteSourceConfig::default())
    }

    /// Build a client from `config`.
    ///
    /// # Errors
    /// As for [`HttpRemoteSource::new`].
    pub fn with_config(config: &HttpRemoteSourceConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.timeout)
            .read_timeout(config.timeout)
            .build()
            .map_err(|source| TransportError::Client { source })?;
        Ok(Self {
            client,
            timeout: config.timeout,
        })
    }

    fn transport_error(&self, url: &str, source: reqwest::Error) -> TransportError {
        if source.is_timeout() {
            return TransportError::Timeout {
                url: url.to_owned(),
                timeout_secs: self.timeout.as_secs(),
            };
        }
        match source.status() {
            Some(status) => TransportError::Http {
                url: url.to_owned(),
                status: status.as_u16(),
            },
            None => TransportError::Network {
                url: url.to_owned(),
                source,
            },
        }
    }

    async fn send(&self, method: Method, url: &str) -> Result<Response, TransportError> {
        let response = self
            .client
            .request(method, url)
            .send()
            .await
            .map_err(|err| self.transport_error(url, err))?;
        response
            .error_for_status()
            .map_err(|err| self.transport_error(url, err))
    }
}

/// `Content-Length` as sent by the server. HEAD responses carry no body, so
/// the header is read directly rather than from the body size hint.
fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[async_trait(?Send)]
impl RemoteSource for HttpRemoteSource {
    async fn content_length(&self, url: &str) -> Result<Option<u64>, TransportError> {
        let response = self.send(Method::HEAD, url).await?;
        Ok(declared_length(response.headers()))
    }

    async fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64, TransportError> {
        let sink_error = |source| TransportError::Sink {
            url: url.to_owned(),
            source,
        };
        let mut response = self.send(Method::GET, url).await?;
        let mut total = 0_u64;
        loop {
            let chunk = response
                .chunk()
                .await
                .map_err(|err| self.transport_error(url, err))?;
            let Some(bytes) = chunk else { break };
            sink.write_all(&bytes).map_err(sink_error)?;
            total = total.saturating_add(u64::try_from(bytes.len()).unwrap_or(u64::MAX));
        }
        sink.flush().map_err(sink_error)?;
        Ok(total)
    }
}
