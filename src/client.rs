use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, Url};

use crate::error::ClientError;

/// Default connect timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default request timeout. Must stay above the maximum long-poll window (60s)
/// or every waiting feed poll would time out client-side first.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Header carrying the static access key, attached to every request.
pub const ACCESS_KEY_HEADER: &str = "Event-Store-Access-Key";
/// Header carrying the static secret access key, attached to every request.
pub const SECRET_ACCESS_KEY_HEADER: &str = "Event-Store-Secret-Access-Key";

/// Immutable configuration for a [`Connection`].
///
/// Required fields are validated at construction, not at use: a successfully
/// built `ClientConfig` always holds a parseable base url and non-empty
/// credentials.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: Url,
    access_key: String,
    secret_access_key: String,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(
        base_url: &str,
        access_key: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ClientError::Validation(format!("invalid base url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Validation(format!(
                "base url cannot carry a path: {}",
                base_url
            )));
        }

        let access_key = access_key.into();
        let secret_access_key = secret_access_key.into();
        if access_key.is_empty() || secret_access_key.is_empty() {
            return Err(ClientError::Validation(
                "access key and secret access key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            access_key,
            secret_access_key,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Set connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

struct ConnectionInner {
    http: reqwest::Client,
    base_url: Url,
}

/// Shared HTTP transport towards the remote event store.
///
/// Attaches the two credential headers to every outgoing request. Clone is
/// cheap: the inner client and configuration are behind an [`Arc`], so the
/// aggregate store and any number of feed pollers can share one connection
/// pool.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        let mut access_key = HeaderValue::from_str(&config.access_key)
            .map_err(|_| ClientError::Validation("access key is not a valid header value".to_string()))?;
        let mut secret_access_key = HeaderValue::from_str(&config.secret_access_key)
            .map_err(|_| ClientError::Validation("secret access key is not a valid header value".to_string()))?;
        access_key.set_sensitive(true);
        secret_access_key.set_sensitive(true);
        headers.insert(ACCESS_KEY_HEADER, access_key);
        headers.insert(SECRET_ACCESS_KEY_HEADER, secret_access_key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ConnectionInner {
                http,
                base_url: config.base_url,
            }),
        })
    }

    /// Builds an absolute url from path segments, e.g.
    /// `url(&["aggregates", "order", "<id>"])`.
    pub(crate) fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.inner.base_url.clone();
        {
            // Url::path_segments_mut only fails for cannot-be-a-base urls,
            // which ClientConfig::new rejects.
            let mut path = url
                .path_segments_mut()
                .expect("base url can always be a base");
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        url
    }

    pub(crate) fn get(&self, url: Url) -> RequestBuilder {
        self.inner.http.get(url)
    }

    pub(crate) fn head(&self, url: Url) -> RequestBuilder {
        self.inner.http.head(url)
    }

    pub(crate) fn post(&self, url: Url) -> RequestBuilder {
        self.inner.http.post(url)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("base_url", &self.inner.base_url.as_str())
            .finish()
    }
}
