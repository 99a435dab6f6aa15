//! HTTP transport for fetching source documents.

use std::sync::Arc;

use futures_util::FutureExt;
use reqwest::StatusCode;
use snafu::{ResultExt, Snafu};

use crate::cache::{DataSetLoader, LoadError, LoadedDataSet};
use crate::dataset::DataSetParser;

/// An error returned by the HTTP transport.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TransportError {
    #[snafu(display("Failed to perform HTTP request"))]
    RequestFailed { url: String, source: reqwest::Error },
    #[snafu(display("HTTP status code indicates failure"))]
    HttpStatusFailure { status_code: StatusCode },
}

/// An HTTP client for retrieving raw document bytes by URI.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    // Basic Auth
    username: Option<String>,
    password: Option<String>,
    // Bearer Token
    bearer_token: Option<String>,

    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_basic_auth(&mut self, username: &str, password: &str) -> &Self {
        self.username = Some(username.to_string());
        self.password = Some(password.to_string());
        self
    }

    pub fn set_bearer_token(&mut self, token: &str) -> &Self {
        self.bearer_token = Some(token.to_string());
        self
    }

    fn decorate(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        // Basic authentication
        let request = if let Some(username) = &self.username {
            request.basic_auth(username, self.password.as_ref())
        } else {
            request
        };
        // Bearer token
        if let Some(token) = &self.bearer_token {
            request.bearer_auth(token)
        } else {
            request
        }
    }

    /// Fetch the raw bytes at `url`.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        self.fetch_with_accept(url, None).await
    }

    /// Fetch the raw bytes at `url`,
    /// requesting the given media type.
    pub async fn fetch_with_accept(
        &self,
        url: &str,
        accept: Option<&str>,
    ) -> Result<Vec<u8>, TransportError> {
        let request = self.decorate(self.client.get(url));
        let request = match accept {
            Some(media_type) => request.header("Accept", media_type),
            None => request,
        };

        let response = request.send().await.context(RequestFailedSnafu { url })?;

        if !response.status().is_success() {
            return Err(TransportError::HttpStatusFailure {
                status_code: response.status(),
            });
        }

        let bytes = response.bytes().await.context(RequestFailedSnafu { url })?;
        Ok(bytes.to_vec())
    }
}

/// Dataset loader over HTTP:
/// fetches the document bytes for a URI and parses them
/// through the injected parser collaborator.
pub struct WadoUriLoader<P: DataSetParser> {
    transport: Arc<HttpTransport>,
    parser: Arc<P>,
}

impl<P: DataSetParser> WadoUriLoader<P> {
    pub fn new(transport: HttpTransport, parser: P) -> Self {
        WadoUriLoader {
            transport: Arc::new(transport),
            parser: Arc::new(parser),
        }
    }
}

impl<P: DataSetParser> DataSetLoader for WadoUriLoader<P> {
    type DataSet = P::DataSet;

    fn load(
        &self,
        uri: &str,
    ) -> futures_util::future::BoxFuture<'static, Result<LoadedDataSet<P::DataSet>, LoadError>>
    {
        let transport = Arc::clone(&self.transport);
        let parser = Arc::clone(&self.parser);
        let uri = uri.to_string();

        async move {
            let bytes = transport
                .fetch(&uri)
                .await
                .map_err(|e| LoadError::Transport {
                    uri: uri.clone(),
                    message: e.to_string(),
                })?;
            let size_in_bytes = bytes.len();
            let data_set = parser
                .parse(bytes)
                .map_err(|e| LoadError::DatasetParseFailure {
                    uri: uri.clone(),
                    message: e.to_string(),
                })?;
            Ok(LoadedDataSet {
                data_set,
                size_in_bytes,
            })
        }
        .boxed()
    }
}
