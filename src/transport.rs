use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::Config;
use crate::errors::{Error, TransportFailure, TransportFailureKind};
use crate::request::{OutboundRequest, RequestBody, has_scheme};

const USER_AGENT: &str = concat!("session-client/", env!("CARGO_PKG_VERSION"));

/// A fully received HTTP response.
#[derive(Clone, Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Sends one request and hands back whatever the server answered.
///
/// Implementations never interpret the status code; a response of any status
/// is `Ok`. `Err` means no response was received at all.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &OutboundRequest) -> Result<Response, TransportFailure>;
}

/// Cookie-carrying reqwest transport bound to one base URL.
pub struct ReqwestTransport {
    http_client: Client,
    base: Url,
}

impl ReqwestTransport {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let base = config.base()?;
        let http_client = Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http_client, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn resolve(&self, request: &OutboundRequest) -> Result<Url, TransportFailure> {
        let target = request.path_and_query();
        let joined = if has_scheme(&target) {
            target
        } else {
            format!(
                "{}/{}",
                self.base.as_str().trim_end_matches('/'),
                target.trim_start_matches('/')
            )
        };
        Url::parse(&joined).map_err(|e| {
            TransportFailure::new(
                TransportFailureKind::Other,
                format!("invalid request URL '{}': {}", joined, e),
            )
        })
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<Response, TransportFailure> {
        let url = self.resolve(request)?;
        debug!(method = %request.method, url = %url, retried = request.retried, "http.send");
        let mut builder = self
            .http_client
            .request(request.method.clone(), url)
            .headers(request.headers.clone());
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(bytes) => builder.body(bytes.clone()),
            RequestBody::Multipart(form) => builder.multipart(form.to_reqwest()?),
        };
        let resp = builder.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;
        Ok(Response::new(status, headers, body.to_vec()))
    }
}
