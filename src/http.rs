//! Authenticated JSON-over-HTTP helper shared by the gateway, agent and
//! plan-store clients.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::version::BuildInfo;

const BODY_PREVIEW_LIMIT: usize = 512;

/// Caller identity presented to the gateway and the agent service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Bearer token
    pub access_token: String,
    /// User the token was issued to
    pub username: String,
    /// Gateway the user belongs to
    pub gateway_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Claims<'a> {
    user_name: &'a str,
    #[serde(rename = "gatewayID")]
    gateway_id: &'a str,
}

impl Credentials {
    pub fn new(
        access_token: impl Into<String>,
        username: impl Into<String>,
        gateway_id: impl Into<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            username: username.into(),
            gateway_id: gateway_id.into(),
        }
    }

    /// Headers attached to every request
    pub fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if !self.access_token.is_empty() {
            let bearer = HeaderValue::from_str(&format!("Bearer {}", self.access_token))
                .map_err(|_| Error::Config("access token contains invalid characters".into()))?;
            headers.insert(AUTHORIZATION, bearer);
        }

        let claims = serde_json::to_string(&Claims {
            user_name: &self.username,
            gateway_id: &self.gateway_id,
        })?;
        let claims = HeaderValue::from_str(&claims)
            .map_err(|_| Error::Config("user name contains invalid characters".into()))?;
        headers.insert("X-Claims", claims);

        Ok(headers)
    }
}

/// JSON client bound to one base URL
#[derive(Debug, Clone)]
pub struct JsonClient {
    base_url: String,
    client: Client,
}

impl JsonClient {
    /// Create a client whose requests carry the given credentials
    pub fn new(base_url: impl Into<String>, credentials: &Credentials, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(BuildInfo::current().user_agent())
            .default_headers(credentials.headers()?)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Absolute URL for an API path
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        let url = self.url(path);
        self.send(self.client.get(&url), &url).await
    }

    /// GET that maps 404 to `None`
    pub async fn get_optional<R: DeserializeOwned>(&self, path: &str) -> Result<Option<R>> {
        let url = self.url(path);
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(url = %url, "Resource not found");
            return Ok(None);
        }
        decode(response, &url).await.map(Some)
    }

    pub async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = self.url(path);
        self.send(self.client.post(&url).json(body), &url).await
    }

    pub async fn put<B: Serialize + ?Sized, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = self.url(path);
        self.send(self.client.put(&url).json(body), &url).await
    }

    async fn send<R: DeserializeOwned>(&self, request: RequestBuilder, url: &str) -> Result<R> {
        trace!(url = %url, "Sending request");
        let response = request.send().await?;
        decode(response, url).await
    }
}

/// Empty or ignorable response body
#[derive(Debug, Default, Deserialize)]
pub struct Ignored {}

async fn decode<R: DeserializeOwned>(response: Response, url: &str) -> Result<R> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(Error::Http {
            status: status.as_u16(),
            url: url.to_string(),
            body: preview_body(&body),
        });
    }

    // Some endpoints answer 200/204 with no body at all
    let text = if body.trim().is_empty() { "{}" } else { body.as_str() };
    serde_json::from_str(text).map_err(|e| Error::ProtocolMalformed {
        message: format!("{}: {} | body={}", url, e, preview_body(&body)),
    })
}

fn preview_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }
    if trimmed.chars().count() <= BODY_PREVIEW_LIMIT {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(BODY_PREVIEW_LIMIT).collect();
    out.push_str("...");
    out
}
