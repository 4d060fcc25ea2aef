//! Blocking HTTP transport driven from the async runtime

use crate::config::schema::NetworkConfig;
use crate::error::{ShellError, ShellResult};
use crate::network::{Network, Request, Response};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use ureq::Agent;
use url::Url;

/// [`Network`] backed by a `ureq` agent
///
/// Relative request URLs are resolved against the configured origin.
/// HTTP error statuses are returned as responses so pass-through requests
/// reach the caller verbatim.
#[derive(Clone)]
pub struct HttpNetwork {
    agent: Agent,
    origin: Url,
    max_body_bytes: u64,
}

impl HttpNetwork {
    /// Create a transport from network settings
    pub fn new(config: &NetworkConfig) -> ShellResult<Self> {
        let origin = Url::parse(&config.origin).map_err(|e| ShellError::InvalidUrl {
            url: config.origin.clone(),
            reason: e.to_string(),
        })?;

        let timeout = (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs));
        let agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .into();

        Ok(Self {
            agent,
            origin,
            max_body_bytes: config.max_body_mb.saturating_mul(1024 * 1024),
        })
    }

    /// The origin relative URLs resolve against
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Resolve a request URL against the origin
    pub fn resolve(&self, url: &str) -> ShellResult<Url> {
        self.origin.join(url).map_err(|e| ShellError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> ShellResult<Response> {
        let url = self.resolve(&request.url)?;
        debug!("{} {}", request.method, url);

        let agent = self.agent.clone();
        let method = request.method.as_str().to_string();
        let headers = request.headers.clone();
        let body = request.body.clone();
        let limit = self.max_body_bytes;
        let target = url.to_string();

        tokio::task::spawn_blocking(move || perform(&agent, &method, &target, &headers, body, limit))
            .await
            .map_err(|e| ShellError::Internal(format!("network task panicked: {}", e)))?
            .map_err(|reason| ShellError::network(url.as_str(), reason))
    }
}

fn perform(
    agent: &Agent,
    method: &str,
    url: &str,
    headers: &[(String, String)],
    body: Vec<u8>,
    limit: u64,
) -> Result<Response, String> {
    let mut builder = ureq::http::Request::builder().method(method).uri(url);
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let result = if body.is_empty() {
        let request = builder.body(()).map_err(|e| e.to_string())?;
        agent.run(request)
    } else {
        let request = builder.body(body).map_err(|e| e.to_string())?;
        agent.run(request)
    };
    let response = result.map_err(|e| e.to_string())?;

    let (parts, mut body) = response.into_parts();
    let bytes = body
        .with_config()
        .limit(limit)
        .read_to_vec()
        .map_err(|e| e.to_string())?;

    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    Ok(Response {
        status: parts.status.as_u16(),
        headers,
        body: bytes,
    })
}
