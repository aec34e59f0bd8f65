//! Origin network access
//!
//! The network is the last-resort path for every request the cache does
//! not answer. Its failures are surfaced to the requester unchanged.

use crate::error::{ShellCacheError, ShellCacheResult};
use crate::http::{Method, Request, Response};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tracing::debug;

/// Abstract origin interface
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request against the origin
    ///
    /// Non-2xx statuses are returned as responses, not errors.
    async fn fetch(&self, request: &Request) -> ShellCacheResult<Response>;
}

/// HTTP origin backed by a `ureq` agent
#[derive(Clone)]
pub struct HttpNetwork {
    agent: ureq::Agent,
    user_agent: String,
}

impl HttpNetwork {
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();

        Self {
            agent: ureq::Agent::new_with_config(config),
            user_agent: user_agent.into(),
        }
    }

    /// Blocking request execution, run on tokio's blocking pool
    fn execute(
        agent: &ureq::Agent,
        user_agent: &str,
        request: &Request,
    ) -> Result<Response, String> {
        let url = request.url.as_str();

        macro_rules! with_headers {
            ($builder:expr) => {{
                let mut builder = $builder.header("User-Agent", user_agent);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder
            }};
        }

        let result = match &request.method {
            Method::Get => with_headers!(agent.get(url)).call(),
            Method::Head => with_headers!(agent.head(url)).call(),
            Method::Delete => with_headers!(agent.delete(url)).call(),
            Method::Options => with_headers!(agent.options(url)).call(),
            Method::Post => with_headers!(agent.post(url)).send(request.body.as_ref()),
            Method::Put => with_headers!(agent.put(url)).send(request.body.as_ref()),
            Method::Patch => with_headers!(agent.patch(url)).send(request.body.as_ref()),
            Method::Extension(name) => return Err(format!("unsupported method {}", name)),
        };

        let mut response = result.map_err(|e| e.to_string())?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = if request.method == Method::Head {
            Vec::new()
        } else {
            response
                .body_mut()
                .read_to_vec()
                .map_err(|e| format!("reading body: {}", e))?
        };

        Ok(Response {
            status,
            headers,
            body: Bytes::from(body),
        })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> ShellCacheResult<Response> {
        if let Method::Extension(name) = &request.method {
            return Err(ShellCacheError::UnsupportedMethod(name.clone()));
        }

        let agent = self.agent.clone();
        let user_agent = self.user_agent.clone();
        let owned = request.clone();

        let response = tokio::task::spawn_blocking(move || {
            Self::execute(&agent, &user_agent, &owned)
        })
        .await
        .map_err(|e| ShellCacheError::Internal(format!("network task failed: {}", e)))?
        .map_err(|reason| ShellCacheError::network(request.url.as_str(), reason))?;

        debug!(
            method = %request.method,
            url = %request.url,
            status = response.status,
            "Origin responded"
        );
        Ok(response)
    }
}
