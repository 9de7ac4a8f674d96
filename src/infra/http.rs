use std::io::Read;
use std::time::Duration;

use crate::domain::entity::ThreadData;
use crate::domain::error::DomainError;
use crate::domain::repository::ThreadSource;
use crate::infra::wire;

const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10MB
const TIMEOUT_SECS: u64 = 30;

/// Fetches threads from the upstream REST API:
/// `GET {base}/tweets/{id}/thread?limit={limit}&offset=0`.
pub struct HttpThreadSource {
    agent: ureq::Agent,
    base_url: url::Url,
    limit: u32,
}

impl HttpThreadSource {
    pub fn new(base_url: &str, limit: u32) -> Result<Self, DomainError> {
        let parsed = url::Url::parse(base_url)
            .map_err(|e| DomainError::InvalidInput(format!("invalid API URL: {}", e)))?;
        validate_url(&parsed)?;

        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(TIMEOUT_SECS))
            .timeout_read(Duration::from_secs(TIMEOUT_SECS))
            .redirects(0)
            .build();

        Ok(Self {
            agent,
            base_url: parsed,
            limit,
        })
    }

    pub fn thread_url(&self, root_id: &str) -> Result<url::Url, DomainError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DomainError::InvalidInput(format!("API URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["tweets", root_id, "thread"]);
        url.query_pairs_mut()
            .clear()
            .append_pair("limit", &self.limit.to_string())
            .append_pair("offset", "0");
        Ok(url)
    }
}

impl ThreadSource for HttpThreadSource {
    fn get_thread(&self, root_id: &str) -> Result<ThreadData, DomainError> {
        let url = self.thread_url(root_id)?;
        log::debug!("GET {}", url);

        let response = self
            .agent
            .get(url.as_str())
            .set("Accept", "application/json")
            .call()
            .map_err(|e| match e {
                ureq::Error::Status(status, _) => status_error(status, root_id),
                other => DomainError::Transport(format!("HTTP request failed: {}", other)),
            })?;

        if response.status() >= 300 {
            return Err(status_error(response.status(), root_id));
        }

        let body = read_response_body(response)?;
        wire::parse_thread(&body)
    }
}

fn status_error(status: u16, root_id: &str) -> DomainError {
    match status {
        404 => DomainError::NotFound(root_id.to_string()),
        _ => DomainError::Transport(format!("HTTP {} error", status)),
    }
}

fn validate_url(parsed: &url::Url) -> Result<(), DomainError> {
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(DomainError::InvalidInput(format!(
            "unsupported URL scheme: {} (only http/https allowed)",
            scheme
        ))),
    }
}

fn read_response_body(response: ureq::Response) -> Result<String, DomainError> {
    let content_length = response
        .header("Content-Length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);

    if content_length > MAX_RESPONSE_SIZE {
        return Err(DomainError::Transport(format!(
            "response too large: {} bytes (limit: {} bytes)",
            content_length, MAX_RESPONSE_SIZE
        )));
    }

    let mut body = Vec::new();
    let mut reader = response.into_reader();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| DomainError::Transport(format!("failed to read response: {}", e)))?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buf[..n]);
        if body.len() > MAX_RESPONSE_SIZE {
            return Err(DomainError::Transport(format!(
                "response exceeded {} byte limit",
                MAX_RESPONSE_SIZE
            )));
        }
    }

    String::from_utf8(body)
        .map_err(|e| DomainError::Parse(format!("response is not valid UTF-8: {}", e)))
}
