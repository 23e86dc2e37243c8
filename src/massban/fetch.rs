use std::io::Read;
use std::time::Duration;

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const FETCH_MAX_BYTES: u64 = 4 * 1024 * 1024;

const FETCH_FAILED: &str = ":x: Could not fetch the URL. \
Make sure it is publicly available and you have not entered the link incorrectly.";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to reach {url}: {reason}")]
    Unreachable { url: String, reason: String },
    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },
    #[error("{url} body exceeds {limit} bytes")]
    TooLarge { url: String, limit: u64 },
    #[error("failed to read body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Unreachable { .. } => ":x: Invalid URL!".to_string(),
            Self::Status { .. } | Self::Body { .. } => FETCH_FAILED.to_string(),
            Self::TooLarge { .. } => ":x: The ID list is too large to fetch.".to_string(),
        }
    }
}

pub trait SourceFetcher: Send + Sync {
    fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpSourceFetcher {
    agent: ureq::Agent,
    max_bytes: u64,
}

impl Default for HttpSourceFetcher {
    fn default() -> Self {
        Self::new(FETCH_TIMEOUT, FETCH_MAX_BYTES)
    }
}

impl HttpSourceFetcher {
    pub fn new(timeout: Duration, max_bytes: u64) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            max_bytes,
        }
    }
}

impl SourceFetcher for HttpSourceFetcher {
    fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let response = match self.agent.get(url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status,
                })
            }
            Err(err) => {
                return Err(FetchError::Unreachable {
                    url: url.to_string(),
                    reason: err.to_string(),
                })
            }
        };

        let mut body = Vec::new();
        response
            .into_reader()
            .take(self.max_bytes + 1)
            .read_to_end(&mut body)
            .map_err(|source| FetchError::Body {
                url: url.to_string(),
                source,
            })?;
        if body.len() as u64 > self.max_bytes {
            return Err(FetchError::TooLarge {
                url: url.to_string(),
                limit: self.max_bytes,
            });
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}
