//! Fetching JSON documents from feeds.

use std::time::Duration;

use crate::error::RestError;

/// Something that can GET a JSON document from a feed.
pub trait RestClient: Send + Sync {
    /// GET `uri` and return the body as a string.
    fn get_json_string(&self, uri: &str) -> Result<String, RestError>;
}

/// [`RestClient`] backed by a blocking `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqRestClient {
    agent: ureq::Agent,
}

impl UreqRestClient {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(15))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent("goodget")
            .build();
        Self { agent }
    }
}

impl Default for UreqRestClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RestClient for UreqRestClient {
    fn get_json_string(&self, uri: &str) -> Result<String, RestError> {
        tracing::debug!(uri, "GET");
        let response = self
            .agent
            .get(uri)
            .set("Accept", "application/json")
            .call()
            .map_err(|err| map_ureq_error(uri, err))?;
        response.into_string().map_err(|source| RestError::Read {
            uri: uri.to_string(),
            source,
        })
    }
}

fn map_ureq_error(uri: &str, err: ureq::Error) -> RestError {
    match err {
        ureq::Error::Status(404, _) => RestError::NotFound {
            uri: uri.to_string(),
        },
        ureq::Error::Status(status, _) => RestError::Status {
            uri: uri.to_string(),
            status,
        },
        ureq::Error::Transport(transport) => RestError::Transport {
            uri: uri.to_string(),
            reason: transport.to_string(),
        },
    }
}
