//! PEP daemon client.
//!
//! One call: marshal the query, POST it to the first endpoint that answers,
//! unmarshal the decision. Endpoints are tried in configured order; only
//! transport-level failures fail over — once a daemon has answered, its
//! answer (good or bad) is final.

use std::time::Duration;

use pep_core::hessian::{DecodeError, EncodeError};
use pep_core::model::{Request, Response};
use pep_core::{marshal_request, unmarshal_response};

use crate::config::PepConfig;

const CONTENT_TYPE: &str = "application/octet-stream";

/// Errors surfaced by [`PepClient::authorize`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("no PEP daemon endpoints configured")]
    NoEndpoints,

    #[error("request encoding failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("response decoding failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("transport failure: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{endpoint} answered HTTP {code}")]
    BadStatus { endpoint: String, code: u16 },

    #[error("all {tried} endpoint(s) failed; last: {last}")]
    AllEndpointsFailed { tried: usize, last: Box<ClientError> },
}

/// Handle to a set of PEP daemon endpoints.
pub struct PepClient {
    http: reqwest::Client,
    endpoints: Vec<String>,
}

impl PepClient {
    pub fn new(config: &PepConfig) -> Result<Self, ClientError> {
        if config.endpoints.is_empty() {
            return Err(ClientError::NoEndpoints);
        }
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { http, endpoints: config.endpoints.clone() })
    }

    /// Ship an authorization query and return the daemon's decision.
    pub async fn authorize(&self, request: &Request) -> Result<Response, ClientError> {
        let body = marshal_request(request)?;
        tracing::debug!(bytes = body.len(), "authorization request marshalled");

        let mut last_error = None;
        for endpoint in &self.endpoints {
            match self.post(endpoint, body.clone()).await {
                Ok(raw) => {
                    let response = unmarshal_response(&raw)?;
                    tracing::debug!(
                        endpoint = %endpoint,
                        results = response.results.len(),
                        "authorization response received"
                    );
                    return Ok(response);
                }
                // the daemon answered; its verdict on our request stands
                Err(err @ ClientError::BadStatus { .. }) => return Err(err),
                Err(err) => {
                    tracing::warn!(endpoint = %endpoint, error = %err, "endpoint unreachable, trying next");
                    last_error = Some(err);
                }
            }
        }
        Err(ClientError::AllEndpointsFailed {
            tried: self.endpoints.len(),
            last: Box::new(last_error.unwrap_or(ClientError::NoEndpoints)),
        })
    }

    async fn post(&self, endpoint: &str, body: Vec<u8>) -> Result<Vec<u8>, ClientError> {
        let response = self
            .http
            .post(endpoint)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(body)
            .send()
            .await?;
        let code = response.status();
        if !code.is_success() {
            return Err(ClientError::BadStatus {
                endpoint: endpoint.to_string(),
                code: code.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_endpoint_list_is_rejected() {
        let config = PepConfig::default();
        match PepClient::new(&config) {
            Err(ClientError::NoEndpoints) => {}
            other => panic!("expected NoEndpoints, got {:?}", other.err()),
        }
    }

    #[test]
    fn client_builds_with_one_endpoint() {
        let config = PepConfig {
            endpoints: vec!["http://127.0.0.1:8154/authz".to_string()],
            ..PepConfig::default()
        };
        assert!(PepClient::new(&config).is_ok());
    }
}
