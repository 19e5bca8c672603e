//! HTTP step contract.
//!
//! The orchestrator renders url/method/headers/body, hands them to an
//! injected fetcher, and classifies the response: 2xx is success, anything
//! else is a step failure eligible for retry. The reqwest-backed
//! implementation lives in agentflow-infra.

use std::collections::BTreeMap;

/// One rendered HTTP step request.
#[derive(Debug, Clone)]
pub struct HttpStepRequest {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

/// The response as the orchestrator sees it.
#[derive(Debug, Clone)]
pub struct HttpStepResponse {
    pub status: u16,
    pub body: String,
}

impl HttpStepResponse {
    /// Success means a 2xx status, nothing else.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level failure (connect, DNS, TLS). Status-code failures are
/// not errors here; the orchestrator classifies those itself.
#[derive(Debug, thiserror::Error)]
#[error("http transport failure: {0}")]
pub struct HttpTransportError(pub String);

/// Performs HTTP requests on behalf of http steps.
pub trait HttpFetcher: Send + Sync {
    fn fetch(
        &self,
        request: HttpStepRequest,
    ) -> impl std::future::Future<Output = Result<HttpStepResponse, HttpTransportError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_2xx_counts_as_success() {
        let ok = HttpStepResponse {
            status: 204,
            body: String::new(),
        };
        let redirect = HttpStepResponse {
            status: 301,
            body: String::new(),
        };
        let error = HttpStepResponse {
            status: 500,
            body: String::new(),
        };
        assert!(ok.is_success());
        assert!(!redirect.is_success());
        assert!(!error.is_success());
    }
}
