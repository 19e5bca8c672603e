//! Reqwest-backed HTTP fetcher for http steps.

use agentflow_core::http::{HttpFetcher, HttpStepRequest, HttpStepResponse, HttpTransportError};

/// Performs http-step requests with a shared [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl HttpFetcher for ReqwestFetcher {
    async fn fetch(&self, request: HttpStepRequest) -> Result<HttpStepResponse, HttpTransportError> {
        let method = reqwest::Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|_| HttpTransportError(format!("invalid method '{}'", request.method)))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| HttpTransportError(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| HttpTransportError(e.to_string()))?;
        Ok(HttpStepResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[tokio::test]
    async fn rejects_an_invalid_method_before_sending() {
        let fetcher = ReqwestFetcher::default();
        let err = fetcher
            .fetch(HttpStepRequest {
                url: "http://localhost/".to_string(),
                method: "NOT A METHOD".to_string(),
                headers: BTreeMap::new(),
                body: None,
            })
            .await
            .unwrap_err();
        assert!(err.0.contains("invalid method"));
    }
}
