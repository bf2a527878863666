// Evaluator service client
//
// POST /evaluate scores a completed query; POST /evaluate-metrics carries
// the same envelope for deterministic metrics.

use reqwest::Client;
use std::time::Duration;

use maestro_contracts::{EvaluateRequest, EvaluationVerdict};

use crate::error::{ExecError, Result};

/// Client for evaluator services
pub struct EvaluatorClient {
    client: Client,
    timeout: Duration,
}

impl EvaluatorClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
        }
    }

    /// POST /evaluate
    pub async fn evaluate(
        &self,
        base_url: &str,
        request: &EvaluateRequest,
    ) -> Result<EvaluationVerdict> {
        self.post(base_url, "/evaluate", request).await
    }

    /// POST /evaluate-metrics
    pub async fn evaluate_metrics(
        &self,
        base_url: &str,
        request: &EvaluateRequest,
    ) -> Result<EvaluationVerdict> {
        self.post(base_url, "/evaluate-metrics", request).await
    }

    async fn post(
        &self,
        base_url: &str,
        path: &str,
        request: &EvaluateRequest,
    ) -> Result<EvaluationVerdict> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), path);
        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExecError::timeout("evaluator call")
                } else {
                    ExecError::EvaluatorUnavailable {
                        message: e.to_string(),
                    }
                }
            })?;

        if !response.status().is_success() {
            return Err(ExecError::EvaluatorUnavailable {
                message: format!("evaluator returned {}", response.status()),
            });
        }
        response
            .json()
            .await
            .map_err(|e| ExecError::EvaluatorBadResponse {
                message: e.to_string(),
            })
    }
}
