//! Face verification oracle.
//!
//! Elimination proofs are judged by an external service: it fetches the
//! claimed victim's stored photo through the given source URL, compares it
//! against the probe bytes shipped in the request body and answers with a
//! plain verdict. The backend only ever sees the boolean.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

/// Convenient result alias returning [`OracleError`] failures.
pub type OracleResult<T> = Result<T, OracleError>;

/// Similarity threshold applied when none is configured.
pub const DEFAULT_THRESHOLD: f32 = 80.0;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Failures that can occur while consulting the verification service.
#[derive(Debug, Error)]
pub enum OracleError {
    /// Required environment variable is missing.
    #[error("missing oracle environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Building the HTTP client failed.
    #[error("failed to build oracle client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The comparison request could not be sent or timed out.
    #[error("failed to reach verification oracle")]
    RequestSend {
        #[source]
        source: reqwest::Error,
    },
    /// The oracle answered with an unexpected status code.
    #[error("unexpected oracle response status {status}")]
    RequestStatus { status: StatusCode },
    /// The verdict payload could not be parsed.
    #[error("failed to decode oracle response")]
    DecodeResponse {
        #[source]
        source: reqwest::Error,
    },
}

/// Abstraction over the face comparison service.
pub trait FaceOracle: Send + Sync {
    /// Compare the photo behind `source_url` against the probe bytes.
    ///
    /// `true` means the faces matched at or above the configured threshold.
    fn verify(
        &self,
        source_url: String,
        probe: Vec<u8>,
        probe_content_type: String,
    ) -> BoxFuture<'static, OracleResult<bool>>;
}

/// Runtime configuration describing how to reach the oracle.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub base_url: String,
    pub threshold: f32,
    pub timeout: Duration,
}

impl OracleConfig {
    /// Construct a configuration from an explicit base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            threshold: DEFAULT_THRESHOLD,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env() -> OracleResult<Self> {
        let base_url =
            std::env::var("GOTCHA_ORACLE_BASE_URL").map_err(|_| OracleError::MissingEnvVar {
                var: "GOTCHA_ORACLE_BASE_URL",
            })?;

        let mut config = Self::new(base_url);

        if let Some(threshold) = std::env::var("GOTCHA_ORACLE_THRESHOLD")
            .ok()
            .and_then(|raw| raw.parse().ok())
        {
            config.threshold = threshold;
        }
        if let Some(seconds) = std::env::var("GOTCHA_ORACLE_TIMEOUT_SECONDS")
            .ok()
            .and_then(|raw| raw.parse().ok())
        {
            config.timeout = Duration::from_secs(seconds);
        }

        Ok(config)
    }
}

#[derive(Debug, Deserialize)]
struct CompareResponse {
    #[serde(rename = "match")]
    matched: bool,
}

/// Oracle client speaking HTTP to the comparison service.
#[derive(Clone)]
pub struct HttpFaceOracle {
    client: Client,
    base_url: String,
    threshold: f32,
}

impl HttpFaceOracle {
    /// Build the client. The timeout bounds every comparison round trip.
    pub fn new(config: OracleConfig) -> OracleResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|source| OracleError::ClientBuilder { source })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            threshold: config.threshold,
        })
    }
}

impl FaceOracle for HttpFaceOracle {
    fn verify(
        &self,
        source_url: String,
        probe: Vec<u8>,
        probe_content_type: String,
    ) -> BoxFuture<'static, OracleResult<bool>> {
        let oracle = self.clone();
        Box::pin(async move {
            let url = format!("{}/compare", oracle.base_url);
            let response = oracle
                .client
                .post(&url)
                .query(&[
                    ("source", source_url),
                    ("similarity_threshold", oracle.threshold.to_string()),
                ])
                .header(CONTENT_TYPE, probe_content_type)
                .body(probe)
                .send()
                .await
                .map_err(|source| OracleError::RequestSend { source })?;

            if !response.status().is_success() {
                return Err(OracleError::RequestStatus {
                    status: response.status(),
                });
            }

            let verdict: CompareResponse = response
                .json()
                .await
                .map_err(|source| OracleError::DecodeResponse { source })?;
            Ok(verdict.matched)
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Canned oracles for service tests.

    use super::*;

    /// Oracle that always answers with the same verdict.
    #[derive(Clone, Copy)]
    pub struct FixedOracle {
        verdict: bool,
    }

    impl FixedOracle {
        pub fn matching() -> Self {
            Self { verdict: true }
        }

        pub fn rejecting() -> Self {
            Self { verdict: false }
        }
    }

    impl FaceOracle for FixedOracle {
        fn verify(
            &self,
            _source_url: String,
            _probe: Vec<u8>,
            _probe_content_type: String,
        ) -> BoxFuture<'static, OracleResult<bool>> {
            let verdict = self.verdict;
            Box::pin(async move { Ok(verdict) })
        }
    }

    /// Oracle that is always unreachable.
    #[derive(Clone, Copy)]
    pub struct DownOracle;

    impl FaceOracle for DownOracle {
        fn verify(
            &self,
            _source_url: String,
            _probe: Vec<u8>,
            _probe_content_type: String,
        ) -> BoxFuture<'static, OracleResult<bool>> {
            Box::pin(async {
                Err(OracleError::RequestStatus {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                })
            })
        }
    }
}
