//! Blob backend speaking plain HTTP to an S3-compatible object server.
//!
//! Objects live at `{base_url}/{bucket}/{reference}`. `PUT` uploads, `GET`
//! downloads, `DELETE` removes. The bucket is created on connect when the
//! server reports it missing.

use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};

use super::{BlobError, BlobResult, BlobStore, StoredBlob};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Runtime configuration describing how to reach the blob server.
#[derive(Debug, Clone)]
pub struct HttpBlobConfig {
    pub base_url: String,
    pub bucket: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl HttpBlobConfig {
    /// Construct a configuration from explicit base URL and bucket name.
    pub fn new(base_url: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bucket: bucket.into(),
            username: None,
            password: None,
        }
    }

    /// Attach basic-auth credentials to the configuration.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env() -> BlobResult<Self> {
        let base_url =
            std::env::var("GOTCHA_BLOB_BASE_URL").map_err(|_| BlobError::MissingEnvVar {
                var: "GOTCHA_BLOB_BASE_URL",
            })?;
        let bucket = std::env::var("GOTCHA_BLOB_BUCKET").map_err(|_| BlobError::MissingEnvVar {
            var: "GOTCHA_BLOB_BUCKET",
        })?;

        let mut config = Self::new(base_url, bucket);

        if let (Some(username), Some(password)) = (
            std::env::var("GOTCHA_BLOB_USERNAME").ok(),
            std::env::var("GOTCHA_BLOB_PASSWORD").ok(),
        ) {
            config = config.with_credentials(username, password);
        }

        Ok(config)
    }
}

/// Blob store client over an HTTP object server.
#[derive(Clone)]
pub struct HttpBlobStore {
    client: Client,
    base_url: Arc<str>,
    bucket: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl HttpBlobStore {
    /// Establish a connection to the blob server and ensure the bucket exists.
    pub async fn connect(config: HttpBlobConfig) -> BlobResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| BlobError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let bucket = Arc::<str>::from(config.bucket);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            bucket,
            auth,
        };

        store.ensure_bucket().await?;
        Ok(store)
    }

    fn request(&self, method: Method, reference: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.bucket, reference);
        let builder = self.client.request(method, url);
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    fn bucket_request(&self, method: Method) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, self.bucket);
        let builder = self.client.request(method, url);
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    async fn ensure_bucket(&self) -> BlobResult<()> {
        let path = self.bucket.to_string();
        let response = self
            .bucket_request(Method::GET)
            .send()
            .await
            .map_err(|source| BlobError::RequestSend {
                path: path.clone(),
                source,
            })?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self.bucket_request(Method::PUT).send().await.map_err(
                    |source| BlobError::RequestSend {
                        path: path.clone(),
                        source,
                    },
                )?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(BlobError::RequestStatus {
                        path,
                        status: create.status(),
                    })
                }
            }
            other => Err(BlobError::RequestStatus {
                path,
                status: other,
            }),
        }
    }
}

impl BlobStore for HttpBlobStore {
    fn store(
        &self,
        reference: String,
        content_type: String,
        bytes: Vec<u8>,
    ) -> BoxFuture<'static, BlobResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let response = store
                .request(Method::PUT, &reference)
                .header(CONTENT_TYPE, content_type)
                .body(bytes)
                .send()
                .await
                .map_err(|source| BlobError::RequestSend {
                    path: reference.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(BlobError::RequestStatus {
                    path: reference,
                    status: response.status(),
                })
            }
        })
    }

    fn read(&self, reference: String) -> BoxFuture<'static, BlobResult<Option<StoredBlob>>> {
        let store = self.clone();
        Box::pin(async move {
            let response = store
                .request(Method::GET, &reference)
                .send()
                .await
                .map_err(|source| BlobError::RequestSend {
                    path: reference.clone(),
                    source,
                })?;

            match response.status() {
                StatusCode::NOT_FOUND => Ok(None),
                status if status.is_success() => {
                    let content_type = response
                        .headers()
                        .get(CONTENT_TYPE)
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or(FALLBACK_CONTENT_TYPE)
                        .to_string();
                    let bytes = response.bytes().await.map_err(|source| {
                        BlobError::ReadBody {
                            path: reference,
                            source,
                        }
                    })?;
                    Ok(Some(StoredBlob {
                        content_type,
                        bytes: bytes.to_vec(),
                    }))
                }
                other => Err(BlobError::RequestStatus {
                    path: reference,
                    status: other,
                }),
            }
        })
    }

    fn delete(&self, reference: String) -> BoxFuture<'static, BlobResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let response = store
                .request(Method::DELETE, &reference)
                .send()
                .await
                .map_err(|source| BlobError::RequestSend {
                    path: reference.clone(),
                    source,
                })?;

            match response.status() {
                StatusCode::NOT_FOUND => Ok(()),
                status if status.is_success() => Ok(()),
                other => Err(BlobError::RequestStatus {
                    path: reference,
                    status: other,
                }),
            }
        })
    }

    fn health_check(&self) -> BoxFuture<'static, BlobResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let response = store
                .bucket_request(Method::GET)
                .send()
                .await
                .map_err(|source| BlobError::RequestSend {
                    path: store.bucket.to_string(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(BlobError::RequestStatus {
                    path: store.bucket.to_string(),
                    status: response.status(),
                })
            }
        })
    }
}
