//! Storage abstraction for photo blobs.
//!
//! Game state and photo bytes live in different systems. This module owns the
//! photo side: an object store addressed by opaque references, with an HTTP
//! backend for deployments and an in-memory backend for tests.

pub mod http;
pub mod memory;

use futures::future::BoxFuture;
use reqwest::StatusCode;
use thiserror::Error;

#[allow(unused_imports)]
pub use http::{HttpBlobConfig, HttpBlobStore};
#[allow(unused_imports)]
pub use memory::MemoryBlobStore;

/// Convenient result alias returning [`BlobError`] failures.
pub type BlobResult<T> = Result<T, BlobError>;

/// A stored photo together with the media type it was uploaded as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Failures that can occur while interacting with the blob backend.
#[derive(Debug, Error)]
pub enum BlobError {
    /// Required environment variable is missing.
    #[error("missing blob store environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Building the HTTP client failed.
    #[error("failed to build blob store client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// A request to the backend could not be sent.
    #[error("failed to send blob store request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The backend returned an unexpected status code.
    #[error("unexpected blob store response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// The response body could not be read.
    #[error("failed to read blob store response for `{path}`")]
    ReadBody {
        path: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Abstraction over the photo object store.
///
/// References are opaque to the backend. Callers mint them, decide what may be
/// uploaded and keep track of which user owns which reference.
pub trait BlobStore: Send + Sync {
    /// Persist a photo under the given reference, replacing any previous blob.
    fn store(
        &self,
        reference: String,
        content_type: String,
        bytes: Vec<u8>,
    ) -> BoxFuture<'static, BlobResult<()>>;
    /// Fetch a photo by reference. `None` when no blob exists under it.
    fn read(&self, reference: String) -> BoxFuture<'static, BlobResult<Option<StoredBlob>>>;
    /// Drop the blob under the given reference. Unknown references are a no-op.
    fn delete(&self, reference: String) -> BoxFuture<'static, BlobResult<()>>;
    /// Cheap reachability probe used by the health endpoint.
    fn health_check(&self) -> BoxFuture<'static, BlobResult<()>>;
}
