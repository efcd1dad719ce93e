//! Process-local blob backend used by tests.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;

use super::{BlobResult, BlobStore, StoredBlob};

/// Blob store keeping photo bytes in a concurrent map.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<DashMap<String, StoredBlob>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently held. Test helper.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Whether no blob is held. Test helper.
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl BlobStore for MemoryBlobStore {
    fn store(
        &self,
        reference: String,
        content_type: String,
        bytes: Vec<u8>,
    ) -> BoxFuture<'static, BlobResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.blobs.insert(
                reference,
                StoredBlob {
                    content_type,
                    bytes,
                },
            );
            Ok(())
        })
    }

    fn read(&self, reference: String) -> BoxFuture<'static, BlobResult<Option<StoredBlob>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.blobs.get(&reference).map(|blob| blob.clone())) })
    }

    fn delete(&self, reference: String) -> BoxFuture<'static, BlobResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.blobs.remove(&reference);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, BlobResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
