//! Transport abstraction for the sync protocol.
//!
//! A transport carries three request shapes to the remote side and returns
//! its answers as raw line-format bodies. Implementations may use HTTP or any
//! other request/response channel.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Result, SyncError};

/// Client side of the sync protocol.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Descriptor lines for the remote's logs, limited to one owner if given.
    async fn query(&self, owner_id: Option<&str>) -> Result<Bytes>;

    /// Send descriptor lines naming wanted ids; returns a delta stream.
    async fn get(&self, request: Bytes) -> Result<Bytes>;

    /// Deliver a delta stream for the remote to apply.
    async fn send(&self, stream: Bytes) -> Result<()>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn query(&self, owner_id: Option<&str>) -> Result<Bytes> {
        (**self).query(owner_id).await
    }

    async fn get(&self, request: Bytes) -> Result<Bytes> {
        (**self).get(request).await
    }

    async fn send(&self, stream: Bytes) -> Result<()> {
        (**self).send(stream).await
    }
}

/// Await a remote request, failing with [`SyncError::Timeout`] after `timeout`.
pub(crate) async fn with_timeout<T>(
    timeout: Duration,
    request: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::Timeout(format!(
            "{} request after {:?}",
            request, timeout
        ))),
    }
}

/// In-process transport for tests and embedding.
pub mod memory {
    use super::*;

    use logsync_store::LogStore;

    use crate::endpoint::LogEndpoint;

    /// Transport that calls a [`LogEndpoint`] directly.
    pub struct LoopbackTransport<S> {
        endpoint: Arc<LogEndpoint<S>>,
    }

    impl<S: LogStore> LoopbackTransport<S> {
        /// Serve requests from `store`.
        pub fn new(store: S) -> Self {
            Self {
                endpoint: Arc::new(LogEndpoint::new(store)),
            }
        }

        /// Share an existing endpoint.
        pub fn from_endpoint(endpoint: Arc<LogEndpoint<S>>) -> Self {
            Self { endpoint }
        }

        pub fn endpoint(&self) -> &Arc<LogEndpoint<S>> {
            &self.endpoint
        }
    }

    impl<S> Clone for LoopbackTransport<S> {
        fn clone(&self) -> Self {
            Self {
                endpoint: Arc::clone(&self.endpoint),
            }
        }
    }

    #[async_trait]
    impl<S: LogStore> Transport for LoopbackTransport<S> {
        async fn query(&self, owner_id: Option<&str>) -> Result<Bytes> {
            self.endpoint.handle_query(owner_id).await
        }

        async fn get(&self, request: Bytes) -> Result<Bytes> {
            self.endpoint.handle_get(&request).await
        }

        async fn send(&self, stream: Bytes) -> Result<()> {
            self.endpoint.handle_send(&stream).await.map(|_| ())
        }
    }
}
