//! Server side of the sync protocol.
//!
//! `LogEndpoint` answers the three requests a syncing client makes. It holds
//! no session state; every call is a function of the request and the store.

use bytes::Bytes;

use logsync_store::LogStore;

use crate::apply::{apply_delta, ApplySummary};
use crate::error::Result;
use crate::messages::{decode_descriptors, encode_descriptors, write_delta};

/// Answers query, get and send requests from a store.
#[derive(Debug)]
pub struct LogEndpoint<S> {
    store: S,
}

impl<S: LogStore> LogEndpoint<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Descriptor lines for every stored log, or only `owner_id`'s logs.
    pub async fn handle_query(&self, owner_id: Option<&str>) -> Result<Bytes> {
        let descriptors = match owner_id {
            Some(owner) => self.store.get_descriptors_for(owner).await?,
            None => self.store.get_descriptors().await?,
        };
        Ok(encode_descriptors(&descriptors))
    }

    /// Delta stream holding the stored events named by the request's
    /// descriptor lines.
    pub async fn handle_get(&self, request: &[u8]) -> Result<Bytes> {
        let wanted = decode_descriptors(request)?;
        let writer = write_delta(&self.store, &wanted).await;
        tracing::debug!(
            groups = writer.group_count(),
            events = writer.event_count(),
            failed = writer.failed().len(),
            "serving delta"
        );
        Ok(writer.finish())
    }

    /// Apply a delta stream pushed by a client.
    pub async fn handle_send(&self, stream: &[u8]) -> Result<ApplySummary> {
        let mut summary = ApplySummary::default();
        let result = apply_delta(&self.store, stream, &mut summary).await;
        tracing::info!(
            inserted = summary.put.inserted,
            duplicates = summary.put.duplicates,
            conflicts = summary.put.conflicts,
            failed = summary.failed.len(),
            "received delta"
        );
        result.map(|()| summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use logsync_core::LogEvent;
    use logsync_store::MemoryStore;

    async fn seeded() -> LogEndpoint<MemoryStore> {
        let store = MemoryStore::new();
        for (owner, log, id) in [("a", 1, 1), ("a", 1, 2), ("a", 1, 5), ("b", 3, 1)] {
            store
                .insert(&LogEvent::new(owner, log, id, 10 * id, 2, BTreeMap::new()))
                .await
                .unwrap();
        }
        LogEndpoint::new(store)
    }

    #[tokio::test]
    async fn test_query_all_and_by_owner() {
        let endpoint = seeded().await;
        let all = endpoint.handle_query(None).await.unwrap();
        assert_eq!(&all[..], b"a,1,1-2,5\nb,3,1\n");

        let only_b = endpoint.handle_query(Some("b")).await.unwrap();
        assert_eq!(&only_b[..], b"b,3,1\n");

        let nobody = endpoint.handle_query(Some("zz")).await.unwrap();
        assert!(nobody.is_empty());
    }

    #[tokio::test]
    async fn test_get_serves_only_stored_ids() {
        let endpoint = seeded().await;
        let body = endpoint.handle_get(b"a,1,2-9\n").await.unwrap();
        let text = std::str::from_utf8(&body).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "a,1,2,5");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("a,1,2,20,2"));
    }

    #[tokio::test]
    async fn test_send_round_trip_between_endpoints() {
        let source = seeded().await;
        let sink = LogEndpoint::new(MemoryStore::new());

        let stream = source.handle_get(b"a,1,1-5\nb,3,1\n").await.unwrap();
        let summary = sink.handle_send(&stream).await.unwrap();
        assert_eq!(summary.put.inserted, 4);

        assert_eq!(
            sink.handle_query(None).await.unwrap(),
            source.handle_query(None).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_get_rejects_malformed_request() {
        let endpoint = seeded().await;
        assert!(endpoint.handle_get(b"a,notanumber,1\n").await.is_err());
    }
}
