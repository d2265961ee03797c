//! Pull-only replication of versioned repositories.
//!
//! A repository holds opaque blobs under integer versions. Each run asks a
//! discovered remote host which versions it holds, then fetches and stores
//! the ones missing locally. Nothing is ever pushed.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use logsync_core::SortedRangeSet;

use crate::error::{Result, SyncError};
use crate::transport::with_timeout;

/// Answer from a remote repository request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: Bytes,
}

impl RemoteResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A `200` response.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn into_body(self, request: &str) -> Result<Bytes> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(SyncError::RemoteStatus {
                status: self.status,
                message: format!(
                    "{}: {}",
                    request,
                    String::from_utf8_lossy(&self.body).trim()
                ),
            })
        }
    }
}

/// Finds the remote host to replicate from.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// The host address, or `None` when no remote is reachable.
    async fn discover(&self) -> Option<String>;
}

/// A fixed host, or none.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    host: Option<String>,
}

impl StaticDiscovery {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn discover(&self) -> Option<String> {
        self.host.clone()
    }
}

/// Local store of versioned blobs that can be replicated.
#[async_trait]
pub trait Repository: Send + Sync {
    fn name(&self) -> &str;

    /// Versions held locally.
    async fn range(&self) -> Result<SortedRangeSet>;

    /// Store the blob for `version`.
    async fn put(&self, version: i64, data: Bytes) -> Result<()>;
}

/// Requests against a remote host's repositories.
#[async_trait]
pub trait RepositoryTransport: Send + Sync {
    /// Ask which versions the remote holds; the body is a range line
    /// (see [`parse_query_response`]).
    async fn query(&self, host: &str, repository: &str) -> Result<RemoteResponse>;

    /// Fetch one version's blob.
    async fn get(&self, host: &str, repository: &str, version: i64) -> Result<RemoteResponse>;
}

/// Parse a range query answer.
///
/// The answer is free text ending in `,<range set>`; only the text after the
/// last comma is parsed, so a multi-range answer yields its final range.
pub fn parse_query_response(body: &str) -> Result<SortedRangeSet> {
    let line = body.trim_end_matches(['\r', '\n']);
    let (_, tail) = line.rsplit_once(',').ok_or_else(|| {
        SyncError::InvalidResponse(format!("range answer without a comma: {:?}", line))
    })?;
    Ok(SortedRangeSet::parse(tail.trim())?)
}

/// Configuration for replication runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationConfig {
    /// Timeout for each remote request.
    pub request_timeout: Duration,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Result of a replication run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicationReport {
    /// Host replicated from, if one was discovered.
    pub host: Option<String>,
    /// Versions fetched and stored, across all repositories.
    pub pulled: usize,
    /// Repositories that failed, with the error text.
    pub failed: Vec<(String, String)>,
}

/// Pulls missing versions of every registered repository from a remote.
pub struct ReplicationTask<D: Discovery, T: RepositoryTransport> {
    discovery: D,
    transport: T,
    repositories: Vec<Arc<dyn Repository>>,
    config: ReplicationConfig,
}

impl<D: Discovery, T: RepositoryTransport> ReplicationTask<D, T> {
    pub fn new(discovery: D, transport: T, config: ReplicationConfig) -> Self {
        Self {
            discovery,
            transport,
            repositories: Vec::new(),
            config,
        }
    }

    pub fn with_repository(mut self, repository: Arc<dyn Repository>) -> Self {
        self.repositories.push(repository);
        self
    }

    pub fn add_repository(&mut self, repository: Arc<dyn Repository>) {
        self.repositories.push(repository);
    }

    pub fn repositories(&self) -> &[Arc<dyn Repository>] {
        &self.repositories
    }

    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// Run one replication pass.
    ///
    /// A repository that fails is logged and recorded; the rest still run.
    pub async fn run(&self) -> ReplicationReport {
        let mut report = ReplicationReport::default();

        let Some(host) = self.discovery.discover().await else {
            tracing::info!("no remote host discovered, skipping replication");
            return report;
        };

        for repository in &self.repositories {
            let name = repository.name();
            match self.replicate(&host, repository.as_ref()).await {
                Ok(pulled) => {
                    if pulled > 0 {
                        tracing::info!(repository = name, host = %host, pulled, "replicated");
                    }
                    report.pulled += pulled;
                }
                Err(e) => {
                    tracing::warn!(repository = name, host = %host, error = %e, "replication failed");
                    report.failed.push((name.to_string(), e.to_string()));
                }
            }
        }

        report.host = Some(host);
        report
    }

    async fn replicate(&self, host: &str, repository: &dyn Repository) -> Result<usize> {
        let name = repository.name();
        let timeout = self.config.request_timeout;

        let response = with_timeout(timeout, "query", self.transport.query(host, name)).await?;
        let body = response.into_body("query")?;
        let text = std::str::from_utf8(&body)
            .map_err(|e| SyncError::InvalidResponse(format!("range answer is not UTF-8: {}", e)))?;
        let remote = parse_query_response(text)?;

        let local = repository.range().await?;
        let missing = remote.difference(&local);
        tracing::debug!(repository = name, range = %missing, "missing versions");

        let mut pulled = 0;
        for version in missing.iter() {
            let response =
                with_timeout(timeout, "get", self.transport.get(host, name, version)).await?;
            let data = response.into_body("get")?;
            repository.put(version, data).await?;
            pulled += 1;
        }
        Ok(pulled)
    }
}

/// In-memory repository.
#[derive(Debug)]
pub struct MemoryRepository {
    name: String,
    versions: RwLock<BTreeMap<i64, Bytes>>,
}

impl MemoryRepository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            versions: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn insert(&self, version: i64, data: impl Into<Bytes>) -> Result<()> {
        self.versions
            .write()
            .map_err(|e| SyncError::Repository(format!("lock poisoned: {}", e)))?
            .insert(version, data.into());
        Ok(())
    }

    pub fn get(&self, version: i64) -> Result<Option<Bytes>> {
        let versions = self
            .versions
            .read()
            .map_err(|e| SyncError::Repository(format!("lock poisoned: {}", e)))?;
        Ok(versions.get(&version).cloned())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    fn name(&self) -> &str {
        &self.name
    }

    async fn range(&self) -> Result<SortedRangeSet> {
        let versions = self
            .versions
            .read()
            .map_err(|e| SyncError::Repository(format!("lock poisoned: {}", e)))?;
        let ids: Vec<i64> = versions.keys().copied().collect();
        Ok(SortedRangeSet::from_values(&ids))
    }

    async fn put(&self, version: i64, data: Bytes) -> Result<()> {
        self.insert(version, data)
    }
}
