//! Shared fixtures for engine tests.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use gogload_core::{
    DownloadError, DownloadTarget, EngineConfig, ResolvedLink, Stores, StoredUrlResolver,
    UrlResolverPort,
};
use gogload_db::TestDb;

use super::{WorkerDeps, WorkerPool};
use crate::http::testing::FakeBackend;
use crate::storage::LocalStorage;

/// Deterministic content that differs at every segment boundary.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 251) % 256) as u8).collect()
}

/// Small chunks and short delays so tests finish quickly.
pub fn test_config() -> EngineConfig {
    EngineConfig::new()
        .with_chunk_size(4 * 1024)
        .with_max_workers(8)
        .with_retry_base_delay(Duration::from_millis(20))
        .with_read_timeout(Duration::from_secs(5))
        .with_persist_interval(Duration::from_millis(50))
        .with_speed_sample_interval(Duration::from_millis(50))
}

pub fn url_for(link: &str) -> String {
    format!("https://cdn.example/{link}")
}

pub fn target(game: &str, link: &str, file: &str) -> DownloadTarget {
    DownloadTarget::new(game, link, file).with_url(url_for(link))
}

/// Resolver returning the stored URL unless the link was marked as broken.
#[derive(Default)]
pub struct FakeResolver {
    broken: Mutex<HashSet<String>>,
    calls: AtomicUsize,
}

impl FakeResolver {
    pub fn break_link(&self, link_id: &str) {
        self.broken
            .lock()
            .unwrap()
            .insert(link_id.to_string());
    }

    pub fn repair_link(&self, link_id: &str) {
        self.broken.lock().unwrap().remove(link_id);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UrlResolverPort for FakeResolver {
    async fn resolve(&self, target: &DownloadTarget) -> Result<ResolvedLink, DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken.lock().unwrap().contains(&target.link_id) {
            return Err(DownloadError::resolution_failed(format!(
                "link {} expired",
                target.link_id
            )));
        }
        StoredUrlResolver.resolve(target).await
    }
}

/// Database, download folder, fake server and resolver wired together.
pub struct Harness {
    pub db: TestDb,
    pub dir: TempDir,
    pub backend: Arc<FakeBackend>,
    pub resolver: Arc<FakeResolver>,
    pub deps: WorkerDeps,
}

impl Harness {
    pub async fn new(backend: FakeBackend, config: EngineConfig) -> Self {
        let db = TestDb::new().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(backend);
        let resolver = Arc::new(FakeResolver::default());
        let Stores {
            downloads,
            segments,
        } = db.stores();

        let deps = WorkerDeps {
            downloads,
            segments,
            storage: Arc::new(LocalStorage::new(dir.path())),
            http: backend.clone(),
            resolver: resolver.clone(),
            pool: WorkerPool::new(config.max_workers),
            config,
        };

        Self {
            db,
            dir,
            backend,
            resolver,
            deps,
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn read(&self, name: &str) -> Option<Vec<u8>> {
        std::fs::read(self.path(name)).ok()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }
}
