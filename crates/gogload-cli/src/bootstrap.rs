//! CLI bootstrap - the composition root.
//!
//! This module is the ONLY place where infrastructure is wired together
//! for the CLI adapter. All concrete implementations are instantiated here:
//! - Database pool and stores (via gogload-db)
//! - Local storage, HTTP backend and event emitter (via gogload-download)
//! - The download supervisor
//!
//! Command handlers receive the composed context and delegate work to it.

use std::path::PathBuf;
use std::sync::Arc;

use gogload_core::{
    DownloadEventEmitterPort, EngineConfig, StoragePort, StoredUrlResolver, UrlResolverPort,
    database_path, default_download_dir,
};
use gogload_db::{CoreFactory, setup_database};
use gogload_download::{
    BroadcastEmitter, DownloadSupervisor, HttpBackend, LocalStorage, ReqwestBackend,
    SupervisorDeps, build_supervisor,
};

use crate::error::CliError;
use crate::parser::Cli;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Database holding download state.
    pub db_path: PathBuf,
    /// Root directory for downloaded files.
    pub download_dir: PathBuf,
    /// Engine tuning.
    pub engine: EngineConfig,
}

impl CliConfig {
    /// Create config with default paths and engine settings.
    pub fn with_defaults() -> Result<Self, CliError> {
        Ok(Self {
            db_path: database_path()?,
            download_dir: default_download_dir()?,
            engine: EngineConfig::default(),
        })
    }

    /// Defaults overridden by global command-line flags.
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        Self::with_defaults()?.with_overrides(cli)
    }

    /// Apply the global flags on top of this config and validate the result.
    pub fn with_overrides(self, cli: &Cli) -> Result<Self, CliError> {
        let mut config = self;
        if let Some(db) = &cli.db {
            config.db_path.clone_from(db);
        }
        if let Some(dest) = &cli.dest {
            config.download_dir.clone_from(dest);
        }
        if let Some(segments) = cli.segments {
            config.engine = config.engine.with_segment_count(segments);
        }
        if let Some(workers) = cli.workers {
            config.engine = config.engine.with_max_workers(workers);
        }
        config.engine.validate()?;
        Ok(config)
    }
}

/// Fully composed application context for CLI commands.
pub struct CliContext {
    /// Owner of every download and batch.
    pub supervisor: Arc<DownloadSupervisor>,
    /// Event fan-out the progress display subscribes to.
    pub events: Arc<BroadcastEmitter>,
    /// Where files are written.
    pub download_dir: PathBuf,
}

impl CliContext {
    /// Access the supervisor.
    pub const fn supervisor(&self) -> &Arc<DownloadSupervisor> {
        &self.supervisor
    }
}

/// Bootstrap the CLI application.
///
/// This is the composition root. It:
/// 1. Opens the database and builds the stores
/// 2. Creates the download folder storage and the HTTP backend
/// 3. Creates the event emitter
/// 4. Builds the supervisor with injected ports
pub async fn bootstrap(config: CliConfig) -> Result<CliContext, CliError> {
    // 1. Create database pool with full schema setup
    let pool = setup_database(&config.db_path)
        .await
        .map_err(|e: anyhow::Error| CliError::Database(format!("{e:#}")))?;
    let stores = CoreFactory::build_stores(pool);

    // 2. Destination and transport
    tokio::fs::create_dir_all(&config.download_dir).await?;
    let storage: Arc<dyn StoragePort> = Arc::new(LocalStorage::new(&config.download_dir));
    let http: Arc<dyn HttpBackend> = Arc::new(ReqwestBackend::new(&config.engine)?);

    // 3. Events
    let events = Arc::new(BroadcastEmitter::new(config.engine.event_capacity));
    let emitter: Arc<dyn DownloadEventEmitterPort> = events.clone();

    // 4. The user supplies URLs directly, so stored URLs are used as-is
    let resolver: Arc<dyn UrlResolverPort> = Arc::new(StoredUrlResolver);
    let supervisor = build_supervisor(SupervisorDeps {
        stores,
        storage,
        http,
        resolver,
        emitter,
        config: config.engine,
    })?;

    tracing::debug!(
        db = %config.db_path.display(),
        dest = %config.download_dir.display(),
        "bootstrapped download supervisor"
    );

    Ok(CliContext {
        supervisor,
        events,
        download_dir: config.download_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[tokio::test]
    async fn bootstrap_creates_database_and_download_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig {
            db_path: dir.path().join("state/gogload.db"),
            download_dir: dir.path().join("games"),
            engine: EngineConfig::default(),
        };

        let ctx = bootstrap(config).await.unwrap();
        assert!(dir.path().join("state/gogload.db").exists());
        assert!(ctx.download_dir.is_dir());
        assert!(ctx.supervisor().active_jobs().await.is_empty());
    }

    fn base(dir: &std::path::Path) -> CliConfig {
        CliConfig {
            db_path: dir.join("default.db"),
            download_dir: dir.join("games"),
            engine: EngineConfig::default(),
        }
    }

    #[test]
    fn flags_override_engine_settings() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("x.db");
        let cli = Cli::parse_from([
            "gogload",
            "--db",
            db.to_str().unwrap(),
            "--segments",
            "2",
            "--workers",
            "5",
            "status",
        ]);
        let config = base(dir.path()).with_overrides(&cli).unwrap();
        assert_eq!(config.db_path, db);
        assert_eq!(config.download_dir, dir.path().join("games"));
        assert_eq!(config.engine.segment_count, 2);
        assert_eq!(config.engine.max_workers, 5);
    }

    #[test]
    fn invalid_segment_count_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::parse_from(["gogload", "--segments", "0", "status"]);
        let err = base(dir.path()).with_overrides(&cli).unwrap_err();
        assert_eq!(err.exit_code(), 78);
    }
}
