//! Batch command handler: every file of a game install from a manifest.

use std::path::Path;

use serde::Deserialize;

use gogload_core::DownloadTarget;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::handlers::follow;

/// Manifest describing one game install.
#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub game_id: String,
    pub files: Vec<ManifestFile>,
}

/// One file of a manifest.
#[derive(Debug, Deserialize)]
pub struct ManifestFile {
    pub link_id: String,
    pub file_name: String,
    pub url: String,
    #[serde(default)]
    pub size: Option<u64>,
}

impl Manifest {
    /// Parse a manifest from JSON text.
    pub fn parse(json: &str) -> Result<Self, CliError> {
        serde_json::from_str(json)
            .map_err(|e| CliError::Arguments(format!("invalid manifest: {e}")))
    }

    /// Read and parse a manifest file.
    pub async fn load(path: &Path) -> Result<Self, CliError> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            CliError::Io(format!("cannot read manifest {}: {e}", path.display()))
        })?;
        Self::parse(&json)
    }

    /// Targets in manifest order.
    pub fn targets(&self) -> Vec<DownloadTarget> {
        self.files
            .iter()
            .map(|file| {
                let target = DownloadTarget::new(&self.game_id, &file.link_id, &file.file_name)
                    .with_url(&file.url);
                match file.size {
                    Some(size) => target.with_expected_size(size),
                    None => target,
                }
            })
            .collect()
    }
}

/// Execute the batch command and wait for it to finish.
pub async fn execute(ctx: &CliContext, manifest_path: &Path) -> Result<(), CliError> {
    let manifest = Manifest::load(manifest_path).await?;
    let targets = manifest.targets();
    let count = targets.len();

    let events = ctx.events.subscribe();
    let job = ctx.supervisor.start_batch(&manifest.game_id, targets).await?;
    println!("Started {job} ({count} file(s))");

    follow::execute(ctx, events, &[job]).await?;
    println!(
        "Saved to {}",
        ctx.download_dir.join(&manifest.game_id).display()
    );
    Ok(())
}
