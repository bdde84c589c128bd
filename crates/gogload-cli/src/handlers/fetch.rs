//! Fetch command handler: one standalone file.

use gogload_core::DownloadTarget;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::handlers::follow;

/// Arguments of `gogload fetch`.
#[derive(Debug, Clone)]
pub struct FetchArgs {
    pub game_id: String,
    pub link_id: String,
    pub url: String,
    pub file_name: Option<String>,
    pub size: Option<u64>,
}

impl FetchArgs {
    /// The target to hand to the supervisor.
    pub fn target(&self) -> Result<DownloadTarget, CliError> {
        let file_name = self
            .file_name
            .clone()
            .unwrap_or_else(|| file_name_from_url(&self.url, &self.link_id));
        if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name == ".." {
            return Err(CliError::Arguments(format!(
                "'{file_name}' is not a valid file name"
            )));
        }

        let mut target = DownloadTarget::new(&self.game_id, &self.link_id, file_name)
            .with_url(&self.url);
        if let Some(size) = self.size {
            target = target.with_expected_size(size);
        }
        Ok(target)
    }
}

/// Execute the fetch command and wait for it to finish.
pub async fn execute(ctx: &CliContext, args: &FetchArgs) -> Result<(), CliError> {
    let target = args.target()?;
    let destination = ctx.download_dir.join(target.destination_name());

    let events = ctx.events.subscribe();
    let job = ctx.supervisor.start_download(target).await?;
    println!("Started {job}");

    follow::execute(ctx, events, &[job]).await?;
    println!("Saved to {}", destination.display());
    Ok(())
}

/// Last path segment of `url` without query or fragment, or `fallback`.
pub fn file_name_from_url(url: &str, fallback: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let path = without_query
        .split_once("://")
        .map_or(without_query, |(_, rest)| rest);
    path.split_once('/')
        .and_then(|(_, path)| path.rsplit('/').next())
        .filter(|name| !name.is_empty() && *name != "..")
        .map_or_else(|| fallback.to_string(), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(url: &str, name: Option<&str>) -> FetchArgs {
        FetchArgs {
            game_id: "42".into(),
            link_id: "en1installer0".into(),
            url: url.into(),
            file_name: name.map(str::to_string),
            size: Some(10),
        }
    }

    #[test]
    fn file_name_comes_from_the_url_path() {
        assert_eq!(
            file_name_from_url("https://cdn.example/a/setup_game.exe?token=x#y", "link"),
            "setup_game.exe"
        );
        assert_eq!(file_name_from_url("https://cdn.example/", "link"), "link");
        assert_eq!(file_name_from_url("https://cdn.example", "link"), "link");
    }

    #[test]
    fn target_uses_explicit_name_and_size() {
        let target = args("https://cdn.example/x.bin", Some("game.bin")).target().unwrap();
        assert_eq!(target.file_name, "game.bin");
        assert_eq!(target.expected_size, Some(10));
        assert_eq!(target.url.as_deref(), Some("https://cdn.example/x.bin"));
        assert_eq!(target.destination_name(), "42/game.bin");
    }

    #[test]
    fn path_like_names_are_rejected() {
        let err = args("https://cdn.example/x.bin", Some("../evil"))
            .target()
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
