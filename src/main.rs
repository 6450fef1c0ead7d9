use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    scripnav::logging::init(scripnav::logging::CLI_DEFAULT_FILTER).context("init logging")?;

    let cli = scripnav::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");
    let api_base = cli.api_base.as_deref();

    match cli.command {
        scripnav::cli::Command::Navigate(args) => {
            scripnav::commands::navigate(api_base, args)
                .await
                .context("navigate")?;
        }
        scripnav::cli::Command::Markers(args) => {
            scripnav::commands::markers(args).context("markers")?;
        }
        scripnav::cli::Command::ChapterUrl(args) => {
            scripnav::commands::chapter_url(api_base, args).context("chapter-url")?;
        }
    }

    Ok(())
}
