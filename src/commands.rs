use std::io::Write as _;

use anyhow::Context as _;

use crate::api::{self, ApiClient, ChapterQuery};
use crate::cli::{ChapterUrlArgs, MarkersArgs, NavigateArgs};
use crate::config::ApiConfig;
use crate::markers::{MarkerManager, RefreshOutcome};
use crate::page::{PageMap, PageNavigator, PageSurface};

pub async fn navigate(api_base: Option<&str>, args: NavigateArgs) -> anyhow::Result<()> {
    let config = ApiConfig::resolve(api_base)?;
    let client = ApiClient::new(config)?;

    let mut navigator = PageNavigator::load(&client, PageSurface::default(), PageMap::ready())
        .await
        .context("load catalog")?;
    let route = navigator.handle_hash(&args.hash, &client).await;

    print_json(&navigator.snapshot(route))
}

pub fn markers(args: MarkersArgs) -> anyhow::Result<()> {
    let html = std::fs::read_to_string(&args.file)
        .with_context(|| format!("read chapter markup: {}", args.file.display()))?;

    let mut map = PageMap::ready();
    let mut manager = MarkerManager::new();
    let outcome = manager.refresh(&mut map, &html);
    if let RefreshOutcome::Placed { markers, .. } = outcome {
        tracing::info!(markers, file = %args.file.display(), "scanned chapter markup");
    }

    print_json(&map.snapshot())
}

pub fn chapter_url(api_base: Option<&str>, args: ChapterUrlArgs) -> anyhow::Result<()> {
    let config = ApiConfig::resolve(api_base)?;
    let query = ChapterQuery {
        book_id: args.book,
        chapter: args.chapter,
        verses: args.verses,
        jst: args.jst,
    };

    let url = api::chapter_url(&config.scriptures_url, &query);
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{url}").context("write chapter url")?;
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value).context("write json")?;
    writeln!(stdout).context("write newline")?;
    Ok(())
}
