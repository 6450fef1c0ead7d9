use std::collections::BTreeMap;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use url::Url;

use crate::catalog::{Book, BookId, Catalog, Volume};
use crate::config::{self, ApiConfig};

/// Parameters of a chapter text request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterQuery {
    pub book_id: BookId,
    pub chapter: u32,
    pub verses: Option<String>,
    pub jst: bool,
}

impl ChapterQuery {
    pub fn new(book_id: BookId, chapter: u32) -> Self {
        Self {
            book_id,
            chapter,
            verses: None,
            jst: false,
        }
    }
}

/// Anything that can produce the rendered markup of a chapter.
#[async_trait]
pub trait ChapterSource: Send + Sync {
    async fn fetch_chapter(&self, query: &ChapterQuery) -> anyhow::Result<String>;
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    config: ApiConfig,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config::HTTP_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build api http client")?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Fetches both tables concurrently and builds the catalog once both
    /// have arrived, whichever finishes first.
    pub async fn load_catalog(&self) -> anyhow::Result<Catalog> {
        let (books, volumes) = tokio::try_join!(self.fetch_books(), self.fetch_volumes())?;
        tracing::info!(
            books = books.len(),
            volumes = volumes.len(),
            "catalog tables loaded"
        );
        Catalog::from_parts(books, volumes).context("cache books into volumes")
    }

    pub async fn fetch_books(&self) -> anyhow::Result<BTreeMap<BookId, Book>> {
        let body = self.get_text(&self.config.books_url, "application/json").await?;
        serde_json::from_str(&body).context("parse books table")
    }

    pub async fn fetch_volumes(&self) -> anyhow::Result<Vec<Volume>> {
        let body = self
            .get_text(&self.config.volumes_url, "application/json")
            .await?;
        serde_json::from_str(&body).context("parse volumes table")
    }

    pub fn chapter_url(&self, query: &ChapterQuery) -> Url {
        chapter_url(&self.config.scriptures_url, query)
    }

    async fn get_text(&self, url: &Url, accept: &str) -> anyhow::Result<String> {
        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, config::USER_AGENT)
            .header(ACCEPT, accept)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("unable to retrieve required data from server: GET {url} ({status})");
        }

        response
            .text()
            .await
            .with_context(|| format!("read response body: {url}"))
    }
}

#[async_trait]
impl ChapterSource for ApiClient {
    async fn fetch_chapter(&self, query: &ChapterQuery) -> anyhow::Result<String> {
        let url = self.chapter_url(query);
        self.get_text(&url, "text/html,*/*;q=0.8")
            .await
            .context("fetch chapter text")
    }
}

/// `?book=B&chap=C&verses[=V][&jst=JST]`
pub fn chapter_url(scriptures_url: &Url, query: &ChapterQuery) -> Url {
    let mut url = scriptures_url.clone();
    let mut raw = format!("book={}&chap={}&verses", query.book_id, query.chapter);
    if let Some(verses) = query.verses.as_deref().filter(|v| !v.is_empty()) {
        raw.push('=');
        raw.push_str(verses);
    }
    if query.jst {
        raw.push_str("&jst=JST");
    }
    url.set_query(Some(&raw));
    url
}
