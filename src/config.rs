use std::time::Duration;

use anyhow::Context as _;
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://scriptures.byu.edu/mapscrip";
pub const API_BASE_ENV: &str = "SCRIPNAV_API_BASE";

pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
pub const USER_AGENT: &str = "scripnav/0.1";

/// Length of every pane reveal animation.
pub const ANIMATION_DURATION: Duration = Duration::from_millis(700);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub books_url: Url,
    pub volumes_url: Url,
    pub scriptures_url: Url,
}

impl ApiConfig {
    /// Endpoints laid out under `base` the way the hosted API does it.
    pub fn from_base(base: &str) -> anyhow::Result<Self> {
        let base = base.trim().trim_end_matches('/');
        if base.is_empty() {
            anyhow::bail!("api base url must not be empty");
        }

        let join = |path: &str| -> anyhow::Result<Url> {
            let raw = format!("{base}/{path}");
            let url = Url::parse(&raw).with_context(|| format!("parse api url: {raw}"))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                anyhow::bail!("api url must be http/https: {url}");
            }
            Ok(url)
        };

        Ok(Self {
            books_url: join("model/books.php")?,
            volumes_url: join("model/volumes.php")?,
            scriptures_url: join("mapgetscrip.php")?,
        })
    }

    /// Resolves the base from an explicit value, then `SCRIPNAV_API_BASE`,
    /// then the public endpoint.
    pub fn resolve(explicit_base: Option<&str>) -> anyhow::Result<Self> {
        if let Some(base) = explicit_base {
            return Self::from_base(base).context("--api-base");
        }

        let from_env = std::env::var(API_BASE_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        match from_env {
            Some(base) => Self::from_base(&base).with_context(|| format!("invalid {API_BASE_ENV}")),
            None => Self::from_base(DEFAULT_API_BASE),
        }
    }
}
