//! HTTP host for a browsing session.
//!
//! The browser keeps the location hash; every hash change is forwarded to
//! `/api/navigate` and the returned snapshot is drawn as is.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::api::{ApiClient, ChapterSource};
use crate::markers::{self, LocationRef, MapWait};
use crate::navigator::{Navigation, fetch_chapter};
use crate::page::{MapView, PageMap, PageNavigator, PageSurface};
use crate::transition::Direction;

#[derive(Clone)]
pub struct AppState {
    chapters: Arc<dyn ChapterSource>,
    navigator: Arc<Mutex<Option<PageNavigator>>>,
}

impl AppState {
    pub fn new(chapters: Arc<dyn ChapterSource>) -> Self {
        Self {
            chapters,
            navigator: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn install(&self, navigator: PageNavigator) {
        *self.navigator.lock().await = Some(navigator);
    }

    /// Loads the catalog and installs a fresh session. On failure the error
    /// is logged and the host keeps answering 503.
    pub async fn load(&self, client: &ApiClient) {
        match PageNavigator::load(client, PageSurface::default(), PageMap::ready()).await {
            Ok(navigator) => {
                self.install(navigator).await;
                tracing::info!("catalog ready");
            }
            Err(err) => tracing::error!("unable to load catalog: {err:#}"),
        }
    }

    /// Places markers the last transition left pending, polling the map's
    /// readiness flag without holding the session.
    async fn settle_markers(&self) {
        let (readiness, backoff, cancel) = {
            let guard = self.navigator.lock().await;
            match guard.as_ref() {
                Some(navigator) if navigator.markers_pending() => (
                    navigator.map().readiness(),
                    navigator.backoff(),
                    navigator.marker_retry_token(),
                ),
                _ => return,
            }
        };

        let wait = markers::wait_for_map(|| readiness.is_ready(), backoff, &cancel).await;
        if wait != MapWait::Ready {
            tracing::debug!(?wait, "markers not placed");
            return;
        }

        let mut guard = self.navigator.lock().await;
        if let Some(navigator) = guard.as_mut() {
            if !cancel.is_cancelled() && navigator.markers_pending() {
                let outcome = navigator.refresh_markers();
                tracing::debug!(?outcome, "pending markers placed");
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { Html(PAGE_SHELL) }))
        .route("/healthz", get(|| async { "ok\n" }))
        .route("/api/navigate", get(navigate))
        .route("/api/change-hash", post(change_hash))
        .route("/api/show-location", get(show_location))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn not_loaded() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "catalog is not loaded\n").into_response()
}

#[derive(Debug, Deserialize)]
struct NavigateQuery {
    #[serde(default)]
    hash: String,
}

/// Handles one hash change. The session lock is released while the chapter
/// text is fetched and while markers wait for the map, so other requests keep
/// flowing and a later navigation supersedes this one.
async fn navigate(State(state): State<AppState>, Query(query): Query<NavigateQuery>) -> Response {
    let navigation = {
        let mut guard = state.navigator.lock().await;
        let Some(navigator) = guard.as_mut() else {
            return not_loaded();
        };
        navigator.on_hash_changed(&query.hash)
    };

    let route = match navigation {
        Navigation::Rendered(route) => route,
        Navigation::ChapterPending(request) => {
            let route = request.route();
            if let Some(chapter_html) = fetch_chapter(state.chapters.as_ref(), &request).await {
                let mut guard = state.navigator.lock().await;
                let Some(navigator) = guard.as_mut() else {
                    return not_loaded();
                };
                navigator.complete_chapter(request, &chapter_html);
            }
            route
        }
    };

    state.settle_markers().await;

    let guard = state.navigator.lock().await;
    let Some(navigator) = guard.as_ref() else {
        return not_loaded();
    };
    Json(navigator.snapshot(route)).into_response()
}

#[derive(Debug, Deserialize)]
struct ChangeHashRequest {
    volume: Option<i64>,
    book: Option<i64>,
    chapter: Option<i64>,
    direction: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChangeHashResponse {
    hash: String,
}

async fn change_hash(
    State(state): State<AppState>,
    Json(request): Json<ChangeHashRequest>,
) -> Response {
    let mut guard = state.navigator.lock().await;
    let Some(navigator) = guard.as_mut() else {
        return not_loaded();
    };

    let hash = navigator.change_hash(
        request.volume,
        request.book,
        request.chapter,
        Direction::from_flag(request.direction),
    );
    Json(ChangeHashResponse { hash }).into_response()
}

/// Either the raw `showLocation(...)` call text or its arguments as a JSON
/// array.
#[derive(Debug, Deserialize)]
struct ShowLocationQuery {
    call: Option<String>,
    args: Option<String>,
}

#[derive(Debug, Serialize)]
struct ShowLocationResponse {
    location: LocationRef,
    map: MapView,
}

async fn show_location(
    State(state): State<AppState>,
    Query(query): Query<ShowLocationQuery>,
) -> Response {
    let mut guard = state.navigator.lock().await;
    let Some(navigator) = guard.as_mut() else {
        return not_loaded();
    };

    let location = match (query.args, query.call) {
        (Some(args), _) => serde_json::from_str::<Vec<serde_json::Value>>(&args)
            .ok()
            .and_then(|args| LocationRef::from_args(&args))
            .inspect(|location| navigator.focus_location(location)),
        (None, Some(call)) => navigator.show_location(&call),
        (None, None) => None,
    };

    match location {
        Some(location) => Json(ShowLocationResponse {
            location,
            map: navigator.map().snapshot(),
        })
        .into_response(),
        None => (StatusCode::BAD_REQUEST, "unrecognized location call\n").into_response(),
    }
}

const PAGE_SHELL: &str = r#"<!doctype html>
<html>
  <head>
    <meta charset="utf-8">
    <title>The Scriptures, Mapped</title>
    <style>
      #scriptures { position: relative; overflow: hidden; }
      #scripdiv1, #scripdiv2 { position: absolute; top: 0; left: 0; width: 100%; }
    </style>
  </head>
  <body>
    <div id="crumbs"></div>
    <div class="navheading"></div>
    <div id="scriptures"><div id="scripdiv1"></div><div id="scripdiv2"></div></div>
    <pre id="map"></pre>
    <script>
      async function onHashChanged() {
        const hash = encodeURIComponent(location.hash);
        const response = await fetch(`/api/navigate?hash=${hash}`);
        if (!response.ok) { console.log("Error:", response.status); return; }
        const view = await response.json();
        const pane = view.page.on_screen;
        if (!pane) { return; }
        document.getElementById(pane).innerHTML = view.page.content;
        document.getElementById(pane).style.zIndex = 1;
        document.getElementById(pane === "scripdiv1" ? "scripdiv2" : "scripdiv1").style.zIndex = 0;
        document.getElementById("crumbs").innerHTML = view.page.breadcrumbs;
        document.querySelector(".navheading").innerHTML = view.page.next_previous;
        document.getElementById("map").textContent = JSON.stringify(view.map, null, 2);
      }
      async function changeHash(volume, book, chapter, direction) {
        const response = await fetch("/api/change-hash", {
          method: "POST",
          headers: { "content-type": "application/json" },
          body: JSON.stringify({ volume, book, chapter, direction }),
        });
        if (response.ok) { location.hash = (await response.json()).hash; }
      }
      async function showLocation() {
        const args = encodeURIComponent(JSON.stringify(Array.from(arguments)));
        const response = await fetch(`/api/show-location?args=${args}`);
        if (response.ok) { document.getElementById("map").textContent = JSON.stringify((await response.json()).map, null, 2); }
      }
      window.addEventListener("hashchange", onHashChanged);
      onHashChanged();
    </script>
  </body>
</html>
"#;
