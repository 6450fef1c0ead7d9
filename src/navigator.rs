use tokio_util::sync::CancellationToken;

use crate::api::{ApiClient, ChapterQuery, ChapterSource};
use crate::catalog::{Book, Catalog};
use crate::html;
use crate::markers::{self, Backoff, LocationRef, MapSurface, MarkerManager, RefreshOutcome};
use crate::navigation::{self, Route};
use crate::transition::{Chrome, Direction, Surface, TransitionEngine, TransitionOutcome};

/// A chapter whose text still has to be fetched. Hand it back to
/// [`Navigator::complete_chapter`] together with the markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterRequest {
    sequence: u64,
    route: Route,
    pub query: ChapterQuery,
    chrome: Chrome,
}

impl ChapterRequest {
    pub fn route(&self) -> Route {
        self.route
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Rendered(Route),
    ChapterPending(ChapterRequest),
}

/// One browsing session: the catalog, the two panes, and the map markers.
pub struct Navigator<S: Surface, M: MapSurface> {
    catalog: Catalog,
    surface: S,
    map: M,
    transitions: TransitionEngine,
    markers: MarkerManager<M>,
    backoff: Backoff,
    sequence: u64,
    on_screen_content: String,
    markers_pending: bool,
    marker_retry: CancellationToken,
}

impl<S: Surface, M: MapSurface> Navigator<S, M> {
    pub fn new(catalog: Catalog, surface: S, map: M) -> Self {
        Self {
            catalog,
            surface,
            map,
            transitions: TransitionEngine::new(),
            markers: MarkerManager::new(),
            backoff: Backoff::default(),
            sequence: 0,
            on_screen_content: String::new(),
            markers_pending: false,
            marker_retry: CancellationToken::new(),
        }
    }

    /// Loads the catalog from the API and starts a session on top of it.
    pub async fn load(client: &ApiClient, surface: S, map: M) -> anyhow::Result<Self> {
        let catalog = client.load_catalog().await?;
        Ok(Self::new(catalog, surface, map))
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Drops markers, pending chapter requests and any armed direction. The
    /// panes keep their content, so the next transition still writes into the
    /// one that is off screen.
    pub fn reset(&mut self) {
        self.marker_retry.cancel();
        self.marker_retry = CancellationToken::new();
        self.markers.clear(&mut self.map);
        self.markers_pending = false;
        self.transitions.reset_direction();
        self.sequence += 1;
        self.on_screen_content.clear();
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn markers(&self) -> &MarkerManager<M> {
        &self.markers
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Token that stops the marker retry loop currently waiting for the map.
    /// The next transition cancels it.
    pub fn marker_retry_token(&self) -> CancellationToken {
        self.marker_retry.clone()
    }

    /// Whether the last transition found the map unloaded and its markers
    /// are still to be placed.
    pub fn markers_pending(&self) -> bool {
        self.markers_pending
    }

    /// Arms `direction` for the next transition and returns the hash to
    /// navigate to.
    pub fn change_hash(
        &mut self,
        volume_id: Option<i64>,
        book_id: Option<i64>,
        chapter: Option<i64>,
        direction: Direction,
    ) -> String {
        self.transitions.set_direction(direction);
        navigation::hash_for(volume_id, book_id, chapter)
    }

    /// Renders the target of `hash`. Chapters need their text first, so they
    /// come back as a pending request. Markers are rebuilt as part of every
    /// transition; see [`Navigator::markers_pending`] for an unloaded map.
    pub fn on_hash_changed(&mut self, hash: &str) -> Navigation {
        self.sequence += 1;
        let route = Route::resolve(hash, &self.catalog);

        match route {
            Route::Home => self.show_volumes(None),
            Route::Volume { volume_id } => self.show_volumes(Some(volume_id)),
            Route::Book { book_id } => match self.catalog.book(book_id).cloned() {
                Some(book) => self.show_book(&book),
                None => self.show_volumes(None),
            },
            Route::Chapter { book_id, chapter } => {
                if let Some(request) = self.request_chapter(route, book_id, chapter) {
                    return Navigation::ChapterPending(request);
                }
                self.show_volumes(None);
            }
        }

        Navigation::Rendered(route)
    }

    fn show_volumes(&mut self, only: Option<u32>) {
        let content = html::navigator_div(&html::volumes_grid(self.catalog.volumes(), only));
        let volume = only.and_then(|id| self.catalog.volume(id));
        let chrome = Chrome {
            breadcrumbs: html::breadcrumbs(volume, None, None),
            next_previous: String::new(),
        };
        self.transition(&content, &chrome);
    }

    fn show_book(&mut self, book: &Book) {
        let content = html::navigator_div(&html::chapters_grid(book));
        let chrome = Chrome {
            breadcrumbs: html::breadcrumbs(self.catalog.volume_for_book(book), Some(book), None),
            next_previous: String::new(),
        };
        self.transition(&content, &chrome);
    }

    fn request_chapter(&self, route: Route, book_id: u32, chapter: u32) -> Option<ChapterRequest> {
        let book = self.catalog.book(book_id)?;
        let volume = self.catalog.volume_for_book(book);

        let mut next_previous = String::new();
        if let Some(previous) = self.catalog.previous_chapter(book_id, chapter) {
            next_previous.push_str(&html::next_previous_markup(&previous, Direction::Backward));
        }
        if let Some(next) = self.catalog.next_chapter(book_id, chapter) {
            next_previous.push_str(&html::next_previous_markup(&next, Direction::Forward));
        }

        Some(ChapterRequest {
            sequence: self.sequence,
            route,
            query: ChapterQuery::new(book_id, chapter),
            chrome: Chrome {
                breadcrumbs: html::breadcrumbs(volume, Some(book), Some(chapter)),
                next_previous,
            },
        })
    }

    /// Shows the fetched chapter text and rebuilds its markers. Responses to
    /// requests that a later navigation superseded are dropped.
    pub fn complete_chapter(
        &mut self,
        request: ChapterRequest,
        chapter_html: &str,
    ) -> Option<TransitionOutcome> {
        if request.sequence != self.sequence {
            tracing::debug!(
                book_id = request.query.book_id,
                chapter = request.query.chapter,
                "dropping superseded chapter response"
            );
            return None;
        }
        Some(self.transition(chapter_html, &request.chrome))
    }

    fn transition(&mut self, content: &str, chrome: &Chrome) -> TransitionOutcome {
        let outcome = self
            .transitions
            .transition(&mut self.surface, content, chrome);
        self.on_screen_content = content.to_string();

        self.marker_retry.cancel();
        self.marker_retry = CancellationToken::new();
        self.markers_pending = false;
        self.refresh_markers();
        outcome
    }

    /// Rebuilds the markers for the on-screen pane. Leaves them pending when
    /// the map has not loaded yet.
    pub fn refresh_markers(&mut self) -> RefreshOutcome {
        let outcome = self.markers.refresh(&mut self.map, &self.on_screen_content);
        self.markers_pending = outcome == RefreshOutcome::NotReady;
        outcome
    }

    /// Waits for the map to load and places any pending markers. Returns
    /// `None` when nothing was pending.
    pub async fn await_markers(&mut self) -> Option<RefreshOutcome> {
        if !self.markers_pending {
            return None;
        }

        let cancel = self.marker_retry.clone();
        let outcome = self
            .markers
            .refresh_when_ready(&mut self.map, &self.on_screen_content, self.backoff, &cancel)
            .await;
        self.markers_pending = false;
        Some(outcome)
    }

    /// Full hash-change handling: render, fetch chapter text when needed,
    /// then wait for the map if markers are pending. Failures are logged and
    /// leave the page as is.
    pub async fn handle_hash<C>(&mut self, hash: &str, source: &C) -> Route
    where
        C: ChapterSource + ?Sized,
    {
        let route = match self.on_hash_changed(hash) {
            Navigation::Rendered(route) => route,
            Navigation::ChapterPending(request) => {
                let route = request.route();
                match fetch_chapter(source, &request).await {
                    Some(chapter_html) => {
                        self.complete_chapter(request, &chapter_html);
                    }
                    None => return route,
                }
                route
            }
        };

        let outcome = self.await_markers().await;
        tracing::debug!(?route, ?outcome, "navigation finished");
        route
    }

    /// Map-click handler for a `showLocation(...)` call.
    pub fn show_location(&mut self, call: &str) -> Option<LocationRef> {
        let location = markers::show_location(&mut self.map, call);
        if location.is_none() {
            tracing::debug!(call, "ignoring malformed location call");
        }
        location
    }

    /// Map-click handler for a location the browser already split into its
    /// arguments.
    pub fn focus_location(&mut self, location: &LocationRef) {
        markers::focus_location(&mut self.map, location);
    }
}

/// Fetches the text for `request`, logging failures.
pub async fn fetch_chapter<C>(source: &C, request: &ChapterRequest) -> Option<String>
where
    C: ChapterSource + ?Sized,
{
    match source.fetch_chapter(&request.query).await {
        Ok(chapter_html) => Some(chapter_html),
        Err(err) => {
            tracing::error!(
                book_id = request.query.book_id,
                chapter = request.query.chapter,
                "unable to retrieve chapter: {err:#}"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::catalog::fixtures;
    use crate::page::{PageMap, PageSurface};
    use crate::transition::{PaneId, Reveal};

    struct StubChapters {
        requests: Mutex<Vec<ChapterQuery>>,
        fail: bool,
    }

    impl StubChapters {
        fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl ChapterSource for StubChapters {
        async fn fetch_chapter(&self, query: &ChapterQuery) -> anyhow::Result<String> {
            self.requests.lock().unwrap().push(query.clone());
            if self.fail {
                anyhow::bail!("chapter service unavailable");
            }
            Ok(format!(
                r#"<div class="chapter">book {} chapter {} <a onclick="showLocation(1,'Egypt',26.0,30.0,26.0,30.0,0,0,4500,0,'')">Egypt</a></div>"#,
                query.book_id, query.chapter
            ))
        }
    }

    fn navigator() -> Navigator<PageSurface, PageMap> {
        Navigator::new(fixtures::catalog(), PageSurface::default(), PageMap::ready())
    }

    #[tokio::test]
    async fn home_renders_all_volumes() {
        let mut navigator = navigator();
        let route = navigator.handle_hash("", &StubChapters::new()).await;
        assert_eq!(route, Route::Home);

        let view = navigator.surface().snapshot();
        assert_eq!(view.on_screen, Some(PaneId::Second));
        assert!(view.content.starts_with(r#"<div id="scripnav">"#));
        assert!(view.content.contains("Old Testament"));
        assert!(view.content.contains("New Testament"));
        assert_eq!(view.breadcrumbs, "<ul><li>The Scriptures</li></ul>");
        assert_eq!(view.reveal, Some(Reveal::CrossFade));
    }

    #[tokio::test]
    async fn book_renders_chapter_grid() {
        let mut navigator = navigator();
        navigator.handle_hash("#1:2", &StubChapters::new()).await;

        let view = navigator.surface().snapshot();
        assert!(view.content.contains(r##"href="#0:2:40""##));
        assert!(view.breadcrumbs.ends_with("<li>Exodus</li></ul>"));
        assert_eq!(view.next_previous, "");
    }

    #[tokio::test]
    async fn chapter_renders_text_breadcrumbs_controls_and_markers() {
        let mut navigator = navigator();
        let chapters = StubChapters::new();
        let route = navigator.handle_hash("#1:2:3", &chapters).await;
        assert_eq!(
            route,
            Route::Chapter {
                book_id: 2,
                chapter: 3
            }
        );

        let view = navigator.surface().snapshot();
        assert!(view.content.contains("book 2 chapter 3"));
        assert_eq!(view.breadcrumbs.matches("<a ").count(), 3);
        assert!(view.breadcrumbs.ends_with("<li>3</li></ul>"));
        assert!(view.next_previous.contains("changeHash(0, 2, 2, 1)"));
        assert!(view.next_previous.contains("changeHash(0, 2, 4, 0)"));

        let map = navigator.map().snapshot();
        assert_eq!(map.markers.len(), 1);
        assert_eq!(map.zoom, Some(10));
        assert_eq!(
            chapters.requests.lock().unwrap().as_slice(),
            &[ChapterQuery::new(2, 3)]
        );
    }

    #[tokio::test]
    async fn single_chapter_book_skips_the_grid() {
        let mut navigator = navigator();
        let chapters = StubChapters::new();
        navigator.handle_hash("#2:5", &chapters).await;
        assert_eq!(
            chapters.requests.lock().unwrap().as_slice(),
            &[ChapterQuery::new(5, 1)]
        );
    }

    #[tokio::test]
    async fn last_chapter_of_last_book_has_no_next_control() {
        let mut navigator = navigator();
        navigator.handle_hash("#2:6:22", &StubChapters::new()).await;
        let view = navigator.surface().snapshot();
        assert!(view.next_previous.contains(html::ICON_PREVIOUS));
        assert!(!view.next_previous.contains(html::ICON_NEXT));
    }

    #[tokio::test]
    async fn invalid_chapter_falls_back_home() {
        let mut navigator = navigator();
        let chapters = StubChapters::new();
        let route = navigator.handle_hash("#1:2:99", &chapters).await;
        assert_eq!(route, Route::Home);
        assert!(chapters.requests.lock().unwrap().is_empty());
        assert!(navigator.surface().snapshot().content.contains("New Testament"));
    }

    #[tokio::test]
    async fn failed_chapter_fetch_leaves_page_unchanged() {
        let mut navigator = navigator();
        navigator.handle_hash("#1", &StubChapters::new()).await;
        let before = navigator.surface().snapshot();

        let chapters = StubChapters {
            requests: Mutex::new(Vec::new()),
            fail: true,
        };
        navigator.handle_hash("#1:2:3", &chapters).await;
        assert_eq!(navigator.surface().snapshot(), before);
    }

    #[tokio::test]
    async fn change_hash_direction_selects_slide() {
        let mut navigator = navigator();
        let chapters = StubChapters::new();
        navigator.handle_hash("#1:2:3", &chapters).await;

        let hash = navigator.change_hash(Some(0), Some(2), Some(4), Direction::Forward);
        assert_eq!(hash, "#0:2:4");
        navigator.handle_hash(&hash, &chapters).await;
        assert_eq!(navigator.surface().snapshot().reveal, Some(Reveal::SlideLeft));

        let hash = navigator.change_hash(Some(0), Some(2), Some(3), Direction::Backward);
        navigator.handle_hash(&hash, &chapters).await;
        assert_eq!(navigator.surface().snapshot().reveal, Some(Reveal::SlideRight));

        navigator.handle_hash("#1", &chapters).await;
        assert_eq!(navigator.surface().snapshot().reveal, Some(Reveal::CrossFade));
    }

    #[test]
    fn superseded_chapter_response_is_dropped() {
        let mut navigator = navigator();
        let Navigation::ChapterPending(first) = navigator.on_hash_changed("#1:1:1") else {
            panic!("expected a pending chapter");
        };
        let Navigation::ChapterPending(second) = navigator.on_hash_changed("#1:1:2") else {
            panic!("expected a pending chapter");
        };

        assert!(navigator.complete_chapter(first, "<p>stale</p>").is_none());
        assert!(navigator.complete_chapter(second, "<p>fresh</p>").is_some());
        assert_eq!(navigator.surface().snapshot().content, "<p>fresh</p>");
    }

    #[tokio::test]
    async fn grid_pages_clear_chapter_markers() {
        let mut navigator = navigator();
        let chapters = StubChapters::new();
        navigator.handle_hash("#1:2:3", &chapters).await;
        assert_eq!(navigator.markers().len(), 1);

        navigator.handle_hash("", &chapters).await;
        assert!(navigator.markers().is_empty());
        assert!(navigator.map().snapshot().markers.is_empty());
    }

    #[tokio::test]
    async fn reset_clears_markers_and_pending_requests() {
        let mut navigator = navigator();
        navigator.handle_hash("#1:2:3", &StubChapters::new()).await;

        let Navigation::ChapterPending(request) = navigator.on_hash_changed("#1:2:4") else {
            panic!("expected a pending chapter");
        };
        navigator.reset();
        assert!(navigator.markers().is_empty());
        assert!(navigator.complete_chapter(request, "<p>late</p>").is_none());
    }

    #[tokio::test]
    async fn reset_keeps_transitions_writing_off_screen() {
        let mut navigator = navigator();
        let chapters = StubChapters::new();
        navigator.handle_hash("#1", &chapters).await;
        let before = navigator.surface().snapshot().on_screen;

        navigator.change_hash(Some(1), Some(2), None, Direction::Forward);
        navigator.reset();
        navigator.handle_hash("#2", &chapters).await;

        let view = navigator.surface().snapshot();
        assert_eq!(before, Some(PaneId::Second));
        assert_eq!(view.on_screen, Some(PaneId::First));
        assert!(view.content.contains("New Testament"));
        assert_eq!(view.reveal, Some(Reveal::CrossFade));
    }

    #[test]
    fn two_step_navigation_places_markers() {
        let mut navigator = navigator();
        let Navigation::ChapterPending(request) = navigator.on_hash_changed("#1:2:3") else {
            panic!("expected a pending chapter");
        };
        let markup = r#"<a onclick="showLocation(4,'Sinai',28.54,33.97,28.54,33.97,0,0,4500,0,'')">Sinai</a>"#;
        navigator.complete_chapter(request, markup).unwrap();

        assert!(!navigator.markers_pending());
        assert_eq!(navigator.markers().len(), 1);
        assert_eq!(navigator.map().snapshot().markers[0].title, "Sinai");

        navigator.on_hash_changed("#1");
        assert!(navigator.markers().is_empty());
    }

    #[tokio::test]
    async fn markers_wait_for_the_map_to_load() {
        let mut navigator = Navigator::new(
            fixtures::catalog(),
            PageSurface::default(),
            PageMap::default(),
        )
        .with_backoff(Backoff::new(
            std::time::Duration::from_millis(5),
            std::time::Duration::from_secs(10),
        ));
        let readiness = navigator.map().readiness();

        let Navigation::ChapterPending(request) = navigator.on_hash_changed("#1:2:3") else {
            panic!("expected a pending chapter");
        };
        let markup = r#"<a onclick="showLocation(4,'Sinai',28.54,33.97,28.54,33.97,0,0,4500,0,'')">Sinai</a>"#;
        navigator.complete_chapter(request, markup).unwrap();
        assert!(navigator.markers_pending());
        assert!(navigator.markers().is_empty());

        readiness.mark_ready();
        let outcome = navigator.await_markers().await;
        assert!(matches!(outcome, Some(RefreshOutcome::Placed { markers: 1, .. })));
        assert!(!navigator.markers_pending());
        assert_eq!(navigator.await_markers().await, None);
    }

    #[tokio::test]
    async fn markers_abandoned_when_map_never_loads() {
        let mut navigator = Navigator::new(
            fixtures::catalog(),
            PageSurface::default(),
            PageMap::default(),
        )
        .with_backoff(Backoff::new(
            std::time::Duration::from_millis(1),
            std::time::Duration::from_millis(4),
        ));
        navigator.handle_hash("#1:2:3", &StubChapters::new()).await;
        assert!(navigator.markers().is_empty());
        assert!(navigator.surface().snapshot().content.contains("chapter 3"));
    }

    #[test]
    fn show_location_moves_the_map() {
        let mut navigator = navigator();
        let location = navigator
            .show_location("showLocation(9,'Ur',30.96,46.10,30.96,46.10,0,0,2700,0,'')")
            .unwrap();
        assert_eq!(location.place_name, "Ur");
        assert_eq!(navigator.map().snapshot().zoom, Some(6));
        assert!(navigator.show_location("alert(1)").is_none());
    }
}
