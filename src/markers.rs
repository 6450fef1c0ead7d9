//! Map markers for the places referenced in chapter markup.
//!
//! Chapter text carries inline links such as
//! `<a onclick="showLocation(12,'Jerusalem',31.77,35.23,31.77,35.23,0,0,5000,0,'')">`.
//! Every link becomes a marker plus a label on the map. Links that point at
//! the same coordinates share one marker whose title lists every place name.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub const COORDINATE_EPSILON: f64 = 1e-8;
pub const ZOOM_RATIO: f64 = 450.0;
pub const MIN_ZOOM_LEVEL: u8 = 6;
pub const MAX_ZOOM_LEVEL: u8 = 18;
pub const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(500);
pub const MAX_RETRY_DELAY: Duration = Duration::from_millis(5000);

/// Anchors whose `onclick` starts with `showLocation(`.
static LOCATION_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\bonclick\s*=\s*"(showLocation\([^"]*)""#).unwrap()
});

/// `(id,'name',lat,lon,viewLat,viewLon,tilt,roll,altitude,heading,'flag')`
static LOCATION_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\((.*),'(.*)',(.*),(.*),(.*),(.*),(.*),(.*),(.*),(.*),'(.*)'\)").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn approx_eq(&self, other: &LatLng) -> bool {
        (self.lat - other.lat).abs() < COORDINATE_EPSILON
            && (self.lng - other.lng).abs() < COORDINATE_EPSILON
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    pub fn around(position: LatLng) -> Self {
        Self {
            south: position.lat,
            west: position.lng,
            north: position.lat,
            east: position.lng,
        }
    }

    pub fn extend(&mut self, position: LatLng) {
        self.south = self.south.min(position.lat);
        self.north = self.north.max(position.lat);
        self.west = self.west.min(position.lng);
        self.east = self.east.max(position.lng);
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }
}

/// One parsed `showLocation(...)` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationRef {
    pub id: String,
    pub place_name: String,
    pub position: LatLng,
    pub view_altitude: Option<f64>,
    pub flag: String,
}

impl LocationRef {
    /// Parses the argument list of a `showLocation` call. Anything that does
    /// not fit the fixed grammar yields `None`.
    pub fn parse(call: &str) -> Option<Self> {
        let captures = LOCATION_CALL_RE.captures(call)?;
        let field = |index: usize| captures.get(index).map_or("", |m| m.as_str());
        let number = |index: usize| field(index).trim().parse::<f64>().ok();

        let (Some(lat), Some(lng)) = (number(3), number(4)) else {
            tracing::debug!(call, "location reference without usable coordinates");
            return None;
        };

        Some(Self {
            id: field(1).trim().to_string(),
            place_name: field(2).to_string(),
            position: LatLng::new(lat, lng),
            view_altitude: number(9),
            flag: field(11).to_string(),
        })
    }

    /// Builds a reference from the eleven `showLocation` arguments as the
    /// browser passed them. Quotes inside place names survive intact.
    pub fn from_args(args: &[Value]) -> Option<Self> {
        let [id, place_name, lat, lng, _, _, _, _, altitude, _, flag] = args else {
            return None;
        };
        let number = |value: &Value| {
            value
                .as_f64()
                .or_else(|| value.as_str()?.trim().parse::<f64>().ok())
        };
        let text = |value: &Value| match value {
            Value::String(text) => text.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };

        Some(Self {
            id: text(id),
            place_name: text(place_name),
            position: LatLng::new(number(lat)?, number(lng)?),
            view_altitude: number(altitude),
            flag: text(flag),
        })
    }

    /// Place name with the flag appended when present.
    pub fn display_name(&self) -> String {
        if self.flag.is_empty() {
            self.place_name.clone()
        } else {
            format!("{} {}", self.place_name, self.flag)
        }
    }

    pub fn zoom_level(&self) -> u8 {
        self.view_altitude.map_or(MIN_ZOOM_LEVEL, zoom_for_altitude)
    }
}

pub fn zoom_for_altitude(altitude: f64) -> u8 {
    let zoom = (altitude / ZOOM_RATIO).round();
    if zoom.is_nan() {
        return MIN_ZOOM_LEVEL;
    }
    zoom.clamp(f64::from(MIN_ZOOM_LEVEL), f64::from(MAX_ZOOM_LEVEL)) as u8
}

/// Every `showLocation` link in `html`, in document order. The inner value
/// is `None` for links whose call does not fit the grammar.
pub fn scan_location_links(html: &str) -> Vec<Option<LocationRef>> {
    LOCATION_LINK_RE
        .captures_iter(html)
        .filter_map(|captures| captures.get(1))
        .map(|call| LocationRef::parse(call.as_str()))
        .collect()
}

/// The map widget markers are drawn on.
pub trait MapSurface {
    type Marker;
    type Label;

    /// False until the widget has finished loading.
    fn is_ready(&self) -> bool;
    fn add_marker(&mut self, position: LatLng, title: &str) -> Self::Marker;
    fn add_label(&mut self, position: LatLng, text: &str) -> Self::Label;
    fn set_marker_title(&mut self, marker: &Self::Marker, title: &str);
    fn set_label_text(&mut self, label: &Self::Label, text: &str);
    fn remove_marker(&mut self, marker: Self::Marker);
    fn remove_label(&mut self, label: Self::Label);
    fn set_zoom(&mut self, zoom: u8);
    fn pan_to(&mut self, position: LatLng);
    fn fit_bounds(&mut self, bounds: Bounds);
}

pub struct MarkerRecord<M: MapSurface> {
    pub position: LatLng,
    pub title: String,
    marker: M::Marker,
    label: M::Label,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Viewport {
    Centered { center: LatLng, zoom: u8 },
    Fitted { bounds: Bounds },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RefreshOutcome {
    /// The map was not loaded yet; nothing was touched.
    NotReady,
    Placed {
        markers: usize,
        viewport: Option<Viewport>,
    },
    /// Gave up waiting for the map.
    Abandoned,
    Cancelled,
}

pub struct MarkerManager<M: MapSurface> {
    records: Vec<MarkerRecord<M>>,
}

impl<M: MapSurface> Default for MarkerManager<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: MapSurface> MarkerManager<M> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn records(&self) -> &[MarkerRecord<M>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn index_of(&self, position: &LatLng) -> Option<usize> {
        self.records
            .iter()
            .rposition(|record| record.position.approx_eq(position))
    }

    /// Adds a marker, or merges `name` into the marker already at `position`.
    pub fn add(&mut self, map: &mut M, name: &str, position: LatLng) {
        if let Some(index) = self.index_of(&position) {
            let record = &mut self.records[index];
            if !record.title.contains(name) {
                record.title.push_str(", ");
                record.title.push_str(name);
                map.set_marker_title(&record.marker, &record.title);
                map.set_label_text(&record.label, &record.title);
            }
            return;
        }

        let marker = map.add_marker(position, name);
        let label = map.add_label(position, name);
        self.records.push(MarkerRecord {
            position,
            title: name.to_string(),
            marker,
            label,
        });
    }

    pub fn clear(&mut self, map: &mut M) {
        for record in self.records.drain(..) {
            map.remove_label(record.label);
            map.remove_marker(record.marker);
        }
    }

    /// Replaces the markers with the locations referenced in `html` and fits
    /// the map to them.
    pub fn refresh(&mut self, map: &mut M, html: &str) -> RefreshOutcome {
        if !map.is_ready() {
            return RefreshOutcome::NotReady;
        }

        self.clear(map);

        let mut last = None;
        for location in scan_location_links(html) {
            if let Some(location) = &location {
                self.add(map, &location.display_name(), location.position);
            }
            last = location;
        }

        let viewport = self.fit_viewport(map, last.as_ref());
        tracing::debug!(markers = self.records.len(), ?viewport, "markers placed");
        RefreshOutcome::Placed {
            markers: self.records.len(),
            viewport,
        }
    }

    fn fit_viewport(&self, map: &mut M, last: Option<&LocationRef>) -> Option<Viewport> {
        let first = self.records.first()?;

        if let (1, Some(last)) = (self.records.len(), last) {
            let zoom = last.zoom_level();
            map.set_zoom(zoom);
            map.pan_to(first.position);
            return Some(Viewport::Centered {
                center: first.position,
                zoom,
            });
        }

        let mut bounds = Bounds::around(first.position);
        for record in &self.records[1..] {
            bounds.extend(record.position);
        }
        map.pan_to(bounds.center());
        map.fit_bounds(bounds);
        Some(Viewport::Fitted { bounds })
    }

    /// Like [`MarkerManager::refresh`], but waits for the map to load,
    /// sleeping for each delay `backoff` hands out.
    pub async fn refresh_when_ready(
        &mut self,
        map: &mut M,
        html: &str,
        backoff: Backoff,
        cancel: &CancellationToken,
    ) -> RefreshOutcome {
        let wait = wait_for_map(|| map.is_ready(), backoff, cancel).await;
        match wait {
            MapWait::Ready => self.refresh(map, html),
            MapWait::GaveUp => RefreshOutcome::Abandoned,
            MapWait::Cancelled => RefreshOutcome::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapWait {
    Ready,
    GaveUp,
    Cancelled,
}

/// Polls `is_ready`, sleeping for each delay `backoff` hands out in between.
/// Only the readiness check is needed, so callers can wait without holding
/// the map itself.
pub async fn wait_for_map(
    is_ready: impl Fn() -> bool,
    mut backoff: Backoff,
    cancel: &CancellationToken,
) -> MapWait {
    loop {
        if is_ready() {
            return MapWait::Ready;
        }

        let Some(delay) = backoff.next_delay() else {
            tracing::warn!("map did not load in time; markers skipped");
            return MapWait::GaveUp;
        };
        tracing::debug!(?delay, "map not ready; retrying markers");

        tokio::select! {
            _ = cancel.cancelled() => return MapWait::Cancelled,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Doubling retry delay. A delay is handed out only while its doubled
/// successor stays within `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    next: Duration,
    max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(INITIAL_RETRY_DELAY, MAX_RETRY_DELAY)
    }
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { next: initial, max }
    }

    pub fn next_delay(&mut self) -> Option<Duration> {
        let delay = self.next;
        self.next = delay.saturating_mul(2);
        if delay.is_zero() || self.next > self.max {
            return None;
        }
        Some(delay)
    }
}

/// Pans and zooms straight to the place named by a `showLocation(...)` call.
pub fn show_location<M: MapSurface>(map: &mut M, call: &str) -> Option<LocationRef> {
    let location = LocationRef::parse(call)?;
    focus_location(map, &location);
    Some(location)
}

pub fn focus_location<M: MapSurface>(map: &mut M, location: &LocationRef) {
    map.pan_to(location.position);
    map.set_zoom(location.zoom_level());
}
