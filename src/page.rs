//! An in-memory page: two panes, breadcrumbs, chapter controls and a map.
//!
//! The HTTP host serves snapshots of this model to the browser, and the CLI
//! prints them.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::html;
use crate::markers::{Bounds, LatLng, MapSurface};
use crate::navigation::Route;
use crate::navigator::Navigator;
use crate::transition::{PaneId, Reveal, Surface};

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PaneView {
    pub content: String,
    pub z_index: u8,
}

#[derive(Debug, Clone, Default)]
pub struct PageSurface {
    first: PaneView,
    second: PaneView,
    front: Option<PaneId>,
    last_reveal: Option<Reveal>,
    breadcrumbs: String,
    next_previous: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PageView {
    pub on_screen: Option<PaneId>,
    pub content: String,
    pub reveal: Option<Reveal>,
    pub breadcrumbs: String,
    pub next_previous: String,
}

impl PageSurface {
    pub fn pane(&self, pane: PaneId) -> &PaneView {
        match pane {
            PaneId::First => &self.first,
            PaneId::Second => &self.second,
        }
    }

    fn pane_mut(&mut self, pane: PaneId) -> &mut PaneView {
        match pane {
            PaneId::First => &mut self.first,
            PaneId::Second => &mut self.second,
        }
    }

    pub fn snapshot(&self) -> PageView {
        PageView {
            on_screen: self.front,
            content: self
                .front
                .map(|pane| self.pane(pane).content.clone())
                .unwrap_or_default(),
            reveal: self.last_reveal,
            breadcrumbs: self.breadcrumbs.clone(),
            next_previous: self.next_previous.clone(),
        }
    }
}

impl Surface for PageSurface {
    fn set_pane_content(&mut self, pane: PaneId, html: &str) {
        self.pane_mut(pane).content = html.to_string();
    }

    fn reveal(&mut self, incoming: PaneId, outgoing: PaneId, reveal: Reveal, duration: Duration) {
        tracing::trace!(
            incoming = incoming.element_id(),
            outgoing = outgoing.element_id(),
            ?reveal,
            ?duration,
            "reveal"
        );
        self.last_reveal = Some(reveal);
    }

    fn restack(&mut self, front: PaneId, back: PaneId) {
        self.pane_mut(front).z_index = 1;
        self.pane_mut(back).z_index = 0;
        self.front = Some(front);
    }

    fn set_breadcrumbs(&mut self, html: &str) {
        self.breadcrumbs = html.to_string();
    }

    fn set_next_previous(&mut self, controls: &str) {
        self.next_previous = if controls.is_empty() {
            String::new()
        } else {
            html::next_previous_container(controls)
        };
    }
}

/// Shared "map has loaded" flag.
#[derive(Debug, Clone, Default)]
pub struct MapReadiness(Arc<AtomicBool>);

impl MapReadiness {
    pub fn mark_ready(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MarkerHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LabelHandle(u64);

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MarkerView {
    pub position: LatLng,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LabelView {
    pub position: LatLng,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct PageMap {
    readiness: MapReadiness,
    next_handle: u64,
    markers: BTreeMap<MarkerHandle, MarkerView>,
    labels: BTreeMap<LabelHandle, LabelView>,
    zoom: Option<u8>,
    center: Option<LatLng>,
    bounds: Option<Bounds>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MapView {
    pub markers: Vec<MarkerView>,
    pub labels: Vec<LabelView>,
    pub zoom: Option<u8>,
    pub center: Option<LatLng>,
    pub bounds: Option<Bounds>,
}

impl PageMap {
    pub fn ready() -> Self {
        let map = Self::default();
        map.readiness.mark_ready();
        map
    }

    pub fn readiness(&self) -> MapReadiness {
        self.readiness.clone()
    }

    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    pub fn snapshot(&self) -> MapView {
        MapView {
            markers: self.markers.values().cloned().collect(),
            labels: self.labels.values().cloned().collect(),
            zoom: self.zoom,
            center: self.center,
            bounds: self.bounds,
        }
    }
}

impl MapSurface for PageMap {
    type Marker = MarkerHandle;
    type Label = LabelHandle;

    fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    fn add_marker(&mut self, position: LatLng, title: &str) -> MarkerHandle {
        let handle = MarkerHandle(self.next_handle());
        self.markers.insert(
            handle,
            MarkerView {
                position,
                title: title.to_string(),
            },
        );
        handle
    }

    fn add_label(&mut self, position: LatLng, text: &str) -> LabelHandle {
        let handle = LabelHandle(self.next_handle());
        self.labels.insert(
            handle,
            LabelView {
                position,
                text: text.to_string(),
            },
        );
        handle
    }

    fn set_marker_title(&mut self, marker: &MarkerHandle, title: &str) {
        if let Some(view) = self.markers.get_mut(marker) {
            view.title = title.to_string();
        }
    }

    fn set_label_text(&mut self, label: &LabelHandle, text: &str) {
        if let Some(view) = self.labels.get_mut(label) {
            view.text = text.to_string();
        }
    }

    fn remove_marker(&mut self, marker: MarkerHandle) {
        self.markers.remove(&marker);
    }

    fn remove_label(&mut self, label: LabelHandle) {
        self.labels.remove(&label);
    }

    fn set_zoom(&mut self, zoom: u8) {
        self.zoom = Some(zoom);
    }

    fn pan_to(&mut self, position: LatLng) {
        self.center = Some(position);
    }

    fn fit_bounds(&mut self, bounds: Bounds) {
        self.bounds = Some(bounds);
    }
}

/// Everything a client needs to draw the session after a navigation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionSnapshot {
    pub route: Route,
    pub page: PageView,
    pub map: MapView,
}

pub type PageNavigator = Navigator<PageSurface, PageMap>;

impl Navigator<PageSurface, PageMap> {
    pub fn snapshot(&self, route: Route) -> SessionSnapshot {
        SessionSnapshot {
            route,
            page: self.surface().snapshot(),
            map: self.map().snapshot(),
        }
    }
}
