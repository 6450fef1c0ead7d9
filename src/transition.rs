use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ANIMATION_DURATION;

/// Which way the next transition moves. Chapter controls pick
/// `Forward`/`Backward`; everything else cross-fades.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
    #[default]
    Fade,
}

impl Direction {
    /// Decodes the numeric flag used by `changeHash`: 0 next, 1 previous.
    pub fn from_flag(flag: Option<i64>) -> Self {
        match flag {
            Some(0) => Self::Forward,
            Some(1) => Self::Backward,
            _ => Self::Fade,
        }
    }

    pub fn flag(self) -> u8 {
        match self {
            Self::Forward => 0,
            Self::Backward => 1,
            Self::Fade => 3,
        }
    }

    fn reveal(self) -> Reveal {
        match self {
            Self::Forward => Reveal::SlideLeft,
            Self::Backward => Reveal::SlideRight,
            Self::Fade => Reveal::CrossFade,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reveal {
    /// Incoming pane starts one width to the right; both panes move left.
    SlideLeft,
    /// Incoming pane starts one width to the left; both panes move right.
    SlideRight,
    CrossFade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaneId {
    #[serde(rename = "scripdiv1")]
    First,
    #[serde(rename = "scripdiv2")]
    Second,
}

impl PaneId {
    pub fn other(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }

    pub fn element_id(self) -> &'static str {
        match self {
            Self::First => "scripdiv1",
            Self::Second => "scripdiv2",
        }
    }
}

/// The rendering side of a transition.
pub trait Surface {
    fn set_pane_content(&mut self, pane: PaneId, html: &str);
    fn reveal(&mut self, incoming: PaneId, outgoing: PaneId, reveal: Reveal, duration: Duration);
    fn restack(&mut self, front: PaneId, back: PaneId);
    fn set_breadcrumbs(&mut self, html: &str);
    fn set_next_previous(&mut self, html: &str);
}

/// Markup that surrounds the panes and is replaced after every transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chrome {
    pub breadcrumbs: String,
    pub next_previous: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub on_screen: PaneId,
    pub reveal: Reveal,
}

#[derive(Debug, Clone)]
pub struct TransitionEngine {
    on_screen: PaneId,
    direction: Direction,
}

impl Default for TransitionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransitionEngine {
    pub fn new() -> Self {
        Self {
            on_screen: PaneId::First,
            direction: Direction::Fade,
        }
    }

    pub fn on_screen(&self) -> PaneId {
        self.on_screen
    }

    pub fn off_screen(&self) -> PaneId {
        self.on_screen.other()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Arms the direction for the next transition only.
    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    /// Disarms any pending direction. The pane on screen stays as it is.
    pub fn reset_direction(&mut self) {
        self.direction = Direction::Fade;
    }

    /// Writes `content` off screen, reveals it, swaps the panes and
    /// replaces the chrome.
    pub fn transition<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        content: &str,
        chrome: &Chrome,
    ) -> TransitionOutcome {
        let incoming = self.off_screen();
        let outgoing = self.on_screen;
        let reveal = std::mem::take(&mut self.direction).reveal();

        surface.set_pane_content(incoming, content);
        surface.reveal(incoming, outgoing, reveal, ANIMATION_DURATION);

        self.on_screen = incoming;
        surface.restack(incoming, outgoing);
        surface.set_next_previous(&chrome.next_previous);
        surface.set_breadcrumbs(&chrome.breadcrumbs);

        tracing::debug!(pane = incoming.element_id(), ?reveal, "transition complete");
        TransitionOutcome {
            on_screen: incoming,
            reveal,
        }
    }
}
