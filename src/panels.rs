//! Side panels fed by the backend's extension events, and the tab router that
//! decides which one is visible.
//!
//! Panel state is independent of the chat cursor. Switching tabs only flips
//! visibility; feeds keep everything they have buffered.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::protocol::{InboundEvent, Synapse};

/// A single mutation to the panel board.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "panel", rename_all = "snake_case")]
pub enum PanelUpdate {
    Dream { text: String },
    Synapse { synapse: Synapse },
    Evolution { text: String },
    Market { text: String },
    Draft { text: String },
    Vibe { vibe: String },
    Pulse { temp: f64 },
}

impl PanelUpdate {
    /// Map a panel-kind event to its update. Chat kinds return `None`.
    pub fn from_event(event: &InboundEvent) -> Option<Self> {
        let update = match event {
            InboundEvent::SubconsciousThought { text } => PanelUpdate::Dream { text: text.clone() },
            InboundEvent::SynapseUpdate { synapse } => PanelUpdate::Synapse {
                synapse: synapse.clone(),
            },
            InboundEvent::Evolution { text } => PanelUpdate::Evolution { text: text.clone() },
            InboundEvent::Market { text } => PanelUpdate::Market { text: text.clone() },
            InboundEvent::Draft { text } => PanelUpdate::Draft { text: text.clone() },
            InboundEvent::Vibe { vibe } => PanelUpdate::Vibe { vibe: vibe.clone() },
            InboundEvent::Pulse { temp } => PanelUpdate::Pulse { temp: *temp },
            _ => return None,
        };
        Some(update)
    }

    /// The tab that displays this update, if any. Header indicators (vibe,
    /// pulse) are visible from every tab.
    pub fn tab(&self) -> Option<Tab> {
        match self {
            PanelUpdate::Dream { .. } => Some(Tab::Dreams),
            PanelUpdate::Synapse { .. } => Some(Tab::Synapses),
            PanelUpdate::Evolution { .. } => Some(Tab::Evolution),
            PanelUpdate::Market { .. } => Some(Tab::Market),
            PanelUpdate::Draft { .. } => Some(Tab::Drafts),
            PanelUpdate::Vibe { .. } | PanelUpdate::Pulse { .. } => None,
        }
    }
}

/// Accumulated state of every side panel.
///
/// Feeds (dreams, evolution, market, drafts) are most-recent-first. The
/// synapse grid keeps arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PanelBoard {
    pub dreams: Vec<String>,
    pub synapses: Vec<Synapse>,
    pub evolution: Vec<String>,
    pub market: Vec<String>,
    pub drafts: Vec<String>,
    pub vibe: Option<String>,
    pub temp: Option<f64>,
}

impl PanelBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, update: &PanelUpdate) {
        match update {
            PanelUpdate::Dream { text } => self.dreams.insert(0, text.clone()),
            PanelUpdate::Synapse { synapse } => self.synapses.push(synapse.clone()),
            PanelUpdate::Evolution { text } => self.evolution.insert(0, text.clone()),
            PanelUpdate::Market { text } => self.market.insert(0, text.clone()),
            PanelUpdate::Draft { text } => self.drafts.insert(0, text.clone()),
            PanelUpdate::Vibe { vibe } => self.vibe = Some(vibe.clone()),
            PanelUpdate::Pulse { temp } => self.temp = Some(*temp),
        }
    }

    /// Lines shown for `tab`, in display order.
    pub fn lines(&self, tab: Tab) -> Vec<String> {
        match tab {
            Tab::Chat => Vec::new(),
            Tab::Dreams => self.dreams.clone(),
            Tab::Synapses => self
                .synapses
                .iter()
                .map(|s| format!("{} --{}--> {}", s.source, s.relationship, s.target))
                .collect(),
            Tab::Evolution => self.evolution.clone(),
            Tab::Market => self.market.clone(),
            Tab::Drafts => self.drafts.clone(),
        }
    }
}

/// Named views. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    #[default]
    Chat,
    Dreams,
    Synapses,
    Evolution,
    Market,
    Drafts,
}

impl Tab {
    pub const ALL: [Tab; 6] = [
        Tab::Chat,
        Tab::Dreams,
        Tab::Synapses,
        Tab::Evolution,
        Tab::Market,
        Tab::Drafts,
    ];
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tab::Chat => "chat",
            Tab::Dreams => "dreams",
            Tab::Synapses => "synapses",
            Tab::Evolution => "evolution",
            Tab::Market => "market",
            Tab::Drafts => "drafts",
        };
        f.write_str(name)
    }
}

impl FromStr for Tab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tab::ALL
            .into_iter()
            .find(|t| t.to_string() == s.trim().to_lowercase())
            .ok_or_else(|| format!("Unknown tab: {}", s))
    }
}

/// Tracks the active tab. Owns no panel data.
#[derive(Debug, Clone, Default)]
pub struct TabRouter {
    active: Tab,
}

impl TabRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Tab {
        self.active
    }

    /// Make `tab` the active view. Returns `true` when the view changed.
    pub fn select(&mut self, tab: Tab) -> bool {
        let changed = self.active != tab;
        self.active = tab;
        changed
    }

    pub fn is_visible(&self, tab: Tab) -> bool {
        self.active == tab
    }
}
