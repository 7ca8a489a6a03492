use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use crate::store::TournamentStore;

// ── Constants ──────────────────────────────────────────────────────────

pub const DEFAULT_STATE_KEY: &str = "tournamentState";
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_FLAG_REF: &str = "countryflags/aq.png";
pub const DEFAULT_AVATAR_REF: &str = "data:image/svg+xml,%3Csvg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 100 100'%3E%3Ctext y='.9em' font-size='90'%3E👤%3C/text%3E%3C/svg%3E";
pub const DEFAULT_MAIN_TITLE_BRACKET: &str = "PLAYOFFS";
pub const DEFAULT_MAIN_TITLE_GROUPS: &str = "GROUPS";

const DEFAULT_TITLES: [(&str, &str); 10] = [
    ("qf_date", "July 6"),
    ("qf_best", "Best of 5"),
    ("sf_date", "July 12"),
    ("sf_best", "Best of 7"),
    ("final_date", "July 13"),
    ("final_best", "Best of 9"),
    ("third_date", "July 13"),
    ("third_best", "Best of 5"),
    ("final_time", "17:00 GMT"),
    ("third_time", "15:00 GMT"),
];

// ── Shared state type aliases ──────────────────────────────────────────

pub type SharedTournamentStore = Arc<Mutex<TournamentStore>>;

// ── Document types ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: u32,
    pub name: String,
    #[serde(rename = "flag")]
    pub flag_ref: String,
    #[serde(rename = "avatar")]
    pub avatar_ref: String,
}

impl Player {
    pub fn placeholder(id: u32) -> Self {
        Player {
            id,
            name: format!("Player {id}"),
            flag_ref: DEFAULT_FLAG_REF.to_string(),
            avatar_ref: DEFAULT_AVATAR_REF.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Bracket,
    Groups,
}

/// The single persisted document. Missing fields in a loaded document are
/// filled from `TournamentState::default()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TournamentState {
    pub players: Vec<Player>,
    pub assignments: BTreeMap<String, u32>,
    pub scores: BTreeMap<String, String>,
    pub titles: BTreeMap<String, String>,
    #[serde(rename = "mainTitle_bracket")]
    pub main_title_bracket: String,
    #[serde(rename = "mainTitle_groups")]
    pub main_title_groups: String,
    pub view_mode: ViewMode,
    pub next_player_id: u32,
    #[serde(skip)]
    pub is_dirty: bool,
}

impl Default for TournamentState {
    fn default() -> Self {
        TournamentState {
            players: Vec::new(),
            assignments: BTreeMap::new(),
            scores: BTreeMap::new(),
            titles: DEFAULT_TITLES
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            main_title_bracket: DEFAULT_MAIN_TITLE_BRACKET.to_string(),
            main_title_groups: DEFAULT_MAIN_TITLE_GROUPS.to_string(),
            view_mode: ViewMode::Bracket,
            next_player_id: 1,
            is_dirty: false,
        }
    }
}

impl TournamentState {
    pub fn player(&self, id: u32) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: u32) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    /// Player seated in `slot_id`, if the slot is assigned and the id still
    /// resolves to a roster entry.
    pub fn occupant(&self, slot_id: &str) -> Option<&Player> {
        self.assignments
            .get(slot_id)
            .and_then(|&id| self.player(id))
    }

    pub fn main_title(&self) -> &str {
        match self.view_mode {
            ViewMode::Bracket => &self.main_title_bracket,
            ViewMode::Groups => &self.main_title_groups,
        }
    }

    pub fn max_player_id(&self) -> Option<u32> {
        self.players.iter().map(|p| p.id).max()
    }
}

// ── Mutation inputs and results ────────────────────────────────────────

/// Target of an assignment: a player id, or clearing the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotChoice {
    Player(u32),
    Unassign,
}

impl From<Option<u32>> for SlotChoice {
    fn from(value: Option<u32>) -> Self {
        match value {
            Some(id) => SlotChoice::Player(id),
            None => SlotChoice::Unassign,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SaveOutcome {
    Saved,
    Clean,
}
