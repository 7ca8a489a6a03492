//! Read-only projections of the document for the frontend. Nothing here
//! writes back into state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::progression::{match_status, slot_id, MatchStatus, Side, BRACKET_PROGRESSION};
use crate::types::{Player, TournamentState};

pub struct RoundLayout {
    pub key: &'static str,
    pub label: &'static str,
    pub matches: &'static [&'static str],
    pub has_time: bool,
}

pub const BRACKET_ROUNDS: [RoundLayout; 4] = [
    RoundLayout { key: "qf", label: "Quarterfinals", matches: &["qf1", "qf2", "qf3", "qf4"], has_time: false },
    RoundLayout { key: "sf", label: "Semifinals", matches: &["sf1", "sf2"], has_time: false },
    RoundLayout { key: "final", label: "Grand Final", matches: &["final"], has_time: true },
    RoundLayout { key: "third", label: "3rd Place Match", matches: &["third-place"], has_time: true },
];

pub const GROUP_LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];
pub const GROUP_SIZE: usize = 4;

pub fn group_slot_id(letter: char, position: usize) -> String {
    format!("group-{}-{position}", letter.to_ascii_lowercase())
}

pub fn group_title_key(letter: char) -> String {
    format!("group-title-{letter}")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotOutcome {
    Winner,
    Loser,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotView {
    pub slot_id: String,
    pub player: Option<Player>,
    pub score: String,
    pub outcome: Option<SlotOutcome>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchView {
    pub match_id: String,
    pub p1: SlotView,
    pub p2: SlotView,
    pub status: MatchStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundView {
    pub key: String,
    pub label: String,
    pub date: String,
    pub best_of: String,
    pub time: Option<String>,
    pub matches: Vec<MatchView>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connector {
    pub from_slot: String,
    pub to_slot: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketView {
    pub main_title: String,
    pub rounds: Vec<RoundView>,
    pub connectors: Vec<Connector>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    pub letter: char,
    pub title_key: String,
    pub title: String,
    pub slots: Vec<SlotView>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupsView {
    pub main_title: String,
    pub groups: Vec<GroupView>,
}

fn title(state: &TournamentState, key: &str) -> String {
    state.titles.get(key).cloned().unwrap_or_default()
}

fn match_slot_view(state: &TournamentState, slot_id: String, outcome: Option<SlotOutcome>) -> SlotView {
    let player = state.occupant(&slot_id).cloned();
    // seated players show 0 until a score is entered; empty slots show nothing
    let score = match (&player, state.scores.get(&slot_id)) {
        (Some(_), Some(raw)) => raw.clone(),
        (Some(_), None) => "0".to_string(),
        (None, _) => String::new(),
    };
    SlotView { slot_id, player, score, outcome }
}

/// Group slots carry no score.
fn group_slot_view(state: &TournamentState, slot_id: String) -> SlotView {
    let player = state.occupant(&slot_id).cloned();
    SlotView { slot_id, player, score: String::new(), outcome: None }
}

pub fn match_view(state: &TournamentState, match_id: &str) -> MatchView {
    let status = match_status(&state.scores, match_id);
    let outcome_for = |side: Side| {
        status.winner().map(|winner| {
            if winner == side {
                SlotOutcome::Winner
            } else {
                SlotOutcome::Loser
            }
        })
    };
    MatchView {
        match_id: match_id.to_string(),
        p1: match_slot_view(state, slot_id(match_id, Side::P1), outcome_for(Side::P1)),
        p2: match_slot_view(state, slot_id(match_id, Side::P2), outcome_for(Side::P2)),
        status,
    }
}

/// Lines from each decided match's winner (and semifinal loser) to the slot
/// they were sent to.
pub fn connectors(state: &TournamentState) -> Vec<Connector> {
    let mut out = Vec::new();
    for rule in BRACKET_PROGRESSION.iter() {
        let Some(winner) = match_status(&state.scores, rule.match_id).winner() else {
            continue;
        };
        out.push(Connector {
            from_slot: slot_id(rule.match_id, winner),
            to_slot: rule.winner_to.to_string(),
        });
        if let Some(loser_to) = rule.loser_to {
            out.push(Connector {
                from_slot: slot_id(rule.match_id, winner.other()),
                to_slot: loser_to.to_string(),
            });
        }
    }
    out
}

/// Horizontal run of a connector before it turns toward the destination.
pub const CONNECTOR_RUN: f64 = 40.0;

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn mid_y(&self) -> f64 {
        self.top + self.height / 2.0
    }
}

/// SVG path from the right edge of `source` to the left edge of `dest`,
/// relative to `container`: out, across, then in.
pub fn connector_path(source: Rect, dest: Rect, container: Rect) -> String {
    let start_x = source.right() - container.left;
    let start_y = source.mid_y() - container.top;
    let end_x = dest.left - container.left;
    let end_y = dest.mid_y() - container.top;
    let mid_x = start_x + CONNECTOR_RUN;
    format!("M {start_x} {start_y} H {mid_x} V {end_y} H {end_x}")
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorPath {
    pub from_slot: String,
    pub to_slot: String,
    pub path: String,
}

/// Paths for every current connector whose two slots appear in `rects`,
/// keyed by slot id.
pub fn connector_paths(state: &TournamentState, rects: &BTreeMap<String, Rect>, container: Rect) -> Vec<ConnectorPath> {
    connectors(state)
        .into_iter()
        .filter_map(|connector| {
            let source = rects.get(&connector.from_slot)?;
            let dest = rects.get(&connector.to_slot)?;
            Some(ConnectorPath {
                path: connector_path(*source, *dest, container),
                from_slot: connector.from_slot,
                to_slot: connector.to_slot,
            })
        })
        .collect()
}

pub fn bracket_view(state: &TournamentState) -> BracketView {
    let rounds = BRACKET_ROUNDS
        .iter()
        .map(|round| RoundView {
            key: round.key.to_string(),
            label: round.label.to_string(),
            date: title(state, &format!("{}_date", round.key)),
            best_of: title(state, &format!("{}_best", round.key)),
            time: round.has_time.then(|| title(state, &format!("{}_time", round.key))),
            matches: round.matches.iter().map(|id| match_view(state, id)).collect(),
        })
        .collect();
    BracketView {
        main_title: state.main_title_bracket.clone(),
        rounds,
        connectors: connectors(state),
    }
}

pub fn groups_view(state: &TournamentState) -> GroupsView {
    let groups = GROUP_LETTERS
        .iter()
        .map(|&letter| {
            let title_key = group_title_key(letter);
            let title = state
                .titles
                .get(&title_key)
                .cloned()
                .unwrap_or_else(|| format!("GROUP {letter}"));
            let slots = (1..=GROUP_SIZE)
                .map(|position| group_slot_view(state, group_slot_id(letter, position)))
                .collect();
            GroupView { letter, title_key, title, slots }
        })
        .collect();
    GroupsView {
        main_title: state.main_title_groups.clone(),
        groups,
    }
}
