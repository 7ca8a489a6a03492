use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressionRule {
  pub match_id: &'static str,
  pub winner_to: &'static str,
  pub loser_to: Option<&'static str>,
}

pub const BRACKET_PROGRESSION: [ProgressionRule; 6] = [
  ProgressionRule { match_id: "qf1", winner_to: "sf1-p1", loser_to: None },
  ProgressionRule { match_id: "qf2", winner_to: "sf1-p2", loser_to: None },
  ProgressionRule { match_id: "qf3", winner_to: "sf2-p1", loser_to: None },
  ProgressionRule { match_id: "qf4", winner_to: "sf2-p2", loser_to: None },
  ProgressionRule { match_id: "sf1", winner_to: "final-p1", loser_to: Some("third-place-p1") },
  ProgressionRule { match_id: "sf2", winner_to: "final-p2", loser_to: Some("third-place-p2") },
];

pub fn rule_for(match_id: &str) -> Option<&'static ProgressionRule> {
  BRACKET_PROGRESSION.iter().find(|rule| rule.match_id == match_id)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
  P1,
  P2,
}

impl Side {
  pub fn other(self) -> Side {
    match self {
      Side::P1 => Side::P2,
      Side::P2 => Side::P1,
    }
  }

  fn suffix(self) -> &'static str {
    match self {
      Side::P1 => "p1",
      Side::P2 => "p2",
    }
  }
}

pub fn slot_id(match_id: &str, side: Side) -> String {
  format!("{match_id}-{}", side.suffix())
}

/// Match id of a slot: everything before the last `-`.
/// `"third-place-p1"` → `"third-place"`, `"group-a-3"` → `"group-a"`.
pub fn match_id_of(slot_id: &str) -> &str {
  match slot_id.rfind('-') {
    Some(idx) => &slot_id[..idx],
    None => slot_id,
  }
}

/// Integer-prefix parse of a free-text score: leading whitespace, an optional
/// sign, then decimal digits up to the first non-digit. No digits means 0.
pub fn parse_score(raw: &str) -> i64 {
  let trimmed = raw.trim_start();
  let (negative, digits) = match trimmed.as_bytes().first() {
    Some(b'-') => (true, &trimmed[1..]),
    Some(b'+') => (false, &trimmed[1..]),
    _ => (false, trimmed),
  };
  let mut value: i64 = 0;
  for byte in digits.bytes() {
    if !byte.is_ascii_digit() {
      break;
    }
    value = value.saturating_mul(10).saturating_add(i64::from(byte - b'0'));
  }
  if negative {
    -value
  } else {
    value
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum MatchStatus {
  Empty,
  InProgress,
  Decided { winner: Side },
}

impl MatchStatus {
  pub fn winner(self) -> Option<Side> {
    match self {
      MatchStatus::Decided { winner } => Some(winner),
      _ => None,
    }
  }
}

/// Status of a two-slot match given the score map. A missing score counts as
/// 0 once the other side has one recorded.
pub fn match_status(scores: &BTreeMap<String, String>, match_id: &str) -> MatchStatus {
  let p1 = scores.get(&slot_id(match_id, Side::P1));
  let p2 = scores.get(&slot_id(match_id, Side::P2));
  if p1.is_none() && p2.is_none() {
    return MatchStatus::Empty;
  }
  let score1 = p1.map(|raw| parse_score(raw)).unwrap_or(0);
  let score2 = p2.map(|raw| parse_score(raw)).unwrap_or(0);
  if score1 == score2 {
    MatchStatus::InProgress
  } else if score1 > score2 {
    MatchStatus::Decided { winner: Side::P1 }
  } else {
    MatchStatus::Decided { winner: Side::P2 }
  }
}

/// Slot writes produced by deciding a match. `None` clears the destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Propagation {
  pub writes: Vec<(&'static str, Option<u32>)>,
}

/// Computes where a decided match sends its players. Returns `None` for
/// matches without a rule and for ties.
pub fn propagation_for(
  match_id: &str,
  scores: &BTreeMap<String, String>,
  assignments: &BTreeMap<String, u32>,
) -> Option<Propagation> {
  let rule = rule_for(match_id)?;
  let winner = match_status(scores, match_id).winner()?;
  let winner_id = assignments.get(&slot_id(match_id, winner)).copied();
  let loser_id = assignments.get(&slot_id(match_id, winner.other())).copied();

  let mut writes = vec![(rule.winner_to, winner_id)];
  if let Some(loser_to) = rule.loser_to {
    writes.push((loser_to, loser_id));
  }
  Some(Propagation { writes })
}
