use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::flags::flag_ref_for;
use crate::notice::{LogNotifier, Notice, Notifier};
use crate::progression::{match_id_of, match_status, propagation_for, MatchStatus};
use crate::recovery::{fatal_triggered, recover_from_fatal, FatalPolicy};
use crate::storage::{StateStorage, StorageError};
use crate::types::{Player, SaveOutcome, SlotChoice, TournamentState, ViewMode};

/// TournamentStore owns the one state document and is its only write path.
///
/// Every mutation marks the store dirty iff it changed the document; `save`
/// writes the whole document and is the only thing that clears the flag.
/// References to unknown players are ignored rather than reported.
pub struct TournamentStore {
    state: TournamentState,
    storage: Box<dyn StateStorage>,
    key: String,
    notifier: Arc<dyn Notifier>,
}

impl TournamentStore {
    /// Load the document stored under `key`, falling back to the default
    /// document when it is missing or unreadable. Never fails.
    pub fn initialize(
        storage: Box<dyn StateStorage>,
        key: impl Into<String>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let key = key.into();
        let state = load_document(storage.as_ref(), &key);
        TournamentStore {
            state,
            storage,
            key,
            notifier,
        }
    }

    /// Headless store that reports notices to the log.
    pub fn with_storage(storage: Box<dyn StateStorage>, key: impl Into<String>) -> Self {
        TournamentStore::initialize(storage, key, Arc::new(LogNotifier))
    }

    pub fn state(&self) -> &TournamentState {
        &self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.state.is_dirty
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn set_notifier(&mut self, notifier: Arc<dyn Notifier>) {
        self.notifier = notifier;
    }

    fn mark_dirty(&mut self) {
        if !self.state.is_dirty {
            self.state.is_dirty = true;
            debug!("state marked dirty");
        }
    }

    // ── Players ────────────────────────────────────────────────────────

    /// Create a placeholder player with the next id. Returns `None`, and
    /// changes nothing, once the id counter is exhausted.
    pub fn add_player(&mut self) -> Option<Player> {
        let id = self.state.next_player_id;
        let Some(next) = id.checked_add(1) else {
            warn!("Player id counter exhausted at {id}; player not added");
            return None;
        };
        self.state.next_player_id = next;
        let player = Player::placeholder(id);
        self.state.players.push(player.clone());
        self.mark_dirty();
        info!("Added player {id}");
        Some(player)
    }

    pub fn rename_player(&mut self, player_id: u32, name: &str) -> bool {
        self.update_player(player_id, |player| replace_if_changed(&mut player.name, name))
    }

    pub fn set_player_flag(&mut self, player_id: u32, flag_ref: &str) -> bool {
        self.update_player(player_id, |player| replace_if_changed(&mut player.flag_ref, flag_ref))
    }

    /// Set a player's flag from a country code; unknown codes are ignored.
    pub fn set_player_flag_code(&mut self, player_id: u32, code: &str) -> bool {
        match flag_ref_for(code) {
            Some(flag_ref) => self.set_player_flag(player_id, &flag_ref),
            None => {
                debug!("Ignoring unknown flag code {code:?}");
                false
            }
        }
    }

    pub fn set_player_avatar(&mut self, player_id: u32, avatar_ref: &str) -> bool {
        self.update_player(player_id, |player| replace_if_changed(&mut player.avatar_ref, avatar_ref))
    }

    fn update_player<F>(&mut self, player_id: u32, f: F) -> bool
    where
        F: FnOnce(&mut Player) -> bool,
    {
        let changed = match self.state.player_mut(player_id) {
            Some(player) => f(player),
            None => {
                debug!("Player {player_id} not found; edit ignored");
                return false;
            }
        };
        if changed {
            self.mark_dirty();
        }
        changed
    }

    /// Remove a player and every slot that references them.
    pub fn delete_player(&mut self, player_id: u32) -> bool {
        let before = self.state.players.len();
        self.state.players.retain(|p| p.id != player_id);
        if self.state.players.len() == before {
            debug!("Player {player_id} not found; delete ignored");
            return false;
        }
        let slots_before = self.state.assignments.len();
        self.state.assignments.retain(|_, id| *id != player_id);
        let cleared = slots_before - self.state.assignments.len();
        self.mark_dirty();
        info!("Deleted player {player_id}, cleared {cleared} slot(s)");
        true
    }

    // ── Slots ──────────────────────────────────────────────────────────

    /// Seat a player in a slot or clear it. The player id is not checked
    /// against the roster.
    pub fn assign_player(&mut self, slot_id: &str, choice: SlotChoice) -> bool {
        let changed = match choice {
            SlotChoice::Player(id) => self.state.assignments.insert(slot_id.to_string(), id) != Some(id),
            SlotChoice::Unassign => self.state.assignments.remove(slot_id).is_some(),
        };
        if changed {
            self.mark_dirty();
        }
        changed
    }

    /// Store the raw score text and re-run progression for the slot's match.
    pub fn set_score(&mut self, slot_id: &str, raw: &str) -> bool {
        let changed = self.state.scores.get(slot_id).map(String::as_str) != Some(raw);
        if changed {
            self.state.scores.insert(slot_id.to_string(), raw.to_string());
            self.mark_dirty();
        }
        let advanced = self.advance_bracket(match_id_of(slot_id));
        changed || advanced
    }

    /// Send the winner (and loser, where the rule has one) of a decided
    /// match to their destination slots, overwriting whoever is there.
    /// Ties and matches without a rule leave assignments untouched, and a
    /// tie does not retract an earlier propagation.
    pub fn advance_bracket(&mut self, match_id: &str) -> bool {
        let Some(propagation) = propagation_for(match_id, &self.state.scores, &self.state.assignments) else {
            return false;
        };
        let mut changed = false;
        for (dest, player_id) in propagation.writes {
            changed |= match player_id {
                Some(id) => self.state.assignments.insert(dest.to_string(), id) != Some(id),
                None => self.state.assignments.remove(dest).is_some(),
            };
        }
        if changed {
            self.mark_dirty();
            info!("Advanced bracket from {match_id}");
        }
        changed
    }

    pub fn match_status(&self, match_id: &str) -> MatchStatus {
        match_status(&self.state.scores, match_id)
    }

    // ── Titles and view ────────────────────────────────────────────────

    pub fn set_title(&mut self, title_key: &str, text: &str) -> bool {
        let changed = self.state.titles.get(title_key).map(String::as_str) != Some(text);
        if changed {
            self.state.titles.insert(title_key.to_string(), text.to_string());
            self.mark_dirty();
        }
        changed
    }

    /// Set the headline of the current view mode.
    pub fn set_main_title(&mut self, text: &str) -> bool {
        let title = match self.state.view_mode {
            ViewMode::Bracket => &mut self.state.main_title_bracket,
            ViewMode::Groups => &mut self.state.main_title_groups,
        };
        let changed = replace_if_changed(title, text);
        if changed {
            self.mark_dirty();
        }
        changed
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) -> bool {
        if self.state.view_mode == mode {
            return false;
        }
        self.state.view_mode = mode;
        self.mark_dirty();
        true
    }

    // ── Persistence ────────────────────────────────────────────────────

    /// Write the whole document if dirty. On failure the store stays dirty
    /// so the next manual save or autosave tick retries. Refuses to write
    /// once a fatal error has been handled.
    pub fn save(&mut self) -> Result<SaveOutcome, StorageError> {
        if fatal_triggered() {
            warn!("Refusing to save {:?} after a fatal error", self.key);
            return Err(StorageError::Halted);
        }
        if !self.state.is_dirty {
            return Ok(SaveOutcome::Clean);
        }
        let result = match serde_json::to_string(&self.state) {
            Ok(document) => self.storage.store(&self.key, &document),
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(()) => {
                self.state.is_dirty = false;
                info!("State saved under {:?}", self.key);
                Ok(SaveOutcome::Saved)
            }
            Err(e) => {
                error!("Failed to save state under {:?}: {e}", self.key);
                self.notifier.notify(&Notice::SaveFailed { reason: e.to_string() });
                Err(e)
            }
        }
    }

    /// Apply the fatal-error policy to this store's persisted document.
    pub fn recover_from_fatal(&mut self, policy: FatalPolicy) -> Result<Option<String>, StorageError> {
        recover_from_fatal(self.storage.as_mut(), &self.key, policy, self.notifier.as_ref())
    }
}

fn replace_if_changed(field: &mut String, value: &str) -> bool {
    if field == value {
        return false;
    }
    *field = value.to_string();
    true
}

/// Read and decode the stored document. Corruption is logged and replaced by
/// the default document.
pub fn load_document(storage: &dyn StateStorage, key: &str) -> TournamentState {
    let mut state = match storage.load(key) {
        Ok(Some(data)) => match serde_json::from_str::<TournamentState>(&data) {
            Ok(state) => {
                info!("Loaded state from storage key {key:?}");
                state
            }
            Err(e) => {
                warn!("Could not parse saved state {key:?}, using default: {e}");
                TournamentState::default()
            }
        },
        Ok(None) => {
            info!("No saved state under {key:?}, using default");
            TournamentState::default()
        }
        Err(e) => {
            warn!("Could not read saved state {key:?}, using default: {e}");
            TournamentState::default()
        }
    };
    if let Some(max_id) = state.max_player_id() {
        if state.next_player_id <= max_id {
            match max_id.checked_add(1) {
                Some(next) => {
                    warn!(
                        "nextPlayerId {} does not exceed player id {max_id}; repairing",
                        state.next_player_id
                    );
                    state.next_player_id = next;
                }
                None => {
                    warn!("Saved state {key:?} has player id {max_id} with no id left after it, using default");
                    state = TournamentState::default();
                }
            }
        }
    }
    state.is_dirty = false;
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::testing::RecordingNotifier;
    use crate::progression::Side;
    use crate::storage::{FileStorage, MemoryStorage};
    use crate::types::{DEFAULT_FLAG_REF, DEFAULT_STATE_KEY};
    use serde_json::json;

    fn new_store() -> TournamentStore {
        TournamentStore::with_storage(Box::new(MemoryStorage::new()), DEFAULT_STATE_KEY)
    }

    fn store_with_doc(doc: &str) -> TournamentStore {
        let mut storage = MemoryStorage::new();
        storage.insert_raw(DEFAULT_STATE_KEY, doc);
        TournamentStore::with_storage(Box::new(storage), DEFAULT_STATE_KEY)
    }

    fn seated_quarterfinal() -> TournamentStore {
        let mut store = new_store();
        store.add_player().unwrap();
        store.add_player().unwrap();
        store.assign_player("qf1-p1", SlotChoice::Player(1));
        store.assign_player("qf1-p2", SlotChoice::Player(2));
        store
    }

    #[test]
    fn test_initialize_without_document_uses_default() {
        let store = new_store();
        assert_eq!(store.state(), &TournamentState::default());
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_initialize_corrupt_document_uses_default() {
        for doc in ["{not json", "[]", "null", "{\"players\": \"oops\"}"] {
            let store = store_with_doc(doc);
            assert_eq!(store.state(), &TournamentState::default(), "doc {doc}");
            assert!(!store.is_dirty());
        }
    }

    #[test]
    fn test_initialize_backfills_missing_fields_only() {
        let doc = json!({
            "players": [{ "id": 4, "name": "Ana", "flag": "countryflags/se.png", "avatar": "a.png" }],
            "assignments": { "qf1-p1": 4 },
            "nextPlayerId": 5,
            "isDirty": true
        });
        let store = store_with_doc(&doc.to_string());
        let state = store.state();
        let defaults = TournamentState::default();

        assert_eq!(state.players.len(), 1);
        assert_eq!(state.players[0].name, "Ana");
        assert_eq!(state.assignments.get("qf1-p1"), Some(&4));
        assert_eq!(state.next_player_id, 5);
        assert_eq!(state.scores, defaults.scores);
        assert_eq!(state.titles, defaults.titles);
        assert_eq!(state.main_title_bracket, defaults.main_title_bracket);
        assert_eq!(state.main_title_groups, defaults.main_title_groups);
        assert_eq!(state.view_mode, ViewMode::Bracket);
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_initialize_repairs_next_player_id() {
        let doc = json!({
            "players": [{ "id": 7, "name": "P", "flag": "f", "avatar": "a" }],
            "nextPlayerId": 3
        });
        let mut store = store_with_doc(&doc.to_string());
        assert_eq!(store.state().next_player_id, 8);
        assert_eq!(store.add_player().unwrap().id, 8);
    }

    #[test]
    fn test_initialize_rejects_player_id_at_counter_limit() {
        let doc = json!({
            "players": [{ "id": u32::MAX, "name": "P", "flag": "f", "avatar": "a" }],
            "nextPlayerId": 1
        });
        let store = store_with_doc(&doc.to_string());
        assert_eq!(store.state(), &TournamentState::default());
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_add_player_stops_when_counter_exhausted() {
        let doc = json!({ "nextPlayerId": u32::MAX });
        let mut store = store_with_doc(&doc.to_string());
        assert!(store.add_player().is_none());
        assert!(store.state().players.is_empty());
        assert_eq!(store.state().next_player_id, u32::MAX);
        assert!(!store.is_dirty());

        let doc = json!({ "nextPlayerId": u32::MAX - 1 });
        let mut store = store_with_doc(&doc.to_string());
        assert_eq!(store.add_player().unwrap().id, u32::MAX - 1);
        assert!(store.add_player().is_none());
        assert_eq!(store.state().players.len(), 1);
    }

    #[test]
    fn test_add_player_ids_strictly_increase() {
        let mut store = new_store();
        let mut last = 0;
        for _ in 0..5 {
            let player = store.add_player().unwrap();
            assert!(player.id > last);
            assert!(store.state().next_player_id > player.id);
            last = player.id;
        }
        assert!(store.delete_player(5));
        assert_eq!(store.add_player().unwrap().id, 6);
        assert!(store.is_dirty());
    }

    #[test]
    fn test_add_player_placeholder() {
        let mut store = new_store();
        let player = store.add_player().unwrap();
        assert_eq!(player.id, 1);
        assert_eq!(player.name, "Player 1");
        assert_eq!(player.flag_ref, DEFAULT_FLAG_REF);
    }

    #[test]
    fn test_player_edits_noop_for_unknown_id() {
        let mut store = new_store();
        assert!(!store.rename_player(42, "Ghost"));
        assert!(!store.set_player_flag(42, "countryflags/se.png"));
        assert!(!store.set_player_avatar(42, "data:image/png;base64,AA=="));
        assert!(!store.delete_player(42));
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_player_edits_mark_dirty_on_change() {
        let mut store = new_store();
        store.add_player();
        store.save().unwrap();

        assert!(!store.rename_player(1, "Player 1"));
        assert!(!store.is_dirty());

        assert!(store.rename_player(1, "Ana"));
        assert!(store.is_dirty());
        assert!(store.set_player_flag_code(1, "SE"));
        assert!(!store.set_player_flag_code(1, "zz"));
        assert!(store.set_player_avatar(1, "data:image/png;base64,AA=="));

        let player = store.state().player(1).unwrap();
        assert_eq!(player.name, "Ana");
        assert_eq!(player.flag_ref, "countryflags/se.png");
        assert_eq!(player.avatar_ref, "data:image/png;base64,AA==");
    }

    #[test]
    fn test_delete_player_cascades_through_assignments() {
        let mut store = new_store();
        store.add_player();
        store.add_player();
        for slot in ["qf1-p1", "sf1-p1", "group-a-3"] {
            store.assign_player(slot, SlotChoice::Player(1));
        }
        store.assign_player("qf2-p1", SlotChoice::Player(2));

        assert!(store.delete_player(1));
        let state = store.state();
        assert!(state.player(1).is_none());
        assert!(state.assignments.values().all(|&id| id != 1));
        assert_eq!(state.assignments.len(), 1);
        assert_eq!(state.assignments.get("qf2-p1"), Some(&2));
    }

    #[test]
    fn test_assign_and_unassign() {
        let mut store = new_store();
        assert!(store.assign_player("group-b-2", SlotChoice::Player(9)));
        assert_eq!(store.state().assignments.get("group-b-2"), Some(&9));
        assert!(!store.assign_player("group-b-2", SlotChoice::Player(9)));
        // the same player may sit in several slots
        assert!(store.assign_player("group-c-1", SlotChoice::Player(9)));
        assert!(store.assign_player("group-b-2", SlotChoice::Unassign));
        assert!(!store.assign_player("group-b-2", SlotChoice::Unassign));
        assert!(!store.state().assignments.contains_key("group-b-2"));
    }

    #[test]
    fn test_quarterfinal_winner_advances() {
        let mut store = seated_quarterfinal();
        store.set_score("qf1-p1", "3");
        store.set_score("qf1-p2", "1");
        let assignments = &store.state().assignments;
        assert_eq!(assignments.get("sf1-p1"), Some(&1));
        assert!(!assignments.contains_key("third-place-p1"));
        assert!(!assignments.contains_key("third-place-p2"));
        assert_eq!(store.match_status("qf1"), MatchStatus::Decided { winner: Side::P1 });
    }

    #[test]
    fn test_tie_does_not_advance() {
        let mut store = seated_quarterfinal();
        let before = store.state().assignments.clone();
        store.set_score("qf1-p1", "2");
        store.set_score("qf1-p2", "2");
        assert_eq!(store.state().assignments, before);
        assert!(!store.state().assignments.contains_key("sf1-p1"));
        assert_eq!(store.match_status("qf1"), MatchStatus::InProgress);
    }

    #[test]
    fn test_first_score_alone_decides_against_missing_side() {
        let mut store = seated_quarterfinal();
        store.set_score("qf1-p2", "1");
        assert_eq!(store.state().assignments.get("sf1-p1"), Some(&2));
    }

    #[test]
    fn test_semifinal_sends_loser_to_third_place() {
        let mut store = new_store();
        store.assign_player("sf2-p1", SlotChoice::Player(3));
        store.assign_player("sf2-p2", SlotChoice::Player(4));
        store.set_score("sf2-p1", "1");
        store.set_score("sf2-p2", "4");
        let assignments = &store.state().assignments;
        assert_eq!(assignments.get("final-p2"), Some(&4));
        assert_eq!(assignments.get("third-place-p2"), Some(&3));
    }

    #[test]
    fn test_propagation_overwrites_manual_destination() {
        let mut store = seated_quarterfinal();
        store.assign_player("sf1-p1", SlotChoice::Player(99));
        store.set_score("qf1-p1", "0");
        store.set_score("qf1-p2", "3");
        assert_eq!(store.state().assignments.get("sf1-p1"), Some(&2));
    }

    #[test]
    fn test_propagation_from_empty_winner_slot_clears_destination() {
        let mut store = new_store();
        store.assign_player("qf3-p2", SlotChoice::Player(5));
        store.assign_player("sf2-p1", SlotChoice::Player(5));
        store.set_score("qf3-p1", "2");
        assert!(!store.state().assignments.contains_key("sf2-p1"));
    }

    #[test]
    fn test_repeated_score_is_idempotent() {
        let mut store = seated_quarterfinal();
        store.set_score("qf1-p1", "3");
        store.set_score("qf1-p2", "1");
        store.save().unwrap();
        let snapshot = store.state().clone();

        assert!(!store.set_score("qf1-p2", "1"));
        assert!(!store.advance_bracket("qf1"));
        assert_eq!(store.state(), &snapshot);
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_reverting_to_tie_keeps_previous_propagation() {
        let mut store = seated_quarterfinal();
        store.set_score("qf1-p1", "3");
        store.set_score("qf1-p2", "1");
        store.set_score("qf1-p2", "3");
        assert_eq!(store.match_status("qf1"), MatchStatus::InProgress);
        assert_eq!(store.state().assignments.get("sf1-p1"), Some(&1));
    }

    #[test]
    fn test_scores_outside_progression_matches_only_store_text() {
        let mut store = new_store();
        store.assign_player("final-p1", SlotChoice::Player(1));
        let before = store.state().assignments.clone();
        assert!(store.set_score("final-p1", "5"));
        assert!(store.set_score("group-a-1", "12 pts"));
        assert_eq!(store.state().assignments, before);
        assert_eq!(store.state().scores.get("group-a-1").map(String::as_str), Some("12 pts"));
    }

    #[test]
    fn test_set_title_marks_dirty_only_on_change() {
        let mut store = new_store();
        assert!(!store.set_title("qf_date", "July 6"));
        assert!(!store.is_dirty());
        assert!(store.set_title("qf_date", "July 7"));
        assert!(store.set_title("group-title-A", "GROUP ALPHA"));
        assert!(store.is_dirty());
        assert_eq!(store.state().titles.get("qf_date").map(String::as_str), Some("July 7"));
    }

    #[test]
    fn test_main_title_follows_view_mode() {
        let mut store = new_store();
        assert!(store.set_main_title("QUARTERS"));
        assert!(store.set_view_mode(ViewMode::Groups));
        assert!(!store.set_view_mode(ViewMode::Groups));
        assert!(store.set_main_title("POOLS"));
        let state = store.state();
        assert_eq!(state.main_title_bracket, "QUARTERS");
        assert_eq!(state.main_title_groups, "POOLS");
        assert_eq!(state.main_title(), "POOLS");
    }

    #[test]
    fn test_save_is_noop_when_clean() {
        let mut store = new_store();
        assert_eq!(store.save().unwrap(), SaveOutcome::Clean);
        assert!(store.storage.load(DEFAULT_STATE_KEY).unwrap().is_none());
    }

    #[test]
    fn test_save_then_initialize_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TournamentStore::with_storage(Box::new(FileStorage::new(dir.path())), "bracket");
        store.add_player();
        store.add_player();
        store.rename_player(2, "Bo");
        store.assign_player("qf4-p1", SlotChoice::Player(2));
        store.set_score("qf4-p1", "2");
        store.set_title("sf_best", "Best of 3");
        store.set_view_mode(ViewMode::Groups);
        store.set_main_title("POOLS");
        assert_eq!(store.save().unwrap(), SaveOutcome::Saved);
        assert!(!store.is_dirty());

        let reloaded = TournamentStore::with_storage(Box::new(FileStorage::new(dir.path())), "bracket");
        assert_eq!(reloaded.state(), store.state());
        assert!(!reloaded.is_dirty());
    }

    #[test]
    fn test_save_failure_keeps_dirty_and_notifies() {
        let notifier = RecordingNotifier::default();
        let mut store = TournamentStore::initialize(
            Box::new(MemoryStorage::with_quota(64)),
            DEFAULT_STATE_KEY,
            Arc::new(notifier.clone()),
        );
        store.add_player();

        let err = store.save().unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
        assert!(store.is_dirty());
        let notices = notifier.notices();
        assert_eq!(notices.len(), 1);
        assert!(matches!(notices[0], Notice::SaveFailed { .. }));
    }
}
