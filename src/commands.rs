use std::collections::BTreeMap;
use tauri::State;

use crate::config::{load_config_inner, save_config_inner, EditorConfig};
use crate::flags::COUNTRY_FLAGS;
use crate::store::TournamentStore;
use crate::types::{Player, SaveOutcome, SharedTournamentStore, SlotChoice, TournamentState, ViewMode};
use crate::view::{bracket_view, connector_paths, groups_view, BracketView, ConnectorPath, GroupsView, Rect};

// ── Helpers ─────────────────────────────────────────────────────────────

/// Lock the store, apply `f`, and hand back the resulting document.
fn with_store<F>(store: &State<'_, SharedTournamentStore>, f: F) -> Result<TournamentState, String>
where
    F: FnOnce(&mut TournamentStore),
{
    let mut guard = store.lock().map_err(|e| e.to_string())?;
    f(&mut guard);
    Ok(guard.state().clone())
}

// ── Document commands ───────────────────────────────────────────────────

#[tauri::command]
pub fn get_state(store: State<'_, SharedTournamentStore>) -> Result<TournamentState, String> {
    with_store(&store, |_| {})
}

#[tauri::command]
pub fn add_player(store: State<'_, SharedTournamentStore>) -> Result<Player, String> {
    let mut guard = store.lock().map_err(|e| e.to_string())?;
    guard
        .add_player()
        .ok_or_else(|| "No player ids left in this document.".to_string())
}

#[tauri::command]
pub fn rename_player(
    player_id: u32,
    name: String,
    store: State<'_, SharedTournamentStore>,
) -> Result<TournamentState, String> {
    with_store(&store, |s| {
        s.rename_player(player_id, &name);
    })
}

/// Set a player's flag from a country code in the flag list.
#[tauri::command]
pub fn set_player_flag(
    player_id: u32,
    code: String,
    store: State<'_, SharedTournamentStore>,
) -> Result<TournamentState, String> {
    with_store(&store, |s| {
        s.set_player_flag_code(player_id, &code);
    })
}

#[tauri::command]
pub fn set_player_avatar(
    player_id: u32,
    avatar: String,
    store: State<'_, SharedTournamentStore>,
) -> Result<TournamentState, String> {
    with_store(&store, |s| {
        s.set_player_avatar(player_id, &avatar);
    })
}

#[tauri::command]
pub fn delete_player(player_id: u32, store: State<'_, SharedTournamentStore>) -> Result<TournamentState, String> {
    with_store(&store, |s| {
        s.delete_player(player_id);
    })
}

/// Seat a player in a slot; `player_id: null` clears the slot.
#[tauri::command]
pub fn assign_player(
    slot_id: String,
    player_id: Option<u32>,
    store: State<'_, SharedTournamentStore>,
) -> Result<TournamentState, String> {
    with_store(&store, |s| {
        s.assign_player(&slot_id, SlotChoice::from(player_id));
    })
}

#[tauri::command]
pub fn set_score(
    slot_id: String,
    score: String,
    store: State<'_, SharedTournamentStore>,
) -> Result<TournamentState, String> {
    with_store(&store, |s| {
        s.set_score(&slot_id, &score);
    })
}

#[tauri::command]
pub fn set_title(
    title_key: String,
    text: String,
    store: State<'_, SharedTournamentStore>,
) -> Result<TournamentState, String> {
    with_store(&store, |s| {
        s.set_title(&title_key, &text);
    })
}

#[tauri::command]
pub fn set_main_title(text: String, store: State<'_, SharedTournamentStore>) -> Result<TournamentState, String> {
    with_store(&store, |s| {
        s.set_main_title(&text);
    })
}

#[tauri::command]
pub fn set_view_mode(mode: ViewMode, store: State<'_, SharedTournamentStore>) -> Result<TournamentState, String> {
    with_store(&store, |s| {
        s.set_view_mode(mode);
    })
}

#[tauri::command]
pub fn save_state(store: State<'_, SharedTournamentStore>) -> Result<SaveOutcome, String> {
    let mut guard = store.lock().map_err(|e| e.to_string())?;
    guard.save().map_err(|e| e.to_string())
}

// ── Views ───────────────────────────────────────────────────────────────

#[tauri::command]
pub fn bracket_layout(store: State<'_, SharedTournamentStore>) -> Result<BracketView, String> {
    let guard = store.lock().map_err(|e| e.to_string())?;
    Ok(bracket_view(guard.state()))
}

#[tauri::command]
pub fn groups_layout(store: State<'_, SharedTournamentStore>) -> Result<GroupsView, String> {
    let guard = store.lock().map_err(|e| e.to_string())?;
    Ok(groups_view(guard.state()))
}

/// SVG paths for the current connectors, from slot rectangles measured by the
/// frontend. Connectors whose slots were not measured are skipped.
#[tauri::command]
pub fn bracket_connector_paths(
    rects: BTreeMap<String, Rect>,
    container: Rect,
    store: State<'_, SharedTournamentStore>,
) -> Result<Vec<ConnectorPath>, String> {
    let guard = store.lock().map_err(|e| e.to_string())?;
    Ok(connector_paths(guard.state(), &rects, container))
}

#[tauri::command]
pub fn list_flags() -> Vec<&'static str> {
    COUNTRY_FLAGS.to_vec()
}

// ── Config commands ─────────────────────────────────────────────────────

#[tauri::command]
pub fn load_config() -> Result<EditorConfig, String> {
    load_config_inner()
}

/// Persists the config. Storage and logging settings apply on next launch.
#[tauri::command]
pub fn save_config(config: EditorConfig) -> Result<EditorConfig, String> {
    save_config_inner(config)
}
