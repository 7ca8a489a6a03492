pub mod types;
pub mod config;
pub mod flags;
pub mod logging;
pub mod notice;
pub mod progression;
pub mod recovery;
pub mod storage;
pub mod store;
pub mod autosave;
pub mod view;
#[cfg(feature = "desktop")]
pub mod commands;

pub use store::TournamentStore;
pub use types::{Player, SlotChoice, TournamentState, ViewMode};

use config::*;
use std::sync::{Arc, Mutex};
use storage::FileStorage;
use tracing::info;
use types::SharedTournamentStore;

/// Loads config, starts logging and opens the persisted document. Returns the
/// shared store and the log guard, which must outlive the app.
pub fn bootstrap() -> (EditorConfig, SharedTournamentStore, Option<tracing_appender::non_blocking::WorkerGuard>) {
    load_env_file();
    let config = load_config_inner().unwrap_or_else(|e| {
        eprintln!("Config error, using defaults: {e}");
        apply_env_overrides(EditorConfig::default())
    });
    let guard = logging::init_logging(&logs_dir(), &config.log_filter);
    info!("Bracket editor starting");
    log_config_warnings(&config);

    let storage = FileStorage::new(config.storage_path());
    info!("State directory: {}", storage.dir().display());
    let store = TournamentStore::with_storage(Box::new(storage), config.state_key.clone());
    (config, Arc::new(Mutex::new(store)), guard)
}

// ── Entry point ────────────────────────────────────────────────────────

#[cfg(feature = "desktop")]
pub fn run() {
    use notice::DialogNotifier;
    use tauri::Manager;

    let (config, store, _log_guard) = bootstrap();

    // Fatal notices go to the log until the window exists.
    let storage_dir = config.storage_path();
    let fatal_notifier = recovery::install_panic_hook(
        move || Box::new(FileStorage::new(storage_dir.clone())) as Box<dyn storage::StateStorage>,
        config.state_key.clone(),
        config.fatal_policy,
        Arc::new(notice::LogNotifier),
    );
    autosave::spawn_autosave(store.clone(), config.autosave_interval());

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .manage(store.clone())
        .setup(move |app| {
            let notifier = Arc::new(DialogNotifier::new(app.handle().clone()));
            fatal_notifier.set(notifier.clone());
            let shared = app.state::<SharedTournamentStore>();
            let mut guard = shared.lock().unwrap_or_else(|e| e.into_inner());
            guard.set_notifier(notifier);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::get_state,
            commands::add_player,
            commands::rename_player,
            commands::set_player_flag,
            commands::set_player_avatar,
            commands::delete_player,
            commands::assign_player,
            commands::set_score,
            commands::set_title,
            commands::set_main_title,
            commands::set_view_mode,
            commands::save_state,
            commands::bracket_layout,
            commands::groups_layout,
            commands::bracket_connector_paths,
            commands::list_flags,
            commands::load_config,
            commands::save_config
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri app");
}
