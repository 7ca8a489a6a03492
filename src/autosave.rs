use std::{thread::sleep, time::Duration};
use tracing::{debug, info};

use crate::recovery::fatal_triggered;
use crate::storage::StorageError;
use crate::store::TournamentStore;
use crate::types::{SaveOutcome, SharedTournamentStore};

/// One autosave sweep: save iff dirty. Failures are already reported by
/// `save` and leave the store dirty for the next sweep.
pub fn autosave_tick(store: &mut TournamentStore) -> Option<Result<SaveOutcome, StorageError>> {
    if !store.is_dirty() {
        return None;
    }
    debug!("Autosave sweep: state is dirty");
    Some(store.save())
}

pub fn spawn_autosave(store: SharedTournamentStore, interval: Duration) {
    info!("Autosave every {}s", interval.as_secs());
    std::thread::spawn(move || loop {
        sleep(interval);
        if fatal_triggered() {
            info!("Autosave stopped after fatal error");
            break;
        }
        let mut guard = store.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(Err(StorageError::Halted)) = autosave_tick(&mut guard) {
            info!("Autosave stopped after fatal error");
            break;
        }
    });
}
